//! Activity logging
//!
//! Persists audit events (purchases, verifications, deletions) to the
//! activity_log collection. Recording is best-effort: a failed write is
//! logged and never propagated to the request that triggered it.

use bson::{oid::ObjectId, Document};
use tracing::{debug, error};

use crate::db::schemas::{ActivityLogDoc, ACTIVITY_LOG_COLLECTION};
use crate::db::MongoClient;

/// Writes audit events to MongoDB
#[derive(Clone)]
pub struct ActivityLogger {
    mongo: Option<MongoClient>,
}

impl ActivityLogger {
    /// Create a new activity logger
    pub fn new(mongo: Option<MongoClient>) -> Self {
        Self { mongo }
    }

    /// Record an audit event
    pub async fn record(&self, user: ObjectId, action: &str, detail: Document) {
        let Some(ref mongo) = self.mongo else {
            debug!(action = action, "Activity log skipped (no database)");
            return;
        };

        let entry = ActivityLogDoc::new(user, action, detail);

        let collection = match mongo
            .collection::<ActivityLogDoc>(ACTIVITY_LOG_COLLECTION)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                error!("Failed to open activity log collection: {}", e);
                return;
            }
        };

        if let Err(e) = collection.insert_one(entry).await {
            error!(action = action, "Failed to write activity log entry: {}", e);
        }
    }
}
