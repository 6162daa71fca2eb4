//! Activity log document schema
//!
//! Append-only audit trail: credit purchases, regulator verifications,
//! account deletions. No update path.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for the activity log
pub const ACTIVITY_LOG_COLLECTION: &str = "activity_log";

/// Activity log entry stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ActivityLogDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// User the action is attributed to
    pub user: ObjectId,

    /// Action name, e.g. "credit.purchase", "user.verify"
    pub action: String,

    /// Structured action detail
    #[serde(default)]
    pub detail: Document,
}

impl ActivityLogDoc {
    /// Create a new activity log entry
    pub fn new(user: ObjectId, action: impl Into<String>, detail: Document) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            action: action.into(),
            detail,
        }
    }
}

impl IntoIndexes for ActivityLogDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "user": 1, "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("user_created_at_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "action": 1 },
                Some(
                    IndexOptions::builder()
                        .name("action_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for ActivityLogDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
