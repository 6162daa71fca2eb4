//! Report document schema
//!
//! A user-requested snapshot of their marketplace position, computed from
//! the credits collection at generation time.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for reports
pub const REPORT_COLLECTION: &str = "reports";

/// Aggregated totals frozen into a report
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ReportTotals {
    /// Credits this user has listed (as farmer)
    pub credits_listed: i64,
    /// Of those, how many have sold
    pub credits_sold: i64,
    /// Credits this user holds (as buyer)
    pub credits_owned: i64,
    /// Total credit volume across listed and owned
    pub total_amount: f64,
    /// Summed carbon reduction across listed and owned
    pub total_carbon_reduction: f64,
    /// Summed water savings across listed and owned
    pub total_water_saved: f64,
}

/// Report document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ReportDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// User the report belongs to
    pub user: ObjectId,

    /// Snapshot totals
    #[serde(default)]
    pub totals: ReportTotals,
}

impl ReportDoc {
    /// Create a new report snapshot
    pub fn new(user: ObjectId, totals: ReportTotals) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            user,
            totals,
        }
    }
}

impl IntoIndexes for ReportDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "user": 1, "metadata.created_at": -1 },
            Some(
                IndexOptions::builder()
                    .name("user_created_at_index".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for ReportDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
