//! Credit document schema
//!
//! A listed carbon credit: ownership references, pricing, the immutable
//! sustainability-metrics snapshot, and the append-only trading history.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::credits::{
    CreditStatus, CreditType, Location, SustainabilityMetrics, TradeRecord, VerificationDetails,
};
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for credits
pub const CREDIT_COLLECTION: &str = "credits";

/// Credit document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct CreditDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// The farmer who listed this credit (original creator)
    pub farmer: ObjectId,

    /// The buyer the credit was transferred to, once sold
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<ObjectId>,

    /// Credit category
    pub credit_type: CreditType,

    /// Credit volume (positive)
    pub amount: f64,

    /// Asking price per listing (positive)
    pub price: f64,

    /// Lifecycle status, initial Available
    #[serde(default)]
    pub status: CreditStatus,

    /// Where the underlying project is located
    #[serde(default)]
    pub location: Location,

    /// Snapshot computed at creation, immutable thereafter
    #[serde(default)]
    pub sustainability_metrics: SustainabilityMetrics,

    /// Third-party verification details
    #[serde(default)]
    pub verification_details: VerificationDetails,

    /// Append-only trade ledger
    #[serde(default)]
    pub trading_history: Vec<TradeRecord>,
}

impl CreditDoc {
    /// Create a new Available credit with its metrics snapshot
    pub fn new(
        farmer: ObjectId,
        credit_type: CreditType,
        amount: f64,
        price: f64,
        location: Location,
        sustainability_metrics: SustainabilityMetrics,
    ) -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            farmer,
            owner: None,
            credit_type,
            amount,
            price,
            status: CreditStatus::Available,
            location,
            sustainability_metrics,
            verification_details: VerificationDetails::default(),
            trading_history: Vec::new(),
        }
    }
}

impl IntoIndexes for CreditDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            (
                doc! { "farmer": 1 },
                Some(
                    IndexOptions::builder()
                        .name("farmer_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "owner": 1 },
                Some(
                    IndexOptions::builder()
                        .name("owner_index".to_string())
                        .build(),
                ),
            ),
            // Status + type drive the marketplace listing filters
            (
                doc! { "status": 1, "credit_type": 1 },
                Some(
                    IndexOptions::builder()
                        .name("status_type_index".to_string())
                        .build(),
                ),
            ),
            (
                doc! { "metadata.created_at": -1 },
                Some(
                    IndexOptions::builder()
                        .name("created_at_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for CreditDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
