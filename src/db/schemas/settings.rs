//! Site settings document schema
//!
//! A singleton document keyed by "site". Read by any authenticated user,
//! written by regulators only.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};

use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for site settings
pub const SITE_SETTINGS_COLLECTION: &str = "site_settings";

/// Singleton document key
pub const SITE_SETTINGS_KEY: &str = "site";

/// Site settings document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct SiteSettingsDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Singleton key, always "site"
    pub key: String,

    /// When true, mutating marketplace endpoints are rejected
    #[serde(default)]
    pub maintenance_mode: bool,

    /// When false, POST /api/auth/register is rejected
    #[serde(default = "default_true")]
    pub registration_open: bool,

    /// Marketplace fee applied to purchases, percent of price
    #[serde(default)]
    pub marketplace_fee_percent: f64,
}

fn default_true() -> bool {
    true
}

impl Default for SiteSettingsDoc {
    fn default() -> Self {
        Self {
            _id: None,
            metadata: Metadata::new(),
            key: SITE_SETTINGS_KEY.to_string(),
            maintenance_mode: false,
            registration_open: true,
            marketplace_fee_percent: 0.0,
        }
    }
}

impl IntoIndexes for SiteSettingsDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![(
            doc! { "key": 1 },
            Some(
                IndexOptions::builder()
                    .unique(true)
                    .name("key_unique".to_string())
                    .build(),
            ),
        )]
    }
}

impl MutMetadata for SiteSettingsDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}
