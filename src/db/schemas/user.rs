//! User document schema
//!
//! Stores credentials, marketplace role, onboarding state, and preferences.

use bson::{doc, oid::ObjectId, Document};
use mongodb::options::IndexOptions;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::auth::Role;
use crate::db::mongo::{IntoIndexes, MutMetadata};
use crate::db::schemas::Metadata;

/// Collection name for users
pub const USER_COLLECTION: &str = "users";

/// Onboarding progression for newly registered users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OnboardingStatus {
    #[default]
    Pending,
    Completed,
    Bypassed,
}

impl fmt::Display for OnboardingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnboardingStatus::Pending => write!(f, "pending"),
            OnboardingStatus::Completed => write!(f, "completed"),
            OnboardingStatus::Bypassed => write!(f, "bypassed"),
        }
    }
}

/// Per-user preference sub-document
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct UserSettings {
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub two_factor_auth: bool,
}

impl Default for UserSettings {
    fn default() -> Self {
        Self {
            notifications: true,
            language: default_language(),
            theme: default_theme(),
            two_factor_auth: false,
        }
    }
}

fn default_language() -> String {
    "en".to_string()
}

fn default_theme() -> String {
    "light".to_string()
}

fn default_true() -> bool {
    true
}

/// User document stored in MongoDB
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UserDoc {
    /// MongoDB document ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub _id: Option<ObjectId>,

    /// Common metadata (created_at, updated_at, is_deleted)
    #[serde(default)]
    pub metadata: Metadata,

    /// Display name
    pub name: String,

    /// User identifier (email, unique)
    pub identifier: String,

    /// Argon2 password hash
    pub password_hash: String,

    /// Marketplace role
    pub user_type: Role,

    /// Organization name (industries, regulators)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,

    /// Contact phone number
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,

    /// Onboarding progression
    #[serde(default)]
    pub onboarding_status: OnboardingStatus,

    /// Whether a regulator has verified this user
    #[serde(default)]
    pub verified: bool,

    /// Pre-verified users skip onboarding at registration
    #[serde(default)]
    pub pre_verified: bool,

    /// User preferences
    #[serde(default)]
    pub settings: UserSettings,

    /// Token version for invalidation (increment to invalidate all tokens)
    #[serde(default)]
    pub token_version: i32,

    /// Whether the user account is active
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl UserDoc {
    /// Create a new user document
    pub fn new(
        name: String,
        identifier: String,
        password_hash: String,
        user_type: Role,
        organization: Option<String>,
        phone: Option<String>,
        pre_verified: bool,
    ) -> Self {
        let onboarding_status = if pre_verified {
            OnboardingStatus::Bypassed
        } else {
            OnboardingStatus::Pending
        };

        Self {
            _id: None,
            metadata: Metadata::new(),
            name,
            identifier,
            password_hash,
            user_type,
            organization,
            phone,
            onboarding_status,
            verified: false,
            pre_verified,
            settings: UserSettings::default(),
            token_version: 1,
            is_active: true,
        }
    }
}

impl IntoIndexes for UserDoc {
    fn into_indices() -> Vec<(Document, Option<IndexOptions>)> {
        vec![
            // Unique index on identifier
            (
                doc! { "identifier": 1 },
                Some(
                    IndexOptions::builder()
                        .unique(true)
                        .name("identifier_unique".to_string())
                        .build(),
                ),
            ),
            // Index on user_type for role-filtered listings
            (
                doc! { "user_type": 1 },
                Some(
                    IndexOptions::builder()
                        .name("user_type_index".to_string())
                        .build(),
                ),
            ),
        ]
    }
}

impl MutMetadata for UserDoc {
    fn mut_metadata(&mut self) -> &mut Metadata {
        &mut self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_defaults() {
        let user = UserDoc::new(
            "Asha".into(),
            "asha@example.com".into(),
            "$argon2id$stub".into(),
            Role::Farmer,
            None,
            None,
            false,
        );

        assert_eq!(user.onboarding_status, OnboardingStatus::Pending);
        assert!(!user.verified);
        assert!(user.is_active);
        assert_eq!(user.token_version, 1);
        assert!(user.settings.notifications);
        assert_eq!(user.settings.language, "en");
    }

    #[test]
    fn test_pre_verified_bypasses_onboarding() {
        let user = UserDoc::new(
            "Steel Corp".into(),
            "ops@steel.example".into(),
            "$argon2id$stub".into(),
            Role::Industry,
            Some("Steel Corp".into()),
            None,
            true,
        );

        assert_eq!(user.onboarding_status, OnboardingStatus::Bypassed);
        assert!(user.pre_verified);
    }

    #[test]
    fn test_onboarding_wire_format() {
        assert_eq!(
            serde_json::to_string(&OnboardingStatus::Completed).unwrap(),
            "\"completed\""
        );
    }
}
