//! Cache-aside layer for Canopy
//!
//! Read-through caching for credit listings, marketplace stats, and user
//! profiles. Listing keys are derived from the full normalized filter and
//! pagination parameter set (see [`keys`]); any credit write invalidates the
//! whole `credits:` prefix, and profile writes invalidate the per-user key.

pub mod keys;
pub mod store;

pub use keys::{user_profile_key, user_profile_prefix, CreditListKey, CREDIT_PREFIX, CREDIT_STATS_KEY};
pub use store::{spawn_cleanup_task, CacheEntry, CacheStats, ContentCache};

use std::time::Duration;

use crate::config::Args;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache
    pub max_entries: usize,
    /// TTL for credit listings and stats
    pub list_ttl: Duration,
    /// TTL for user profiles
    pub profile_ttl: Duration,
    /// Cleanup interval
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            list_ttl: Duration::from_secs(60),
            profile_ttl: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Build cache configuration from CLI/env arguments
    pub fn from_args(args: &Args) -> Self {
        Self {
            list_ttl: Duration::from_secs(args.cache_list_ttl_secs),
            profile_ttl: Duration::from_secs(args.cache_profile_ttl_secs),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.max_entries, 10_000);
        assert_eq!(config.list_ttl, Duration::from_secs(60));
        assert_eq!(config.profile_ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_config_from_args() {
        let args = Args::parse_from([
            "canopy",
            "--dev-mode",
            "--cache-list-ttl-secs",
            "30",
            "--cache-profile-ttl-secs",
            "120",
        ]);
        let config = CacheConfig::from_args(&args);
        assert_eq!(config.list_ttl, Duration::from_secs(30));
        assert_eq!(config.profile_ttl, Duration::from_secs(120));
    }
}
