//! Configuration for Canopy
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Canopy - carbon-credit marketplace backend
#[derive(Parser, Debug, Clone)]
#[command(name = "canopy")]
#[command(about = "Carbon-credit marketplace backend")]
pub struct Args {
    /// Unique node identifier for this instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (relaxed JWT secret, optional MongoDB)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "canopy")]
    pub mongodb_db: String,

    /// JWT secret for token signing (required in production)
    #[arg(long, env = "JWT_SECRET")]
    pub jwt_secret: Option<String>,

    /// JWT access token expiry in seconds
    #[arg(long, env = "JWT_EXPIRY_SECONDS", default_value = "3600")]
    pub jwt_expiry_seconds: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// TTL in seconds for cached credit listings
    #[arg(long, env = "CACHE_LIST_TTL_SECS", default_value = "60")]
    pub cache_list_ttl_secs: u64,

    /// TTL in seconds for cached user profiles
    #[arg(long, env = "CACHE_PROFILE_TTL_SECS", default_value = "60")]
    pub cache_profile_ttl_secs: u64,
}

impl Args {
    /// Get effective JWT secret (uses default in dev mode)
    pub fn jwt_secret(&self) -> String {
        if self.dev_mode {
            self.jwt_secret
                .clone()
                .unwrap_or_else(|| "dev-only-insecure-secret-not-for-production".to_string())
        } else {
            self.jwt_secret
                .clone()
                .expect("JWT_SECRET is required in production mode")
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode && self.jwt_secret.is_none() {
            return Err("JWT_SECRET is required in production mode".to_string());
        }

        if let Some(ref secret) = self.jwt_secret {
            if !self.dev_mode && secret.len() < 32 {
                return Err("JWT_SECRET must be at least 32 characters".to_string());
            }
        }

        if self.cache_list_ttl_secs == 0 {
            return Err("CACHE_LIST_TTL_SECS must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args::parse_from(["canopy", "--dev-mode"])
    }

    #[test]
    fn test_dev_mode_defaults() {
        let args = base_args();
        assert!(args.dev_mode);
        assert!(args.validate().is_ok());
        assert!(!args.jwt_secret().is_empty());
        assert_eq!(args.cache_list_ttl_secs, 60);
    }

    #[test]
    fn test_production_requires_secret() {
        let args = Args::parse_from(["canopy"]);
        assert!(args.validate().is_err());

        let args = Args::parse_from([
            "canopy",
            "--jwt-secret",
            "a-production-secret-at-least-32-chars!",
        ]);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_production_rejects_short_secret() {
        let args = Args::parse_from(["canopy", "--jwt-secret", "short"]);
        assert!(args.validate().is_err());
    }
}
