//! Simulated blockchain ledger
//!
//! The marketplace mirrors achievements and user verification onto an
//! external ledger. This implementation is an explicit simulation: it derives
//! pseudo transaction ids by hashing the payload against a monotonic block
//! counter and performs no consensus or cryptographic verification. The core
//! treats it as a best-effort side channel whose failure aborts the
//! triggering request; there is no compensation or rollback.

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::types::CanopyError;

/// Receipt returned for a simulated ledger commit
#[derive(Debug, Clone, Serialize)]
pub struct LedgerReceipt {
    /// Pseudo transaction id
    pub tx_id: String,
    /// Simulated block the commit landed in
    pub block_height: u64,
}

/// Narrow interface to the ledger collaborator
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Record a newly created achievement
    async fn create_achievement(
        &self,
        data: &serde_json::Value,
    ) -> Result<LedgerReceipt, CanopyError>;

    /// Record an achievement update
    async fn update_achievement(&self, data: &serde_json::Value) -> Result<(), CanopyError>;

    /// Record a user state change (e.g. regulator verification)
    async fn update_user(&self, data: &serde_json::Value) -> Result<(), CanopyError>;
}

/// In-process ledger simulation
pub struct SimulatedLedger {
    block_height: AtomicU64,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self {
            block_height: AtomicU64::new(0),
        }
    }

    fn commit(&self, kind: &str, data: &serde_json::Value) -> Result<LedgerReceipt, CanopyError> {
        let payload = serde_json::to_vec(data)
            .map_err(|e| CanopyError::Ledger(format!("Unserializable payload: {}", e)))?;

        let block_height = self.block_height.fetch_add(1, Ordering::Relaxed) + 1;

        let mut hasher = Sha256::new();
        hasher.update(kind.as_bytes());
        hasher.update(block_height.to_be_bytes());
        hasher.update(&payload);
        let hash = hasher.finalize();
        let tx_id = format!("0x{}", hex::encode(&hash[..16]));

        info!(
            kind = kind,
            tx_id = %tx_id,
            block_height = block_height,
            "Simulated ledger commit"
        );

        Ok(LedgerReceipt {
            tx_id,
            block_height,
        })
    }
}

impl Default for SimulatedLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerClient for SimulatedLedger {
    async fn create_achievement(
        &self,
        data: &serde_json::Value,
    ) -> Result<LedgerReceipt, CanopyError> {
        self.commit("achievement.create", data)
    }

    async fn update_achievement(&self, data: &serde_json::Value) -> Result<(), CanopyError> {
        self.commit("achievement.update", data).map(|_| ())
    }

    async fn update_user(&self, data: &serde_json::Value) -> Result<(), CanopyError> {
        self.commit("user.update", data).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_commits_advance_block_height() {
        let ledger = SimulatedLedger::new();

        let first = ledger
            .create_achievement(&json!({"title": "First Purchase"}))
            .await
            .unwrap();
        let second = ledger
            .create_achievement(&json!({"title": "First Purchase"}))
            .await
            .unwrap();

        assert_eq!(first.block_height, 1);
        assert_eq!(second.block_height, 2);
        // Same payload, different block, different tx id
        assert_ne!(first.tx_id, second.tx_id);
    }

    #[tokio::test]
    async fn test_tx_id_shape() {
        let ledger = SimulatedLedger::new();
        let receipt = ledger
            .create_achievement(&json!({"user": "abc"}))
            .await
            .unwrap();
        assert!(receipt.tx_id.starts_with("0x"));
        assert_eq!(receipt.tx_id.len(), 2 + 32);
    }

    #[tokio::test]
    async fn test_update_calls_succeed() {
        let ledger = SimulatedLedger::new();
        ledger
            .update_achievement(&json!({"progress": 20}))
            .await
            .unwrap();
        ledger
            .update_user(&json!({"verified": true}))
            .await
            .unwrap();
    }
}
