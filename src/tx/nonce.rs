//! Nonce management for alternating transfers
//!
//! Handles:
//! - Local nonce tracking per account, seeded from the pending pool
//! - Advancing after each accepted broadcast
//! - Resynchronising from the node after a nonce conflict
//!
//! Cycles run strictly one after another, so the map needs no locking.

use crate::chain::LedgerClient;
use crate::coordination::AccountLabel;
use crate::error::{PingPongError, PingPongResult};

use ethers::types::Address;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Next usable nonce per account
#[derive(Debug, Default)]
pub struct NonceTracker {
    nonces: HashMap<AccountLabel, u64>,
}

impl NonceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the nonce for an account from its pending transaction count
    pub async fn initialize(
        &mut self,
        label: AccountLabel,
        address: Address,
        client: &dyn LedgerClient,
    ) -> PingPongResult<u64> {
        let nonce = client.pending_nonce(address).await?;
        self.nonces.insert(label, nonce);
        debug!("Initialized nonce for account {}: {}", label, nonce);
        Ok(nonce)
    }

    /// Nonce the next transfer from `label` should use
    pub fn next_for(&self, label: AccountLabel) -> PingPongResult<u64> {
        self.nonces
            .get(&label)
            .copied()
            .ok_or_else(|| PingPongError::Nonce {
                account: label.to_string(),
                message: "Account not initialized".to_string(),
            })
    }

    /// Record that a transfer using the current nonce was accepted by the node
    pub fn advance(&mut self, label: AccountLabel) -> PingPongResult<u64> {
        let nonce = self
            .nonces
            .get_mut(&label)
            .ok_or_else(|| PingPongError::Nonce {
                account: label.to_string(),
                message: "Account not initialized".to_string(),
            })?;
        *nonce += 1;
        Ok(*nonce)
    }

    /// Overwrite the local nonce with the node's pending count.
    ///
    /// Best effort: on query failure the stale value is kept and `None` is
    /// returned. The next conflict will trigger another resync.
    pub async fn resync(
        &mut self,
        label: AccountLabel,
        address: Address,
        client: &dyn LedgerClient,
    ) -> Option<u64> {
        match client.pending_nonce(address).await {
            Ok(current) => {
                let previous = self.nonces.insert(label, current);
                info!(
                    "Nonce for account {} ({:?}) reset: {:?} -> {}",
                    label, address, previous, current
                );
                crate::metrics::record_nonce_resync(label, true);
                Some(current)
            }
            Err(e) => {
                warn!(
                    "Nonce resync failed for account {} ({:?}), keeping {:?}: {}",
                    label,
                    address,
                    self.nonces.get(&label),
                    e
                );
                crate::metrics::record_nonce_resync(label, false);
                None
            }
        }
    }
}
