//! Transfer submission with nonce reconciliation and bounded confirmation wait

use super::builder::SignedTransfer;
use super::nonce::NonceTracker;
use crate::chain::{ConfirmationStatus, FinalityTracker, LedgerClient};
use crate::coordination::AccountLabel;

use ethers::types::H256;
use std::fmt;
use tracing::{error, info, warn};

/// Lower-cased phrases that mark a broadcast rejection as a nonce conflict.
/// Node implementations word these differently; the list is a heuristic.
const NONCE_CONFLICT_PHRASES: &[&str] = &[
    "nonce",
    "replacement transaction underpriced",
    "already known",
    "known transaction",
];

/// Why a broadcast was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastFailure {
    /// Nonce already used, underpriced replacement, or duplicate submission
    NonceConflict,
    Other,
}

impl BroadcastFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            BroadcastFailure::NonceConflict => "nonce_conflict",
            BroadcastFailure::Other => "other",
        }
    }
}

impl fmt::Display for BroadcastFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a broadcast error by its text
pub fn classify_broadcast_error(message: &str) -> BroadcastFailure {
    let lowered = message.to_lowercase();
    if NONCE_CONFLICT_PHRASES
        .iter()
        .any(|phrase| lowered.contains(phrase))
    {
        BroadcastFailure::NonceConflict
    } else {
        BroadcastFailure::Other
    }
}

/// Result of one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    Submitted(H256),
    Failed {
        kind: BroadcastFailure,
        message: String,
    },
}

/// Broadcasts signed transfers and keeps the nonce tracker consistent with the outcome
pub struct TransactionSender {
    finality: FinalityTracker,
}

impl TransactionSender {
    pub fn new(finality: FinalityTracker) -> Self {
        Self { finality }
    }

    /// Broadcast `signed` on behalf of `sender`.
    ///
    /// Accepted: the sender's nonce advances, then the confirmation wait runs
    /// if enabled. A timeout there is logged and does not change the outcome.
    /// Nonce conflict: the sender's nonce is resynced from the node.
    /// Anything else: reported without touching nonce state.
    /// The same signed bytes are never re-sent.
    pub async fn submit(
        &self,
        client: &dyn LedgerClient,
        nonces: &mut NonceTracker,
        sender: AccountLabel,
        signed: &SignedTransfer,
    ) -> SubmissionOutcome {
        let tx_hash = match client.send_raw_transaction(signed.raw.clone()).await {
            Ok(tx_hash) => tx_hash,
            Err(e) => {
                let message = e.to_string();
                let kind = classify_broadcast_error(&message);
                error!(
                    "Broadcast from account {} ({:?}) with nonce {} failed [{}]: {}",
                    sender, signed.from, signed.nonce, kind, message
                );
                crate::metrics::record_tx_failed(sender, kind);

                if kind == BroadcastFailure::NonceConflict {
                    nonces.resync(sender, signed.from, client).await;
                }
                return SubmissionOutcome::Failed { kind, message };
            }
        };

        info!(
            "Transfer submitted: {:?} from {:?} -> {:?} nonce={} gas={}",
            tx_hash, signed.from, signed.to, signed.nonce, signed.gas_limit
        );
        if tx_hash != signed.tx_hash {
            warn!(
                "Node returned hash {:?}, locally computed {:?}",
                tx_hash, signed.tx_hash
            );
        }
        crate::metrics::record_tx_submitted(sender);

        if let Err(e) = nonces.advance(sender) {
            // Only reachable if the account was never initialized
            error!("Could not advance nonce for account {}: {}", sender, e);
        }

        if self.finality.policy().is_enabled() {
            self.await_confirmation(client, tx_hash).await;
        }

        SubmissionOutcome::Submitted(tx_hash)
    }

    async fn await_confirmation(&self, client: &dyn LedgerClient, tx_hash: H256) {
        match self.finality.wait(client, tx_hash).await {
            ConfirmationStatus::Confirmed {
                block_number,
                status,
                confirmations,
            } => {
                let status_label = match status {
                    Some(1) => "success",
                    Some(_) => "reverted",
                    None => "unknown",
                };
                if status == Some(0) {
                    warn!(
                        "  Transfer {:?} reverted in block {}",
                        tx_hash, block_number
                    );
                } else {
                    info!(
                        "  Confirmed: block {} status {:?} ({} confirmations)",
                        block_number, status, confirmations
                    );
                }
                crate::metrics::record_confirmation(status_label);
            }
            ConfirmationStatus::TimedOut => {
                info!(
                    "  Receipt wait timed out after {:?}, continuing ({:?} presumed pending)",
                    self.finality.policy().timeout,
                    tx_hash
                );
                crate::metrics::record_confirmation_timeout();
            }
        }
    }
}
