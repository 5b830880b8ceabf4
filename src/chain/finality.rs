//! Confirmation tracking for submitted transfers
//!
//! A transfer counts as confirmed once its receipt is visible and the head
//! block is at least `confirmations - 1` blocks past the including block.
//! The whole wait is bounded; running out of time is not a failure, the
//! transaction is simply presumed still pending.

use super::LedgerClient;
use crate::config::ConfirmationConfig;

use ethers::types::H256;
use std::time::Duration;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tracing::debug;

/// How long and how deep to wait after a successful broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    /// Required depth; 0 disables waiting
    pub confirmations: u64,
    /// Bound on the whole wait
    pub timeout: Duration,
    /// Delay between receipt polls
    pub poll_interval: Duration,
}

impl ConfirmationPolicy {
    pub fn is_enabled(&self) -> bool {
        self.confirmations > 0
    }
}

impl From<&ConfirmationConfig> for ConfirmationPolicy {
    fn from(config: &ConfirmationConfig) -> Self {
        Self {
            confirmations: config.wait_for_confirmations,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
        }
    }
}

/// Result of waiting on a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationStatus {
    /// Included at `block_number`; `status` is the receipt status (1 success, 0 reverted)
    Confirmed {
        block_number: u64,
        status: Option<u64>,
        confirmations: u64,
    },
    /// Bound exceeded before the required depth was observed
    TimedOut,
}

/// Polls the ledger until a transfer reaches the configured depth
pub struct FinalityTracker {
    policy: ConfirmationPolicy,
}

impl FinalityTracker {
    pub fn new(policy: ConfirmationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    /// Wait for `tx_hash` within the policy bound
    pub async fn wait(&self, client: &dyn LedgerClient, tx_hash: H256) -> ConfirmationStatus {
        match timeout(self.policy.timeout, self.poll(client, tx_hash)).await {
            Ok(status) => status,
            Err(_) => ConfirmationStatus::TimedOut,
        }
    }

    async fn poll(&self, client: &dyn LedgerClient, tx_hash: H256) -> ConfirmationStatus {
        let mut ticker = interval(self.policy.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        // (block number, receipt status) once the receipt is seen
        let mut included: Option<(u64, Option<u64>)> = None;

        loop {
            ticker.tick().await;

            if included.is_none() {
                match client.transaction_receipt(tx_hash).await {
                    Ok(Some(receipt)) => {
                        if let Some(block) = receipt.block_number {
                            included = Some((block.as_u64(), receipt.status.map(|s| s.as_u64())));
                        }
                    }
                    Ok(None) => {
                        debug!("Receipt for {:?} not available yet", tx_hash);
                    }
                    Err(e) => {
                        debug!("Receipt query for {:?} failed: {}", tx_hash, e);
                    }
                }
            }

            let Some((block_number, status)) = included else {
                continue;
            };

            if self.policy.confirmations <= 1 {
                return ConfirmationStatus::Confirmed {
                    block_number,
                    status,
                    confirmations: 1,
                };
            }

            match client.block_number().await {
                Ok(head) => {
                    let depth = head.saturating_sub(block_number) + 1;
                    if depth >= self.policy.confirmations {
                        return ConfirmationStatus::Confirmed {
                            block_number,
                            status,
                            confirmations: depth,
                        };
                    }
                    debug!(
                        "Transaction {:?} has {} / {} confirmations",
                        tx_hash, depth, self.policy.confirmations
                    );
                }
                Err(e) => {
                    debug!("Head block query failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockLedgerClient;
    use crate::error::PingPongError;

    use ethers::types::{TransactionReceipt, U64};
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::sync::Arc;

    fn policy(confirmations: u64) -> ConfirmationPolicy {
        ConfirmationPolicy {
            confirmations,
            timeout: Duration::from_millis(200),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn receipt(block: u64, status: u64) -> TransactionReceipt {
        TransactionReceipt {
            block_number: Some(U64::from(block)),
            status: Some(U64::from(status)),
            ..Default::default()
        }
    }

    #[test]
    fn test_policy_from_config() {
        let policy = ConfirmationPolicy::from(&ConfirmationConfig::default());
        assert_eq!(policy.confirmations, 1);
        assert_eq!(policy.timeout, Duration::from_secs(120));
        assert_eq!(policy.poll_interval, Duration::from_secs(2));
        assert!(policy.is_enabled());

        let disabled = ConfirmationPolicy {
            confirmations: 0,
            ..policy
        };
        assert!(!disabled.is_enabled());
    }

    #[tokio::test]
    async fn test_receipt_after_a_few_polls() {
        let polls = Arc::new(AtomicUsize::new(0));
        let mut client = MockLedgerClient::new();
        {
            let polls = polls.clone();
            client.expect_transaction_receipt().returning(move |_| {
                if polls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Ok(None)
                } else {
                    Ok(Some(receipt(42, 1)))
                }
            });
        }
        client.expect_block_number().never();

        let tracker = FinalityTracker::new(policy(1));
        let status = tracker.wait(&client, H256::repeat_byte(0xab)).await;

        assert_eq!(
            status,
            ConfirmationStatus::Confirmed {
                block_number: 42,
                status: Some(1),
                confirmations: 1,
            }
        );
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_reverted_receipt_is_still_confirmed() {
        let mut client = MockLedgerClient::new();
        client
            .expect_transaction_receipt()
            .returning(|_| Ok(Some(receipt(7, 0))));

        let tracker = FinalityTracker::new(policy(1));
        let status = tracker.wait(&client, H256::zero()).await;

        assert!(matches!(
            status,
            ConfirmationStatus::Confirmed {
                block_number: 7,
                status: Some(0),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_times_out_without_receipt() {
        let mut client = MockLedgerClient::new();
        client.expect_transaction_receipt().returning(|_| Ok(None));

        let tracker = FinalityTracker::new(ConfirmationPolicy {
            confirmations: 1,
            timeout: Duration::from_millis(30),
            poll_interval: Duration::from_millis(5),
        });

        assert_eq!(
            tracker.wait(&client, H256::zero()).await,
            ConfirmationStatus::TimedOut
        );
    }

    #[tokio::test]
    async fn test_query_errors_keep_polling() {
        let polls = Arc::new(AtomicUsize::new(0));
        let mut client = MockLedgerClient::new();
        {
            let polls = polls.clone();
            client.expect_transaction_receipt().returning(move |_| {
                if polls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(PingPongError::Timeout {
                        operation: "eth_getTransactionReceipt".to_string(),
                    })
                } else {
                    Ok(Some(receipt(5, 1)))
                }
            });
        }

        let tracker = FinalityTracker::new(policy(1));
        assert!(matches!(
            tracker.wait(&client, H256::zero()).await,
            ConfirmationStatus::Confirmed { block_number: 5, .. }
        ));
    }

    #[tokio::test]
    async fn test_waits_for_depth() {
        let head = Arc::new(AtomicU64::new(10));
        let mut client = MockLedgerClient::new();
        client
            .expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(Some(receipt(10, 1))));
        {
            let head = head.clone();
            client
                .expect_block_number()
                .returning(move || Ok(head.fetch_add(1, Ordering::SeqCst)));
        }

        let tracker = FinalityTracker::new(policy(3));
        let status = tracker.wait(&client, H256::zero()).await;

        assert_eq!(
            status,
            ConfirmationStatus::Confirmed {
                block_number: 10,
                status: Some(1),
                confirmations: 3,
            }
        );
        // head was read as 10, 11, 12
        assert_eq!(head.load(Ordering::SeqCst), 13);
    }
}
