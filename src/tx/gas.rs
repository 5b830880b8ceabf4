//! Gas limit estimation for plain value transfers

use crate::chain::LedgerClient;

use ethers::types::{Address, U256};
use tracing::{debug, warn};

/// Intrinsic gas of a value transfer to an account without code.
///
/// Used when simulation fails. It under-provisions any transfer whose
/// recipient is a contract; recipients here are always the other account.
pub const PLAIN_TRANSFER_GAS: u64 = 21_000;

/// Margin added on top of the simulated gas usage
pub const GAS_LIMIT_BUFFER_PERCENT: u64 = 10;

/// Gas limit estimator for transfers
pub struct GasLimitEstimator {
    /// Buffer percentage for gas limit (e.g., 10 = 10% buffer)
    gas_limit_buffer_percent: u64,
}

impl GasLimitEstimator {
    pub fn new() -> Self {
        Self {
            gas_limit_buffer_percent: GAS_LIMIT_BUFFER_PERCENT,
        }
    }

    /// Gas limit for sending `value` from `from` to `to`.
    ///
    /// Returns the buffered simulation result, or `PLAIN_TRANSFER_GAS` when the
    /// simulation errors. Never fails.
    pub async fn estimate(
        &self,
        client: &dyn LedgerClient,
        from: Address,
        to: Address,
        value: U256,
    ) -> U256 {
        match client.estimate_transfer_gas(from, to, value).await {
            Ok(estimated) => {
                let limit = self.apply_buffer(estimated);
                debug!("Estimated gas {} -> limit {}", estimated, limit);
                limit
            }
            Err(e) => {
                warn!(
                    "Gas estimation failed, falling back to {}: {}",
                    PLAIN_TRANSFER_GAS, e
                );
                crate::metrics::record_gas_fallback();
                U256::from(PLAIN_TRANSFER_GAS)
            }
        }
    }

    /// `floor(estimated * 1.1)`
    pub fn apply_buffer(&self, estimated: U256) -> U256 {
        estimated * (100 + self.gas_limit_buffer_percent) / 100
    }
}

impl Default for GasLimitEstimator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockLedgerClient;
    use crate::error::PingPongError;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_buffered_estimate() {
        let from = Address::repeat_byte(0x0a);
        let to = Address::repeat_byte(0x0b);
        let value = U256::from(1_000u64);

        let mut client = MockLedgerClient::new();
        client
            .expect_estimate_transfer_gas()
            .with(eq(from), eq(to), eq(value))
            .times(1)
            .returning(|_, _, _| Ok(U256::from(100_000u64)));

        let limit = GasLimitEstimator::new()
            .estimate(&client, from, to, value)
            .await;

        assert_eq!(limit, U256::from(110_000u64));
    }

    #[tokio::test]
    async fn test_fallback_on_simulation_failure() {
        let mut client = MockLedgerClient::new();
        client
            .expect_estimate_transfer_gas()
            .returning(|_, _, _| Err(PingPongError::GasEstimation("execution reverted".to_string())));

        let limit = GasLimitEstimator::new()
            .estimate(&client, Address::zero(), Address::zero(), U256::one())
            .await;

        assert_eq!(limit, U256::from(21_000u64));
    }

    #[test]
    fn test_buffer_rounds_down() {
        // 21001 * 1.1 = 23101.1
        assert_eq!(
            GasLimitEstimator::new().apply_buffer(U256::from(21_001u64)),
            U256::from(23_101u64)
        );
    }
}
