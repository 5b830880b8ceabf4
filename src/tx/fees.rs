//! Fee parameters for the next transfer, derived fresh from the latest block

use crate::chain::LedgerClient;
use crate::error::PingPongResult;

use ethers::types::U256;
use tracing::{debug, warn};

/// Priority fee used when the node cannot recommend one: 2 gwei
pub const FALLBACK_PRIORITY_FEE_WEI: u64 = 2_000_000_000;

/// Max fee is this percentage of the base fee, plus the priority fee.
/// 250 leaves headroom for several consecutive base fee increases while the
/// transfer waits for inclusion.
pub const BASE_FEE_MULTIPLIER_PERCENT: u64 = 250;

/// Fee fields of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeParams {
    Eip1559 {
        max_fee_per_gas: U256,
        max_priority_fee_per_gas: U256,
    },
    Legacy {
        gas_price: U256,
    },
}

/// Fee estimator. Never caches; each attempt reads current conditions.
pub struct FeeEstimator {
    base_fee_multiplier_percent: u64,
    fallback_priority_fee: U256,
}

impl FeeEstimator {
    pub fn new() -> Self {
        Self {
            base_fee_multiplier_percent: BASE_FEE_MULTIPLIER_PERCENT,
            fallback_priority_fee: U256::from(FALLBACK_PRIORITY_FEE_WEI),
        }
    }

    /// Fee parameters for the current fee regime.
    ///
    /// Base fee and legacy gas price failures propagate and abort the cycle;
    /// only the priority fee recommendation has a fallback.
    pub async fn estimate(&self, client: &dyn LedgerClient) -> PingPongResult<FeeParams> {
        let fees = match client.latest_base_fee().await? {
            Some(base_fee) => {
                let priority_fee = match client.max_priority_fee().await {
                    Ok(fee) => fee,
                    Err(e) => {
                        warn!(
                            "Priority fee unavailable ({}), using fallback {} wei",
                            e, self.fallback_priority_fee
                        );
                        self.fallback_priority_fee
                    }
                };
                self.dynamic_fees(base_fee, priority_fee)
            }
            None => FeeParams::Legacy {
                gas_price: client.legacy_gas_price().await?,
            },
        };

        debug!("Fee parameters: {:?}", fees);
        Ok(fees)
    }

    /// `max_fee = floor(base_fee * 2.5) + priority_fee`
    pub fn dynamic_fees(&self, base_fee: U256, priority_fee: U256) -> FeeParams {
        let max_fee = base_fee * self.base_fee_multiplier_percent / 100 + priority_fee;
        FeeParams::Eip1559 {
            max_fee_per_gas: max_fee,
            max_priority_fee_per_gas: priority_fee,
        }
    }
}

impl Default for FeeEstimator {
    fn default() -> Self {
        Self::new()
    }
}
