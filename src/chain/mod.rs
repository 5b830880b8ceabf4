//! Chain module - the ledger node as seen by the transfer loop
//!
//! This module provides:
//! - The `LedgerClient` collaborator interface used by every transaction stage
//! - `ChainProvider`, an ethers HTTP implementation with bounded request times
//! - Confirmation-depth tracking for submitted transfers

pub mod finality;
pub mod provider;

pub use finality::{ConfirmationPolicy, ConfirmationStatus, FinalityTracker};
pub use provider::ChainProvider;

use crate::error::PingPongResult;

use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, H256, U256};

/// Everything the transfer loop needs from a ledger node
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Chain identifier used for replay protection
    async fn chain_id(&self) -> PingPongResult<u64>;

    /// Next usable nonce for `address`, counting transactions still in the pool
    async fn pending_nonce(&self, address: Address) -> PingPongResult<u64>;

    /// Base fee of the latest block, `None` on networks without dynamic fees
    async fn latest_base_fee(&self) -> PingPongResult<Option<U256>>;

    /// Node-recommended priority fee
    async fn max_priority_fee(&self) -> PingPongResult<U256>;

    /// Legacy scalar gas price
    async fn legacy_gas_price(&self) -> PingPongResult<U256>;

    /// Simulate a plain value transfer and return the gas it would use
    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> PingPongResult<U256>;

    /// Broadcast signed transaction bytes, returning the transaction hash
    async fn send_raw_transaction(&self, raw: Bytes) -> PingPongResult<H256>;

    /// Receipt for `tx_hash`, `None` while the transaction is not yet included
    async fn transaction_receipt(&self, tx_hash: H256) -> PingPongResult<Option<TransactionReceipt>>;

    /// Current head block number
    async fn block_number(&self) -> PingPongResult<u64>;

    /// Balance of `address` in wei
    async fn balance(&self, address: Address) -> PingPongResult<U256>;
}
