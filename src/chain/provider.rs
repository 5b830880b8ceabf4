//! Chain provider backed by an ethers HTTP transport with bounded request times

use super::LedgerClient;
use crate::error::{PingPongError, PingPongResult};

use async_trait::async_trait;
use ethers::prelude::*;
use ethers::providers::{Http, Provider, ProviderError};
use ethers::types::transaction::eip2718::TypedTransaction;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info};

/// Single-endpoint provider; every call is bounded by `request_timeout`
pub struct ChainProvider {
    /// RPC endpoint, kept for log context
    url: String,
    /// HTTP provider
    http: Provider<Http>,
    /// Upper bound on any single RPC round trip
    request_timeout: Duration,
}

impl ChainProvider {
    /// Create a provider and confirm the endpoint answers.
    ///
    /// Any failure here is a `ChainConnection` error; the caller must not enter
    /// the transfer loop without a reachable node.
    pub async fn connect(url: &str, request_timeout: Duration) -> PingPongResult<Self> {
        let http = Provider::<Http>::try_from(url)
            .map_err(|e| PingPongError::ChainConnection {
                message: format!("Invalid RPC URL: {}", e),
            })?
            .interval(Duration::from_millis(100));

        let provider = Self {
            url: url.to_string(),
            http,
            request_timeout,
        };

        let chain_id = provider
            .chain_id()
            .await
            .map_err(|e| PingPongError::ChainConnection {
                message: format!("RPC endpoint unreachable: {}", e),
            })?;

        info!("Connected to {} (chain id {})", provider.url, chain_id);
        Ok(provider)
    }

    /// Run one RPC future under the request bound
    async fn bounded<T, F>(&self, operation: &str, fut: F) -> PingPongResult<Result<T, ProviderError>>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        timeout(self.request_timeout, fut)
            .await
            .map_err(|_| PingPongError::Timeout {
                operation: operation.to_string(),
            })
    }
}

#[async_trait]
impl LedgerClient for ChainProvider {
    async fn chain_id(&self) -> PingPongResult<u64> {
        let id = self
            .bounded("eth_chainId", self.http.get_chainid())
            .await?
            .map_err(|e| PingPongError::ChainConnection {
                message: e.to_string(),
            })?;
        Ok(id.as_u64())
    }

    async fn pending_nonce(&self, address: Address) -> PingPongResult<u64> {
        let count = self
            .bounded(
                "eth_getTransactionCount",
                self.http
                    .get_transaction_count(address, Some(BlockNumber::Pending.into())),
            )
            .await?
            .map_err(|e| PingPongError::Nonce {
                account: format!("{:?}", address),
                message: e.to_string(),
            })?;
        Ok(count.as_u64())
    }

    async fn latest_base_fee(&self) -> PingPongResult<Option<U256>> {
        let block = self
            .bounded("eth_getBlockByNumber", self.http.get_block(BlockNumber::Latest))
            .await?
            .map_err(|e| PingPongError::FeeQuery(e.to_string()))?
            .ok_or_else(|| PingPongError::FeeQuery("No latest block".to_string()))?;

        debug!(
            "Latest block {:?} base fee {:?}",
            block.number, block.base_fee_per_gas
        );
        Ok(block.base_fee_per_gas)
    }

    async fn max_priority_fee(&self) -> PingPongResult<U256> {
        self.bounded(
            "eth_maxPriorityFeePerGas",
            self.http.request::<_, U256>("eth_maxPriorityFeePerGas", ()),
        )
        .await?
        .map_err(|e| PingPongError::FeeQuery(e.to_string()))
    }

    async fn legacy_gas_price(&self) -> PingPongResult<U256> {
        self.bounded("eth_gasPrice", self.http.get_gas_price())
            .await?
            .map_err(|e| PingPongError::FeeQuery(e.to_string()))
    }

    async fn estimate_transfer_gas(
        &self,
        from: Address,
        to: Address,
        value: U256,
    ) -> PingPongResult<U256> {
        let tx: TypedTransaction = TransactionRequest::new()
            .from(from)
            .to(to)
            .value(value)
            .into();

        self.bounded("eth_estimateGas", self.http.estimate_gas(&tx, None))
            .await?
            .map_err(|e| PingPongError::GasEstimation(e.to_string()))
    }

    async fn send_raw_transaction(&self, raw: Bytes) -> PingPongResult<H256> {
        self.bounded("eth_sendRawTransaction", async {
            self.http
                .send_raw_transaction(raw)
                .await
                .map(|pending| pending.tx_hash())
        })
        .await?
        .map_err(|e| PingPongError::Broadcast(e.to_string()))
    }

    async fn transaction_receipt(&self, tx_hash: H256) -> PingPongResult<Option<TransactionReceipt>> {
        self.bounded(
            "eth_getTransactionReceipt",
            self.http.get_transaction_receipt(tx_hash),
        )
        .await?
        .map_err(|e| PingPongError::ChainConnection {
            message: e.to_string(),
        })
    }

    async fn block_number(&self) -> PingPongResult<u64> {
        let block = self
            .bounded("eth_blockNumber", self.http.get_block_number())
            .await?
            .map_err(|e| PingPongError::ChainConnection {
                message: e.to_string(),
            })?;
        Ok(block.as_u64())
    }

    async fn balance(&self, address: Address) -> PingPongResult<U256> {
        self.bounded("eth_getBalance", self.http.get_balance(address, None))
            .await?
            .map_err(|e| PingPongError::ChainConnection {
                message: e.to_string(),
            })
    }
}
