//! Alternation engine: one transfer per cycle, direction flipping every cycle

use super::accounts::{Account, AccountLabel, Direction};
use crate::chain::{ConfirmationPolicy, FinalityTracker, LedgerClient};
use crate::error::PingPongResult;
use crate::tx::{
    BroadcastFailure, FeeEstimator, GasLimitEstimator, NonceTracker, SubmissionOutcome,
    TransactionSender, TransferRequest,
};

use ethers::types::{H256, U256};
use ethers::utils::format_ether;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What happened in one cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Broadcast accepted by the node
    Submitted { tx_hash: H256 },
    /// Broadcast rejected by the node
    Rejected {
        kind: BroadcastFailure,
        message: String,
    },
    /// A stage before broadcast failed; nothing was sent
    Aborted { message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub cycle: u64,
    pub direction: Direction,
    pub outcome: CycleOutcome,
}

/// Drives the transfer pipeline for alternating senders
pub struct PingPongEngine {
    /// Ledger access shared by every stage
    client: Arc<dyn LedgerClient>,
    account_a: Account,
    account_b: Account,
    /// Amount per transfer in wei
    amount: U256,
    /// Fetched once at startup
    chain_id: u64,
    nonces: NonceTracker,
    fee_estimator: FeeEstimator,
    gas_estimator: GasLimitEstimator,
    tx_sender: TransactionSender,
    /// Next cycle to run
    cycle: u64,
}

impl PingPongEngine {
    /// Create the engine, reading the chain id and both accounts' pending nonces.
    ///
    /// Errors here happen before any transfer and should stop the process.
    pub async fn new(
        client: Arc<dyn LedgerClient>,
        account_a: Account,
        account_b: Account,
        amount: U256,
        confirmation: ConfirmationPolicy,
    ) -> PingPongResult<Self> {
        let chain_id = client.chain_id().await?;

        let mut nonces = NonceTracker::new();
        let nonce_a = nonces
            .initialize(account_a.label(), account_a.address(), client.as_ref())
            .await?;
        let nonce_b = nonces
            .initialize(account_b.label(), account_b.address(), client.as_ref())
            .await?;
        info!("Initial nonces: A={} B={}", nonce_a, nonce_b);

        Ok(Self {
            client,
            account_a,
            account_b,
            amount,
            chain_id,
            nonces,
            fee_estimator: FeeEstimator::new(),
            gas_estimator: GasLimitEstimator::new(),
            tx_sender: TransactionSender::new(FinalityTracker::new(confirmation)),
            cycle: 0,
        })
    }

    /// Log both balances; failures only warn
    pub async fn report_balances(&self) {
        for account in [&self.account_a, &self.account_b] {
            match self.client.balance(account.address()).await {
                Ok(balance) => {
                    let balance_eth = format_ether(balance);
                    info!(
                        "Wallet {} {:?} balance: {} ETH",
                        account.label(),
                        account.address(),
                        balance_eth
                    );
                    crate::metrics::record_wallet_balance(
                        account.label(),
                        balance_eth.parse().unwrap_or(0.0),
                    );
                }
                Err(e) => {
                    warn!("Balance query for account {} failed: {}", account.label(), e);
                }
            }
        }
    }

    /// Run a single cycle.
    ///
    /// Never returns an error: every failure is logged and folded into the
    /// report. The cycle counter advances either way, so a failed A -> B is
    /// still followed by B -> A.
    pub async fn run_one_cycle(&mut self) -> CycleReport {
        let cycle = self.cycle;
        let direction = Direction::for_cycle(cycle);
        self.cycle += 1;
        crate::metrics::record_cycle();

        info!(
            "Cycle {}: sending {} ETH {}",
            cycle,
            format_ether(self.amount),
            direction
        );

        let outcome = match self.transfer(direction).await {
            Ok(SubmissionOutcome::Submitted(tx_hash)) => CycleOutcome::Submitted { tx_hash },
            Ok(SubmissionOutcome::Failed { kind, message }) => {
                CycleOutcome::Rejected { kind, message }
            }
            Err(e) => {
                error!("Cycle {} ({}) aborted: {}", cycle, direction, e);
                CycleOutcome::Aborted {
                    message: e.to_string(),
                }
            }
        };

        CycleReport {
            cycle,
            direction,
            outcome,
        }
    }

    async fn transfer(&mut self, direction: Direction) -> PingPongResult<SubmissionOutcome> {
        let client = self.client.as_ref();
        let (sender, receiver) = match direction.sender {
            AccountLabel::A => (&self.account_a, &self.account_b),
            AccountLabel::B => (&self.account_b, &self.account_a),
        };

        let nonce = self.nonces.next_for(sender.label())?;
        let gas_limit = self
            .gas_estimator
            .estimate(client, sender.address(), receiver.address(), self.amount)
            .await;
        let fees = self.fee_estimator.estimate(client).await?;

        let request = TransferRequest {
            from: sender.address(),
            to: receiver.address(),
            value: self.amount,
            nonce,
            chain_id: self.chain_id,
            gas_limit,
            fees,
        };
        let signed = request.sign(sender.wallet())?;

        Ok(self
            .tx_sender
            .submit(client, &mut self.nonces, sender.label(), &signed)
            .await)
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    pub fn nonces(&self) -> &NonceTracker {
        &self.nonces
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}
