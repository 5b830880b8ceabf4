//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Cycles run and transfer outcomes per sender
//! - Nonce resyncs and gas estimation fallbacks
//! - Confirmation results
//! - Wallet balances

use crate::coordination::AccountLabel;
use crate::error::{PingPongError, PingPongResult};
use crate::tx::BroadcastFailure;

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge_vec, Counter, CounterVec, Encoder,
    GaugeVec, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref CYCLES: Counter = register_counter!(
        "pingpong_cycles_total",
        "Total transfer cycles started"
    ).unwrap();

    // Transaction metrics
    pub static ref TX_SUBMITTED: CounterVec = register_counter_vec!(
        "pingpong_transfers_submitted_total",
        "Transfers accepted by the node",
        &["sender"]
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "pingpong_transfers_failed_total",
        "Transfers rejected by the node",
        &["sender", "kind"]
    ).unwrap();

    pub static ref NONCE_RESYNCS: CounterVec = register_counter_vec!(
        "pingpong_nonce_resyncs_total",
        "Nonce resynchronisations after a conflict",
        &["account", "outcome"]
    ).unwrap();

    pub static ref GAS_FALLBACKS: Counter = register_counter!(
        "pingpong_gas_estimate_fallbacks_total",
        "Gas limit estimations that fell back to the plain transfer cost"
    ).unwrap();

    // Confirmation metrics
    pub static ref CONFIRMATIONS: CounterVec = register_counter_vec!(
        "pingpong_confirmations_total",
        "Receipts observed by status",
        &["status"]
    ).unwrap();

    pub static ref CONFIRMATION_TIMEOUTS: Counter = register_counter!(
        "pingpong_confirmation_timeouts_total",
        "Receipt waits that ran out of time"
    ).unwrap();

    // Wallet metrics
    pub static ref WALLET_BALANCE: GaugeVec = register_gauge_vec!(
        "pingpong_wallet_balance_eth",
        "Wallet balance in ETH",
        &["account"]
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> PingPongResult<()> {
        let app = Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| PingPongError::Internal(format!("Failed to bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| PingPongError::Internal(format!("Metrics server failed: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn health_handler() -> &'static str {
    "ok"
}

fn render() -> PingPongResult<String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| PingPongError::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| PingPongError::Internal(e.to_string()))
}

// Helper functions to record metrics

pub fn record_cycle() {
    CYCLES.inc();
}

pub fn record_tx_submitted(sender: AccountLabel) {
    TX_SUBMITTED.with_label_values(&[sender.as_str()]).inc();
}

pub fn record_tx_failed(sender: AccountLabel, kind: BroadcastFailure) {
    TX_FAILED
        .with_label_values(&[sender.as_str(), kind.as_str()])
        .inc();
}

pub fn record_nonce_resync(account: AccountLabel, succeeded: bool) {
    NONCE_RESYNCS
        .with_label_values(&[account.as_str(), if succeeded { "ok" } else { "failed" }])
        .inc();
}

pub fn record_gas_fallback() {
    GAS_FALLBACKS.inc();
}

pub fn record_confirmation(status: &str) {
    CONFIRMATIONS.with_label_values(&[status]).inc();
}

pub fn record_confirmation_timeout() {
    CONFIRMATION_TIMEOUTS.inc();
}

pub fn record_wallet_balance(account: AccountLabel, balance_eth: f64) {
    WALLET_BALANCE
        .with_label_values(&[account.as_str()])
        .set(balance_eth);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_recorded_series() {
        record_tx_failed(AccountLabel::B, BroadcastFailure::NonceConflict);
        record_wallet_balance(AccountLabel::A, 1.5);

        let output = render().unwrap();
        assert!(output.contains("pingpong_transfers_failed_total"));
        assert!(output.contains("kind=\"nonce_conflict\""));
        assert!(output.contains("pingpong_wallet_balance_eth"));
    }
}
