//! ETH ping-pong - alternating transfers between two accounts
//!
//! Sends a fixed amount from A to B, waits a random interval, sends it back
//! from B to A, and repeats until interrupted.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod chain;
mod config;
mod coordination;
mod error;
mod metrics;
mod tx;

use chain::{ChainProvider, ConfirmationPolicy, LedgerClient};
use config::Settings;
use coordination::{Account, AccountLabel, CycleOutcome, DelaySchedule, PingPongEngine};
use metrics::MetricsServer;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine; the variables may come from the environment
    dotenv::dotenv().ok();

    // Initialize logging
    init_logging();

    info!("Starting ETH ping-pong v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load().context("Failed to load configuration")?;
    let (wallet_a, wallet_b) = settings.wallets()?;
    let account_a = Account::new(AccountLabel::A, wallet_a);
    let account_b = Account::new(AccountLabel::B, wallet_b);
    let amount = settings.amount_wei()?;
    let schedule = DelaySchedule::from(&settings.transfer);
    let confirmation = ConfirmationPolicy::from(&settings.confirmation);

    info!("Wallet A: {:?}", account_a.address());
    info!("Wallet B: {:?}", account_b.address());
    info!(
        "Amount: {} ETH, delay range: {}-{} sec, confirmations: {}",
        settings.transfer.amount_eth,
        settings.transfer.min_delay_secs,
        settings.transfer.max_delay_secs,
        confirmation.confirmations
    );

    // Unreachable node is fatal
    let provider = ChainProvider::connect(&settings.rpc.url, settings.request_timeout())
        .await
        .context("Cannot connect to RPC endpoint, check RPC_URL")?;
    let client: Arc<dyn LedgerClient> = Arc::new(provider);

    let mut engine = match PingPongEngine::new(client, account_a, account_b, amount, confirmation).await {
        Ok(engine) => engine,
        Err(e) if e.is_fatal() => return Err(e).context("Lost connection to RPC endpoint during startup"),
        Err(e) => return Err(e).context("Failed to initialize accounts"),
    };
    info!("Chain id: {}", engine.chain_id());
    engine.report_balances().await;

    // Start metrics server
    let metrics_handle = if settings.metrics.enabled {
        let server = MetricsServer::new(settings.metrics.port);
        Some(tokio::spawn(async move {
            if let Err(e) = server.run().await {
                error!("Metrics server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Running. Press Ctrl+C to stop.");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            report = engine.run_one_cycle() => {
                if let CycleOutcome::Rejected { kind, .. } = &report.outcome {
                    info!("Cycle {} ({}) sent nothing: {}", report.cycle, report.direction, kind);
                }
            }
        }

        let delay = schedule.next_delay();
        info!("Waiting {:.2} sec before next transfer...", delay.as_secs_f64());

        tokio::select! {
            _ = &mut shutdown => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    let nonces = engine.nonces();
    info!(
        "Stopped by user after {} cycles (next nonces A={:?} B={:?})",
        engine.cycle(),
        nonces.next_for(AccountLabel::A).ok(),
        nonces.next_for(AccountLabel::B).ok()
    );

    if let Some(h) = metrics_handle {
        h.abort();
    }

    Ok(())
}

fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,eth_pingpong=debug,hyper=warn,reqwest=warn")
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
