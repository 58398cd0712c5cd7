//! Balance Watch - Entry Point
//!
//! 1. Loads `.env`, configuration and credentials
//! 2. Builds the metrics registry, health aggregator and collaborators
//! 3. Runs the check scheduler and the health/metrics server side by side
//! 4. On Ctrl+C, stops both gracefully

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use balance_watch::adapters::{EthRpcSource, TelegramNotifier};
use balance_watch::config::{self, constants, Credentials};
use balance_watch::core::{init_logging, HealthAggregator, MetricsRegistry, Scheduler, SchedulerConfig};
use balance_watch::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();

    // Configuration errors surface before logging is up, so print them directly
    let config_path = constants::config_path();
    let config = match config::load_config(Path::new(&config_path)) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config.log_level);
    info!(config_path = %config_path, "🚀 Balance watch starting...");

    let credentials = match Credentials::from_env() {
        Ok(creds) => creds,
        Err(e) => {
            error!("[ERROR] {}", e);
            std::process::exit(1);
        }
    };

    config.log_summary();

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to build metrics registry")?);
    let health = Arc::new(HealthAggregator::with_metrics(metrics.clone()));

    let source = EthRpcSource::new(credentials.rpc_url.clone(), config.token_contracts.clone())
        .with_metrics(metrics.clone());
    let notifier = TelegramNotifier::new(
        credentials.telegram_bot_token.clone(),
        credentials.telegram_chat_id.clone(),
    );

    let mut scheduler = Scheduler::new(
        source,
        notifier,
        config.targets(),
        health.clone(),
        metrics.clone(),
        SchedulerConfig::from_app_config(&config),
    );

    let cancel = CancellationToken::new();

    // Spawn SIGINT handler task
    let shutdown_signal = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("[SHUTDOWN] Graceful shutdown initiated");
                shutdown_signal.cancel();
            }
            Err(err) => {
                error!("Failed to listen for Ctrl+C signal: {}", err);
            }
        }
    });

    let server_state = AppState {
        health: health.clone(),
        metrics: metrics.clone(),
    };
    let bind_address = config.api.bind_address();
    let server_cancel = cancel.clone();
    let server_handle = tokio::spawn(async move {
        server::start_server(server_state, &bind_address, server_cancel).await
    });

    let scheduler_cancel = cancel.clone();
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(scheduler_cancel).await;
    });

    // A server that fails to bind ends the process; the scheduler only stops on cancel
    let server_result = server_handle.await;
    cancel.cancel();
    scheduler_handle.await.context("Scheduler task panicked")?;

    match server_result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!(error = %e, "[SERVER] Server failed");
            return Err(e);
        }
        Err(e) => return Err(e).context("Server task panicked"),
    }

    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
