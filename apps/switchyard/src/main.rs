//! Switchyard service entry point
//!
//! Loads configuration from the environment, initializes the connection pool
//! manager and the integration router, keeps the registry fresh in the
//! background, and shuts everything down on Ctrl-C.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use switchyard_core::{source_for, SwitchyardConfig};
use switchyard_gateway::{IntegrationRouter, RefreshScheduler};
use switchyard_storage::ConnectionPoolManager;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Daily-rotated log files land here
fn logs_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("switchyard")
        .join("logs")
}

/// Stdout plus a daily `switchyard.log.<date>` file; `RUST_LOG` overrides the filter.
fn init_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir(), "switchyard.log"));

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,switchyard=debug,sqlx=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().compact())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional; real environment variables win
    dotenvy::dotenv().ok();

    let _log_guard = init_tracing();
    info!("Starting Switchyard v{}", env!("CARGO_PKG_VERSION"));
    info!("Logs directory: {}", logs_dir().display());

    let config = SwitchyardConfig::from_env();

    let pool = Arc::new(ConnectionPoolManager::initialize(&config.pool).await);
    let health = pool.health_check().await;
    info!("[PoolManager] Health: {}", serde_json::to_string(&health)?);

    let refresh_interval = config.router.refresh_interval;
    let source = source_for(&config.router.registry);
    let router = match IntegrationRouter::load(config.router, source).await {
        Ok(router) => Arc::new(router),
        Err(e) => {
            pool.shutdown().await;
            return Err(e).context("Initial registry load failed");
        }
    };

    let cancel = CancellationToken::new();
    let scheduler = RefreshScheduler::spawn(Arc::clone(&router), refresh_interval, cancel.clone());

    let status = router.get_tool_status().await;
    let healthy = status.iter().filter(|s| s.healthy).count();
    info!(
        "[Router] {} tools registered, {} endpoints healthy",
        status.len(),
        healthy
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutdown requested");

    cancel.cancel();
    if let Err(e) = scheduler.await {
        warn!("[Router] Refresh scheduler ended abnormally: {}", e);
    }
    pool.shutdown().await;

    info!("Switchyard stopped");
    Ok(())
}
