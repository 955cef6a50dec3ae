//! Servdiscovery agent entry point.

use std::sync::Arc;

use anyhow::Context;
use futures_util::future::join_all;
use log::{error, info, warn};
use tokio::signal;
use tokio::sync::watch;

mod config;
mod diff;
mod discovery;
mod error;
mod labels;
mod notifier;
mod runtime;
mod state;
mod types;

use config::{Config, DEFAULT_LOG_FILTER};
use discovery::Scheduler;
use labels::HostExtractor;
use notifier::HttpNotifier;
use runtime::DockerSource;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    let cfg = Config::load()?;

    // Initialize logging; RUST_LOG wins over LOG_LEVEL
    let log_filter = cfg.log_filter();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter.unwrap_or(DEFAULT_LOG_FILTER)),
    )
    .init();
    if log_filter.is_none() {
        warn!(
            "Unknown LOG_LEVEL {:?}, falling back to {}",
            cfg.log_level, DEFAULT_LOG_FILTER
        );
    }
    info!("Starting servdiscovery with config: {:?}", cfg);

    // Container Runtime (Docker)
    let source = DockerSource::connect()
        .await
        .context("Could not connect to Docker daemon")?;

    let notifier = HttpNotifier::new(
        cfg.server_name.clone(),
        cfg.endpoint.clone(),
        cfg.endpoint_key.clone(),
    )?;
    let extractor = HostExtractor::new(&cfg.router_prefix)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = Scheduler::new(
        Arc::new(source),
        Arc::new(notifier),
        extractor,
        cfg.discovery_period(),
        cfg.alive_period(),
    )
    .spawn(shutdown_rx);

    // Graceful Shutdown
    shutdown_signal().await;
    info!("Shutdown signal received");

    // Let in-flight cycles finish
    let _ = shutdown_tx.send(true);
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("Discovery task failed: {}", e);
        }
    }

    info!("Server exited gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("Unable to listen for shutdown signal: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!("Unable to listen for SIGTERM: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
