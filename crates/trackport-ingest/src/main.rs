//! Trackport - shipment tracking ingestion service

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tracing::{error, info};
use trackport_common::logging::{init_logging, LogLevel};
use trackport_ingest::{Config, Pipeline};

#[derive(Parser, Debug)]
#[command(name = "trackport")]
#[command(author, version, about = "Shipment tracking batch ingestion service")]
struct Cli {
    /// Configuration file
    #[arg(short, long, env = "TRACKPORT_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env may provide TRACKPORT_CONFIG, so load it before parsing arguments
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = Config::load(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    if cli.verbose {
        config.log.level = LogLevel::Debug;
    }

    let _log_guard = init_logging(&config.log)?;

    info!(
        config = %cli.config.display(),
        version = env!("CARGO_PKG_VERSION"),
        "Starting trackport"
    );

    let pipeline = match Pipeline::start(&config).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "Failed to start ingestion pipeline");
            return Err(e.into());
        },
    };

    shutdown_signal().await;
    pipeline.shutdown().await;

    info!("Shutdown complete");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
