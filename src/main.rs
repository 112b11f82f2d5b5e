//! SSO Broker Server: redundant backend pools and expiring state stores.
//!
//! Main entry point that loads configuration, builds every resource group and
//! store, and holds them until shutdown.

mod broker;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use broker_core::config::BrokerConfig;
use broker_core::error::BrokerError;
use broker_resource::PollingRegistry;
use broker_store::BackendRegistry;

use crate::broker::Broker;

/// SSO broker server
#[derive(Debug, Parser)]
#[command(name = "broker-server", version, about, long_about = None)]
struct Args {
    /// Directory holding `default.toml` and per-environment overlays
    #[arg(long, env = "BROKER_CONFIG_DIR", default_value = "config")]
    config_dir: String,

    /// Environment overlay to apply on top of the defaults
    #[arg(long, env = "BROKER_ENV", default_value = "development")]
    env: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_configuration(&args) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Broker error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from the config directory and environment
fn load_configuration(args: &Args) -> Result<BrokerConfig, BrokerError> {
    BrokerConfig::load(&args.config_dir, &args.env)
}

/// Initialize tracing/logging
fn init_logging(config: &BrokerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

/// Build everything, then wait for a shutdown signal
async fn run(config: BrokerConfig) -> Result<(), BrokerError> {
    tracing::info!("Starting SSO broker v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        groups = config.resource_groups.len(),
        stores = config.stores.len(),
        "Configuration loaded"
    );

    let polling = PollingRegistry::with_builtins();
    let backends = BackendRegistry::with_builtins();
    let broker = Broker::start(&config, &polling, &backends).await?;
    tracing::info!("SSO broker ready");

    shutdown_signal().await?;
    tracing::info!("Shutdown signal received, destroying stores and resource groups...");

    broker.shutdown().await;
    tracing::info!("SSO broker shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() -> Result<(), BrokerError> {
    #[cfg(unix)]
    {
        let mut terminate =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}
