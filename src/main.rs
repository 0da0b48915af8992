//! `evm-gateway` daemon.
//!
//! Connects to the configured node, registers the contract catalog, installs
//! the core event listeners and logs every event published on the outbound
//! channel until SIGINT/SIGTERM.

use std::path::PathBuf;

use tokio::sync::broadcast::error::RecvError;

use evm_gateway::config::load_config;
use evm_gateway::lifecycle::{wait_for_shutdown_signal, Gateway, Shutdown};
use evm_gateway::observability::{logging, metrics};

/// Environment variable naming the config file.
const CONFIG_ENV_VAR: &str = "GATEWAY_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/gateway.toml";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = load_config(&path)?;
    logging::init_logging(&config.observability.log_level);

    tracing::info!(config = %path.display(), "evm-gateway v0.1.0 starting");

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    let gateway = Gateway::start(config).await?;
    let mut events = gateway.events.events();
    let installed = gateway.events.bootstrap_core_listeners();

    tracing::info!(listeners = installed, "Listening for contract events");

    let shutdown = Shutdown::new();
    let mut stop = shutdown.subscribe();
    let signals = shutdown.clone();
    tokio::spawn(async move { wait_for_shutdown_signal(&signals).await });

    loop {
        tokio::select! {
            _ = stop.recv() => break,
            received = events.recv() => match received {
                Ok(event) => tracing::info!(
                    event = %event.event_name,
                    contract = %event.contract_address,
                    block = event.block_number,
                    tx_hash = %event.transaction_hash,
                    args = %event.to_json()["args"],
                    "Contract event"
                ),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event consumer lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    gateway.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
