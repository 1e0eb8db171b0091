//! Pulse service binary.
//!
//! Wires the in-process store, vote ledger and chat room behind the
//! HTTP/`WebSocket` API and serves until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `pulse-config.yaml` (defaults if absent)
//! 2. Initialize structured logging (tracing)
//! 3. Build the store, ledger and chat room
//! 4. Serve the API until a shutdown signal arrives

mod error;

use std::path::Path;
use std::sync::Arc;

use pulse_core::{LogFormat, PulseConfig};
use pulse_events::ChatRoom;
use pulse_ledger::VoteLedger;
use pulse_observer::{AppState, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Configuration file looked up in the working directory.
const CONFIG_PATH: &str = "pulse-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, logging or the server fails.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration.
    let config = PulseConfig::load_or_default(Path::new(CONFIG_PATH))?;

    // 2. Initialize structured logging. RUST_LOG wins over the config level.
    init_logging(&config)?;
    info!("pulse-engine starting");
    info!(
        host = %config.server.host,
        port = config.server.port,
        purge_on_reset = config.ledger.purge_on_reset,
        max_transaction_attempts = config.store.max_transaction_attempts,
        frame_interval_ms = u64::try_from(config.presentation_options().frame_interval.as_millis())
            .unwrap_or(u64::MAX),
        particle_cap = ?config.simulation_params().max_particles,
        "Configuration loaded"
    );

    // 3. Build the store, ledger and chat room.
    let store = config.build_store();
    let ledger = VoteLedger::new(store.clone(), config.ledger_options());
    let chat = ChatRoom::new(store, config.chat_settings());
    let state = Arc::new(AppState::new(ledger, chat));
    info!("Vote ledger and chat ready");

    // 4. Serve until Ctrl-C.
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
    };
    pulse_observer::start_server(&server_config, state, shutdown_signal()).await?;

    info!("pulse-engine stopped");
    Ok(())
}

/// Install the global subscriber in the configured format.
fn init_logging(config: &PulseConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let result = match config.logging.format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .try_init(),
    };
    result.map_err(|e| EngineError::Logging {
        message: e.to_string(),
    })
}

/// Resolve when the process receives `Ctrl-C`.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
        return;
    }
    info!("Shutdown signal received, draining connections");
}
