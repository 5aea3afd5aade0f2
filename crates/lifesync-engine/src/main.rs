//! Lifesync server binary.
//!
//! Wires together the session hub, the tick driver, the pattern archive,
//! and the HTTP/`WebSocket` server, then runs until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `lifesync-config.yaml` (or the path given
//!    as the first argument), falling back to defaults
//! 2. Initialize structured logging (tracing)
//! 3. Open the pattern archive
//! 4. Create tick control state
//! 5. Spawn the session hub
//! 6. Start the HTTP/`WebSocket` server
//! 7. Spawn the ticker
//! 8. Wait for `Ctrl-C`, then stop the server, ticker, and hub in order

mod error;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lifesync_archive::{FilePatternStore, MemoryPatternStore, PatternStore};
use lifesync_core::config::{ArchiveBackend, LifesyncConfig, LogFormat, LoggingConfig};
use lifesync_core::control::TickControl;
use lifesync_core::ticker::{log_ticker_end, run_ticker};
use lifesync_core::{GridStore, SimulationEngine};
use lifesync_server::{AppState, HubSettings, ServerConfig, spawn_hub, spawn_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;

/// Config file read when no path is given on the command line.
const DEFAULT_CONFIG_PATH: &str = "lifesync-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, the archive, or the listening
/// socket cannot be set up, or if a background task panics.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);
    let (config, from_file) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    init_logging(&config.logging)?;
    info!("lifesync-engine starting");
    if from_file {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        rows = config.grid.rows,
        cols = config.grid.cols,
        boundary = ?config.grid.boundary,
        tick_interval_ms = config.simulation.tick_interval_ms,
        port = config.server.port,
        "Simulation configured"
    );

    // 3. Open the pattern archive.
    let archive = open_archive(&config)?;

    // 4. Create tick control state.
    let control = Arc::new(TickControl::new(
        config.simulation.tick_interval_ms,
        config.simulation.start_running,
    ));

    // 5. Spawn the session hub.
    let mut engine = SimulationEngine::new(config.grid.boundary);
    if config.simulation.start_running {
        engine.start();
    }
    let (hub, view, hub_task) = spawn_hub(
        GridStore::new(config.grid.rows, config.grid.cols),
        engine,
        Arc::clone(&archive),
        Arc::clone(&control),
        HubSettings {
            client_buffer: config.server.client_buffer,
            random_density: config.grid.random_density,
            seed: config.grid.seed,
        },
    );

    // 6. Start the HTTP/WebSocket server.
    let state = Arc::new(AppState::new(
        hub.clone(),
        view,
        Arc::clone(&control),
        archive,
    ));
    let server_config = ServerConfig {
        host: config.server.host.clone(),
        port: config.server.port,
        static_dir: Some(config.server.static_dir.clone()),
    };
    let server_task = spawn_server(server_config, state, shutdown_signal())
        .await
        .map_err(EngineError::from)?;

    // 7. Spawn the ticker.
    let ticker_task = {
        let control = Arc::clone(&control);
        let mut sink = hub.ticks();
        tokio::spawn(async move {
            let report = run_ticker(&control, &mut sink).await;
            log_ticker_end(&report);
        })
    };

    // 8. Run until the server stops, then wind down.
    server_task.await.map_err(|e| EngineError::Task {
        message: format!("server task: {e}"),
    })?;

    control.request_shutdown();
    ticker_task.await.map_err(|e| EngineError::Task {
        message: format!("ticker task: {e}"),
    })?;

    if hub.shutdown().await.is_err() {
        warn!("Session hub already stopped");
    }
    hub_task.await.map_err(|e| EngineError::Task {
        message: format!("hub task: {e}"),
    })?;

    info!("lifesync-engine shutdown complete");
    Ok(())
}

/// Load configuration from `path`, or defaults (with environment
/// overrides) when the file does not exist.
///
/// Returns the configuration and whether it came from the file.
fn load_config(path: &Path) -> Result<(LifesyncConfig, bool), EngineError> {
    if path.exists() {
        return Ok((LifesyncConfig::from_file(path)?, true));
    }
    let mut config = LifesyncConfig::default();
    config.apply_env_overrides()?;
    config.validate()?;
    Ok((config, false))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_logging(logging: &LoggingConfig) -> Result<(), EngineError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .map_err(|e| EngineError::Logging {
            message: format!("invalid log filter {:?}: {e}", logging.level),
        })?;

    let result = match logging.format {
        LogFormat::Pretty => tracing_subscriber::fmt()
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

/// Build the configured pattern store.
fn open_archive(config: &LifesyncConfig) -> Result<Arc<dyn PatternStore>, EngineError> {
    match config.archive.backend {
        ArchiveBackend::File => {
            let store = FilePatternStore::open(&config.archive.directory)?;
            Ok(Arc::new(store))
        }
        ArchiveBackend::Memory => {
            info!("Using in-memory pattern archive; patterns are lost on exit");
            Ok(Arc::new(MemoryPatternStore::new()))
        }
    }
}

/// Resolve on `Ctrl-C`.
async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}
