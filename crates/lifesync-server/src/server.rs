//! HTTP server lifecycle management.
//!
//! [`bind`] resolves and binds the listening socket so address errors
//! surface before anything is spawned. [`serve`] runs the router on that
//! socket until the shutdown future resolves. [`spawn_server`] does both,
//! serving on a background task.

use std::future::Future;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
    /// Directory served for unmatched paths, if any.
    pub static_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
            static_dir: None,
        }
    }
}

/// Errors that can occur when starting or running the server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}

/// Bind the listening socket described by `config`.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the address is invalid or in use.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| ServerError::Bind(format!("invalid address: {e}")))?;

    TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve requests on `listener` until `shutdown` resolves.
///
/// In-flight HTTP requests are allowed to finish. Upgraded `WebSocket`
/// sessions are not waited for; they end when the hub shuts down.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] on a fatal I/O error.
pub async fn serve<F>(
    listener: TcpListener,
    config: &ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let static_dir = config.static_dir.as_deref().filter(|dir| dir.is_dir());
    if let Some(dir) = static_dir {
        info!(directory = %dir.display(), "Serving static frontend");
    }
    let router = build_router(state, static_dir);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Server listening");
    }

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Bind eagerly, then serve on a background task.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the socket cannot be bound. Errors
/// while serving are logged by the background task.
pub async fn spawn_server<F>(
    config: ServerConfig,
    state: Arc<AppState>,
    shutdown: F,
) -> Result<JoinHandle<()>, ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = bind(&config).await?;
    Ok(tokio::spawn(async move {
        match serve(listener, &config, state, shutdown).await {
            Ok(()) => info!("Server stopped"),
            Err(e) => error!(error = %e, "Server exited with error"),
        }
    }))
}
