//! REST API handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/health` | Liveness probe |
//! | `GET` | `/api/grid` | Current grid |
//! | `GET` | `/api/status` | Engine status and session count |
//! | `GET` | `/api/patterns` | Stored pattern summaries |
//! | `DELETE` | `/api/patterns/{name}` | Delete a stored pattern |
//! | `POST` | `/api/speed` | Set the tick interval |
//!
//! Grid and status reads come from the hub's published view. Pattern
//! store calls run on the blocking pool.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use lifesync_archive::ArchiveError;
use lifesync_core::config::MIN_TICK_INTERVAL_MS;
use lifesync_types::SimulationStatus;
use tracing::info;

use crate::error::ApiError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Response body for `GET /api/status`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct StatusResponse {
    /// Engine status.
    #[serde(flatten)]
    pub status: SimulationStatus,
    /// Connected `WebSocket` sessions.
    pub sessions: usize,
}

/// Request body for `POST /api/speed`.
#[derive(Debug, serde::Deserialize)]
pub struct SetSpeedRequest {
    /// New tick interval in milliseconds.
    pub tick_interval_ms: u64,
}

/// Response body for `POST /api/speed`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct SetSpeedResponse {
    /// Interval before the change.
    pub previous_interval_ms: u64,
    /// Interval now in effect.
    pub tick_interval_ms: u64,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `GET /api/grid`
pub async fn get_grid(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.current_view().grid)
}

/// `GET /api/status`
pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let view = state.current_view();
    let mut status = view.status;
    // The interval may have changed since the hub last published.
    status.tick_interval_ms = state.control.tick_interval_ms();
    Json(StatusResponse {
        status,
        sessions: view.sessions,
    })
}

/// `GET /api/patterns`
pub async fn list_patterns(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let archive = Arc::clone(&state.archive);
    let patterns = run_blocking(move || archive.list()).await??;
    Ok(Json(patterns))
}

/// `DELETE /api/patterns/{name}`
pub async fn delete_pattern(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let archive = Arc::clone(&state.archive);
    let target = name.clone();
    run_blocking(move || archive.delete(&target)).await??;
    info!(pattern = %name, "Pattern deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/speed`
pub async fn set_speed(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SetSpeedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let previous = state
        .control
        .set_tick_interval_ms(body.tick_interval_ms)
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}"
            ))
        })?;

    info!(
        from = previous,
        to = body.tick_interval_ms,
        "Tick interval changed via API"
    );
    state.hub.interval_changed().await?;

    Ok(Json(SetSpeedResponse {
        previous_interval_ms: previous,
        tick_interval_ms: body.tick_interval_ms,
    }))
}

async fn run_blocking<T, F>(job: F) -> Result<Result<T, ArchiveError>, ApiError>
where
    F: FnOnce() -> Result<T, ArchiveError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::Internal(format!("pattern store task failed: {e}")))
}
