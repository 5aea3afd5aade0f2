//! Axum router construction.
//!
//! Assembles the `WebSocket` endpoint, the REST API, and the optional
//! static frontend into a single [`Router`] with permissive CORS and
//! request tracing.

use std::path::Path;
use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router.
///
/// The router includes:
/// - `GET /ws` -- interactive `WebSocket` session
/// - `GET /health` -- liveness probe
/// - `GET /api/grid` -- current grid
/// - `GET /api/status` -- engine status and session count
/// - `GET /api/patterns` -- stored pattern summaries
/// - `DELETE /api/patterns/{name}` -- delete a pattern
/// - `POST /api/speed` -- set the tick interval
///
/// When `static_dir` is given, unmatched paths are served from it.
pub fn build_router(state: Arc<AppState>, static_dir: Option<&Path>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        // WebSocket
        .route("/ws", get(ws::ws_session))
        // REST API
        .route("/health", get(handlers::health))
        .route("/api/grid", get(handlers::get_grid))
        .route("/api/status", get(handlers::get_status))
        .route("/api/patterns", get(handlers::list_patterns))
        .route("/api/patterns/{name}", delete(handlers::delete_pattern))
        .route("/api/speed", post(handlers::set_speed));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
