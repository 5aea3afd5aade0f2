//! Integration tests for the REST endpoints.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server. A real hub runs behind the router so reads see
//! the published view and writes go through the actor.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lifesync_archive::{MemoryPatternStore, PatternStore};
use lifesync_core::control::TickControl;
use lifesync_core::{Boundary, GridStore, SimulationEngine};
use lifesync_server::hub::{HubSettings, spawn_hub};
use lifesync_server::router::build_router;
use lifesync_server::state::AppState;
use lifesync_types::Grid;
use serde_json::Value;
use tower::ServiceExt;

fn make_test_state() -> Arc<AppState> {
    let archive: Arc<dyn PatternStore> = Arc::new(MemoryPatternStore::new());
    archive
        .save("glider", &Grid::from_ascii(".#.\n..#\n###").unwrap())
        .unwrap();
    archive.save("empty", &Grid::new(3, 3)).unwrap();

    let control = Arc::new(TickControl::new(100, false));
    let grid = Grid::from_ascii("#..\n.#.\n...").unwrap();
    let (hub, view, _task) = spawn_hub(
        GridStore::from_grid(grid),
        SimulationEngine::new(Boundary::Toroidal),
        Arc::clone(&archive),
        Arc::clone(&control),
        HubSettings::default(),
    );
    Arc::new(AppState::new(hub, view, control, archive))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =========================================================================
// Tests
// =========================================================================

#[tokio::test]
async fn test_health() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&*bytes, b"ok");
}

#[tokio::test]
async fn test_get_grid() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(Request::get("/api/grid").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json, serde_json::json!([[1, 0, 0], [0, 1, 0], [0, 0, 0]]));
}

#[tokio::test]
async fn test_get_status() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(Request::get("/api/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["running"], false);
    assert_eq!(json["generation"], 0);
    assert_eq!(json["population"], 2);
    assert_eq!(json["tick_interval_ms"], 100);
    assert_eq!(json["sessions"], 0);
}

#[tokio::test]
async fn test_list_patterns() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(Request::get("/api/patterns").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    let patterns = json.as_array().unwrap();
    assert_eq!(patterns.len(), 2);
    assert_eq!(json[0]["name"], "empty");
    assert_eq!(json[1]["name"], "glider");
    assert_eq!(json[1]["population"], 5);
}

#[tokio::test]
async fn test_delete_pattern() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state), None);

    let response = router
        .clone()
        .oneshot(
            Request::delete("/api/patterns/glider")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(state.archive.load("glider").is_err());

    let response = router
        .oneshot(
            Request::delete("/api/patterns/glider")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"], 404);
}

#[tokio::test]
async fn test_delete_invalid_name() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(
            Request::delete("/api/patterns/.hidden")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_set_speed() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state), None);

    let response = router
        .oneshot(
            Request::post("/api/speed")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"tick_interval_ms": 250}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["previous_interval_ms"], 100);
    assert_eq!(json["tick_interval_ms"], 250);
    assert_eq!(state.control.tick_interval_ms(), 250);
}

#[tokio::test]
async fn test_set_speed_too_fast() {
    let state = make_test_state();
    let router = build_router(Arc::clone(&state), None);

    let response = router
        .oneshot(
            Request::post("/api/speed")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"tick_interval_ms": 1}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.control.tick_interval_ms(), 100);
}

#[tokio::test]
async fn test_unknown_route_without_static_dir() {
    let router = build_router(make_test_state(), None);

    let response = router
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_static_fallback() {
    let dir = std::env::temp_dir().join(format!("lifesync-static-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("index.html"), "<h1>life</h1>").unwrap();

    let router = build_router(make_test_state(), Some(dir.as_path()));
    let response = router
        .oneshot(Request::get("/index.html").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&*bytes, b"<h1>life</h1>");

    let _ = std::fs::remove_dir_all(&dir);
}
