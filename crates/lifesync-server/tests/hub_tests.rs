//! Integration tests for the session hub.
//!
//! Sessions are driven through [`HubHandle`] directly, without sockets:
//! each test reads the frames a browser would receive from the session's
//! outbox. Ordering between sessions is checked by following a rejected
//! command with a broadcasting one and asserting which frame arrives next.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use lifesync_archive::{ArchiveError, MemoryPatternStore, PatternStore};
use lifesync_core::control::TickControl;
use lifesync_core::ticker::{TickDelivery, TickSink};
use lifesync_core::{Boundary, GridStore, SimulationEngine};
use lifesync_server::HubError;
use lifesync_server::hub::{HubHandle, HubSettings, HubView, spawn_hub};
use lifesync_types::{Grid, PatternSummary, SessionId};
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};

const WAIT: Duration = Duration::from_secs(2);

struct TestHub {
    handle: HubHandle,
    view: watch::Receiver<HubView>,
    control: Arc<TickControl>,
    archive: Arc<MemoryPatternStore>,
}

fn start_hub(grid: Grid, client_buffer: usize) -> TestHub {
    let archive = Arc::new(MemoryPatternStore::new());
    start_hub_with(grid, client_buffer, Arc::clone(&archive) as Arc<dyn PatternStore>, archive)
}

/// Start a hub backed by `store`; `archive` is the memory store the test
/// inspects, which `store` may wrap.
fn start_hub_with(
    grid: Grid,
    client_buffer: usize,
    store: Arc<dyn PatternStore>,
    archive: Arc<MemoryPatternStore>,
) -> TestHub {
    let control = Arc::new(TickControl::new(100, false));
    let settings = HubSettings {
        client_buffer,
        random_density: 0.5,
        seed: Some(7),
    };
    let (handle, view, _task) = spawn_hub(
        GridStore::from_grid(grid),
        SimulationEngine::new(Boundary::Toroidal),
        store,
        Arc::clone(&control),
        settings,
    );
    TestHub {
        handle,
        view,
        control,
        archive,
    }
}

/// Memory store whose saves take a while to commit.
struct SlowSaves {
    inner: Arc<MemoryPatternStore>,
    delay: Duration,
}

impl PatternStore for SlowSaves {
    fn save(&self, name: &str, grid: &Grid) -> Result<PatternSummary, ArchiveError> {
        std::thread::sleep(self.delay);
        self.inner.save(name, grid)
    }

    fn load(&self, name: &str) -> Result<Grid, ArchiveError> {
        self.inner.load(name)
    }

    fn list(&self) -> Result<Vec<PatternSummary>, ArchiveError> {
        self.inner.list()
    }

    fn delete(&self, name: &str) -> Result<(), ArchiveError> {
        self.inner.delete(name)
    }
}

fn start_hub_with_slow_saves(grid: Grid) -> TestHub {
    let archive = Arc::new(MemoryPatternStore::new());
    let store = Arc::new(SlowSaves {
        inner: Arc::clone(&archive),
        delay: Duration::from_millis(200),
    });
    start_hub_with(grid, 8, store, archive)
}

struct Client {
    id: SessionId,
    rx: mpsc::Receiver<Utf8Bytes>,
}

impl Client {
    async fn connect(hub: &TestHub) -> Self {
        let (id, rx) = hub.handle.connect().await.unwrap();
        Self { id, rx }
    }

    /// Connect and discard the initial `grid` and `status` frames.
    async fn connect_ready(hub: &TestHub) -> Self {
        let mut client = Self::connect(hub).await;
        assert_eq!(client.next().await["type"], "grid");
        assert_eq!(client.next().await["type"], "status");
        client
    }

    async fn send(&self, hub: &TestHub, message: &Value) {
        hub.handle
            .client_message(self.id, Utf8Bytes::from(message.to_string()))
            .await
            .unwrap();
    }

    async fn send_raw(&self, hub: &TestHub, text: &str) {
        hub.handle
            .client_message(self.id, Utf8Bytes::from(text.to_owned()))
            .await
            .unwrap();
    }

    async fn next(&mut self) -> Value {
        let frame = tokio::time::timeout(WAIT, self.rx.recv())
            .await
            .unwrap()
            .unwrap();
        serde_json::from_str(frame.as_str()).unwrap()
    }

    async fn assert_silent(&mut self) {
        let result = tokio::time::timeout(Duration::from_millis(100), self.rx.recv()).await;
        assert!(result.is_err(), "unexpected frame: {result:?}");
    }
}

fn blank(rows: usize, cols: usize) -> Grid {
    Grid::new(rows, cols)
}

fn blinker() -> Grid {
    Grid::from_ascii(
        "
        .....
        ..#..
        ..#..
        ..#..
        .....
        ",
    )
    .unwrap()
}

fn grid_of(message: &Value) -> Grid {
    assert_eq!(message["type"], "grid");
    serde_json::from_value(message["data"].clone()).unwrap()
}

// ---------------------------------------------------------------------------
// Connect
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_session_receives_exactly_one_grid_first() {
    let hub = start_hub(blinker(), 8);
    let mut client = Client::connect(&hub).await;

    let first = client.next().await;
    assert_eq!(grid_of(&first), blinker());

    let second = client.next().await;
    assert_eq!(second["type"], "status");
    assert_eq!(second["data"]["running"], false);
    assert_eq!(second["data"]["population"], 3);

    client.assert_silent().await;
}

#[tokio::test]
async fn smallest_client_buffer_still_connects() {
    for client_buffer in [1, 2] {
        let mut hub = start_hub(blinker(), client_buffer);
        let mut client = Client::connect(&hub).await;

        assert_eq!(grid_of(&client.next().await), blinker());
        assert_eq!(client.next().await["type"], "status");
        tokio::time::timeout(WAIT, hub.view.wait_for(|v| v.sessions == 1))
            .await
            .unwrap()
            .unwrap();

        client
            .send(&hub, &json!({"type": "toggle", "data": {"x": 0, "y": 0}}))
            .await;
        assert_eq!(grid_of(&client.next().await).get(0, 0), Some(true));
    }
}

#[tokio::test]
async fn session_count_is_published() {
    let mut hub = start_hub(blank(3, 3), 8);
    let a = Client::connect_ready(&hub).await;
    let _b = Client::connect_ready(&hub).await;

    tokio::time::timeout(WAIT, hub.view.wait_for(|v| v.sessions == 2))
        .await
        .unwrap()
        .unwrap();

    hub.handle.disconnect(a.id).await.unwrap();
    tokio::time::timeout(WAIT, hub.view.wait_for(|v| v.sessions == 1))
        .await
        .unwrap()
        .unwrap();
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn toggle_from_one_session_reaches_all() {
    let hub = start_hub(blank(3, 4), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "toggle", "data": {"x": 3, "y": 1}}))
        .await;

    for client in [&mut a, &mut b] {
        let grid = grid_of(&client.next().await);
        assert_eq!(grid.get(3, 1), Some(true));
        assert_eq!(grid.population(), 1);
    }
}

#[tokio::test]
async fn malformed_toggle_errors_only_to_originator() {
    let hub = start_hub(blank(3, 3), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "toggle", "data": {"x": "one", "y": 0}}))
        .await;
    let error = a.next().await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["kind"], "malformed_message");

    // B's next frame is the clear, so it saw nothing for the bad toggle.
    a.send(&hub, &json!({"type": "clear"})).await;
    assert_eq!(b.next().await["type"], "grid");
    assert_eq!(a.next().await["type"], "grid");
}

#[tokio::test]
async fn invalid_json_is_reported() {
    let hub = start_hub(blank(2, 2), 8);
    let mut a = Client::connect_ready(&hub).await;

    a.send_raw(&hub, "{not json").await;
    let error = a.next().await;
    assert_eq!(error["data"]["kind"], "malformed_message");
}

#[tokio::test]
async fn unknown_type_is_ignored() {
    let hub = start_hub(blank(2, 2), 8);
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "dance", "data": [1, 2, 3]})).await;
    a.send(&hub, &json!({"type": "toggle", "data": {"x": 0, "y": 0}}))
        .await;

    let grid = grid_of(&a.next().await);
    assert_eq!(grid.get(0, 0), Some(true));
}

#[tokio::test]
async fn out_of_bounds_toggle_leaves_grid_unchanged() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    for (x, y) in [(5, 0), (0, 5), (-1, 2)] {
        a.send(&hub, &json!({"type": "toggle", "data": {"x": x, "y": y}}))
            .await;
        let error = a.next().await;
        assert_eq!(error["data"]["kind"], "out_of_bounds");
    }
    b.assert_silent().await;
    assert_eq!(hub.view.borrow().grid, blinker());
}

#[tokio::test]
async fn clear_and_random_broadcast() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "random", "data": {"density": 1.0}}))
        .await;
    let full = grid_of(&a.next().await);
    assert_eq!(full.population(), 25);

    a.send(&hub, &json!({"type": "clear", "data": null})).await;
    assert_eq!(grid_of(&a.next().await).population(), 0);

    a.send(&hub, &json!({"type": "random"})).await;
    let seeded = grid_of(&a.next().await);
    assert_eq!((seeded.rows(), seeded.cols()), (5, 5));
}

#[tokio::test]
async fn start_and_stop_broadcast_status() {
    let hub = start_hub(blank(3, 3), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "start"})).await;
    for client in [&mut a, &mut b] {
        let status = client.next().await;
        assert_eq!(status["type"], "status");
        assert_eq!(status["data"]["running"], true);
    }
    assert!(hub.control.is_running());

    // Idempotent.
    a.send(&hub, &json!({"type": "start"})).await;
    assert_eq!(a.next().await["data"]["running"], true);

    b.send(&hub, &json!({"type": "stop"})).await;
    assert_eq!(a.next().await["data"]["running"], false);
    assert!(!hub.control.is_running());
}

// ---------------------------------------------------------------------------
// Ticks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ticks_advance_only_while_running() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut ticks = hub.handle.ticks();

    // Stopped: the tick is discarded, so the next frame is the status.
    assert_eq!(ticks.deliver_tick(), TickDelivery::Delivered);
    a.send(&hub, &json!({"type": "start"})).await;
    assert_eq!(a.next().await["type"], "status");

    ticks.deliver_tick();
    let horizontal = grid_of(&a.next().await);
    assert_eq!(horizontal.get(1, 2), Some(true));
    assert_eq!(horizontal.get(2, 1), Some(false));

    ticks.deliver_tick();
    assert_eq!(grid_of(&a.next().await), blinker());

    let view = hub.view.borrow().clone();
    assert_eq!(view.status.generation, 2);
    assert_eq!(view.status.population, 3);
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_then_load_round_trips() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "save", "data": {"name": "osc"}}))
        .await;
    let saved = a.next().await;
    assert_eq!(saved["type"], "saved");
    assert_eq!(saved["data"]["name"], "osc");
    assert_eq!(hub.archive.load("osc").unwrap(), blinker());

    a.send(&hub, &json!({"type": "clear"})).await;
    assert_eq!(grid_of(&a.next().await).population(), 0);
    // B never saw the acknowledgement.
    assert_eq!(grid_of(&b.next().await).population(), 0);

    a.send(&hub, &json!({"type": "load", "data": {"name": "osc"}}))
        .await;
    assert_eq!(grid_of(&a.next().await), blinker());
    assert_eq!(grid_of(&b.next().await), blinker());
}

#[tokio::test]
async fn load_after_slow_save_sees_the_save() {
    let hub = start_hub_with_slow_saves(blinker());
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "save", "data": {"name": "p1"}}))
        .await;
    a.send(&hub, &json!({"type": "clear"})).await;
    a.send(&hub, &json!({"type": "load", "data": {"name": "p1"}}))
        .await;

    assert_eq!(grid_of(&a.next().await).population(), 0);
    let saved = a.next().await;
    assert_eq!(saved["type"], "saved", "got {saved}");
    assert_eq!(grid_of(&a.next().await), blinker());

    assert_eq!(grid_of(&b.next().await).population(), 0);
    assert_eq!(grid_of(&b.next().await), blinker());
}

#[tokio::test]
async fn saves_to_one_name_commit_in_order() {
    let hub = start_hub_with_slow_saves(blinker());
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "save", "data": {"name": "p"}}))
        .await;
    a.send(&hub, &json!({"type": "clear"})).await;
    a.send(&hub, &json!({"type": "save", "data": {"name": "p"}}))
        .await;

    assert_eq!(grid_of(&a.next().await).population(), 0);
    assert_eq!(a.next().await["type"], "saved");
    assert_eq!(a.next().await["type"], "saved");
    assert_eq!(hub.archive.load("p").unwrap(), blank(5, 5));
}

#[tokio::test]
async fn load_missing_pattern_is_not_found() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "load", "data": {"name": "ghost"}}))
        .await;
    let error = a.next().await;
    assert_eq!(error["type"], "error");
    assert_eq!(error["data"]["kind"], "not_found");

    b.assert_silent().await;
    assert_eq!(hub.view.borrow().grid, blinker());
}

#[tokio::test]
async fn load_with_wrong_dimensions_is_rejected() {
    let hub = start_hub(blinker(), 8);
    hub.archive.save("small", &blank(3, 3)).unwrap();
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "load", "data": {"name": "small"}}))
        .await;
    let error = a.next().await;
    assert_eq!(error["data"]["kind"], "dimension_mismatch");
    assert_eq!(hub.view.borrow().grid, blinker());
}

#[tokio::test]
async fn save_with_empty_name_is_rejected() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "save", "data": {"name": "  "}}))
        .await;
    let error = a.next().await;
    assert_eq!(error["data"]["kind"], "invalid_name");
    assert!(hub.archive.list().unwrap().is_empty());
}

#[tokio::test]
async fn save_without_payload_is_malformed() {
    let hub = start_hub(blinker(), 8);
    let mut a = Client::connect_ready(&hub).await;

    a.send(&hub, &json!({"type": "save"})).await;
    assert_eq!(a.next().await["data"]["kind"], "malformed_message");
}

// ---------------------------------------------------------------------------
// Delivery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_session_is_dropped_without_stalling_others() {
    let mut hub = start_hub(blank(4, 4), 2);
    // Never read: its outbox is full after the initial grid and status.
    let mut slow = Client::connect(&hub).await;
    let mut fast = Client::connect_ready(&hub).await;

    for x in 0..4 {
        fast.send(&hub, &json!({"type": "toggle", "data": {"x": x, "y": 0}}))
            .await;
        let grid = grid_of(&fast.next().await);
        assert_eq!(grid.get(usize::try_from(x).unwrap(), 0), Some(true));
    }

    tokio::time::timeout(WAIT, hub.view.wait_for(|v| v.sessions == 1))
        .await
        .unwrap()
        .unwrap();

    // The slow session gets what was queued, then its outbox closes.
    assert_eq!(slow.next().await["type"], "grid");
    assert_eq!(slow.next().await["type"], "status");
    assert!(slow.rx.recv().await.is_none());
}

#[tokio::test]
async fn frames_from_dropped_sessions_are_ignored() {
    let hub = start_hub(blank(2, 2), 8);
    let a = Client::connect_ready(&hub).await;
    let mut b = Client::connect_ready(&hub).await;

    hub.handle.disconnect(a.id).await.unwrap();
    a.send(&hub, &json!({"type": "toggle", "data": {"x": 0, "y": 0}}))
        .await;
    b.assert_silent().await;
}

#[tokio::test]
async fn interval_change_pushes_status() {
    let hub = start_hub(blank(2, 2), 8);
    let mut a = Client::connect_ready(&hub).await;

    hub.control.set_tick_interval_ms(250).unwrap();
    hub.handle.interval_changed().await.unwrap();

    let status = a.next().await;
    assert_eq!(status["type"], "status");
    assert_eq!(status["data"]["tick_interval_ms"], 250);
}

#[tokio::test]
async fn shutdown_closes_sessions() {
    let hub = start_hub(blank(2, 2), 8);
    let mut a = Client::connect_ready(&hub).await;

    hub.handle.shutdown().await.unwrap();
    let closed = tokio::time::timeout(WAIT, a.rx.recv()).await.unwrap();
    assert!(closed.is_none());
    assert!(matches!(hub.handle.connect().await, Err(HubError::Closed)));
    assert!(matches!(hub.handle.shutdown().await, Err(HubError::Closed)));
}
