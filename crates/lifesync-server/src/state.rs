//! Shared application state for the Axum server.
//!
//! [`AppState`] bundles the hub handle used by `WebSocket` sessions, the
//! watch receiver REST handlers read the latest snapshot from, the tick
//! control for the speed endpoint, and the pattern store for listing and
//! deletion. REST reads never enter the hub actor.

use std::sync::Arc;

use lifesync_archive::PatternStore;
use lifesync_core::control::TickControl;
use tokio::sync::watch;

use crate::hub::{HubHandle, HubView};

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// Command handle of the session hub.
    pub hub: HubHandle,
    /// Latest hub snapshot.
    pub view: watch::Receiver<HubView>,
    /// Run flag and tick interval shared with the ticker.
    pub control: Arc<TickControl>,
    /// Pattern persistence.
    pub archive: Arc<dyn PatternStore>,
}

impl AppState {
    /// Bundle the shared state.
    pub fn new(
        hub: HubHandle,
        view: watch::Receiver<HubView>,
        control: Arc<TickControl>,
        archive: Arc<dyn PatternStore>,
    ) -> Self {
        Self {
            hub,
            view,
            control,
            archive,
        }
    }

    /// Clone of the latest published view.
    pub fn current_view(&self) -> HubView {
        self.view.borrow().clone()
    }
}
