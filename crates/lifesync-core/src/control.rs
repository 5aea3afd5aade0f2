//! Shared tick control state.
//!
//! [`TickControl`] is shared between the session hub (which owns the
//! engine and flips the running flag on `start`/`stop`), the ticker task
//! (which sleeps while stopped), and the REST speed endpoint. All fields
//! are atomics so the ticker's hot path never takes a lock.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

use crate::config::MIN_TICK_INTERVAL_MS;

/// Run flag, tick interval, and shutdown request shared across tasks.
#[derive(Debug)]
pub struct TickControl {
    /// Mirrors the engine's `Running` state.
    running: AtomicBool,

    /// Wakes the ticker when it starts running or shutdown is requested.
    wake: Notify,

    /// Whether the ticker should exit.
    shutdown: AtomicBool,

    /// Current tick interval in milliseconds (runtime-adjustable).
    tick_interval_ms: AtomicU64,
}

impl TickControl {
    /// Create control state with the given interval and run flag.
    pub fn new(tick_interval_ms: u64, running: bool) -> Self {
        Self {
            running: AtomicBool::new(running),
            wake: Notify::new(),
            shutdown: AtomicBool::new(false),
            tick_interval_ms: AtomicU64::new(tick_interval_ms.max(MIN_TICK_INTERVAL_MS)),
        }
    }

    // -----------------------------------------------------------------------
    // Running
    // -----------------------------------------------------------------------

    /// Whether the engine is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Record the engine's run state and wake the ticker when it starts.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
        if running {
            self.wake.notify_one();
        }
    }

    /// Wait until the engine is running or shutdown is requested.
    ///
    /// Returns immediately if either already holds.
    pub async fn wait_until_running(&self) {
        while !self.is_running() && !self.is_shutdown_requested() {
            self.wake.notified().await;
        }
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Ask the ticker to exit and wake it if it is waiting.
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.wake.notify_one();
    }

    /// Whether shutdown has been requested.
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    // -----------------------------------------------------------------------
    // Tick Speed
    // -----------------------------------------------------------------------

    /// Get the current tick interval in milliseconds.
    pub fn tick_interval_ms(&self) -> u64 {
        self.tick_interval_ms.load(Ordering::Acquire)
    }

    /// Set the tick interval in milliseconds.
    ///
    /// Returns the previous interval on success, or `None` if the value
    /// was rejected (below [`MIN_TICK_INTERVAL_MS`]).
    pub fn set_tick_interval_ms(&self, ms: u64) -> Option<u64> {
        if ms < MIN_TICK_INTERVAL_MS {
            return None;
        }
        Some(self.tick_interval_ms.swap(ms, Ordering::AcqRel))
    }
}
