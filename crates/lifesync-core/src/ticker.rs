//! Periodic tick driver.
//!
//! [`run_ticker`] is the timer-driven unit of the server. It never touches
//! the grid: every period it hands a tick to a [`TickSink`] (in the server,
//! the session hub's command queue) and the sink's owner applies it. While
//! the engine is stopped the ticker parks on [`TickControl`] instead of
//! waking every period.
//!
//! Missed periods are skipped rather than replayed, so a stall never
//! produces a burst of catch-up generations.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::control::TickControl;

/// Outcome of handing one tick to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDelivery {
    /// The tick was queued.
    Delivered,
    /// The sink was busy; this tick is dropped.
    Skipped,
    /// The sink is gone; the ticker should exit.
    Closed,
}

/// Receiver of ticks.
pub trait TickSink: Send {
    /// Hand over one tick without blocking.
    fn deliver_tick(&mut self) -> TickDelivery;
}

/// Why the ticker exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickerExit {
    /// [`TickControl::request_shutdown`] was called.
    Shutdown,
    /// The sink reported [`TickDelivery::Closed`].
    SinkClosed,
}

/// Result of a ticker run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickerReport {
    /// Why the loop ended.
    pub exit: TickerExit,
    /// Ticks the sink accepted.
    pub delivered: u64,
    /// Ticks dropped because the sink was busy.
    pub skipped: u64,
}

fn make_interval(ms: u64) -> Interval {
    let period = Duration::from_millis(ms.max(1));
    let now = tokio::time::Instant::now();
    let start = now.checked_add(period).unwrap_or(now);
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

/// Deliver ticks to `sink` every [`TickControl::tick_interval_ms`] while
/// the engine is running, until shutdown or until the sink closes.
///
/// A change of interval takes effect from the next period.
pub async fn run_ticker(control: &Arc<TickControl>, sink: &mut dyn TickSink) -> TickerReport {
    let mut delivered: u64 = 0;
    let mut skipped: u64 = 0;
    let mut interval_ms = control.tick_interval_ms();
    let mut interval = make_interval(interval_ms);

    info!(tick_interval_ms = interval_ms, "Ticker starting");

    loop {
        if control.is_shutdown_requested() {
            return TickerReport {
                exit: TickerExit::Shutdown,
                delivered,
                skipped,
            };
        }

        if !control.is_running() {
            debug!("Ticker idle, waiting for start");
            control.wait_until_running().await;
            interval = make_interval(interval_ms);
            continue;
        }

        interval.tick().await;

        // State may have changed while sleeping.
        if control.is_shutdown_requested() || !control.is_running() {
            continue;
        }

        match sink.deliver_tick() {
            TickDelivery::Delivered => delivered = delivered.saturating_add(1),
            TickDelivery::Skipped => {
                skipped = skipped.saturating_add(1);
                debug!(skipped, "Tick skipped, sink busy");
            }
            TickDelivery::Closed => {
                return TickerReport {
                    exit: TickerExit::SinkClosed,
                    delivered,
                    skipped,
                };
            }
        }

        let current_ms = control.tick_interval_ms();
        if current_ms != interval_ms {
            info!(from = interval_ms, to = current_ms, "Tick interval changed");
            interval_ms = current_ms;
            interval = make_interval(interval_ms);
        }
    }
}

/// Log how a ticker run ended.
pub fn log_ticker_end(report: &TickerReport) {
    info!(
        exit = ?report.exit,
        delivered = report.delivered,
        skipped = report.skipped,
        "Ticker stopped"
    );
}
