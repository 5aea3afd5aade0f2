//! Simulation run state and the status record pushed to clients.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Whether the engine advances generations on each tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum SimulationState {
    /// No ticks are applied. Initial state.
    #[default]
    Stopped,
    /// A new generation is computed every tick interval.
    Running,
}

impl SimulationState {
    /// Whether this is [`SimulationState::Running`].
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running)
    }
}

/// Snapshot of the engine's control state, sent as a `status` message
/// and served from `GET /api/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SimulationStatus {
    /// Whether the simulation is ticking.
    pub running: bool,
    /// Generations computed since startup.
    pub generation: u64,
    /// Live cells in the current grid.
    pub population: u64,
    /// Current tick interval in milliseconds.
    pub tick_interval_ms: u64,
}
