//! Conway's Game of Life stepping and the run/stop state machine.
//!
//! The next generation is a pure function of the current grid
//! ([`next_generation`]): every cell's eight Moore neighbors are counted
//! in the current grid, never in the grid being built, and the B3/S23
//! rule is applied. [`SimulationEngine`] layers the `Stopped`/`Running`
//! state machine and a generation counter on top and commits each result
//! through [`GridStore::set_grid`].
//!
//! # Boundary policy
//!
//! [`Boundary::Toroidal`] (the default) connects opposite edges, so a
//! glider leaving the right edge re-enters on the left. [`Boundary::Dead`]
//! treats everything beyond the edge as permanently dead. The policy is
//! fixed per engine and applied to every cell.

use lifesync_types::{Grid, SimulationState};
use serde::Deserialize;

use crate::store::{GridError, GridStore};

/// How neighbors are counted at the grid edges.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Boundary {
    /// Edges wrap around.
    #[default]
    Toroidal,
    /// Cells beyond the edge are always dead.
    Dead,
}

/// The B3/S23 rule: a live cell survives with 2 or 3 live neighbors, a
/// dead cell is born with exactly 3.
pub const fn rule(alive: bool, live_neighbors: u8) -> bool {
    matches!((alive, live_neighbors), (true, 2 | 3) | (false, 3))
}

/// Previous, same, and next index along one axis under `boundary`.
fn axis_neighbors(i: usize, len: usize, boundary: Boundary) -> [Option<usize>; 3] {
    let next = i.checked_add(1).filter(|n| *n < len);
    match boundary {
        Boundary::Toroidal => [
            Some(i.checked_sub(1).unwrap_or_else(|| len.saturating_sub(1))),
            Some(i),
            Some(next.unwrap_or(0)),
        ],
        Boundary::Dead => [i.checked_sub(1), Some(i), next],
    }
}

/// Count live Moore neighbors of `(x, y)`.
///
/// On very small tori a neighbor offset can land on the same cell more
/// than once (or on the cell itself); each offset is counted.
pub fn live_neighbors(grid: &Grid, x: usize, y: usize, boundary: Boundary) -> u8 {
    let xs = axis_neighbors(x, grid.cols(), boundary);
    let ys = axis_neighbors(y, grid.rows(), boundary);
    let mut count: u8 = 0;
    for (dy, ny) in ys.iter().enumerate() {
        let Some(ny) = *ny else { continue };
        for (dx, nx) in xs.iter().enumerate() {
            if dx == 1 && dy == 1 {
                continue;
            }
            let Some(nx) = *nx else { continue };
            if grid.is_alive(nx, ny) {
                count = count.saturating_add(1);
            }
        }
    }
    count
}

/// Compute the generation after `current`.
pub fn next_generation(current: &Grid, boundary: Boundary) -> Grid {
    let mut next = Grid::new(current.rows(), current.cols());
    for y in 0..current.rows() {
        for x in 0..current.cols() {
            let alive = rule(current.is_alive(x, y), live_neighbors(current, x, y, boundary));
            if alive {
                next.set(x, y, true);
            }
        }
    }
    next
}

/// What one committed step produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepSummary {
    /// Generation number after the step.
    pub generation: u64,
    /// Live cells after the step.
    pub population: usize,
    /// Whether any cell changed.
    pub changed: bool,
}

/// Run state, boundary policy, and generation counter.
///
/// The engine does not own the grid; it borrows the [`GridStore`] for
/// each step so the store keeps a single owner.
#[derive(Debug, Clone)]
pub struct SimulationEngine {
    state: SimulationState,
    boundary: Boundary,
    generation: u64,
}

impl SimulationEngine {
    /// Create a stopped engine.
    pub const fn new(boundary: Boundary) -> Self {
        Self {
            state: SimulationState::Stopped,
            boundary,
            generation: 0,
        }
    }

    /// Current run state.
    pub const fn state(&self) -> SimulationState {
        self.state
    }

    /// Whether ticks advance the grid.
    pub const fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Boundary policy in use.
    pub const fn boundary(&self) -> Boundary {
        self.boundary
    }

    /// Generations computed so far.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Enter `Running`. Returns `false` if already running.
    pub const fn start(&mut self) -> bool {
        let changed = !self.state.is_running();
        self.state = SimulationState::Running;
        changed
    }

    /// Enter `Stopped`. Returns `false` if already stopped.
    pub const fn stop(&mut self) -> bool {
        let changed = self.state.is_running();
        self.state = SimulationState::Stopped;
        changed
    }

    /// Advance the store by one generation regardless of run state.
    ///
    /// # Errors
    ///
    /// Propagates [`GridError`] from [`GridStore::set_grid`]; the computed
    /// grid always matches the store's shape, so this only fails if that
    /// invariant is broken.
    pub fn step(&mut self, store: &mut GridStore) -> Result<StepSummary, GridError> {
        let next = next_generation(store.grid(), self.boundary);
        let changed = &next != store.grid();
        let population = next.population();
        store.set_grid(next)?;
        self.generation = self.generation.saturating_add(1);
        Ok(StepSummary {
            generation: self.generation,
            population,
            changed,
        })
    }

    /// Apply one tick: step if running, do nothing if stopped.
    ///
    /// # Errors
    ///
    /// See [`SimulationEngine::step`].
    pub fn tick(&mut self, store: &mut GridStore) -> Result<Option<StepSummary>, GridError> {
        if !self.is_running() {
            return Ok(None);
        }
        self.step(store).map(Some)
    }
}
