//! Grid engine for the Lifesync server.
//!
//! This crate owns everything that decides what the grid looks like,
//! independent of how clients are connected.
//!
//! # Modules
//!
//! - [`store`] -- [`GridStore`], the single owner of the live grid.
//! - [`engine`] -- Conway's rule, boundary policy, and the
//!   [`SimulationEngine`] run/stop state machine.
//! - [`control`] -- [`TickControl`], atomics shared by the hub, the
//!   ticker, and the REST speed endpoint.
//! - [`ticker`] -- [`run_ticker`], the fixed-interval tick driver.
//! - [`config`] -- Configuration loading from `lifesync-config.yaml` into
//!   strongly-typed structs.
//!
//! [`GridStore`]: store::GridStore
//! [`SimulationEngine`]: engine::SimulationEngine
//! [`TickControl`]: control::TickControl
//! [`run_ticker`]: ticker::run_ticker

pub mod config;
pub mod control;
pub mod engine;
pub mod store;
pub mod ticker;

pub use engine::{Boundary, SimulationEngine, StepSummary};
pub use store::{GridError, GridStore};
