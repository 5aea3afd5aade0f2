//! Session hub and network surface for the Lifesync server.
//!
//! This crate provides:
//!
//! - **Session hub** ([`hub`]): the actor that owns the grid and engine,
//!   applies client commands and ticks in one order, and fans out the
//!   resulting frames to every connected session
//! - **`WebSocket` endpoint** (`/ws`) speaking the JSON protocol from
//!   `lifesync-types`
//! - **REST endpoints** for reading the grid and status, managing stored
//!   patterns, and changing the tick interval
//! - **Static frontend** served as the router fallback
//!
//! # Architecture
//!
//! Every mutation goes through the hub's command channel. The hub
//! publishes its latest state on a watch channel that REST handlers read
//! without entering the actor, and pushes serialized frames to per-session
//! bounded outboxes that it never waits on.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod router;
pub mod server;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use error::{ApiError, HubError};
pub use hub::{HubCommand, HubHandle, HubSettings, HubTicks, HubView, SessionHub, spawn_hub};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, bind, serve, spawn_server};
pub use state::AppState;
