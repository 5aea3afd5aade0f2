//! Shared type definitions for the Lifesync server.
//!
//! This crate is the single source of truth for the types that cross
//! crate and process boundaries: the cell matrix, session identifiers,
//! and the JSON wire protocol spoken over the `WebSocket`. Payload types
//! flow downstream to `TypeScript` via `ts-rs` for the browser client.
//!
//! # Modules
//!
//! - [`grid`] -- The fixed-size cell matrix and its wire encoding
//! - [`ids`] -- Type-safe UUID wrapper for session identifiers
//! - [`pattern`] -- Metadata for archived patterns
//! - [`protocol`] -- Client commands, server messages, and decoding
//! - [`simulation`] -- Run state and status record

pub mod grid;
pub mod ids;
pub mod pattern;
pub mod protocol;
pub mod simulation;

// Re-export all public types at crate root for convenience.
pub use grid::{Grid, GridShapeError};
pub use ids::SessionId;
pub use pattern::PatternSummary;
pub use protocol::{
    ClientCommand, ErrorKind, ErrorPayload, Inbound, NamePayload, ProtocolError, RandomPayload,
    ServerMessage, TogglePayload, decode_client_message,
};
pub use simulation::{SimulationState, SimulationStatus};
