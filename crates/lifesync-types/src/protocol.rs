//! Wire protocol between browser clients and the session hub.
//!
//! Every frame is a UTF-8 JSON record with a `type` discriminator and an
//! optional `data` payload:
//!
//! ```json
//! {"type": "toggle", "data": {"x": 3, "y": 7}}
//! {"type": "grid", "data": [[0, 1], [1, 0]]}
//! ```
//!
//! Decoding is two-staged. The envelope is parsed first so that an
//! unrecognized `type` can be told apart from a recognized type whose
//! payload is broken: the former is [`Inbound::Unknown`] and is ignored
//! by the hub, the latter is a [`ProtocolError::MalformedMessage`]
//! reported back to the sender.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::grid::Grid;
use crate::simulation::SimulationStatus;

/// Errors raised while decoding an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// The frame is not valid JSON, lacks a `type`, or carries a payload
    /// that does not fit its type.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

/// Payload of a `toggle` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TogglePayload {
    /// Column index. Signed so that negative input is an out-of-bounds
    /// coordinate rather than a decode failure.
    pub x: i64,
    /// Row index.
    pub y: i64,
}

/// Payload of `save`, `load`, and the `saved` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct NamePayload {
    /// Pattern name.
    pub name: String,
}

/// Optional payload of a `random` command.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RandomPayload {
    /// Probability in `[0, 1]` that each cell comes up alive.
    #[serde(default)]
    pub density: Option<f64>,
}

/// A decoded client command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ClientCommand {
    /// Flip one cell.
    Toggle(TogglePayload),
    /// Begin ticking.
    Start,
    /// Halt ticking.
    Stop,
    /// Kill every cell.
    Clear,
    /// Re-seed the grid at the given (or configured) density.
    Random(RandomPayload),
    /// Persist the current grid.
    Save(NamePayload),
    /// Replace the grid with a stored pattern.
    Load(NamePayload),
}

impl ClientCommand {
    /// The wire `type` of this command.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Toggle(_) => "toggle",
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Clear => "clear",
            Self::Random(_) => "random",
            Self::Save(_) => "save",
            Self::Load(_) => "load",
        }
    }

    /// Encode as a client would send it.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A recognized command with a valid payload.
    Command(ClientCommand),
    /// A well-formed envelope whose `type` is not part of the protocol.
    Unknown(String),
}

/// The outer record shared by every frame.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Decode one inbound text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedMessage`] if the frame is not a JSON
/// envelope, or if a known command's payload is missing or ill-typed.
pub fn decode_client_message(text: &str) -> Result<Inbound, ProtocolError> {
    let envelope: Envelope = serde_json::from_str(text)
        .map_err(|e| ProtocolError::MalformedMessage(format!("invalid envelope: {e}")))?;

    let command = match envelope.kind.as_str() {
        "toggle" => ClientCommand::Toggle(required_payload("toggle", envelope.data)?),
        "start" => ClientCommand::Start,
        "stop" => ClientCommand::Stop,
        "clear" => ClientCommand::Clear,
        "random" => {
            let payload = match envelope.data {
                None | Some(serde_json::Value::Null) => RandomPayload { density: None },
                Some(value) => parse_payload("random", value)?,
            };
            if let Some(density) = payload.density.filter(|d| !(0.0..=1.0).contains(d)) {
                return Err(ProtocolError::MalformedMessage(format!(
                    "random: density {density} is outside [0, 1]"
                )));
            }
            ClientCommand::Random(payload)
        }
        "save" => ClientCommand::Save(required_payload("save", envelope.data)?),
        "load" => ClientCommand::Load(required_payload("load", envelope.data)?),
        _ => return Ok(Inbound::Unknown(envelope.kind)),
    };

    Ok(Inbound::Command(command))
}

fn required_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    data: Option<serde_json::Value>,
) -> Result<T, ProtocolError> {
    match data {
        None | Some(serde_json::Value::Null) => Err(ProtocolError::MalformedMessage(format!(
            "{kind}: missing data"
        ))),
        Some(value) => parse_payload(kind, value),
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: &str,
    value: serde_json::Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(value)
        .map_err(|e| ProtocolError::MalformedMessage(format!("{kind}: {e}")))
}

/// Category of a per-command failure reported to the originating client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum ErrorKind {
    /// Coordinate outside the grid.
    OutOfBounds,
    /// Replacement grid has the wrong shape.
    DimensionMismatch,
    /// Empty or unusable pattern name.
    InvalidName,
    /// No pattern under that name.
    NotFound,
    /// Undecodable frame or payload.
    MalformedMessage,
    /// Randomization density outside `[0, 1]`.
    InvalidDensity,
    /// The pattern store failed.
    Storage,
}

/// Payload of an `error` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorPayload {
    /// Machine-readable category.
    pub kind: ErrorKind,
    /// Human-readable detail.
    pub message: String,
}

/// A message sent from the server to clients.
///
/// `grid` is the baseline contract; clients that only understand `grid`
/// can ignore the rest.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum ServerMessage<'a> {
    /// Full grid, `data[y][x]`.
    Grid(&'a Grid),
    /// Engine control state.
    Status(SimulationStatus),
    /// A command from this client failed.
    Error(ErrorPayload),
    /// A save from this client completed.
    Saved(NamePayload),
}

impl ServerMessage<'_> {
    /// Serialize to a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
