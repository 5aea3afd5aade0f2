//! Error types for the session hub and the REST API.
//!
//! [`HubError`] covers failures talking to or from the hub actor.
//! [`ApiError`] unifies REST failure modes and converts into an Axum
//! response via its [`IntoResponse`] implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use lifesync_archive::ArchiveError;
use lifesync_types::SessionId;

/// Errors raised by the session hub.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HubError {
    /// A session's outbox could not take a frame; the session is dropped.
    #[error("transport failure for session {id}: {reason}")]
    TransportFailure {
        /// The dropped session.
        id: SessionId,
        /// Why delivery failed.
        reason: &'static str,
    },

    /// The hub actor has stopped and no longer accepts commands.
    #[error("session hub is not running")]
    Closed,
}

/// Errors that can occur in the REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request was well-formed but its values are unacceptable.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The session hub is not accepting commands.
    #[error("unavailable: {0}")]
    Unavailable(#[from] HubError),

    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ArchiveError> for ApiError {
    fn from(e: ArchiveError) -> Self {
        match e {
            ArchiveError::NotFound(name) => Self::NotFound(format!("pattern {name:?}")),
            ArchiveError::InvalidName { .. } => Self::BadRequest(e.to_string()),
            ArchiveError::Io(_) | ArchiveError::Serialization(_) | ArchiveError::Corrupt { .. } => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
