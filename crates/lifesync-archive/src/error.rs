//! Error types for the pattern archive.
//!
//! All store operations return [`ArchiveError`], which wraps the
//! underlying I/O and serialization errors with the pattern involved.

/// Errors that can occur in the pattern archive.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    /// The pattern name is empty or cannot be stored.
    #[error("invalid pattern name {name:?}: {reason}")]
    InvalidName {
        /// The rejected name.
        name: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No pattern is stored under this name.
    #[error("pattern not found: {0}")]
    NotFound(String),

    /// A filesystem operation failed.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored record parsed but is inconsistent.
    #[error("pattern {name:?} is corrupt: {reason}")]
    Corrupt {
        /// The affected pattern.
        name: String,
        /// What is wrong with it.
        reason: String,
    },
}
