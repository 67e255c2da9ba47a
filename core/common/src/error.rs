//! Common error types for drivekit.

use thiserror::Error;

/// Top-level error type for drivekit operations.
#[derive(Debug, Error)]
pub enum Error {
    /// An enumerator was dereferenced outside its valid range.
    ///
    /// This is always a local contract violation, never a remote condition.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Network request failed or the server answered with an error status.
    #[error("Network error: {0}")]
    Network(String),

    /// Access token missing, expired or rejected.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The server refused access to the resource.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// An in-flight request was aborted through its cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Whether this error came from the remote side of a call.
    ///
    /// Backend failures leave paging state untouched, so the failed call
    /// can be repeated as-is.
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Error::Network(_)
                | Error::Authentication(_)
                | Error::PermissionDenied(_)
                | Error::NotFound(_)
                | Error::AlreadyExists(_)
                | Error::Serialization(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
