//! Error types for the media server client.

use thiserror::Error;

/// Errors that can occur when talking to the remote media server.
#[derive(Error, Debug)]
pub enum ServerClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Server returned an error response
    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// Authentication required but no token available, or the token was rejected
    #[error("Authentication required")]
    AuthRequired,

    /// Invalid server URL
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Server is offline or unreachable
    #[error("Server unreachable: {0}")]
    ServerUnreachable(String),
}

/// Result type for server client operations.
pub type Result<T> = std::result::Result<T, ServerClientError>;

impl From<ServerClientError> for gramophone_core::GramophoneError {
    fn from(err: ServerClientError) -> Self {
        match err {
            ServerClientError::ServerUnreachable(msg) => Self::Network(msg),
            other => Self::remote(other.to_string()),
        }
    }
}
