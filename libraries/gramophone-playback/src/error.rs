//! Error types for playback management

use thiserror::Error;

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Playback management errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// Index out of bounds
    #[error("Index out of bounds: {index} (len: {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    /// Saved queue failed validation
    #[error("Saved queue rejected: {0}")]
    InvalidRestore(String),

    /// The session task has shut down
    #[error("Playback session is closed")]
    SessionClosed,

    /// Collaborator failure (store, remote service)
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl From<gramophone_core::GramophoneError> for PlaybackError {
    fn from(err: gramophone_core::GramophoneError) -> Self {
        Self::Collaborator(err.to_string())
    }
}
