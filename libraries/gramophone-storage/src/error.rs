/// Storage-specific errors
use thiserror::Error;

/// Result type alias using `StorageError`
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types
#[derive(Error, Debug)]
pub enum StorageError {
    /// Stored row does not describe a valid value
    #[error("Corrupt {entity} row: {reason}")]
    Corrupt { entity: String, reason: String },

    /// Migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Database error from `SQLx`
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl StorageError {
    /// Create a corrupt row error
    pub fn corrupt(entity: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            entity: entity.into(),
            reason: reason.into(),
        }
    }
}

impl From<StorageError> for gramophone_core::GramophoneError {
    fn from(err: StorageError) -> Self {
        gramophone_core::GramophoneError::storage(err.to_string())
    }
}
