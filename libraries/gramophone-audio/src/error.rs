//! Audio backend error types

use thiserror::Error;

/// Decoding, fetching and output errors
#[derive(Debug, Error)]
pub enum AudioError {
    /// Source could not be opened or recognised
    #[error("Failed to open source: {0}")]
    Open(String),

    /// Source has no track symphonia can decode
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// Packet decoding or seeking failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// Sample rate conversion failed
    #[error("Resampling error: {0}")]
    Resample(String),

    /// No output device, or the stream could not be built
    #[error("Audio output error: {0}")]
    Output(String),

    /// Remote source could not be downloaded
    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AudioError>;
