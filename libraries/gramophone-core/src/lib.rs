//! Gramophone Core
//!
//! Platform-agnostic domain types, collaborator traits, and error handling
//! shared by every Gramophone crate.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `ShuffleMode`, `RepeatMode`, report payloads
//! - **Collaborator Traits**: `QueueStore`, `PreferenceStore`, `PlaybackReporter`
//! - **Error Handling**: Unified `GramophoneError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use gramophone_core::types::{RepeatMode, Track};
//! use std::time::Duration;
//!
//! let track = Track::new("Intro", "https://media.example.com/Audio/42/universal")
//!     .with_artist("Some Band")
//!     .with_duration(Duration::from_secs(183));
//!
//! assert_eq!(RepeatMode::Off.cycle(), RepeatMode::All);
//! assert_eq!(track.duration, Some(Duration::from_secs(183)));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod storage;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use error::{GramophoneError, Result};
pub use storage::{PreferenceStore, QueueSlot, QueueStore};
pub use traits::PlaybackReporter;
pub use types::{RepeatMode, ShuffleMode, Track, TrackId};
