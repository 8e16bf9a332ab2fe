//! Gramophone Audio - decoding and output backend for the playback engine
//!
//! Implements [`MediaBackend`](gramophone_playback::engine::MediaBackend) on
//! symphonia for decoding, rubato for resampling to the device rate and cpal
//! for output. Local files, progressive HTTP streams and HLS playlists are
//! supported.
//!
//! # Example
//!
//! ```rust,no_run
//! use gramophone_audio::AudioBackendFactory;
//! use gramophone_playback::engine::{self, LocalPlayer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let factory = Arc::new(AudioBackendFactory::new()?);
//! let (notifier, _events) = engine::channel();
//! let player = LocalPlayer::local(factory, notifier);
//! # drop(player);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod decoder;
pub mod error;
pub mod output;
mod renderer;
pub mod source;

pub use backend::{AudioBackend, AudioBackendFactory};
pub use decoder::TrackDecoder;
pub use error::{AudioError, Result};
pub use output::AudioOutput;
pub use source::SourceLoader;
