//! Gramophone - Playback Session
//!
//! The playback core of the Gramophone daemon.
//!
//! This crate provides:
//! - Dual-order play queue (effective order + original order) with a cursor
//! - Anchored shuffle and repeat modes (Off, All, One)
//! - Playback engines with a gapless "next source" slot, for local files
//!   and for HTTP streams sniffed by content type
//! - Audio focus handling with a stepped ducking ramp
//! - Queue persistence on its own context, restored at startup
//! - Periodic progress reporting to a remote media service
//!
//! # Architecture
//!
//! `gramophone-playback` does not know about SQLite or HTTP APIs. Storage and
//! remote reporting come in through the traits in `gramophone-core`; audio
//! output comes in through [`engine::MediaBackend`].
//!
//! The session serializes all state changes through one command task.
//! Engine callbacks and timers are messages to that task, never direct
//! calls, and are tagged so that stale ones are dropped.
//!
//! # Example: Queue
//!
//! ```rust
//! use gramophone_core::Track;
//! use gramophone_playback::{PlayingQueue, RepeatMode, ShuffleMode};
//!
//! let tracks: Vec<Track> = (0..3)
//!     .map(|i| Track::new(format!("Song {i}"), format!("/music/{i}.flac")))
//!     .collect();
//!
//! let mut queue = PlayingQueue::new(ShuffleMode::Off);
//! queue.open(tracks, 2).unwrap();
//!
//! assert_eq!(queue.cursor(), Some(2));
//! assert_eq!(queue.next_position(RepeatMode::All, false), Some(0));
//! assert_eq!(queue.next_position(RepeatMode::Off, false), Some(2));
//! ```

#![forbid(unsafe_code)]

pub mod engine;
pub mod error;
pub mod events;
pub mod focus;
pub mod progress;
pub mod queue;
pub mod session;
pub mod shuffle;
pub mod types;
pub mod volume;

pub use engine::{EngineEvent, HeadlessBackend, LocalPlayer, Playback, StreamingPlayer};
pub use error::{PlaybackError, Result};
pub use events::{Advisory, NowPlaying, PlaybackStatus, SessionEvent};
pub use focus::{Ducker, FocusChange};
pub use progress::{ProgressEvent, ProgressReporter, ProgressSample, SampleSource};
pub use queue::PlayingQueue;
pub use session::{
    HeadlessPlatform, Platform, Session, SessionBuilder, SessionCommand, SessionHandle,
    SessionSnapshot,
};
pub use types::{PlaybackConfig, PlaybackState, ProgressConfig, RepeatMode, ShuffleMode};
pub use volume::Volume;
