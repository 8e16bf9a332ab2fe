//! Session Events
//!
//! Outbound signals for UI, widgets and other listeners. They are published
//! on a broadcast channel from the command context:
//! - State changes (play/pause/prepare/end)
//! - Meta changes (a different track became current)
//! - Queue changes (contents or order)
//! - Shuffle and repeat mode changes
//! - Advisories (short user-visible warnings)

use crate::types::{PlaybackState, RepeatMode, ShuffleMode};
use gramophone_core::Track;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Events emitted by the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    /// Play/pause/prepare state changed
    StateChanged(PlaybackStatus),

    /// The current track changed
    MetaChanged(NowPlaying),

    /// Queue contents or order changed
    QueueChanged {
        /// Number of tracks in the queue
        length: usize,
        /// Cursor into the effective order
        position: Option<usize>,
    },

    ShuffleModeChanged { mode: ShuffleMode },

    RepeatModeChanged { mode: RepeatMode },

    /// The queue is empty; now-playing surfaces should be torn down
    NowPlayingCleared,

    /// Short warning for the listener
    Advisory { advisory: Advisory },

    /// The session is shutting down
    Quit,
}

/// Snapshot carried by [`SessionEvent::StateChanged`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackStatus {
    pub state: PlaybackState,
    pub position: Option<usize>,
    pub progress: Option<Duration>,
}

/// Track metadata carried by [`SessionEvent::MetaChanged`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NowPlaying {
    pub track: Track,
    pub position: usize,
    pub queue_length: usize,
}

/// User-visible warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Advisory {
    /// A source could not be sniffed or decoded
    UnplayableFile,

    /// Another app kept audio focus
    AudioFocusDenied,

    /// "Play playlist" was asked for an empty list
    PlaylistEmpty,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::UnplayableFile => "Couldn't play this file",
            Self::AudioFocusDenied => "Audio focus denied",
            Self::PlaylistEmpty => "Playlist is empty",
        };
        f.write_str(text)
    }
}
