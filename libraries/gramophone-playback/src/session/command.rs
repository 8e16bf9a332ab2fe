//! Commands accepted by the session

use crate::focus::FocusChange;
use crate::progress::ProgressSample;
use crate::types::{PlaybackState, RepeatMode, ShuffleMode};
use gramophone_core::Track;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::oneshot;

/// Requests handled by the session's command context
///
/// Every command may be delivered more than once; repeated delivery leaves
/// the session where a single delivery would.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Play,
    Pause,
    Toggle,

    /// Next track; `force` skips past repeat-one
    Skip { force: bool },

    /// Previous track; `force` skips past repeat-one
    Previous { force: bool },

    /// Restart the track if it has played a while, else go to the previous one
    Back { force: bool },

    Seek(Duration),

    /// Select and play the track at an index of the effective order
    PlayAt(usize),

    /// Select the track at an index without starting it
    SetPosition(usize),

    /// Replace the queue
    OpenQueue {
        tracks: Vec<Track>,
        start: usize,
        start_playing: bool,
    },

    /// Replace the queue with a playlist and play it; `shuffle` defaults to the current mode
    PlayPlaylist {
        tracks: Vec<Track>,
        shuffle: Option<ShuffleMode>,
    },

    /// Insert at `index` (or append) in both orders
    AddTracks {
        index: Option<usize>,
        tracks: Vec<Track>,
    },

    RemoveTrack(usize),

    MoveTrack { from: usize, to: usize },

    ClearQueue,

    SetShuffle(ShuffleMode),
    ToggleShuffle,

    SetRepeat(RepeatMode),
    CycleRepeat,

    FocusChanged(FocusChange),

    /// Audio output is about to become noisy (headphones unplugged)
    BecomingNoisy,

    /// The ducking preference changed
    SetAudioDucking(bool),

    /// Quit once the current track ends
    PendingQuit,

    /// Stop playback and shut the session down
    Quit,
}

/// Everything the command context receives
#[derive(Debug)]
pub(crate) enum Inbound {
    Command(SessionCommand),
    Restored(Option<SavedSession>),
    Snapshot(oneshot::Sender<SessionSnapshot>),
    Sample(oneshot::Sender<Option<ProgressSample>>),
}

/// Persisted state as read back at startup, before validation
#[derive(Debug, Clone, Default)]
pub(crate) struct SavedSession {
    pub playing: Vec<Track>,
    pub original: Vec<Track>,
    pub position: i64,
    pub progress_ms: i64,
}

/// Observable session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: PlaybackState,
    pub tracks: Vec<Track>,
    pub original_tracks: Vec<Track>,
    pub position: Option<usize>,
    pub shuffle: ShuffleMode,
    pub repeat: RepeatMode,
    pub progress: Option<Duration>,
    pub duration: Option<Duration>,
    pub volume: u8,
    pub paused_by_transient_loss: bool,
    pub pending_quit: bool,
}

impl SessionSnapshot {
    pub fn current(&self) -> Option<&Track> {
        self.position.and_then(|p| self.tracks.get(p))
    }
}
