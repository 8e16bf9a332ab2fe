//! Storage traits consumed by the playback session
//!
//! The session never talks to a database directly. It persists its queue and
//! a handful of integer preferences through these two traits, which lets the
//! SQLite implementation live in `gramophone-storage` and tests swap in
//! in-memory stores.

use crate::error::Result;
use crate::types::Track;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Which of the two persisted queue orders a row belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueueSlot {
    /// The effective (possibly shuffled) order
    Playing,

    /// The order the queue was opened with
    Original,
}

impl QueueSlot {
    /// Stable integer code stored alongside queue rows
    pub fn code(self) -> i64 {
        match self {
            Self::Playing => 0,
            Self::Original => 1,
        }
    }
}

/// Persistent track and queue store
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Remove every stored queue track
    async fn delete_tracks(&self) -> Result<()>;

    /// Store track metadata for later queue lookups
    async fn insert_tracks(&self, tracks: &[Track]) -> Result<()>;

    /// Remove both stored queue orders
    async fn delete_queue(&self) -> Result<()>;

    /// Store `tracks` as the given queue order
    async fn set_queue(&self, tracks: &[Track], slot: QueueSlot) -> Result<()>;

    /// Load a queue order; an empty list when nothing was saved
    async fn get_queue(&self, slot: QueueSlot) -> Result<Vec<Track>>;
}

/// Preference keys used by the session
pub mod keys {
    /// Shuffle mode code
    pub const SHUFFLE: &str = "shuffle";

    /// Repeat mode code
    pub const REPEAT: &str = "repeat";

    /// Cursor into the effective order, -1 for none
    pub const POSITION: &str = "position";

    /// Progress in the current track in milliseconds
    pub const PROGRESS: &str = "progress";

    /// Whether transient focus loss ducks (1) or leaves volume alone (0)
    pub const AUDIO_DUCKING: &str = "audio_ducking";
}

/// Key-value preference store with integer fields
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Read an integer preference
    async fn get_int(&self, key: &str) -> Result<Option<i64>>;

    /// Write an integer preference
    async fn set_int(&self, key: &str, value: i64) -> Result<()>;

    /// Read an integer preference, falling back to `default` when unset
    async fn get_int_or(&self, key: &str, default: i64) -> Result<i64> {
        Ok(self.get_int(key).await?.unwrap_or(default))
    }
}
