//! Traits for remote collaborators

use crate::error::Result;
use crate::types::{PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo, TrackId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Receiver of playback reports on the remote media service
///
/// Implemented by the HTTP client in `gramophone-server-client`. Reports are
/// best effort: callers log failures and carry on.
#[async_trait]
pub trait PlaybackReporter: Send + Sync {
    /// User the reports are attributed to, if signed in
    fn user_id(&self) -> Option<String>;

    /// A track started playing
    async fn report_playback_start(&self, info: &PlaybackStartInfo) -> Result<()>;

    /// Periodic position update
    async fn report_playback_progress(&self, info: &PlaybackProgressInfo) -> Result<()>;

    /// The track ended or playback stopped
    async fn report_playback_stopped(&self, info: &PlaybackStopInfo) -> Result<()>;

    /// Mark a track as played for a user
    async fn mark_played(
        &self,
        track_id: &TrackId,
        user_id: &str,
        played_at: DateTime<Utc>,
    ) -> Result<()>;
}
