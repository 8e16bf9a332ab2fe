//! Payloads sent to the remote media service while a track plays

use crate::types::TrackId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Remote position unit: 100 ns ticks
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Convert a playback position into remote ticks
pub fn ticks(position: Duration) -> i64 {
    i64::try_from(position.as_millis())
        .unwrap_or(i64::MAX / TICKS_PER_MILLISECOND)
        .saturating_mul(TICKS_PER_MILLISECOND)
}

/// Sent once when a track starts playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStartInfo {
    pub item_id: TrackId,
    pub volume_level: u8,
    pub can_seek: bool,
    pub is_paused: bool,
}

/// Sent periodically while a track is active
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackProgressInfo {
    pub item_id: TrackId,
    pub position_ticks: i64,
    pub volume_level: u8,
    pub is_paused: bool,
    pub can_seek: bool,
}

impl PlaybackProgressInfo {
    pub fn new(item_id: TrackId, position: Duration, volume_level: u8, is_paused: bool) -> Self {
        Self {
            item_id,
            position_ticks: ticks(position),
            volume_level,
            is_paused,
            can_seek: true,
        }
    }
}

/// Sent when a track ends or playback stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStopInfo {
    pub item_id: TrackId,
    pub position_ticks: i64,
}

impl PlaybackStopInfo {
    pub fn new(item_id: TrackId, position: Duration) -> Self {
        Self {
            item_id,
            position_ticks: ticks(position),
        }
    }
}
