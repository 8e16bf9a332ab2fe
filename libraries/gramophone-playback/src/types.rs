//! Core types for playback management

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use gramophone_core::types::{RepeatMode, ShuffleMode};

/// Conceptual session state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// No track loaded
    #[default]
    Idle,

    /// A source is loaded but the engine has not signalled readiness
    Preparing,

    /// Currently playing
    Playing,

    /// Ready but not playing
    Paused,

    /// Reached the end of the queue and rewound
    Ended,
}

/// Configuration for the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Lower the volume on transient focus loss instead of ignoring it (default: true)
    pub audio_ducking: bool,

    /// "Back" restarts the track when more than this much has played (default: 5000)
    pub back_restart_threshold_ms: u64,

    /// Quiet period after the last seek before a state change is raised (default: 500)
    pub seek_notify_throttle_ms: u64,

    /// Delay between ducking volume steps (default: 10)
    pub duck_step_interval_ms: u64,

    /// Wake lock held while handling end of media (default: 30000)
    pub end_of_media_wake_lock_ms: u64,

    /// Remote progress reporting
    pub progress: ProgressConfig,
}

impl PlaybackConfig {
    pub fn back_restart_threshold(&self) -> Duration {
        Duration::from_millis(self.back_restart_threshold_ms)
    }

    pub fn seek_notify_throttle(&self) -> Duration {
        Duration::from_millis(self.seek_notify_throttle_ms)
    }

    pub fn duck_step_interval(&self) -> Duration {
        Duration::from_millis(self.duck_step_interval_ms)
    }

    pub fn end_of_media_wake_lock(&self) -> Duration {
        Duration::from_millis(self.end_of_media_wake_lock_ms)
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            audio_ducking: true,
            back_restart_threshold_ms: 5000,
            seek_notify_throttle_ms: 500,
            duck_step_interval_ms: 10,
            end_of_media_wake_lock_ms: 30_000,
            progress: ProgressConfig::default(),
        }
    }
}

/// Configuration for the progress reporter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressConfig {
    /// Sampling interval in seconds (default: 10)
    pub interval_secs: u64,

    /// Fraction of the track after which it is marked played (default: 0.9)
    pub played_threshold: f64,
}

impl ProgressConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            played_threshold: 0.9,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PlaybackConfig::default();
        assert!(config.audio_ducking);
        assert_eq!(config.back_restart_threshold(), Duration::from_secs(5));
        assert_eq!(config.seek_notify_throttle(), Duration::from_millis(500));
        assert_eq!(config.duck_step_interval(), Duration::from_millis(10));
        assert_eq!(config.progress.interval(), Duration::from_secs(10));
        assert_eq!(config.progress.played_threshold, 0.9);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: PlaybackConfig =
            serde_json::from_str(r#"{ "audio_ducking": false, "progress": { "interval_secs": 5 } }"#)
                .unwrap();
        assert!(!config.audio_ducking);
        assert_eq!(config.progress.interval_secs, 5);
        assert_eq!(config.progress.played_threshold, 0.9);
        assert_eq!(config.back_restart_threshold_ms, 5000);
    }
}
