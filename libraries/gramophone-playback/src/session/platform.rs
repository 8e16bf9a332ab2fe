//! Host platform hooks

use std::time::Duration;
use tracing::trace;

/// Services the host provides to the session
pub trait Platform: Send + Sync {
    /// Ask for audio focus; `false` means another app keeps it
    fn request_audio_focus(&self) -> bool;

    fn abandon_audio_focus(&self);

    /// Keep the host awake for at most `timeout`
    fn acquire_wake_lock(&self, timeout: Duration);

    fn release_wake_lock(&self);
}

/// Platform without focus arbitration or power management
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessPlatform;

impl Platform for HeadlessPlatform {
    fn request_audio_focus(&self) -> bool {
        true
    }

    fn abandon_audio_focus(&self) {}

    fn acquire_wake_lock(&self, timeout: Duration) {
        trace!(?timeout, "Wake lock acquired");
    }

    fn release_wake_lock(&self) {
        trace!("Wake lock released");
    }
}
