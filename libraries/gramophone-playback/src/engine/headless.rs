//! Headless media backend
//!
//! Renders no audio but keeps an accurate clock on the tokio timer, so the
//! rest of the player (preparation, play-when-ready, seeking, gapless
//! handoff, end of media) behaves as it would against a real decoder. Used
//! by the daemon when no output device is wanted, and by tests together with
//! a paused tokio clock.

use super::{BackendEvent, BackendOutcome, EngineNotifier, MediaBackend, MediaItem};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Timer-driven backend without audio output
pub struct HeadlessBackend {
    notifier: EngineNotifier,

    /// Current item, then the pending one
    items: Vec<MediaItem>,

    load_token: u64,
    timer_token: u64,

    prepared: bool,
    play_when_ready: bool,

    /// Position when the clock was last anchored
    offset: Duration,
    /// Set while the clock runs
    anchor: Option<Instant>,

    gain: f32,
    prepare_delay: Duration,
    failure_marker: Option<String>,

    prepare_task: Option<JoinHandle<()>>,
    finish_task: Option<JoinHandle<()>>,
}

impl HeadlessBackend {
    pub fn new(notifier: EngineNotifier) -> Self {
        Self {
            notifier,
            items: Vec::with_capacity(2),
            load_token: 0,
            timer_token: 0,
            prepared: false,
            play_when_ready: false,
            offset: Duration::ZERO,
            anchor: None,
            gain: 1.0,
            prepare_delay: Duration::ZERO,
            failure_marker: None,
            prepare_task: None,
            finish_task: None,
        }
    }

    /// Simulated time between load and readiness
    pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
        self.prepare_delay = delay;
        self
    }

    /// Items whose URI contains `marker` fail to decode
    pub fn with_failure_marker(mut self, marker: impl Into<String>) -> Self {
        self.failure_marker = Some(marker.into());
        self
    }

    /// Why `item` cannot be played, if it cannot
    ///
    /// Nothing is decoded, so an item without a known duration would never
    /// reach its end.
    fn unplayable(&self, item: &MediaItem) -> Option<String> {
        if item.duration.is_none() {
            return Some(format!("unknown duration for {}", item.uri));
        }
        let marked = self
            .failure_marker
            .as_deref()
            .is_some_and(|marker| item.uri.contains(marker));
        (item.uri.is_empty() || marked).then(|| format!("cannot decode {}", item.uri))
    }

    fn cancel_finish(&mut self) {
        self.timer_token += 1;
        if let Some(task) = self.finish_task.take() {
            task.abort();
        }
    }

    fn cancel_all(&mut self) {
        self.cancel_finish();
        self.load_token += 1;
        if let Some(task) = self.prepare_task.take() {
            task.abort();
        }
    }

    /// Arm the end-of-item timer for the running clock
    fn schedule_finish(&mut self) {
        self.cancel_finish();
        if self.anchor.is_none() {
            return;
        }
        let Some(duration) = self.duration() else {
            return;
        };

        let remaining = duration.saturating_sub(self.position());
        let token = self.timer_token;
        let notifier = self.notifier.clone();
        self.finish_task = Some(tokio::spawn(async move {
            tokio::time::sleep(remaining).await;
            notifier.backend_event(BackendEvent::Finished { token });
        }));
    }

    fn start_clock(&mut self) {
        self.anchor = Some(Instant::now());
        self.schedule_finish();
    }

    fn freeze_clock(&mut self) {
        self.offset = self.position();
        self.anchor = None;
        self.cancel_finish();
    }
}

impl MediaBackend for HeadlessBackend {
    fn load(&mut self, item: MediaItem) {
        self.cancel_all();
        debug!(uri = %item.uri, kind = ?item.kind, "Headless backend loading");

        let token = self.load_token;
        let failure = self.unplayable(&item);
        self.items.clear();
        self.items.push(item);
        self.prepared = false;
        self.offset = Duration::ZERO;
        self.anchor = None;

        let notifier = self.notifier.clone();
        let delay = self.prepare_delay;
        self.prepare_task = Some(tokio::spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let event = match failure {
                Some(message) => BackendEvent::Failed { token, message },
                None => BackendEvent::Prepared { token },
            };
            notifier.backend_event(event);
        }));
    }

    fn append(&mut self, item: MediaItem) {
        if self.items.is_empty() {
            self.load(item);
            return;
        }
        self.items.truncate(1);
        self.items.push(item);
    }

    fn clear_pending(&mut self) {
        self.items.truncate(1);
    }

    fn clear(&mut self) {
        self.cancel_all();
        self.items.clear();
        self.prepared = false;
        self.offset = Duration::ZERO;
        self.anchor = None;
    }

    fn set_play_when_ready(&mut self, play: bool) {
        if self.play_when_ready == play {
            return;
        }
        self.play_when_ready = play;
        if !self.prepared {
            return;
        }
        if play {
            self.start_clock();
        } else {
            self.freeze_clock();
        }
    }

    fn seek(&mut self, position: Duration) {
        self.offset = match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        };
        if self.anchor.is_some() {
            self.start_clock();
        }
    }

    fn position(&self) -> Duration {
        let running = self.anchor.map(|a| a.elapsed()).unwrap_or_default();
        let position = self.offset + running;
        match self.duration() {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    fn duration(&self) -> Option<Duration> {
        self.items.first().and_then(|item| item.duration)
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn on_event(&mut self, event: BackendEvent) -> Option<BackendOutcome> {
        match event {
            BackendEvent::Prepared { token } if token == self.load_token && !self.prepared => {
                self.prepared = true;
                if self.play_when_ready {
                    self.start_clock();
                }
                Some(BackendOutcome::Prepared)
            }
            BackendEvent::Failed { token, message } if token == self.load_token => {
                Some(BackendOutcome::Failed(message))
            }
            BackendEvent::Finished { token } if token == self.timer_token && self.prepared => {
                if self.items.len() > 1 {
                    self.items.remove(0);
                    if let Some(message) = self.unplayable(&self.items[0]) {
                        self.freeze_clock();
                        return Some(BackendOutcome::HandoffFailed(message));
                    }
                    self.offset = Duration::ZERO;
                    self.start_clock();
                    Some(BackendOutcome::Transitioned)
                } else {
                    self.freeze_clock();
                    self.play_when_ready = false;
                    Some(BackendOutcome::Ended)
                }
            }
            _ => None,
        }
    }

    fn release(&mut self) {
        self.clear();
    }
}

impl Drop for HeadlessBackend {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
