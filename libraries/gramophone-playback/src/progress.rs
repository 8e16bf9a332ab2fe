//! Remote progress reporting
//!
//! Runs on its own task with its own timer. The command context tells it
//! when a track starts, changes or ends; in between it samples the session
//! every `interval` and reports the position to the remote media service,
//! marking the track played once it passes `played_threshold` of its length.
//!
//! The timer is plain task state: replacing or dropping it cancels it, so no
//! tick can outlive the track it was started for.

use crate::types::ProgressConfig;
use async_trait::async_trait;
use chrono::Utc;
use gramophone_core::types::{PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo};
use gramophone_core::{PlaybackReporter, TrackId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, warn};

/// Point-in-time view of the current track's playback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSample {
    pub track_id: TrackId,
    /// `None` while the engine is not ready
    pub progress: Option<Duration>,
    pub duration: Option<Duration>,
    pub volume: u8,
    pub is_playing: bool,
}

/// Lifecycle signals from the command context
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Playback (re)started; restarts the sampling timer
    TrackStarted(ProgressSample),

    /// Automatic transition to the next track
    TrackChanged(ProgressSample),

    /// The track ended or playback stopped; cancels the timer
    TrackEnded(Option<ProgressSample>),

    /// Final report, then exit
    Shutdown(Option<ProgressSample>),
}

/// Where the reporter gets periodic samples from
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn sample(&self) -> Option<ProgressSample>;
}

/// Progress reporting task state
pub struct ProgressReporter<S> {
    reporter: Arc<dyn PlaybackReporter>,
    source: S,
    config: ProgressConfig,
    /// Track already marked played during its current run
    played: Option<TrackId>,
}

impl<S: SampleSource + 'static> ProgressReporter<S> {
    pub fn new(reporter: Arc<dyn PlaybackReporter>, source: S, config: ProgressConfig) -> Self {
        Self {
            reporter,
            source,
            config,
            played: None,
        }
    }

    /// Run on a new task fed by `rx`
    pub fn spawn(self, rx: mpsc::UnboundedReceiver<ProgressEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<ProgressEvent>) {
        let mut ticker: Option<Interval> = None;

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(ProgressEvent::TrackStarted(sample)) => {
                        ticker = Some(self.new_ticker());
                        if self.played.as_ref() != Some(&sample.track_id) {
                            self.played = None;
                        }
                        self.report_start(&sample).await;
                    }
                    Some(ProgressEvent::TrackChanged(sample)) => {
                        self.played = None;
                        self.report_start(&sample).await;
                    }
                    Some(ProgressEvent::TrackEnded(sample)) => {
                        ticker = None;
                        if let Some(sample) = sample {
                            self.report_stop(&sample).await;
                        }
                    }
                    Some(ProgressEvent::Shutdown(sample)) => {
                        if let Some(sample) = sample {
                            self.report_stop(&sample).await;
                        }
                        break;
                    }
                    None => break,
                },
                () = next_tick(&mut ticker) => self.report_progress().await,
            }
        }
        debug!("Progress reporter stopped");
    }

    fn new_ticker(&self) -> Interval {
        let period = self.config.interval().max(Duration::from_millis(1));
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    async fn report_start(&self, sample: &ProgressSample) {
        let info = PlaybackStartInfo {
            item_id: sample.track_id.clone(),
            volume_level: sample.volume,
            can_seek: true,
            is_paused: false,
        };
        if let Err(e) = self.reporter.report_playback_start(&info).await {
            warn!(error = %e, track = %sample.track_id, "Failed to report playback start");
        }
    }

    async fn report_stop(&self, sample: &ProgressSample) {
        let info = PlaybackStopInfo::new(
            sample.track_id.clone(),
            sample.progress.unwrap_or_default(),
        );
        if let Err(e) = self.reporter.report_playback_stopped(&info).await {
            warn!(error = %e, track = %sample.track_id, "Failed to report playback stop");
        }
    }

    async fn report_progress(&mut self) {
        let Some(sample) = self.source.sample().await else {
            return;
        };
        let Some(progress) = sample.progress else {
            return;
        };

        if self.crossed_played_threshold(&sample, progress) {
            self.played = Some(sample.track_id.clone());
            self.mark_played(&sample.track_id).await;
        }

        let info = PlaybackProgressInfo::new(
            sample.track_id.clone(),
            progress,
            sample.volume,
            !sample.is_playing,
        );
        if let Err(e) = self.reporter.report_playback_progress(&info).await {
            warn!(error = %e, track = %sample.track_id, "Failed to report playback progress");
        }
    }

    fn crossed_played_threshold(&self, sample: &ProgressSample, progress: Duration) -> bool {
        if self.played.as_ref() == Some(&sample.track_id) {
            return false;
        }
        match sample.duration {
            Some(duration) if !duration.is_zero() => {
                progress.as_secs_f64() / duration.as_secs_f64() > self.config.played_threshold
            }
            _ => false,
        }
    }

    async fn mark_played(&self, track_id: &TrackId) {
        let Some(user_id) = self.reporter.user_id() else {
            debug!(track = %track_id, "No signed-in user, not marking played");
            return;
        };
        if let Err(e) = self.reporter.mark_played(track_id, &user_id, Utc::now()).await {
            warn!(error = %e, track = %track_id, "Failed to mark track played");
        }
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending().await,
    }
}
