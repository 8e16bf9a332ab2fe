//! Session state machine
//!
//! Owns the queue, the engine and the ducking ramp. Runs on the command
//! task only; other contexts reach it through messages.

use super::command::{Inbound, SavedSession, SessionCommand, SessionSnapshot};
use super::persistence::PersistenceMessage;
use super::platform::Platform;
use crate::engine::{EngineEvent, EngineMessage, Playback, ReadyReason};
use crate::events::{Advisory, NowPlaying, PlaybackStatus, SessionEvent};
use crate::focus::{Ducker, FocusChange};
use crate::progress::{ProgressEvent, ProgressSample};
use crate::queue::PlayingQueue;
use crate::types::{PlaybackConfig, PlaybackState, RepeatMode, ShuffleMode};
use gramophone_core::Track;
use rand::Rng;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// How long teardown waits for each helper task to finish
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Change {
    State,
    Meta,
    Queue,
    Shuffle,
    Repeat,
}

pub(crate) struct Helpers {
    pub persistence: mpsc::UnboundedSender<PersistenceMessage>,
    pub persistence_task: JoinHandle<()>,
    pub progress: Option<mpsc::UnboundedSender<ProgressEvent>>,
    pub progress_task: Option<JoinHandle<()>>,
}

pub(crate) struct SessionController {
    config: PlaybackConfig,
    queue: PlayingQueue,
    repeat: RepeatMode,
    engine: Box<dyn Playback>,
    platform: Arc<dyn Platform>,
    events: broadcast::Sender<SessionEvent>,
    helpers: Helpers,

    ducker: Ducker,
    next_duck_step: Option<Instant>,
    seek_notify_at: Option<Instant>,

    /// Precomputed position of the source queued for the gapless transition
    next_position: Option<usize>,
    paused_by_transient_loss: bool,
    /// A restored track has not yet been announced as playing
    meta_change_pending: bool,
    /// Saved offset of the restored track, until the engine knows its own
    restored_progress: Option<Duration>,
    queues_restored: bool,
    pending_quit: bool,
    /// Playback was asked for and not since paused
    play_requested: bool,
    /// End of queue reached and rewound
    ended: bool,
    consecutive_errors: usize,
}

impl SessionController {
    pub(crate) fn new(
        config: PlaybackConfig,
        shuffle: ShuffleMode,
        repeat: RepeatMode,
        engine: Box<dyn Playback>,
        platform: Arc<dyn Platform>,
        events: broadcast::Sender<SessionEvent>,
        helpers: Helpers,
    ) -> Self {
        let ducker = Ducker::new(config.audio_ducking);
        Self {
            config,
            queue: PlayingQueue::new(shuffle),
            repeat,
            engine,
            platform,
            events,
            helpers,
            ducker,
            next_duck_step: None,
            seek_notify_at: None,
            next_position: None,
            paused_by_transient_loss: false,
            meta_change_pending: false,
            restored_progress: None,
            queues_restored: false,
            pending_quit: false,
            play_requested: false,
            ended: false,
            consecutive_errors: 0,
        }
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    pub(crate) fn handle_inbound(&mut self, inbound: Inbound) -> ControlFlow<()> {
        match inbound {
            Inbound::Command(command) => return self.handle_command(command),
            Inbound::Restored(saved) => self.on_restored(saved),
            Inbound::Snapshot(reply) => {
                let _ = reply.send(self.snapshot());
            }
            Inbound::Sample(reply) => {
                let _ = reply.send(self.sample());
            }
        }
        ControlFlow::Continue(())
    }

    fn handle_command(&mut self, command: SessionCommand) -> ControlFlow<()> {
        trace!(?command, "Session command");
        match command {
            SessionCommand::Play => self.play(),
            SessionCommand::Pause => self.pause(),
            SessionCommand::Toggle => {
                if self.engine.is_playing() {
                    self.pause();
                } else {
                    self.play();
                }
            }
            SessionCommand::Skip { force } => self.play_next(force),
            SessionCommand::Previous { force } => self.play_previous(force),
            SessionCommand::Back { force } => self.back(force),
            SessionCommand::Seek(position) => self.seek(position),
            SessionCommand::PlayAt(index) => self.play_at(index),
            SessionCommand::SetPosition(index) => self.set_position(index),
            SessionCommand::OpenQueue {
                tracks,
                start,
                start_playing,
            } => self.open_queue(tracks, start, start_playing),
            SessionCommand::PlayPlaylist { tracks, shuffle } => self.play_playlist(tracks, shuffle),
            SessionCommand::AddTracks { index, tracks } => self.add_tracks(index, tracks),
            SessionCommand::RemoveTrack(index) => self.remove_track(index),
            SessionCommand::MoveTrack { from, to } => self.move_track(from, to),
            SessionCommand::ClearQueue => self.clear_queue(),
            SessionCommand::SetShuffle(mode) => self.set_shuffle(mode),
            SessionCommand::ToggleShuffle => self.set_shuffle(self.queue.shuffle_mode().toggled()),
            SessionCommand::SetRepeat(mode) => self.set_repeat(mode),
            SessionCommand::CycleRepeat => self.set_repeat(self.repeat.cycle()),
            SessionCommand::FocusChanged(change) => self.on_focus_change(change),
            SessionCommand::BecomingNoisy => self.pause(),
            SessionCommand::SetAudioDucking(enabled) => self.set_audio_ducking(enabled),
            SessionCommand::PendingQuit => self.pending_quit = true,
            SessionCommand::Quit => {
                self.pending_quit = false;
                return self.quit();
            }
        }
        ControlFlow::Continue(())
    }

    pub(crate) fn handle_engine(&mut self, message: EngineMessage) -> ControlFlow<()> {
        for event in self.engine.handle(message) {
            if self.on_engine_event(event).is_break() {
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    /// Earliest pending timer (ducking step or throttled seek notification)
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        match (self.next_duck_step, self.seek_notify_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub(crate) fn on_timer(&mut self, now: Instant) {
        if self.seek_notify_at.is_some_and(|at| at <= now) {
            self.seek_notify_at = None;
            self.notify(Change::State);
        }
        if self.next_duck_step.is_some_and(|at| at <= now) {
            self.next_duck_step = None;
            if let Some(level) = self.ducker.step() {
                self.engine.set_volume(level);
            }
            self.schedule_duck_step();
        }
    }

    // ========================================================================
    // Transport
    // ========================================================================

    fn play(&mut self) {
        if self.queue.current().is_none() {
            debug!("Nothing to play");
            return;
        }
        if !self.platform.request_audio_focus() {
            self.advise(Advisory::AudioFocusDenied);
            return;
        }

        if !self.engine.is_playing() {
            if self.engine.is_ready() || self.engine.is_loading() {
                self.play_requested = true;
                self.ended = false;
                self.engine.start();
                if std::mem::take(&mut self.meta_change_pending) {
                    self.notify(Change::Meta);
                }
                self.notify(Change::State);
            } else if let Some(cursor) = self.queue.cursor() {
                self.play_at(cursor);
            }
        }
        self.unduck();
    }

    fn pause(&mut self) {
        self.paused_by_transient_loss = false;
        self.play_requested = false;
        if self.engine.is_playing() || self.engine.is_loading() {
            self.engine.pause();
            self.notify(Change::State);
        }
    }

    fn play_at(&mut self, index: usize) {
        if self.load_track(index) {
            self.play();
        }
    }

    fn set_position(&mut self, index: usize) {
        if self.load_track(index) {
            self.play_requested = false;
            self.notify(Change::State);
        }
    }

    /// Point the cursor at `index` and hand its track to the engine
    fn load_track(&mut self, index: usize) -> bool {
        let track = match self.queue.select(index) {
            Ok(track) => track.clone(),
            Err(e) => {
                debug!(error = %e, "Ignoring track selection");
                return false;
            }
        };

        debug!(index, track = %track.id, title = %track.title, "Opening track");
        self.ended = false;
        self.restored_progress = None;
        self.engine.set_data_source(&track);
        self.notify(Change::Meta);
        self.meta_change_pending = false;
        true
    }

    fn play_next(&mut self, force: bool) {
        if let Some(next) = self.queue.next_position(self.repeat, force) {
            self.play_at(next);
        }
    }

    fn play_previous(&mut self, force: bool) {
        if let Some(previous) = self.queue.previous_position(self.repeat, force) {
            self.play_at(previous);
        }
    }

    fn back(&mut self, force: bool) {
        let restart = self
            .engine
            .progress()
            .is_some_and(|progress| progress > self.config.back_restart_threshold());
        if restart {
            self.seek(Duration::ZERO);
        } else {
            self.play_previous(force);
        }
    }

    fn seek(&mut self, position: Duration) {
        self.ended = false;
        self.engine.set_progress(position);
        self.seek_notify_at = Some(Instant::now() + self.config.seek_notify_throttle());
    }

    fn prepare_next(&mut self) {
        self.next_position = self.queue.next_position(self.repeat, false);
        if let Some(track) = self.next_position.and_then(|index| self.queue.get(index)) {
            self.engine.queue_data_source(track);
        }
    }

    // ========================================================================
    // Queue
    // ========================================================================

    fn open_queue(&mut self, tracks: Vec<Track>, start: usize, start_playing: bool) {
        match self.queue.open(tracks, start) {
            Ok(cursor) => {
                if start_playing {
                    self.play_at(cursor);
                } else {
                    self.set_position(cursor);
                }
                self.notify(Change::Queue);
            }
            Err(e) => debug!(error = %e, "Ignoring open queue request"),
        }
    }

    fn play_playlist(&mut self, tracks: Vec<Track>, shuffle: Option<ShuffleMode>) {
        if tracks.is_empty() {
            self.advise(Advisory::PlaylistEmpty);
            return;
        }

        let shuffle = shuffle.unwrap_or(self.queue.shuffle_mode());
        if shuffle.is_on() {
            let start = rand::thread_rng().gen_range(0..tracks.len());
            self.open_queue(tracks, start, true);
            self.set_shuffle(ShuffleMode::On);
        } else {
            self.open_queue(tracks, 0, true);
        }
    }

    fn add_tracks(&mut self, index: Option<usize>, tracks: Vec<Track>) {
        if tracks.is_empty() {
            return;
        }
        match index {
            None => self.queue.append(tracks),
            Some(index) => {
                if let Err(e) = self.queue.insert(index, tracks) {
                    debug!(error = %e, "Ignoring insert request");
                    return;
                }
            }
        }
        self.notify(Change::Queue);
    }

    fn remove_track(&mut self, index: usize) {
        let removal = match self.queue.remove(index) {
            Ok(removal) => removal,
            Err(e) => {
                debug!(error = %e, "Ignoring remove request");
                return;
            }
        };

        if removal.was_current {
            let resume = self.play_requested || self.engine.is_playing();
            match self.queue.cursor() {
                Some(cursor) if resume => self.play_at(cursor),
                Some(cursor) => self.set_position(cursor),
                None => self.pause(),
            }
        }
        self.notify(Change::Queue);
    }

    fn move_track(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        match self.queue.move_track(from, to) {
            Ok(()) => self.notify(Change::Queue),
            Err(e) => debug!(error = %e, "Ignoring move request"),
        }
    }

    fn clear_queue(&mut self) {
        self.queue.clear();
        self.pause();
        self.ended = false;
        self.notify(Change::Queue);
        self.notify(Change::State);
    }

    fn set_shuffle(&mut self, mode: ShuffleMode) {
        self.persist(PersistenceMessage::SaveShuffle(mode));
        self.queue.set_shuffle(mode);
        self.notify(Change::Shuffle);
        self.notify(Change::Queue);
    }

    fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
        self.persist(PersistenceMessage::SaveRepeat(mode));
        self.prepare_next();
        self.notify(Change::Repeat);
    }

    fn on_restored(&mut self, saved: Option<SavedSession>) {
        if self.queues_restored || !self.queue.is_empty() {
            debug!("Queue already in use, skipping restore");
            self.queues_restored = true;
            return;
        }
        self.queues_restored = true;

        let Some(saved) = saved else {
            return;
        };
        if saved.playing.is_empty() {
            debug!("No saved queue");
            return;
        }
        let Ok(cursor) = usize::try_from(saved.position) else {
            warn!(position = saved.position, "Discarding saved queue without a position");
            return;
        };
        if let Err(e) = self.queue.restore(saved.playing, saved.original, cursor) {
            warn!(error = %e, "Discarding saved queue");
            return;
        }

        info!(length = self.queue.len(), cursor, "Restored saved queue");
        if let Some(track) = self.queue.current().cloned() {
            self.engine.set_data_source(&track);
        }
        if let Ok(progress) = u64::try_from(saved.progress_ms) {
            if progress > 0 {
                let progress = Duration::from_millis(progress);
                self.engine.set_progress(progress);
                self.restored_progress = Some(progress);
            }
        }
        self.notify(Change::Meta);
        self.notify(Change::Queue);
        self.meta_change_pending = true;
    }

    // ========================================================================
    // Audio focus
    // ========================================================================

    fn on_focus_change(&mut self, change: FocusChange) {
        debug!(?change, "Audio focus changed");
        match change {
            FocusChange::Gain => {
                if !self.engine.is_playing() && self.paused_by_transient_loss {
                    self.play();
                    self.paused_by_transient_loss = false;
                }
                self.unduck();
            }
            FocusChange::Loss => self.pause(),
            FocusChange::LossTransient => {
                let was_playing = self.engine.is_playing();
                self.pause();
                self.paused_by_transient_loss = was_playing;
            }
            FocusChange::LossTransientCanDuck => self.duck(),
        }
    }

    fn duck(&mut self) {
        let level = self.ducker.duck();
        self.engine.set_volume(level);
        self.schedule_duck_step();
    }

    fn unduck(&mut self) {
        let level = self.ducker.unduck();
        self.engine.set_volume(level);
        self.schedule_duck_step();
    }

    fn schedule_duck_step(&mut self) {
        self.next_duck_step = self
            .ducker
            .is_ramping()
            .then(|| Instant::now() + self.config.duck_step_interval());
    }

    fn set_audio_ducking(&mut self, enabled: bool) {
        self.config.audio_ducking = enabled;
        if let Some(level) = self.ducker.set_enabled(enabled) {
            self.engine.set_volume(level);
            self.next_duck_step = None;
        }
    }

    // ========================================================================
    // Engine callbacks
    // ========================================================================

    fn on_engine_event(&mut self, event: EngineEvent) -> ControlFlow<()> {
        trace!(?event, "Engine event");
        match event {
            EngineEvent::StateChanged => self.notify(Change::State),
            EngineEvent::ReadyChanged { ready: true, .. } => {
                self.consecutive_errors = 0;
                self.notify(Change::State);
                if let Some(sample) = self.sample() {
                    self.report(ProgressEvent::TrackStarted(sample));
                }
                self.prepare_next();
            }
            EngineEvent::ReadyChanged {
                ready: false,
                reason: ReadyReason::EndOfMedia,
            } => return self.on_end_of_media(),
            EngineEvent::ReadyChanged { ready: false, .. } => self.notify(Change::State),
            EngineEvent::TrackChanged => return self.on_track_changed(),
            EngineEvent::Error { message, handoff } => self.on_engine_error(&message, handoff),
            EngineEvent::SourceUnavailable { uri, reason } => {
                warn!(uri = %uri, %reason, "Source unavailable");
                self.advise(Advisory::UnplayableFile);
                self.notify(Change::State);
            }
        }
        ControlFlow::Continue(())
    }

    fn on_track_changed(&mut self) -> ControlFlow<()> {
        if self.pending_quit {
            self.pending_quit = false;
            return self.quit();
        }

        if self.repeat == RepeatMode::Off && self.queue.is_last_track() {
            self.report(ProgressEvent::TrackEnded(self.sample()));
            self.rewind_at_end();
            return ControlFlow::Continue(());
        }

        let next = self
            .next_position
            .take()
            .or_else(|| self.queue.next_position(self.repeat, false));
        if let Some(next) = next {
            if let Err(e) = self.queue.select(next) {
                warn!(error = %e, "Queued position no longer valid");
            }
        }
        if let Some(sample) = self.sample() {
            self.report(ProgressEvent::TrackChanged(sample));
        }
        self.prepare_next();
        self.notify(Change::Meta);
        self.notify(Change::Queue);
        ControlFlow::Continue(())
    }

    fn on_end_of_media(&mut self) -> ControlFlow<()> {
        self.report(ProgressEvent::TrackEnded(self.sample()));
        self.platform
            .acquire_wake_lock(self.config.end_of_media_wake_lock());

        let flow = if self.pending_quit {
            self.pending_quit = false;
            self.quit()
        } else {
            if self.repeat == RepeatMode::Off && self.queue.is_last_track() {
                self.rewind_at_end();
            } else {
                self.play_next(false);
            }
            ControlFlow::Continue(())
        };

        self.platform.release_wake_lock();
        flow
    }

    /// Stop at the end of the queue, rewound to the start of the last track
    fn rewind_at_end(&mut self) {
        info!("Reached end of queue");
        self.play_requested = false;
        self.engine.pause();
        self.engine.set_progress(Duration::ZERO);
        self.ended = true;
        self.notify(Change::State);
    }

    fn on_engine_error(&mut self, message: &str, handoff: bool) {
        warn!(%message, handoff, "Engine error");
        self.advise(Advisory::UnplayableFile);
        self.notify(Change::State);

        self.consecutive_errors += 1;
        if self.consecutive_errors >= self.queue.len() {
            warn!(errors = self.consecutive_errors, "Every queued track failed, stopping");
            self.play_requested = false;
            return;
        }

        // The failed source was the queued successor, so move past it
        if handoff {
            if let Some(failed) = self.next_position.take() {
                if let Err(e) = self.queue.select(failed) {
                    warn!(error = %e, "Queued position no longer valid");
                }
            }
        }

        let next = self.queue.next_position(self.repeat, true);
        match next {
            Some(next) if Some(next) != self.queue.cursor() => {
                if self.play_requested {
                    self.play_at(next);
                } else {
                    self.set_position(next);
                }
            }
            _ => self.play_requested = false,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    fn quit(&mut self) -> ControlFlow<()> {
        info!("Session quitting");
        self.pause();
        self.emit(SessionEvent::NowPlayingCleared);
        self.platform.abandon_audio_focus();
        self.emit(SessionEvent::Quit);
        ControlFlow::Break(())
    }

    /// Flush and release everything the session holds
    pub(crate) async fn shutdown(mut self) {
        let sample = self.sample();
        self.save_position();
        self.save_progress();

        if let Some(progress) = self.helpers.progress.take() {
            let _ = progress.send(ProgressEvent::Shutdown(sample));
        }
        if let Some(task) = self.helpers.progress_task.take() {
            if tokio::time::timeout(SHUTDOWN_GRACE, task).await.is_err() {
                warn!("Progress reporter did not stop in time");
            }
        }

        let Helpers {
            persistence,
            persistence_task,
            ..
        } = self.helpers;
        drop(persistence);
        if tokio::time::timeout(SHUTDOWN_GRACE, persistence_task)
            .await
            .is_err()
        {
            warn!("Persistence context did not flush in time");
        }

        self.engine.stop();
        self.platform.release_wake_lock();
        info!("Session stopped");
    }

    // ========================================================================
    // State and notifications
    // ========================================================================

    fn state(&self) -> PlaybackState {
        if self.queue.current().is_none() {
            PlaybackState::Idle
        } else if self.ended {
            PlaybackState::Ended
        } else if self.engine.is_playing() {
            PlaybackState::Playing
        } else if self.engine.is_loading() {
            PlaybackState::Preparing
        } else if self.engine.is_ready() {
            PlaybackState::Paused
        } else {
            PlaybackState::Idle
        }
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state(),
            tracks: self.queue.tracks().to_vec(),
            original_tracks: self.queue.original_tracks().to_vec(),
            position: self.queue.cursor(),
            shuffle: self.queue.shuffle_mode(),
            repeat: self.repeat,
            progress: self.engine.progress(),
            duration: self.engine.duration(),
            volume: self.engine.volume(),
            paused_by_transient_loss: self.paused_by_transient_loss,
            pending_quit: self.pending_quit,
        }
    }

    fn sample(&self) -> Option<ProgressSample> {
        let track = self.queue.current()?;
        Some(ProgressSample {
            track_id: track.id.clone(),
            progress: self.engine.progress(),
            duration: self.engine.duration().or(track.duration),
            volume: self.engine.volume(),
            is_playing: self.engine.is_playing(),
        })
    }

    fn notify(&mut self, change: Change) {
        self.handle_change_internal(change);

        let event = match change {
            Change::State => SessionEvent::StateChanged(PlaybackStatus {
                state: self.state(),
                position: self.queue.cursor(),
                progress: self.engine.progress(),
            }),
            Change::Meta => match (self.queue.cursor(), self.queue.current()) {
                (Some(position), Some(track)) => SessionEvent::MetaChanged(NowPlaying {
                    track: track.clone(),
                    position,
                    queue_length: self.queue.len(),
                }),
                _ => return,
            },
            Change::Queue => SessionEvent::QueueChanged {
                length: self.queue.len(),
                position: self.queue.cursor(),
            },
            Change::Shuffle => SessionEvent::ShuffleModeChanged {
                mode: self.queue.shuffle_mode(),
            },
            Change::Repeat => SessionEvent::RepeatModeChanged { mode: self.repeat },
        };
        self.emit(event);
    }

    fn handle_change_internal(&mut self, change: Change) {
        match change {
            Change::State => {
                if !self.engine.is_playing() {
                    self.save_progress();
                }
            }
            Change::Meta => {
                self.save_position();
                self.save_track_progress();
            }
            Change::Queue => {
                self.save_queue();
                self.save_position();
                self.save_progress();
                if self.queue.is_empty() {
                    self.emit(SessionEvent::NowPlayingCleared);
                } else {
                    self.prepare_next();
                }
            }
            Change::Shuffle | Change::Repeat => {}
        }
    }

    fn advise(&self, advisory: Advisory) {
        debug!(%advisory, "Advisory");
        self.emit(SessionEvent::Advisory { advisory });
    }

    fn emit(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            trace!("No session event listeners");
        }
    }

    fn report(&self, event: ProgressEvent) {
        if let Some(progress) = &self.helpers.progress {
            let _ = progress.send(event);
        }
    }

    fn persist(&self, message: PersistenceMessage) {
        if self.helpers.persistence.send(message).is_err() {
            warn!("Persistence context gone, state not saved");
        }
    }

    fn save_queue(&self) {
        self.persist(PersistenceMessage::SaveQueue {
            playing: self.queue.tracks().to_vec(),
            original: self.queue.original_tracks().to_vec(),
        });
    }

    fn save_position(&self) {
        self.persist(PersistenceMessage::SavePosition(self.queue.cursor()));
    }

    /// Progress is only written once the engine knows it
    fn save_progress(&self) {
        if let Some(progress) = self.engine.progress() {
            self.persist_progress(progress);
        }
    }

    /// A newly announced track starts from zero unless restored mid-track
    fn save_track_progress(&self) {
        let progress = self
            .engine
            .progress()
            .or(self.restored_progress)
            .unwrap_or(Duration::ZERO);
        self.persist_progress(progress);
    }

    fn persist_progress(&self, progress: Duration) {
        let ms = i64::try_from(progress.as_millis()).unwrap_or(i64::MAX);
        self.persist(PersistenceMessage::SaveProgress(ms));
    }
}
