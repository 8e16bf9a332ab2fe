//! Shared fixtures for session integration tests
//!
//! In-memory collaborators plus a harness that builds a session on the
//! headless backend. Tests run on a paused tokio clock, so simulated tracks
//! play out instantly whenever the runtime is otherwise idle.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gramophone_core::storage::keys;
use gramophone_core::types::{PlaybackProgressInfo, PlaybackStartInfo, PlaybackStopInfo};
use gramophone_core::{
    PlaybackReporter, PreferenceStore, QueueSlot, QueueStore, Track, TrackId,
};
use gramophone_playback::engine::{self, BackendFactory, EngineNotifier, MediaBackend};
use gramophone_playback::{
    HeadlessBackend, LocalPlayer, PlaybackConfig, Platform, Session, SessionBuilder,
    SessionEvent, SessionHandle,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// URIs containing this fail to decode on the headless backend
pub const BROKEN: &str = "broken";

// ===== Tracks =====

pub fn track(n: usize, secs: u64) -> Track {
    Track::new(format!("Track {n}"), format!("/music/{n:02}.flac"))
        .with_id(format!("track-{n}"))
        .with_artist("Test Artist")
        .with_duration(Duration::from_secs(secs))
}

pub fn tracks(count: usize, secs: u64) -> Vec<Track> {
    (0..count).map(|n| track(n, secs)).collect()
}

pub fn broken_track(n: usize) -> Track {
    Track::new(format!("Broken {n}"), format!("/music/{BROKEN}-{n:02}.flac"))
        .with_id(format!("broken-{n}"))
        .with_duration(Duration::from_secs(60))
}

pub fn ids(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.id.to_string()).collect()
}

// ===== Store =====

#[derive(Default)]
struct StoreState {
    tracks: Vec<Track>,
    playing: Vec<Track>,
    original: Vec<Track>,
    preferences: HashMap<String, i64>,
    queue_saves: usize,
}

/// Queue and preference store kept in memory
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Pre-populate the saved session
    pub fn seed(&self, playing: Vec<Track>, original: Vec<Track>, position: i64, progress_ms: i64) {
        let mut state = self.state.lock().unwrap();
        state.tracks = playing.clone();
        state.playing = playing;
        state.original = original;
        state.preferences.insert(keys::POSITION.to_string(), position);
        state.preferences.insert(keys::PROGRESS.to_string(), progress_ms);
    }

    pub fn set_preference(&self, key: &str, value: i64) {
        self.state
            .lock()
            .unwrap()
            .preferences
            .insert(key.to_string(), value);
    }

    pub fn preference(&self, key: &str) -> Option<i64> {
        self.state.lock().unwrap().preferences.get(key).copied()
    }

    pub fn saved_queue(&self, slot: QueueSlot) -> Vec<Track> {
        let state = self.state.lock().unwrap();
        match slot {
            QueueSlot::Playing => state.playing.clone(),
            QueueSlot::Original => state.original.clone(),
        }
    }

    pub fn queue_saves(&self) -> usize {
        self.state.lock().unwrap().queue_saves
    }
}

#[async_trait]
impl QueueStore for MemoryStore {
    async fn delete_tracks(&self) -> gramophone_core::Result<()> {
        self.state.lock().unwrap().tracks.clear();
        Ok(())
    }

    async fn insert_tracks(&self, tracks: &[Track]) -> gramophone_core::Result<()> {
        self.state.lock().unwrap().tracks.extend_from_slice(tracks);
        Ok(())
    }

    async fn delete_queue(&self) -> gramophone_core::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.playing.clear();
        state.original.clear();
        Ok(())
    }

    async fn set_queue(&self, tracks: &[Track], slot: QueueSlot) -> gramophone_core::Result<()> {
        let mut state = self.state.lock().unwrap();
        match slot {
            QueueSlot::Playing => {
                state.playing = tracks.to_vec();
                state.queue_saves += 1;
            }
            QueueSlot::Original => state.original = tracks.to_vec(),
        }
        Ok(())
    }

    async fn get_queue(&self, slot: QueueSlot) -> gramophone_core::Result<Vec<Track>> {
        Ok(self.saved_queue(slot))
    }
}

#[async_trait]
impl PreferenceStore for MemoryStore {
    async fn get_int(&self, key: &str) -> gramophone_core::Result<Option<i64>> {
        Ok(self.preference(key))
    }

    async fn set_int(&self, key: &str, value: i64) -> gramophone_core::Result<()> {
        self.set_preference(key, value);
        Ok(())
    }
}

// ===== Reporter =====

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Start(PlaybackStartInfo),
    Progress(PlaybackProgressInfo),
    Stopped(PlaybackStopInfo),
    Played(TrackId),
}

/// Remote reporter that records every call
pub struct RecordingReporter {
    user: Option<String>,
    reports: Mutex<Vec<Report>>,
}

impl RecordingReporter {
    pub fn new(user: Option<&str>) -> Arc<Self> {
        Arc::new(Self {
            user: user.map(str::to_string),
            reports: Mutex::new(Vec::new()),
        })
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.lock().unwrap().clone()
    }

    pub fn starts(&self) -> Vec<PlaybackStartInfo> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Start(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn progress(&self) -> Vec<PlaybackProgressInfo> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Progress(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn stops(&self) -> Vec<PlaybackStopInfo> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Stopped(info) => Some(info),
                _ => None,
            })
            .collect()
    }

    pub fn played(&self) -> Vec<TrackId> {
        self.reports()
            .into_iter()
            .filter_map(|r| match r {
                Report::Played(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, report: Report) {
        self.reports.lock().unwrap().push(report);
    }
}

#[async_trait]
impl PlaybackReporter for RecordingReporter {
    fn user_id(&self) -> Option<String> {
        self.user.clone()
    }

    async fn report_playback_start(&self, info: &PlaybackStartInfo) -> gramophone_core::Result<()> {
        self.record(Report::Start(info.clone()));
        Ok(())
    }

    async fn report_playback_progress(
        &self,
        info: &PlaybackProgressInfo,
    ) -> gramophone_core::Result<()> {
        self.record(Report::Progress(info.clone()));
        Ok(())
    }

    async fn report_playback_stopped(&self, info: &PlaybackStopInfo) -> gramophone_core::Result<()> {
        self.record(Report::Stopped(info.clone()));
        Ok(())
    }

    async fn mark_played(
        &self,
        track_id: &TrackId,
        _user_id: &str,
        _played_at: DateTime<Utc>,
    ) -> gramophone_core::Result<()> {
        self.record(Report::Played(track_id.clone()));
        Ok(())
    }
}

// ===== Platform =====

/// Platform whose focus answer can be flipped by the test
#[derive(Default)]
pub struct ScriptedPlatform {
    deny_focus: AtomicBool,
    focus_requests: AtomicUsize,
    focus_abandoned: AtomicUsize,
    wake_locks: AtomicUsize,
}

impl ScriptedPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deny_focus(&self, deny: bool) {
        self.deny_focus.store(deny, Ordering::SeqCst);
    }

    pub fn focus_requests(&self) -> usize {
        self.focus_requests.load(Ordering::SeqCst)
    }

    pub fn focus_abandoned(&self) -> usize {
        self.focus_abandoned.load(Ordering::SeqCst)
    }

    pub fn wake_locks(&self) -> usize {
        self.wake_locks.load(Ordering::SeqCst)
    }
}

impl Platform for ScriptedPlatform {
    fn request_audio_focus(&self) -> bool {
        self.focus_requests.fetch_add(1, Ordering::SeqCst);
        !self.deny_focus.load(Ordering::SeqCst)
    }

    fn abandon_audio_focus(&self) {
        self.focus_abandoned.fetch_add(1, Ordering::SeqCst);
    }

    fn acquire_wake_lock(&self, _timeout: Duration) {
        self.wake_locks.fetch_add(1, Ordering::SeqCst);
    }

    fn release_wake_lock(&self) {}
}

// ===== Harness =====

pub fn headless_factory() -> Arc<dyn BackendFactory> {
    Arc::new(|notifier: EngineNotifier| -> Box<dyn MediaBackend> {
        Box::new(HeadlessBackend::new(notifier).with_failure_marker(BROKEN))
    })
}

/// A running session plus handles on its collaborators
pub struct Harness {
    pub session: Session,
    pub handle: SessionHandle,
    pub events: broadcast::Receiver<SessionEvent>,
    pub store: Arc<MemoryStore>,
    pub platform: Arc<ScriptedPlatform>,
    pub reporter: Arc<RecordingReporter>,
}

impl Harness {
    pub async fn start() -> Self {
        Self::start_with(MemoryStore::new(), PlaybackConfig::default()).await
    }

    pub async fn start_with(store: Arc<MemoryStore>, config: PlaybackConfig) -> Self {
        let platform = ScriptedPlatform::new();
        let reporter = RecordingReporter::new(Some("user-1"));

        let (notifier, engine_events) = engine::channel();
        let player = LocalPlayer::local(headless_factory(), notifier);

        let session = SessionBuilder::new(
            Box::new(player),
            engine_events,
            store.clone(),
            store.clone(),
        )
        .config(config)
        .platform(platform.clone())
        .reporter(reporter.clone())
        .spawn()
        .await;

        let handle = session.handle();
        let events = handle.subscribe();
        Self {
            session,
            handle,
            events,
            store,
            platform,
            reporter,
        }
    }

    /// Wait for the first event matching `pred`, skipping everything else
    pub async fn wait_for<F>(&mut self, pred: F) -> SessionEvent
    where
        F: Fn(&SessionEvent) -> bool,
    {
        wait_for(&mut self.events, pred).await
    }

    /// Quit and wait for the session to flush
    pub async fn shutdown(self) {
        let Self {
            session, handle, ..
        } = self;
        let _ = handle.quit();
        drop(handle);
        session.join().await;
    }
}

pub async fn wait_for<F>(events: &mut broadcast::Receiver<SessionEvent>, pred: F) -> SessionEvent
where
    F: Fn(&SessionEvent) -> bool,
{
    let deadline = Duration::from_secs(3600);
    tokio::time::timeout(deadline, async {
        loop {
            match events.recv().await {
                Ok(event) if pred(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("session closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for session event")
}
