//! Playback session
//!
//! A session ties a [`PlayingQueue`](crate::queue::PlayingQueue) to a
//! playback engine and runs three contexts:
//!
//! - the command context, one task that owns the queue, the engine and all
//!   session state; commands, engine callbacks and timers are all handled
//!   here, one at a time
//! - the persistence context, which restores the saved queue at startup and
//!   then applies save requests in order
//! - the progress context, which reports playback to the remote media
//!   service on its own timer
//!
//! Callers talk to the command context through a [`SessionHandle`] and
//! observe it through [`SessionEvent`](crate::events::SessionEvent)s.
//!
//! # Example
//!
//! ```ignore
//! let (notifier, engine_events) = engine::channel();
//! let engine = LocalPlayer::local(factory, notifier);
//!
//! let session = SessionBuilder::new(Box::new(engine), engine_events, store.clone(), store)
//!     .config(config)
//!     .spawn()
//!     .await;
//!
//! let handle = session.handle();
//! handle.send(SessionCommand::PlayPlaylist { tracks, shuffle: None })?;
//! ```

mod command;
mod controller;
mod persistence;
mod platform;

pub use command::{SessionCommand, SessionSnapshot};
pub use platform::{HeadlessPlatform, Platform};

use crate::engine::{EngineEvents, Playback};
use crate::error::{PlaybackError, Result};
use crate::events::SessionEvent;
use crate::progress::{ProgressReporter, ProgressSample, SampleSource};
use crate::types::{PlaybackConfig, RepeatMode, ShuffleMode};
use async_trait::async_trait;
use command::Inbound;
use controller::{Helpers, SessionController};
use gramophone_core::storage::keys;
use gramophone_core::{PlaybackReporter, PreferenceStore, QueueStore};
use persistence::PersistenceWorker;
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Capacity of the session event channel; slow listeners lag past this
const EVENT_CAPACITY: usize = 256;

/// Collects a session's collaborators before it is started
pub struct SessionBuilder {
    engine: Box<dyn Playback>,
    engine_events: EngineEvents,
    queue_store: Arc<dyn QueueStore>,
    preferences: Arc<dyn PreferenceStore>,
    platform: Arc<dyn Platform>,
    reporter: Option<Arc<dyn PlaybackReporter>>,
    config: PlaybackConfig,
}

impl SessionBuilder {
    pub fn new(
        engine: Box<dyn Playback>,
        engine_events: EngineEvents,
        queue_store: Arc<dyn QueueStore>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            engine,
            engine_events,
            queue_store,
            preferences,
            platform: Arc::new(HeadlessPlatform),
            reporter: None,
            config: PlaybackConfig::default(),
        }
    }

    pub fn config(mut self, config: PlaybackConfig) -> Self {
        self.config = config;
        self
    }

    pub fn platform(mut self, platform: Arc<dyn Platform>) -> Self {
        self.platform = platform;
        self
    }

    /// Report playback to a remote media service
    pub fn reporter(mut self, reporter: Arc<dyn PlaybackReporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    /// Read the saved modes and start all session contexts
    ///
    /// The saved queue is restored in the background; commands sent before
    /// it arrives take precedence over it.
    pub async fn spawn(self) -> Session {
        let Self {
            engine,
            mut engine_events,
            queue_store,
            preferences,
            platform,
            reporter,
            mut config,
        } = self;

        let shuffle = ShuffleMode::from_code(read_int(&*preferences, keys::SHUFFLE, 0).await);
        let repeat = RepeatMode::from_code(read_int(&*preferences, keys::REPEAT, 0).await);
        let ducking_default = i64::from(config.audio_ducking);
        config.audio_ducking = read_int(&*preferences, keys::AUDIO_DUCKING, ducking_default).await != 0;
        debug!(?shuffle, ?repeat, audio_ducking = config.audio_ducking, "Loaded session preferences");

        let (tx, mut inbound) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let persistence_task =
            PersistenceWorker::new(queue_store, preferences).spawn(tx.clone(), persist_rx);

        let (progress, progress_task) = match reporter {
            Some(reporter) => {
                let (progress_tx, progress_rx) = mpsc::unbounded_channel();
                let sampler = Sampler {
                    tx: tx.downgrade(),
                };
                let task = ProgressReporter::new(reporter, sampler, config.progress.clone())
                    .spawn(progress_rx);
                (Some(progress_tx), Some(task))
            }
            None => (None, None),
        };

        let helpers = Helpers {
            persistence: persist_tx,
            persistence_task,
            progress,
            progress_task,
        };
        let mut controller = SessionController::new(
            config,
            shuffle,
            repeat,
            engine,
            platform,
            events.clone(),
            helpers,
        );

        let task = tokio::spawn(async move {
            info!("Session started");
            loop {
                let deadline = controller.next_deadline();
                let flow = tokio::select! {
                    biased;

                    message = inbound.recv() => match message {
                        Some(message) => controller.handle_inbound(message),
                        None => ControlFlow::Break(()),
                    },
                    Some(message) = engine_events.recv() => controller.handle_engine(message),
                    () = sleep_until(deadline) => {
                        controller.on_timer(tokio::time::Instant::now());
                        ControlFlow::Continue(())
                    }
                };
                if flow.is_break() {
                    break;
                }
            }

            // Pending sample requests are answered with a closed channel
            drop(inbound);
            controller.shutdown().await;
        });

        Session {
            handle: SessionHandle { tx, events },
            task,
        }
    }
}

async fn read_int(preferences: &dyn PreferenceStore, key: &str, default: i64) -> i64 {
    match preferences.get_int_or(key, default).await {
        Ok(value) => value,
        Err(e) => {
            warn!(error = %e, key, "Failed to read preference, using default");
            default
        }
    }
}

async fn sleep_until(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Samples the session for the progress context
///
/// Holds a weak sender so the reporter never keeps the session alive.
struct Sampler {
    tx: mpsc::WeakUnboundedSender<Inbound>,
}

#[async_trait]
impl SampleSource for Sampler {
    async fn sample(&self) -> Option<ProgressSample> {
        let tx = self.tx.upgrade()?;
        let (reply, rx) = oneshot::channel();
        tx.send(Inbound::Sample(reply)).ok()?;
        drop(tx);
        rx.await.ok().flatten()
    }
}

/// A running session
pub struct Session {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl Session {
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Wait for the session to quit and flush its state
    pub async fn join(self) {
        let Self { handle, task } = self;
        drop(handle);
        if let Err(e) = task.await {
            warn!(error = %e, "Session task failed");
        }
    }
}

/// Cloneable entry point to a running session
#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Inbound>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub fn send(&self, command: SessionCommand) -> Result<()> {
        self.tx
            .send(Inbound::Command(command))
            .map_err(|_| PlaybackError::SessionClosed)
    }

    /// Listen for session events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Snapshot(reply))
            .map_err(|_| PlaybackError::SessionClosed)?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)
    }

    /// Current track progress as the progress reporter sees it
    pub async fn sample(&self) -> Result<Option<ProgressSample>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Inbound::Sample(reply))
            .map_err(|_| PlaybackError::SessionClosed)?;
        rx.await.map_err(|_| PlaybackError::SessionClosed)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the session has stopped accepting commands
    pub async fn closed(&self) {
        self.tx.closed().await;
    }

    pub fn play(&self) -> Result<()> {
        self.send(SessionCommand::Play)
    }

    pub fn pause(&self) -> Result<()> {
        self.send(SessionCommand::Pause)
    }

    pub fn toggle(&self) -> Result<()> {
        self.send(SessionCommand::Toggle)
    }

    pub fn skip(&self) -> Result<()> {
        self.send(SessionCommand::Skip { force: true })
    }

    pub fn quit(&self) -> Result<()> {
        self.send(SessionCommand::Quit)
    }
}
