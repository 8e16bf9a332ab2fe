//! Decoding media backend
//!
//! Items are opened on the tokio runtime (files on the blocking pool, streams
//! over HTTP) and handed to the renderer the output device pulls from. The
//! pending item is prepared as soon as it is appended so the renderer can
//! take over from the current one without a gap.

use crate::error::Result;
use crate::output::AudioOutput;
use crate::renderer::{lock, Pending, Renderer, SharedRenderer};
use crate::source::SourceLoader;
use gramophone_playback::engine::{
    BackendEvent, BackendFactory, BackendOutcome, EngineNotifier, MediaBackend, MediaItem,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Backend that decodes with symphonia and plays through an [`AudioOutput`]
pub struct AudioBackend {
    notifier: EngineNotifier,
    output: Arc<AudioOutput>,
    loader: SourceLoader,
    renderer: SharedRenderer,

    /// Current item, then the pending one
    items: Vec<MediaItem>,

    load_token: u64,
    pending_token: u64,

    prepared: bool,
    play_when_ready: bool,
    gain: f32,

    prepare_task: Option<JoinHandle<()>>,
    pending_task: Option<JoinHandle<()>>,
}

impl AudioBackend {
    /// Create a backend and route `output` to it
    pub fn new(notifier: EngineNotifier, output: Arc<AudioOutput>, loader: SourceLoader) -> Self {
        let renderer = Arc::new(Mutex::new(Renderer::new(notifier.clone())));
        output.attach(Arc::clone(&renderer));
        Self {
            notifier,
            output,
            loader,
            renderer,
            items: Vec::with_capacity(2),
            load_token: 0,
            pending_token: 0,
            prepared: false,
            play_when_ready: false,
            gain: 1.0,
            prepare_task: None,
            pending_task: None,
        }
    }

    fn abort_pending(&mut self) {
        self.pending_token += 1;
        lock(&self.renderer).pending_token = self.pending_token;
        if let Some(task) = self.pending_task.take() {
            task.abort();
        }
    }

    fn abort_all(&mut self) {
        self.abort_pending();
        self.load_token += 1;
        if let Some(task) = self.prepare_task.take() {
            task.abort();
        }
    }
}

impl MediaBackend for AudioBackend {
    fn load(&mut self, item: MediaItem) {
        self.abort_all();
        debug!(uri = %item.uri, kind = ?item.kind, "Audio backend loading");

        let token = self.load_token;
        lock(&self.renderer).reset(token);
        self.items.clear();
        self.items.push(item.clone());
        self.prepared = false;

        let loader = self.loader.clone();
        let renderer = Arc::clone(&self.renderer);
        let notifier = self.notifier.clone();
        self.prepare_task = Some(tokio::spawn(async move {
            let opened = loader.open(&item).await;
            let mut renderer = lock(&renderer);
            if renderer.current_token != token {
                return;
            }
            let event = match opened {
                Ok(decoder) => {
                    renderer.current = Some(decoder);
                    BackendEvent::Prepared { token }
                }
                Err(e) => BackendEvent::Failed {
                    token,
                    message: format!("cannot play {}: {e}", item.uri),
                },
            };
            drop(renderer);
            notifier.backend_event(event);
        }));
    }

    fn append(&mut self, item: MediaItem) {
        if self.items.is_empty() {
            self.load(item);
            return;
        }
        self.abort_pending();
        debug!(uri = %item.uri, kind = ?item.kind, "Audio backend preparing next item");

        let token = self.pending_token;
        lock(&self.renderer).expect_pending(token);
        self.items.truncate(1);
        self.items.push(item.clone());

        let loader = self.loader.clone();
        let renderer = Arc::clone(&self.renderer);
        self.pending_task = Some(tokio::spawn(async move {
            let pending = match loader.open(&item).await {
                Ok(decoder) => Pending::Ready(decoder),
                Err(e) => {
                    warn!(uri = %item.uri, error = %e, "Next item cannot be played");
                    Pending::Failed(format!("cannot play {}: {e}", item.uri))
                }
            };
            let mut renderer = lock(&renderer);
            if renderer.pending_token == token {
                renderer.deliver_pending(pending);
            }
        }));
    }

    fn clear_pending(&mut self) {
        self.abort_pending();
        self.items.truncate(1);
        lock(&self.renderer).drop_pending();
    }

    fn clear(&mut self) {
        self.abort_all();
        lock(&self.renderer).reset(self.load_token);
        self.items.clear();
        self.prepared = false;
    }

    fn set_play_when_ready(&mut self, play: bool) {
        self.play_when_ready = play;
        if self.prepared {
            lock(&self.renderer).playing = play;
        }
    }

    fn seek(&mut self, position: Duration) {
        let mut renderer = lock(&self.renderer);
        let Some(current) = renderer.current.as_mut() else {
            return;
        };
        if let Err(e) = current.seek(position) {
            warn!(position_ms = position.as_millis() as u64, error = %e, "Seek failed");
        }
    }

    fn position(&self) -> Duration {
        lock(&self.renderer)
            .current
            .as_ref()
            .map(|decoder| decoder.position())
            .unwrap_or_default()
    }

    fn duration(&self) -> Option<Duration> {
        lock(&self.renderer)
            .current
            .as_ref()
            .and_then(|decoder| decoder.duration())
            .or_else(|| self.items.first().and_then(|item| item.duration))
    }

    fn set_gain(&mut self, gain: f32) {
        self.gain = gain.clamp(0.0, 1.0);
        lock(&self.renderer).gain = self.gain;
    }

    fn gain(&self) -> f32 {
        self.gain
    }

    fn on_event(&mut self, event: BackendEvent) -> Option<BackendOutcome> {
        match event {
            BackendEvent::Prepared { token } if token == self.load_token && !self.prepared => {
                self.prepared = true;
                lock(&self.renderer).playing = self.play_when_ready;
                Some(BackendOutcome::Prepared)
            }
            BackendEvent::Failed { token, message } if token == self.load_token => {
                Some(BackendOutcome::Failed(message))
            }
            BackendEvent::Finished { token } if token == self.load_token && self.prepared => {
                let outcome = lock(&self.renderer).next_outcome()?;
                match &outcome {
                    BackendOutcome::Transitioned => {
                        if self.items.len() > 1 {
                            self.items.remove(0);
                        }
                    }
                    BackendOutcome::Ended | BackendOutcome::HandoffFailed(_) => {
                        self.play_when_ready = false;
                    }
                    BackendOutcome::Prepared | BackendOutcome::Failed(_) => {}
                }
                Some(outcome)
            }
            _ => None,
        }
    }

    /// The output stays routed here; a stopped player loads into the same backend
    fn release(&mut self) {
        self.clear();
    }
}

impl Drop for AudioBackend {
    fn drop(&mut self) {
        self.abort_all();
        self.output.detach(&self.renderer);
    }
}

/// Builds [`AudioBackend`]s sharing one output device
#[derive(Debug, Clone)]
pub struct AudioBackendFactory {
    output: Arc<AudioOutput>,
    loader: SourceLoader,
}

impl AudioBackendFactory {
    /// Open the default output device
    ///
    /// # Errors
    /// Returns an error if no output device can be opened
    pub fn new() -> Result<Self> {
        Ok(Self::with_output(Arc::new(AudioOutput::open_default()?)))
    }

    pub fn with_output(output: Arc<AudioOutput>) -> Self {
        let loader = SourceLoader::new(output.sample_rate());
        Self { output, loader }
    }

    pub fn output(&self) -> &Arc<AudioOutput> {
        &self.output
    }
}

impl BackendFactory for AudioBackendFactory {
    fn create(&self, notifier: EngineNotifier) -> Box<dyn MediaBackend> {
        Box::new(AudioBackend::new(
            notifier,
            Arc::clone(&self.output),
            self.loader.clone(),
        ))
    }
}
