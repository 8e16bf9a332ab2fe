//! Playback engine
//!
//! The engine turns "play this track, then that one" into calls on a media
//! backend. Two flavours share one implementation, [`Player`]:
//! - [`LocalPlayer`]: every source is a local file
//! - [`StreamingPlayer`]: HTTP sources are sniffed with a HEAD request to pick
//!   a segmented or progressive loader before they are attached
//!
//! Nothing here calls back into the session directly. Backend callbacks and
//! sniff completions are posted to an [`EngineNotifier`] and come back to the
//! owner of the engine through [`EngineEvents`]; the owner feeds each
//! [`EngineMessage`] to [`Playback::handle`] from its own task, so every
//! engine state change happens on one thread of control.

mod backend;
mod headless;
mod player;
mod resolver;
mod slots;

pub use backend::{
    BackendEvent, BackendFactory, BackendOutcome, MediaBackend, MediaItem, SourceKind,
};
pub use headless::HeadlessBackend;
pub use player::{LocalPlayer, Player, StreamingPlayer};
pub use resolver::{
    classify_content_type, FileResolver, HttpResolver, Resolution, ResolveTicket, SourceResolver,
};
pub use slots::SourceSlots;

use gramophone_core::Track;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

/// Why readiness changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyReason {
    /// Start or pause was requested
    UserRequest,

    /// The last attached source played to its end
    EndOfMedia,
}

/// Callbacks surfaced by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Preparation state changed (a source finished preparing)
    StateChanged,

    /// Playback started (`ready == true`) or stopped
    ReadyChanged { ready: bool, reason: ReadyReason },

    /// Automatic gapless transition into the pending source
    TrackChanged,

    /// Decode or transport error; the backend has been rebuilt
    ///
    /// `handoff` is set when the failing source was the pending one, so the
    /// current track had already finished.
    Error { message: String, handoff: bool },

    /// A source could not be sniffed and was left unattached
    SourceUnavailable { uri: String, reason: String },
}

/// Which slot a resolution belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRole {
    Current,
    Pending,
}

/// Opaque message for [`Playback::handle`]
#[derive(Debug)]
pub struct EngineMessage(pub(crate) MessageKind);

#[derive(Debug)]
pub(crate) enum MessageKind {
    Backend(BackendEvent),
    Resolved {
        generation: u64,
        role: SlotRole,
        uri: String,
        result: std::result::Result<SourceKind, String>,
    },
    Callback(EngineEvent),
}

/// Posts engine messages back to the command context
#[derive(Debug, Clone)]
pub struct EngineNotifier {
    tx: mpsc::UnboundedSender<EngineMessage>,
}

impl EngineNotifier {
    /// Deliver a backend callback
    pub fn backend_event(&self, event: BackendEvent) {
        self.post(MessageKind::Backend(event));
    }

    /// Whether anyone still listens; late callbacks are dropped otherwise
    pub fn is_alive(&self) -> bool {
        !self.tx.is_closed()
    }

    pub(crate) fn post(&self, kind: MessageKind) {
        if self.tx.send(EngineMessage(kind)).is_err() {
            trace!("Engine receiver gone, dropping message");
        }
    }
}

/// Receiving half of the engine message channel
#[derive(Debug)]
pub struct EngineEvents {
    rx: mpsc::UnboundedReceiver<EngineMessage>,
}

impl EngineEvents {
    pub async fn recv(&mut self) -> Option<EngineMessage> {
        self.rx.recv().await
    }
}

/// Create the channel an engine posts its callbacks through
pub fn channel() -> (EngineNotifier, EngineEvents) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EngineNotifier { tx }, EngineEvents { rx })
}

/// Playback engine contract
pub trait Playback: Send {
    /// Load `track` for immediate playback, replacing any prior source
    fn set_data_source(&mut self, track: &Track);

    /// Queue `track` behind the current source for a gapless transition
    ///
    /// No-op when the pending source already is `track`.
    fn queue_data_source(&mut self, track: &Track);

    /// Start or resume; deferred until ready
    fn start(&mut self);

    fn pause(&mut self);

    /// Release the backend
    fn stop(&mut self);

    fn is_ready(&self) -> bool;

    fn is_playing(&self) -> bool;

    /// A source is attached or being sniffed but not yet ready
    fn is_loading(&self) -> bool;

    /// Position in the current source, `None` until ready
    fn progress(&self) -> Option<Duration>;

    /// Length of the current source, `None` until ready or when unknown
    fn duration(&self) -> Option<Duration>;

    /// Seek; deferred until ready
    fn set_progress(&mut self, position: Duration);

    /// Volume as an integer percentage
    fn set_volume(&mut self, percent: u8);

    fn volume(&self) -> u8;

    /// Apply a message posted through the engine's notifier
    fn handle(&mut self, message: EngineMessage) -> Vec<EngineEvent>;
}
