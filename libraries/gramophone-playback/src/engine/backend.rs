//! Media backend abstraction
//!
//! A backend decodes and renders one current item and may hold a second,
//! pending item for a gapless handoff. Backends report asynchronously via
//! [`EngineNotifier::backend_event`]; the engine passes each event back to
//! [`MediaBackend::on_event`], which drops stale ones and translates the rest
//! into a [`BackendOutcome`].

use super::EngineNotifier;
use std::time::Duration;

/// How a source is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Local file
    File,

    /// Single HTTP stream
    Progressive,

    /// HLS playlist of segments
    Segmented,
}

/// A source ready to hand to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaItem {
    pub uri: String,
    pub kind: SourceKind,
    pub duration: Option<Duration>,
}

/// Raw callback from a backend
///
/// The token is backend-defined and lets the backend recognise callbacks
/// that belong to a source or timer it has since replaced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Prepared { token: u64 },
    Finished { token: u64 },
    Failed { token: u64, message: String },
}

/// Meaning of a backend callback once validated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOutcome {
    /// The current item can play
    Prepared,

    /// The current item ended and the pending item took over
    Transitioned,

    /// The current item ended with nothing queued
    Ended,

    /// Decode or transport failure of the current item
    Failed(String),

    /// The current item ended but the pending item failed to take over
    HandoffFailed(String),
}

/// A media decoding/rendering backend
pub trait MediaBackend: Send {
    /// Replace everything with `item` and start preparing it
    fn load(&mut self, item: MediaItem);

    /// Queue `item` behind the current one, replacing any pending item
    fn append(&mut self, item: MediaItem);

    /// Drop the pending item, if any
    fn clear_pending(&mut self);

    /// Drop all items
    fn clear(&mut self);

    fn set_play_when_ready(&mut self, play: bool);

    fn seek(&mut self, position: Duration);

    fn position(&self) -> Duration;

    fn duration(&self) -> Option<Duration>;

    fn set_gain(&mut self, gain: f32);

    fn gain(&self) -> f32;

    /// Validate and interpret a callback this backend posted
    fn on_event(&mut self, event: BackendEvent) -> Option<BackendOutcome>;

    /// Free all resources; the backend is not used afterwards
    fn release(&mut self);
}

/// Builds fresh backends, used again after a failure
pub trait BackendFactory: Send + Sync {
    fn create(&self, notifier: EngineNotifier) -> Box<dyn MediaBackend>;
}

impl<F> BackendFactory for F
where
    F: Fn(EngineNotifier) -> Box<dyn MediaBackend> + Send + Sync,
{
    fn create(&self, notifier: EngineNotifier) -> Box<dyn MediaBackend> {
        self(notifier)
    }
}
