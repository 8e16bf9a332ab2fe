//! Engine implementation shared by the local and streaming players

use super::{
    BackendEvent, BackendFactory, BackendOutcome, EngineEvent, EngineMessage, EngineNotifier,
    FileResolver, HttpResolver, MediaBackend, MediaItem, MessageKind, Playback, ReadyReason,
    Resolution, ResolveTicket, SlotRole, SourceKind, SourceResolver, SourceSlots,
};
use crate::volume::Volume;
use gramophone_core::{Track, TrackId};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Player for local files
pub type LocalPlayer = Player<FileResolver>;

/// Player for server streams, probing each source's content type
pub type StreamingPlayer = Player<HttpResolver>;

#[derive(Debug, Clone)]
struct Slot {
    track_id: TrackId,
    uri: String,
    duration: Option<Duration>,
    kind: Option<SourceKind>,
    attached: bool,
}

impl Slot {
    fn new(track: &Track) -> Self {
        Self {
            track_id: track.id.clone(),
            uri: track.uri.clone(),
            duration: track.duration,
            kind: None,
            attached: false,
        }
    }

    fn item(&self, kind: SourceKind) -> MediaItem {
        MediaItem {
            uri: self.uri.clone(),
            kind,
            duration: self.duration,
        }
    }
}

/// Playback engine over a [`MediaBackend`]
///
/// Seeks and starts requested before the backend is prepared are buffered
/// (one of each) and replayed on the next readiness. A backend failure
/// discards the backend and builds a fresh one from the factory.
pub struct Player<R> {
    resolver: R,
    factory: Arc<dyn BackendFactory>,
    notifier: EngineNotifier,
    backend: Box<dyn MediaBackend>,

    slots: SourceSlots<Slot>,
    /// Bumped whenever the current source is replaced; late content-type results
    /// from an older generation are ignored
    generation: u64,

    ready: bool,
    playing: bool,
    requested_play: bool,
    requested_seek: Option<Duration>,

    volume: Volume,
}

impl LocalPlayer {
    pub fn local(factory: Arc<dyn BackendFactory>, notifier: EngineNotifier) -> Self {
        Self::new(FileResolver, factory, notifier)
    }
}

impl StreamingPlayer {
    pub fn streaming(
        resolver: HttpResolver,
        factory: Arc<dyn BackendFactory>,
        notifier: EngineNotifier,
    ) -> Self {
        Self::new(resolver, factory, notifier)
    }
}

impl<R: SourceResolver> Player<R> {
    pub fn new(resolver: R, factory: Arc<dyn BackendFactory>, notifier: EngineNotifier) -> Self {
        let backend = factory.create(notifier.clone());
        Self {
            resolver,
            factory,
            notifier,
            backend,
            slots: SourceSlots::new(),
            generation: 0,
            ready: false,
            playing: false,
            requested_play: false,
            requested_seek: None,
            volume: Volume::default(),
        }
    }

    /// Track id of the source currently attached or being prepared
    pub fn current_track(&self) -> Option<&TrackId> {
        self.slots.current().map(|slot| &slot.track_id)
    }

    /// Track id queued for the gapless transition
    pub fn pending_track(&self) -> Option<&TrackId> {
        self.slots.pending().map(|slot| &slot.track_id)
    }

    fn ticket(&self, role: SlotRole, uri: &str) -> ResolveTicket {
        ResolveTicket {
            notifier: self.notifier.clone(),
            generation: self.generation,
            role,
            uri: uri.to_string(),
        }
    }

    fn reset_playback_flags(&mut self) {
        self.ready = false;
        self.playing = false;
        self.requested_play = false;
        self.requested_seek = None;
    }

    fn attach_current(&mut self, kind: SourceKind) {
        let Some(slot) = self.slots.current_mut() else {
            return;
        };
        slot.kind = Some(kind);
        slot.attached = true;
        let item = slot.item(kind);

        debug!(uri = %item.uri, ?kind, "Attaching source");
        self.backend.load(item);
        self.attach_pending_if_resolved();
    }

    /// Append the pending source once it is resolved and the current one is attached
    fn attach_pending_if_resolved(&mut self) {
        if !self.slots.current().is_some_and(|slot| slot.attached) {
            return;
        }
        let Some(slot) = self.slots.pending_mut() else {
            return;
        };
        if slot.attached {
            return;
        }
        let Some(kind) = slot.kind else {
            return;
        };
        slot.attached = true;
        let item = slot.item(kind);

        debug!(uri = %item.uri, ?kind, "Queueing source for gapless transition");
        self.backend.append(item);
    }

    fn begin_playback(&mut self) {
        self.playing = true;
        self.backend.set_play_when_ready(true);
        self.notifier.post(MessageKind::Callback(EngineEvent::ReadyChanged {
            ready: true,
            reason: ReadyReason::UserRequest,
        }));
    }

    /// Throw the backend away and start over with a fresh one
    fn recover(&mut self) {
        self.backend.release();
        self.backend = self.factory.create(self.notifier.clone());
        self.backend.set_gain(self.volume.gain());
        self.generation += 1;
        self.slots.clear();
        self.reset_playback_flags();
    }

    fn on_resolved(
        &mut self,
        generation: u64,
        role: SlotRole,
        uri: String,
        result: Result<SourceKind, String>,
    ) -> Vec<EngineEvent> {
        if generation != self.generation {
            trace!(uri = %uri, "Dropping content-type result for a replaced source");
            return Vec::new();
        }

        let slot = match role {
            SlotRole::Current => self.slots.current(),
            SlotRole::Pending => self.slots.pending(),
        };
        if !slot.is_some_and(|slot| slot.uri == uri && slot.kind.is_none()) {
            trace!(uri = %uri, ?role, "Dropping content-type result for a vacated slot");
            return Vec::new();
        }

        match (result, role) {
            (Ok(kind), SlotRole::Current) => {
                self.attach_current(kind);
                Vec::new()
            }
            (Ok(kind), SlotRole::Pending) => {
                if let Some(slot) = self.slots.pending_mut() {
                    slot.kind = Some(kind);
                }
                self.attach_pending_if_resolved();
                Vec::new()
            }
            (Err(reason), role) => {
                warn!(uri = %uri, ?role, %reason, "Leaving source slot unfilled");
                match role {
                    SlotRole::Current => self.slots.clear(),
                    SlotRole::Pending => {
                        self.slots.take_pending();
                    }
                }
                vec![EngineEvent::SourceUnavailable { uri, reason }]
            }
        }
    }

    fn on_backend(&mut self, event: BackendEvent) -> Vec<EngineEvent> {
        let Some(outcome) = self.backend.on_event(event) else {
            return Vec::new();
        };

        match outcome {
            BackendOutcome::Prepared => {
                self.ready = true;
                if let Some(position) = self.requested_seek.take() {
                    self.backend.seek(position);
                }
                if std::mem::take(&mut self.requested_play) {
                    self.begin_playback();
                }
                vec![EngineEvent::StateChanged]
            }
            BackendOutcome::Transitioned => {
                self.slots.promote();
                vec![EngineEvent::TrackChanged]
            }
            BackendOutcome::Ended => {
                self.playing = false;
                vec![EngineEvent::ReadyChanged {
                    ready: false,
                    reason: ReadyReason::EndOfMedia,
                }]
            }
            BackendOutcome::Failed(message) => {
                warn!(%message, "Playback failed, rebuilding backend");
                self.recover();
                vec![EngineEvent::Error {
                    message,
                    handoff: false,
                }]
            }
            BackendOutcome::HandoffFailed(message) => {
                warn!(%message, "Gapless handoff failed, rebuilding backend");
                self.recover();
                vec![EngineEvent::Error {
                    message,
                    handoff: true,
                }]
            }
        }
    }
}

impl<R: SourceResolver> Playback for Player<R> {
    fn set_data_source(&mut self, track: &Track) {
        self.generation += 1;
        self.reset_playback_flags();
        self.backend.set_play_when_ready(false);
        self.backend.clear();

        let slot = Slot::new(track);
        let ticket = self.ticket(SlotRole::Current, &slot.uri);
        self.slots.replace(slot);

        if let Resolution::Ready(kind) = self.resolver.resolve(ticket) {
            self.attach_current(kind);
        }
    }

    fn queue_data_source(&mut self, track: &Track) {
        if self.slots.pending().is_some_and(|slot| slot.uri == track.uri) {
            return;
        }
        if self.slots.current().is_none() {
            trace!("No current source to queue behind");
            return;
        }

        self.backend.clear_pending();
        let slot = Slot::new(track);
        let ticket = self.ticket(SlotRole::Pending, &slot.uri);
        self.slots.set_pending(slot);

        if let Resolution::Ready(kind) = self.resolver.resolve(ticket) {
            if let Some(slot) = self.slots.pending_mut() {
                slot.kind = Some(kind);
            }
            self.attach_pending_if_resolved();
        }
    }

    fn start(&mut self) {
        if !self.ready {
            self.requested_play = true;
        } else if !self.playing {
            self.begin_playback();
        }
    }

    fn pause(&mut self) {
        self.requested_play = false;
        if !self.playing {
            return;
        }
        self.playing = false;
        self.backend.set_play_when_ready(false);
        self.notifier.post(MessageKind::Callback(EngineEvent::ReadyChanged {
            ready: false,
            reason: ReadyReason::UserRequest,
        }));
    }

    fn stop(&mut self) {
        self.backend.release();
        self.generation += 1;
        self.slots.clear();
        self.reset_playback_flags();
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn is_playing(&self) -> bool {
        self.ready && self.playing
    }

    fn is_loading(&self) -> bool {
        self.slots.current().is_some() && !self.ready
    }

    fn progress(&self) -> Option<Duration> {
        self.ready.then(|| self.backend.position())
    }

    fn duration(&self) -> Option<Duration> {
        if self.ready {
            self.backend.duration()
        } else {
            None
        }
    }

    fn set_progress(&mut self, position: Duration) {
        if self.ready {
            self.backend.seek(position);
        } else {
            self.requested_seek = Some(position);
        }
    }

    fn set_volume(&mut self, percent: u8) {
        self.volume.set_level(percent);
        self.backend.set_gain(self.volume.gain());
    }

    fn volume(&self) -> u8 {
        Volume::level_from_gain(self.backend.gain())
    }

    fn handle(&mut self, message: EngineMessage) -> Vec<EngineEvent> {
        match message.0 {
            MessageKind::Callback(event) => vec![event],
            MessageKind::Resolved {
                generation,
                role,
                uri,
                result,
            } => self.on_resolved(generation, role, uri, result),
            MessageKind::Backend(event) => self.on_backend(event),
        }
    }
}
