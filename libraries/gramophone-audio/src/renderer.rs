//! Render state shared between a backend and the output callback
//!
//! The output callback pulls samples from the current decoder. When the
//! current track runs out it swaps in the pending decoder on the same
//! callback, so the handoff is sample-accurate. Transitions, ends and decode
//! failures are queued as outcomes and announced to the engine with a
//! `Finished` event carrying the render token; the backend pops them in
//! order from the command task.

use crate::decoder::{TrackDecoder, OUTPUT_CHANNELS};
use gramophone_playback::engine::{BackendEvent, BackendOutcome, EngineNotifier};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

pub(crate) type SharedRenderer = Arc<Mutex<Renderer>>;

pub(crate) fn lock(renderer: &Mutex<Renderer>) -> MutexGuard<'_, Renderer> {
    renderer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The next track, once its preparation finished
pub(crate) enum Pending {
    Ready(TrackDecoder),
    Failed(String),
}

pub(crate) struct Renderer {
    notifier: EngineNotifier,

    /// Identify the live preparations; stale results and outcomes are dropped
    pub current_token: u64,
    pub pending_token: u64,

    pub current: Option<TrackDecoder>,
    pub pending: Option<Pending>,
    pub playing: bool,
    pub gain: f32,

    /// A pending item is being prepared
    awaiting_pending: bool,
    /// The current item ended before its successor was ready
    stalled: bool,

    outcomes: VecDeque<BackendOutcome>,
    scratch: Vec<f32>,
}

impl Renderer {
    pub fn new(notifier: EngineNotifier) -> Self {
        Self {
            notifier,
            current_token: 0,
            pending_token: 0,
            current: None,
            pending: None,
            playing: false,
            gain: 1.0,
            awaiting_pending: false,
            stalled: false,
            outcomes: VecDeque::new(),
            scratch: Vec::new(),
        }
    }

    /// Drop every item and start over under `token`
    pub fn reset(&mut self, token: u64) {
        self.current_token = token;
        self.current = None;
        self.pending = None;
        self.playing = false;
        self.awaiting_pending = false;
        self.stalled = false;
        self.outcomes.clear();
    }

    /// Expect a pending item prepared under `token`
    pub fn expect_pending(&mut self, token: u64) {
        self.pending_token = token;
        self.pending = None;
        self.awaiting_pending = true;
    }

    /// Hand over the prepared successor, taking over at once if the
    /// current item already ended
    pub fn deliver_pending(&mut self, pending: Pending) {
        self.awaiting_pending = false;
        self.pending = Some(pending);
        if std::mem::take(&mut self.stalled) {
            self.finish_current();
        }
    }

    pub fn drop_pending(&mut self) {
        self.pending = None;
        self.awaiting_pending = false;
        if std::mem::take(&mut self.stalled) {
            self.finish_current();
        }
    }

    pub fn next_outcome(&mut self) -> Option<BackendOutcome> {
        self.outcomes.pop_front()
    }

    /// Fill an interleaved buffer of `channels` channels
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        out.fill(0.0);
        if channels == 0 {
            return;
        }
        let frames = out.len() / channels;

        let mut scratch = std::mem::take(&mut self.scratch);
        scratch.clear();
        scratch.resize(frames * OUTPUT_CHANNELS, 0.0);
        let written = self.render_stereo(&mut scratch);

        for (frame, stereo) in out
            .chunks_exact_mut(channels)
            .zip(scratch[..written].chunks_exact(OUTPUT_CHANNELS))
        {
            let (left, right) = (stereo[0] * self.gain, stereo[1] * self.gain);
            if channels == 1 {
                frame[0] = (left + right) / 2.0;
            } else {
                frame[0] = left;
                frame[1] = right;
            }
        }
        self.scratch = scratch;
    }

    /// Returns how many stereo samples were written
    fn render_stereo(&mut self, out: &mut [f32]) -> usize {
        let mut written = 0;
        while self.playing && !self.stalled && written < out.len() {
            let Some(current) = self.current.as_mut() else {
                break;
            };
            match current.read(&mut out[written..]) {
                Ok(count) => {
                    written += count;
                    if current.is_finished() {
                        self.finish_current();
                    } else if count == 0 {
                        break;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Decoding failed during playback");
                    self.playing = false;
                    self.signal(BackendOutcome::Failed(e.to_string()));
                }
            }
        }
        written
    }

    fn finish_current(&mut self) {
        match self.pending.take() {
            Some(Pending::Ready(next)) => {
                self.current = Some(next);
                self.signal(BackendOutcome::Transitioned);
            }
            Some(Pending::Failed(message)) => {
                self.playing = false;
                self.signal(BackendOutcome::HandoffFailed(message));
            }
            None if self.awaiting_pending => self.stalled = true,
            None => {
                self.playing = false;
                self.signal(BackendOutcome::Ended);
            }
        }
    }

    fn signal(&mut self, outcome: BackendOutcome) {
        self.outcomes.push_back(outcome);
        self.notifier.backend_event(BackendEvent::Finished {
            token: self.current_token,
        });
    }
}
