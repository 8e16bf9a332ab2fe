//! Audio output device
//!
//! The cpal stream is not `Send`, so a dedicated thread builds and owns it
//! for the lifetime of the output. The stream callback renders whichever
//! backend is attached and plays silence otherwise. Only one backend is
//! attached at a time; a rebuilt backend takes over the device from the one
//! it replaces.

use crate::error::{AudioError, Result};
use crate::renderer::{lock, SharedRenderer};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{bounded, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{error, info};

type Slot = Arc<Mutex<Option<SharedRenderer>>>;

/// Shared output device
pub struct AudioOutput {
    sample_rate: u32,
    channels: usize,
    slot: Slot,

    /// Dropping it lets the output thread exit
    shutdown: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl AudioOutput {
    /// Open the host's default output device
    ///
    /// # Errors
    /// Returns an error if no device exists or the stream cannot start
    pub fn open_default() -> Result<Self> {
        let slot: Slot = Arc::new(Mutex::new(None));
        let (ready_tx, ready_rx) = bounded::<Result<(u32, usize)>>(1);
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);

        let callback_slot = Arc::clone(&slot);
        let thread = thread::Builder::new()
            .name("gramophone-output".into())
            .spawn(move || {
                let stream = match build_stream(callback_slot) {
                    Ok((stream, format)) => {
                        let _ = ready_tx.send(Ok(format));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Blocks until the sender is dropped
                let _ = shutdown_rx.recv();
                drop(stream);
            })?;

        let (sample_rate, channels) = ready_rx
            .recv()
            .map_err(|_| AudioError::Output("output thread exited".into()))??;
        info!(sample_rate, channels, "Audio output opened");

        Ok(Self {
            sample_rate,
            channels,
            slot,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    /// An output without a device; samples are pulled with [`render`](Self::render)
    pub fn silent(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 2,
            slot: Arc::new(Mutex::new(None)),
            shutdown: None,
            thread: None,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill an interleaved buffer from the attached backend
    pub fn render(&self, out: &mut [f32], channels: usize) {
        render_slot(&self.slot, out, channels);
    }

    pub(crate) fn attach(&self, renderer: SharedRenderer) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(renderer);
    }

    /// Detach `renderer`, unless another backend has taken over since
    pub(crate) fn detach(&self, renderer: &SharedRenderer) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|attached| Arc::ptr_eq(attached, renderer)) {
            *slot = None;
        }
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        self.shutdown.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl std::fmt::Debug for AudioOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioOutput")
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("device", &self.thread.is_some())
            .finish()
    }
}

fn render_slot(slot: &Mutex<Option<SharedRenderer>>, out: &mut [f32], channels: usize) {
    let renderer = slot
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .clone();
    match renderer {
        Some(renderer) => lock(&renderer).render(out, channels),
        None => out.fill(0.0),
    }
}

fn build_stream(slot: Slot) -> Result<(cpal::Stream, (u32, usize))> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| AudioError::Output("no output device".into()))?;
    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::Output(e.to_string()))?;

    let sample_rate = supported.sample_rate();
    let channels = usize::from(supported.channels());
    let config = supported.config();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                render_slot(&slot, data, channels);
            },
            |err| error!(error = %err, "Audio stream error"),
            None,
        )
        .map_err(|e| AudioError::Output(e.to_string()))?;
    stream
        .play()
        .map_err(|e| AudioError::Output(e.to_string()))?;

    Ok((stream, (sample_rate, channels)))
}

