//! Streaming track decoder
//!
//! Wraps a symphonia format reader and codec for one track. Packets are
//! decoded on demand as the output pulls samples, converted to interleaved
//! stereo `f32` and resampled to the output rate when the file's rate
//! differs.

use crate::error::{AudioError, Result};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::collections::VecDeque;
use std::fmt;
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::Time;
use tracing::debug;

/// Output is always interleaved stereo
pub const OUTPUT_CHANNELS: usize = 2;

/// One decodable track, positioned by the frames handed to the output
pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    source_rate: u32,
    output_rate: u32,
    duration: Option<Duration>,

    resampler: Option<StereoResampler>,
    /// Decoded samples not yet handed out
    buffer: VecDeque<f32>,
    frames_rendered: u64,
    /// No more packets; whatever is buffered is the rest of the track
    input_done: bool,
}

impl TrackDecoder {
    /// Open `source` and prepare its first audio track
    ///
    /// `extension` is only a hint for format detection.
    pub fn open(
        source: Box<dyn MediaSource>,
        extension: Option<&str>,
        output_rate: u32,
    ) -> Result<Self> {
        let stream = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }

        let format_options = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let opened = symphonia::default::get_probe()
            .format(&hint, stream, &format_options, &MetadataOptions::default())
            .map_err(|e| AudioError::Open(e.to_string()))?;
        let format = opened.format;

        let track = format
            .tracks()
            .iter()
            .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::Unsupported("no audio track".to_string()))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let source_rate = params
            .sample_rate
            .ok_or_else(|| AudioError::Unsupported("unknown sample rate".to_string()))?;

        let duration = match (params.time_base, params.n_frames) {
            (Some(time_base), Some(frames)) => Some(time_to_duration(time_base.calc_time(frames))),
            (None, Some(frames)) => Some(Duration::from_secs_f64(
                frames as f64 / f64::from(source_rate),
            )),
            _ => None,
        };

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| AudioError::Unsupported(e.to_string()))?;

        let resampler = if source_rate == output_rate {
            None
        } else {
            Some(StereoResampler::new(source_rate, output_rate)?)
        };

        debug!(
            source_rate,
            output_rate,
            channels = params.channels.map(|c| c.count()),
            ?duration,
            "Opened track"
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            source_rate,
            output_rate,
            duration,
            resampler,
            buffer: VecDeque::new(),
            frames_rendered: 0,
            input_done: false,
        })
    }

    pub fn open_file(path: &Path, output_rate: u32) -> Result<Self> {
        let file = File::open(path)?;
        let extension = path.extension().and_then(|e| e.to_str());
        Self::open(Box::new(file), extension, output_rate)
    }

    /// Decode a fully downloaded source
    pub fn from_bytes(bytes: Vec<u8>, extension: Option<&str>, output_rate: u32) -> Result<Self> {
        Self::open(Box::new(Cursor::new(bytes)), extension, output_rate)
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub fn source_rate(&self) -> u32 {
        self.source_rate
    }

    pub fn position(&self) -> Duration {
        let position =
            Duration::from_secs_f64(self.frames_rendered as f64 / f64::from(self.output_rate));
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Everything has been handed out
    pub fn is_finished(&self) -> bool {
        self.input_done && self.buffer.is_empty()
    }

    /// Fill `out` with interleaved stereo samples
    ///
    /// Returns how many samples were written; fewer than `out.len()` only at
    /// the end of the track.
    pub fn read(&mut self, out: &mut [f32]) -> Result<usize> {
        let wanted = out.len() - out.len() % OUTPUT_CHANNELS;
        while self.buffer.len() < wanted && !self.input_done {
            self.decode_next()?;
        }

        let count = wanted.min(self.buffer.len());
        for (slot, sample) in out[..count].iter_mut().zip(self.buffer.drain(..count)) {
            *slot = sample;
        }
        self.frames_rendered += (count / OUTPUT_CHANNELS) as u64;
        Ok(count)
    }

    pub fn seek(&mut self, position: Duration) -> Result<()> {
        self.buffer.clear();
        if let Some(resampler) = &mut self.resampler {
            resampler.reset();
        }

        if self.duration.is_some_and(|duration| position >= duration) {
            self.input_done = true;
            self.frames_rendered = self.frames_at(self.duration.unwrap_or(position));
            return Ok(());
        }

        let time = Time::new(
            position.as_secs(),
            f64::from(position.subsec_nanos()) / 1_000_000_000.0,
        );
        self.format
            .seek(
                SeekMode::Accurate,
                SeekTo::Time {
                    time,
                    track_id: Some(self.track_id),
                },
            )
            .map_err(|e| AudioError::Decode(e.to_string()))?;
        self.decoder.reset();
        self.input_done = false;
        self.frames_rendered = self.frames_at(position);
        Ok(())
    }

    fn frames_at(&self, position: Duration) -> u64 {
        (position.as_secs_f64() * f64::from(self.output_rate)) as u64
    }

    fn decode_next(&mut self) -> Result<()> {
        let packet = match self.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return self.finish_input();
            }
            // Chained streams change parameters here; treat it as the end
            Err(SymphoniaError::ResetRequired) => return self.finish_input(),
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        if packet.track_id() != self.track_id {
            return Ok(());
        }

        let decoded = match self.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(message)) => {
                debug!(reason = message, "Skipping undecodable packet");
                return Ok(());
            }
            Err(e) => return Err(AudioError::Decode(e.to_string())),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count();
        if channels == 0 || decoded.frames() == 0 {
            return Ok(());
        }
        let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        samples.copy_interleaved_ref(decoded);
        let stereo = to_stereo(samples.samples(), channels);

        match &mut self.resampler {
            Some(resampler) => resampler.push(&stereo, &mut self.buffer),
            None => {
                self.buffer.extend(stereo);
                Ok(())
            }
        }
    }

    fn finish_input(&mut self) -> Result<()> {
        self.input_done = true;
        match &mut self.resampler {
            Some(resampler) => resampler.flush(&mut self.buffer),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for TrackDecoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackDecoder")
            .field("track_id", &self.track_id)
            .field("source_rate", &self.source_rate)
            .field("output_rate", &self.output_rate)
            .field("duration", &self.duration)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

fn time_to_duration(time: Time) -> Duration {
    Duration::from_secs(time.seconds) + Duration::from_secs_f64(time.frac)
}

/// Mono is duplicated, anything wider keeps its first two channels
fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        2 => interleaved.to_vec(),
        _ => interleaved
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// Fixed-chunk sinc resampler fed with arbitrary packet sizes
struct StereoResampler {
    inner: SincFixedIn<f32>,
    /// Deinterleaved input waiting for a full chunk
    input: [Vec<f32>; OUTPUT_CHANNELS],
}

impl StereoResampler {
    fn new(from: u32, to: u32) -> Result<Self> {
        let params = SincInterpolationParameters {
            sinc_len: 128,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        // 100 ms chunks
        let chunk_frames = (from as usize / 10).max(64);
        let inner = SincFixedIn::<f32>::new(
            f64::from(to) / f64::from(from),
            1.1,
            params,
            chunk_frames,
            OUTPUT_CHANNELS,
        )
        .map_err(|e| AudioError::Resample(e.to_string()))?;

        Ok(Self {
            inner,
            input: [Vec::new(), Vec::new()],
        })
    }

    fn push(&mut self, stereo: &[f32], out: &mut VecDeque<f32>) -> Result<()> {
        for frame in stereo.chunks_exact(OUTPUT_CHANNELS) {
            self.input[0].push(frame[0]);
            self.input[1].push(frame[1]);
        }

        loop {
            let needed = self.inner.input_frames_next();
            if self.input[0].len() < needed {
                return Ok(());
            }
            let chunk: Vec<Vec<f32>> = self
                .input
                .iter_mut()
                .map(|channel| channel.drain(..needed).collect())
                .collect();
            let resampled = self
                .inner
                .process(&chunk[..], None)
                .map_err(|e| AudioError::Resample(e.to_string()))?;
            interleave(&resampled, out);
        }
    }

    fn flush(&mut self, out: &mut VecDeque<f32>) -> Result<()> {
        if self.input[0].is_empty() {
            return Ok(());
        }
        let rest = [
            std::mem::take(&mut self.input[0]),
            std::mem::take(&mut self.input[1]),
        ];
        let resampled = self
            .inner
            .process_partial(Some(&rest[..]), None)
            .map_err(|e| AudioError::Resample(e.to_string()))?;
        interleave(&resampled, out);
        Ok(())
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.input[0].clear();
        self.input[1].clear();
    }
}

fn interleave(channels: &[Vec<f32>], out: &mut VecDeque<f32>) {
    let frames = channels.first().map_or(0, Vec::len);
    for frame in 0..frames {
        out.push_back(channels[0][frame]);
        out.push_back(channels.get(1).map_or(channels[0][frame], |ch| ch[frame]));
    }
}
