// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! Sample decoding and the worker pool that runs it.
//!
//! Samples are decoded entirely into memory before they become playable. All of
//! the work here happens off the audio thread.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use rayon::ThreadPoolBuilder;
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use symphonia::default::{get_codecs, get_probe};
use tracing::{debug, info};

use super::buffer::SampleBuffer;
use super::error::{DecodeError, EngineError};
use crate::util::filename_display;

/// A decoded sample ready to be swapped into a voice.
#[derive(Debug, Clone)]
pub struct DecodedSample {
    /// The decoded audio.
    pub buffer: SampleBuffer,
    /// Name shown to users.
    pub name: String,
}

/// Turns a file into a multi-channel buffer. Always called off the audio thread.
pub trait Decoder: Send + Sync {
    fn decode(&self, path: &Path) -> Result<DecodedSample, DecodeError>;
}

/// Decodes anything symphonia understands (WAV, FLAC, MP3, Ogg/Vorbis, ...).
#[derive(Debug, Default, Clone, Copy)]
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Reads the next packet. `Ok(None)` means end of stream.
    fn read_next_packet(
        format_reader: &mut dyn FormatReader,
    ) -> Result<Option<Packet>, SymphoniaError> {
        match format_reader.next_packet() {
            Ok(packet) => Ok(Some(packet)),
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Appends a decoded packet to the planar channel buffers.
    fn append_decoded(decoded: AudioBufferRef, channels: &mut Vec<Vec<f32>>) {
        match decoded {
            AudioBufferRef::F32(buf) => Self::append_planes(&buf, channels, |s| s),
            AudioBufferRef::F64(buf) => Self::append_planes(&buf, channels, |s| s as f32),
            AudioBufferRef::S8(buf) => Self::append_planes(&buf, channels, Self::scale_s8),
            AudioBufferRef::S16(buf) => Self::append_planes(&buf, channels, Self::scale_s16),
            AudioBufferRef::S24(buf) => {
                Self::append_planes(&buf, channels, |s| Self::scale_s24(s.inner()))
            }
            AudioBufferRef::S32(buf) => Self::append_planes(&buf, channels, Self::scale_s32),
            AudioBufferRef::U8(buf) => Self::append_planes(&buf, channels, Self::scale_u8),
            AudioBufferRef::U16(buf) => Self::append_planes(&buf, channels, Self::scale_u16),
            AudioBufferRef::U24(buf) => {
                Self::append_planes(&buf, channels, |s| Self::scale_u24(s.inner()))
            }
            AudioBufferRef::U32(buf) => Self::append_planes(&buf, channels, Self::scale_u32),
        }
    }

    fn append_planes<T, F>(buf: &AudioBuffer<T>, channels: &mut Vec<Vec<f32>>, convert: F)
    where
        T: Sample,
        F: Fn(T) -> f32,
    {
        let planes = buf.planes();
        let planes = planes.planes();
        if channels.len() < planes.len() {
            // Channels that appear late start with silence so every plane stays aligned.
            let frames_so_far = channels.first().map(Vec::len).unwrap_or(0);
            channels.resize(planes.len(), vec![0.0; frames_so_far]);
        }
        for (channel, plane) in channels.iter_mut().zip(planes.iter()) {
            channel.extend(plane.iter().map(|&s| convert(s)));
        }
    }

    #[inline]
    pub(crate) fn scale_s8(sample: i8) -> f32 {
        sample as f32 / (1i64 << 7) as f32
    }

    #[inline]
    pub(crate) fn scale_s16(sample: i16) -> f32 {
        sample as f32 / (1i64 << 15) as f32
    }

    #[inline]
    pub(crate) fn scale_s24(sample: i32) -> f32 {
        sample as f32 / (1i64 << 23) as f32
    }

    #[inline]
    pub(crate) fn scale_s32(sample: i32) -> f32 {
        sample as f32 / (1i64 << 31) as f32
    }

    #[inline]
    pub(crate) fn scale_u8(sample: u8) -> f32 {
        (sample as f32 / u8::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u16(sample: u16) -> f32 {
        (sample as f32 / u16::MAX as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u24(sample: u32) -> f32 {
        let max = (1u32 << 24) - 1;
        (sample as f32 / max as f32) * 2.0 - 1.0
    }

    #[inline]
    pub(crate) fn scale_u32(sample: u32) -> f32 {
        (sample as f32 / u32::MAX as f32) * 2.0 - 1.0
    }
}

impl Decoder for SymphoniaDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedSample, DecodeError> {
        // Include the path in the error so the user sees which file failed.
        let file = File::open(path).map_err(|e| {
            DecodeError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();
        let probed = get_probe().format(&hint, mss, &fmt_opts, &meta_opts)?;
        let mut format_reader = probed.format;

        let track = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;
        let track_id = track.id;
        let params = track.codec_params.clone();
        let sample_rate = params.sample_rate.ok_or(DecodeError::MissingSampleRate)?;

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder: Box<dyn CodecDecoder> = get_codecs().make(&params, &decoder_opts)?;

        let expected_channels = params.channels.map(|c| c.count()).unwrap_or(0);
        let mut channels: Vec<Vec<f32>> = vec![Vec::new(); expected_channels];

        loop {
            let packet = match Self::read_next_packet(format_reader.as_mut()) {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }

            match decoder.decode(&packet) {
                Ok(decoded) => Self::append_decoded(decoded, &mut channels),
                // A corrupt packet is skipped rather than failing the whole sample.
                Err(SymphoniaError::DecodeError(e)) => {
                    debug!(path = ?path, error = e, "Skipping undecodable packet");
                }
                Err(SymphoniaError::ResetRequired) => decoder.reset(),
                Err(e) => return Err(e.into()),
            }
        }

        let buffer = SampleBuffer::new(channels, sample_rate);
        let name = filename_display(path).to_string();

        info!(
            path = ?path,
            channels = buffer.channel_count(),
            sample_rate,
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Sample decoded"
        );

        Ok(DecodedSample { buffer, name })
    }
}

/// Bounded pool of worker threads that run sample loads.
pub struct LoadPool {
    pool: rayon::ThreadPool,
    threads: usize,
}

impl LoadPool {
    /// Creates a new pool with the given number of worker threads.
    pub fn new(num_threads: usize) -> Result<Self, EngineError> {
        let threads = num_threads.max(1);
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("supersampler-load-{i}"))
            .build()
            .map_err(|e| EngineError::Pool(e.to_string()))?;
        Ok(Self { pool, threads })
    }

    /// Spawns a one-shot job on the pool.
    pub fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.spawn(job);
    }

    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl std::fmt::Debug for LoadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadPool")
            .field("threads", &self.threads)
            .finish()
    }
}

/// Runs the decoder, turning a panic into a decode error so every load
/// produces exactly one result.
pub(crate) fn decode_guarded(
    decoder: &dyn Decoder,
    path: &Path,
) -> Result<DecodedSample, DecodeError> {
    let started = std::time::Instant::now();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| decoder.decode(path)))
        .unwrap_or_else(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DecodeError::Panicked(message))
        });
    let elapsed: Duration = started.elapsed();
    debug!(path = ?path, elapsed_ms = elapsed.as_millis(), ok = result.is_ok(), "Decode finished");
    result
}
