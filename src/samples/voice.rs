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

//! A single sample slot: one buffer, one playback cursor, one note range.
//!
//! Everything reachable from the render path (`accepts_note`, `trigger`,
//! `get_next_sample_for_channel`, `next_frame`, `render_block`) is allocation
//! free and never blocks.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::buffer::SampleBuffer;
use super::vu::VuMeter;
use crate::util::filename_display;
use crate::waveform::WaveformStyle;

/// Lowest note a voice answers to by default (C2).
pub const DEFAULT_MIDI_LOW: u8 = 36;

/// Highest note a voice answers to by default (C4).
pub const DEFAULT_MIDI_HIGH: u8 = 60;

/// Highest valid MIDI note.
pub const MIDI_NOTE_MAX: u8 = 127;

/// Gain is clamped to [0, MAX_GAIN].
pub const MAX_GAIN: f32 = 2.0;

/// The output channel folded into the VU meter.
pub const METER_CHANNEL: usize = 0;

/// Load status of a voice.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Empty,
    Loading,
    Loaded,
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Empty => "empty",
            Status::Loading => "loading",
            Status::Loaded => "loaded",
            Status::Error => "error",
        })
    }
}

/// An immutable snapshot of a voice for observers on other threads.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoiceState {
    pub id: u32,
    pub midi_low: u8,
    pub midi_high: u8,
    pub gain: f32,
    pub is_playing: bool,
    pub status: Status,
    pub file_name: String,
    pub file_path: String,
    /// The last decode error, if the voice is in the error state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// SVG summary of the loaded audio, or the placeholder.
    pub waveform: Arc<str>,
}

/// One independently playable sample slot.
pub struct Voice {
    /// Immutable identity within the pool.
    id: u32,
    midi_low: u8,
    midi_high: u8,
    gain: f32,
    status: Status,
    file_name: String,
    file_path: String,
    message: Option<String>,
    /// Decoded audio. Empty until a load completes.
    buffer: SampleBuffer,
    /// Next frame to play, always in [0, buffer.len()].
    cursor: usize,
    playing: bool,
    vu: VuMeter,
    waveform: Arc<str>,
    style: Arc<WaveformStyle>,
    /// Ticket of the most recent load request.
    load_ticket: u64,
}

impl Voice {
    /// Creates an empty voice.
    pub fn new(id: u32, style: Arc<WaveformStyle>, vu_window: usize) -> Self {
        Self {
            id,
            midi_low: DEFAULT_MIDI_LOW,
            midi_high: DEFAULT_MIDI_HIGH,
            gain: 1.0,
            status: Status::Empty,
            file_name: String::new(),
            file_path: String::new(),
            message: None,
            buffer: SampleBuffer::empty(),
            cursor: 0,
            playing: false,
            vu: VuMeter::new(vu_window),
            waveform: style.blank(),
            style,
            load_ticket: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns (low, high).
    pub fn midi_range(&self) -> (u8, u8) {
        (self.midi_low, self.midi_high)
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    /// Sets the note range. Both ends are clamped to [0, 127] and swapped if reversed.
    pub fn set_midi_range(&mut self, low: i32, high: i32) {
        let low = low.clamp(0, MIDI_NOTE_MAX as i32) as u8;
        let high = high.clamp(0, MIDI_NOTE_MAX as i32) as u8;
        self.midi_low = low.min(high);
        self.midi_high = low.max(high);
    }

    /// Sets the gain, clamped to [0, 2]. NaN is treated as silence.
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = if gain.is_nan() {
            0.0
        } else {
            gain.clamp(0.0, MAX_GAIN)
        };
    }

    /// True if the note is inside the range and there is audio to play.
    #[inline]
    pub fn accepts_note(&self, note: u8) -> bool {
        note >= self.midi_low && note <= self.midi_high && !self.buffer.is_empty()
    }

    /// Restarts playback from the top. Does nothing for an empty voice.
    #[inline]
    pub fn trigger(&mut self) {
        if !self.buffer.is_empty() {
            self.cursor = 0;
            self.playing = true;
        }
    }

    /// Restarts playback for a note. Pitch is not tracked, so the note only gates.
    #[inline]
    pub fn trigger_note(&mut self, _note: u8) {
        self.trigger();
    }

    /// Produces the next sample for one channel and advances the cursor.
    /// Returns silence without touching any state when the voice is idle.
    #[inline]
    pub fn get_next_sample_for_channel(&mut self, channel: usize) -> f32 {
        if !self.playing || self.buffer.is_empty() {
            return 0.0;
        }

        let sample = self.buffer.sample(channel, self.cursor) * self.gain;
        if channel == METER_CHANNEL {
            self.vu.push(sample.abs());
        }
        self.advance();
        sample
    }

    /// Adds one frame of every output channel into `frame` and advances the cursor once.
    #[inline]
    pub fn next_frame(&mut self, frame: &mut [f32]) {
        if !self.playing || self.buffer.is_empty() || frame.is_empty() {
            return;
        }

        for (channel, out) in frame.iter_mut().enumerate() {
            let sample = self.buffer.sample(channel, self.cursor) * self.gain;
            if channel == METER_CHANNEL {
                self.vu.push(sample.abs());
            }
            *out += sample;
        }
        self.advance();
    }

    #[inline]
    fn advance(&mut self) {
        self.cursor += 1;
        if self.cursor >= self.buffer.len() {
            self.cursor = self.buffer.len();
            self.playing = false;
        }
    }

    /// Mixes a whole interleaved block into `output` and refreshes the VU level.
    pub fn render_block(&mut self, output: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        self.begin_block(output.len() / channels);
        if self.playing {
            for frame in output.chunks_exact_mut(channels) {
                if !self.playing {
                    break;
                }
                self.next_frame(frame);
            }
        }
        self.end_block();
    }

    /// Opens a metering block of `frames` frames.
    #[inline]
    pub fn begin_block(&mut self, frames: usize) {
        self.vu.begin_block(frames);
    }

    /// Closes the metering block and returns the reported VU level in dB.
    #[inline]
    pub fn end_block(&mut self) -> f32 {
        self.vu.end_block()
    }

    /// The last reported VU level in dB.
    pub fn vu_db(&self) -> f32 {
        self.vu.level_db()
    }

    /// Marks the voice as loading `path` and stamps it with `ticket`.
    pub(crate) fn begin_load(&mut self, path: &Path, ticket: u64) {
        self.status = Status::Loading;
        self.file_path = path.to_string_lossy().into_owned();
        self.file_name = filename_display(path).to_string();
        self.message = None;
        self.load_ticket = ticket;
    }

    pub(crate) fn load_ticket(&self) -> u64 {
        self.load_ticket
    }

    /// Invalidates any pending load without changing the status.
    pub(crate) fn supersede_load(&mut self, ticket: u64) {
        self.load_ticket = ticket;
    }

    /// Records the file path without loading anything.
    pub(crate) fn set_file_path(&mut self, path: &str) {
        self.file_path = path.to_string();
        self.file_name = filename_display(Path::new(path)).to_string();
    }

    /// Swaps in a decoded buffer and its pre-rendered waveform. Returns the
    /// previous buffer so the caller can free it outside any lock.
    pub(crate) fn install(
        &mut self,
        buffer: SampleBuffer,
        name: &str,
        waveform: Arc<str>,
    ) -> SampleBuffer {
        let previous = std::mem::replace(&mut self.buffer, buffer);
        self.status = Status::Loaded;
        self.file_name = name.to_string();
        if self.file_path.is_empty() {
            self.file_path = name.to_string();
        }
        self.message = None;
        self.cursor = 0;
        self.playing = false;
        self.waveform = waveform;
        self.vu.reset();
        previous
    }

    /// Clears the buffer and records a failure. Returns the previous buffer.
    pub(crate) fn fail(&mut self, path: &Path, message: &str) -> SampleBuffer {
        let previous = std::mem::take(&mut self.buffer);
        self.status = Status::Error;
        self.file_path = path.to_string_lossy().into_owned();
        self.file_name = filename_display(path).to_string();
        self.message = Some(message.to_string());
        self.cursor = 0;
        self.playing = false;
        self.waveform = self.style.blank();
        self.vu.reset();
        previous
    }

    /// Replaces the sample buffer and marks the voice loaded. An empty buffer
    /// is accepted and simply plays nothing.
    pub fn set_loaded_buffer(&mut self, buffer: SampleBuffer, name: &str) -> bool {
        let waveform = self.style.render(&buffer);
        self.install(buffer, name, waveform);
        true
    }

    /// Clears the buffer and puts the voice in the error state.
    pub fn mark_error(&mut self, path: &Path, message: &str) {
        self.fail(path, message);
    }

    /// The current waveform summary.
    pub fn waveform(&self) -> Arc<str> {
        Arc::clone(&self.waveform)
    }

    /// Copies everything an observer needs.
    pub fn get_state(&self) -> VoiceState {
        VoiceState {
            id: self.id,
            midi_low: self.midi_low,
            midi_high: self.midi_high,
            gain: self.gain,
            is_playing: self.playing,
            status: self.status,
            file_name: self.file_name.clone(),
            file_path: self.file_path.clone(),
            message: self.message.clone(),
            waveform: Arc::clone(&self.waveform),
        }
    }
}

impl fmt::Debug for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Voice")
            .field("id", &self.id)
            .field("midi_range", &(self.midi_low, self.midi_high))
            .field("gain", &self.gain)
            .field("status", &self.status)
            .field("frames", &self.buffer.len())
            .field("cursor", &self.cursor)
            .field("playing", &self.playing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::samples::vu::{DEFAULT_VU_WINDOW, VU_CEILING_DB, VU_FLOOR_DB};

    fn voice() -> Voice {
        Voice::new(1, Arc::new(WaveformStyle::default()), DEFAULT_VU_WINDOW)
    }

    fn loaded_voice(frames: usize) -> Voice {
        let mut voice = voice();
        let samples = (0..frames).map(|i| i as f32 / frames as f32).collect();
        assert!(voice.set_loaded_buffer(SampleBuffer::new(vec![samples], 44100), "ramp.wav"));
        voice
    }

    #[test]
    fn test_defaults() {
        let voice = voice();
        let state = voice.get_state();
        assert_eq!(state.id, 1);
        assert_eq!((state.midi_low, state.midi_high), (36, 60));
        assert_eq!(state.gain, 1.0);
        assert_eq!(state.status, Status::Empty);
        assert!(!state.is_playing);
        assert!(state.waveform.contains("No sample"));
    }

    #[test]
    fn test_midi_range_normalization() {
        let mut voice = voice();
        let inputs = [
            (60, 36),
            (36, 60),
            (-20, 300),
            (300, -20),
            (128, 127),
            (0, 0),
            (i32::MIN, i32::MAX),
        ];
        for (low, high) in inputs {
            voice.set_midi_range(low, high);
            let (stored_low, stored_high) = voice.midi_range();
            assert!(stored_low <= stored_high, "{} > {}", stored_low, stored_high);
            assert!(stored_high <= MIDI_NOTE_MAX);
        }

        voice.set_midi_range(60, 36);
        assert_eq!(voice.midi_range(), (36, 60));
        voice.set_midi_range(-5, 200);
        assert_eq!(voice.midi_range(), (0, 127));
    }

    #[test]
    fn test_gain_clamping() {
        let mut voice = voice();
        for gain in [-1.0, 0.0, 0.5, 1.999, 2.0, 2.5, f32::INFINITY, f32::NEG_INFINITY] {
            voice.set_gain(gain);
            assert_eq!(voice.gain(), gain.clamp(0.0, MAX_GAIN));
        }
        voice.set_gain(f32::NAN);
        assert_eq!(voice.gain(), 0.0);
    }

    #[test]
    fn test_accepts_note() {
        let mut empty = voice();
        empty.set_midi_range(0, 127);
        assert!((0..=127).all(|note| !empty.accepts_note(note)));

        let mut loaded = loaded_voice(8);
        loaded.set_midi_range(40, 42);
        assert!(!loaded.accepts_note(39));
        assert!(loaded.accepts_note(40));
        assert!(loaded.accepts_note(42));
        assert!(!loaded.accepts_note(43));
    }

    #[test]
    fn test_trigger_empty_is_noop() {
        let mut voice = voice();
        voice.trigger();
        voice.trigger_note(48);
        assert!(!voice.is_playing());
        assert_eq!(voice.cursor(), 0);
        assert_eq!(voice.get_next_sample_for_channel(0), 0.0);
    }

    #[test]
    fn test_drain_to_completion() {
        let frames = 16;
        let mut voice = loaded_voice(frames);
        voice.trigger();
        assert!(voice.is_playing());
        assert_eq!(voice.cursor(), 0);

        for i in 0..frames {
            assert!(voice.is_playing());
            let sample = voice.get_next_sample_for_channel(0);
            assert_eq!(sample, i as f32 / frames as f32);
        }
        assert!(!voice.is_playing());
        assert_eq!(voice.cursor(), frames);

        for _ in 0..4 {
            assert_eq!(voice.get_next_sample_for_channel(0), 0.0);
        }
        assert_eq!(voice.cursor(), frames);

        // Retriggering starts over.
        voice.trigger();
        assert_eq!(voice.cursor(), 0);
        assert!(voice.is_playing());
    }

    #[test]
    fn test_gain_applied() {
        let mut voice = voice();
        voice.set_loaded_buffer(SampleBuffer::new(vec![vec![0.5; 4]], 44100), "half.wav");
        voice.set_gain(2.0);
        voice.trigger();
        assert_eq!(voice.get_next_sample_for_channel(0), 1.0);
    }

    #[test]
    fn test_next_frame_mono_feeds_all_channels() {
        let mut voice = voice();
        voice.set_loaded_buffer(SampleBuffer::new(vec![vec![0.25, 0.5]], 44100), "mono.wav");
        voice.trigger();

        let mut frame = [0.0f32; 2];
        voice.next_frame(&mut frame);
        assert_eq!(frame, [0.25, 0.25]);
        assert_eq!(voice.cursor(), 1);

        voice.next_frame(&mut frame);
        assert_eq!(frame, [0.75, 0.75]);
        assert!(!voice.is_playing());

        // Idle voices add nothing.
        voice.next_frame(&mut frame);
        assert_eq!(frame, [0.75, 0.75]);
    }

    #[test]
    fn test_next_frame_stereo() {
        let mut voice = voice();
        voice.set_loaded_buffer(
            SampleBuffer::new(vec![vec![0.1, 0.2], vec![-0.1, -0.2]], 44100),
            "stereo.wav",
        );
        voice.trigger();

        let mut block = [0.0f32; 6];
        voice.render_block(&mut block, 2);
        assert_eq!(block, [0.1, -0.1, 0.2, -0.2, 0.0, 0.0]);
        assert!(!voice.is_playing());
    }

    #[test]
    fn test_set_loaded_buffer_resets_playback() {
        let mut voice = loaded_voice(8);
        voice.trigger();
        voice.get_next_sample_for_channel(0);
        assert_eq!(voice.cursor(), 1);

        voice.set_loaded_buffer(SampleBuffer::new(vec![vec![0.0; 4]], 44100), "other.wav");
        assert_eq!(voice.cursor(), 0);
        assert!(!voice.is_playing());
        assert_eq!(voice.status(), Status::Loaded);
        assert_eq!(voice.get_state().file_name, "other.wav");
        // The path was already set by the first load.
        assert_eq!(voice.file_path(), "ramp.wav");
        assert!(!voice.get_state().waveform.contains("No sample"));
    }

    #[test]
    fn test_empty_load_is_silent() {
        let mut voice = voice();
        assert!(voice.set_loaded_buffer(SampleBuffer::empty(), "silence.wav"));
        assert_eq!(voice.status(), Status::Loaded);
        voice.trigger();
        assert!(!voice.is_playing());
        assert!(voice.get_state().waveform.contains("No sample"));
    }

    #[test]
    fn test_mark_error() {
        let mut voice = loaded_voice(8);
        voice.trigger();
        voice.mark_error(Path::new("/tmp/broken.wav"), "unsupported format");

        let state = voice.get_state();
        assert_eq!(state.status, Status::Error);
        assert_eq!(state.file_path, "/tmp/broken.wav");
        assert_eq!(state.file_name, "broken.wav");
        assert_eq!(state.message.as_deref(), Some("unsupported format"));
        assert!(!state.is_playing);
        assert!(state.waveform.contains("No sample"));
        assert!(voice.buffer().is_empty());
        assert_eq!(voice.cursor(), 0);
    }

    #[test]
    fn test_vu_tracks_output() {
        let mut voice = voice();
        voice.set_loaded_buffer(
            SampleBuffer::new(vec![vec![1.0; DEFAULT_VU_WINDOW * 4]], 44100),
            "loud.wav",
        );
        voice.set_gain(2.0);
        voice.trigger();

        let mut block = vec![0.0f32; DEFAULT_VU_WINDOW * 2];
        voice.render_block(&mut block, 2);
        assert_eq!(voice.vu_db(), VU_CEILING_DB);

        // Once playback ends the meter decays toward the floor and never below.
        let mut block = vec![0.0f32; DEFAULT_VU_WINDOW * 2];
        for _ in 0..200 {
            voice.render_block(&mut block, 2);
            assert!(voice.vu_db() >= VU_FLOOR_DB);
        }
        assert!((voice.vu_db() - VU_FLOOR_DB).abs() < 0.01);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(Status::Loaded.to_string(), "loaded");
        assert_eq!(
            serde_json::to_string(&Status::Loading).unwrap(),
            "\"loading\""
        );
    }
}
