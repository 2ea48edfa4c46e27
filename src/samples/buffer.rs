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

//! In-memory sample storage.

use std::time::Duration;

/// A fully decoded sample in planar format.
/// Planar format stores all samples for channel 0, then all samples for channel 1, etc.
/// Every channel holds exactly `len()` frames.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SampleBuffer {
    /// One Vec per channel.
    channels: Vec<Vec<f32>>,
    /// Sample rate of the decoded audio.
    sample_rate: u32,
}

impl SampleBuffer {
    /// Creates a buffer from planar channel data. Channels longer than the
    /// shortest one are truncated so that every channel has the same length.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.truncate(frames);
        }
        Self {
            channels,
            sample_rate,
        }
    }

    /// Creates a buffer from interleaved samples. A trailing partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: u16, sample_rate: u32) -> Self {
        let num_channels = channel_count as usize;
        if num_channels == 0 {
            return Self::empty();
        }

        let num_frames = samples.len() / num_channels;
        let mut channels = vec![Vec::with_capacity(num_frames); num_channels];
        for frame in samples.chunks_exact(num_channels) {
            for (ch, sample) in frame.iter().enumerate() {
                channels[ch].push(*sample);
            }
        }

        Self {
            channels,
            sample_rate,
        }
    }

    /// An empty buffer with no channels.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of frames (samples per channel).
    pub fn len(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// True when there is nothing to play.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Sample rate of the audio data.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the planar data for one channel.
    pub fn channel(&self, channel: usize) -> Option<&[f32]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// Reads one sample. The channel index is clamped to the last channel so
    /// a mono buffer feeds every output channel. The buffer must not be empty
    /// and `frame` must be below `len()`.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        let channel = channel.min(self.channels.len() - 1);
        self.channels[channel][frame]
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.iter().map(Vec::len).sum::<usize>() * std::mem::size_of::<f32>()
    }

    /// Playback length at the native sample rate.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.len() as f64 / self.sample_rate as f64)
    }
}
