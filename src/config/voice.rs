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
use serde::{Deserialize, Serialize};

use crate::samples::{DEFAULT_MIDI_HIGH, DEFAULT_MIDI_LOW};

/// A YAML representation of a voice to create at startup.
#[derive(Deserialize, Clone, Serialize, Debug, PartialEq)]
pub struct VoiceConfig {
    /// The sample to load, relative to the config file.
    file: Option<String>,

    /// Lowest note this voice answers to.
    #[serde(default = "default_midi_low")]
    midi_low: i32,

    /// Highest note this voice answers to.
    #[serde(default = "default_midi_high")]
    midi_high: i32,

    /// Output gain, 0.0 to 2.0.
    #[serde(default = "default_gain")]
    gain: f32,
}

fn default_midi_low() -> i32 {
    DEFAULT_MIDI_LOW as i32
}

fn default_midi_high() -> i32 {
    DEFAULT_MIDI_HIGH as i32
}

fn default_gain() -> f32 {
    1.0
}

impl VoiceConfig {
    /// Gets the sample file, if any.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Gets the configured note range as (low, high), unnormalized.
    pub fn midi_range(&self) -> (i32, i32) {
        (self.midi_low, self.midi_high)
    }

    /// Gets the gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

#[cfg(test)]
impl VoiceConfig {
    /// Creates a new voice config (test only).
    pub fn new(file: Option<&str>, midi_low: i32, midi_high: i32, gain: f32) -> Self {
        Self {
            file: file.map(str::to_string),
            midi_low,
            midi_high,
            gain,
        }
    }
}
