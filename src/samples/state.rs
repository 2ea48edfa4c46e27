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

//! Observable and persisted shapes of the voice pool.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::StateError;
use super::voice::{VoiceState, DEFAULT_MIDI_HIGH, DEFAULT_MIDI_LOW};

/// Current persisted format version.
pub const STATE_VERSION: u32 = 1;

/// Full snapshot of every voice, taken at a single instant.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub struct EngineState {
    pub players: Vec<VoiceState>,
}

/// A voice's current meter reading.
#[derive(Serialize, Clone, Copy, Debug, PartialEq)]
pub struct VuLevel {
    pub id: u32,
    pub db: f32,
}

/// The persisted configuration of one voice. Decoded audio is never stored.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedVoice {
    pub id: u32,
    #[serde(default = "default_midi_low")]
    pub midi_low: i32,
    #[serde(default = "default_midi_high")]
    pub midi_high: i32,
    #[serde(default = "default_gain")]
    pub gain: f32,
    #[serde(default)]
    pub file_path: String,
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

/// Saved pool state.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PersistedState {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub players: Vec<PersistedVoice>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            players: Vec::new(),
        }
    }
}

impl PersistedState {
    /// Writes the state as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<(), StateError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!(path = ?path, voices = self.players.len(), "Saved sampler state");
        Ok(())
    }

    /// Reads state previously written by `save`.
    pub fn load(path: &Path) -> Result<Self, StateError> {
        let json = fs::read_to_string(path)?;
        let state: PersistedState = serde_json::from_str(&json)?;
        info!(path = ?path, voices = state.players.len(), "Loaded sampler state");
        Ok(state)
    }
}
