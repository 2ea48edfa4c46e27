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

//! MIDI-triggered sample voices.
//!
//! This module provides:
//! - In-memory sample buffers and decoding on a bounded worker pool
//! - Per-voice playback, note-range gating, gain and VU metering
//! - The voice pool shared between the audio thread and control callers
//! - State snapshots and persisted configuration

mod buffer;
mod engine;
mod error;
mod loader;
mod state;
mod voice;
mod vu;

pub use buffer::SampleBuffer;
pub use engine::{default_load_threads, EngineOptions, LoadResult, SamplerEngine};
pub use error::{DecodeError, EngineError, StateError};
pub use loader::{DecodedSample, Decoder, LoadPool, SymphoniaDecoder};
pub use state::{EngineState, PersistedState, PersistedVoice, VuLevel, STATE_VERSION};
pub use voice::{
    Status, Voice, VoiceState, DEFAULT_MIDI_HIGH, DEFAULT_MIDI_LOW, MAX_GAIN, MIDI_NOTE_MAX,
};
pub use vu::{VuMeter, DEFAULT_VU_WINDOW, VU_CEILING_DB, VU_FLOOR_DB};
