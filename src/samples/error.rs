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
use std::path::PathBuf;

/// Error types for decoding a sample file.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Audio file error: {0}")]
    Audio(#[from] symphonia::core::errors::Error),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Sample rate not specified")]
    MissingSampleRate,

    #[error("Decoder panicked: {0}")]
    Panicked(String),
}

/// Error types for voice pool operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("missing id: no voice with id {0}")]
    UnknownVoice(u32),

    #[error("voice {0} was reloaded or replaced before the load finished")]
    Superseded(u32),

    #[error("failed to load {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("load worker pool error: {0}")]
    Pool(String),

    #[error("load was dropped before it completed")]
    Cancelled,

    #[error("no voice ids left to assign")]
    IdsExhausted,
}

/// Error types for reading and writing persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State format error: {0}")]
    Json(#[from] serde_json::Error),
}
