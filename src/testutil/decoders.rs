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

use std::{
    collections::HashMap,
    io,
    path::{Path, PathBuf},
    time::Duration,
};

use crossbeam_channel::{Receiver, Sender};

use crate::samples::{DecodeError, DecodedSample, Decoder, SampleBuffer};
use crate::util::filename_display;

/// Serves buffers registered by path. Unknown paths fail with NotFound.
#[derive(Default)]
pub struct MemoryDecoder {
    buffers: HashMap<PathBuf, SampleBuffer>,
}

impl MemoryDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, path: impl Into<PathBuf>, buffer: SampleBuffer) -> Self {
        self.buffers.insert(path.into(), buffer);
        self
    }
}

impl Decoder for MemoryDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedSample, DecodeError> {
        match self.buffers.get(path) {
            Some(buffer) => Ok(DecodedSample {
                buffer: buffer.clone(),
                name: filename_display(path).to_string(),
            }),
            None => Err(DecodeError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{}: not found", path.display()),
            ))),
        }
    }
}

/// Fails every decode.
pub struct FailingDecoder;

impl Decoder for FailingDecoder {
    fn decode(&self, _path: &Path) -> Result<DecodedSample, DecodeError> {
        Err(DecodeError::NoAudioTrack)
    }
}

/// Parks every decode until the test sends on the returned gate.
pub struct GatedDecoder {
    buffer: SampleBuffer,
    gate: Receiver<()>,
}

impl GatedDecoder {
    pub fn new(buffer: SampleBuffer) -> (Self, Sender<()>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (Self { buffer, gate: rx }, tx)
    }
}

impl Decoder for GatedDecoder {
    fn decode(&self, path: &Path) -> Result<DecodedSample, DecodeError> {
        self.gate
            .recv_timeout(Duration::from_secs(10))
            .map_err(|e| DecodeError::Io(io::Error::new(io::ErrorKind::TimedOut, e)))?;
        Ok(DecodedSample {
            buffer: self.buffer.clone(),
            name: filename_display(path).to_string(),
        })
    }
}
