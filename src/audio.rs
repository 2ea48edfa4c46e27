// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use crossbeam_channel::Receiver;

use crate::midi::NoteOn;
use crate::samples::SamplerEngine;

pub mod cpal;
mod thread_priority;

pub use self::cpal::{start_output, OutputHost};

/// Most note-ons applied in one block. Anything beyond waits for the next block.
pub const MAX_NOTES_PER_BLOCK: usize = 256;

/// Feeds queued note-ons and the engine into an output buffer, one block at a
/// time. Owned by the audio callback; allocates only in `new`.
pub struct BlockRenderer {
    engine: SamplerEngine,
    notes: Receiver<NoteOn>,
    batch: Vec<NoteOn>,
    channels: usize,
}

impl BlockRenderer {
    pub fn new(engine: SamplerEngine, notes: Receiver<NoteOn>, channels: usize) -> Self {
        Self {
            engine,
            notes,
            batch: Vec::with_capacity(MAX_NOTES_PER_BLOCK),
            channels,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Overwrites `output` with the next block.
    pub fn render(&mut self, output: &mut [f32]) {
        self.batch.clear();
        while self.batch.len() < MAX_NOTES_PER_BLOCK {
            match self.notes.try_recv() {
                Ok(note) => self.batch.push(note),
                Err(_) => break,
            }
        }

        output.fill(0.0);
        self.engine.process_block(output, self.channels, &self.batch);
    }
}
