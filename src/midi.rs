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
use midly::live::LiveEvent;
use midly::MidiMessage;

mod midir;

pub use self::midir::{connect_input, list_input_devices, InputConnection};

/// A note-on event, positioned within the block it is rendered in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NoteOn {
    /// Frame offset into the block.
    pub offset: u32,
    /// MIDI channel, 0-15.
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
}

impl NoteOn {
    pub fn new(note: u8) -> Self {
        Self {
            offset: 0,
            channel: 0,
            note,
            velocity: 127,
        }
    }

    /// Parses raw MIDI bytes. Anything that is not a note-on yields `None`,
    /// including a note-on with velocity 0 (a note-off by convention).
    pub fn parse(offset: u32, raw: &[u8]) -> Option<NoteOn> {
        match LiveEvent::parse(raw).ok()? {
            LiveEvent::Midi {
                channel,
                message: MidiMessage::NoteOn { key, vel },
            } if vel.as_int() > 0 => Some(NoteOn {
                offset,
                channel: channel.as_int(),
                note: key.as_int(),
                velocity: vel.as_int(),
            }),
            _ => None,
        }
    }
}
