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
use std::{error::Error, fmt};

use crossbeam_channel::{Sender, TrySendError};
use midir::{MidiInput, MidiInputConnection, MidiInputPort};
use tracing::{debug, info, span, warn, Level};

use super::NoteOn;

/// An open MIDI input. Events stop flowing when this is dropped.
pub struct InputConnection {
    name: String,
    _connection: MidiInputConnection<()>,
}

impl InputConnection {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for InputConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputConnection")
            .field("name", &self.name)
            .finish()
    }
}

/// Lists the names of all MIDI input ports, sorted.
pub fn list_input_devices() -> Result<Vec<String>, Box<dyn Error>> {
    let input = MidiInput::new("supersampler input listing")?;
    let mut names = input
        .ports()
        .iter()
        .map(|port| input.port_name(port))
        .collect::<Result<Vec<String>, _>>()?;
    names.sort();
    Ok(names)
}

/// Finds the single input port whose name contains `name`.
fn find_port(input: &MidiInput, name: &str) -> Result<(String, MidiInputPort), Box<dyn Error>> {
    let mut matches = Vec::new();
    for port in input.ports() {
        let port_name = input.port_name(&port)?;
        if port_name.contains(name) {
            matches.push((port_name, port));
        }
    }

    if matches.len() > 1 {
        return Err(format!(
            "found too many devices that match ({}), use a less ambiguous device name",
            matches
                .iter()
                .map(|(port_name, _)| port_name.clone())
                .collect::<Vec<String>>()
                .join(", ")
        )
        .into());
    }
    matches
        .pop()
        .ok_or_else(|| format!("no device found with name {}", name).into())
}

/// Connects to the input whose name contains `name` and forwards every
/// note-on to `sender`. If the receiver falls behind, events are dropped
/// rather than blocking the MIDI thread.
pub fn connect_input(name: &str, sender: Sender<NoteOn>) -> Result<InputConnection, Box<dyn Error>> {
    let span = span!(Level::INFO, "connect input (midir)");
    let _enter = span.enter();

    let input = MidiInput::new("supersampler input")?;
    let (port_name, port) = find_port(&input, name)?;

    let connection = input.connect(
        &port,
        "supersampler note watcher",
        move |_, raw_event, _| {
            let Some(note) = NoteOn::parse(0, raw_event) else {
                return;
            };
            debug!(note = note.note, velocity = note.velocity, "Received note on.");
            match sender.try_send(note) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => warn!("Note queue full, dropping note on."),
                Err(TrySendError::Disconnected(_)) => {}
            }
        },
        (),
    )?;

    info!(device = port_name, "Watching MIDI notes.");
    Ok(InputConnection {
        name: port_name,
        _connection: connection,
    })
}
