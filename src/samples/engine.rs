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

//! The voice pool: owns every voice, serializes control-plane access, and
//! drives the render loop.
//!
//! All voice state lives behind one mutex. Control operations and the render
//! path hold it only for short, allocation-free critical sections. Decoding
//! and waveform rendering happen on the load pool with the lock released; only
//! the final buffer swap re-enters it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::buffer::SampleBuffer;
use super::error::{DecodeError, EngineError};
use super::loader::{decode_guarded, DecodedSample, Decoder, LoadPool};
use super::state::{EngineState, PersistedState, PersistedVoice, VuLevel, STATE_VERSION};
use super::voice::{Voice, VoiceState};
use super::vu::DEFAULT_VU_WINDOW;
use crate::midi::NoteOn;
use crate::waveform::{WaveformOptions, WaveformStyle};

/// Result handed to load completion callbacks.
pub type LoadResult = Result<(), EngineError>;

/// Upper bound on the default number of decode workers.
const MAX_DEFAULT_LOAD_THREADS: usize = 4;

/// One worker per core, capped at four.
pub fn default_load_threads() -> usize {
    num_cpus::get().clamp(1, MAX_DEFAULT_LOAD_THREADS)
}

/// Construction options for a [`SamplerEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Number of decode worker threads.
    pub load_threads: usize,
    /// Waveform summary sizing.
    pub waveform: WaveformOptions,
    /// VU ring length per voice.
    pub vu_window: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            load_threads: default_load_threads(),
            waveform: WaveformOptions::default(),
            vu_window: DEFAULT_VU_WINDOW,
        }
    }
}

/// Everything guarded by the pool lock.
struct VoiceTable {
    voices: Vec<Voice>,
    /// Next id handed out by `add_voice`. Never decreases.
    next_id: u64,
    /// Last load ticket handed out. Never decreases.
    last_ticket: u64,
}

impl VoiceTable {
    fn get(&self, id: u32) -> Option<&Voice> {
        self.voices.iter().find(|voice| voice.id() == id)
    }

    fn get_mut(&mut self, id: u32) -> Option<&mut Voice> {
        self.voices.iter_mut().find(|voice| voice.id() == id)
    }

    fn issue_ticket(&mut self) -> u64 {
        self.last_ticket += 1;
        self.last_ticket
    }
}

struct Shared {
    table: Mutex<VoiceTable>,
    loader: LoadPool,
    decoder: Arc<dyn Decoder>,
    style: Arc<WaveformStyle>,
    vu_window: usize,
}

impl Shared {
    /// Applies a finished decode to the voice that requested it. Returns the
    /// outcome for the completion callback.
    fn complete_load(
        &self,
        id: u32,
        ticket: u64,
        path: &Path,
        decoded: Result<DecodedSample, DecodeError>,
    ) -> LoadResult {
        // Render the summary before taking the lock.
        let prepared = decoded.map(|sample| {
            let waveform = self.style.render(&sample.buffer);
            (sample, waveform)
        });

        let (result, replaced) = {
            let mut table = self.table.lock();
            match table.get_mut(id) {
                None => (Err(EngineError::UnknownVoice(id)), None),
                Some(voice) if voice.load_ticket() != ticket => {
                    (Err(EngineError::Superseded(id)), None)
                }
                Some(voice) => match prepared {
                    Ok((sample, waveform)) => {
                        let previous = voice.install(sample.buffer, &sample.name, waveform);
                        (Ok(()), Some(previous))
                    }
                    Err(source) => {
                        let previous = voice.fail(path, &source.to_string());
                        let error = EngineError::Decode {
                            path: path.to_path_buf(),
                            source,
                        };
                        (Err(error), Some(previous))
                    }
                },
            }
        };
        // The old buffer is freed here, outside the lock.
        drop(replaced);

        match &result {
            Ok(()) => info!(id, path = ?path, "Sample loaded"),
            Err(EngineError::Decode { source, .. }) => {
                warn!(id, path = ?path, error = %source, "Sample failed to load")
            }
            Err(e) => debug!(id, path = ?path, error = %e, "Discarded load result"),
        }
        result
    }
}

/// Handle to a pool of sample voices. Clones share the same pool.
#[derive(Clone)]
pub struct SamplerEngine {
    shared: Arc<Shared>,
}

impl SamplerEngine {
    /// Creates an empty pool that decodes with the given decoder.
    pub fn new(decoder: Arc<dyn Decoder>, options: EngineOptions) -> Result<Self, EngineError> {
        let loader = LoadPool::new(options.load_threads)?;
        info!(
            load_threads = loader.threads(),
            vu_window = options.vu_window,
            "Sampler engine created"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                table: Mutex::new(VoiceTable {
                    voices: Vec::new(),
                    next_id: 1,
                    last_ticket: 0,
                }),
                loader,
                decoder,
                style: Arc::new(WaveformStyle::new(options.waveform)),
                vu_window: options.vu_window,
            }),
        })
    }

    fn new_voice(&self, id: u32) -> Voice {
        Voice::new(id, Arc::clone(&self.shared.style), self.shared.vu_window)
    }

    /// Adds an empty voice and returns its id.
    ///
    /// Fails once every id has been handed out.
    pub fn add_voice(&self) -> Result<u32, EngineError> {
        let mut table = self.shared.table.lock();
        let Ok(id) = u32::try_from(table.next_id) else {
            drop(table);
            warn!("Voice ids exhausted, not adding a voice");
            return Err(EngineError::IdsExhausted);
        };
        table.next_id += 1;
        let voice = self.new_voice(id);
        table.voices.push(voice);
        drop(table);

        info!(id, "Voice added");
        Ok(id)
    }

    pub fn voice_count(&self) -> usize {
        self.shared.table.lock().voices.len()
    }

    /// Ids in pool order.
    pub fn voice_ids(&self) -> Vec<u32> {
        self.shared
            .table
            .lock()
            .voices
            .iter()
            .map(Voice::id)
            .collect()
    }

    /// Snapshot of a single voice.
    pub fn state(&self, id: u32) -> Option<VoiceState> {
        self.shared.table.lock().get(id).map(Voice::get_state)
    }

    /// The current waveform SVG of a voice.
    pub fn waveform_svg(&self, id: u32) -> Option<Arc<str>> {
        self.shared.table.lock().get(id).map(Voice::waveform)
    }

    /// Requests an asynchronous load of `path` into voice `id`.
    ///
    /// `on_complete` runs exactly once. For an unknown id it runs immediately
    /// on the calling thread with [`EngineError::UnknownVoice`] and this
    /// returns false. Otherwise the voice moves to `loading`, decoding runs on
    /// the load pool, and `on_complete` runs on a load worker afterwards.
    pub fn load_sample_async<P, F>(&self, id: u32, path: P, on_complete: F) -> bool
    where
        P: Into<PathBuf>,
        F: FnOnce(LoadResult) + Send + 'static,
    {
        let path = path.into();
        let ticket = {
            let mut table = self.shared.table.lock();
            let ticket = table.issue_ticket();
            match table.get_mut(id) {
                Some(voice) => {
                    voice.begin_load(&path, ticket);
                    Some(ticket)
                }
                None => None,
            }
        };

        let Some(ticket) = ticket else {
            warn!(id, path = ?path, "Load requested for unknown voice");
            on_complete(Err(EngineError::UnknownVoice(id)));
            return false;
        };

        info!(id, path = ?path, "Loading sample");
        let shared = Arc::clone(&self.shared);
        self.shared.loader.spawn(move || {
            let decoded = decode_guarded(shared.decoder.as_ref(), &path);
            let result = shared.complete_load(id, ticket, &path, decoded);
            on_complete(result);
        });
        true
    }

    /// Loads `path` into voice `id` and resolves once the load has been applied.
    pub async fn load_sample<P: Into<PathBuf>>(&self, id: u32, path: P) -> LoadResult {
        let (tx, rx) = oneshot::channel();
        self.load_sample_async(id, path, move |result| {
            let _ = tx.send(result);
        });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(EngineError::Cancelled),
        }
    }

    /// Sets a voice's note range. Returns false for an unknown id.
    pub fn set_midi_range(&self, id: u32, low: i32, high: i32) -> bool {
        match self.shared.table.lock().get_mut(id) {
            Some(voice) => {
                voice.set_midi_range(low, high);
                true
            }
            None => false,
        }
    }

    /// Sets a voice's gain. Returns false for an unknown id.
    pub fn set_gain(&self, id: u32, gain: f32) -> bool {
        match self.shared.table.lock().get_mut(id) {
            Some(voice) => {
                voice.set_gain(gain);
                true
            }
            None => false,
        }
    }

    /// Restarts a voice from the top. Returns false for an unknown id; an
    /// empty voice is a known id and simply stays silent.
    pub fn trigger(&self, id: u32) -> bool {
        match self.shared.table.lock().get_mut(id) {
            Some(voice) => {
                voice.trigger();
                true
            }
            None => false,
        }
    }

    /// Renders one block. `output` is interleaved with `channels` channels and
    /// is added into, so the caller clears it first. Every note-on in `notes`
    /// is applied before the first frame is produced.
    ///
    /// Real-time safe: no allocation, no I/O, and the lock is never held by
    /// anything slower than a buffer swap.
    pub fn process_block(&self, output: &mut [f32], channels: usize, notes: &[NoteOn]) {
        if channels == 0 {
            return;
        }

        let mut table = self.shared.table.lock();
        for note in notes {
            for voice in table.voices.iter_mut() {
                if voice.accepts_note(note.note) {
                    voice.trigger_note(note.note);
                }
            }
        }
        for voice in table.voices.iter_mut() {
            voice.render_block(output, channels);
        }
    }

    /// Snapshot of every voice, taken under one lock acquisition.
    pub fn to_state(&self) -> EngineState {
        let table = self.shared.table.lock();
        EngineState {
            players: table.voices.iter().map(Voice::get_state).collect(),
        }
    }

    /// Current VU level of every voice.
    pub fn vu_levels(&self) -> Vec<VuLevel> {
        let table = self.shared.table.lock();
        table
            .voices
            .iter()
            .map(|voice| VuLevel {
                id: voice.id(),
                db: voice.vu_db(),
            })
            .collect()
    }

    /// Configuration of every voice, suitable for saving.
    pub fn export_state(&self) -> PersistedState {
        let table = self.shared.table.lock();
        PersistedState {
            version: STATE_VERSION,
            players: table
                .voices
                .iter()
                .map(|voice| {
                    let (midi_low, midi_high) = voice.midi_range();
                    PersistedVoice {
                        id: voice.id(),
                        midi_low: midi_low as i32,
                        midi_high: midi_high as i32,
                        gain: voice.gain(),
                        file_path: voice.file_path().to_string(),
                    }
                })
                .collect(),
        }
    }

    /// Replaces every voice with the ones described by `state` and schedules a
    /// reload for each voice with a file path. Returns the number of reloads.
    ///
    /// Loads still in flight for the replaced voices are discarded when they
    /// finish.
    pub fn import_state(&self, state: &PersistedState) -> usize {
        let mut seen = HashSet::new();
        let mut voices = Vec::with_capacity(state.players.len());
        let mut reloads = Vec::new();
        for persisted in &state.players {
            if !seen.insert(persisted.id) {
                warn!(id = persisted.id, "Skipping duplicate voice id in imported state");
                continue;
            }

            let mut voice = self.new_voice(persisted.id);
            voice.set_midi_range(persisted.midi_low, persisted.midi_high);
            voice.set_gain(persisted.gain);
            if !persisted.file_path.is_empty() {
                voice.set_file_path(&persisted.file_path);
                reloads.push((persisted.id, PathBuf::from(&persisted.file_path)));
            }
            voices.push(voice);
        }

        let highest = voices.iter().map(Voice::id).max().unwrap_or(0);
        if highest == u32::MAX {
            warn!("Imported state holds the highest voice id, no more voices can be added");
        }
        let replaced = {
            let mut table = self.shared.table.lock();
            table.next_id = table.next_id.max(u64::from(highest) + 1);
            std::mem::replace(&mut table.voices, voices)
        };
        let replaced_count = replaced.len();
        drop(replaced);

        info!(
            voices = seen.len(),
            replaced = replaced_count,
            reloads = reloads.len(),
            "Imported sampler state"
        );

        let count = reloads.len();
        for (id, path) in reloads {
            self.load_sample_async(id, path, move |result| {
                if let Err(e) = result {
                    debug!(id, error = %e, "Reload after import did not apply");
                }
            });
        }
        count
    }

    /// Installs an already decoded buffer directly, bypassing the load pool.
    pub fn set_buffer(&self, id: u32, buffer: SampleBuffer, name: &str) -> bool {
        let waveform = self.shared.style.render(&buffer);
        let replaced = {
            let mut table = self.shared.table.lock();
            if table.get(id).is_none() {
                return false;
            }
            let ticket = table.issue_ticket();
            table.get_mut(id).map(|voice| {
                // Any load still in flight for this voice no longer applies.
                voice.supersede_load(ticket);
                voice.install(buffer, name, waveform)
            })
        };
        replaced.is_some()
    }
}

impl std::fmt::Debug for SamplerEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.shared.table.lock();
        f.debug_struct("SamplerEngine")
            .field("voices", &table.voices.len())
            .field("next_id", &table.next_id)
            .field("loader", &self.shared.loader)
            .finish()
    }
}
