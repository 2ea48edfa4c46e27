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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Parser, Subcommand};
use hound::{SampleFormat, WavSpec, WavWriter};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use supersampler::config::EngineConfig;
use supersampler::midi::{self, NoteOn};
use supersampler::samples::{PersistedState, SamplerEngine, Status, SymphoniaDecoder};
use supersampler::{audio, util};

/// Channels written by the offline renderer.
const RENDER_CHANNELS: usize = 2;

/// Capacity of the MIDI to audio thread note queue.
const NOTE_QUEUE_CAPACITY: usize = 1024;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A multi-voice sample player."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Plays through the default audio output, triggered by MIDI input.
    Play {
        /// The path to the sampler config.
        config_path: PathBuf,
    },
    /// Renders the given notes offline into a WAV file.
    Render {
        /// The path to the sampler config.
        config_path: PathBuf,
        /// The WAV file to write.
        output_path: PathBuf,
        /// Comma separated notes triggered at the start, e.g. 36,38.
        #[arg(short, long)]
        notes: String,
        /// Length of the rendered file in seconds.
        #[arg(short, long, default_value_t = 2.0)]
        seconds: f32,
    },
    /// Loads every voice and prints the full state as JSON.
    State {
        /// The path to the sampler config.
        config_path: PathBuf,
    },
    /// Lists the available MIDI input devices.
    MidiDevices {},
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Play { config_path } => {
            let config = EngineConfig::load(&config_path)?;
            let engine = build_engine(&config)?;
            restore(&engine, &config)?;
            wait_for_loads(&engine).await;

            let (notes_tx, notes_rx) = crossbeam_channel::bounded(NOTE_QUEUE_CAPACITY);
            let _midi_input = match config.midi_device() {
                Some(name) => Some(midi::connect_input(name, notes_tx)?),
                None => {
                    warn!("No MIDI device configured, voices can't be triggered.");
                    None
                }
            };
            let output = audio::start_output(engine.clone(), notes_rx)?;
            info!(
                device = output.device_name(),
                channels = output.channels(),
                voices = engine.voice_count(),
                "Playing. Press ctrl-c to stop."
            );

            tokio::signal::ctrl_c().await?;
            drop(output);

            if let Some(state_file) = config.state_file() {
                engine.export_state().save(&state_file)?;
            }
        }
        Commands::Render {
            config_path,
            output_path,
            notes,
            seconds,
        } => {
            let config = EngineConfig::load(&config_path)?;
            let notes = util::parse_note_list(&notes)?;
            let engine = build_engine(&config)?;
            restore(&engine, &config)?;
            wait_for_loads(&engine).await;

            render(&engine, &config, &notes, seconds, &output_path)?;
        }
        Commands::State { config_path } => {
            let config = EngineConfig::load(&config_path)?;
            let engine = build_engine(&config)?;
            restore(&engine, &config)?;
            wait_for_loads(&engine).await;

            println!("{}", serde_json::to_string_pretty(&engine.to_state())?);
        }
        Commands::MidiDevices {} => {
            let devices = midi::list_input_devices()?;
            if devices.is_empty() {
                println!("No MIDI input devices found.");
                return Ok(());
            }

            println!("MIDI input devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
    }

    Ok(())
}

fn build_engine(config: &EngineConfig) -> Result<SamplerEngine, Box<dyn Error>> {
    Ok(SamplerEngine::new(
        Arc::new(SymphoniaDecoder::new()),
        config.engine_options(),
    )?)
}

/// Restores saved state if the config names a state file that exists,
/// otherwise creates the configured voices. Loads are started, not awaited.
fn restore(engine: &SamplerEngine, config: &EngineConfig) -> Result<(), Box<dyn Error>> {
    if let Some(state_file) = config.state_file().filter(|path| path.exists()) {
        match PersistedState::load(&state_file) {
            Ok(state) => {
                engine.import_state(&state);
                return Ok(());
            }
            Err(e) => warn!(
                path = ?state_file,
                error = %e,
                "Unable to restore saved state, using configured voices"
            ),
        }
    }

    for voice in config.voices() {
        let id = engine.add_voice()?;
        let (low, high) = voice.midi_range();
        engine.set_midi_range(id, low, high);
        engine.set_gain(id, voice.gain());
        if let Some(file) = voice.file() {
            engine.load_sample_async(id, config.resolve(file), move |result| {
                if let Err(e) = result {
                    warn!(id, error = %e, "Configured sample failed to load");
                }
            });
        }
    }
    Ok(())
}

/// Waits until no voice is still loading.
async fn wait_for_loads(engine: &SamplerEngine) {
    let mut interval = tokio::time::interval(Duration::from_millis(10));
    loop {
        interval.tick().await;
        let state = engine.to_state();
        if state.players.iter().all(|p| p.status != Status::Loading) {
            let loaded = state
                .players
                .iter()
                .filter(|p| p.status == Status::Loaded)
                .count();
            info!(voices = state.players.len(), loaded, "Samples ready");
            return;
        }
    }
}

/// Renders `seconds` of audio with every note in `notes` triggered at the start.
fn render(
    engine: &SamplerEngine,
    config: &EngineConfig,
    notes: &[u8],
    seconds: f32,
    output_path: &Path,
) -> Result<(), Box<dyn Error>> {
    let sample_rate = config.sample_rate();
    let block_size = config.block_size();
    let total_frames = (seconds.max(0.0) * sample_rate as f32) as usize;
    let batch: Vec<NoteOn> = notes.iter().map(|note| NoteOn::new(*note)).collect();

    let mut writer = WavWriter::create(
        output_path,
        WavSpec {
            channels: RENDER_CHANNELS as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let mut block = vec![0.0f32; block_size * RENDER_CHANNELS];
    let mut rendered = 0;
    while rendered < total_frames {
        let frames = block_size.min(total_frames - rendered);
        let output = &mut block[..frames * RENDER_CHANNELS];
        output.fill(0.0);

        let pending: &[NoteOn] = if rendered == 0 { &batch } else { &[] };
        engine.process_block(output, RENDER_CHANNELS, pending);
        for sample in output.iter() {
            writer.write_sample(*sample)?;
        }
        rendered += frames;
    }
    writer.finalize()?;

    info!(
        path = ?output_path,
        frames = total_frames,
        sample_rate,
        notes = ?notes,
        "Rendered"
    );
    Ok(())
}
