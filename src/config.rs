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
use std::path::{Path, PathBuf};

use config::{Config, File};
use serde::Deserialize;
use tracing::info;

use crate::samples::{default_load_threads, EngineOptions, DEFAULT_VU_WINDOW};
use crate::waveform::WaveformOptions;

mod error;
mod voice;

pub use error::ConfigError;
pub use voice::VoiceConfig;

/// Default output sample rate for offline rendering.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Default frames per block for offline rendering.
pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// The top-level sampler configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct EngineConfig {
    /// Sample rate used when rendering offline.
    #[serde(default = "default_sample_rate")]
    sample_rate: u32,

    /// Frames per block when rendering offline.
    #[serde(default = "default_block_size")]
    block_size: usize,

    /// Number of decode worker threads.
    #[serde(default = "default_load_threads")]
    load_threads: usize,

    /// VU ring length per voice.
    #[serde(default = "default_vu_window")]
    vu_window: usize,

    /// Waveform summary sizing.
    #[serde(default)]
    waveform: WaveformOptions,

    /// MIDI input to listen to. Matched by substring.
    midi_device: Option<String>,

    /// Where voice configuration is saved on exit and restored on start.
    state_file: Option<String>,

    /// Voices created when there is no saved state.
    #[serde(default)]
    voices: Vec<VoiceConfig>,

    /// Directory relative paths resolve against.
    #[serde(skip)]
    base_path: PathBuf,
}

fn default_sample_rate() -> u32 {
    DEFAULT_SAMPLE_RATE
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_vu_window() -> usize {
    DEFAULT_VU_WINDOW
}

impl EngineConfig {
    /// Loads the configuration from a YAML file.
    pub fn load(path: &Path) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        config.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        info!(
            path = ?path,
            voices = config.voices.len(),
            load_threads = config.load_threads,
            "Loaded sampler config"
        );
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::Invalid {
                field: "sample_rate",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.waveform.points == 0 {
            return Err(ConfigError::Invalid {
                field: "waveform.points",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Gets the offline sample rate.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Gets the offline block size, at least one frame.
    pub fn block_size(&self) -> usize {
        self.block_size.max(1)
    }

    /// Gets the MIDI input device name.
    pub fn midi_device(&self) -> Option<&str> {
        self.midi_device.as_deref()
    }

    /// Gets the resolved state file path.
    pub fn state_file(&self) -> Option<PathBuf> {
        self.state_file.as_deref().map(|file| self.resolve(file))
    }

    /// Gets the configured voices.
    pub fn voices(&self) -> &[VoiceConfig] {
        &self.voices
    }

    /// Resolves a path against the config file's directory.
    pub fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Options for constructing the engine.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            load_threads: self.load_threads.max(1),
            waveform: self.waveform.clone(),
            vu_window: self.vu_window.max(1),
        }
    }
}
