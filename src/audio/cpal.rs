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

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::Receiver;
use tracing::{error, info, span, Level};

use super::thread_priority::{
    callback_thread_priority, configure_audio_thread_priority, rt_audio_enabled,
};
use super::BlockRenderer;
use crate::midi::NoteOn;
use crate::samples::SamplerEngine;

/// A running output stream. Audio stops when this is dropped.
pub struct OutputHost {
    _stream: cpal::Stream,
    device_name: String,
    channels: usize,
}

impl OutputHost {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl fmt::Debug for OutputHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OutputHost")
            .field("device", &self.device_name)
            .field("channels", &self.channels)
            .finish()
    }
}

/// f32 callback: render straight into the CPAL buffer.
fn create_f32_callback(
    mut renderer: BlockRenderer,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) + Send + 'static {
    let priority = callback_thread_priority();
    let rt_audio = rt_audio_enabled();
    let mut priority_set = false;

    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
        configure_audio_thread_priority(priority, rt_audio, &mut priority_set);
        renderer.render(data);
    }
}

/// Opens the default output device and starts rendering `engine` into it.
/// Note-ons received on `notes` are applied at the start of the next block.
pub fn start_output(
    engine: SamplerEngine,
    notes: Receiver<NoteOn>,
) -> Result<OutputHost, Box<dyn Error>> {
    let span = span!(Level::INFO, "start output (cpal)");
    let _enter = span.enter();

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or("no default output device")?;
    let device_name = device.name().unwrap_or_else(|_| "unknown".to_string());
    let config = device.default_output_config()?;

    if config.sample_format() != cpal::SampleFormat::F32 {
        return Err(format!(
            "unsupported sample format {:?} on {} (only f32 is supported)",
            config.sample_format(),
            device_name
        )
        .into());
    }

    let channels = config.channels() as usize;
    let stream_config: cpal::StreamConfig = config.config();
    let renderer = BlockRenderer::new(engine, notes, channels);
    let callback = create_f32_callback(renderer);

    let stream = device.build_output_stream(
        &stream_config,
        callback,
        |err| error!("CPAL output stream error: {}", err),
        None,
    )?;
    stream.play()?;

    info!(
        device = device_name,
        channels,
        sample_rate = ?config.sample_rate(),
        "CPAL output stream started"
    );

    Ok(OutputHost {
        _stream: stream,
        device_name,
        channels,
    })
}
