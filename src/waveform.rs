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

//! Waveform summaries rendered as SVG.
//!
//! A loaded sample is reduced to a fixed number of min/max pairs and drawn as a
//! filled outline. Voices without audio show a placeholder instead.

use std::sync::Arc;

use serde::Deserialize;

use crate::samples::SampleBuffer;

/// Default number of min/max pairs in an envelope.
pub const DEFAULT_PLOT_POINTS: usize = 256;

/// Default SVG width.
pub const DEFAULT_WIDTH: f32 = 400.0;

/// Default SVG height.
pub const DEFAULT_HEIGHT: f32 = 100.0;

/// Vertical padding inside the outline.
const PADDING: f32 = 8.0;

/// Sizing for rendered waveforms.
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct WaveformOptions {
    /// Number of min/max pairs to plot.
    #[serde(default = "default_points")]
    pub points: usize,
    /// SVG width.
    #[serde(default = "default_width")]
    pub width: f32,
    /// SVG height.
    #[serde(default = "default_height")]
    pub height: f32,
}

fn default_points() -> usize {
    DEFAULT_PLOT_POINTS
}

fn default_width() -> f32 {
    DEFAULT_WIDTH
}

fn default_height() -> f32 {
    DEFAULT_HEIGHT
}

impl Default for WaveformOptions {
    fn default() -> Self {
        Self {
            points: DEFAULT_PLOT_POINTS,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Waveform options plus the pre-rendered placeholder, shared by every voice
/// in a pool so that resetting a voice never renders anything.
#[derive(Debug)]
pub struct WaveformStyle {
    options: WaveformOptions,
    blank: Arc<str>,
}

impl WaveformStyle {
    pub fn new(options: WaveformOptions) -> Self {
        let blank = render_blank_svg(options.width, options.height).into();
        Self { options, blank }
    }

    pub fn options(&self) -> &WaveformOptions {
        &self.options
    }

    /// The "no sample loaded" placeholder.
    pub fn blank(&self) -> Arc<str> {
        Arc::clone(&self.blank)
    }

    /// Renders the given buffer, falling back to the placeholder when there is nothing to draw.
    pub fn render(&self, buffer: &SampleBuffer) -> Arc<str> {
        if buffer.is_empty() || buffer.channel_count() == 0 || self.options.points <= 1 {
            return self.blank();
        }
        render_svg(buffer, &self.options).into()
    }
}

impl Default for WaveformStyle {
    fn default() -> Self {
        Self::new(WaveformOptions::default())
    }
}

/// Reduces a buffer to at most `points` (min, max) pairs across all channels.
pub fn envelope(buffer: &SampleBuffer, points: usize) -> Vec<(f32, f32)> {
    let total = buffer.len();
    if total == 0 || points == 0 {
        return Vec::new();
    }

    let count = points.min(total);
    let mut pairs = Vec::with_capacity(count);
    for point in 0..count {
        let start = point * total / count;
        let end = (point + 1) * total / count;

        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for channel in 0..buffer.channel_count() {
            if let Some(data) = buffer.channel(channel) {
                for &sample in &data[start..end] {
                    min = min.min(sample);
                    max = max.max(sample);
                }
            }
        }

        if min == f32::MAX {
            min = 0.0;
        }
        if max == f32::MIN {
            max = 0.0;
        }
        pairs.push((min, max));
    }
    pairs
}

#[inline]
fn to_y(sample: f32, mid_y: f32, half_height: f32) -> f32 {
    mid_y - sample.clamp(-1.0, 1.0) * half_height
}

/// Renders the buffer as a closed min/max outline.
pub fn render_svg(buffer: &SampleBuffer, options: &WaveformOptions) -> String {
    let pairs = envelope(buffer, options.points);
    if pairs.is_empty() || options.points <= 1 {
        return render_blank_svg(options.width, options.height);
    }

    let width = options.width.max(1.0);
    let height = options.height.max(1.0);
    let half_height = (height - PADDING * 2.0).max(1.0) / 2.0;
    let mid_y = height / 2.0;
    let x_step = if pairs.len() > 1 {
        width / (pairs.len() - 1) as f32
    } else {
        width
    };

    let mut path = String::with_capacity(pairs.len() * 40);
    path.push_str(&format!("M 0 {:.3}", to_y(pairs[0].1, mid_y, half_height)));
    for (i, (_, max)) in pairs.iter().enumerate().skip(1) {
        path.push_str(&format!(
            " L {:.3} {:.3}",
            x_step * i as f32,
            to_y(*max, mid_y, half_height)
        ));
    }
    for (i, (min, _)) in pairs.iter().enumerate().rev() {
        path.push_str(&format!(
            " L {:.3} {:.3}",
            x_step * i as f32,
            to_y(*min, mid_y, half_height)
        ));
    }
    path.push_str(" Z");

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.2}\" height=\"{h:.2}\" \
         viewBox=\"0 0 {w:.2} {h:.2}\" preserveAspectRatio=\"none\">\
         <path d=\"{path}\" fill=\"#c3c8d1\" stroke=\"#39404d\" stroke-width=\"1.6\" \
         stroke-linejoin=\"round\" />\
         <line x1=\"0\" y1=\"{y:.2}\" x2=\"{w:.2}\" y2=\"{y:.2}\" stroke=\"#9aa1ad\" \
         stroke-width=\"1.1\" opacity=\"0.6\" />\
         </svg>",
        w = width,
        h = height,
        y = mid_y,
        path = path
    )
}

/// Renders the placeholder shown for voices without audio.
pub fn render_blank_svg(width: f32, height: f32) -> String {
    let width = width.max(1.0);
    let height = height.max(1.0);
    let mid_y = height / 2.0;

    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w:.2}\" height=\"{h:.2}\" \
         viewBox=\"0 0 {w:.2} {h:.2}\">\
         <rect x=\"0\" y=\"0\" width=\"{w:.2}\" height=\"{h:.2}\" rx=\"10\" ry=\"10\" \
         fill=\"#e5e7ec\" />\
         <line x1=\"0\" y1=\"{y:.2}\" x2=\"{w:.2}\" y2=\"{y:.2}\" stroke=\"#b7bdc6\" \
         stroke-width=\"2\" stroke-dasharray=\"6 6\" />\
         <text x=\"{tx:.2}\" y=\"{ty:.2}\" text-anchor=\"middle\" fill=\"#8f95a1\" \
         font-family=\"Segoe UI, Helvetica, Arial\" font-size=\"13\">No sample</text>\
         </svg>",
        w = width,
        h = height,
        y = mid_y,
        tx = width / 2.0,
        ty = mid_y - 10.0
    )
}
