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

//! Rolling VU level follower.
//!
//! Magnitudes are folded into a fixed-length ring. At the end of every block the
//! ring average is converted to decibels and smoothed with a one-step peak hold:
//! rises are reported immediately, falls are averaged with the previous value.

/// Default number of magnitudes kept in the ring.
pub const DEFAULT_VU_WINDOW: usize = 1024;

/// Lowest level ever reported.
pub const VU_FLOOR_DB: f32 = -60.0;

/// Highest level ever reported.
pub const VU_CEILING_DB: f32 = 6.0;

/// Clamp applied to the raw decibel value before the reported clamp.
const VU_INTERNAL_FLOOR_DB: f32 = -80.0;

/// Keeps log10 finite for silence.
const VU_EPSILON: f32 = 1.0e-6;

/// A VU envelope follower. Allocates only in `new`.
#[derive(Debug, Clone)]
pub struct VuMeter {
    /// Circular magnitude history.
    history: Box<[f32]>,
    /// Next slot to overwrite.
    write_index: usize,
    /// Sum of every value in `history`.
    running_sum: f32,
    /// Frames expected in the current block.
    expected: usize,
    /// Frames actually metered in the current block.
    metered: usize,
    /// Last reported level.
    level_db: f32,
}

impl VuMeter {
    /// Creates a meter with the given ring length (at least one slot).
    pub fn new(window: usize) -> Self {
        Self {
            history: vec![0.0; window.max(1)].into_boxed_slice(),
            write_index: 0,
            running_sum: 0.0,
            expected: 0,
            metered: 0,
            level_db: VU_FLOOR_DB,
        }
    }

    /// Clears the history and drops the level back to the floor.
    pub fn reset(&mut self) {
        self.history.fill(0.0);
        self.write_index = 0;
        self.running_sum = 0.0;
        self.expected = 0;
        self.metered = 0;
        self.level_db = VU_FLOOR_DB;
    }

    /// Folds one magnitude into the ring.
    #[inline]
    pub fn push(&mut self, magnitude: f32) {
        self.fold(magnitude);
        self.metered += 1;
    }

    #[inline]
    fn fold(&mut self, magnitude: f32) {
        let slot = &mut self.history[self.write_index];
        self.running_sum += magnitude - *slot;
        *slot = magnitude;

        self.write_index += 1;
        if self.write_index == self.history.len() {
            self.write_index = 0;
            // Resync once per lap so rounding error can't build up.
            self.running_sum = self.history.iter().sum();
        }
    }

    /// Starts a block of `frames` frames.
    pub fn begin_block(&mut self, frames: usize) {
        self.expected = frames;
        self.metered = 0;
    }

    /// Finishes the block and returns the new reported level in dB.
    /// Frames that were not metered count as silence.
    pub fn end_block(&mut self) -> f32 {
        let silent = self
            .expected
            .saturating_sub(self.metered)
            .min(self.history.len());
        for _ in 0..silent {
            self.fold(0.0);
        }
        self.expected = 0;
        self.metered = 0;

        let average = self.running_sum.max(0.0) / self.history.len() as f32;
        let db = (20.0 * (average + VU_EPSILON).log10())
            .clamp(VU_INTERNAL_FLOOR_DB, VU_CEILING_DB)
            .clamp(VU_FLOOR_DB, VU_CEILING_DB);

        self.level_db = if db < self.level_db {
            (db + self.level_db) * 0.5
        } else {
            db
        };
        self.level_db
    }

    /// The last reported level in dB.
    pub fn level_db(&self) -> f32 {
        self.level_db
    }

    /// The ring length.
    pub fn window(&self) -> usize {
        self.history.len()
    }
}

impl Default for VuMeter {
    fn default() -> Self {
        Self::new(DEFAULT_VU_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_block(meter: &mut VuMeter, frames: usize, magnitude: f32) -> f32 {
        meter.begin_block(frames);
        for _ in 0..frames {
            meter.push(magnitude);
        }
        meter.end_block()
    }

    #[test]
    fn test_starts_at_floor() {
        let meter = VuMeter::new(64);
        assert_eq!(meter.level_db(), VU_FLOOR_DB);
    }

    #[test]
    fn test_full_scale_rises_immediately() {
        let mut meter = VuMeter::new(64);
        let level = run_block(&mut meter, 64, 1.0);
        assert!(level.abs() < 0.01, "expected ~0 dB, got {}", level);
    }

    #[test]
    fn test_ceiling() {
        let mut meter = VuMeter::new(64);
        let level = run_block(&mut meter, 64, 4.0);
        assert_eq!(level, VU_CEILING_DB);
    }

    #[test]
    fn test_silence_converges_to_floor() {
        let mut meter = VuMeter::new(64);
        run_block(&mut meter, 64, 1.0);

        let mut previous = meter.level_db();
        for _ in 0..200 {
            let level = run_block(&mut meter, 64, 0.0);
            assert!(level >= VU_FLOOR_DB);
            assert!(level <= previous);
            previous = level;
        }
        assert!((previous - VU_FLOOR_DB).abs() < 0.01);
    }

    #[test]
    fn test_fall_is_averaged() {
        let mut meter = VuMeter::new(16);
        assert!(run_block(&mut meter, 16, 1.0).abs() < 0.01);

        // The raw level after a full silent block is the floor, so the reported
        // value is halfway between 0 dB and the floor.
        let level = run_block(&mut meter, 16, 0.0);
        assert!((level - VU_FLOOR_DB / 2.0).abs() < 0.01, "got {}", level);
    }

    #[test]
    fn test_unmetered_frames_count_as_silence() {
        let mut meter = VuMeter::new(16);
        run_block(&mut meter, 16, 1.0);

        meter.begin_block(16);
        let level = meter.end_block();
        assert!((level - VU_FLOOR_DB / 2.0).abs() < 0.01, "got {}", level);
    }

    #[test]
    fn test_reset() {
        let mut meter = VuMeter::new(8);
        run_block(&mut meter, 8, 1.0);
        meter.reset();
        assert_eq!(meter.level_db(), VU_FLOOR_DB);

        // History is empty again, so a silent block stays on the floor.
        assert_eq!(run_block(&mut meter, 8, 0.0), VU_FLOOR_DB);
    }
}
