//! Model, generation, and notation parameters.
//!
//! `ModelConfig` describes the exported token model, `GenerationConfig`
//! drives the decode loop, and `NotationConfig` fixes the tick grid used to
//! rebuild a score from tokens.

use serde::{Deserialize, Serialize};

use crate::models::DEFAULT_TOP_P;

/// Default context window of the token model.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Largest bar length in beats; a MIDI time signature stores it in one byte.
pub const MAX_BEATS_PER_BAR: u32 = 255;

/// Configuration of the exported token model.
///
/// Read from the optional `config.json` next to `model.onnx`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Maximum context length; older ids slide out of the window.
    #[serde(default = "default_block_size")]
    pub block_size: usize,

    /// Model identifier used in asset ids.
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_version() -> String {
    "notegen-v1".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            block_size: default_block_size(),
            version: default_version(),
        }
    }
}

impl ModelConfig {
    /// Validates the configuration for consistency.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.block_size == 0 {
            return Some("block_size must be > 0".to_string());
        }
        if self.version.is_empty() {
            return Some("version must not be empty".to_string());
        }
        None
    }
}

/// Parameters of one decode run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Softmax temperature; floored at a small epsilon.
    pub temperature: f32,

    /// Nucleus probability mass in (0, 1].
    pub top_p: f32,

    /// Hard cap on sampling steps.
    pub max_steps: usize,

    /// Wall-clock cap as a multiple of the target duration.
    pub time_limit_factor: f32,

    /// Beats in one bar, used to derive the bar target.
    pub beats_per_bar: u32,

    /// Keep EOS suppressed in the final bar until a note has been emitted.
    pub fill_last_bar: bool,

    /// With `fill_last_bar`, also keep the bar delimiter suppressed in the
    /// final bar until a note has been emitted.
    pub forbid_empty_final_bar: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_p: DEFAULT_TOP_P,
            max_steps: 1024,
            time_limit_factor: 2.0,
            beats_per_bar: 4,
            fill_last_bar: false,
            forbid_empty_final_bar: false,
        }
    }
}

impl GenerationConfig {
    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Some(format!("temperature must be > 0, got {}", self.temperature));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Some(format!("top_p must be in (0, 1], got {}", self.top_p));
        }
        if self.max_steps == 0 {
            return Some("max_steps must be > 0".to_string());
        }
        if !(self.time_limit_factor.is_finite() && self.time_limit_factor > 0.0) {
            return Some(format!(
                "time_limit_factor must be > 0, got {}",
                self.time_limit_factor
            ));
        }
        if !(1..=MAX_BEATS_PER_BAR).contains(&self.beats_per_bar) {
            return Some(format!(
                "beats_per_bar must be between 1 and {}, got {}",
                MAX_BEATS_PER_BAR, self.beats_per_bar
            ));
        }
        None
    }

    /// Number of bars a decode for `target_seconds` at `bpm` aims for.
    ///
    /// Never fewer than four.
    pub fn target_bars(&self, target_seconds: f32, bpm: u32) -> usize {
        let bars = (target_seconds as f64 * bpm as f64 / (60.0 * self.beats_per_bar as f64)).ceil();
        if bars.is_finite() && bars > 4.0 {
            bars as usize
        } else {
            4
        }
    }
}

/// Tick grid used by the notation builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotationConfig {
    /// Pulses per quarter note.
    pub ticks_per_beat: u32,

    /// Grid units per beat (4 = sixteenth notes).
    pub grid_per_beat: u32,

    /// Beats in one bar.
    pub beats_per_bar: u32,

    /// Number of velocity buckets the vocabulary uses.
    pub velocity_bins: u32,
}

impl Default for NotationConfig {
    fn default() -> Self {
        Self {
            ticks_per_beat: 480,
            grid_per_beat: 4,
            beats_per_bar: 4,
            velocity_bins: 8,
        }
    }
}

impl NotationConfig {
    /// Ticks in one bar. Saturates for grids that fail validation.
    pub fn ticks_per_bar(&self) -> u32 {
        self.ticks_per_beat.saturating_mul(self.beats_per_bar)
    }

    /// Ticks in one grid unit.
    pub fn ticks_per_grid(&self) -> u32 {
        self.ticks_per_beat / self.grid_per_beat
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.grid_per_beat == 0 || self.ticks_per_beat < self.grid_per_beat {
            return Some(format!(
                "ticks_per_beat ({}) must be at least grid_per_beat ({}) and grid_per_beat > 0",
                self.ticks_per_beat, self.grid_per_beat
            ));
        }
        if self.ticks_per_beat > u16::MAX as u32 >> 1 {
            return Some(format!("ticks_per_beat too high: {}", self.ticks_per_beat));
        }
        if !(1..=MAX_BEATS_PER_BAR).contains(&self.beats_per_bar) {
            return Some(format!(
                "beats_per_bar must be between 1 and {}, got {}",
                MAX_BEATS_PER_BAR, self.beats_per_bar
            ));
        }
        if self.velocity_bins == 0 || self.velocity_bins > 127 {
            return Some(format!(
                "velocity_bins must be between 1 and 127, got {}",
                self.velocity_bins
            ));
        }
        None
    }
}
