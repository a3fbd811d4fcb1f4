//! Audio output module.
//!
//! Writes scores as MIDI, renders them to WAV through an external
//! synthesizer, and probes the rendered files.

pub mod midi;
pub mod render;
pub mod wav;

// Re-export commonly used items
pub use midi::{score_to_bytes, score_to_smf, write_midi};
pub use render::{FluidSynthRenderer, Renderer};
pub use wav::{probe_wav, samples_to_duration, write_wav, WavInfo, CHANNELS, SAMPLE_RATE};
