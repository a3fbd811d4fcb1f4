//! WAV file handling for rendered audio.
//!
//! Probes rendered files and writes sample buffers using the hound crate.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::{DaemonError, Result};

/// Default render sample rate (32kHz).
pub const SAMPLE_RATE: u32 = 32000;

/// Number of audio channels written by [`write_wav`] (stereo).
pub const CHANNELS: u16 = 2;

/// Format details of a WAV file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WavInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Samples per channel.
    pub frames: u32,
    pub duration_sec: f32,
}

/// Reads the header of a rendered WAV file.
///
/// An unreadable or malformed file means the renderer did not produce
/// usable output, so it is reported as RENDERING_FAILED.
pub fn probe_wav(path: &Path) -> Result<WavInfo> {
    let reader = WavReader::open(path).map_err(|e| {
        DaemonError::rendering_failed(format!("Unreadable WAV {}: {}", path.display(), e))
    })?;

    let spec = reader.spec();
    if spec.sample_rate == 0 || spec.channels == 0 {
        return Err(DaemonError::rendering_failed(format!(
            "Invalid WAV header in {}",
            path.display()
        )));
    }

    let frames = reader.duration();
    Ok(WavInfo {
        sample_rate: spec.sample_rate,
        channels: spec.channels,
        frames,
        duration_sec: samples_to_duration(frames as usize, spec.sample_rate),
    })
}

/// Writes mono samples to a stereo float WAV file.
pub fn write_wav(samples: &[f32], path: &Path, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: CHANNELS,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec).map_err(|e| {
        DaemonError::rendering_failed(format!("Failed to create WAV file: {}", e))
    })?;

    for sample in samples {
        // Same sample on left and right
        for _ in 0..CHANNELS {
            writer.write_sample(*sample).map_err(|e| {
                DaemonError::rendering_failed(format!("Failed to write sample: {}", e))
            })?;
        }
    }

    writer.finalize().map_err(|e| {
        DaemonError::rendering_failed(format!("Failed to finalize WAV file: {}", e))
    })?;

    Ok(())
}

/// Calculates the duration of audio in seconds from sample count.
pub fn samples_to_duration(sample_count: usize, sample_rate: u32) -> f32 {
    if sample_rate == 0 {
        return 0.0;
    }
    sample_count as f32 / sample_rate as f32
}
