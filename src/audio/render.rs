//! Rendering of MIDI scores to audio.
//!
//! The daemon does not synthesize audio itself. A [`Renderer`] turns a MIDI
//! file into a WAV file, normally by running FluidSynth with an SF2
//! instrument bank as a blocking subprocess.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::error::{DaemonError, Result};

use super::wav::SAMPLE_RATE;

/// Converts a MIDI file into a WAV file.
pub trait Renderer: Send + Sync {
    /// Renders `midi_path` into `wav_path`, creating parent directories.
    fn render(&self, midi_path: &Path, wav_path: &Path) -> Result<()>;

    /// Sample rate of the produced audio in Hz.
    fn sample_rate(&self) -> u32;
}

/// Renders with the FluidSynth command line synthesizer.
///
/// Runs `fluidsynth -ni -F <wav> -r <rate> <sf2> <midi>`.
#[derive(Debug, Clone)]
pub struct FluidSynthRenderer {
    /// Executable name (looked up on `PATH`) or path.
    executable: String,
    /// SF2 instrument bank.
    soundfont: Option<PathBuf>,
    sample_rate: u32,
}

impl FluidSynthRenderer {
    pub fn new(executable: impl Into<String>, soundfont: Option<PathBuf>, sample_rate: u32) -> Self {
        Self {
            executable: executable.into(),
            soundfont,
            sample_rate,
        }
    }

    /// Resolves the configured executable to a path.
    pub fn resolve_executable(&self) -> Result<PathBuf> {
        let candidate = Path::new(&self.executable);
        if candidate.components().count() > 1 || candidate.is_absolute() {
            if candidate.exists() {
                return Ok(candidate.to_path_buf());
            }
            return Err(DaemonError::rendering_failed(format!(
                "Renderer executable not found at: {}",
                candidate.display()
            )));
        }

        which::which(&self.executable).map_err(|e| {
            DaemonError::rendering_failed(format!(
                "Renderer executable '{}' not found on PATH: {}",
                self.executable, e
            ))
        })
    }

    fn soundfont(&self) -> Result<&Path> {
        let Some(soundfont) = self.soundfont.as_deref() else {
            return Err(DaemonError::rendering_failed(
                "No instrument bank configured (set NOTEGEN_SOUNDFONT)",
            ));
        };
        if !soundfont.is_file() {
            return Err(DaemonError::rendering_failed(format!(
                "Instrument bank not found at: {}",
                soundfont.display()
            )));
        }
        Ok(soundfont)
    }
}

impl Default for FluidSynthRenderer {
    fn default() -> Self {
        Self::new("fluidsynth", None, SAMPLE_RATE)
    }
}

impl Renderer for FluidSynthRenderer {
    fn render(&self, midi_path: &Path, wav_path: &Path) -> Result<()> {
        let executable = self.resolve_executable()?;
        let soundfont = self.soundfont()?;

        if let Some(parent) = wav_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DaemonError::rendering_failed(format!(
                    "Failed to create output directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        tracing::debug!(
            executable = %executable.display(),
            midi = %midi_path.display(),
            wav = %wav_path.display(),
            "rendering"
        );

        let output = Command::new(&executable)
            .arg("-ni")
            .arg("-F")
            .arg(wav_path)
            .arg("-r")
            .arg(self.sample_rate.to_string())
            .arg(soundfont)
            .arg(midi_path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                DaemonError::with_source(
                    crate::error::ErrorCode::RenderingFailed,
                    format!("Failed to start {}", executable.display()),
                    e,
                )
            })?;

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DaemonError::rendering_failed(format!(
                "{} exited with status {}: {}",
                executable.display(),
                exit_code,
                stderr.trim()
            )));
        }

        if !wav_path.is_file() {
            return Err(DaemonError::rendering_failed(format!(
                "{} produced no output at {}",
                executable.display(),
                wav_path.display()
            )));
        }

        Ok(())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn scratch() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let midi = dir.path().join("in.mid");
        let wav = dir.path().join("out").join("out.wav");
        std::fs::write(&midi, b"MThd").unwrap();
        (dir, midi, wav)
    }

    #[test]
    fn missing_executable_is_rendering_failure() {
        let (_dir, midi, wav) = scratch();
        let renderer = FluidSynthRenderer::new("notegen-no-such-synth", None, 32000);
        let err = renderer.render(&midi, &wav).unwrap_err();
        assert_eq!(err.code, ErrorCode::RenderingFailed);
        assert!(err.message.contains("notegen-no-such-synth"));
    }

    #[test]
    fn missing_executable_path_is_rendering_failure() {
        let renderer = FluidSynthRenderer::new("/nonexistent/bin/fluidsynth", None, 32000);
        let err = renderer.resolve_executable().unwrap_err();
        assert_eq!(err.code, ErrorCode::RenderingFailed);
    }

    #[test]
    fn missing_soundfont_is_rendering_failure() {
        let (dir, midi, wav) = scratch();
        let exe = std::env::current_exe().unwrap();
        let renderer = FluidSynthRenderer::new(
            exe.to_string_lossy(),
            Some(dir.path().join("missing.sf2")),
            32000,
        );
        let err = renderer.render(&midi, &wav).unwrap_err();
        assert_eq!(err.code, ErrorCode::RenderingFailed);
        assert!(err.message.contains("Instrument bank"));
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_rendering_failure() {
        let (dir, midi, wav) = scratch();
        let sf2 = dir.path().join("bank.sf2");
        std::fs::write(&sf2, b"sfbk").unwrap();
        let renderer = FluidSynthRenderer::new("false", Some(sf2), 32000);
        let err = renderer.render(&midi, &wav).unwrap_err();
        assert_eq!(err.code, ErrorCode::RenderingFailed);
        assert!(err.message.contains("exited with status"));
    }

    #[cfg(unix)]
    #[test]
    fn success_without_output_is_rendering_failure() {
        let (dir, midi, wav) = scratch();
        let sf2 = dir.path().join("bank.sf2");
        std::fs::write(&sf2, b"sfbk").unwrap();
        let renderer = FluidSynthRenderer::new("true", Some(sf2), 32000);
        let err = renderer.render(&midi, &wav).unwrap_err();
        assert!(err.message.contains("produced no output"));
    }
}
