//! CLI argument parser for standalone mode.
//!
//! Runs a single decode and notation pass without the daemon machinery,
//! writing MIDI and, unless disabled, a rendered WAV.

use std::path::PathBuf;

use clap::Parser;

use crate::config::DaemonConfig;
use crate::types::token::seed_or_default;

/// notegen-daemon: bar-aware symbolic music generation
#[derive(Parser, Debug, Default)]
#[command(name = "notegen-daemon")]
#[command(about = "Symbolic music generation daemon: token decoding, score reconstruction, rendering")]
#[command(version)]
pub struct Cli {
    /// Seed control tokens, space separated (e.g. "BPM_120 BAR")
    #[arg(short = 't', long)]
    pub seed_tokens: Option<String>,

    /// Musical duration to generate in seconds (0-300]
    #[arg(short, long, default_value = "30")]
    pub duration: f32,

    /// Output WAV file path
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output MIDI file path (defaults to the WAV path with a .mid extension)
    #[arg(long)]
    pub midi: Option<PathBuf>,

    /// Write MIDI only, skipping the renderer
    #[arg(long)]
    pub no_render: bool,

    /// Path to directory containing model.onnx and tokenizer.json
    #[arg(short, long)]
    pub model_dir: Option<PathBuf>,

    /// Instrument bank (.sf2) for the renderer
    #[arg(long)]
    pub soundfont: Option<PathBuf>,

    /// Random seed for reproducible generation
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Sampling temperature
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Nucleus sampling mass in (0, 1]
    #[arg(long)]
    pub top_p: Option<f32>,

    /// Hard cap on sampling steps
    #[arg(long)]
    pub max_steps: Option<usize>,

    /// Keep generating until the final bar holds at least one note
    #[arg(long)]
    pub fill_last_bar: bool,

    /// With --fill-last-bar, also refuse to close an empty final bar
    #[arg(long)]
    pub forbid_empty_final_bar: bool,

    /// Run in daemon mode (JSON-RPC over stdio)
    #[arg(long)]
    pub daemon: bool,
}

impl Cli {
    /// Parses command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Returns true if running in CLI mode (not daemon mode).
    pub fn is_cli_mode(&self) -> bool {
        !self.daemon && (self.seed_tokens.is_some() || self.output.is_some() || self.midi.is_some())
    }

    /// Returns true if running in daemon mode.
    pub fn is_daemon_mode(&self) -> bool {
        self.daemon
    }

    /// Seed tokens to decode from, or the default seed when none are given.
    pub fn seed_token_list(&self) -> Vec<String> {
        let tokens = self
            .seed_tokens
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();
        seed_or_default(tokens)
    }

    /// Returns the effective output path.
    ///
    /// Defaults to "output.wav" in the current directory if not specified.
    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| PathBuf::from("output.wav"))
    }

    /// Returns the effective MIDI path.
    pub fn midi_path(&self) -> PathBuf {
        self.midi
            .clone()
            .unwrap_or_else(|| self.output_path().with_extension("mid"))
    }

    /// Overrides configuration values with the flags that were given.
    pub fn apply(&self, config: &mut DaemonConfig) {
        if let Some(ref dir) = self.model_dir {
            config.model_path = Some(dir.clone());
        }
        if let Some(ref soundfont) = self.soundfont {
            config.soundfont = Some(soundfont.clone());
        }
        if let Some(temperature) = self.temperature {
            config.generation.temperature = temperature;
        }
        if let Some(top_p) = self.top_p {
            config.generation.top_p = top_p;
        }
        if let Some(max_steps) = self.max_steps {
            config.generation.max_steps = max_steps;
        }
        if self.fill_last_bar {
            config.generation.fill_last_bar = true;
        }
        if self.forbid_empty_final_bar {
            config.generation.forbid_empty_final_bar = true;
        }
    }
}
