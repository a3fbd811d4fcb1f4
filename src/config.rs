//! Daemon configuration module.
//!
//! Contains the runtime configuration for the notegen daemon: model and
//! asset locations, the renderer, the worker pool, and the decode and
//! notation parameters.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

use crate::audio::SAMPLE_RATE;
use crate::generation::jobs::{JobManagerConfig, DEFAULT_MAX_PENDING, MAX_DURATION_SEC};
use crate::generation::store::DEFAULT_MAX_FINISHED;
use crate::types::{GenerationConfig, NotationConfig};

/// Default target duration of the preview pass in seconds.
pub const DEFAULT_PREVIEW_SECONDS: f32 = 5.0;

/// Runtime configuration for the daemon.
///
/// This configuration is typically loaded from command-line arguments
/// or environment variables at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding `model.onnx`, `tokenizer.json` and `config.json`.
    /// If None, uses the platform-specific default cache location.
    pub model_path: Option<PathBuf>,

    /// Directory for rendered assets.
    /// If None, uses the platform-specific default cache location.
    pub cache_path: Option<PathBuf>,

    /// Base URL model files are downloaded from when missing.
    pub model_url: Option<String>,

    /// Renderer executable name or path.
    pub renderer: String,

    /// Instrument bank (.sf2) passed to the renderer.
    pub soundfont: Option<PathBuf>,

    /// Sample rate of rendered audio.
    pub sample_rate: u32,

    /// Number of worker threads running jobs.
    pub workers: usize,

    /// Jobs allowed to wait for a worker.
    pub max_pending: usize,

    /// Target duration of the preview pass. Zero disables previews.
    pub preview_seconds: f32,

    /// Rendered assets kept on disk before the oldest are evicted.
    pub max_assets: usize,

    /// Completed or failed jobs kept for status queries.
    pub max_finished_jobs: usize,

    /// Decode parameters.
    pub generation: GenerationConfig,

    /// Score timing parameters.
    pub notation: NotationConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            cache_path: None,
            model_url: None,
            renderer: "fluidsynth".to_string(),
            soundfont: None,
            sample_rate: SAMPLE_RATE,
            workers: 1,
            max_pending: DEFAULT_MAX_PENDING,
            preview_seconds: DEFAULT_PREVIEW_SECONDS,
            max_assets: crate::cache::assets::DEFAULT_MAX_ENTRIES,
            max_finished_jobs: DEFAULT_MAX_FINISHED,
            generation: GenerationConfig::default(),
            notation: NotationConfig::default(),
        }
    }
}

impl DaemonConfig {
    /// Creates a new DaemonConfig with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a DaemonConfig from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `NOTEGEN_MODEL_PATH` - Model directory
    /// - `NOTEGEN_CACHE_PATH` - Asset directory
    /// - `NOTEGEN_MODEL_URL` - Base URL for model downloads
    /// - `NOTEGEN_RENDERER` - Renderer executable
    /// - `NOTEGEN_SOUNDFONT` - Instrument bank path
    /// - `NOTEGEN_SAMPLE_RATE` - Render sample rate
    /// - `NOTEGEN_WORKERS` - Worker thread count
    /// - `NOTEGEN_MAX_PENDING` - Pending job limit
    /// - `NOTEGEN_PREVIEW_SECONDS` - Preview pass duration (0 disables)
    /// - `NOTEGEN_MAX_FINISHED_JOBS` - Finished job records kept for status
    /// - `NOTEGEN_TEMPERATURE`, `NOTEGEN_TOP_P`, `NOTEGEN_MAX_STEPS` - Sampling
    /// - `NOTEGEN_FILL_LAST_BAR`, `NOTEGEN_FORBID_EMPTY_FINAL_BAR` - Final bar policy
    ///
    /// Falls back to defaults for unset or unparseable variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let parse = |name: &str| lookup(name).map(|v| v.trim().to_string());

        if let Some(path) = parse("NOTEGEN_MODEL_PATH") {
            config.model_path = Some(PathBuf::from(path));
        }
        if let Some(path) = parse("NOTEGEN_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(path));
        }
        if let Some(url) = parse("NOTEGEN_MODEL_URL").filter(|u| !u.is_empty()) {
            config.model_url = Some(url);
        }
        if let Some(renderer) = parse("NOTEGEN_RENDERER").filter(|r| !r.is_empty()) {
            config.renderer = renderer;
        }
        if let Some(path) = parse("NOTEGEN_SOUNDFONT") {
            config.soundfont = Some(PathBuf::from(path));
        }

        if let Some(rate) = parse_value::<u32>(parse("NOTEGEN_SAMPLE_RATE")) {
            config.sample_rate = rate;
        }
        if let Some(workers) = parse_value::<usize>(parse("NOTEGEN_WORKERS")).filter(|&w| w > 0) {
            config.workers = workers;
        }
        if let Some(max) = parse_value::<usize>(parse("NOTEGEN_MAX_PENDING")).filter(|&m| m > 0) {
            config.max_pending = max;
        }
        if let Some(seconds) = parse_value::<f32>(parse("NOTEGEN_PREVIEW_SECONDS")) {
            config.preview_seconds = seconds;
        }
        if let Some(max) = parse_value::<usize>(parse("NOTEGEN_MAX_FINISHED_JOBS")).filter(|&m| m > 0) {
            config.max_finished_jobs = max;
        }

        // Sampling
        if let Some(temperature) = parse_value::<f32>(parse("NOTEGEN_TEMPERATURE")) {
            config.generation.temperature = temperature;
        }
        if let Some(top_p) = parse_value::<f32>(parse("NOTEGEN_TOP_P")) {
            config.generation.top_p = top_p;
        }
        if let Some(steps) = parse_value::<usize>(parse("NOTEGEN_MAX_STEPS")) {
            config.generation.max_steps = steps;
        }
        if let Some(fill) = parse_flag(parse("NOTEGEN_FILL_LAST_BAR")) {
            config.generation.fill_last_bar = fill;
        }
        if let Some(forbid) = parse_flag(parse("NOTEGEN_FORBID_EMPTY_FINAL_BAR")) {
            config.generation.forbid_empty_final_bar = forbid;
        }

        config
    }

    /// Returns the effective model path, using platform defaults if not specified.
    pub fn effective_model_path(&self) -> PathBuf {
        if let Some(ref path) = self.model_path {
            path.clone()
        } else {
            default_model_path()
        }
    }

    /// Returns the effective asset path, using platform defaults if not specified.
    pub fn effective_cache_path(&self) -> PathBuf {
        if let Some(ref path) = self.cache_path {
            path.clone()
        } else {
            default_cache_path()
        }
    }

    /// Worker pool settings derived from this config.
    pub fn job_manager_config(&self) -> JobManagerConfig {
        JobManagerConfig {
            workers: self.workers,
            max_pending: self.max_pending,
            preview: self.preview_seconds > 0.0,
        }
    }

    /// Validates the configuration.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.workers == 0 {
            return Some("workers must be > 0".to_string());
        }
        if self.workers > 64 {
            return Some(format!("workers too high: {} (max 64)", self.workers));
        }
        if self.max_pending == 0 {
            return Some("max_pending must be > 0".to_string());
        }
        if !(self.preview_seconds.is_finite()
            && self.preview_seconds >= 0.0
            && self.preview_seconds <= MAX_DURATION_SEC)
        {
            return Some(format!(
                "preview_seconds must be in [0, {}], got {}",
                MAX_DURATION_SEC, self.preview_seconds
            ));
        }
        if !(8_000..=192_000).contains(&self.sample_rate) {
            return Some(format!(
                "sample_rate out of range: {} (8000-192000)",
                self.sample_rate
            ));
        }
        if self.max_assets == 0 {
            return Some("max_assets must be > 0".to_string());
        }
        if self.max_finished_jobs == 0 {
            return Some("max_finished_jobs must be > 0".to_string());
        }
        if self.renderer.trim().is_empty() {
            return Some("renderer must not be empty".to_string());
        }

        if self.generation.beats_per_bar != self.notation.beats_per_bar {
            return Some(format!(
                "generation.beats_per_bar ({}) must match notation.beats_per_bar ({})",
                self.generation.beats_per_bar, self.notation.beats_per_bar
            ));
        }

        self.generation
            .validate()
            .or_else(|| self.notation.validate())
    }
}

fn parse_value<T: FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.parse().ok())
}

fn parse_flag(raw: Option<String>) -> Option<bool> {
    match raw?.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Returns the platform-specific default model storage path.
///
/// Uses the `directories` crate to find appropriate locations:
/// - macOS: ~/Library/Caches/notegen/model
/// - Linux: ~/.cache/notegen/model
/// - Windows: C:\Users\<user>\AppData\Local\notegen\cache\model
pub fn default_model_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "notegen") {
        proj_dirs.cache_dir().join("model")
    } else {
        // Fallback to current directory
        PathBuf::from("./model")
    }
}

/// Returns the platform-specific default asset storage path.
///
/// - macOS: ~/Library/Caches/notegen/assets
/// - Linux: ~/.cache/notegen/assets
/// - Windows: C:\Users\<user>\AppData\Local\notegen\cache\assets
pub fn default_cache_path() -> PathBuf {
    if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "notegen") {
        proj_dirs.cache_dir().join("assets")
    } else {
        PathBuf::from("./assets")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_vars(vars: &[(&str, &str)]) -> DaemonConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        DaemonConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_are_valid() {
        let config = DaemonConfig::new();
        assert!(config.validate().is_none());
        assert_eq!(config.renderer, "fluidsynth");
        assert_eq!(config.sample_rate, 32000);
        assert!(config.job_manager_config().preview);
    }

    #[test]
    fn config_validation() {
        let mut config = DaemonConfig::new();
        config.workers = 0;
        assert!(config.validate().is_some());

        config.workers = 2;
        config.preview_seconds = -1.0;
        assert!(config.validate().is_some());

        config.preview_seconds = 0.0;
        assert!(config.validate().is_none());
        assert!(!config.job_manager_config().preview);

        config.generation.top_p = 1.5;
        assert!(config.validate().unwrap().contains("top_p"));
    }

    #[test]
    fn bar_lengths_must_agree() {
        let mut config = DaemonConfig::new();
        config.notation.beats_per_bar = 3;
        assert!(config.validate().unwrap().contains("beats_per_bar"));

        config.generation.beats_per_bar = 3;
        assert!(config.validate().is_none());

        config.generation.beats_per_bar = 10_000_000;
        config.notation.beats_per_bar = 10_000_000;
        assert!(config.validate().is_some());
    }

    #[test]
    fn effective_paths() {
        let config = DaemonConfig::new();
        assert!(!config.effective_model_path().as_os_str().is_empty());
        assert!(!config.effective_cache_path().as_os_str().is_empty());

        let config = from_vars(&[("NOTEGEN_MODEL_PATH", "/srv/model")]);
        assert_eq!(config.effective_model_path(), PathBuf::from("/srv/model"));
    }

    #[test]
    fn reads_variables() {
        let config = from_vars(&[
            ("NOTEGEN_CACHE_PATH", "/tmp/assets"),
            ("NOTEGEN_MODEL_URL", "https://example.invalid/model"),
            ("NOTEGEN_SOUNDFONT", "/usr/share/sounds/sf2/FluidR3_GM.sf2"),
            ("NOTEGEN_WORKERS", "4"),
            ("NOTEGEN_MAX_PENDING", "20"),
            ("NOTEGEN_PREVIEW_SECONDS", "0"),
            ("NOTEGEN_MAX_FINISHED_JOBS", "25"),
            ("NOTEGEN_TEMPERATURE", "0.9"),
            ("NOTEGEN_TOP_P", "0.95"),
            ("NOTEGEN_MAX_STEPS", "512"),
            ("NOTEGEN_FILL_LAST_BAR", "true"),
            ("NOTEGEN_FORBID_EMPTY_FINAL_BAR", "1"),
        ]);
        assert_eq!(config.effective_cache_path(), PathBuf::from("/tmp/assets"));
        assert_eq!(config.model_url.as_deref(), Some("https://example.invalid/model"));
        assert!(config.soundfont.is_some());
        assert_eq!(config.workers, 4);
        assert_eq!(config.max_pending, 20);
        assert_eq!(config.max_finished_jobs, 25);
        assert_eq!(config.preview_seconds, 0.0);
        assert_eq!(config.generation.temperature, 0.9);
        assert_eq!(config.generation.top_p, 0.95);
        assert_eq!(config.generation.max_steps, 512);
        assert!(config.generation.fill_last_bar);
        assert!(config.generation.forbid_empty_final_bar);
        assert!(config.validate().is_none());
    }

    #[test]
    fn unparseable_variables_keep_defaults() {
        let config = from_vars(&[
            ("NOTEGEN_WORKERS", "0"),
            ("NOTEGEN_MAX_STEPS", "many"),
            ("NOTEGEN_FILL_LAST_BAR", "maybe"),
            ("NOTEGEN_RENDERER", ""),
        ]);
        assert_eq!(config.workers, 1);
        assert_eq!(config.generation.max_steps, 1024);
        assert!(!config.generation.fill_last_bar);
        assert_eq!(config.renderer, "fluidsynth");
    }
}
