//! Model loader for the token model.
//!
//! Handles loading the vocabulary, the ONNX session, and configuration.

use std::path::Path;
use std::sync::Arc;

use crate::error::{DaemonError, Result};
use crate::types::ModelConfig;

use super::onnx::OnnxDistribution;
use super::source::ModelHandle;
use super::vocab::{TokenTable, Vocabulary};

/// File name of the exported decoder graph.
pub const MODEL_FILE: &str = "model.onnx";

/// File name of the word-level vocabulary.
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// File name of the optional model configuration.
pub const CONFIG_FILE: &str = "config.json";

/// Required model files.
pub const REQUIRED_MODEL_FILES: &[&str] = &[MODEL_FILE, TOKENIZER_FILE];

/// Returns the required files missing from `model_dir`.
pub fn missing_model_files(model_dir: &Path) -> Vec<&'static str> {
    REQUIRED_MODEL_FILES
        .iter()
        .copied()
        .filter(|file| !model_dir.join(file).exists())
        .collect()
}

/// Checks if all required model files exist in the directory.
///
/// Returns Ok(()) if all files exist, or an error listing missing files.
pub fn check_models(model_dir: &Path) -> Result<()> {
    let missing = missing_model_files(model_dir);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DaemonError::model_not_found(format!(
            "Missing model files in {}: {}",
            model_dir.display(),
            missing.join(", ")
        )))
    }
}

/// Loads the vocabulary and token model from a directory.
///
/// The directory should contain:
/// - `model.onnx` - decoder-only transformer producing next-token logits
/// - `tokenizer.json` - word-level vocabulary
///
/// Optionally:
/// - `config.json` - `block_size` and `version` (uses defaults if not present)
pub fn load_model(model_dir: &Path) -> Result<ModelHandle> {
    check_models(model_dir)?;

    let config = load_or_default_config(model_dir)?;

    tracing::info!(dir = %model_dir.display(), "loading vocabulary");
    let vocab = TokenTable::load(&model_dir.join(TOKENIZER_FILE))?;

    tracing::info!(dir = %model_dir.display(), "loading token model");
    let source = OnnxDistribution::load(&model_dir.join(MODEL_FILE), vocab.len(), config.block_size)?;

    tracing::info!(
        version = %config.version,
        vocab_size = vocab.len(),
        block_size = config.block_size,
        "model loaded"
    );

    Ok(ModelHandle::new(Arc::new(vocab), Arc::new(source), config.version))
}

/// Loads model configuration from config.json or uses defaults.
pub fn load_or_default_config(model_dir: &Path) -> Result<ModelConfig> {
    let config_path = model_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(ModelConfig::default());
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        DaemonError::model_load_failed(format!("Failed to read config.json: {}", e))
    })?;

    let config: ModelConfig = serde_json::from_str(&content).map_err(|e| {
        DaemonError::model_load_failed(format!("Failed to parse config.json: {}", e))
    })?;

    if let Some(msg) = config.validate() {
        return Err(DaemonError::model_load_failed(format!(
            "Invalid config.json: {}",
            msg
        )));
    }

    Ok(config)
}
