//! Asset type representing a rendered audio file.
//!
//! An Asset is one rendered pass of a job (preview or final) stored in the
//! asset directory. Assets are identified by a deterministic asset_id computed
//! from the job and pass parameters.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;

use super::job::system_time_serde;

/// Which pass of a job produced an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PassKind {
    /// Short pass with a small target duration.
    Preview,
    /// Full-length pass.
    Final,
}

impl PassKind {
    /// Returns the string representation of the pass.
    pub fn as_str(&self) -> &'static str {
        match self {
            PassKind::Preview => "preview",
            PassKind::Final => "final",
        }
    }

    /// Offset added to the job seed so the two passes sample independently.
    pub fn seed_offset(&self) -> u64 {
        match self {
            PassKind::Preview => 1,
            PassKind::Final => 0,
        }
    }
}

impl fmt::Display for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A rendered audio file produced by one pass of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Asset {
    /// Primary key - SHA256 hash of (job_id + pass + seed + model_version).
    /// Format: 16 hex characters.
    pub asset_id: String,

    /// Job that produced this asset.
    pub job_id: String,

    /// Pass that produced this asset.
    pub kind: PassKind,

    /// Full filesystem path to the WAV file.
    pub path: PathBuf,

    /// Full filesystem path to the MIDI file the WAV was rendered from.
    pub midi_path: PathBuf,

    /// Duration of the rendered audio in seconds.
    pub duration_sec: f32,

    /// Audio sample rate in Hz.
    pub sample_rate: u32,

    /// Score tempo.
    pub bpm: u32,

    /// Number of notes in the score.
    pub note_count: usize,

    /// Time taken to decode, build, and render in seconds.
    pub generation_time_sec: f32,

    /// When the asset was created.
    #[serde(with = "system_time_serde")]
    pub created_at: SystemTime,
}

impl Asset {
    /// Validates that the asset meets all constraints.
    ///
    /// Returns an error message if validation fails, None otherwise.
    pub fn validate(&self) -> Option<String> {
        if self.asset_id.len() != 16 {
            return Some(format!(
                "Asset ID must be 16 characters, got {}",
                self.asset_id.len()
            ));
        }

        if !self.asset_id.chars().all(|c| c.is_ascii_hexdigit()) {
            return Some("Asset ID must contain only hex characters".to_string());
        }

        if !self.path.exists() {
            return Some(format!("Asset file does not exist: {:?}", self.path));
        }

        if self.sample_rate == 0 {
            return Some("sample_rate must be > 0".to_string());
        }

        None
    }
}

/// Computes a deterministic asset ID from pass parameters.
///
/// The asset ID is the first 16 hex characters of the SHA256 hash of:
/// `{job_id}:{pass}:{seed}:{model_version}`
pub fn compute_asset_id(job_id: &str, kind: PassKind, seed: u64, model_version: &str) -> String {
    let input = format!("{}:{}:{}:{}", job_id, kind, seed, model_version);
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();
    // Take first 8 bytes (16 hex chars)
    hex::encode(&result[..8])
}
