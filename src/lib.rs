//! notegen-daemon: symbolic music generation daemon.
//!
//! Samples a bar-aware token stream from a next-token model, rebuilds a
//! timed score from it, renders the score through an external synthesizer,
//! and tracks each request as an asynchronous job.
//!
//! # Modules
//!
//! - [`types`]: Core data types (Job, Asset, Score, token classification, configs)
//! - [`models`]: Vocabulary, distribution sources, logits processing, model files
//! - [`generation`]: Decode engine, notation builder, pass pipeline, job manager
//! - [`audio`]: MIDI writing, rendering, WAV probing
//! - [`cache`]: Rendered asset index
//! - [`rpc`]: JSON-RPC surface
//! - [`config`]: Runtime configuration (DaemonConfig)
//! - [`error`]: Error types and codes (DaemonError, ErrorCode)
//!
//! # Example
//!
//! ```rust,ignore
//! use notegen_daemon::generation::generate_score;
//! use notegen_daemon::models::load_model;
//! use notegen_daemon::types::{GenerationConfig, NotationConfig};
//!
//! let model = load_model(model_dir)?;
//! let seed = vec!["BPM_120".to_string(), "BAR".to_string()];
//! let (decoded, score) = generate_score(
//!     &model,
//!     &seed,
//!     30.0, // seconds
//!     42,   // seed for reproducibility
//!     &GenerationConfig::default(),
//!     &NotationConfig::default(),
//! )?;
//! ```

pub mod audio;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod rpc;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export commonly used types at crate root for convenience
pub use config::DaemonConfig;
pub use error::{DaemonError, ErrorCode, Result};
pub use types::{compute_asset_id, Asset, Job, JobStatus, PassKind, Score};
