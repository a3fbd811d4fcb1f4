//! Score generation module.
//!
//! Decoding, notation reconstruction, the per-pass pipeline, and the job
//! lifecycle built on top of them.

pub mod decode;
pub mod jobs;
pub mod notation;
pub mod pipeline;
pub mod store;

// Re-export commonly used items
pub use decode::{decode, Decoded, StopReason};
pub use jobs::{validate_duration, JobManager, JobManagerConfig, MAX_DURATION_SEC};
pub use notation::build as build_score;
pub use pipeline::{generate_score, GenerationPipeline, ModelState, PassRunner};
pub use store::{InMemoryJobStore, JobStore, DEFAULT_MAX_FINISHED};
