//! Core types for the notegen daemon.
//!
//! This module re-exports all the core data types used throughout the daemon:
//! - [`TokenKind`]: Classification of vocabulary tokens by their text
//! - [`Score`] / [`NoteEvent`]: Timed notes rebuilt from a token stream
//! - [`Job`]: A request for generation with status tracking
//! - [`Asset`]: A rendered pass stored in the asset directory
//! - [`ModelConfig`], [`GenerationConfig`], [`NotationConfig`]: Parameters

mod asset;
mod config;
mod job;
mod score;
pub mod token;

pub use asset::{compute_asset_id, Asset, PassKind};
pub use config::{
    GenerationConfig, ModelConfig, NotationConfig, DEFAULT_BLOCK_SIZE, MAX_BEATS_PER_BAR,
};
pub use job::{Job, JobError, JobStatus};
pub use score::{NoteEvent, Score};
pub use token::TokenKind;
