//! Cache module for rendered assets.
//!
//! Provides an LRU-bounded index of rendered audio files.

pub mod assets;

// Re-export commonly used types
pub use assets::AssetCache;
