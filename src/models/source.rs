//! Next-token distribution source and the shared model handle.

use std::sync::Arc;

use crate::error::Result;

use super::vocab::Vocabulary;

/// Produces unnormalized next-token scores for a context of ids.
///
/// Implementations must be deterministic for a given context: all sampling
/// randomness lives in the caller.
pub trait DistributionSource: Send + Sync {
    /// Length of the score vector returned by [`next_token_scores`](Self::next_token_scores).
    fn vocab_size(&self) -> usize;

    /// Maximum number of trailing ids the source looks at.
    fn context_window(&self) -> usize;

    /// Returns one score per vocabulary id for the token following `context`.
    fn next_token_scores(&self, context: &[u32], pad_id: u32) -> Result<Vec<f32>>;
}

/// A loaded model: vocabulary, distribution source, and version string.
///
/// Built once at startup and cloned cheaply into each worker.
#[derive(Clone)]
pub struct ModelHandle {
    pub vocab: Arc<dyn Vocabulary>,
    pub source: Arc<dyn DistributionSource>,
    pub version: String,
}

impl ModelHandle {
    pub fn new(
        vocab: Arc<dyn Vocabulary>,
        source: Arc<dyn DistributionSource>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            vocab,
            source,
            version: version.into(),
        }
    }

    /// Returns the model version string.
    pub fn version(&self) -> &str {
        &self.version
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("version", &self.version)
            .field("vocab_size", &self.vocab.len())
            .field("context_window", &self.source.context_window())
            .finish()
    }
}
