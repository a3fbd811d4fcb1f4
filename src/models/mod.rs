//! Token model components.
//!
//! - [`Vocabulary`](vocab::Vocabulary) / [`TokenTable`](vocab::TokenTable): token and id mapping
//! - [`DistributionSource`](source::DistributionSource): next-token scores for a context
//! - [`OnnxDistribution`](onnx::OnnxDistribution): ONNX Runtime implementation
//! - [`Logits`](logits::Logits): scaling, truncation, and sampling
//! - [`load_model`](loader::load_model) / [`ensure_models`](downloader::ensure_models): model files

pub mod downloader;
pub mod loader;
pub mod logits;
pub mod onnx;
pub mod source;
pub mod vocab;

pub use downloader::ensure_models;
pub use loader::{check_models, load_model, REQUIRED_MODEL_FILES};
pub use logits::{Logits, DEFAULT_TOP_P, MIN_TEMPERATURE};
pub use onnx::OnnxDistribution;
pub use source::{DistributionSource, ModelHandle};
pub use vocab::{TokenTable, Vocabulary};
