//! ONNX Runtime distribution source.
//!
//! Runs an exported decoder-only transformer. The graph takes
//! `input_ids: int64[1, T]` and returns `logits: float[1, T, V]` (f32 or f16);
//! only the last row is used.

use std::path::Path;
use std::sync::Mutex;

use half::f16;
use ndarray::{s, Array, Ix3, IxDyn};
use ort::session::Session;
use ort::value::{DynValue, Tensor};

use crate::error::{DaemonError, Result};

use super::source::DistributionSource;

/// Next-token distribution backed by an ONNX Runtime session.
pub struct OnnxDistribution {
    session: Mutex<Session>,
    vocab_size: usize,
    block_size: usize,
}

impl OnnxDistribution {
    /// Loads `model.onnx` from the model directory.
    pub fn load(model_path: &Path, vocab_size: usize, block_size: usize) -> Result<Self> {
        let session = Session::builder()
            .map_err(|e| DaemonError::model_load_failed(format!("Failed to create session: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| {
                DaemonError::model_load_failed(format!(
                    "Failed to load {}: {}",
                    model_path.display(),
                    e
                ))
            })?;

        tracing::debug!(
            path = %model_path.display(),
            vocab_size,
            block_size,
            "loaded token model"
        );

        Ok(Self {
            session: Mutex::new(session),
            vocab_size,
            block_size,
        })
    }
}

impl DistributionSource for OnnxDistribution {
    fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    fn context_window(&self) -> usize {
        self.block_size
    }

    fn next_token_scores(&self, context: &[u32], pad_id: u32) -> Result<Vec<f32>> {
        // An empty context still needs one position to score from.
        let ids: Vec<i64> = if context.is_empty() {
            vec![pad_id as i64]
        } else {
            context.iter().map(|&id| id as i64).collect()
        };
        let len = ids.len();

        let input_ids = Tensor::from_array(([1usize, len], ids)).map_err(|e| {
            DaemonError::model_unavailable(format!("Failed to create input tensor: {}", e))
        })?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| DaemonError::model_unavailable("Model session lock poisoned"))?;

        let mut outputs = session
            .run(ort::inputs!["input_ids" => input_ids])
            .map_err(|e| DaemonError::model_unavailable(format!("Inference failed: {}", e)))?;

        let logits = outputs
            .remove("logits")
            .ok_or_else(|| DaemonError::model_unavailable("logits not found in output"))?;

        let scores = last_row(&logits)?;
        if scores.len() != self.vocab_size {
            return Err(DaemonError::model_unavailable(format!(
                "Model returned {} scores for a vocabulary of {}",
                scores.len(),
                self.vocab_size
            )));
        }
        Ok(scores)
    }
}

/// Extracts the scores of the last position from a `[1, T, V]` tensor.
fn last_row(value: &DynValue) -> Result<Vec<f32>> {
    let (shape, data): (Vec<usize>, Vec<f32>) =
        if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
            let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            (shape_vec, data.to_vec())
        } else if let Ok((shape, data)) = value.try_extract_tensor::<f16>() {
            let shape_vec: Vec<usize> = shape.iter().map(|&x| x as usize).collect();
            let data_f32: Vec<f32> = data.iter().map(|e| f32::from(*e)).collect();
            (shape_vec, data_f32)
        } else {
            return Err(DaemonError::model_unavailable("Logits must be f32 or f16"));
        };

    let arr = Array::from_shape_vec(IxDyn(&shape), data)
        .map_err(|e| DaemonError::model_unavailable(format!("Failed to create array: {}", e)))?
        .into_dimensionality::<Ix3>()
        .map_err(|e| DaemonError::model_unavailable(format!("Expected 3D logits: {}", e)))?;

    let (batch, positions, _) = arr.dim();
    if batch == 0 || positions == 0 {
        return Err(DaemonError::model_unavailable("Model returned empty logits"));
    }

    Ok(arr.slice(s![0, positions - 1, ..]).to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_model_fails() {
        let result = OnnxDistribution::load(Path::new("/nonexistent/model.onnx"), 16, 64);
        let err = result.err().unwrap();
        assert_eq!(err.code, crate::error::ErrorCode::ModelLoadFailed);
    }

    #[test]
    fn last_row_of_f32_logits() {
        let data: Vec<f32> = (0..6).map(|x| x as f32).collect();
        let tensor = Tensor::from_array(([1usize, 2, 3], data)).unwrap();
        let row = last_row(&tensor.into_dyn()).unwrap();
        assert_eq!(row, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn last_row_of_f16_logits() {
        let data: Vec<f16> = [1.0f32, 2.0, 0.5, -1.0].iter().map(|&x| f16::from_f32(x)).collect();
        let tensor = Tensor::from_array(([1usize, 2, 2], data)).unwrap();
        let row = last_row(&tensor.into_dyn()).unwrap();
        assert_eq!(row, vec![0.5, -1.0]);
    }

    #[test]
    fn rejects_non_3d_logits() {
        let tensor = Tensor::from_array(([2usize, 2], vec![0.0f32; 4])).unwrap();
        assert!(last_row(&tensor.into_dyn()).is_err());
    }
}
