//! Inference seam for the detector and super-resolution models.

use ndarray::{Array4, ArrayD};

use crate::error::DecodeError;

/// A single-input, single-output model.
///
/// Implementations must be shareable across threads; the decoder chain is
/// used read-only from concurrent scans.
pub trait ModelBackend: Send + Sync {
    /// Run the model on an NCHW `f32` tensor and return its first output.
    fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, DecodeError>;
}

#[cfg(feature = "native")]
pub use self::ort_model::OrtModel;

#[cfg(feature = "native")]
mod ort_model {
    use std::path::Path;
    use std::sync::Mutex;

    use ndarray::{Array4, ArrayD};
    use ort::session::Session;
    use ort::session::builder::GraphOptimizationLevel;
    use ort::value::Tensor;
    use tracing::debug;

    use super::ModelBackend;
    use crate::error::DecodeError;

    /// ONNX Runtime model.
    pub struct OrtModel {
        session: Mutex<Session>,
        input_name: String,
    }

    impl OrtModel {
        /// Load a model from a file path.
        pub fn from_file<P: AsRef<Path>>(path: P, num_threads: usize) -> Result<Self, DecodeError> {
            let path = path.as_ref();
            debug!("Loading ONNX model from: {}", path.display());

            let bytes = std::fs::read(path)
                .map_err(|e| DecodeError::ModelLoad(format!("{}: {}", path.display(), e)))?;
            Self::from_bytes(&bytes, num_threads)
        }

        /// Load a model from bytes.
        pub fn from_bytes(bytes: &[u8], num_threads: usize) -> Result<Self, DecodeError> {
            debug!("Loading ONNX model from {} bytes", bytes.len());

            let session = Session::builder()
                .map_err(|e| DecodeError::ModelLoad(e.to_string()))?
                .with_optimization_level(GraphOptimizationLevel::Level3)
                .map_err(|e| DecodeError::ModelLoad(e.to_string()))?
                .with_intra_threads(num_threads.max(1))
                .map_err(|e| DecodeError::ModelLoad(e.to_string()))?
                .commit_from_memory(bytes)
                .map_err(|e| DecodeError::ModelLoad(e.to_string()))?;

            let input_name = session
                .inputs()
                .first()
                .map(|i| i.name().to_string())
                .ok_or_else(|| DecodeError::ModelLoad("model declares no inputs".to_string()))?;

            debug!("Model input: {}", input_name);
            Ok(Self {
                session: Mutex::new(session),
                input_name,
            })
        }
    }

    impl ModelBackend for OrtModel {
        fn run(&self, input: Array4<f32>) -> Result<ArrayD<f32>, DecodeError> {
            let shape: Vec<i64> = input.shape().iter().map(|&s| s as i64).collect();
            let data: Vec<f32> = input.iter().cloned().collect();
            let value: ort::session::SessionInputValue<'static> = Tensor::from_array((shape, data))
                .map(Into::into)
                .map_err(|e| DecodeError::InvalidImage(e.to_string()))?;

            let mut session = self
                .session
                .lock()
                .map_err(|e| DecodeError::Inference(format!("Failed to lock session: {}", e)))?;

            let outputs = session
                .run(vec![(self.input_name.as_str(), value)])
                .map_err(|e| DecodeError::Inference(e.to_string()))?;

            let (name, output) = outputs
                .iter()
                .next()
                .ok_or_else(|| DecodeError::Inference("model produced no outputs".to_string()))?;

            let (shape_ref, data) = output.try_extract_tensor::<f32>().map_err(|e| {
                DecodeError::Inference(format!("output '{}' is not f32: {}", name, e))
            })?;
            let shape: Vec<usize> = shape_ref.iter().map(|&s| s as usize).collect();
            ArrayD::from_shape_vec(ndarray::IxDyn(&shape), data.to_vec())
                .map_err(|e| DecodeError::Inference(e.to_string()))
        }
    }
}
