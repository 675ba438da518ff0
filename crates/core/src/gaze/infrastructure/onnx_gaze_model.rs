use std::path::Path;

use ndarray::Array4;

use crate::gaze::domain::gaze_classifier::{ClassifierError, GazeModel};

/// Gaze classifier backed by an ONNX Runtime session.
///
/// Expects a single NHWC float input and a `(1, classes)` output.
pub struct OnnxGazeModel {
    session: ort::session::Session,
}

impl OnnxGazeModel {
    pub fn load(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;
        log::debug!(
            "loaded gaze model {} ({} inputs)",
            model_path.display(),
            session.inputs().len()
        );
        Ok(Self { session })
    }
}

impl GazeModel for OnnxGazeModel {
    fn scores(&mut self, input: Array4<f32>) -> Result<Vec<f32>, ClassifierError> {
        let input_value = ort::value::Tensor::from_array(input).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(ClassifierError::Inference("model produced no outputs".into()));
        }
        let scores = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        Ok(scores.iter().copied().collect())
    }
}

fn inference_error(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Inference(e.to_string())
}

/// Platform accelerator if available; ONNX Runtime falls back to CPU.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
