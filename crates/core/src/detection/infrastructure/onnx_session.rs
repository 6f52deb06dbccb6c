use std::path::Path;

use crate::detection::domain::face_detector::DetectError;

/// Opens an ONNX model with the platform's preferred execution providers.
///
/// Providers that fail to register fall back to CPU inside ort.
pub fn load_session(model_path: &Path) -> Result<ort::session::Session, DetectError> {
    if !model_path.exists() {
        return Err(DetectError::Inference(format!(
            "model file not found: {}",
            model_path.display()
        )));
    }
    let builder = ort::session::Session::builder().map_err(inference_error)?;
    let mut builder = builder
        .with_execution_providers(preferred_execution_providers())
        .map_err(inference_error)?;
    builder.commit_from_file(model_path).map_err(inference_error)
}

/// Square NCHW input size declared by the model, if static.
pub fn declared_input_size(session: &ort::session::Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            // [N, C, H, W]: H and W are equal for square inputs
            if shape.len() >= 4 && shape[2] > 0 {
                return Some(shape[2] as u32);
            }
        }
        None
    })
}

pub fn inference_error(e: impl std::fmt::Display) -> DetectError {
    DetectError::Inference(e.to_string())
}

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
