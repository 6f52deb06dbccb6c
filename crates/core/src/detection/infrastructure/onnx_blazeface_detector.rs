/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// A lightweight short-range detector, suitable as a fast fallback when the
/// YOLO model is unavailable. Emits boxes with six keypoints; suppression is
/// left to the pipeline's `DetectionFilter`.
use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{validate_frame, DetectError, FaceDetector};
use crate::shared::bbox::BoundingBox;
use crate::shared::frame::Frame;

use super::letterbox::resize_normalized;
use super::onnx_session::{inference_error, load_session};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Values per anchor in the regressor output: box (4) + 6 keypoints × (x, y).
const REGRESSOR_STRIDE: usize = 16;

const NUM_KEYPOINTS: usize = 6;

/// Candidates below this score are noise from empty anchors.
pub const DEFAULT_CANDIDATE_FLOOR: f64 = 0.05;

/// BlazeFace face detector backed by an ONNX Runtime session.
pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    candidate_floor: f64,
    anchors: Vec<[f32; 2]>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model.
    pub fn new(model_path: &Path) -> Result<Self, DetectError> {
        let session = load_session(model_path)?;
        Ok(Self {
            session,
            candidate_floor: DEFAULT_CANDIDATE_FLOOR,
            anchors: generate_anchors(),
        })
    }

    pub fn with_candidate_floor(mut self, floor: f64) -> Self {
        self.candidate_floor = floor;
        self
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        validate_frame(frame)?;

        let input_tensor = resize_normalized(frame, INPUT_SIZE);
        let input_value = ort::value::Tensor::from_array(input_tensor).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;

        // regressors: [1, 896, 16], classificators: [1, 896, 1]
        if outputs.len() < 2 {
            return Err(DetectError::Inference(format!(
                "BlazeFace model expected 2 outputs, got {}",
                outputs.len()
            )));
        }
        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| DetectError::Inference("cannot get regressor slice".into()))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| DetectError::Inference("cannot get score slice".into()))?;

        Ok(decode_anchors(
            reg_data,
            score_data,
            &self.anchors,
            self.candidate_floor,
            frame.width() as f64,
            frame.height() as f64,
        ))
    }
}

/// Decodes anchor-relative regressions into frame-space detections.
fn decode_anchors(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    floor: f64,
    fw: f64,
    fh: f64,
) -> Vec<Detection> {
    let size = INPUT_SIZE as f64;
    let mut detections = Vec::new();

    for (i, (&raw_score, anchor)) in score_data.iter().zip(anchors).enumerate() {
        let score = sigmoid(raw_score) as f64;
        if score < floor {
            continue;
        }
        let reg = match reg_data.get(i * REGRESSOR_STRIDE..(i + 1) * REGRESSOR_STRIDE) {
            Some(reg) => reg,
            None => break,
        };
        let (ax, ay) = (anchor[0] as f64, anchor[1] as f64);

        let cx = ax + reg[0] as f64 / size;
        let cy = ay + reg[1] as f64 / size;
        let w = reg[2] as f64 / size;
        let h = reg[3] as f64 / size;
        let bbox = BoundingBox::from_center(cx * fw, cy * fh, w * fw, h * fh).clamp_to(fw, fh);

        let landmarks = (0..NUM_KEYPOINTS)
            .map(|k| {
                let kx = ax + reg[4 + k * 2] as f64 / size;
                let ky = ay + reg[5 + k * 2] as f64 / size;
                (kx * fw, ky * fh)
            })
            .collect();

        detections.push(Detection::new(bbox, score).with_landmarks(landmarks));
    }
    detections
}

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
