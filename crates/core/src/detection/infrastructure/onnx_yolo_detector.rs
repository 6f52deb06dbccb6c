/// YOLO face detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference and decoding of the pose-style
/// face head. Suppression and thresholding are left to the pipeline's
/// `DetectionFilter`, so this adapter only drops near-zero candidates.
use std::path::Path;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{validate_frame, DetectError, FaceDetector};
use crate::shared::bbox::BoundingBox;
use crate::shared::frame::Frame;

use super::letterbox::{letterbox, Letterbox};
use super::onnx_session::{declared_input_size, inference_error, load_session};

/// Fallback YOLO model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Candidates below this score are noise from empty anchors.
pub const DEFAULT_CANDIDATE_FLOOR: f64 = 0.05;

/// Number of keypoint values per detection (5 landmarks × x, y, conf).
const NUM_KEYPOINT_VALUES: usize = 15;

/// Minimum keypoint confidence to treat a landmark as visible.
const KEYPOINT_CONF_THRESH: f64 = 0.5;

/// YOLO face detector backed by an ONNX Runtime session.
pub struct OnnxYoloDetector {
    session: ort::session::Session,
    candidate_floor: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model and prepare for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting NCHW).
    /// Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(model_path: &Path) -> Result<Self, DetectError> {
        let session = load_session(model_path)?;
        let input_size = declared_input_size(&session).unwrap_or(DEFAULT_INPUT_SIZE);
        Ok(Self {
            session,
            candidate_floor: DEFAULT_CANDIDATE_FLOOR,
            input_size,
        })
    }

    pub fn with_candidate_floor(mut self, floor: f64) -> Self {
        self.candidate_floor = floor;
        self
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        validate_frame(frame)?;

        let lb = letterbox(frame, self.input_size);
        let input_value =
            ort::value::Tensor::from_array(lb.tensor.clone()).map_err(inference_error)?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(inference_error)?;
        if outputs.len() == 0 {
            return Err(DetectError::Inference("YOLO model produced no outputs".into()));
        }
        let tensor = outputs[0]
            .try_extract_array::<f32>()
            .map_err(inference_error)?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or_else(|| DetectError::Inference("YOLO output is not contiguous".into()))?;

        decode_output(
            data,
            &shape,
            &lb,
            self.candidate_floor,
            frame.width() as f64,
            frame.height() as f64,
        )
    }
}

/// Decodes a YOLO face output tensor into frame-space detections.
///
/// Accepts `[1, features, candidates]` (transposed, the export default) and
/// `[1, candidates, features]`. Each feature row is
/// `[cx, cy, w, h, conf, kp0_x, kp0_y, kp0_conf, ...]`.
fn decode_output(
    data: &[f32],
    shape: &[usize],
    lb: &Letterbox,
    floor: f64,
    frame_w: f64,
    frame_h: f64,
) -> Result<Vec<Detection>, DetectError> {
    if shape.len() != 3 {
        return Err(DetectError::Inference(format!(
            "unexpected YOLO output shape: {shape:?}"
        )));
    }
    let transposed = shape[1] < shape[2];
    let (num_dets, num_feats) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if num_feats < 5 || data.len() < num_dets * num_feats {
        return Err(DetectError::Inference(format!(
            "YOLO output too small for shape {shape:?}"
        )));
    }

    let value = |det: usize, feat: usize| -> f64 {
        let idx = if transposed {
            feat * num_dets + det
        } else {
            det * num_feats + feat
        };
        data[idx] as f64
    };

    let mut detections = Vec::new();
    for i in 0..num_dets {
        let conf = value(i, 4);
        if conf < floor {
            continue;
        }

        let (cx, cy, w, h) = (value(i, 0), value(i, 1), value(i, 2), value(i, 3));
        let (x1, y1) = lb.to_frame(cx - w / 2.0, cy - h / 2.0);
        let (x2, y2) = lb.to_frame(cx + w / 2.0, cy + h / 2.0);
        let bbox = BoundingBox::from_xyxy(x1, y1, x2, y2).clamp_to(frame_w, frame_h);

        let mut detection = Detection::new(bbox, conf.min(1.0));
        if num_feats >= 5 + NUM_KEYPOINT_VALUES {
            let points: Option<Vec<(f64, f64)>> = (0..5)
                .map(|k| {
                    let base = 5 + k * 3;
                    (value(i, base + 2) >= KEYPOINT_CONF_THRESH)
                        .then(|| lb.to_frame(value(i, base), value(i, base + 1)))
                })
                .collect();
            detection.landmarks = points;
        }
        detections.push(detection);
    }
    Ok(detections)
}
