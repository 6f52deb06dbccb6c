use std::collections::HashMap;
use std::sync::Arc;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{validate_frame, DetectError, FaceDetector};
use crate::shared::frame::Frame;

/// Replays pre-computed detections by frame sequence number.
///
/// Lets a recorded detection pass be re-tracked with different tracker
/// settings without running the model again. Frames are validated like
/// they would be for the model. Cloning the `Arc` is enough to
/// hand one cache to every worker.
#[derive(Clone)]
pub struct CachedFaceDetector {
    cache: Arc<HashMap<u64, Vec<Detection>>>,
}

impl CachedFaceDetector {
    pub fn new(cache: Arc<HashMap<u64, Vec<Detection>>>) -> Self {
        Self { cache }
    }
}

impl FaceDetector for CachedFaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError> {
        validate_frame(frame)?;
        Ok(self
            .cache
            .get(&frame.sequence())
            .cloned()
            .unwrap_or_default())
    }
}
