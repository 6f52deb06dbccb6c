use serde::{Deserialize, Serialize};

use crate::shared::bbox::BoundingBox;

/// One face candidate reported by a detector for a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`; higher is more reliable.
    pub confidence: f64,
    /// Facial keypoints in model order (eyes, nose, mouth corners, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Vec<(f64, f64)>>,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64) -> Self {
        Self {
            bbox,
            confidence,
            landmarks: None,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Vec<(f64, f64)>) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}
