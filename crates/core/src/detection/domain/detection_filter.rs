use crate::shared::constants::{DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD};
use crate::shared::settings::PipelineSettings;

use super::detection::Detection;

/// Confidence gate plus greedy non-maximum suppression.
///
/// Detections below `confidence_threshold` are dropped (a score equal to the
/// threshold is kept), as are degenerate boxes. Survivors are stably sorted
/// by confidence, so equal scores keep the detector's output order, and each
/// is kept only if its IoU with every previously kept box is at or below
/// `iou_threshold`.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionFilter {
    pub confidence_threshold: f64,
    pub iou_threshold: f64,
    /// Boxes whose shorter side is below this many pixels are discarded.
    pub min_box_size: f64,
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f64, iou_threshold: f64) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            min_box_size: 0.0,
        }
    }

    pub fn from_settings(settings: &PipelineSettings) -> Self {
        Self {
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            min_box_size: settings.min_box_size,
        }
    }

    pub fn apply(&self, detections: Vec<Detection>) -> Vec<Detection> {
        let mut candidates: Vec<Detection> = detections
            .into_iter()
            .filter(|d| self.passes_gate(d))
            .collect();

        // `sort_by` is stable: ties keep detector order.
        candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
        for det in candidates {
            let suppressed = kept
                .iter()
                .any(|k| k.bbox.iou(&det.bbox) > self.iou_threshold);
            if !suppressed {
                kept.push(det);
            }
        }
        kept
    }

    fn passes_gate(&self, det: &Detection) -> bool {
        det.confidence.is_finite()
            && det.confidence >= self.confidence_threshold
            && !det.bbox.is_degenerate()
            && det.bbox.width.min(det.bbox.height) >= self.min_box_size
    }
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_IOU_THRESHOLD)
    }
}
