//! Per-frame detection with the retry policy shared by all executors.

use std::time::Instant;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{DetectError, FaceDetector};
use crate::shared::frame::Frame;

use super::pipeline_error::PipelineError;

/// What happened when a frame went through the detector.
#[derive(Debug)]
pub enum DetectionOutcome {
    Detected {
        detections: Vec<Detection>,
        retried: bool,
    },
    /// Inference failed twice; the frame proceeds as if nothing was seen.
    Failed(PipelineError),
    /// The frame cannot be processed; no result, tracker not advanced.
    Skipped(PipelineError),
}

/// Detection result for one frame, detached from its pixel buffer.
#[derive(Debug)]
pub struct DetectedFrame {
    pub sequence: u64,
    pub timestamp: f64,
    pub outcome: DetectionOutcome,
    pub detect_ms: f64,
}

/// Runs the detector on `frame`, retrying once on inference failure.
///
/// Takes the frame by value so its buffer is released as soon as
/// detection finishes.
pub fn detect_frame(detector: &mut dyn FaceDetector, frame: Frame) -> DetectedFrame {
    let start = Instant::now();
    let sequence = frame.sequence();
    let timestamp = frame.timestamp();

    let outcome = match detector.detect(&frame) {
        Ok(detections) => DetectionOutcome::Detected {
            detections,
            retried: false,
        },
        Err(DetectError::Inference(first)) => {
            log::warn!("Inference failed on frame {sequence}, retrying: {first}");
            match detector.detect(&frame) {
                Ok(detections) => DetectionOutcome::Detected {
                    detections,
                    retried: true,
                },
                Err(err) => DetectionOutcome::Failed(PipelineError::from_detect(sequence, err)),
            }
        }
        Err(err) => DetectionOutcome::Skipped(PipelineError::from_detect(sequence, err)),
    };
    drop(frame);

    DetectedFrame {
        sequence,
        timestamp,
        outcome,
        detect_ms: start.elapsed().as_secs_f64() * 1000.0,
    }
}
