use thiserror::Error;

use crate::detection::domain::face_detector::DetectError;
use crate::shared::settings::SettingsError;
use crate::tracking::domain::assignment::AssignmentInfeasible;

use super::result_sink::SinkError;

#[derive(Error, Debug)]
pub enum PipelineError {
    /// The frame source disconnected mid-stream. Pipeline halts.
    #[error("frame source unavailable: {0}")]
    SourceUnavailable(String),
    /// A frame the detector cannot consume. Frame skipped, pipeline continues.
    #[error("invalid frame {sequence}: {reason}")]
    InvalidFrame { sequence: u64, reason: String },
    /// Inference failed on a frame even after a retry. Treated as zero
    /// detections, pipeline continues.
    #[error("inference failed on frame {sequence}: {reason}")]
    InferenceError { sequence: u64, reason: String },
    #[error(transparent)]
    AssignmentInfeasible(#[from] AssignmentInfeasible),
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// A detector could not be created for a worker.
    #[error("detector setup failed: {0}")]
    Detector(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0} thread panicked")]
    WorkerPanicked(&'static str),
    #[error("pipeline already executed")]
    AlreadyExecuted,
}

impl PipelineError {
    /// Per-frame errors are contained at the frame boundary; everything else
    /// stops the pipeline.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            PipelineError::InvalidFrame { .. } | PipelineError::InferenceError { .. }
        )
    }

    /// Attaches a frame number to a detector failure.
    pub fn from_detect(sequence: u64, err: DetectError) -> Self {
        match err {
            DetectError::InvalidFrame(reason) => PipelineError::InvalidFrame { sequence, reason },
            DetectError::Inference(reason) => PipelineError::InferenceError { sequence, reason },
        }
    }
}

impl From<SettingsError> for PipelineError {
    fn from(err: SettingsError) -> Self {
        PipelineError::InvalidConfig(err.to_string())
    }
}
