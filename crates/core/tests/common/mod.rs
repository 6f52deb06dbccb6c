#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use facetrack_core::detection::domain::detection::Detection;
use facetrack_core::detection::domain::face_detector::{DetectError, FaceDetector};
use facetrack_core::detection::infrastructure::cached_face_detector::CachedFaceDetector;
use facetrack_core::pipeline::frame_result::FrameResult;
use facetrack_core::pipeline::pipeline_error::PipelineError;
use facetrack_core::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use facetrack_core::pipeline::pipeline_logger::NullPipelineLogger;
use facetrack_core::pipeline::pipeline_report::PipelineReport;
use facetrack_core::shared::bbox::BoundingBox;
use facetrack_core::shared::frame::Frame;
use facetrack_core::shared::settings::PipelineSettings;
use facetrack_core::shared::video_metadata::VideoMetadata;
use facetrack_core::tracking::domain::tracker::{Tracker, TrackerConfig};
use facetrack_core::video::domain::frame_source::{FrameSource, SourceError};

pub const WIDTH: u32 = 64;
pub const HEIGHT: u32 = 48;

pub fn blank(sequence: u64) -> Frame {
    Frame::rgb(
        vec![0u8; (WIDTH * HEIGHT * 3) as usize],
        WIDTH,
        HEIGHT,
        sequence,
        sequence as f64 / 25.0,
    )
}

pub fn face(x: f64, y: f64, confidence: f64) -> Detection {
    Detection::new(BoundingBox::new(x, y, 40.0, 40.0), confidence)
}

/// Scripted source that counts how many frames it has handed out.
pub struct ScriptedSource {
    items: VecDeque<Result<Frame, SourceError>>,
    metadata: VideoMetadata,
    pub produced: Arc<AtomicU64>,
}

impl ScriptedSource {
    pub fn new(items: Vec<Result<Frame, SourceError>>) -> Self {
        let total = items.iter().filter(|i| i.is_ok()).count();
        Self {
            items: items.into(),
            metadata: VideoMetadata {
                total_frames: Some(total),
                ..VideoMetadata::unknown()
            },
            produced: Arc::new(AtomicU64::new(0)),
        }
    }

    /// `n` blank frames numbered from `first`.
    pub fn frames(first: u64, n: u64) -> Self {
        Self::new((first..first + n).map(|s| Ok(blank(s))).collect())
    }
}

impl FrameSource for ScriptedSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn next_frame(&mut self) -> Result<Frame, SourceError> {
        let next = self.items.pop_front().unwrap_or(Err(SourceError::Exhausted));
        if next.is_ok() {
            self.produced.fetch_add(1, Ordering::SeqCst);
        }
        next
    }

    fn close(&mut self) {
        self.items.clear();
    }
}

pub fn replay(script: HashMap<u64, Vec<Detection>>) -> CachedFaceDetector {
    CachedFaceDetector::new(Arc::new(script))
}

pub fn replay_factory(
    script: HashMap<u64, Vec<Detection>>,
) -> impl Fn() -> Result<Box<dyn FaceDetector>, DetectError> + Send + Sync {
    let detector = replay(script);
    move || Ok(Box::new(detector.clone()) as Box<dyn FaceDetector>)
}

pub struct Run {
    pub outcome: Result<PipelineReport, PipelineError>,
    pub results: Vec<FrameResult>,
    pub tracker: Tracker,
}

pub fn run(
    executor: &dyn PipelineExecutor,
    source: impl FrameSource + 'static,
    factory: &(dyn Fn() -> Result<Box<dyn FaceDetector>, DetectError> + Send + Sync),
    settings: &PipelineSettings,
) -> Run {
    let config = PipelineConfig::from_settings(settings, Default::default());
    let mut tracker = Tracker::new(TrackerConfig::from_settings(settings));
    let mut results: Vec<FrameResult> = Vec::new();
    let outcome = executor.execute(
        Box::new(source),
        &factory,
        &mut tracker,
        &mut results,
        &config,
        &mut NullPipelineLogger,
    );
    Run {
        outcome,
        results,
        tracker,
    }
}
