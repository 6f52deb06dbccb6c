use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::detection::domain::face_detector::DetectorFactory;
use crate::pipeline::detect_stage::detect_frame;
use crate::pipeline::pipeline_error::PipelineError;
use crate::pipeline::pipeline_executor::{PipelineConfig, PipelineExecutor};
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::pipeline::pipeline_report::PipelineReport;
use crate::pipeline::result_sink::ResultSink;
use crate::pipeline::tracking_stage::TrackingStage;
use crate::tracking::domain::tracker::Tracker;
use crate::video::domain::frame_source::{FrameSource, SourceError};

/// How long one wait on the source lasts before the stop signal is checked.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Runs every stage on the calling thread, one frame at a time.
///
/// There is no queue, so the source is naturally paced by the detector and
/// `frame_drop_policy` never applies. Useful for deterministic replays and
/// debugging.
#[derive(Default)]
pub struct SequentialPipelineExecutor;

impl SequentialPipelineExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineExecutor for SequentialPipelineExecutor {
    fn execute(
        &self,
        mut source: Box<dyn FrameSource>,
        detectors: &dyn DetectorFactory,
        tracker: &mut Tracker,
        sink: &mut dyn ResultSink,
        config: &PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PipelineReport, PipelineError> {
        let mut detector = match detectors.create() {
            Ok(d) => d,
            Err(e) => {
                source.close();
                return Err(PipelineError::Detector(e.to_string()));
            }
        };
        let total = source.metadata().total_frames;
        let mut stage = TrackingStage::new(&config.filter, tracker, sink, total);

        let outcome = loop {
            if config.cancelled.load(Ordering::Relaxed) {
                stage.report_mut().cancelled = true;
                break Ok(());
            }
            let frame = match source.poll_frame(POLL_INTERVAL) {
                Ok(Some(frame)) => frame,
                Ok(None) => continue,
                Err(SourceError::Exhausted) => break Ok(()),
                Err(SourceError::Unavailable(reason)) => {
                    break Err(PipelineError::SourceUnavailable(reason))
                }
            };
            stage.report_mut().frames_read += 1;

            let detected = detect_frame(detector.as_mut(), frame);
            if config.cancelled.load(Ordering::Relaxed) {
                stage.report_mut().cancelled = true;
                break Ok(());
            }
            if let Err(e) = stage.process(detected, logger) {
                break Err(e);
            }
        };
        source.close();

        match outcome {
            Ok(()) => stage.finish(),
            Err(e) => {
                stage.abort();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::detection::Detection;
    use crate::detection::domain::face_detector::{DetectError, FaceDetector};
    use crate::pipeline::frame_result::FrameResult;
    use crate::pipeline::pipeline_logger::NullPipelineLogger;
    use crate::shared::bbox::BoundingBox;
    use crate::shared::frame::Frame;
    use crate::shared::video_metadata::VideoMetadata;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    struct StubSource {
        frames: VecDeque<Result<Frame, SourceError>>,
        metadata: VideoMetadata,
        closed: Arc<Mutex<bool>>,
    }

    impl StubSource {
        fn new(frames: Vec<Result<Frame, SourceError>>) -> Self {
            Self {
                frames: frames.into(),
                metadata: VideoMetadata::unknown(),
                closed: Arc::new(Mutex::new(false)),
            }
        }
    }

    impl FrameSource for StubSource {
        fn metadata(&self) -> &VideoMetadata {
            &self.metadata
        }

        fn next_frame(&mut self) -> Result<Frame, SourceError> {
            self.frames.pop_front().unwrap_or(Err(SourceError::Exhausted))
        }

        fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    struct OneFace;

    impl FaceDetector for OneFace {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
            Ok(vec![Detection::new(BoundingBox::new(5.0, 5.0, 20.0, 20.0), 0.9)])
        }
    }

    fn one_face() -> Result<Box<dyn FaceDetector>, DetectError> {
        Ok(Box::new(OneFace))
    }

    fn frame(seq: u64) -> Result<Frame, SourceError> {
        Ok(Frame::rgb(vec![0u8; 32 * 32 * 3], 32, 32, seq, seq as f64 / 30.0))
    }

    #[test]
    fn test_processes_all_frames_in_order() {
        let source = StubSource::new((0..6).map(frame).collect());
        let closed = source.closed.clone();
        let mut tracker = Tracker::default();
        let mut results: Vec<FrameResult> = Vec::new();

        let report = SequentialPipelineExecutor::new()
            .execute(
                Box::new(source),
                &one_face,
                &mut tracker,
                &mut results,
                &PipelineConfig::default(),
                &mut NullPipelineLogger,
            )
            .unwrap();

        assert_eq!(report.frames_read, 6);
        assert_eq!(report.results_emitted, 6);
        let seqs: Vec<u64> = results.iter().map(|r| r.sequence_number).collect();
        assert_eq!(seqs, vec![0, 1, 2, 3, 4, 5]);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_unavailable_source_halts_after_processed_frames() {
        let source = StubSource::new(vec![
            frame(0),
            frame(1),
            Err(SourceError::Unavailable("camera unplugged".into())),
            frame(3),
        ]);
        let closed = source.closed.clone();
        let mut tracker = Tracker::default();
        let mut results: Vec<FrameResult> = Vec::new();

        let err = SequentialPipelineExecutor::new()
            .execute(
                Box::new(source),
                &one_face,
                &mut tracker,
                &mut results,
                &PipelineConfig::default(),
                &mut NullPipelineLogger,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::SourceUnavailable(ref r) if r == "camera unplugged"));
        assert_eq!(results.len(), 2);
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_detector_setup_failure_closes_source() {
        let source = StubSource::new(vec![frame(0)]);
        let closed = source.closed.clone();
        let failing = || -> Result<Box<dyn FaceDetector>, DetectError> {
            Err(DetectError::Inference("model missing".into()))
        };
        let mut tracker = Tracker::default();
        let mut results: Vec<FrameResult> = Vec::new();

        let err = SequentialPipelineExecutor::new()
            .execute(
                Box::new(source),
                &failing,
                &mut tracker,
                &mut results,
                &PipelineConfig::default(),
                &mut NullPipelineLogger,
            )
            .unwrap_err();

        assert!(matches!(err, PipelineError::Detector(_)));
        assert!(*closed.lock().unwrap());
    }

    #[test]
    fn test_pre_cancelled_run_emits_nothing() {
        let source = StubSource::new((0..3).map(frame).collect());
        let config = PipelineConfig {
            cancelled: Arc::new(AtomicBool::new(true)),
            ..PipelineConfig::default()
        };
        let mut tracker = Tracker::default();
        let mut results: Vec<FrameResult> = Vec::new();

        let report = SequentialPipelineExecutor::new()
            .execute(
                Box::new(source),
                &one_face,
                &mut tracker,
                &mut results,
                &config,
                &mut NullPipelineLogger,
            )
            .unwrap();

        assert!(report.cancelled);
        assert!(results.is_empty());
    }
}
