//! The single-threaded, strictly ordered half of the pipeline:
//! filter → tracker → aggregator → sink.

use std::time::Instant;

use crate::detection::domain::detection_filter::DetectionFilter;
use crate::tracking::domain::lifecycle::LifecycleEvent;
use crate::tracking::domain::tracker::Tracker;

use super::detect_stage::{DetectedFrame, DetectionOutcome};
use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::pipeline_report::PipelineReport;
use super::result_aggregator::ResultAggregator;
use super::result_sink::ResultSink;

/// Consumes detected frames in sequence order. Owns the report for the run.
pub struct TrackingStage<'a> {
    filter: &'a DetectionFilter,
    tracker: &'a mut Tracker,
    sink: &'a mut dyn ResultSink,
    aggregator: ResultAggregator,
    report: PipelineReport,
    total_frames: Option<usize>,
    handled: usize,
}

impl<'a> TrackingStage<'a> {
    pub fn new(
        filter: &'a DetectionFilter,
        tracker: &'a mut Tracker,
        sink: &'a mut dyn ResultSink,
        total_frames: Option<usize>,
    ) -> Self {
        Self {
            filter,
            tracker,
            sink,
            aggregator: ResultAggregator,
            report: PipelineReport::default(),
            total_frames,
            handled: 0,
        }
    }

    pub fn report_mut(&mut self) -> &mut PipelineReport {
        &mut self.report
    }

    /// A frame the drop policy discarded before detection.
    pub fn record_dropped(&mut self, sequence: u64, logger: &mut dyn PipelineLogger) {
        log::debug!("Frame {sequence} dropped: detector queue full");
        self.report.frames_dropped += 1;
        self.advance_progress(logger);
    }

    /// Filters, tracks and emits one frame. Only fatal errors are returned.
    pub fn process(
        &mut self,
        detected: DetectedFrame,
        logger: &mut dyn PipelineLogger,
    ) -> Result<(), PipelineError> {
        let DetectedFrame {
            sequence,
            timestamp,
            outcome,
            detect_ms,
        } = detected;

        let detections = match outcome {
            DetectionOutcome::Detected {
                detections,
                retried,
            } => {
                if retried {
                    self.report.inference_retries += 1;
                }
                detections
            }
            DetectionOutcome::Failed(err) => {
                log::warn!("{err}; treating frame as empty");
                self.report.inference_retries += 1;
                self.report.inference_failures += 1;
                Vec::new()
            }
            DetectionOutcome::Skipped(err) => {
                log::warn!("Skipping frame: {err}");
                self.report.frames_skipped += 1;
                self.advance_progress(logger);
                return Ok(());
            }
        };
        logger.timing("detect", detect_ms);

        let t = Instant::now();
        let filtered = self.filter.apply(detections);
        logger.timing("filter", t.elapsed().as_secs_f64() * 1000.0);

        let t = Instant::now();
        let events = self.tracker.update(&filtered)?;
        logger.timing("track", t.elapsed().as_secs_f64() * 1000.0);
        self.log_events(sequence, &events);

        let result = self.aggregator.aggregate(
            sequence,
            timestamp,
            self.tracker.tracks(),
            self.tracker.lifecycle(),
        );
        self.report.peak_concurrent_tracks =
            self.report.peak_concurrent_tracks.max(result.tracks.len());
        logger.metric("live_tracks", self.tracker.tracks().len() as f64);

        self.sink.emit(result)?;
        self.report.results_emitted += 1;
        self.advance_progress(logger);
        Ok(())
    }

    /// Flushes the sink and hands back the report.
    pub fn finish(self) -> Result<PipelineReport, PipelineError> {
        self.sink.finish()?;
        Ok(self.report)
    }

    /// Best-effort flush on a failing run; the original error wins.
    pub fn abort(self) {
        if let Err(e) = self.sink.finish() {
            log::warn!("Failed to flush results after pipeline error: {e}");
        }
    }

    fn advance_progress(&mut self, logger: &mut dyn PipelineLogger) {
        self.handled += 1;
        logger.progress(self.handled, self.total_frames);
    }

    fn log_events(&mut self, sequence: u64, events: &[LifecycleEvent]) {
        for event in events {
            match *event {
                LifecycleEvent::Confirmed(id) => {
                    self.report.unique_confirmed_tracks += 1;
                    log::info!("Face {id} confirmed at frame {sequence}");
                }
                LifecycleEvent::Resurrected(id) => {
                    log::info!("Face {id} reacquired at frame {sequence}");
                }
                LifecycleEvent::Lost(id) => log::debug!("Face {id} lost at frame {sequence}"),
                LifecycleEvent::Removed(id) => {
                    log::debug!("Track {id} removed at frame {sequence}")
                }
                LifecycleEvent::Created(id) => {
                    log::debug!("Track {id} created at frame {sequence}")
                }
            }
        }
    }
}
