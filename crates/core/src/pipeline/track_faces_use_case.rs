use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::face_detector::DetectorFactory;
use crate::shared::settings::PipelineSettings;
use crate::tracking::domain::tracker::{Tracker, TrackerConfig};
use crate::video::domain::frame_source::FrameSource;

use super::pipeline_error::PipelineError;
use super::pipeline_executor::{PipelineConfig, PipelineExecutor};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};
use super::pipeline_report::PipelineReport;
use super::result_sink::ResultSink;

/// Orchestrates face tracking over one stream.
///
/// Wires domain components together and delegates execution to a
/// `PipelineExecutor`. This is a single-use struct: `execute` consumes the
/// source, so calling it twice fails with `AlreadyExecuted`. The tracker
/// stays available afterwards for inspection.
pub struct TrackFacesUseCase {
    source: Option<Box<dyn FrameSource>>,
    detectors: Box<dyn DetectorFactory>,
    tracker: Tracker,
    executor: Box<dyn PipelineExecutor>,
    config: PipelineConfig,
    logger: Box<dyn PipelineLogger>,
}

impl TrackFacesUseCase {
    pub fn new(
        source: Box<dyn FrameSource>,
        detectors: Box<dyn DetectorFactory>,
        executor: Box<dyn PipelineExecutor>,
        settings: &PipelineSettings,
        logger: Option<Box<dyn PipelineLogger>>,
        cancelled: Option<Arc<AtomicBool>>,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        let cancelled = cancelled.unwrap_or_else(|| Arc::new(AtomicBool::new(false)));
        Ok(Self {
            source: Some(source),
            detectors,
            tracker: Tracker::new(TrackerConfig::from_settings(settings)),
            executor,
            config: PipelineConfig::from_settings(settings, cancelled),
            logger: logger.unwrap_or_else(|| Box::new(NullPipelineLogger)),
        })
    }

    /// Setting the returned flag stops a running `execute`.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.config.cancelled.clone()
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn execute(&mut self, sink: &mut dyn ResultSink) -> Result<PipelineReport, PipelineError> {
        let source = self.source.take().ok_or(PipelineError::AlreadyExecuted)?;
        let result = self.executor.execute(
            source,
            self.detectors.as_ref(),
            &mut self.tracker,
            sink,
            &self.config,
            self.logger.as_mut(),
        );
        self.logger.summary();
        result
    }
}
