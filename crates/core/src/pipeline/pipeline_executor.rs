use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::detection::domain::detection_filter::DetectionFilter;
use crate::detection::domain::face_detector::DetectorFactory;
use crate::shared::settings::{FrameDropPolicy, PipelineSettings};
use crate::tracking::domain::tracker::Tracker;
use crate::video::domain::frame_source::FrameSource;

use super::pipeline_error::PipelineError;
use super::pipeline_logger::PipelineLogger;
use super::pipeline_report::PipelineReport;
use super::result_sink::ResultSink;

/// Configuration for a pipeline execution run.
pub struct PipelineConfig {
    pub filter: DetectionFilter,
    pub queue_capacity: usize,
    pub worker_pool_size: usize,
    pub frame_drop_policy: FrameDropPolicy,
    pub cancelled: Arc<AtomicBool>,
}

impl PipelineConfig {
    pub fn from_settings(settings: &PipelineSettings, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            filter: DetectionFilter::from_settings(settings),
            queue_capacity: settings.queue_capacity,
            worker_pool_size: settings.worker_pool_size,
            frame_drop_policy: settings.frame_drop_policy,
            cancelled,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from_settings(
            &PipelineSettings::default(),
            Arc::new(AtomicBool::new(false)),
        )
    }
}

/// Abstracts how the read → detect → filter → track → emit pipeline is
/// executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations (threaded, sequential). Implementations emit
/// results in strictly increasing sequence order and close the source
/// before returning.
pub trait PipelineExecutor: Send {
    fn execute(
        &self,
        source: Box<dyn FrameSource>,
        detectors: &dyn DetectorFactory,
        tracker: &mut Tracker,
        sink: &mut dyn ResultSink,
        config: &PipelineConfig,
        logger: &mut dyn PipelineLogger,
    ) -> Result<PipelineReport, PipelineError>;
}
