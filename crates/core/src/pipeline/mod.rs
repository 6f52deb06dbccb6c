pub mod detect_stage;
pub mod frame_result;
pub mod infrastructure;
pub mod pipeline_error;
pub mod pipeline_executor;
pub mod pipeline_logger;
pub mod pipeline_report;
pub mod presence_heatmap;
pub mod result_aggregator;
pub mod result_sink;
pub mod track_faces_use_case;
pub mod tracking_stage;
