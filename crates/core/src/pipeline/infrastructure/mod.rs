pub mod channel_result_sink;
pub mod json_lines_sink;
pub mod sequential_pipeline_executor;
pub mod threaded_pipeline_executor;
