pub mod bbox;
pub mod constants;
pub mod frame;
pub mod settings;
pub mod video_metadata;
