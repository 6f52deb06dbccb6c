use std::path::PathBuf;

/// What a frame source knows about its stream before the first frame.
///
/// Live sources (capture devices, upload channels) report no frame count.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: Option<usize>,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}

impl VideoMetadata {
    /// Metadata for a stream whose geometry is only known per frame.
    pub fn unknown() -> Self {
        Self {
            width: 0,
            height: 0,
            fps: 0.0,
            total_frames: None,
            codec: String::new(),
            source_path: None,
        }
    }
}
