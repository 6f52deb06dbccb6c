pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";

pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.5;
pub const DEFAULT_IOU_THRESHOLD: f64 = 0.45;

/// Pairings whose `1 - IoU` exceeds this are forbidden (IoU below 0.3).
pub const DEFAULT_MATCH_DISTANCE_CUTOFF: f64 = 0.7;

/// Weight given to the new observation when smoothing a track's box.
pub const DEFAULT_SMOOTHING_FACTOR: f64 = 0.7;

pub const DEFAULT_CONFIRM_MATCH_COUNT: usize = 3;
pub const DEFAULT_MISS_GRACE_LIMIT: usize = 5;
pub const DEFAULT_LOST_TRACK_TTL: usize = 5;
/// Misses a tentative track may take before it is dropped as a false positive.
pub const DEFAULT_TENTATIVE_MISS_LIMIT: usize = 0;

pub const DEFAULT_QUEUE_CAPACITY: usize = 4;
pub const DEFAULT_WORKER_POOL_SIZE: usize = 2;

/// Nominal frame rate for sources that carry no timing (image sequences).
pub const DEFAULT_SEQUENCE_FPS: f64 = 30.0;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
