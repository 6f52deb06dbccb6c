use thiserror::Error;

use crate::shared::frame::{Frame, PixelFormat};

use super::detection::Detection;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DetectError {
    /// The frame cannot be fed to the model (empty, wrong layout).
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    /// The model failed to run or produced unusable output.
    #[error("inference failed: {0}")]
    Inference(String),
}

/// Domain interface for face detection.
///
/// Detectors carry no temporal memory; identity across frames is the
/// tracker's job. `&mut self` is only needed because inference sessions
/// require exclusive access while running.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectError>;
}

/// Builds one detector per pipeline worker.
pub trait DetectorFactory: Send + Sync {
    fn create(&self) -> Result<Box<dyn FaceDetector>, DetectError>;
}

impl<F> DetectorFactory for F
where
    F: Fn() -> Result<Box<dyn FaceDetector>, DetectError> + Send + Sync,
{
    fn create(&self) -> Result<Box<dyn FaceDetector>, DetectError> {
        self()
    }
}

/// Rejects frames a colour face model cannot consume.
pub fn validate_frame(frame: &Frame) -> Result<(), DetectError> {
    if frame.is_empty() {
        return Err(DetectError::InvalidFrame(format!(
            "frame {} has no pixels ({}x{})",
            frame.sequence(),
            frame.width(),
            frame.height()
        )));
    }
    if !frame.is_consistent() {
        return Err(DetectError::InvalidFrame(format!(
            "frame {} buffer holds {} bytes, expected {}x{}x{}",
            frame.sequence(),
            frame.data().len(),
            frame.width(),
            frame.height(),
            frame.channels()
        )));
    }
    match frame.format() {
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => Ok(()),
        other => Err(DetectError::InvalidFrame(format!(
            "frame {} has unsupported pixel format {other:?}",
            frame.sequence()
        ))),
    }
}

/// Channel order for reading RGB values out of a supported frame.
pub(crate) fn rgb_channel_order(format: PixelFormat) -> [usize; 3] {
    match format {
        PixelFormat::Bgr24 => [2, 1, 0],
        _ => [0, 1, 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDetector(usize);

    impl FaceDetector for FixedDetector {
        fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>, DetectError> {
            Ok(Vec::with_capacity(self.0))
        }
    }

    #[test]
    fn test_validate_accepts_rgb_and_bgr() {
        let rgb = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Rgb24, 0, 0.0);
        let bgr = Frame::new(vec![0u8; 12], 2, 2, PixelFormat::Bgr24, 1, 0.0);
        assert!(validate_frame(&rgb).is_ok());
        assert!(validate_frame(&bgr).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_frame() {
        let frame = Frame::rgb(Vec::new(), 0, 0, 7, 0.0);
        let err = validate_frame(&frame).unwrap_err();
        assert!(matches!(err, DetectError::InvalidFrame(ref msg) if msg.contains("frame 7")));
    }

    #[test]
    fn test_validate_rejects_buffer_shorter_than_geometry() {
        let frame = Frame::rgb(vec![0u8; 5], 2, 2, 3, 0.0);
        let err = validate_frame(&frame).unwrap_err();
        assert!(matches!(err, DetectError::InvalidFrame(ref msg) if msg.contains("5 bytes")));
    }

    #[test]
    fn test_validate_rejects_grayscale() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, PixelFormat::Gray8, 0, 0.0);
        assert!(matches!(
            validate_frame(&frame),
            Err(DetectError::InvalidFrame(_))
        ));
    }

    #[test]
    fn test_channel_order_swaps_bgr() {
        assert_eq!(rgb_channel_order(PixelFormat::Rgb24), [0, 1, 2]);
        assert_eq!(rgb_channel_order(PixelFormat::Bgr24), [2, 1, 0]);
    }

    #[test]
    fn test_closure_is_a_factory() {
        let factory = || -> Result<Box<dyn FaceDetector>, DetectError> {
            Ok(Box::new(FixedDetector(0)))
        };
        let mut detector = factory.create().unwrap();
        let frame = Frame::rgb(vec![0u8; 3], 1, 1, 0, 0.0);
        assert!(detector.detect(&frame).unwrap().is_empty());
    }
}
