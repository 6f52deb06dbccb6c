//! Frame → NCHW float tensor preprocessing shared by the ONNX detectors.

use crate::detection::domain::face_detector::rgb_channel_order;
use crate::shared::frame::Frame;

/// YOLO convention for the padding colour.
const PAD_VALUE: f32 = 114.0 / 255.0;

/// A letterboxed model input plus the transform back to frame pixels.
pub struct Letterbox {
    pub tensor: ndarray::Array4<f32>,
    pub scale: f64,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Letterbox {
    /// Maps a point in model-input space back to original frame coordinates.
    pub fn to_frame(&self, x: f64, y: f64) -> (f64, f64) {
        (
            (x - self.pad_x as f64) / self.scale,
            (y - self.pad_y as f64) / self.scale,
        )
    }
}

/// Letterbox-resize a frame to `target_size` × `target_size`, preserving
/// aspect ratio and normalizing to `[0, 1]` RGB.
pub fn letterbox(frame: &Frame, target_size: u32) -> Letterbox {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let mut tensor = ndarray::Array4::<f32>::from_elem(
        (1, 3, target_size as usize, target_size as usize),
        PAD_VALUE,
    );

    let src = frame.as_ndarray(); // [H, W, C] u8
    let order = rgb_channel_order(frame.format());
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize + copy into padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for (c, &sc) in order.iter().enumerate() {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    Letterbox {
        tensor,
        scale,
        pad_x,
        pad_y,
    }
}

/// Stretch-resize to `size × size` (no padding), normalized to `[0, 1]` RGB.
pub fn resize_normalized(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let order = rgb_channel_order(frame.format());
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));
    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for (c, &sc) in order.iter().enumerate() {
                tensor[[0, c, y, x]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::frame::PixelFormat;
    use approx::assert_relative_eq;

    #[test]
    fn test_letterbox_preserves_aspect_ratio() {
        // 200x100 → 640: scale 3.2, new 640x320, pad_y 160
        let frame = Frame::rgb(vec![128u8; 200 * 100 * 3], 200, 100, 0, 0.0);
        let lb = letterbox(&frame, 640);

        assert_eq!(lb.tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(lb.scale, 3.2);
        assert_eq!(lb.pad_x, 0);
        assert_eq!(lb.pad_y, 160);
    }

    #[test]
    fn test_letterbox_values_normalized_and_padded() {
        let frame = Frame::rgb(vec![255u8; 100 * 50 * 3], 100, 50, 0, 0.0);
        let lb = letterbox(&frame, 640);

        let y = lb.pad_y as usize + 1;
        let x = lb.pad_x as usize + 1;
        assert!((lb.tensor[[0, 0, y, x]] - 1.0).abs() < 0.01);
        assert!((lb.tensor[[0, 0, 0, 0]] - PAD_VALUE).abs() < 0.01);
    }

    #[test]
    fn test_to_frame_inverts_transform() {
        let frame = Frame::rgb(vec![0u8; 200 * 100 * 3], 200, 100, 0, 0.0);
        let lb = letterbox(&frame, 640);
        // Frame point (50, 25) lands at (160, 160 + 80) in model space
        let (x, y) = lb.to_frame(160.0, 240.0);
        assert_relative_eq!(x, 50.0);
        assert_relative_eq!(y, 25.0);
    }

    #[test]
    fn test_bgr_frames_are_swapped_to_rgb() {
        // One BGR pixel: B=10, G=20, R=30
        let frame = Frame::new(vec![10, 20, 30], 1, 1, PixelFormat::Bgr24, 0, 0.0);
        let t = resize_normalized(&frame, 2);
        assert_relative_eq!(t[[0, 0, 0, 0]], 30.0 / 255.0);
        assert_relative_eq!(t[[0, 1, 0, 0]], 20.0 / 255.0);
        assert_relative_eq!(t[[0, 2, 0, 0]], 10.0 / 255.0);
    }

    #[test]
    fn test_resize_shape() {
        let frame = Frame::rgb(vec![128u8; 200 * 100 * 3], 200, 100, 0, 0.0);
        assert_eq!(resize_normalized(&frame, 128).shape(), &[1, 3, 128, 128]);
    }
}
