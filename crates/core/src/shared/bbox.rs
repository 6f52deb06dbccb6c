use serde::{Deserialize, Serialize};

/// Axis-aligned box in pixel coordinates: top-left corner plus size.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a box from corner coordinates `[x1, y1, x2, y2]`.
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1)
    }

    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    pub fn to_xyxy(&self) -> [f64; 4] {
        [self.x, self.y, self.x + self.width, self.y + self.height]
    }

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn area(&self) -> f64 {
        if self.is_degenerate() {
            0.0
        } else {
            self.width * self.height
        }
    }

    /// Non-finite coordinates or a non-positive side.
    pub fn is_degenerate(&self) -> bool {
        !(self.x.is_finite() && self.y.is_finite())
            || !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Component-wise blend: `alpha * other + (1 - alpha) * self`.
    pub fn blend(&self, other: &BoundingBox, alpha: f64) -> Self {
        let mix = |a: f64, b: f64| alpha * b + (1.0 - alpha) * a;
        Self::new(
            mix(self.x, other.x),
            mix(self.y, other.y),
            mix(self.width, other.width),
            mix(self.height, other.height),
        )
    }

    /// Clips the box to `[0, width] x [0, height]`.
    pub fn clamp_to(&self, frame_width: f64, frame_height: f64) -> Self {
        let [x1, y1, x2, y2] = self.to_xyxy();
        Self::from_xyxy(
            x1.clamp(0.0, frame_width),
            y1.clamp(0.0, frame_height),
            x2.clamp(0.0, frame_width),
            y2.clamp(0.0, frame_height),
        )
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        if self.is_degenerate() || other.is_degenerate() {
            return 0.0;
        }
        let [ax1, ay1, ax2, ay2] = self.to_xyxy();
        let [bx1, by1, bx2, by2] = other.to_xyxy();

        let inter = (ax2.min(bx2) - ax1.max(bx1)).max(0.0) * (ay2.min(by2) - ay1.max(by1)).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }
}
