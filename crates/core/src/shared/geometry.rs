/// A point in normalized image space (origin bottom-left, range 0..=1).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

/// Axis-aligned rectangle in normalized image space.
///
/// The origin is the bottom-left corner of the upright image and every
/// component is a fraction of the image size, so the same rect can be
/// projected onto any view regardless of its resolution.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NormalizedRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl NormalizedRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Builds a normalized rect from top-left-origin pixel corners, clamped
    /// to the image.
    pub fn from_pixel_corners(x1: f64, y1: f64, x2: f64, y2: f64, image_w: u32, image_h: u32) -> Self {
        let w = image_w.max(1) as f64;
        let h = image_h.max(1) as f64;
        let left = (x1 / w).clamp(0.0, 1.0);
        let right = (x2 / w).clamp(0.0, 1.0);
        let top = (y1 / h).clamp(0.0, 1.0);
        let bottom = (y2 / h).clamp(0.0, 1.0);
        Self {
            x: left,
            y: 1.0 - bottom,
            width: (right - left).max(0.0),
            height: (bottom - top).max(0.0),
        }
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn iou(&self, other: &NormalizedRect) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.max_x().min(other.max_x());
        let iy2 = self.max_y().min(other.max_y());

        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Projects onto a `view_w × view_h` view whose origin is top-left.
    pub fn to_view_rect(&self, view_w: u32, view_h: u32) -> ViewRect {
        let w = view_w as f64;
        let h = view_h as f64;
        ViewRect {
            x: self.x * w,
            y: (1.0 - self.y - self.height) * h,
            width: self.width * w,
            height: self.height * h,
        }
    }
}

/// Rectangle in view pixel coordinates (origin top-left).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl ViewRect {
    /// Integer pixel bounds `(x, y, width, height)` clipped to the view.
    /// `None` when nothing of the rect is visible.
    pub fn clip_to(&self, view_w: u32, view_h: u32) -> Option<(i32, i32, u32, u32)> {
        let x1 = self.x.round().max(0.0);
        let y1 = self.y.round().max(0.0);
        let x2 = (self.x + self.width).round().min(view_w as f64);
        let y2 = (self.y + self.height).round().min(view_h as f64);
        if x2 - x1 < 1.0 || y2 - y1 < 1.0 {
            return None;
        }
        Some((x1 as i32, y1 as i32, (x2 - x1) as u32, (y2 - y1) as u32))
    }
}
