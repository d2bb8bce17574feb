use crate::config::DisplayBounds;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Size of the canvas as currently laid out on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CssBox {
    pub width: f32,
    pub height: f32,
}

impl CssBox {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Zero or non-finite boxes show up mid-layout.
    pub fn is_ready(&self) -> bool {
        self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0
    }

    pub(crate) fn approx_eq(&self, other: &CssBox) -> bool {
        const EPS: f32 = 0.5;
        (self.width - other.width).abs() < EPS && (self.height - other.height).abs() < EPS
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleFactors {
    pub x: f32,
    pub y: f32,
}

/// The backing store of the canvas: one pixel per logical render pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Viewport {
    pub backing_width: u32,
    pub backing_height: u32,
}

impl Viewport {
    /// Fits a `natural_width × natural_height` bitmap into `bounds`, preserving aspect
    /// ratio and never upscaling.
    pub fn fit(natural_width: u32, natural_height: u32, bounds: DisplayBounds) -> Self {
        let nw = natural_width.max(1) as f64;
        let nh = natural_height.max(1) as f64;
        let factor = (bounds.max_width as f64 / nw)
            .min(bounds.max_height as f64 / nh)
            .min(1.0);

        Self {
            backing_width: ((nw * factor).floor() as u32).max(1),
            backing_height: ((nh * factor).floor() as u32).max(1),
        }
    }

    /// Fresh factors for the given layout; `None` while the box is not laid out.
    pub fn scale_factors(&self, css: CssBox) -> Option<ScaleFactors> {
        if !css.is_ready() {
            return None;
        }
        Some(ScaleFactors {
            x: self.backing_width as f32 / css.width,
            y: self.backing_height as f32 / css.height,
        })
    }

    pub fn to_backing_coords(&self, css_pos: Point, css: CssBox) -> Option<Point> {
        let scale = self.scale_factors(css)?;
        Some(Point::new(css_pos.x * scale.x, css_pos.y * scale.y))
    }

    /// On-screen box for this canvas inside `available`, shrinking but never growing.
    pub fn css_box_within(&self, available_width: f32, available_height: f32) -> CssBox {
        let w = self.backing_width as f32;
        let h = self.backing_height as f32;
        let scale = (available_width / w).min(available_height / h).min(1.0).max(0.0);
        CssBox::new(w * scale, h * scale)
    }
}
