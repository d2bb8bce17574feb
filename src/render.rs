//! Canvas redraw: base image plus the dashed selection outline.
//!
//! Every call repaints the whole frame from the base layer, so nothing from a previous
//! frame can survive into the next one.

use image::{Rgba, RgbaImage};

use crate::selection::BoundingBox;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlayStyle {
    pub color: Rgba<u8>,
    pub line_width: u32,
    pub dash: u32,
    pub gap: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            color: Rgba([0xe5, 0x3e, 0x3e, 0xff]),
            line_width: 3,
            dash: 8,
            gap: 4,
        }
    }
}

#[derive(Debug, Default)]
pub struct Renderer {
    style: OverlayStyle,
}

impl Renderer {
    pub fn render(&self, base: &RgbaImage, overlay: Option<BoundingBox>) -> RgbaImage {
        let mut frame = RgbaImage::new(base.width(), base.height());
        self.render_into(&mut frame, base, overlay);
        frame
    }

    /// Repaints `frame` in place, reallocating only when the base size changed.
    pub fn render_into(&self, frame: &mut RgbaImage, base: &RgbaImage, overlay: Option<BoundingBox>) {
        if frame.dimensions() != base.dimensions() {
            *frame = RgbaImage::new(base.width(), base.height());
        }
        frame.copy_from_slice(base);

        if let Some(rect) = overlay {
            self.stroke_dashed(frame, rect);
        }
    }

    fn stroke_dashed(&self, frame: &mut RgbaImage, rect: BoundingBox) {
        let x0 = rect.x.round() as i64;
        let y0 = rect.y.round() as i64;
        let x1 = (rect.x + rect.w).round() as i64;
        let y1 = (rect.y + rect.h).round() as i64;

        // clockwise from the top-left corner, dash phase carried across corners
        let edges = [
            ((x0, y0), (x1, y0)),
            ((x1, y0), (x1, y1)),
            ((x1, y1), (x0, y1)),
            ((x0, y1), (x0, y0)),
        ];
        let period = (self.style.dash + self.style.gap).max(1) as i64;
        let mut travelled: i64 = 0;

        for ((sx, sy), (ex, ey)) in edges {
            let len = (ex - sx).abs().max((ey - sy).abs());
            let dx = (ex - sx).signum();
            let dy = (ey - sy).signum();
            for step in 0..len {
                if (travelled + step) % period < self.style.dash as i64 {
                    self.stamp(frame, sx + dx * step, sy + dy * step);
                }
            }
            travelled += len;
        }
    }

    fn stamp(&self, frame: &mut RgbaImage, cx: i64, cy: i64) {
        let width = self.style.line_width.max(1) as i64;
        let start = -(width / 2);
        let (fw, fh) = (frame.width() as i64, frame.height() as i64);

        for oy in start..start + width {
            for ox in start..start + width {
                let (x, y) = (cx + ox, cy + oy);
                if x >= 0 && y >= 0 && x < fw && y < fh {
                    frame.put_pixel(x as u32, y as u32, self.style.color);
                }
            }
        }
    }
}
