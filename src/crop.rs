use image::{RgbaImage, imageops};

use crate::error::CropError;
use crate::selection::{BoundingBox, PixelRect};

/// Crops smaller than this on either side are rejected.
pub const MIN_CROP_SIDE: u32 = 10;

/// A standalone copy of a canvas region, one pixel per backing pixel.
#[derive(Clone, Debug, PartialEq)]
pub struct CroppedImage {
    pixels: RgbaImage,
}

impl CroppedImage {
    pub fn new(pixels: RgbaImage) -> Self {
        Self { pixels }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

#[derive(Debug)]
pub struct CropExtractor {
    min_side: u32,
}

impl Default for CropExtractor {
    fn default() -> Self {
        Self {
            min_side: MIN_CROP_SIDE,
        }
    }
}

impl CropExtractor {
    pub fn with_min_side(min_side: u32) -> Self {
        Self { min_side }
    }

    /// Clamps `selection` to the canvas and copies that block out, unscaled.
    pub fn extract(&self, canvas: &RgbaImage, selection: BoundingBox) -> Result<CroppedImage, CropError> {
        let rect = selection.clamp_to(canvas.width(), canvas.height());
        self.check_size(rect)?;

        let pixels = imageops::crop_imm(canvas, rect.x, rect.y, rect.width, rect.height).to_image();
        debug_assert_eq!(pixels.dimensions(), (rect.width, rect.height));
        log::info!(
            "cropped {}x{} at ({}, {}) from {}x{} canvas",
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            canvas.width(),
            canvas.height()
        );

        Ok(CroppedImage { pixels })
    }

    fn check_size(&self, rect: PixelRect) -> Result<(), CropError> {
        if rect.width < self.min_side || rect.height < self.min_side {
            return Err(CropError::CropTooSmall {
                width: rect.width,
                height: rect.height,
                min: self.min_side,
            });
        }
        Ok(())
    }
}
