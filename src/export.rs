//! Encoding crops for upload and for in-app preview.

use base64::{Engine as _, engine::general_purpose};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ExtendedColorType, ImageEncoder};

use crate::config::{ExportConfig, ExportFormat};
use crate::crop::CroppedImage;
use crate::error::CropError;

/// Encoded crop plus its metadata, built once per submit.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPayload {
    bytes: Vec<u8>,
    mime: &'static str,
    file_name: String,
    test_type: String,
}

impl UploadPayload {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime(&self) -> &'static str {
        self.mime
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn test_type(&self) -> &str {
        &self.test_type
    }

    pub fn into_parts(self) -> (Vec<u8>, &'static str, String, String) {
        (self.bytes, self.mime, self.file_name, self.test_type)
    }
}

#[derive(Debug, Default)]
pub struct Exporter {
    config: ExportConfig,
}

impl Exporter {
    pub fn new(config: ExportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    pub fn encode(&self, image: &CroppedImage) -> Result<Vec<u8>, CropError> {
        let pixels = image.pixels();
        let (width, height) = pixels.dimensions();
        let mut buffer = Vec::new();

        match self.config.format {
            // lossless; quality does not apply
            ExportFormat::Png => {
                PngEncoder::new_with_quality(&mut buffer, CompressionType::Default, FilterType::Adaptive)
                    .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgba8)
                    .map_err(|e| CropError::Encode(e.to_string()))?;
            }
            ExportFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(pixels.clone()).to_rgb8();
                JpegEncoder::new_with_quality(&mut buffer, self.config.quality.clamp(1, 100))
                    .write_image(rgb.as_raw(), width, height, ExtendedColorType::Rgb8)
                    .map_err(|e| CropError::Encode(e.to_string()))?;
            }
        }

        log::debug!(
            "encoded {}x{} crop as {} ({} bytes)",
            width,
            height,
            self.config.format,
            buffer.len()
        );
        Ok(buffer)
    }

    pub fn payload(&self, image: &CroppedImage, test_type: &str) -> Result<UploadPayload, CropError> {
        let bytes = self.encode(image)?;
        Ok(UploadPayload {
            bytes,
            mime: self.config.format.mime(),
            file_name: format!("cropped.{}", self.config.format.extension()),
            test_type: test_type.to_string(),
        })
    }

    pub fn to_data_url(&self, image: &CroppedImage) -> Result<String, CropError> {
        let bytes = self.encode(image)?;
        Ok(format!(
            "data:{};base64,{}",
            self.config.format.mime(),
            general_purpose::STANDARD.encode(bytes)
        ))
    }
}

/// Parses a `data:<mime>;base64,<payload>` string back into pixels.
pub fn decode_data_url(data_url: &str) -> Result<CroppedImage, CropError> {
    let (header, body) = data_url
        .split_once(',')
        .ok_or_else(|| CropError::Decode("data URL has no payload".to_string()))?;

    let meta = header
        .strip_prefix("data:")
        .ok_or_else(|| CropError::Decode("not a data URL".to_string()))?;
    let (mime, encoding) = meta.split_once(';').unwrap_or((meta, ""));
    if encoding != "base64" {
        return Err(CropError::Decode(format!("unsupported data URL encoding {encoding:?}")));
    }
    if !mime.starts_with("image/") {
        return Err(CropError::Decode(format!("data URL holds {mime:?}, not an image")));
    }

    let bytes = general_purpose::STANDARD
        .decode(body.trim())
        .map_err(|e| CropError::Decode(format!("invalid base64: {e}")))?;
    let decoded = image::load_from_memory(&bytes).map_err(|e| CropError::Decode(e.to_string()))?;

    Ok(CroppedImage::new(decoded.to_rgba8()))
}
