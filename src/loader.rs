//! File intake: policy checks before decoding, then decoding off the UI thread.

use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use image::{DynamicImage, GenericImageView};

use crate::config::UploadPolicy;
use crate::error::CropError;

/// Raw file as handed over by the picker or a drop.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    /// Declared MIME type; validated against the policy, never trusted for decoding.
    pub mime: String,
    pub declared_len: u64,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            declared_len: bytes.len() as u64,
            bytes,
        }
    }

    /// Reads a file from disk, refusing anything over the policy cap before reading it.
    pub fn from_path(path: &Path, policy: &UploadPolicy) -> Result<Self, CropError> {
        let unreadable = |e: std::io::Error| CropError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        };
        let metadata = std::fs::metadata(path).map_err(unreadable)?;
        if metadata.len() > policy.max_file_size {
            return Err(CropError::size_exceeded(metadata.len(), policy.max_file_size));
        }

        let bytes = std::fs::read(path).map_err(unreadable)?;
        let mime = mime_from_extension(path)
            .map(str::to_string)
            .or_else(|| infer::get(&bytes).map(|kind| kind.mime_type().to_string()))
            .unwrap_or_else(|| "application/octet-stream".to_string());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            name,
            mime,
            declared_len: metadata.len(),
            bytes,
        })
    }
}

fn mime_from_extension(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" => Some("image/jpg"),
        "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "webp" => Some("image/webp"),
        "tif" | "tiff" => Some("image/tiff"),
        _ => None,
    }
}

/// A decoded bitmap. Natural dimensions never change after decode.
#[derive(Debug, Clone)]
pub struct SourceImage {
    name: String,
    image: DynamicImage,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, image: DynamicImage) -> Self {
        Self {
            name: name.into(),
            image,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn natural_width(&self) -> u32 {
        self.image.width()
    }

    pub fn natural_height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &DynamicImage {
        &self.image
    }
}

/// Identifies one load request; only the newest ticket may install its image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoadTicket(pub(crate) u64);

pub type DecodeResult = (LoadTicket, Result<SourceImage, CropError>);

#[derive(Debug, Clone, Default)]
pub struct ImageLoader {
    policy: UploadPolicy,
}

impl ImageLoader {
    pub fn new(policy: UploadPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Type and size checks; never touches the pixel data.
    pub fn validate(&self, file: &ImageFile) -> Result<(), CropError> {
        if !self.policy.allows(&file.mime) {
            return Err(CropError::UnsupportedType {
                mime: file.mime.clone(),
                allowed: self.policy.describe_allowed(),
            });
        }

        let size = file.declared_len.max(file.bytes.len() as u64);
        if size > self.policy.max_file_size {
            return Err(CropError::size_exceeded(size, self.policy.max_file_size));
        }
        Ok(())
    }

    pub fn decode(name: &str, bytes: &[u8]) -> Result<SourceImage, CropError> {
        let image = image::load_from_memory(bytes).map_err(|e| CropError::Decode(e.to_string()))?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(CropError::Decode("image has no pixels".to_string()));
        }
        log::info!("decoded {name}: {width}x{height}");
        Ok(SourceImage::new(name, image))
    }

    /// Decodes on a worker thread; `notify` runs once the result is ready.
    pub fn spawn_decode<F>(ticket: LoadTicket, file: ImageFile, notify: F) -> DecodeJob
    where
        F: FnOnce() + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let result = Self::decode(&file.name, &file.bytes);
            if tx.send((ticket, result)).is_err() {
                log::debug!("decode of {} finished after its job was dropped", file.name);
            }
            notify();
        });
        DecodeJob { rx }
    }
}

/// Handle to an in-flight decode.
pub struct DecodeJob {
    rx: Receiver<DecodeResult>,
}

impl DecodeJob {
    /// Non-blocking; `Some` exactly once.
    pub fn poll(&self) -> Option<DecodeResult> {
        match self.rx.try_recv() {
            Ok(done) => Some(done),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => None,
        }
    }

    pub fn wait(self) -> Option<DecodeResult> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let image = RgbaImage::from_fn(width, height, |x, y| Rgba([x as u8, y as u8, 90, 255]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn rejects_type_outside_policy() {
        let loader = ImageLoader::new(UploadPolicy::strict());
        let file = ImageFile::new("anim.gif", "image/gif", vec![0; 16]);
        let err = loader.validate(&file).unwrap_err();
        assert!(matches!(err, CropError::UnsupportedType { .. }));
        assert!(err.to_string().contains("JPEG, JPG, PNG"));

        let permissive = ImageLoader::new(UploadPolicy::permissive());
        assert!(permissive.validate(&file).is_ok());
    }

    #[test]
    fn rejects_oversized_file_before_decoding() {
        let loader = ImageLoader::new(UploadPolicy::strict());
        let mut file = ImageFile::new("big.png", "image/png", Vec::new());
        file.declared_len = 5 * 1024 * 1024 + 1;
        assert!(matches!(
            loader.validate(&file),
            Err(CropError::SizeExceeded { .. })
        ));
        file.declared_len = 5 * 1024 * 1024;
        assert!(loader.validate(&file).is_ok());
    }

    #[test]
    fn decodes_natural_dimensions() {
        let source = ImageLoader::decode("strip.png", &png_bytes(64, 48)).unwrap();
        assert_eq!(source.natural_width(), 64);
        assert_eq!(source.natural_height(), 48);
        assert_eq!(source.name(), "strip.png");
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = ImageLoader::decode("broken.png", b"definitely not a png").unwrap_err();
        assert!(matches!(err, CropError::Decode(_)));
    }

    #[test]
    fn background_decode_reports_its_ticket() {
        let file = ImageFile::new("strip.png", "image/png", png_bytes(20, 10));
        let job = ImageLoader::spawn_decode(LoadTicket(7), file, || {});
        let (ticket, result) = job.wait().unwrap();
        assert_eq!(ticket, LoadTicket(7));
        assert_eq!(result.unwrap().natural_width(), 20);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("region-cropper-no-such-file.png");
        let err = ImageFile::from_path(&path, &UploadPolicy::default()).unwrap_err();
        assert!(matches!(err, CropError::Read { .. }));
        assert!(err.to_string().starts_with("Could not read"));
    }

    #[test]
    fn extension_decides_declared_mime() {
        assert_eq!(mime_from_extension(Path::new("a/B.JPG")), Some("image/jpg"));
        assert_eq!(mime_from_extension(Path::new("noext")), None);
    }
}
