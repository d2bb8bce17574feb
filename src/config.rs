//! Runtime configuration.
//!
//! All tunable policy lives here: which files may be loaded, how large the canvas may
//! be drawn, how crops are encoded and where they are uploaded. `AppConfig::from_env`
//! overlays environment variables on the defaults; bad values fall back with a warning.

use std::fmt;
use std::time::Duration;

const MB: u64 = 1024 * 1024;

pub const ENV_BASE_URL: &str = "CROPPER_BASE_URL";
pub const ENV_UPLOAD_POLICY: &str = "CROPPER_UPLOAD_POLICY";
pub const ENV_EXPORT_FORMAT: &str = "CROPPER_EXPORT_FORMAT";
pub const ENV_UPLOAD_TIMEOUT: &str = "CROPPER_UPLOAD_TIMEOUT_SECS";

/// Which files the loader accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    /// Lower-case MIME types.
    pub allowed_mime_types: Vec<String>,
    /// Byte cap checked before decoding.
    pub max_file_size: u64,
}

impl UploadPolicy {
    pub fn strict() -> Self {
        Self {
            allowed_mime_types: ["image/jpeg", "image/jpg", "image/png"]
                .map(String::from)
                .to_vec(),
            max_file_size: 5 * MB,
        }
    }

    pub fn permissive() -> Self {
        Self {
            allowed_mime_types: [
                "image/png",
                "image/jpg",
                "image/jpeg",
                "image/gif",
                "image/bmp",
            ]
            .map(String::from)
            .to_vec(),
            max_file_size: 10 * MB,
        }
    }

    pub fn from_preset(preset: PolicyPreset) -> Self {
        match preset {
            PolicyPreset::Strict => Self::strict(),
            PolicyPreset::Permissive => Self::permissive(),
        }
    }

    pub fn allows(&self, mime: &str) -> bool {
        let mime = mime.trim().to_ascii_lowercase();
        self.allowed_mime_types.iter().any(|allowed| *allowed == mime)
    }

    /// Human-readable list for error messages, e.g. "PNG, JPG, JPEG".
    pub fn describe_allowed(&self) -> String {
        self.allowed_mime_types
            .iter()
            .map(|mime| mime.trim_start_matches("image/").to_ascii_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Extensions offered by the file picker.
    pub fn extensions(&self) -> Vec<&str> {
        self.allowed_mime_types
            .iter()
            .map(|mime| mime.trim_start_matches("image/"))
            .collect()
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::permissive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyPreset {
    Strict,
    Permissive,
}

impl PolicyPreset {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strict" => Some(Self::Strict),
            "permissive" => Some(Self::Permissive),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Permissive => "permissive",
        }
    }
}

/// Largest size the backing canvas is drawn at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayBounds {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for DisplayBounds {
    fn default() -> Self {
        Self {
            max_width: 1200,
            max_height: 800,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Png,
    Jpeg,
}

impl ExportFormat {
    pub fn mime(self) -> &'static str {
        match self {
            ExportFormat::Png => "image/png",
            ExportFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Png => "png",
            ExportFormat::Jpeg => "jpg",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportConfig {
    pub format: ExportFormat,
    /// 1-100. Only JPEG uses it; PNG is lossless.
    pub quality: u8,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Png,
            quality: 90,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl UploadConfig {
    pub fn endpoint(&self) -> String {
        join_url(&self.base_url, "/analyze")
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    pub policy: UploadPolicy,
    pub bounds: DisplayBounds,
    pub export: ExportConfig,
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_BASE_URL) {
            let url = url.trim();
            if url.starts_with("http://") || url.starts_with("https://") {
                config.upload.base_url = url.to_string();
            } else {
                log::warn!("{ENV_BASE_URL}={url:?} is not an http(s) URL, keeping default");
            }
        }

        if let Some(value) = lookup(ENV_UPLOAD_POLICY) {
            match PolicyPreset::parse(&value) {
                Some(preset) => config.policy = UploadPolicy::from_preset(preset),
                None => log::warn!(
                    "unknown {ENV_UPLOAD_POLICY}={value:?} (expected strict / permissive), keeping {}",
                    PolicyPreset::Permissive.as_str()
                ),
            }
        }

        if let Some(value) = lookup(ENV_EXPORT_FORMAT) {
            match ExportFormat::parse(&value) {
                Some(format) => config.export.format = format,
                None => log::warn!("unknown {ENV_EXPORT_FORMAT}={value:?}, keeping png"),
            }
        }

        if let Some(value) = lookup(ENV_UPLOAD_TIMEOUT) {
            match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.upload.timeout = Duration::from_secs(secs),
                _ => log::warn!("invalid {ENV_UPLOAD_TIMEOUT}={value:?}, keeping 30s"),
            }
        }

        config
    }
}
