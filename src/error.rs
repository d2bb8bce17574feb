//! Error types for the crop engine and the upload collaborator.
//!
//! Every variant renders a message that can be shown to the user as-is.

use crate::notice::{Notice, NoticeLevel};

#[derive(Debug, thiserror::Error)]
pub enum CropError {
    #[error("Unsupported file type: {mime}. Please select a {allowed} image.")]
    UnsupportedType { mime: String, allowed: String },

    #[error("File too large: {size_mb:.1}MB. Maximum size is {limit_mb:.0}MB.")]
    SizeExceeded { size_mb: f64, limit_mb: f64 },

    #[error("Could not read {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Error loading image: {0}. Please try a different file.")]
    Decode(String),

    #[error("Please select an area to crop first.")]
    NoSelection,

    #[error("Please select a larger area to crop (selected {width}x{height}, minimum {min}x{min}).")]
    CropTooSmall { width: u32, height: u32, min: u32 },

    #[error("Error encoding cropped image: {0}")]
    Encode(String),
}

impl CropError {
    pub(crate) fn size_exceeded(size: u64, limit: u64) -> Self {
        Self::SizeExceeded {
            size_mb: size as f64 / 1024.0 / 1024.0,
            limit_mb: limit as f64 / 1024.0 / 1024.0,
        }
    }

    /// Whether the session kept its selection after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CropTooSmall { .. } | Self::Encode(_))
    }

    pub fn notice(&self) -> Notice {
        let level = match self {
            Self::NoSelection | Self::CropTooSmall { .. } => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        Notice::new(level, self.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Analysis failed. Request timed out. Please check your connection and try again.")]
    Timeout,

    #[error("Analysis failed. Backend unreachable at {0}.")]
    Unreachable(String),

    #[error("Analysis failed. Network error: {0}")]
    Network(String),

    #[error("Analysis failed. Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Analysis failed. {0}")]
    Rejected(String),

    #[error("Analysis failed. Unexpected response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Encode(#[from] CropError),
}

impl UploadError {
    pub fn notice(&self) -> Notice {
        match self {
            Self::Encode(inner) => inner.notice(),
            _ => Notice::new(NoticeLevel::Error, self.to_string()),
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_connect() {
            let target = error
                .url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "the configured address".to_string());
            Self::Unreachable(target)
        } else if error.is_decode() {
            Self::InvalidResponse(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}
