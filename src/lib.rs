//! Drag-to-select cropping of a displayed image, with export and upload of the crop.
//!
//! [`session::CropSession`] owns the whole pipeline: it loads an image into a bounded
//! canvas, maps pointer input from the on-screen box to canvas pixels, redraws the
//! dashed selection outline and extracts the confirmed region. [`app`] is the eframe
//! host around it.

pub mod app;
pub mod config;
pub mod crop;
pub mod error;
pub mod export;
pub mod loader;
pub mod notice;
pub mod pointer;
pub mod render;
pub mod selection;
pub mod session;
pub mod upload;
pub mod viewport;

pub use config::AppConfig;
pub use crop::{CropExtractor, CroppedImage, MIN_CROP_SIDE};
pub use error::{CropError, UploadError};
pub use export::{Exporter, UploadPayload, decode_data_url};
pub use loader::{ImageFile, ImageLoader, LoadTicket, SourceImage};
pub use pointer::{PointerEvent, PointerId, PointerPhase};
pub use selection::{BoundingBox, SelectionController, SelectionState, Transition};
pub use session::{CropSession, LoadOutcome};
pub use viewport::{CssBox, Point, Viewport};
