//! One interactive crop session.
//!
//! Owns everything the widget mutates: the active source image and its backing canvas,
//! the selection controller, the rendered frame and the last confirmed crop. A load in
//! flight blocks pointer input, and starting one always drops the current selection so
//! no rectangle outlives the coordinate space it was drawn in.

use image::RgbaImage;
use image::imageops::FilterType;

use crate::config::{AppConfig, DisplayBounds};
use crate::crop::{CropExtractor, CroppedImage};
use crate::error::CropError;
use crate::export::{Exporter, UploadPayload};
use crate::loader::{ImageFile, ImageLoader, LoadTicket, SourceImage};
use crate::pointer::PointerEvent;
use crate::render::Renderer;
use crate::selection::{BoundingBox, SelectionController, SelectionState, Transition};
use crate::viewport::{CssBox, Viewport};

struct ActiveImage {
    source: SourceImage,
    viewport: Viewport,
    /// Source drawn at backing resolution; what crops copy from.
    canvas: RgbaImage,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Ready { natural: (u32, u32), backing: (u32, u32) },
    /// A newer load was started before this one finished.
    Superseded,
}

pub struct CropSession {
    loader: ImageLoader,
    bounds: DisplayBounds,
    renderer: Renderer,
    extractor: CropExtractor,
    controller: SelectionController,
    active: Option<ActiveImage>,
    frame: RgbaImage,
    frame_revision: u64,
    pending: Option<LoadTicket>,
    next_ticket: u64,
    confirmed: Option<CroppedImage>,
}

impl CropSession {
    pub fn new(config: &AppConfig) -> Self {
        Self::with_parts(
            ImageLoader::new(config.policy.clone()),
            config.bounds,
            Renderer::default(),
            CropExtractor::default(),
        )
    }

    pub fn with_parts(
        loader: ImageLoader,
        bounds: DisplayBounds,
        renderer: Renderer,
        extractor: CropExtractor,
    ) -> Self {
        Self {
            loader,
            bounds,
            renderer,
            extractor,
            controller: SelectionController::new(),
            active: None,
            frame: RgbaImage::new(0, 0),
            frame_revision: 0,
            pending: None,
            next_ticket: 0,
            confirmed: None,
        }
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub fn has_image(&self) -> bool {
        self.active.is_some()
    }

    pub fn source(&self) -> Option<&SourceImage> {
        self.active.as_ref().map(|active| &active.source)
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.active.as_ref().map(|active| active.viewport)
    }

    pub fn selection(&self) -> &SelectionState {
        self.controller.state()
    }

    pub fn confirmed(&self) -> Option<&CroppedImage> {
        self.confirmed.as_ref()
    }

    /// Current canvas contents, base image plus overlay.
    pub fn frame(&self) -> Option<&RgbaImage> {
        self.active.as_ref().map(|_| &self.frame)
    }

    /// Bumped on every redraw so hosts know when to re-upload the frame.
    pub fn frame_revision(&self) -> u64 {
        self.frame_revision
    }

    /// Validates `file` and opens a load. The selection is reset before returning, the
    /// current image stays visible until the decode lands.
    pub fn begin_load(&mut self, file: &ImageFile) -> Result<LoadTicket, CropError> {
        self.loader.validate(file)?;

        self.controller.reset();
        self.confirmed = None;
        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        if let Some(previous) = self.pending.replace(ticket) {
            log::debug!("load {:?} superseded by {:?}", previous, ticket);
        }
        self.redraw();

        log::info!(
            "loading {} ({}, {} bytes)",
            file.name,
            file.mime,
            file.declared_len
        );
        Ok(ticket)
    }

    /// Installs a finished decode. Failures keep the previous image.
    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        decoded: Result<SourceImage, CropError>,
    ) -> Result<LoadOutcome, CropError> {
        if self.pending != Some(ticket) {
            log::debug!("dropping stale decode result {:?}", ticket);
            return Ok(LoadOutcome::Superseded);
        }
        self.pending = None;

        let source = decoded?;
        let viewport = Viewport::fit(source.natural_width(), source.natural_height(), self.bounds);
        let canvas = source
            .image()
            .resize_exact(viewport.backing_width, viewport.backing_height, FilterType::Triangle)
            .to_rgba8();

        // a gesture may not have started while loading, but make sure
        self.controller.reset();
        self.confirmed = None;
        if let Some(previous) = self.active.take() {
            log::info!("released {}", previous.source.name());
        }

        let outcome = LoadOutcome::Ready {
            natural: (source.natural_width(), source.natural_height()),
            backing: (viewport.backing_width, viewport.backing_height),
        };
        log::info!(
            "{} ready: {}x{} shown at {}x{}",
            source.name(),
            source.natural_width(),
            source.natural_height(),
            viewport.backing_width,
            viewport.backing_height
        );
        self.active = Some(ActiveImage {
            source,
            viewport,
            canvas,
        });
        self.redraw();
        Ok(outcome)
    }

    /// Validate, decode and install on the calling thread.
    pub fn load_now(&mut self, file: &ImageFile) -> Result<LoadOutcome, CropError> {
        let ticket = self.begin_load(file)?;
        let decoded = ImageLoader::decode(&file.name, &file.bytes);
        self.finish_load(ticket, decoded)
    }

    pub fn handle_pointer(&mut self, event: PointerEvent, css_box: CssBox) -> Transition {
        if self.pending.is_some() {
            return Transition::NotReady;
        }
        let Some(viewport) = self.viewport() else {
            return Transition::NotReady;
        };

        let transition = self.controller.handle(event, &viewport, css_box);
        if transition == Transition::Started {
            self.confirmed = None;
        }
        if transition.needs_redraw() {
            self.redraw();
        }
        transition
    }

    /// Copies the finalized rectangle out of the canvas. On failure the selection stays
    /// as it was so the user can retry.
    pub fn crop(&mut self) -> Result<&CroppedImage, CropError> {
        let rect: BoundingBox = self.controller.finalized()?;
        let active = self.active.as_ref().ok_or(CropError::NoSelection)?;
        let cropped = self.extractor.extract(&active.canvas, rect)?;
        Ok(self.confirmed.insert(cropped))
    }

    /// Encodes the confirmed crop for upload. Consumes it: one payload per crop.
    pub fn take_payload(&mut self, exporter: &Exporter, test_type: &str) -> Result<UploadPayload, CropError> {
        let cropped = self.confirmed.as_ref().ok_or(CropError::NoSelection)?;
        let payload = exporter.payload(cropped, test_type)?;
        self.confirmed = None;
        log::info!(
            "built {} payload for {} ({} bytes)",
            payload.mime(),
            payload.test_type(),
            payload.bytes().len()
        );
        Ok(payload)
    }

    /// Drops the selection and any confirmed crop, keeping the image.
    pub fn reset_crop(&mut self) {
        self.controller.reset();
        self.confirmed = None;
        self.redraw();
    }

    /// Back to an empty session. Any in-flight load is abandoned.
    pub fn clear(&mut self) {
        self.controller.reset();
        self.confirmed = None;
        self.pending = None;
        if let Some(previous) = self.active.take() {
            log::info!("released {}", previous.source.name());
        }
        self.frame = RgbaImage::new(0, 0);
        self.frame_revision += 1;
    }

    fn redraw(&mut self) {
        if let Some(active) = &self.active {
            self.renderer
                .render_into(&mut self.frame, &active.canvas, self.controller.overlay());
            self.frame_revision += 1;
        }
    }
}
