//! eframe host: file intake, the canvas widget, crop preview and upload.

use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::thread;

use eframe::egui;

use crate::config::AppConfig;
use crate::crop::CroppedImage;
use crate::error::{CropError, UploadError};
use crate::export::{Exporter, decode_data_url};
use crate::loader::{DecodeJob, ImageFile, ImageLoader};
use crate::notice::{Notice, NoticeLevel, Notices};
use crate::pointer::{CanvasGrab, PointerEvent, PointerPhase};
use crate::selection::SelectionState;
use crate::session::{CropSession, LoadOutcome};
use crate::upload::{AnalysisResponse, HttpUploader, ResultSummary, ResultTone, Uploader};
use crate::viewport::CssBox;

const PADDING: f32 = 20.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestType {
    Ph,
    Fob,
    Urinalysis,
}

impl TestType {
    pub fn as_str(self) -> &'static str {
        match self {
            TestType::Ph => "ph",
            TestType::Fob => "fob",
            TestType::Urinalysis => "urinalysis",
        }
    }

    pub fn available(self) -> bool {
        !matches!(self, TestType::Urinalysis)
    }
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestType::Ph => "pH Strip Analysis",
            TestType::Fob => "Fecal Occult Blood Test",
            TestType::Urinalysis => "Urinalysis",
        };
        write!(f, "{}", s)
    }
}

type UploadResult = (String, Result<AnalysisResponse, UploadError>);

pub struct RegionCropper {
    session: CropSession,
    exporter: Exporter,
    uploader: Option<Arc<dyn Uploader>>,
    test_type: TestType,
    canvas_texture: Option<egui::TextureHandle>,
    canvas_revision: u64,
    canvas_grab: CanvasGrab,
    preview: Option<CroppedImage>,
    preview_texture: Option<egui::TextureHandle>,
    decode_job: Option<DecodeJob>,
    upload_rx: Option<Receiver<UploadResult>>,
    result: Option<ResultSummary>,
    notices: Notices,
}

impl RegionCropper {
    pub fn new(_cc: &eframe::CreationContext<'_>, config: AppConfig) -> Self {
        Self::with_config(config)
    }

    fn with_config(config: AppConfig) -> Self {
        let mut notices = Notices::default();
        let uploader: Option<Arc<dyn Uploader>> = match HttpUploader::new(&config.upload) {
            Ok(uploader) => {
                log::info!("analysis endpoint: {}", uploader.endpoint());
                Some(Arc::new(uploader))
            }
            Err(err) => {
                log::error!("HTTP client unavailable: {err}");
                notices.push(err.notice());
                None
            }
        };

        Self {
            session: CropSession::new(&config),
            exporter: Exporter::new(config.export),
            uploader,
            test_type: TestType::Ph,
            canvas_texture: None,
            canvas_revision: 0,
            canvas_grab: CanvasGrab::default(),
            preview: None,
            preview_texture: None,
            decode_job: None,
            upload_rx: None,
            result: None,
            notices,
        }
    }

    fn open_dialog(&mut self, ctx: &egui::Context) {
        let policy = self.session.loader().policy();
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &policy.extensions())
            .pick_file()
        {
            self.open_path(ctx, &path);
        }
    }

    fn open_path(&mut self, ctx: &egui::Context, path: &Path) {
        match ImageFile::from_path(path, self.session.loader().policy()) {
            Ok(file) => self.start_load(ctx, file),
            Err(err) => self.notices.push(err.notice()),
        }
    }

    fn start_load(&mut self, ctx: &egui::Context, file: ImageFile) {
        match self.session.begin_load(&file) {
            Ok(ticket) => {
                self.clear_preview();
                self.forget_analysis();
                let repaint = ctx.clone();
                self.decode_job = Some(ImageLoader::spawn_decode(ticket, file, move || {
                    repaint.request_repaint()
                }));
            }
            Err(err) => self.notices.push(err.notice()),
        }
    }

    fn poll_jobs(&mut self) {
        if let Some(job) = &self.decode_job {
            if let Some((ticket, decoded)) = job.poll() {
                self.decode_job = None;
                match self.session.finish_load(ticket, decoded) {
                    Ok(LoadOutcome::Ready { .. }) => self
                        .notices
                        .push(Notice::success("Image uploaded successfully! Click and drag to crop.")),
                    Ok(LoadOutcome::Superseded) => {}
                    Err(err) => self.notices.push(err.notice()),
                }
            }
        }

        if let Some(rx) = &self.upload_rx {
            if let Ok((test_type, outcome)) = rx.try_recv() {
                self.upload_rx = None;
                match outcome {
                    Ok(response) => {
                        self.result = Some(ResultSummary::from_response(&test_type, &response));
                        self.notices.push(Notice::success(
                            "Analysis completed! Use Reset to start a new test.",
                        ));
                    }
                    Err(err) => {
                        self.result = None;
                        self.notices.push(err.notice());
                    }
                }
            }
        }
    }

    fn crop(&mut self, ctx: &egui::Context) {
        let outcome = self
            .session
            .crop()
            .and_then(|cropped| self.exporter.to_data_url(cropped))
            .and_then(|url| decode_data_url(&url));
        match outcome {
            Ok(preview) => {
                let texture = ctx.load_texture(
                    "crop-preview",
                    color_image(preview.pixels()),
                    egui::TextureOptions::LINEAR,
                );
                self.preview_texture = Some(texture);
                self.preview = Some(preview);
                self.notices.push(Notice::success("Image cropped successfully!"));
            }
            Err(err) => self.notices.push(err.notice()),
        }
    }

    fn reset_crop(&mut self) {
        if self.session.has_image() {
            self.session.reset_crop();
            self.clear_preview();
            self.notices.push(Notice::success("Crop reset successfully!"));
        }
    }

    fn new_image(&mut self, ctx: &egui::Context) {
        self.session.clear();
        self.decode_job = None;
        self.clear_preview();
        self.forget_analysis();
        self.notices.push(Notice::info("Select a new image to upload."));
        self.open_dialog(ctx);
    }

    fn save_crop(&mut self) {
        let Some(cropped) = self.session.confirmed() else {
            self.notices.push(CropError::NoSelection.notice());
            return;
        };
        let format = self.exporter.config().format;
        if let Some(path) = rfd::FileDialog::new()
            .add_filter("Image", &[format.extension()])
            .set_file_name(format!("cropped.{}", format.extension()))
            .save_file()
        {
            let written = self
                .exporter
                .encode(cropped)
                .and_then(|bytes| std::fs::write(&path, bytes).map_err(|e| CropError::Encode(e.to_string())));
            match written {
                Ok(()) => self.notices.push(Notice::success(format!("Saved {}", path.display()))),
                Err(err) => self.notices.push(err.notice()),
            }
        }
    }

    fn analyze(&mut self, ctx: &egui::Context) {
        if self.upload_rx.is_some() {
            return;
        }
        let Some(uploader) = self.uploader.clone() else {
            self.notices.push(Notice::new(NoticeLevel::Error, "Analysis is unavailable: no HTTP client."));
            return;
        };
        let test_type = self.test_type.as_str().to_string();
        let payload = match self.session.take_payload(&self.exporter, &test_type) {
            Ok(payload) => payload,
            Err(err) => {
                self.notices.push(err.notice());
                return;
            }
        };

        self.clear_preview();
        self.notices.push(Notice::info("Analyzing your image... This may take a few moments."));
        let (tx, rx) = mpsc::channel();
        let repaint = ctx.clone();
        thread::spawn(move || {
            let outcome = uploader.submit(payload);
            if tx.send((test_type, outcome)).is_err() {
                log::debug!("analysis finished after its image was replaced");
            }
            repaint.request_repaint();
        });
        self.upload_rx = Some(rx);
    }

    /// Drops the shown result and detaches any analysis still running for the old image.
    fn forget_analysis(&mut self) {
        self.result = None;
        if self.upload_rx.take().is_some() {
            log::info!("discarding in-flight analysis");
        }
    }

    fn clear_preview(&mut self) {
        self.preview = None;
        self.preview_texture = None;
    }

    fn handle_shortcuts(&mut self, ctx: &egui::Context) {
        let (open, new, reset, crop, escape) = ctx.input_mut(|i| {
            (
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::O),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::N),
                i.consume_key(egui::Modifiers::COMMAND, egui::Key::R),
                // egui turns Ctrl+C into a copy event rather than a key press
                i.events.iter().any(|e| matches!(e, egui::Event::Copy)),
                i.consume_key(egui::Modifiers::NONE, egui::Key::Escape),
            )
        });

        if open {
            self.open_dialog(ctx);
        }
        if new && self.session.has_image() {
            self.new_image(ctx);
        }
        if reset {
            self.reset_crop();
        }
        if crop && self.session.has_image() {
            self.crop(ctx);
        }
        if escape {
            self.result = None;
        }
    }

    fn sync_canvas_texture(&mut self, ctx: &egui::Context) {
        if self.canvas_revision == self.session.frame_revision() {
            return;
        }
        self.canvas_revision = self.session.frame_revision();
        match self.session.frame() {
            Some(frame) => {
                let image = color_image(frame);
                match &mut self.canvas_texture {
                    Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
                    None => {
                        self.canvas_texture =
                            Some(ctx.load_texture("canvas", image, egui::TextureOptions::LINEAR))
                    }
                }
            }
            None => self.canvas_texture = None,
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let has_image = self.session.has_image();
        let has_crop = self.session.confirmed().is_some();
        let uploading = self.upload_rx.is_some();

        ui.horizontal(|ui| {
            if ui.button("Open Image").clicked() {
                self.open_dialog(ctx);
            }

            ui.label("Test:");
            egui::ComboBox::from_id_salt("test_type")
                .selected_text(self.test_type.to_string())
                .show_ui(ui, |ui| {
                    for test in [TestType::Ph, TestType::Fob, TestType::Urinalysis] {
                        let picked = ui.selectable_label(self.test_type == test, test.to_string());
                        if picked.clicked() {
                            if test.available() {
                                self.test_type = test;
                            } else {
                                self.notices.push(Notice::warning(format!(
                                    "{test} is coming soon! We're working hard to bring you this capability."
                                )));
                            }
                        }
                    }
                });

            ui.separator();
            if ui.add_enabled(has_image, egui::Button::new("Crop")).clicked() {
                self.crop(ctx);
            }
            if ui.add_enabled(has_image, egui::Button::new("Reset Crop")).clicked() {
                self.reset_crop();
            }
            if ui.add_enabled(has_image, egui::Button::new("New Image")).clicked() {
                self.new_image(ctx);
            }
            if ui.add_enabled(has_crop, egui::Button::new("Save Crop")).clicked() {
                self.save_crop();
            }
            if ui
                .add_enabled(has_crop && !uploading, egui::Button::new("Analyze"))
                .clicked()
            {
                self.analyze(ctx);
            }
            if uploading || self.session.is_loading() {
                ui.spinner();
            }
        });
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (Some(texture), Some(viewport)) = (&self.canvas_texture, self.session.viewport()) else {
            ui.centered_and_justified(|ui| {
                ui.label("Drop an image here or click Open Image");
            });
            return;
        };

        let available = ui.available_size() - egui::vec2(PADDING * 2.0, PADDING * 2.0);
        let css_box = viewport.css_box_within(available.x.max(0.0), available.y.max(0.0));
        let display_size = egui::vec2(css_box.width, css_box.height);

        // Manual centering
        let x_offset = ((ui.available_width() - display_size.x) / 2.0).max(0.0);
        let start_pos = ui.cursor().min + egui::vec2(x_offset, PADDING);
        let image_rect = egui::Rect::from_min_size(start_pos, display_size);

        let response = ui.allocate_rect(image_rect, egui::Sense::click_and_drag());
        ui.painter_at(image_rect).image(
            texture.id(),
            image_rect,
            egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
            egui::Color32::WHITE,
        );
        if response.hovered() {
            ui.ctx().set_cursor_icon(egui::CursorIcon::Crosshair);
        }

        let events = ui.ctx().input(|i| i.events.clone());
        self.feed_pointer(ui.ctx(), ui.layer_id(), image_rect, css_box, &events);
    }

    /// Hands this frame's pointer events to the session, skipping presses that land on
    /// a popup or toast above the canvas.
    fn feed_pointer(
        &mut self,
        ctx: &egui::Context,
        canvas_layer: egui::LayerId,
        image_rect: egui::Rect,
        css_box: CssBox,
        events: &[egui::Event],
    ) {
        if !matches!(self.session.selection(), SelectionState::Selecting { .. }) {
            self.canvas_grab.release();
        }
        for event in events {
            let Some(pointer) = PointerEvent::from_egui(event, image_rect) else {
                continue;
            };
            let on_canvas = pointer.phase != PointerPhase::Down || {
                let pos = image_rect.min + egui::vec2(pointer.position.x, pointer.position.y);
                press_reaches(ctx, canvas_layer, pos)
            };
            if let Some(pointer) = self.canvas_grab.admit(pointer, on_canvas) {
                self.session.handle_pointer(pointer, css_box);
            }
        }
    }

    fn preview_panel(&mut self, ui: &mut egui::Ui) {
        if let (Some(texture), Some(preview)) = (&self.preview_texture, &self.preview) {
            ui.heading("Cropped");
            ui.label(format!("{} x {}", preview.width(), preview.height()));
            let size = texture.size_vec2();
            let scale = (ui.available_width() / size.x).min(1.0);
            ui.image((texture.id(), size * scale));
        }

        if let Some(result) = &self.result {
            ui.separator();
            let color = match result.tone {
                ResultTone::Positive => egui::Color32::from_rgb(0xe5, 0x3e, 0x3e),
                ResultTone::Negative => egui::Color32::from_rgb(0x38, 0xa1, 0x69),
                ResultTone::Invalid => egui::Color32::from_rgb(0xd6, 0x9e, 0x2e),
                ResultTone::Neutral => egui::Color32::from_rgb(0x31, 0x82, 0xce),
            };
            ui.colored_label(color, egui::RichText::new(&result.title).strong());
            for line in &result.details {
                ui.label(line);
            }
        }
    }

    fn show_notices(&mut self, ctx: &egui::Context) {
        if !self.notices.prune(std::time::Instant::now()) {
            return;
        }
        egui::Area::new(egui::Id::new("notices"))
            .anchor(egui::Align2::RIGHT_TOP, egui::vec2(-12.0, 12.0))
            .show(ctx, |ui| {
                for notice in self.notices.iter() {
                    let fill = match notice.level {
                        NoticeLevel::Success => egui::Color32::from_rgb(0x2f, 0x85, 0x5a),
                        NoticeLevel::Error => egui::Color32::from_rgb(0xc5, 0x30, 0x30),
                        NoticeLevel::Warning => egui::Color32::from_rgb(0xb7, 0x79, 0x1f),
                        NoticeLevel::Info => egui::Color32::from_rgb(0x2b, 0x6c, 0xb0),
                    };
                    egui::Frame::none()
                        .fill(fill)
                        .rounding(6.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.set_max_width(320.0);
                            ui.colored_label(egui::Color32::WHITE, &notice.message);
                        });
                }
            });
        // keep ticking so expired notices disappear
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

/// True when no interactive layer other than `canvas_layer` is on top at `pos`.
fn press_reaches(ctx: &egui::Context, canvas_layer: egui::LayerId, pos: egui::Pos2) -> bool {
    ctx.layer_id_at(pos).is_none_or(|layer| layer == canvas_layer)
}

fn color_image(pixels: &image::RgbaImage) -> egui::ColorImage {
    let size = [pixels.width() as _, pixels.height() as _];
    egui::ColorImage::from_rgba_unmultiplied(size, pixels.as_raw())
}

impl eframe::App for RegionCropper {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_jobs();

        // Handle dropped files
        let dropped_files = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(file) = dropped_files.first() {
            if let Some(path) = &file.path {
                self.open_path(ctx, path);
            } else if let Some(bytes) = &file.bytes {
                let mime = if file.mime.is_empty() {
                    infer::get(bytes).map(|kind| kind.mime_type().to_string()).unwrap_or_default()
                } else {
                    file.mime.clone()
                };
                self.start_load(ctx, ImageFile::new(file.name.clone(), mime, bytes.to_vec()));
            }
        }

        self.handle_shortcuts(ctx);
        self.sync_canvas_texture(ctx);

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
            self.toolbar(ui, ctx);
        });

        if self.preview_texture.is_some() || self.result.is_some() {
            egui::SidePanel::right("preview")
                .resizable(true)
                .default_width(280.0)
                .show(ctx, |ui| self.preview_panel(ui));
        }

        egui::CentralPanel::default().show(ctx, |ui| {
            self.canvas(ui);
        });

        // pointer events may have redrawn the frame
        self.sync_canvas_texture(ctx);
        self.show_notices(ctx);
    }
}
