use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use proptest::prelude::*;
use region_cropper::config::{DisplayBounds, ExportConfig, ExportFormat};
use region_cropper::{
    AppConfig, CropError, CropSession, CssBox, Exporter, ImageFile, LoadOutcome, PointerEvent,
    PointerPhase, SelectionState, Transition, decode_data_url,
};

fn strip(x: u32, y: u32) -> Rgba<u8> {
    Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
}

fn png_file(name: &str, width: u32, height: u32) -> ImageFile {
    let image = RgbaImage::from_fn(width, height, strip);
    let mut bytes = Vec::new();
    DynamicImage::ImageRgba8(image)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .unwrap();
    ImageFile::new(name, "image/png", bytes)
}

fn loaded(width: u32, height: u32) -> CropSession {
    let mut session = CropSession::new(&AppConfig::default());
    session.load_now(&png_file("strip.png", width, height)).unwrap();
    session
}

fn drag(session: &mut CropSession, css: CssBox, from: (f32, f32), to: (f32, f32)) -> Transition {
    session.handle_pointer(PointerEvent::mouse(PointerPhase::Down, from.0, from.1), css);
    session.handle_pointer(PointerEvent::mouse(PointerPhase::Move, to.0, to.1), css);
    session.handle_pointer(PointerEvent::mouse(PointerPhase::Up, to.0, to.1), css)
}

#[test]
fn photo_is_shrunk_and_cropped_in_canvas_pixels() {
    let config = AppConfig {
        bounds: DisplayBounds { max_width: 800, max_height: 600 },
        ..AppConfig::default()
    };
    let mut session = CropSession::new(&config);
    let outcome = session.load_now(&png_file("photo.png", 1600, 1200)).unwrap();
    assert_eq!(
        outcome,
        LoadOutcome::Ready { natural: (1600, 1200), backing: (800, 600) }
    );

    // laid out at half the backing size
    let css = CssBox::new(400.0, 300.0);
    assert_eq!(drag(&mut session, css, (100.0, 75.0), (300.0, 175.0)), Transition::Finalized);
    match session.selection() {
        SelectionState::Finalized { anchor, current } => {
            assert_eq!((anchor.x, anchor.y), (200.0, 150.0));
            assert_eq!((current.x, current.y), (600.0, 350.0));
        }
        other => panic!("expected a finalized selection, got {other:?}"),
    }

    let cropped = session.crop().unwrap();
    assert_eq!((cropped.width(), cropped.height()), (400, 200));
}

#[test]
fn touch_gesture_crops_like_a_mouse_drag() {
    let mut session = loaded(300, 200);
    let css = CssBox::new(300.0, 200.0);
    session.handle_pointer(PointerEvent::touch(4, PointerPhase::Down, 20.0, 30.0), css);
    // a second finger is ignored while the first owns the gesture
    assert_eq!(
        session.handle_pointer(PointerEvent::touch(5, PointerPhase::Move, 290.0, 190.0), css),
        Transition::Ignored
    );
    session.handle_pointer(PointerEvent::touch(4, PointerPhase::Move, 120.0, 80.0), css);
    session.handle_pointer(PointerEvent::touch(4, PointerPhase::Up, 120.0, 80.0), css);

    let cropped = session.crop().unwrap();
    assert_eq!((cropped.width(), cropped.height()), (100, 50));
}

#[test]
fn selection_past_the_edge_is_clamped() {
    let mut session = loaded(200, 100);
    let css = CssBox::new(200.0, 100.0);
    drag(&mut session, css, (150.0, 50.0), (260.0, 140.0));

    let cropped = session.crop().unwrap();
    assert_eq!((cropped.width(), cropped.height()), (50, 50));
    assert_eq!(*cropped.pixels().get_pixel(0, 0), strip(150, 50));
}

#[test]
fn confirmed_crop_exports_and_previews() {
    let mut session = loaded(240, 160);
    drag(&mut session, CssBox::new(240.0, 160.0), (40.0, 20.0), (140.0, 100.0));
    let cropped = session.crop().unwrap().clone();

    let png = Exporter::default();
    let preview = decode_data_url(&png.to_data_url(&cropped).unwrap()).unwrap();
    assert_eq!(preview, cropped);

    let jpeg = Exporter::new(ExportConfig { format: ExportFormat::Jpeg, quality: 85 });
    let payload = session.take_payload(&jpeg, "ph").unwrap();
    assert_eq!(payload.mime(), "image/jpeg");
    assert_eq!(payload.test_type(), "ph");
    let reloaded = image::load_from_memory(payload.bytes()).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (100, 80));

    assert!(matches!(session.take_payload(&jpeg, "ph"), Err(CropError::NoSelection)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn in_bounds_drag_crops_exact_size(
        x in 0u32..150,
        y in 0u32..100,
        w in 10u32..=50,
        h in 10u32..=50,
    ) {
        let mut session = loaded(200, 150);
        let css = CssBox::new(200.0, 150.0);
        drag(&mut session, css, (x as f32, y as f32), ((x + w) as f32, (y + h) as f32));

        let cropped = session.crop().unwrap();
        prop_assert_eq!((cropped.width(), cropped.height()), (w, h));
        prop_assert_eq!(*cropped.pixels().get_pixel(0, 0), strip(x, y));
        prop_assert_eq!(*cropped.pixels().get_pixel(w - 1, h - 1), strip(x + w - 1, y + h - 1));
    }

    #[test]
    fn drag_direction_does_not_matter(
        x in 0u32..150,
        y in 0u32..100,
        w in 10u32..=50,
        h in 10u32..=50,
    ) {
        let css = CssBox::new(200.0, 150.0);
        let (left, top, right, bottom) = (x as f32, y as f32, (x + w) as f32, (y + h) as f32);

        let mut forward = loaded(200, 150);
        drag(&mut forward, css, (left, top), (right, bottom));
        let mut backward = loaded(200, 150);
        drag(&mut backward, css, (right, bottom), (left, top));
        let mut crosswise = loaded(200, 150);
        drag(&mut crosswise, css, (right, top), (left, bottom));

        let expected = forward.crop().unwrap().clone();
        prop_assert_eq!(backward.crop().unwrap(), &expected);
        prop_assert_eq!(crosswise.crop().unwrap(), &expected);
    }
}
