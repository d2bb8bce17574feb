#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

use eframe::egui;
use region_cropper::app::RegionCropper;
use region_cropper::config::AppConfig;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::from_env();
    log::info!(
        "upload policy accepts {} up to {}MB",
        config.policy.describe_allowed(),
        config.policy.max_file_size / 1024 / 1024
    );

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1280.0, 900.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Region Cropper",
        options,
        Box::new(|cc| Ok(Box::new(RegionCropper::new(cc, config)))),
    )
}
