mod annotation;
mod app;
mod canvas;
mod config;
mod controller;
mod error;
mod scanner;
mod session;
mod ui;

use app::{LabelApp, APP_NAME};
use config::{CliArgs, Settings};

fn main() -> eframe::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = CliArgs::parse(std::env::args());
    let settings = Settings::load();

    let native_options = eframe::NativeOptions {
        initial_window_size: Some(egui::vec2(1280.0, 800.0)),
        min_window_size: Some(egui::vec2(800.0, 600.0)),
        ..Default::default()
    };

    eframe::run_native(
        APP_NAME,
        native_options,
        Box::new(move |cc| Box::new(LabelApp::new(cc, args, settings))),
    )
}
