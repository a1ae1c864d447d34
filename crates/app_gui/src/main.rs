mod app;

use anyhow::Context;
use app::UiApp;
use dandelion_core::AppConfig;
use eframe::{NativeOptions, egui};

fn main() {
    tracing_subscriber::fmt::init();

    let config_path = AppConfig::default_path();
    let config = match config_path.as_deref().map(AppConfig::load_or_default) {
        Some(Ok(cfg)) => cfg,
        Some(Err(e)) => {
            tracing::warn!("{e:#}; falling back to defaults");
            AppConfig::default()
        }
        None => AppConfig::default(),
    };

    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([720.0, 820.0])
            .with_drag_and_drop(true),
        ..NativeOptions::default()
    };
    if let Err(e) = eframe::run_native(
        "Dandelion vs Grass Classifier",
        options,
        Box::new(move |cc: &eframe::CreationContext<'_>| {
            let app = UiApp::new(cc, config, config_path)
                .context("cannot start classifier session")
                .map_err(Box::<dyn std::error::Error + Send + Sync>::from)?;
            Ok::<Box<dyn eframe::App>, Box<dyn std::error::Error + Send + Sync>>(Box::new(app))
        }),
    ) {
        eprintln!("Application stopped with error: {e}");
    }
}
