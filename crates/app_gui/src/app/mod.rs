//! egui front end for a [`ClassificationSession`].

mod classify;
mod drop;
mod settings;

use anyhow::Result;
use dandelion_core::{
    AppConfig, ClassificationSession, Completion, IntakeChannel, SubmitOutcome, SubmittedFile,
};
use eframe::{App, Frame, egui};
use image::RgbaImage;
use rfd::FileDialog;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];
const PENDING_REPAINT: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Classify,
    Settings,
}

/// Texture for the current submission, tied to the workflow generation it
/// was built for.
struct Preview {
    generation: u64,
    texture: egui::TextureHandle,
}

pub struct UiApp {
    session: ClassificationSession,
    config: AppConfig,
    config_path: Option<PathBuf>,
    panel: Panel,
    preview: Option<Preview>,
    status: String,
    pending_max_mb: f64,
    app_version: &'static str,
}

impl UiApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: AppConfig,
        config_path: Option<PathBuf>,
    ) -> Result<Self> {
        let mut session = config.build_session()?;
        let repaint = cc.egui_ctx.clone();
        session.set_waker(Arc::new(move || repaint.request_repaint()));
        tracing::info!("using {} classifier", session.classifier_name());

        let pending_max_mb = bytes_to_mb(config.intake.max_file_bytes);
        Ok(Self {
            session,
            config,
            config_path,
            panel: Panel::Classify,
            preview: None,
            status: String::new(),
            pending_max_mb,
            app_version: env!("DANDELION_VERSION"),
        })
    }

    fn submit(&mut self, file: SubmittedFile) {
        match self.session.submit_file(file) {
            Ok(SubmitOutcome::Classifying(_)) => self.status.clear(),
            Ok(SubmitOutcome::Ignored) => {}
            Err(e) => self.status = e.to_string(),
        }
    }

    fn browse(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Images", IMAGE_EXTENSIONS)
            .pick_file()
        else {
            return;
        };
        match SubmittedFile::from_path(&path, IntakeChannel::Browse) {
            Ok(file) => self.submit(file),
            Err(e) => self.status = e.to_string(),
        }
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        // One image at a time; extra files in the same drop are ignored.
        let Some(first) = dropped.first() else {
            return;
        };
        if dropped.len() > 1 {
            tracing::debug!("{} files dropped, using {}", dropped.len(), first.name);
        }
        match drop::submitted_from_drop(first) {
            Ok(Some(file)) => self.submit(file),
            Ok(None) => {}
            Err(e) => self.status = e.to_string(),
        }
    }

    fn reset(&mut self) {
        self.session.reset();
        self.status.clear();
    }

    fn reclassify(&mut self) {
        if let Err(e) = self.session.reclassify() {
            self.status = e.to_string();
        }
    }

    fn sync_preview(&mut self, ctx: &egui::Context) {
        let workflow = self.session.workflow();
        let Some(submission) = workflow.submission() else {
            self.preview = None;
            return;
        };
        if self
            .preview
            .as_ref()
            .is_some_and(|p| p.generation == workflow.generation())
        {
            return;
        }
        let texture = ctx.load_texture(
            format!("preview:{}", submission.name()),
            color_image(submission.image()),
            egui::TextureOptions::LINEAR,
        );
        self.preview = Some(Preview {
            generation: workflow.generation(),
            texture,
        });
    }
}

impl App for UiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        for completion in self.session.poll() {
            if completion == Completion::Failed
                && let Some(err) = self.session.workflow().last_failure()
            {
                self.status = format!("Classification failed: {err}");
            }
        }
        self.handle_dropped_files(ctx);
        self.sync_preview(ctx);

        egui::TopBottomPanel::top("top").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.selectable_value(&mut self.panel, Panel::Classify, "Classify");
                ui.selectable_value(&mut self.panel, Panel::Settings, "Settings");
                if !self.status.is_empty() {
                    ui.separator();
                    ui.label(&self.status);
                }
            });
        });

        egui::TopBottomPanel::bottom("footer").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.weak(format!(
                    "Classifier: {} · v{}",
                    self.session.classifier_name(),
                    self.app_version
                ));
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| match self.panel {
            Panel::Classify => self.render_classify_panel(ui),
            Panel::Settings => self.render_settings_panel(ui),
        });

        if self.session.workflow().is_classifying() {
            // Keeps the timeout check running even if the worker never answers.
            ctx.request_repaint_after(PENDING_REPAINT);
        }
    }
}

fn color_image(image: &RgbaImage) -> egui::ColorImage {
    let size = [image.width() as usize, image.height() as usize];
    egui::ColorImage::from_rgba_unmultiplied(size, image.as_raw())
}

fn bytes_to_mb(bytes: Option<u64>) -> f64 {
    bytes.map(|b| b as f64 / (1024.0 * 1024.0)).unwrap_or(0.0)
}

fn mb_to_bytes(mb: f64) -> Option<u64> {
    (mb > 0.0).then(|| (mb * 1024.0 * 1024.0).round() as u64)
}
