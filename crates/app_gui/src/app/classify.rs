//! Upload area, preview and result card.

use super::UiApp;
use dandelion_core::{ClassificationResult, Label, Phase};
use eframe::egui::{self, Color32, RichText};

const PREVIEW_MAX_HEIGHT: f32 = 384.0;
const UPLOAD_AREA_HEIGHT: f32 = 220.0;

enum Action {
    Browse,
    Reset,
    Reclassify,
}

fn label_color(label: Label) -> Color32 {
    match label {
        Label::Dandelion => Color32::from_rgb(202, 138, 4),
        Label::Grass => Color32::from_rgb(21, 128, 61),
    }
}

fn label_blurb(label: Label) -> &'static str {
    match label {
        Label::Dandelion => {
            "Bright yellow flowers with distinctive jagged leaves and fluffy seed heads."
        }
        Label::Grass => "Long, narrow blades forming dense green lawns and meadows.",
    }
}

fn label_icon(label: Label) -> &'static str {
    match label {
        Label::Dandelion => "🌼",
        Label::Grass => "🌱",
    }
}

impl UiApp {
    pub(super) fn render_classify_panel(&mut self, ui: &mut egui::Ui) {
        let mut action = None;

        ui.vertical_centered(|ui| {
            ui.heading("Dandelion vs Grass Classifier");
            ui.label(
                "Upload an image and let the model identify whether it's a dandelion or grass.",
            );
        });
        ui.add_space(16.0);

        match self.preview.as_ref() {
            None => {
                if render_upload_area(ui, &upload_hint(self.config.intake.max_file_bytes)) {
                    action = Some(Action::Browse);
                }
            }
            Some(preview) => {
                ui.vertical_centered(|ui| {
                    ui.add(
                        egui::Image::new(egui::load::SizedTexture::from_handle(&preview.texture))
                            .max_height(PREVIEW_MAX_HEIGHT)
                            .max_width(ui.available_width())
                            .maintain_aspect_ratio(true),
                    );
                });
                ui.add_space(12.0);

                let workflow = self.session.workflow();
                match workflow.phase() {
                    Phase::Classifying => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Classifying your image...");
                        });
                    }
                    Phase::Resulted => {
                        if let Some(result) = workflow.result() {
                            render_result(ui, result);
                        }
                    }
                    Phase::Loaded => {
                        if let Some(err) = workflow.last_failure() {
                            ui.colored_label(Color32::LIGHT_RED, format!("Classification failed: {err}"));
                        }
                    }
                    Phase::Idle => {}
                }

                ui.add_space(12.0);
                ui.horizontal(|ui| {
                    if ui.button("⬆ Upload another").clicked() {
                        action = Some(Action::Reset);
                    }
                    match workflow.phase() {
                        Phase::Resulted if ui.button("✨ Reclassify").clicked() => {
                            action = Some(Action::Reclassify);
                        }
                        Phase::Loaded if ui.button("↻ Retry").clicked() => {
                            action = Some(Action::Reclassify);
                        }
                        _ => {}
                    }
                });
            }
        }

        ui.add_space(24.0);
        ui.separator();
        ui.columns(Label::ALL.len(), |cols| {
            for (col, label) in cols.iter_mut().zip(Label::ALL) {
                info_card(col, label);
            }
        });

        match action {
            Some(Action::Browse) => self.browse(),
            Some(Action::Reset) => self.reset(),
            Some(Action::Reclassify) => self.reclassify(),
            None => {}
        }
    }
}

fn upload_hint(max_file_bytes: Option<u64>) -> String {
    match max_file_bytes.filter(|b| *b > 0) {
        Some(bytes) => format!("PNG, JPG, GIF up to {}", format_megabytes(bytes)),
        None => "PNG, JPG, GIF of any size".to_string(),
    }
}

fn format_megabytes(bytes: u64) -> String {
    let mb = bytes as f64 / (1024.0 * 1024.0);
    if mb.fract() == 0.0 {
        format!("{mb:.0}MB")
    } else {
        format!("{mb:.1}MB")
    }
}

/// Returns true when the area was clicked.
fn render_upload_area(ui: &mut egui::Ui, hint: &str) -> bool {
    let dragging = ui.ctx().input(|i| !i.raw.hovered_files.is_empty());
    let stroke_color = if dragging {
        Color32::from_rgb(34, 197, 94)
    } else {
        Color32::GRAY
    };
    let response = egui::Frame::group(ui.style())
        .stroke(egui::Stroke::new(2.0, stroke_color))
        .show(ui, |ui| {
            ui.set_min_height(UPLOAD_AREA_HEIGHT);
            ui.vertical_centered(|ui| {
                ui.add_space(UPLOAD_AREA_HEIGHT / 3.0);
                ui.label(RichText::new("⬆").size(40.0));
                ui.label(
                    RichText::new("Click to upload or drag and drop")
                        .color(Color32::from_rgb(22, 163, 74)),
                );
                ui.weak(hint);
            });
        })
        .response
        .interact(egui::Sense::click());
    response.clicked()
}

fn render_result(ui: &mut egui::Ui, result: &ClassificationResult) {
    let color = label_color(result.label);
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label(RichText::new(label_icon(result.label)).size(28.0));
            ui.vertical(|ui| {
                ui.label(RichText::new("✔ Classification Complete").strong());
                ui.horizontal(|ui| {
                    ui.label("This image is classified as:");
                    ui.label(RichText::new(result.label.title()).color(color).strong());
                });
                ui.horizontal(|ui| {
                    ui.label("Confidence");
                    ui.label(result.confidence.to_string());
                });
                ui.add(egui::ProgressBar::new(result.confidence.fraction()).fill(color));
            });
        });
    });
}

fn info_card(ui: &mut egui::Ui, label: Label) {
    egui::Frame::group(ui.style()).show(ui, |ui| {
        ui.horizontal(|ui| {
            ui.label(RichText::new(label_icon(label)).size(24.0));
            ui.vertical(|ui| {
                ui.strong(label.title());
                ui.label(label_blurb(label));
            });
        });
    });
}
