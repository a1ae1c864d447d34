//! Settings panel rendering for intake rules and the classifier backend.

use super::{Panel, UiApp, mb_to_bytes};
use dandelion_core::{ClassifierBackend, HttpClassifier, ModelInfo, RejectionMode};
use eframe::egui;
use std::time::Duration;

const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

fn rejection_label(mode: RejectionMode) -> &'static str {
    match mode {
        RejectionMode::Silent => "Ignore silently",
        RejectionMode::Surface => "Show a message",
    }
}

fn check_service(endpoint: &str) -> String {
    let client = match HttpClassifier::new(endpoint, HEALTH_TIMEOUT) {
        Ok(client) => client,
        Err(e) => return format!("Service unreachable: {e}"),
    };
    match client.health() {
        Ok(h) if h.model_loaded => match client.model_info() {
            Ok(info) => describe_model(&h.status, &info),
            Err(e) => format!("Service {}: model loaded ({e})", h.status),
        },
        Ok(h) => format!("Service {}: model not loaded", h.status),
        Err(e) => format!("Service unreachable: {e}"),
    }
}

fn describe_model(status: &str, info: &ModelInfo) -> String {
    let mut text = format!("Service {status}: {}", info.model_type);
    if !info.classes.is_empty() {
        text.push_str(&format!(", classes {}", info.classes.join("/")));
    }
    if let &[w, h] = info.image_size.as_slice() {
        text.push_str(&format!(", input {w}x{h}"));
    }
    if let Some(params) = info.total_params {
        text.push_str(&format!(", {params} parameters"));
    }
    text
}

impl UiApp {
    /// Renders the settings screen. Intake changes apply immediately;
    /// classifier changes need a restart.
    pub(super) fn render_settings_panel(&mut self, ui: &mut egui::Ui) {
        ui.heading("Settings");
        ui.add_space(8.0);
        ui.horizontal(|ui| {
            ui.label("Non-image files");
            let mut selected = self.config.intake.rejection;
            egui::ComboBox::from_id_salt("rejection-select")
                .selected_text(rejection_label(selected))
                .show_ui(ui, |ui| {
                    for mode in [RejectionMode::Silent, RejectionMode::Surface] {
                        ui.selectable_value(&mut selected, mode, rejection_label(mode));
                    }
                });
            if selected != self.config.intake.rejection {
                self.config.intake.rejection = selected;
                self.session.set_intake_policy(self.config.intake);
                self.status = "Intake rules updated.".to_string();
            }
        });
        ui.add_space(12.0);
        ui.horizontal(|ui| {
            ui.label("Maximum file size (MB)");
            let resp = ui.add(
                egui::DragValue::new(&mut self.pending_max_mb)
                    .range(0.0..=100.0)
                    .speed(0.5),
            );
            if resp.changed() {
                self.config.intake.max_file_bytes = mb_to_bytes(self.pending_max_mb);
                self.session.set_intake_policy(self.config.intake);
                self.status = if self.config.intake.max_file_bytes.is_some() {
                    format!("Files above {:.1} MB are rejected", self.pending_max_mb)
                } else {
                    "No file size limit".to_string()
                };
            }
        });
        ui.weak("0 disables the limit.");

        ui.add_space(12.0);
        ui.separator();
        ui.add_space(6.0);
        ui.heading("Classifier");
        match self.config.classifier.clone() {
            ClassifierBackend::Random { latency_ms, .. } => {
                ui.label(format!(
                    "Placeholder model with random answers ({latency_ms} ms delay)."
                ));
            }
            ClassifierBackend::Http { endpoint, .. } => {
                ui.label(format!("Prediction service at {endpoint}"));
                if ui.button("Check service").clicked() {
                    // Blocking, bounded by HEALTH_TIMEOUT.
                    self.status = check_service(&endpoint);
                }
            }
        }
        if let Some(secs) = self.config.workflow.timeout_secs {
            ui.label(format!("Attempts time out after {secs} s."));
        }

        ui.add_space(12.0);
        ui.separator();
        ui.add_space(6.0);
        match self.config_path.clone() {
            Some(path) => {
                ui.label(format!("Config file: {}", path.display()));
                if ui.button("Save settings").clicked() {
                    self.status = match self.config.save(&path) {
                        Ok(()) => "Settings saved.".to_string(),
                        Err(e) => format!("Could not save settings: {e:#}"),
                    };
                    self.panel = Panel::Classify;
                }
            }
            None => {
                ui.weak("No config directory available; settings last for this session only.");
            }
        }

        ui.add_space(16.0);
        ui.separator();
        ui.add_space(6.0);
        ui.heading("Versions");
        ui.label(format!("App version: {}", self.app_version));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_description_lists_known_fields() {
        let info = ModelInfo {
            model_type: "CNN".into(),
            input_shape: vec![None, Some(256), Some(256), Some(3)],
            output_shape: vec![None, Some(2)],
            classes: vec!["dandelion".into(), "grass".into()],
            image_size: vec![256, 256],
            total_params: Some(1200),
        };
        assert_eq!(
            describe_model("healthy", &info),
            "Service healthy: CNN, classes dandelion/grass, input 256x256, 1200 parameters"
        );
    }

    #[test]
    fn unreachable_service_is_reported() {
        assert!(check_service("http://127.0.0.1:9").starts_with("Service unreachable"));
    }
}
