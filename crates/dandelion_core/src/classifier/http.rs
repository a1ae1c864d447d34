use reqwest::StatusCode;
use reqwest::blocking::{Client, multipart};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::{Classifier, ClassifierError};
use crate::model::{ClassificationResult, Confidence, ImageSubmission, Label};

/// Body of a successful `POST /predict`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PredictResponse {
    pub predicted_class: String,
    /// Probability of the predicted class in `[0, 1]`.
    pub confidence: f32,
    #[serde(default)]
    pub probabilities: HashMap<String, f32>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl PredictResponse {
    pub fn into_result(self) -> Result<ClassificationResult, ClassifierError> {
        let label: Label = self.predicted_class.parse()?;
        let confidence = Confidence::from_fraction(self.confidence)?;
        Ok(ClassificationResult::new(label, confidence))
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

/// Body of `GET /model-info`. The service answers `{"error": ...}` with a
/// success status when no model is loaded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    #[serde(default)]
    pub input_shape: Vec<Option<u32>>,
    #[serde(default)]
    pub output_shape: Vec<Option<u32>>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub image_size: Vec<u32>,
    #[serde(default)]
    pub total_params: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ModelInfoBody {
    Missing { error: String },
    Loaded(ModelInfo),
}

#[derive(Deserialize)]
struct ErrorBody {
    detail: String,
}

/// Sends images to the prediction service as multipart uploads.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
}

impl HttpClassifier {
    pub const DEFAULT_ENDPOINT: &'static str = "http://localhost:8000";
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifierError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = endpoint.into().trim_end_matches('/').to_string();
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.endpoint)
    }

    pub fn health(&self) -> Result<HealthStatus, ClassifierError> {
        let body = self.get("health")?;
        serde_json::from_str(&body).map_err(|e| ClassifierError::InvalidResponse(e.to_string()))
    }

    /// Describes the model the service has loaded.
    pub fn model_info(&self) -> Result<ModelInfo, ClassifierError> {
        parse_model_info(&self.get("model-info")?)
    }

    fn get(&self, path: &str) -> Result<String, ClassifierError> {
        let resp = self.client.get(self.url(path)).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(error_for_status(status, &body));
        }
        Ok(body)
    }
}

impl Classifier for HttpClassifier {
    fn classify(&self, image: &ImageSubmission) -> Result<ClassificationResult, ClassifierError> {
        let part = multipart::Part::bytes(image.bytes().to_vec())
            .file_name(image.name().to_string())
            .mime_str(image.media_type())?;
        let form = multipart::Form::new().part("file", part);

        tracing::debug!("POST {} ({} bytes)", self.url("predict"), image.bytes().len());
        let resp = self.client.post(self.url("predict")).multipart(form).send()?;
        let status = resp.status();
        let body = resp.text()?;
        if !status.is_success() {
            return Err(error_for_status(status, &body));
        }
        let result = parse_prediction(&body)?;
        tracing::debug!("prediction for {}: {result}", image.name());
        Ok(result)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Parses a `/predict` response body.
pub(crate) fn parse_prediction(body: &str) -> Result<ClassificationResult, ClassifierError> {
    let parsed: PredictResponse = serde_json::from_str(body)
        .map_err(|e| ClassifierError::InvalidResponse(e.to_string()))?;
    parsed.into_result()
}

pub(crate) fn parse_model_info(body: &str) -> Result<ModelInfo, ClassifierError> {
    match serde_json::from_str(body) {
        Ok(ModelInfoBody::Loaded(info)) => Ok(info),
        Ok(ModelInfoBody::Missing { error }) => Err(ClassifierError::Unavailable(error)),
        Err(e) => Err(ClassifierError::InvalidResponse(e.to_string())),
    }
}

fn error_for_status(status: StatusCode, body: &str) -> ClassifierError {
    let detail = serde_json::from_str::<ErrorBody>(body)
        .map(|b| b.detail)
        .unwrap_or_else(|_| body.trim().to_string());
    if status == StatusCode::SERVICE_UNAVAILABLE {
        ClassifierError::Unavailable(detail)
    } else {
        ClassifierError::Rejected {
            status: status.as_u16(),
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn parses_prediction_body() {
        let body = r#"{
            "predicted_class": "dandelion",
            "confidence": 0.873,
            "probabilities": {"dandelion": 0.873, "grass": 0.127},
            "timestamp": "2025-01-01T12:00:00"
        }"#;
        let result = parse_prediction(body).unwrap();
        assert_eq!(result.label, Label::Dandelion);
        assert_relative_eq!(result.confidence.percent(), 87.3, epsilon = 1e-3);
    }

    #[test]
    fn probabilities_and_timestamp_are_optional() {
        let result = parse_prediction(r#"{"predicted_class":"grass","confidence":1.0}"#).unwrap();
        assert_eq!(result.label, Label::Grass);
        assert_relative_eq!(result.confidence.percent(), 100.0);
    }

    #[test]
    fn rejects_unknown_class_and_bad_confidence() {
        assert!(matches!(
            parse_prediction(r#"{"predicted_class":"tulip","confidence":0.9}"#),
            Err(ClassifierError::UnknownLabel(_))
        ));
        assert!(matches!(
            parse_prediction(r#"{"predicted_class":"grass","confidence":1.7}"#),
            Err(ClassifierError::ConfidenceOutOfRange(_))
        ));
        assert!(matches!(
            parse_prediction("<html>oops</html>"),
            Err(ClassifierError::InvalidResponse(_))
        ));
    }

    #[test]
    fn maps_error_statuses() {
        let unavailable = error_for_status(
            StatusCode::SERVICE_UNAVAILABLE,
            r#"{"detail":"Model not loaded. Please ensure the model file exists."}"#,
        );
        assert!(matches!(unavailable, ClassifierError::Unavailable(ref d) if d.starts_with("Model not loaded")));

        let rejected = error_for_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"File must be an image (JPG, PNG, etc.)"}"#,
        );
        assert_eq!(
            rejected.to_string(),
            "classifier rejected the image (400): File must be an image (JPG, PNG, etc.)"
        );

        let plain = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, "boom\n");
        assert!(matches!(plain, ClassifierError::Rejected { status: 500, ref detail } if detail == "boom"));
    }

    #[test]
    fn parses_model_info_body() {
        let body = r#"{
            "model_type": "CNN (Convolutional Neural Network)",
            "input_shape": [null, 256, 256, 3],
            "output_shape": [null, 2],
            "classes": ["dandelion", "grass"],
            "image_size": [256, 256],
            "total_params": 3453634
        }"#;
        let info = parse_model_info(body).unwrap();
        assert_eq!(info.input_shape, vec![None, Some(256), Some(256), Some(3)]);
        assert_eq!(info.classes, vec!["dandelion", "grass"]);
        assert_eq!(info.image_size, vec![256, 256]);
        assert_eq!(info.total_params, Some(3_453_634));
    }

    #[test]
    fn model_info_without_model_is_unavailable() {
        assert!(matches!(
            parse_model_info(r#"{"error": "Model not loaded"}"#),
            Err(ClassifierError::Unavailable(ref e)) if e == "Model not loaded"
        ));
        assert!(matches!(
            parse_model_info("[]"),
            Err(ClassifierError::InvalidResponse(_))
        ));
    }

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let c = HttpClassifier::new("http://localhost:8000/", Duration::from_secs(1)).unwrap();
        assert_eq!(c.endpoint(), "http://localhost:8000");
        assert_eq!(c.url("predict"), "http://localhost:8000/predict");
    }

    #[test]
    fn unreachable_service_is_a_transport_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let c = HttpClassifier::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
        let sub = ImageSubmission::new(
            "a.png",
            "image/png",
            crate::intake::IntakeChannel::Browse,
            vec![0u8; 4],
            image::RgbaImage::new(1, 1),
        );
        assert!(matches!(c.classify(&sub), Err(ClassifierError::Transport(_))));
    }
}
