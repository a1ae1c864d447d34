//! Classifier backends.
//!
//! The workflow only sees the [`Classifier`] trait; swapping the random
//! stand-in for a real model does not touch any state logic.

mod http;
mod random;

pub use http::{HealthStatus, HttpClassifier, ModelInfo, PredictResponse};
pub use random::RandomClassifier;

use std::time::Duration;
use thiserror::Error;

use crate::model::{ClassificationResult, ImageSubmission};

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier rejected the image ({status}): {detail}")]
    Rejected { status: u16, detail: String },
    #[error("request to classifier failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("invalid classifier response: {0}")]
    InvalidResponse(String),
    #[error("unknown label {0:?}")]
    UnknownLabel(String),
    #[error("confidence {0} is outside [0, 100]")]
    ConfidenceOutOfRange(f32),
    #[error("classification timed out after {0:?}")]
    TimedOut(Duration),
    #[error("classifier panicked")]
    Panicked,
    #[error("{0}")]
    Backend(String),
}

/// Produces exactly one result, or fails, for one image. Calls may block for
/// an arbitrary amount of time; callers run them off the UI thread.
pub trait Classifier: Send + Sync {
    fn classify(&self, image: &ImageSubmission) -> Result<ClassificationResult, ClassifierError>;

    /// Short name used in logs and the UI footer.
    fn name(&self) -> &str;
}
