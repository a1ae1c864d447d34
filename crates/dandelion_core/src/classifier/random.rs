use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;

use super::{Classifier, ClassifierError};
use crate::model::{ClassificationResult, Confidence, ImageSubmission, Label};

/// Placeholder model: picks a label at random with a confidence in `[70, 100)`
/// after a fixed delay.
pub struct RandomClassifier {
    latency: Duration,
    rng: Mutex<StdRng>,
}

impl RandomClassifier {
    pub const DEFAULT_LATENCY: Duration = Duration::from_millis(2000);
    const CONFIDENCE_FLOOR: f32 = 70.0;
    const CONFIDENCE_SPAN: f32 = 30.0;

    pub fn new(latency: Duration) -> Self {
        Self {
            latency,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Deterministic variant for tests and demos.
    pub fn seeded(latency: Duration, seed: u64) -> Self {
        Self {
            latency,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }

    fn draw(&self) -> Result<(Label, f32), ClassifierError> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| ClassifierError::Backend("random source poisoned".into()))?;
        let label = Label::ALL[rng.random_range(0..Label::ALL.len())];
        let confidence =
            Self::CONFIDENCE_FLOOR + rng.random::<f32>() * Self::CONFIDENCE_SPAN;
        Ok((label, confidence))
    }
}

impl Default for RandomClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LATENCY)
    }
}

impl Classifier for RandomClassifier {
    fn classify(&self, image: &ImageSubmission) -> Result<ClassificationResult, ClassifierError> {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        let (label, confidence) = self.draw()?;
        // f32 rounding can land exactly on 100.0, which is still in range.
        let confidence = Confidence::new(confidence.min(Confidence::MAX))?;
        tracing::debug!("random classifier: {} -> {label} {confidence}", image.name());
        Ok(ClassificationResult::new(label, confidence))
    }

    fn name(&self) -> &str {
        "random"
    }
}
