use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::classifier::ClassifierError;
use crate::intake::IntakeChannel;

/// The closed set of categories the classifier can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Dandelion,
    Grass,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Dandelion, Label::Grass];

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Dandelion => "dandelion",
            Label::Grass => "grass",
        }
    }

    /// Name with a leading capital, for headings.
    pub fn title(self) -> &'static str {
        match self {
            Label::Dandelion => "Dandelion",
            Label::Grass => "Grass",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dandelion" => Ok(Label::Dandelion),
            "grass" => Ok(Label::Grass),
            _ => Err(ClassifierError::UnknownLabel(s.to_string())),
        }
    }
}

/// Percentage score in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct Confidence(f32);

impl Confidence {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 100.0;

    /// Validates a percentage. NaN and values outside `[0, 100]` are a
    /// classifier contract violation.
    pub fn new(percent: f32) -> Result<Self, ClassifierError> {
        if (Self::MIN..=Self::MAX).contains(&percent) {
            Ok(Self(percent))
        } else {
            Err(ClassifierError::ConfidenceOutOfRange(percent))
        }
    }

    /// Builds a percentage from a probability in `[0, 1]`. Errors carry the
    /// scaled value.
    pub fn from_fraction(fraction: f32) -> Result<Self, ClassifierError> {
        Self::new(fraction * 100.0)
    }

    pub fn percent(self) -> f32 {
        self.0
    }

    pub fn fraction(self) -> f32 {
        self.0 / 100.0
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.0)
    }
}

impl<'de> Deserialize<'de> for Confidence {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f32::deserialize(deserializer)?;
        Confidence::new(raw).map_err(serde::de::Error::custom)
    }
}

/// Outcome of one completed classification. Each attempt produces a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    pub confidence: Confidence,
}

impl ClassificationResult {
    pub fn new(label: Label, confidence: Confidence) -> Self {
        Self { label, confidence }
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.confidence)
    }
}

/// An accepted image. Cloning is cheap; the encoded bytes and decoded pixels
/// are shared with any classification attempt that is still running.
#[derive(Clone)]
pub struct ImageSubmission {
    name: String,
    media_type: String,
    channel: IntakeChannel,
    bytes: Arc<[u8]>,
    image: Arc<RgbaImage>,
}

impl ImageSubmission {
    pub fn new(
        name: impl Into<String>,
        media_type: impl Into<String>,
        channel: IntakeChannel,
        bytes: impl Into<Arc<[u8]>>,
        image: RgbaImage,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            channel,
            bytes: bytes.into(),
            image: Arc::new(image),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn channel(&self) -> IntakeChannel {
        self.channel
    }

    /// The file as it was submitted, before decoding.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Decoded pixels used for the preview.
    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

impl fmt::Debug for ImageSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (w, h) = self.dimensions();
        f.debug_struct("ImageSubmission")
            .field("name", &self.name)
            .field("media_type", &self.media_type)
            .field("channel", &self.channel)
            .field("bytes", &self.bytes.len())
            .field("dimensions", &format_args!("{w}x{h}"))
            .finish()
    }
}
