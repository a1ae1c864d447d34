//! Turning user-provided files into validated [`ImageSubmission`]s.
//!
//! Both input channels (file dialog and drag-and-drop) go through
//! [`Intake::submit_file`], so the image-type check cannot be bypassed.

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::ImageSubmission;

/// Where a file came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeChannel {
    Browse,
    DragDrop,
}

impl fmt::Display for IntakeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntakeChannel::Browse => f.write_str("browse"),
            IntakeChannel::DragDrop => f.write_str("drag-and-drop"),
        }
    }
}

/// Raw file handed over by one of the input channels.
#[derive(Debug, Clone)]
pub struct SubmittedFile {
    pub name: String,
    /// Media type declared by the source. Empty strings count as undeclared.
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
    pub channel: IntakeChannel,
}

impl SubmittedFile {
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: Option<String>,
        bytes: Vec<u8>,
        channel: IntakeChannel,
    ) -> Self {
        Self {
            name: name.into(),
            media_type,
            bytes,
            channel,
        }
    }

    /// Reads a file from disk; the media type is inferred from the extension.
    pub fn from_path(path: impl AsRef<Path>, channel: IntakeChannel) -> Result<Self, IntakeError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| IntakeError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            name: display_name(path),
            media_type: media_type_for_path(path).map(str::to_string),
            bytes,
            channel,
        })
    }

    /// Declared media type, falling back to the file name's extension.
    pub fn resolved_media_type(&self) -> Option<String> {
        match self.media_type.as_deref().map(str::trim) {
            Some(declared) if !declared.is_empty() => Some(declared.to_ascii_lowercase()),
            _ => media_type_for_path(Path::new(&self.name)).map(str::to_string),
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Media type for the image extensions the decoder understands.
pub fn media_type_for_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension().and_then(|s| s.to_str())?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "ico" => "image/x-icon",
        _ => return None,
    };
    Some(mime)
}

fn is_image_media_type(media_type: &str) -> bool {
    media_type.starts_with("image/")
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("{name} is not an image (media type: {})", .media_type.as_deref().unwrap_or("unknown"))]
    InvalidInput {
        name: String,
        media_type: Option<String>,
    },
    #[error("{name} is {size} bytes, limit is {limit} bytes")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("could not decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },
    #[error("could not read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IntakeError {
    /// Errors that the rejection mode may hide from the user.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            IntakeError::InvalidInput { .. } | IntakeError::TooLarge { .. }
        )
    }
}

/// How rejected files are reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionMode {
    /// Drop the file; only a debug log line is written.
    #[default]
    Silent,
    /// Report the rejection to the caller as an error.
    Surface,
}

pub const DEFAULT_MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntakePolicy {
    pub rejection: RejectionMode,
    /// Hard size limit in bytes; `None` or `0` accepts any size. Written to
    /// config files as a plain number with `0` for "no limit".
    #[serde(with = "size_limit")]
    pub max_file_bytes: Option<u64>,
}

mod size_limit {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(limit: &Option<u64>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(limit.unwrap_or(0))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
        Ok(Some(u64::deserialize(d)?).filter(|l| *l > 0))
    }
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            rejection: RejectionMode::Silent,
            max_file_bytes: Some(DEFAULT_MAX_FILE_BYTES),
        }
    }
}

/// File decode primitive.
pub trait DecodeImage: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, image::ImageError>;
}

/// Decoder backed by the `image` crate's format detection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCrateDecoder;

impl DecodeImage for ImageCrateDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<RgbaImage, image::ImageError> {
        Ok(image::load_from_memory(bytes)?.to_rgba8())
    }
}

#[derive(Debug)]
pub enum IntakeOutcome {
    Accepted(ImageSubmission),
    /// Rejected under [`RejectionMode::Silent`]; the reason is kept for logging.
    Ignored(IntakeError),
}

pub struct Intake {
    policy: IntakePolicy,
    decoder: Box<dyn DecodeImage>,
}

impl Default for Intake {
    fn default() -> Self {
        Self::new(IntakePolicy::default())
    }
}

impl Intake {
    pub fn new(policy: IntakePolicy) -> Self {
        Self::with_decoder(policy, ImageCrateDecoder)
    }

    pub fn with_decoder(policy: IntakePolicy, decoder: impl DecodeImage + 'static) -> Self {
        Self {
            policy,
            decoder: Box::new(decoder),
        }
    }

    pub fn policy(&self) -> IntakePolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: IntakePolicy) {
        self.policy = policy;
    }

    /// Validates and decodes a file.
    ///
    /// Non-images and oversized files are rejected according to the policy's
    /// [`RejectionMode`]. Decode failures are always returned as errors.
    pub fn submit_file(&self, file: SubmittedFile) -> Result<IntakeOutcome, IntakeError> {
        let media_type = match self.validate(&file) {
            Ok(media_type) => media_type,
            Err(err) => return self.reject(err),
        };

        let image = self.decoder.decode(&file.bytes).map_err(|source| {
            tracing::warn!("decoding {} failed: {source}", file.name);
            IntakeError::Decode {
                name: file.name.clone(),
                source,
            }
        })?;

        tracing::debug!(
            "accepted {} via {} ({}x{}, {media_type})",
            file.name,
            file.channel,
            image.width(),
            image.height()
        );
        Ok(IntakeOutcome::Accepted(ImageSubmission::new(
            file.name,
            media_type,
            file.channel,
            file.bytes,
            image,
        )))
    }

    fn validate(&self, file: &SubmittedFile) -> Result<String, IntakeError> {
        let media_type = file.resolved_media_type();
        let media_type = match media_type {
            Some(mt) if is_image_media_type(&mt) => mt,
            other => {
                return Err(IntakeError::InvalidInput {
                    name: file.name.clone(),
                    media_type: other,
                });
            }
        };
        let size = file.bytes.len() as u64;
        if let Some(limit) = self.policy.max_file_bytes.filter(|l| *l > 0)
            && size > limit
        {
            return Err(IntakeError::TooLarge {
                name: file.name.clone(),
                size,
                limit,
            });
        }
        Ok(media_type)
    }

    fn reject(&self, err: IntakeError) -> Result<IntakeOutcome, IntakeError> {
        match self.policy.rejection {
            RejectionMode::Silent => {
                tracing::debug!("ignoring file: {err}");
                Ok(IntakeOutcome::Ignored(err))
            }
            RejectionMode::Surface => {
                tracing::info!("rejecting file: {err}");
                Err(err)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use rstest::rstest;
    use std::io::Cursor;
    use tempfile::tempdir;

    pub(crate) fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([250, 210, 20, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    fn png_file(channel: IntakeChannel) -> SubmittedFile {
        SubmittedFile::from_bytes(
            "flower.png",
            Some("image/png".into()),
            png_bytes(3, 2),
            channel,
        )
    }

    #[rstest]
    #[case(IntakeChannel::Browse)]
    #[case(IntakeChannel::DragDrop)]
    fn accepts_images_from_either_channel(#[case] channel: IntakeChannel) {
        let intake = Intake::default();
        match intake.submit_file(png_file(channel)).unwrap() {
            IntakeOutcome::Accepted(sub) => {
                assert_eq!(sub.name(), "flower.png");
                assert_eq!(sub.media_type(), "image/png");
                assert_eq!(sub.channel(), channel);
                assert_eq!(sub.dimensions(), (3, 2));
            }
            other => panic!("expected acceptance, got {other:?}"),
        }
    }

    #[rstest]
    #[case(IntakeChannel::Browse)]
    #[case(IntakeChannel::DragDrop)]
    fn non_images_are_ignored_silently_by_default(#[case] channel: IntakeChannel) {
        let intake = Intake::default();
        let file = SubmittedFile::from_bytes(
            "notes.txt",
            Some("text/plain".into()),
            b"hello".to_vec(),
            channel,
        );
        assert!(matches!(
            intake.submit_file(file).unwrap(),
            IntakeOutcome::Ignored(IntakeError::InvalidInput { .. })
        ));
    }

    #[test]
    fn non_images_surface_when_configured() {
        let intake = Intake::new(IntakePolicy {
            rejection: RejectionMode::Surface,
            ..IntakePolicy::default()
        });
        let file = SubmittedFile::from_bytes(
            "report.pdf",
            Some("application/pdf".into()),
            png_bytes(1, 1),
            IntakeChannel::DragDrop,
        );
        let err = intake.submit_file(file).unwrap_err();
        assert!(err.is_rejection());
        assert_eq!(
            err.to_string(),
            "report.pdf is not an image (media type: application/pdf)"
        );
    }

    #[test]
    fn declared_type_wins_over_extension() {
        let intake = Intake::default();
        // Image bytes with a non-image declaration are still rejected.
        let file = SubmittedFile::from_bytes(
            "photo.png",
            Some("application/octet-stream".into()),
            png_bytes(1, 1),
            IntakeChannel::Browse,
        );
        assert!(matches!(
            intake.submit_file(file).unwrap(),
            IntakeOutcome::Ignored(_)
        ));
    }

    #[rstest]
    #[case("a.PNG", Some("image/png"))]
    #[case("b.jpeg", Some("image/jpeg"))]
    #[case("c.JpG", Some("image/jpeg"))]
    #[case("d.webp", Some("image/webp"))]
    #[case("e.txt", None)]
    #[case("no_extension", None)]
    fn media_type_is_inferred_from_extension(#[case] name: &str, #[case] expected: Option<&str>) {
        assert_eq!(media_type_for_path(Path::new(name)), expected);
        let file = SubmittedFile::from_bytes(name, Some(String::new()), vec![], IntakeChannel::DragDrop);
        assert_eq!(file.resolved_media_type().as_deref(), expected);
    }

    #[test]
    fn oversized_files_are_rejected() {
        let intake = Intake::new(IntakePolicy {
            rejection: RejectionMode::Surface,
            max_file_bytes: Some(16),
        });
        let err = intake.submit_file(png_file(IntakeChannel::Browse)).unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { limit: 16, .. }));
    }

    #[test]
    fn size_limit_can_be_disabled() {
        let intake = Intake::new(IntakePolicy {
            rejection: RejectionMode::Surface,
            max_file_bytes: None,
        });
        let file = SubmittedFile::from_bytes(
            "big.png",
            None,
            png_bytes(64, 64),
            IntakeChannel::Browse,
        );
        assert!(matches!(
            intake.submit_file(file).unwrap(),
            IntakeOutcome::Accepted(_)
        ));
    }

    #[test]
    fn corrupt_image_is_a_decode_error_even_when_silent() {
        let intake = Intake::default();
        let file = SubmittedFile::from_bytes(
            "broken.png",
            Some("image/png".into()),
            b"definitely not a png".to_vec(),
            IntakeChannel::DragDrop,
        );
        let err = intake.submit_file(file).unwrap_err();
        assert!(matches!(err, IntakeError::Decode { ref name, .. } if name == "broken.png"));
        assert!(!err.is_rejection());
    }

    #[test]
    fn from_path_reads_bytes_and_infers_type() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lawn.png");
        std::fs::write(&path, png_bytes(2, 2)).unwrap();

        let file = SubmittedFile::from_path(&path, IntakeChannel::Browse).unwrap();
        assert_eq!(file.name, "lawn.png");
        assert_eq!(file.media_type.as_deref(), Some("image/png"));

        let missing = SubmittedFile::from_path(dir.path().join("gone.png"), IntakeChannel::Browse);
        assert!(matches!(missing, Err(IntakeError::Read { .. })));
    }
}
