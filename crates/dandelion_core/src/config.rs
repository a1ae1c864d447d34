//! `config.toml` handling.
//!
//! ```toml
//! [intake]
//! rejection = "surface"        # or "silent"
//! max_file_bytes = 10485760    # 0 disables the limit
//!
//! [classifier]
//! backend = "http"
//! endpoint = "http://localhost:8000"
//! request_timeout_secs = 10
//!
//! [workflow]
//! timeout_secs = 30
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::classifier::{Classifier, HttpClassifier, RandomClassifier};
use crate::intake::{Intake, IntakePolicy};
use crate::session::ClassificationSession;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum ClassifierBackend {
    Random {
        #[serde(default = "default_latency_ms")]
        latency_ms: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        seed: Option<u64>,
    },
    Http {
        #[serde(default = "default_endpoint")]
        endpoint: String,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
}

fn default_latency_ms() -> u64 {
    RandomClassifier::DEFAULT_LATENCY.as_millis() as u64
}

fn default_endpoint() -> String {
    HttpClassifier::DEFAULT_ENDPOINT.to_string()
}

fn default_request_timeout_secs() -> u64 {
    HttpClassifier::DEFAULT_TIMEOUT.as_secs()
}

impl Default for ClassifierBackend {
    fn default() -> Self {
        ClassifierBackend::Random {
            latency_ms: default_latency_ms(),
            seed: None,
        }
    }
}

impl ClassifierBackend {
    pub fn build(&self) -> Result<Arc<dyn Classifier>> {
        let classifier: Arc<dyn Classifier> = match self {
            ClassifierBackend::Random { latency_ms, seed } => {
                let latency = Duration::from_millis(*latency_ms);
                Arc::new(match seed {
                    Some(seed) => RandomClassifier::seeded(latency, *seed),
                    None => RandomClassifier::new(latency),
                })
            }
            ClassifierBackend::Http {
                endpoint,
                request_timeout_secs,
            } => Arc::new(
                HttpClassifier::new(endpoint.as_str(), Duration::from_secs(*request_timeout_secs))
                    .with_context(|| format!("cannot set up HTTP classifier for {endpoint}"))?,
            ),
        };
        Ok(classifier)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Give up on an attempt after this many seconds. Unset waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub intake: IntakePolicy,
    pub classifier: ClassifierBackend,
    pub workflow: WorkflowConfig,
}

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "DANDELION_CONFIG";

impl AppConfig {
    /// `$DANDELION_CONFIG`, or `config.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            return Some(PathBuf::from(path));
        }
        directories_next::ProjectDirs::from("org", "dandelion", "Dandelion")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("invalid configuration")
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).context("cannot serialize configuration")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// Like [`AppConfig::load`], but a missing file yields the defaults.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let cfg = Self::load(path)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(cfg)
    }

    /// Writes the configuration, creating parent directories as needed.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("cannot create {}", parent.display()))?;
        }
        std::fs::write(path, self.to_toml_string()?)
            .with_context(|| format!("cannot write {}", path.display()))?;
        tracing::info!("saved config to {}", path.display());
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.workflow.timeout_secs.map(Duration::from_secs)
    }

    pub fn build_session(&self) -> Result<ClassificationSession> {
        let classifier = self.classifier.build()?;
        Ok(ClassificationSession::new(Intake::new(self.intake), classifier).with_timeout(self.timeout()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::{DEFAULT_MAX_FILE_BYTES, RejectionMode};
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    #[test]
    fn empty_file_gives_defaults() -> Result<()> {
        let cfg = AppConfig::from_toml_str("")?;
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.intake.rejection, RejectionMode::Silent);
        assert_eq!(cfg.intake.max_file_bytes, Some(DEFAULT_MAX_FILE_BYTES));
        assert_eq!(
            cfg.classifier,
            ClassifierBackend::Random {
                latency_ms: 2000,
                seed: None
            }
        );
        assert_eq!(cfg.timeout(), None);
        Ok(())
    }

    #[test]
    fn parses_http_backend_and_intake_options() -> Result<()> {
        let cfg = AppConfig::from_toml_str(
            r#"
            [intake]
            rejection = "surface"
            max_file_bytes = 0

            [classifier]
            backend = "http"
            endpoint = "http://api:8000"

            [workflow]
            timeout_secs = 30
            "#,
        )?;
        assert_eq!(cfg.intake.rejection, RejectionMode::Surface);
        assert_eq!(cfg.intake.max_file_bytes, None);
        assert_eq!(
            cfg.classifier,
            ClassifierBackend::Http {
                endpoint: "http://api:8000".into(),
                request_timeout_secs: 10
            }
        );
        assert_eq!(cfg.timeout(), Some(Duration::from_secs(30)));
        Ok(())
    }

    #[test]
    fn unknown_backend_is_an_error() {
        let err = AppConfig::from_toml_str("[classifier]\nbackend = \"onnx\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("invalid configuration"));
    }

    #[test]
    fn round_trips_through_toml() -> Result<()> {
        let cfg = AppConfig {
            classifier: ClassifierBackend::Random {
                latency_ms: 0,
                seed: Some(9),
            },
            workflow: WorkflowConfig {
                timeout_secs: Some(5),
            },
            ..AppConfig::default()
        };
        let text = cfg.to_toml_string()?;
        assert_eq!(AppConfig::from_toml_str(&text)?, cfg);
        Ok(())
    }

    #[test]
    fn disabled_size_limit_survives_save_and_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.intake.max_file_bytes = None;
        cfg.save(&path)?;

        assert!(std::fs::read_to_string(&path)?.contains("max_file_bytes = 0"));
        assert_eq!(AppConfig::load(&path)?.intake.max_file_bytes, None);
        Ok(())
    }

    #[test]
    fn custom_size_limit_round_trips() -> Result<()> {
        let mut cfg = AppConfig::default();
        cfg.intake.max_file_bytes = Some(512 * 1024);
        let back = AppConfig::from_toml_str(&cfg.to_toml_string()?)?;
        assert_eq!(back.intake.max_file_bytes, Some(512 * 1024));
        Ok(())
    }

    #[test]
    fn load_or_default_handles_missing_and_present_files() -> Result<()> {
        let dir = tempdir()?;
        let missing = AppConfig::load_or_default(dir.path().join("config.toml"))?;
        assert_eq!(missing, AppConfig::default());

        let mut file = NamedTempFile::new()?;
        writeln!(file, "[classifier]\nbackend = \"random\"\nlatency_ms = 5")?;
        let cfg = AppConfig::load_or_default(file.path())?;
        assert_eq!(
            cfg.classifier,
            ClassifierBackend::Random {
                latency_ms: 5,
                seed: None
            }
        );
        Ok(())
    }

    #[test]
    fn save_creates_directories_and_reloads() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.intake.rejection = RejectionMode::Surface;
        cfg.save(&path)?;
        assert_eq!(AppConfig::load(&path)?, cfg);
        Ok(())
    }

    #[test]
    fn builds_configured_classifier() -> Result<()> {
        let random = ClassifierBackend::default().build()?;
        assert_eq!(random.name(), "random");
        let http = ClassifierBackend::Http {
            endpoint: "http://localhost:8000".into(),
            request_timeout_secs: 1,
        }
        .build()?;
        assert_eq!(http.name(), "http");
        Ok(())
    }
}
