//! Headless front end: classifies one image with the configured backend.
//!
//! ```text
//! dandelion-cli [--config PATH] [--timeout SECS] IMAGE
//! dandelion-cli [--config PATH] --health
//! dandelion-cli [--config PATH] --print-config
//! ```

use anyhow::{Context, Result, bail};
use clap::{ArgGroup, Parser};
use dandelion_core::{
    AppConfig, ClassifierBackend, Completion, HttpClassifier, IntakeChannel, RejectionMode,
    SubmitOutcome, SubmittedFile,
};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_WAIT_SECS: u64 = 60;

/// Classify an image as dandelion or grass.
#[derive(Debug, Parser)]
#[command(name = "dandelion-cli", version)]
#[command(group(
    ArgGroup::new("action")
        .required(true)
        .args(["image", "health", "print_config"]),
))]
struct Args {
    /// Config file to use instead of the platform default.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Seconds to wait for an answer.
    #[arg(long = "timeout", value_name = "SECS", default_value_t = DEFAULT_WAIT_SECS)]
    wait_secs: u64,

    /// Query the prediction service's health (http backend only).
    #[arg(long)]
    health: bool,

    /// Print the effective configuration as TOML.
    #[arg(long)]
    print_config: bool,

    /// Image to classify.
    #[arg(value_name = "IMAGE")]
    image: Option<PathBuf>,
}

fn load_config(args: &Args) -> Result<AppConfig> {
    match args.config.clone().or_else(AppConfig::default_path) {
        Some(path) => AppConfig::load_or_default(path),
        None => Ok(AppConfig::default()),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    let mut config = load_config(&args)?;

    if args.print_config {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }

    if args.health {
        let ClassifierBackend::Http {
            endpoint,
            request_timeout_secs,
        } = &config.classifier
        else {
            bail!("--health needs the http classifier backend");
        };
        let client =
            HttpClassifier::new(endpoint.as_str(), Duration::from_secs(*request_timeout_secs))?;
        let health = client.health()?;
        println!("{}: model_loaded={}", health.status, health.model_loaded);
        if health.model_loaded {
            let info = client.model_info()?;
            println!("{} classes={:?} params={:?}", info.model_type, info.classes, info.total_params);
        }
        return Ok(());
    }

    let image = args.image.as_ref().context("no image given")?;
    // A silent rejection would leave nothing to report on the command line.
    config.intake.rejection = RejectionMode::Surface;
    let mut session = config.build_session()?;

    let file = SubmittedFile::from_path(image, IntakeChannel::Browse)?;
    match session.submit_file(file)? {
        SubmitOutcome::Classifying(ticket) => tracing::debug!("started {ticket}"),
        SubmitOutcome::Ignored => bail!("{} was not accepted", image.display()),
    }

    let wait = Duration::from_secs(args.wait_secs);
    match session.wait(wait) {
        Some(Completion::Applied(result)) => {
            println!("{}: {} ({})", image.display(), result.label, result.confidence);
            Ok(())
        }
        Some(Completion::Failed) => match session.workflow().last_failure() {
            Some(err) => bail!("classification failed: {err}"),
            None => bail!("classification failed"),
        },
        Some(Completion::Discarded) | None => {
            bail!("no answer from the {} classifier within {wait:?}", session.classifier_name())
        }
    }
}
