//! Core of the dandelion/grass classifier: image intake, the classification
//! workflow state machine and the classifier backends that feed it.

pub mod classifier;
pub mod config;
pub mod intake;
pub mod model;
pub mod session;
pub mod workflow;

pub use classifier::{
    Classifier, ClassifierError, HealthStatus, HttpClassifier, ModelInfo, RandomClassifier,
};
pub use config::{AppConfig, ClassifierBackend};
pub use intake::{
    DecodeImage, ImageCrateDecoder, Intake, IntakeChannel, IntakeError, IntakeOutcome,
    IntakePolicy, RejectionMode, SubmittedFile,
};
pub use model::{ClassificationResult, Confidence, ImageSubmission, Label};
pub use session::{ClassificationSession, SubmitOutcome};
pub use workflow::{
    ClassificationRequest, Completion, Phase, Ticket, Workflow, WorkflowError, WorkflowState,
};
