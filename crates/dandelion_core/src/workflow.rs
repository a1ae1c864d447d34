//! Upload-to-classification state machine.
//!
//! ```text
//!            submit                 classify              complete(Ok)
//!   Idle ───────────► Loaded ─────────────────► Classifying ──────────► Resulted
//!    ▲                  ▲  ◄──────────────────────┘   ▲                    │
//!    │                  │      complete(Err)          └────────────────────┘
//!    └── reset ─────────┴── (from any state)               classify
//! ```
//!
//! Every attempt is identified by a [`Ticket`]. The generation part of the
//! ticket changes on each new submission and on reset, the attempt part on
//! each classify call. A completion is applied only if its ticket matches the
//! attempt currently in flight; anything else is stale and dropped.

use std::fmt;
use std::mem;
use thiserror::Error;

use crate::classifier::ClassifierError;
use crate::model::{ClassificationResult, ImageSubmission};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
    pub attempt: u64,
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}a{}", self.generation, self.attempt)
    }
}

/// Work handed to whoever runs the classifier.
#[derive(Debug, Clone)]
pub struct ClassificationRequest {
    pub ticket: Ticket,
    pub submission: ImageSubmission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loaded,
    Classifying,
    Resulted,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Loaded => "loaded",
            Phase::Classifying => "classifying",
            Phase::Resulted => "resulted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Default)]
pub enum WorkflowState {
    #[default]
    Idle,
    Loaded {
        submission: ImageSubmission,
        /// Why the previous attempt failed, if it did.
        failure: Option<ClassifierError>,
    },
    Classifying {
        submission: ImageSubmission,
        ticket: Ticket,
    },
    Resulted {
        submission: ImageSubmission,
        result: ClassificationResult,
    },
}

impl WorkflowState {
    pub fn phase(&self) -> Phase {
        match self {
            WorkflowState::Idle => Phase::Idle,
            WorkflowState::Loaded { .. } => Phase::Loaded,
            WorkflowState::Classifying { .. } => Phase::Classifying,
            WorkflowState::Resulted { .. } => Phase::Resulted,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("no image loaded")]
    NoSubmission,
}

/// What [`Workflow::complete`] did with a completion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Completion {
    Applied(ClassificationResult),
    /// The classifier failed; the submission is back in `Loaded`.
    Failed,
    /// The ticket was stale; nothing changed.
    Discarded,
}

#[derive(Debug, Default)]
pub struct Workflow {
    state: WorkflowState,
    generation: u64,
    attempts: u64,
}

impl Workflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn submission(&self) -> Option<&ImageSubmission> {
        match &self.state {
            WorkflowState::Idle => None,
            WorkflowState::Loaded { submission, .. }
            | WorkflowState::Classifying { submission, .. }
            | WorkflowState::Resulted { submission, .. } => Some(submission),
        }
    }

    pub fn result(&self) -> Option<&ClassificationResult> {
        match &self.state {
            WorkflowState::Resulted { result, .. } => Some(result),
            _ => None,
        }
    }

    pub fn is_classifying(&self) -> bool {
        matches!(self.state, WorkflowState::Classifying { .. })
    }

    /// Ticket of the attempt in flight.
    pub fn in_flight(&self) -> Option<Ticket> {
        match &self.state {
            WorkflowState::Classifying { ticket, .. } => Some(*ticket),
            _ => None,
        }
    }

    pub fn last_failure(&self) -> Option<&ClassifierError> {
        match &self.state {
            WorkflowState::Loaded { failure, .. } => failure.as_ref(),
            _ => None,
        }
    }

    /// Replaces whatever was there with a new submission in `Loaded`. Any
    /// previous result is dropped and any outstanding attempt becomes stale.
    pub fn load(&mut self, submission: ImageSubmission) {
        self.next_generation();
        tracing::debug!(
            "{} -> loaded ({}, generation {})",
            self.phase(),
            submission.name(),
            self.generation
        );
        self.state = WorkflowState::Loaded {
            submission,
            failure: None,
        };
    }

    /// Loads a submission and immediately starts classifying it.
    pub fn submit(&mut self, submission: ImageSubmission) -> ClassificationRequest {
        self.next_generation();
        tracing::debug!(
            "{} -> loaded -> classifying ({}, generation {})",
            self.phase(),
            submission.name(),
            self.generation
        );
        self.begin(submission)
    }

    fn next_generation(&mut self) {
        self.generation += 1;
        self.attempts = 0;
    }

    /// Starts an attempt on the current submission, from `Loaded` (first try
    /// or retry) or `Resulted` (reclassify). The previous result is cleared
    /// before this returns.
    ///
    /// Returns `Ok(None)` while an attempt is already in flight.
    pub fn classify(&mut self) -> Result<Option<ClassificationRequest>, WorkflowError> {
        match self.state {
            WorkflowState::Idle => Err(WorkflowError::NoSubmission),
            WorkflowState::Classifying { ticket, .. } => {
                tracing::debug!("classify ignored, {ticket} still in flight");
                Ok(None)
            }
            WorkflowState::Loaded { .. } | WorkflowState::Resulted { .. } => Ok(self.start()),
        }
    }

    fn start(&mut self) -> Option<ClassificationRequest> {
        match mem::take(&mut self.state) {
            WorkflowState::Loaded { submission, .. } | WorkflowState::Resulted { submission, .. } => {
                Some(self.begin(submission))
            }
            other => {
                self.state = other;
                None
            }
        }
    }

    fn begin(&mut self, submission: ImageSubmission) -> ClassificationRequest {
        self.attempts += 1;
        let ticket = Ticket {
            generation: self.generation,
            attempt: self.attempts,
        };
        tracing::debug!("classifying {} as {ticket}", submission.name());
        self.state = WorkflowState::Classifying {
            submission: submission.clone(),
            ticket,
        };
        ClassificationRequest { ticket, submission }
    }

    /// Applies the outcome of an attempt if `ticket` is the one in flight.
    pub fn complete(
        &mut self,
        ticket: Ticket,
        outcome: Result<ClassificationResult, ClassifierError>,
    ) -> Completion {
        let submission = match mem::take(&mut self.state) {
            WorkflowState::Classifying {
                submission,
                ticket: current,
            } if current == ticket => submission,
            other => {
                self.state = other;
                tracing::debug!(
                    "discarding stale completion {ticket} (state {}, generation {})",
                    self.phase(),
                    self.generation
                );
                return Completion::Discarded;
            }
        };
        match outcome {
            Ok(result) => {
                tracing::info!("{}: {result}", submission.name());
                self.state = WorkflowState::Resulted { submission, result };
                Completion::Applied(result)
            }
            Err(err) => {
                tracing::warn!("classifying {} failed: {err}", submission.name());
                self.state = WorkflowState::Loaded {
                    submission,
                    failure: Some(err),
                };
                Completion::Failed
            }
        }
    }

    /// Back to `Idle` from any state. Outstanding attempts become stale.
    pub fn reset(&mut self) {
        self.next_generation();
        if self.phase() != Phase::Idle {
            tracing::debug!("{} -> idle (generation {})", self.phase(), self.generation);
        }
        self.state = WorkflowState::Idle;
    }
}
