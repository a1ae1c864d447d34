//! Runs classification attempts off the caller's thread and feeds their
//! outcomes back into a [`Workflow`].
//!
//! Each attempt gets its own worker thread. Results come back over a channel
//! tagged with the attempt's [`Ticket`], so whatever the workflow has moved on
//! from is dropped when it arrives.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::classifier::{Classifier, ClassifierError};
use crate::intake::{Intake, IntakeError, IntakeOutcome, IntakePolicy, SubmittedFile};
use crate::model::ClassificationResult;
use crate::workflow::{ClassificationRequest, Completion, Ticket, Workflow, WorkflowError};

/// Called from the worker thread after it has posted an outcome.
pub type Waker = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Accepted; classification is running under this ticket.
    Classifying(Ticket),
    /// Silently rejected; the workflow did not change.
    Ignored,
}

struct Finished {
    ticket: Ticket,
    outcome: Result<ClassificationResult, ClassifierError>,
}

pub struct ClassificationSession {
    workflow: Workflow,
    intake: Intake,
    classifier: Arc<dyn Classifier>,
    timeout: Option<Duration>,
    started_at: Option<Instant>,
    tx: Sender<Finished>,
    rx: Receiver<Finished>,
    waker: Option<Waker>,
}

impl ClassificationSession {
    pub fn new(intake: Intake, classifier: Arc<dyn Classifier>) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            workflow: Workflow::new(),
            intake,
            classifier,
            timeout: None,
            started_at: None,
            tx,
            rx,
            waker: None,
        }
    }

    /// Fails attempts that run longer than `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_waker(&mut self, waker: Waker) {
        self.waker = Some(waker);
    }

    pub fn workflow(&self) -> &Workflow {
        &self.workflow
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn intake_policy(&self) -> IntakePolicy {
        self.intake.policy()
    }

    pub fn set_intake_policy(&mut self, policy: IntakePolicy) {
        self.intake.set_policy(policy);
    }

    /// Validates the file and, if accepted, replaces the current submission
    /// and starts classifying it. Rejected files leave the workflow as it was.
    pub fn submit_file(&mut self, file: SubmittedFile) -> Result<SubmitOutcome, IntakeError> {
        match self.intake.submit_file(file)? {
            IntakeOutcome::Accepted(submission) => {
                tracing::info!("new submission {} via {}", submission.name(), submission.channel());
                let request = self.workflow.submit(submission);
                let ticket = request.ticket;
                self.dispatch(request);
                Ok(SubmitOutcome::Classifying(ticket))
            }
            IntakeOutcome::Ignored(_) => Ok(SubmitOutcome::Ignored),
        }
    }

    /// Classifies the current submission again (or retries after a failure).
    /// Returns `Ok(None)` if an attempt is already running.
    pub fn reclassify(&mut self) -> Result<Option<Ticket>, WorkflowError> {
        let Some(request) = self.workflow.classify()? else {
            return Ok(None);
        };
        let ticket = request.ticket;
        self.dispatch(request);
        Ok(Some(ticket))
    }

    pub fn reset(&mut self) {
        self.workflow.reset();
        self.started_at = None;
    }

    /// Applies every outcome that has arrived so far, then enforces the
    /// timeout. Never blocks.
    pub fn poll(&mut self) -> Vec<Completion> {
        let mut applied = Vec::new();
        while let Ok(finished) = self.rx.try_recv() {
            applied.push(self.apply(finished));
        }
        if let Some(timed_out) = self.check_timeout(Instant::now()) {
            applied.push(timed_out);
        }
        applied
    }

    /// Blocks until the attempt in flight is applied or fails, or `limit`
    /// passes. Stale outcomes that arrive meanwhile are dropped.
    pub fn wait(&mut self, limit: Duration) -> Option<Completion> {
        let deadline = Instant::now() + limit;
        while self.workflow.is_classifying() {
            let now = Instant::now();
            if let Some(timed_out) = self.check_timeout(now) {
                return Some(timed_out);
            }
            if now >= deadline {
                return None;
            }
            let mut slice = deadline - now;
            if let Some(expiry) = self.expires_at() {
                slice = slice.min(expiry.saturating_duration_since(now));
            }
            match self.rx.recv_timeout(slice) {
                Ok(finished) => match self.apply(finished) {
                    Completion::Discarded => continue,
                    completion => return Some(completion),
                },
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
        None
    }

    fn apply(&mut self, finished: Finished) -> Completion {
        let completion = self.workflow.complete(finished.ticket, finished.outcome);
        if completion != Completion::Discarded {
            self.started_at = None;
        }
        completion
    }

    fn expires_at(&self) -> Option<Instant> {
        Some(self.started_at? + self.timeout?)
    }

    fn check_timeout(&mut self, now: Instant) -> Option<Completion> {
        let ticket = self.workflow.in_flight()?;
        let timeout = self.timeout?;
        if now < self.expires_at()? {
            return None;
        }
        self.started_at = None;
        Some(
            self.workflow
                .complete(ticket, Err(ClassifierError::TimedOut(timeout))),
        )
    }

    fn dispatch(&mut self, request: ClassificationRequest) {
        self.started_at = Some(Instant::now());
        let ticket = request.ticket;
        let classifier = Arc::clone(&self.classifier);
        let tx = self.tx.clone();
        let waker = self.waker.clone();

        let spawned = thread::Builder::new()
            .name(format!("classify-{ticket}"))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    classifier.classify(&request.submission)
                }))
                .unwrap_or_else(|_| Err(ClassifierError::Panicked));
                if tx.send(Finished { ticket, outcome }).is_err() {
                    tracing::debug!("session closed before {ticket} finished");
                    return;
                }
                if let Some(wake) = waker {
                    wake();
                }
            });

        if let Err(e) = spawned {
            tracing::error!("cannot start classifier thread: {e}");
            self.started_at = None;
            self.workflow.complete(
                ticket,
                Err(ClassifierError::Backend(format!(
                    "cannot start classifier thread: {e}"
                ))),
            );
        }
    }
}
