//! Ordered multi-step pipelines run against a session.

use serde::Serialize;
use serde_json::Value;
use steppanel_core::{CancellationToken, PanelError, StepData};
use tracing::{error, info, warn};

use crate::scope::StepScope;
use crate::session::Session;

/// What to do after a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip every remaining step.
    #[default]
    Abort,
    /// Keep running the remaining steps.
    Continue,
}

/// A step body. Returning `Ok` completes the step with the returned result
/// unless the body already finished it through the scope.
pub type StepBody<'a, R> = Box<dyn FnOnce(&StepScope<'_, R>) -> anyhow::Result<Option<R>> + 'a>;

/// Outcome of a pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    /// Steps that completed, in order.
    pub completed: Vec<String>,
    /// Steps that failed, with their messages.
    pub failed: Vec<(String, String)>,
    /// Steps never started because of an abort or cancellation.
    pub skipped: Vec<String>,
    /// Whether cancellation stopped the run.
    pub cancelled: bool,
}

impl PipelineReport {
    /// Every step completed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty() && !self.cancelled
    }
}

/// Named step bodies run in order, one at a time.
pub struct Pipeline<'a, R: Clone = Value> {
    steps: Vec<(String, StepBody<'a, R>)>,
    policy: FailurePolicy,
    cancel: Option<CancellationToken>,
}

impl<'a, R: Clone> Pipeline<'a, R> {
    /// Empty pipeline that aborts on the first failure.
    #[must_use]
    pub fn new() -> Self {
        Self {
            steps: Vec::new(),
            policy: FailurePolicy::default(),
            cancel: None,
        }
    }

    /// Append a step.
    #[must_use]
    pub fn step<F>(mut self, name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&StepScope<'_, R>) -> anyhow::Result<Option<R>> + 'a,
    {
        self.steps.push((name.into(), Box::new(body)));
        self
    }

    /// Set the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Stop between steps once `token` is cancelled.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether the pipeline has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Run every step against `session`.
    ///
    /// Declares the step total if the session has none. A body error fails
    /// the step with the error chain as message and records one error.
    ///
    /// # Errors
    ///
    /// Only session errors (e.g. `SessionClosed`); step failures are data in
    /// the report.
    pub fn run(self, session: &Session<R>) -> Result<PipelineReport, PanelError> {
        if session.snapshot()?.total_steps.is_none() {
            let total = u32::try_from(self.steps.len()).unwrap_or(u32::MAX);
            session.set_total_steps(Some(total))?;
        }

        let mut report = PipelineReport::default();
        let mut stopped = false;
        for (name, body) in self.steps {
            if !stopped && self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                warn!(step = %name, "pipeline cancelled");
                report.cancelled = true;
                stopped = true;
            }
            if stopped {
                report.skipped.push(name);
                continue;
            }

            let scope = session.step(name.as_str())?;
            let outcome = body(&scope);
            // The body may have finished its step through the scope or the session.
            let unfinished = !scope.is_finished() && session.is_unfinished(&name)?;
            match outcome {
                Ok(result) => {
                    if unfinished {
                        scope.complete(result, StepData::new())?;
                    }
                    report.completed.push(name);
                }
                Err(err) => {
                    let message = format!("{err:#}");
                    error!(step = %name, error = %message, "step failed");
                    if unfinished {
                        scope.fail(message.clone())?;
                    }
                    session.record_error()?;
                    report.failed.push((name, message));
                    if self.policy == FailurePolicy::Abort {
                        stopped = true;
                    }
                }
            }
        }

        info!(
            completed = report.completed.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "pipeline finished"
        );
        Ok(report)
    }
}

impl<R: Clone> Default for Pipeline<'_, R> {
    fn default() -> Self {
        Self::new()
    }
}
