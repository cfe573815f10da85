//! Step scope guards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use steppanel_core::{PanelError, StepData, StepHandle, StepSummary, StepValue};
use tracing::warn;

use crate::session::Session;

const PANICKED: &str = "step panicked";
const UNFINISHED: &str = "step exited without completing";

/// A running step tied to a lexical scope.
///
/// Finish it with [`complete`](Self::complete) or [`fail`](Self::fail).
/// Dropping it unfinished marks the step failed and records one error, so a
/// step body that returns early or panics can never leave the panel stuck
/// on a running step.
pub struct StepScope<'a, R: Clone> {
    session: &'a Session<R>,
    handle: StepHandle,
    finished: AtomicBool,
}

impl<'a, R: Clone> StepScope<'a, R> {
    pub(crate) fn new(session: &'a Session<R>, handle: StepHandle) -> Self {
        Self {
            session,
            handle,
            finished: AtomicBool::new(false),
        }
    }

    /// Step name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.handle.name
    }

    /// Step ordinal.
    #[must_use]
    pub fn ordinal(&self) -> u32 {
        self.handle.ordinal
    }

    /// The step this one superseded while it was still running, if any.
    #[must_use]
    pub fn abandoned(&self) -> Option<&str> {
        self.handle.abandoned.as_deref()
    }

    /// Whether `complete` or `fail` already ran.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Set a display value. `Ok(false)` if this step is no longer current.
    pub fn update(
        &self,
        key: impl Into<String>,
        value: impl Into<StepValue>,
    ) -> Result<bool, PanelError> {
        let mut data = StepData::new();
        data.insert(key, value);
        self.merge(data)
    }

    /// Merge display values. `Ok(false)` if this step is no longer current.
    pub fn merge(&self, data: StepData) -> Result<bool, PanelError> {
        if self.session.current_step()?.as_deref() != Some(self.name()) {
            warn!(step = %self.name(), "update ignored: step is no longer current");
            return Ok(false);
        }
        self.session.merge_step_data(data)
    }

    /// Count a pipeline error without finishing the step.
    pub fn record_error(&self) -> Result<u64, PanelError> {
        self.session.record_error()
    }

    /// Complete the step, storing and returning `result`.
    pub fn complete(&self, result: Option<R>, data: StepData) -> Result<Option<R>, PanelError> {
        let out = self.session.complete_step(Some(self.name()), result, data)?;
        self.finished.store(true, Ordering::Release);
        Ok(out)
    }

    /// Fail the step with `message`. The error counter is left alone.
    pub fn fail(&self, message: impl Into<String>) -> Result<StepSummary, PanelError> {
        let summary = self.session.fail_step(Some(self.name()), message)?;
        self.finished.store(true, Ordering::Release);
        Ok(summary)
    }
}

impl<R: Clone> Drop for StepScope<'_, R> {
    fn drop(&mut self) {
        if self.is_finished() {
            return;
        }
        // Finished elsewhere, e.g. through `Session::complete_step`, or the
        // session is already closed.
        if !self.session.is_unfinished(self.name()).unwrap_or(false) {
            return;
        }
        let message = if thread::panicking() { PANICKED } else { UNFINISHED };
        warn!(step = %self.name(), reason = message, "step scope dropped unfinished");
        let _ = self.session.fail_step(Some(self.name()), message);
        let _ = self.session.record_error();
    }
}
