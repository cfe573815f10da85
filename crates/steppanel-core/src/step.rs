//! Step lifecycle types.

use std::fmt;
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::value::StepData;

/// Lifecycle status of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Declared but not started.
    Pending,
    /// Currently running.
    Running,
    /// Finished successfully.
    Completed,
    /// Finished with a failure.
    Failed,
    /// Superseded by a later `start_step` while still running.
    Abandoned,
}

impl StepStatus {
    /// Marker glyph used in summaries.
    #[must_use]
    pub fn marker(self) -> &'static str {
        match self {
            StepStatus::Pending => "·",
            StepStatus::Running => "›",
            StepStatus::Completed => "✓",
            StepStatus::Failed => "✗",
            StepStatus::Abandoned => "⚠",
        }
    }

    /// Past-tense verb used in summaries.
    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Abandoned => "abandoned",
        }
    }

    /// Whether the step has left the running state.
    #[must_use]
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Abandoned
        )
    }
}

/// The step currently running in a tracker.
#[derive(Debug, Clone)]
pub struct ActiveStep {
    /// 1-based ordinal assigned at start.
    pub ordinal: u32,
    /// Step name.
    pub name: String,
    /// Always `Running` while the step is current.
    pub status: StepStatus,
    /// When the step started.
    pub started_at: SystemTime,
    /// Display data reported so far.
    pub data: StepData,
}

impl ActiveStep {
    pub(crate) fn new(ordinal: u32, name: String, started_at: SystemTime) -> Self {
        Self {
            ordinal,
            name,
            status: StepStatus::Running,
            started_at,
            data: StepData::new(),
        }
    }
}

/// Returned by `start_step`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepHandle {
    /// Ordinal assigned to the new step.
    pub ordinal: u32,
    /// Name of the new step.
    pub name: String,
    /// The previous step, if it was still running and got abandoned.
    pub abandoned: Option<String>,
}

/// Frozen record of a finished step, as shown in the panel history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    /// Ordinal assigned at start.
    pub ordinal: u32,
    /// Step name.
    pub name: String,
    /// Final status.
    pub status: StepStatus,
    /// `HH:MM:SS` when the step finished.
    pub finished_at: String,
    /// How long the step ran.
    pub duration: Duration,
    /// Formatted display data, empty if none.
    pub details: String,
    /// Failure message for failed steps.
    pub message: Option<String>,
}

impl fmt::Display for StepSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} at {}",
            self.status.marker(),
            self.name,
            self.status.verb(),
            self.finished_at
        )?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if !self.details.is_empty() {
            write!(f, " ({})", self.details)?;
        }
        Ok(())
    }
}
