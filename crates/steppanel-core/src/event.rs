//! Lifecycle events emitted for every tracker mutation.

use crate::step::StepSummary;

/// A tracker mutation, as reported to observers.
#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    /// The expected step count was declared or changed.
    TotalDeclared { total: Option<u32> },
    /// A step started running.
    Started { ordinal: u32, name: String },
    /// A running step was superseded by a new `start_step`.
    Abandoned(StepSummary),
    /// Display data of the current step changed.
    DataUpdated { name: String, details: String },
    /// A step completed.
    Completed(StepSummary),
    /// A step failed.
    Failed(StepSummary),
    /// A pipeline error was recorded.
    ErrorRecorded { count: u64 },
    /// The session ended.
    Closed { completed: u32, failed: u32, errors: u64 },
}

impl StepEvent {
    /// Short event name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StepEvent::TotalDeclared { .. } => "total_declared",
            StepEvent::Started { .. } => "started",
            StepEvent::Abandoned(_) => "abandoned",
            StepEvent::DataUpdated { .. } => "data_updated",
            StepEvent::Completed(_) => "completed",
            StepEvent::Failed(_) => "failed",
            StepEvent::ErrorRecorded { .. } => "error_recorded",
            StepEvent::Closed { .. } => "closed",
        }
    }
}
