//! Concrete observer implementations.

use crossbeam_channel::Sender;
use tracing::{debug, error, info, warn};

use crate::event::StepEvent;
use crate::observer::StepObserver;
use crate::snapshot::Snapshot;

/// Observer that ignores everything.
#[derive(Debug, Default)]
pub struct NoOpObserver;

impl NoOpObserver {
    /// Create a new no-op observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StepObserver for NoOpObserver {
    fn on_event(&self, _event: &StepEvent, _snapshot: &Snapshot) {}
}

/// Observer that forwards events through a channel (non-blocking).
pub struct ChannelObserver {
    sender: Sender<StepEvent>,
}

impl ChannelObserver {
    /// Create a new channel observer.
    #[must_use]
    pub fn new(sender: Sender<StepEvent>) -> Self {
        Self { sender }
    }
}

impl StepObserver for ChannelObserver {
    fn on_event(&self, event: &StepEvent, _snapshot: &Snapshot) {
        // A full or disconnected channel drops the event.
        let _ = self.sender.try_send(event.clone());
    }
}

/// Observer that writes lifecycle events to `tracing`.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LoggingObserver {
    /// Create a new logging observer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl StepObserver for LoggingObserver {
    fn on_event(&self, event: &StepEvent, snapshot: &Snapshot) {
        match event {
            StepEvent::TotalDeclared { total } => {
                debug!(total = ?total, "step total declared");
            }
            StepEvent::Started { ordinal, name } => {
                info!(step = %name, ordinal, progress = %snapshot.progress_label(), "Starting step");
            }
            StepEvent::Abandoned(summary) => {
                warn!(step = %summary.name, ordinal = summary.ordinal, "Step abandoned");
            }
            StepEvent::DataUpdated { name, details } => {
                debug!(step = %name, details = %details, "Step data updated");
            }
            StepEvent::Completed(summary) => {
                info!(
                    step = %summary.name,
                    duration = format!("{:.2}s", summary.duration.as_secs_f64()),
                    details = %summary.details,
                    "Step completed"
                );
            }
            StepEvent::Failed(summary) => {
                error!(
                    step = %summary.name,
                    message = summary.message.as_deref().unwrap_or_default(),
                    "Step failed"
                );
            }
            StepEvent::ErrorRecorded { count } => {
                error!(errors = count, step = ?snapshot.current.as_ref().map(|c| c.name.as_str()), "Pipeline error recorded");
            }
            StepEvent::Closed {
                completed,
                failed,
                errors,
            } => {
                info!(completed, failed, errors, elapsed = ?snapshot.elapsed, "Session closed");
            }
        }
    }
}
