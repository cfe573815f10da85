//! Plain sequential printing of step transitions, used when no panel can be
//! drawn.

use std::io::{self, Write};

use parking_lot::Mutex;
use steppanel_core::{Snapshot, StepEvent, StepObserver, StepStatus};
use steppanel_render::PanelTheme;
use tracing::debug;

use crate::config::PlainOutput;

/// Observer that prints one line per step transition.
pub struct PlainReporter {
    out: Mutex<Box<dyn Write + Send>>,
    theme: PanelTheme,
}

impl PlainReporter {
    /// Reporter writing to `out`.
    #[must_use]
    pub fn new(out: Box<dyn Write + Send>, theme: PanelTheme) -> Self {
        Self {
            out: Mutex::new(out),
            theme,
        }
    }

    /// Reporter for a configured output; `None` for [`PlainOutput::Off`].
    #[must_use]
    pub fn for_output(output: PlainOutput, theme: PanelTheme) -> Option<Self> {
        let out: Box<dyn Write + Send> = match output {
            PlainOutput::Stdout => Box::new(io::stdout()),
            PlainOutput::Stderr => Box::new(io::stderr()),
            PlainOutput::Writer(writer) => writer,
            PlainOutput::Off => return None,
        };
        Some(Self::new(out, theme))
    }

    /// The line printed for `event`, if any.
    #[must_use]
    pub fn line_for(&self, event: &StepEvent, snapshot: &Snapshot) -> Option<String> {
        let theme = &self.theme;
        match event {
            StepEvent::Started { ordinal, name } => Some(format!(
                "{} Starting {ordinal}. {name} ({} completed)",
                StepStatus::Running.marker(),
                snapshot.progress_label()
            )),
            StepEvent::Completed(summary) => {
                Some(theme.paint(&theme.success_style(), &summary.to_string()))
            }
            StepEvent::Failed(summary) => {
                Some(theme.paint(&theme.error_style(), &summary.to_string()))
            }
            StepEvent::Abandoned(summary) => {
                Some(theme.paint(&theme.warning_style(), &summary.to_string()))
            }
            StepEvent::ErrorRecorded { count } => Some(
                theme.paint(&theme.error_style(), &format!("Errors: {count}")),
            ),
            StepEvent::Closed {
                completed,
                failed,
                errors,
            } => Some(format!(
                "Finished: {completed} completed, {failed} failed, {errors} errors (elapsed {:.1}s)",
                snapshot.elapsed.as_secs_f64()
            )),
            StepEvent::TotalDeclared { .. } | StepEvent::DataUpdated { .. } => None,
        }
    }
}

impl StepObserver for PlainReporter {
    fn on_event(&self, event: &StepEvent, snapshot: &Snapshot) {
        let Some(line) = self.line_for(event, snapshot) else {
            return;
        };
        let mut out = self.out.lock();
        if let Err(err) = writeln!(out, "{line}").and_then(|()| out.flush()) {
            debug!(error = %err, "plain transition output failed");
        }
    }
}
