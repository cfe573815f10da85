//! Sessions: the step tracker behind a lock, wired to a panel and observers.
//!
//! Every mutation runs under the session lock, then the queued events are
//! published: one redraw of the panel with a fresh snapshot, followed by
//! each event fanned out to the observers. Lock order is session, then
//! renderer; observers must not call back into the session.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use steppanel_core::{
    EventSubject, LoggingObserver, PanelError, Snapshot, StepData, StepHandle, StepSummary,
    StepTracker, StepValue,
};
use steppanel_render::{PanelRenderer, RenderSurface, TerminalSurface};
use tracing::{info, warn};

use crate::config::{SessionConfig, SurfaceChoice};
use crate::plain::PlainReporter;
use crate::scope::StepScope;

/// What a closed session hands back.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport<R = Value> {
    /// State at close.
    pub snapshot: Snapshot,
    /// Every stored step result, by step name.
    pub results: HashMap<String, R>,
    /// Whether the session ran without a panel.
    pub degraded: bool,
}

impl<R> SessionReport<R> {
    /// No failed steps and no recorded errors.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.snapshot.failed == 0 && self.snapshot.errors == 0
    }
}

/// A live status-panel session.
///
/// Methods take `&self`, so a session can be shared between worker threads.
/// After [`close`](Self::close) every call returns `SessionClosed`. Dropping
/// an open session closes it.
pub struct Session<R = Value> {
    tracker: Mutex<Option<StepTracker<R>>>,
    renderer: Option<PanelRenderer>,
    subject: EventSubject,
}

/// Open a session.
///
/// An unusable terminal does not fail: the session falls back to printing
/// transitions plainly and logs one warning.
///
/// # Errors
///
/// Returns `SurfaceAlreadyOwned` if another panel holds the stream.
pub fn begin<R>(config: SessionConfig) -> Result<Session<R>, PanelError> {
    let SessionConfig {
        surface,
        clock,
        tracker: tracker_config,
        mut renderer,
        observers,
        log_events,
        plain_output,
        echo_transitions,
        total_steps,
    } = config;
    renderer.history_capacity = tracker_config.history_capacity;
    let theme = renderer.layout.theme.clone();

    let surface: Option<Box<dyn RenderSurface>> = match surface {
        SurfaceChoice::Terminal(stream) => Some(Box::new(TerminalSurface::new(stream))),
        SurfaceChoice::Custom(surface) => Some(surface),
        SurfaceChoice::Disabled => None,
    };
    let panel = match surface {
        None => None,
        Some(surface) => match PanelRenderer::attach(surface, renderer, Arc::clone(&clock)) {
            Ok(panel) => Some(panel),
            Err(PanelError::SurfaceUnavailable(reason)) => {
                warn!(reason = %reason, "status panel unavailable, printing step transitions instead");
                None
            }
            Err(err) => return Err(err),
        },
    };

    let subject = EventSubject::new();
    if log_events {
        subject.register(Arc::new(LoggingObserver::new()));
    }
    if panel.is_none() || echo_transitions {
        if let Some(reporter) = PlainReporter::for_output(plain_output, theme) {
            subject.register(Arc::new(reporter));
        }
    }
    for observer in observers {
        subject.register(observer);
    }

    let mut tracker = StepTracker::with_clock(tracker_config, clock);
    if total_steps.is_some() {
        tracker.set_total_steps(total_steps);
    }
    info!(panel = panel.is_some(), "session started");

    let session = Session {
        tracker: Mutex::new(None),
        renderer: panel,
        subject,
    };
    session.publish(&mut tracker);
    if let Some(panel) = &session.renderer {
        let _ = panel.redraw(&tracker.snapshot());
    }
    *session.tracker.lock() = Some(tracker);
    Ok(session)
}

/// Run `f` inside a session and close it afterwards, even on early return.
///
/// # Errors
///
/// Errors from [`begin`] or [`Session::close`].
pub fn with_session<R, T, F>(
    config: SessionConfig,
    f: F,
) -> Result<(T, SessionReport<R>), PanelError>
where
    F: FnOnce(&Session<R>) -> T,
{
    let session = begin(config)?;
    let value = f(&session);
    let report = session.close()?;
    Ok((value, report))
}

impl<R> Session<R> {
    fn mutate<T>(&self, f: impl FnOnce(&mut StepTracker<R>) -> T) -> Result<T, PanelError> {
        let mut guard = self.tracker.lock();
        let tracker = guard.as_mut().ok_or(PanelError::SessionClosed)?;
        let out = f(tracker);
        self.publish(tracker);
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(&StepTracker<R>) -> T) -> Result<T, PanelError> {
        let guard = self.tracker.lock();
        guard.as_ref().map(f).ok_or(PanelError::SessionClosed)
    }

    fn publish(&self, tracker: &mut StepTracker<R>) {
        let events = tracker.drain_events();
        if events.is_empty() {
            return;
        }
        let snapshot = tracker.snapshot();
        if let Some(panel) = &self.renderer {
            // A write failure is logged once by the renderer, which then
            // turns into a no-op; the pipeline keeps running.
            let _ = panel.redraw(&snapshot);
        }
        for event in &events {
            self.subject.notify(event, &snapshot);
        }
    }

    /// Declare how many steps to expect; `None` or `Some(0)` means unknown.
    pub fn set_total_steps(&self, total: Option<u32>) -> Result<(), PanelError> {
        self.mutate(|t| t.set_total_steps(total))
    }

    /// Start the next step.
    pub fn start_step(&self, name: impl Into<String>) -> Result<StepHandle, PanelError> {
        self.mutate(|t| t.start_step(name))
    }

    /// Set one display value on the current step. `Ok(false)` when no step runs.
    pub fn update_step_data(
        &self,
        key: impl Into<String>,
        value: impl Into<StepValue>,
    ) -> Result<bool, PanelError> {
        self.mutate(|t| t.update_step_data(key, value))
    }

    /// Merge display values into the current step. `Ok(false)` when no step runs.
    pub fn merge_step_data(&self, data: StepData) -> Result<bool, PanelError> {
        self.mutate(|t| t.merge_step_data(data))
    }

    /// Mark a step (the current one when `name` is `None`) as failed.
    pub fn fail_step(
        &self,
        name: Option<&str>,
        message: impl Into<String>,
    ) -> Result<StepSummary, PanelError> {
        self.mutate(|t| t.fail_step(name, message))?
    }

    /// Count a pipeline error; returns the new count.
    pub fn record_error(&self) -> Result<u64, PanelError> {
        self.mutate(StepTracker::record_error)
    }

    /// Current state.
    pub fn snapshot(&self) -> Result<Snapshot, PanelError> {
        self.read(StepTracker::snapshot)
    }

    /// Name of the running step.
    pub fn current_step(&self) -> Result<Option<String>, PanelError> {
        self.read(|t| t.current_step().map(str::to_string))
    }

    /// Whether `name` is running or abandoned.
    pub fn is_unfinished(&self, name: &str) -> Result<bool, PanelError> {
        self.read(|t| t.is_unfinished(name))
    }

    /// Whether the session runs without a panel.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.renderer.is_none()
    }

    /// The panel renderer, if one is attached.
    #[must_use]
    pub fn renderer(&self) -> Option<&PanelRenderer> {
        self.renderer.as_ref()
    }

    /// Whether `close` has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tracker.lock().is_none()
    }

    /// Finish the session: final redraw, ticker stop, surface release.
    ///
    /// The panel is left on screen.
    pub fn close(&self) -> Result<SessionReport<R>, PanelError> {
        let mut guard = self.tracker.lock();
        let tracker = guard.take().ok_or(PanelError::SessionClosed)?;
        Ok(self.shutdown(tracker))
    }

    fn shutdown(&self, mut tracker: StepTracker<R>) -> SessionReport<R> {
        tracker.mark_closed();
        self.publish(&mut tracker);
        if let Some(panel) = &self.renderer {
            panel.detach();
        }
        let snapshot = tracker.snapshot();
        info!(
            completed = snapshot.completed,
            failed = snapshot.failed,
            errors = snapshot.errors,
            "session closed"
        );
        SessionReport {
            snapshot,
            results: tracker.into_results(),
            degraded: self.renderer.is_none(),
        }
    }
}

impl<R: Clone> Session<R> {
    /// Complete a step (the current one when `name` is `None`), storing and
    /// returning its result.
    pub fn complete_step(
        &self,
        name: Option<&str>,
        result: Option<R>,
        final_data: StepData,
    ) -> Result<Option<R>, PanelError> {
        self.mutate(|t| t.complete_step(name, result, final_data))?
    }

    /// Stored result of a completed step.
    pub fn get_result(&self, name: &str) -> Result<Option<R>, PanelError> {
        self.read(|t| t.get_result(name).cloned())
    }

    /// Start a step and get a guard that fails it if dropped unfinished.
    pub fn step(&self, name: impl Into<String>) -> Result<StepScope<'_, R>, PanelError> {
        let handle = self.start_step(name)?;
        Ok(StepScope::new(self, handle))
    }
}

impl<R> Drop for Session<R> {
    fn drop(&mut self) {
        if let Some(tracker) = self.tracker.get_mut().take() {
            self.shutdown(tracker);
        }
    }
}
