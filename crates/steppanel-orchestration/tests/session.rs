//! Integration tests for sessions, step scopes, and pipelines.

use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;
use serde_json::{json, Value};

use steppanel_core::{
    CancellationToken, ChannelObserver, ManualClock, PanelError, StepData, StepEvent, StepStatus,
};
use steppanel_orchestration::{
    begin, with_session, FailurePolicy, Pipeline, PlainOutput, Session, SessionConfig,
};
use steppanel_render::{MemorySurface, PanelLayout, PanelTheme, RendererConfig};

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).to_string()
    }
}

fn renderer() -> RendererConfig {
    RendererConfig::default()
        .with_tick_interval(None)
        .with_layout(PanelLayout::default().with_theme(PanelTheme::plain()))
}

fn panel_config(surface: &MemorySurface, clock: &ManualClock) -> SessionConfig {
    SessionConfig::default()
        .with_surface(surface.clone())
        .with_clock(Arc::new(clock.clone()))
        .with_renderer(renderer())
        .with_logging(false)
}

fn headless(out: &Buffer) -> SessionConfig {
    SessionConfig::default()
        .headless()
        .with_clock(Arc::new(ManualClock::at_noon()))
        .with_renderer(renderer())
        .with_logging(false)
        .with_plain_output(PlainOutput::Writer(Box::new(out.clone())))
}

#[test]
fn panel_tracks_progress_and_errors() {
    let surface = MemorySurface::new(30, 70);
    let clock = ManualClock::at_noon();
    let session: Session = begin(panel_config(&surface, &clock)).unwrap();
    assert!(!session.is_degraded());

    session.set_total_steps(Some(4)).unwrap();
    session.start_step("Load").unwrap();
    clock.advance(Duration::from_secs(1));
    session
        .complete_step(None, Some(json!({"n": 10})), StepData::new())
        .unwrap();
    assert!(surface.row(2).contains("Progress: 1/4 steps completed"));

    session.start_step("Process").unwrap();
    session.record_error().unwrap();
    session.record_error().unwrap();
    assert!(surface.row(3).contains("Errors: 2"));
    session.complete_step(None, None, StepData::new()).unwrap();
    assert!(surface.row(2).contains("Progress: 2/4 steps completed"));
    assert_eq!(session.get_result("Load").unwrap(), Some(json!({"n": 10})));

    let report = session.close().unwrap();
    assert_eq!(report.snapshot.errors, 2);
    assert!(!report.is_success());
    assert_eq!(report.results["Load"], json!({"n": 10}));
    assert_eq!(surface.scroll_region(), None);
}

#[test]
fn calls_after_close_fail() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    session.close().unwrap();
    assert!(session.is_closed());
    assert_eq!(session.start_step("x").unwrap_err(), PanelError::SessionClosed);
    assert_eq!(session.record_error().unwrap_err(), PanelError::SessionClosed);
    assert_eq!(session.snapshot().unwrap_err(), PanelError::SessionClosed);
    assert_eq!(session.close().unwrap_err(), PanelError::SessionClosed);
}

#[test]
fn unavailable_surface_degrades_to_plain_output() {
    let out = Buffer::default();
    let config = SessionConfig::default()
        .with_surface(MemorySurface::unavailable("not a terminal"))
        .with_clock(Arc::new(ManualClock::at_noon()))
        .with_logging(false)
        .with_renderer(renderer())
        .with_plain_output(PlainOutput::Writer(Box::new(out.clone())));
    let session: Session = begin(config).unwrap();
    assert!(session.is_degraded());
    session.start_step("Load").unwrap();
    session.complete_step(None, None, StepData::new()).unwrap();
    let report = session.close().unwrap();
    assert!(report.degraded);
    let text = out.text();
    assert!(text.contains("› Starting 1. Load"));
    assert!(text.contains("✓ Load completed at 12:00:00"));
    assert!(text.contains("Finished: 1 completed, 0 failed, 0 errors"));
}

#[test]
fn echo_prints_transitions_under_the_panel() {
    let surface = MemorySurface::new(30, 70);
    let clock = ManualClock::at_noon();
    let out = Buffer::default();
    let config = panel_config(&surface, &clock)
        .with_echo(true)
        .with_plain_output(PlainOutput::Writer(Box::new(out.clone())));
    let session: Session = begin(config).unwrap();
    assert!(!session.is_degraded());
    session.set_total_steps(Some(2)).unwrap();
    session.start_step("Load").unwrap();
    session.complete_step(None, None, StepData::new()).unwrap();
    assert!(surface.row(2).contains("Progress: 1/2 steps completed"));
    session.close().unwrap();
    assert_eq!(
        out.text(),
        "› Starting 1. Load (0/2 completed)\n\
         ✓ Load completed at 12:00:00\n\
         Finished: 1 completed, 0 failed, 0 errors (elapsed 0.0s)\n"
    );
}

#[test]
fn panel_without_echo_prints_nothing() {
    let surface = MemorySurface::new(30, 70);
    let clock = ManualClock::at_noon();
    let out = Buffer::default();
    let config = panel_config(&surface, &clock)
        .with_plain_output(PlainOutput::Writer(Box::new(out.clone())));
    let session: Session = begin(config).unwrap();
    session.start_step("Load").unwrap();
    session.complete_step(None, None, StepData::new()).unwrap();
    session.close().unwrap();
    assert!(out.text().is_empty());
}

#[test]
fn second_session_on_same_surface_is_rejected() {
    let surface = MemorySurface::new(30, 70);
    let clock = ManualClock::at_noon();
    let first: Session = begin(panel_config(&surface, &clock)).unwrap();
    let second = begin::<Value>(panel_config(&surface, &clock));
    assert!(matches!(second, Err(PanelError::SurfaceAlreadyOwned)));
    drop(first);
    let third = begin::<Value>(panel_config(&surface, &clock));
    assert!(third.is_ok());
}

#[test]
fn drop_closes_session() {
    let surface = MemorySurface::new(30, 70);
    let clock = ManualClock::at_noon();
    let (tx, rx) = crossbeam_channel::unbounded();
    let config = panel_config(&surface, &clock).with_observer(Arc::new(ChannelObserver::new(tx)));
    {
        let session: Session = begin(config).unwrap();
        session.start_step("Load").unwrap();
    }
    let events: Vec<StepEvent> = rx.try_iter().collect();
    assert!(matches!(events.last(), Some(StepEvent::Closed { .. })));
    assert_eq!(surface.scroll_region(), None);
}

#[test]
fn abandoned_step_is_reported() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    session.start_step("A").unwrap();
    let handle = session.start_step("B").unwrap();
    assert_eq!(handle.abandoned.as_deref(), Some("A"));
    let snap = session.snapshot().unwrap();
    assert!(snap.history.iter().all(|s| s.name != "A"));
    assert_eq!(snap.abandoned[0].name, "A");
    assert_eq!(snap.abandoned[0].status, StepStatus::Abandoned);
    assert!(out.text().contains("⚠ A abandoned at 12:00:00"));
}

#[test]
fn scope_completes_with_result() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    {
        let scope = session.step("Load").unwrap();
        assert_eq!(scope.ordinal(), 1);
        assert!(scope.update("lines_processed", 1000).unwrap());
        scope
            .complete(Some(json!(42)), StepData::new().with("processing_time", 1.5))
            .unwrap();
    }
    let snap = session.snapshot().unwrap();
    assert_eq!(snap.history[0].details, "1,000 lines, 1.50s");
    assert_eq!(snap.errors, 0);
    assert_eq!(session.get_result("Load").unwrap(), Some(json!(42)));
}

#[test]
fn dropped_scope_fails_step_and_counts_error() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    {
        let _scope = session.step("Save").unwrap();
    }
    let snap = session.snapshot().unwrap();
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.failed, 1);
    assert_eq!(snap.history[0].status, StepStatus::Failed);
    assert_eq!(
        snap.history[0].message.as_deref(),
        Some("step exited without completing")
    );
    assert!(snap.current.is_none());
}

#[test]
fn panicking_scope_fails_step() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let _scope = session.step("Analyze").unwrap();
        panic!("boom");
    }));
    assert!(outcome.is_err());
    let snap = session.snapshot().unwrap();
    assert_eq!(snap.history[0].message.as_deref(), Some("step panicked"));
    assert_eq!(snap.errors, 1);
}

#[test]
fn scope_finished_through_session_is_not_failed_again() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    {
        let _scope = session.step("Load").unwrap();
        session.complete_step(Some("Load"), None, StepData::new()).unwrap();
    }
    let snap = session.snapshot().unwrap();
    assert_eq!(snap.history.len(), 1);
    assert_eq!(snap.errors, 0);
}

#[test]
fn step_finished_through_session_is_not_finished_again() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    let report = Pipeline::new()
        .step("Load", |_| Ok(None))
        .step("Extra", |s| {
            s.update("records_found", 2)?;
            session.complete_step(None, Some(json!("early")), StepData::new())?;
            Ok(Some(json!("late")))
        })
        .run(&session)
        .unwrap();
    assert_eq!(report.completed, vec!["Load", "Extra"]);
    let snap = session.snapshot().unwrap();
    assert_eq!((snap.started, snap.completed), (2, 2));
    let names: Vec<&str> = snap.history.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["Load", "Extra"]);
    assert_eq!(session.get_result("Extra").unwrap(), Some(json!("early")));
    assert_eq!(
        session
            .complete_step(Some("Extra"), None, StepData::new())
            .unwrap_err(),
        PanelError::UnknownStep("Extra".into())
    );
    assert_eq!(session.snapshot().unwrap().completed, 2);
}

#[test]
fn pipeline_abort_stops_after_first_failure() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    let report = Pipeline::new()
        .step("Load", |s| {
            s.update("records_found", 3)?;
            Ok(Some(json!(3)))
        })
        .step("Process", |_| bail!("bad record"))
        .step("Save", |_| Ok(None))
        .run(&session)
        .unwrap();
    assert_eq!(report.completed, vec!["Load"]);
    assert_eq!(report.failed, vec![("Process".to_string(), "bad record".to_string())]);
    assert_eq!(report.skipped, vec!["Save"]);
    let snap = session.snapshot().unwrap();
    assert_eq!(snap.total_steps, Some(3));
    assert_eq!(snap.errors, 1);
    assert_eq!(snap.failed, 1);
    assert_eq!(session.get_result("Load").unwrap(), Some(json!(3)));
}

#[test]
fn pipeline_continue_runs_everything() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    let report = Pipeline::new()
        .with_policy(FailurePolicy::Continue)
        .step("A", |_| bail!("first"))
        .step("B", |_| Ok(None))
        .step("C", |_| bail!("third"))
        .run(&session)
        .unwrap();
    assert_eq!(report.completed, vec!["B"]);
    assert_eq!(report.failed.len(), 2);
    assert!(report.skipped.is_empty());
    assert_eq!(session.snapshot().unwrap().errors, 2);
}

#[test]
fn pipeline_keeps_declared_total() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out).with_total_steps(Some(10))).unwrap();
    Pipeline::new().step("A", |_| Ok(None)).run(&session).unwrap();
    assert_eq!(session.snapshot().unwrap().total_steps, Some(10));
}

#[test]
fn pipeline_honours_cancellation() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    let token = CancellationToken::new();
    let inner = token.clone();
    let report = Pipeline::new()
        .with_cancellation(token)
        .step("A", move |_| {
            inner.cancel();
            Ok(None)
        })
        .step("B", |_| Ok(None))
        .run(&session)
        .unwrap();
    assert!(report.cancelled);
    assert_eq!(report.completed, vec!["A"]);
    assert_eq!(report.skipped, vec!["B"]);
    assert!(!report.is_success());
}

#[test]
fn with_session_returns_value_and_report() {
    let out = Buffer::default();
    let (value, report) = with_session::<Value, _, _>(headless(&out), |session| {
        session.start_step("Only").unwrap();
        session
            .complete_step(None, Some(json!("done")), StepData::new())
            .unwrap()
    })
    .unwrap();
    assert_eq!(value, Some(json!("done")));
    assert!(report.is_success());
    assert_eq!(report.snapshot.completed, 1);
}

#[test]
fn workers_share_a_session() {
    let out = Buffer::default();
    let session: Session = begin(headless(&out)).unwrap();
    session.start_step("Parallel").unwrap();
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    session.record_error().unwrap();
                }
            });
        }
    });
    assert_eq!(session.snapshot().unwrap().errors, 100);
}

#[test]
fn write_failure_keeps_pipeline_running() {
    let surface = MemorySurface::new(30, 70).fail_after(3);
    let clock = ManualClock::at_noon();
    let session: Session = begin(panel_config(&surface, &clock)).unwrap();
    for i in 0..5 {
        session.start_step(format!("step {i}")).unwrap();
        session.complete_step(None, None, StepData::new()).unwrap();
    }
    assert!(session.renderer().unwrap().is_disabled());
    assert_eq!(session.snapshot().unwrap().completed, 5);
    session.close().unwrap();
}
