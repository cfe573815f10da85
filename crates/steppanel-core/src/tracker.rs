//! Step tracker: the state machine behind the status panel.
//!
//! The tracker owns step lifecycle, counters, per-step display data, the
//! bounded history ring and stored results. It is single-owner state; a
//! session wraps it in a mutex to serialize concurrent pipeline workers.
//! Every mutation queues [`StepEvent`]s which the owner drains with
//! [`StepTracker::drain_events`] and fans out together with a fresh
//! [`Snapshot`].

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::SystemTime;

use serde_json::Value;
use tracing::{debug, warn};

use crate::clock::{elapsed_between, Clock, SystemClock};
use crate::constants::DEFAULT_HISTORY_CAPACITY;
use crate::error::PanelError;
use crate::event::StepEvent;
use crate::format::DataFormatter;
use crate::snapshot::{CurrentStep, Snapshot};
use crate::step::{ActiveStep, StepHandle, StepStatus, StepSummary};
use crate::value::{StepData, StepValue};

/// Tracker settings.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Finished steps kept for display.
    pub history_capacity: usize,
    /// Phrasing of display data.
    pub formatter: DataFormatter,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            formatter: DataFormatter::new(),
        }
    }
}

impl TrackerConfig {
    /// Set the history ring capacity.
    #[must_use]
    pub fn with_history_capacity(mut self, capacity: usize) -> Self {
        self.history_capacity = capacity;
        self
    }

    /// Set the data formatter.
    #[must_use]
    pub fn with_formatter(mut self, formatter: DataFormatter) -> Self {
        self.formatter = formatter;
        self
    }
}

/// A started step that has not finished yet.
#[derive(Debug, Clone)]
struct KnownStep {
    ordinal: u32,
    started_at: SystemTime,
    data: StepData,
}

/// Step lifecycle state machine, generic over the stored result payload.
pub struct StepTracker<R = Value> {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    created_at: SystemTime,
    total_steps: Option<u32>,
    last_ordinal: u32,
    current: Option<ActiveStep>,
    known: HashMap<String, KnownStep>,
    history: VecDeque<StepSummary>,
    hidden_history: usize,
    abandoned: Vec<StepSummary>,
    completed: u32,
    failed: u32,
    errors: u64,
    results: HashMap<String, R>,
    pending: Vec<StepEvent>,
}

impl<R> StepTracker<R> {
    /// Tracker on the system clock with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(TrackerConfig::default(), Arc::new(SystemClock))
    }

    /// Tracker with explicit settings and clock.
    #[must_use]
    pub fn with_clock(config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        let created_at = clock.now();
        Self {
            config,
            clock,
            created_at,
            total_steps: None,
            last_ordinal: 0,
            current: None,
            known: HashMap::new(),
            history: VecDeque::new(),
            hidden_history: 0,
            abandoned: Vec::new(),
            completed: 0,
            failed: 0,
            errors: 0,
            results: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// Declare the expected number of steps; `None` or zero means unknown.
    pub fn set_total_steps(&mut self, total: Option<u32>) {
        self.total_steps = total;
        self.pending.push(StepEvent::TotalDeclared { total });
    }

    /// Start a new step.
    ///
    /// A previous step that is still running is moved to the abandoned list
    /// and reported, never silently dropped.
    pub fn start_step(&mut self, name: impl Into<String>) -> StepHandle {
        let name = name.into();
        let now = self.clock.now();

        let mut abandoned = None;
        if let Some(previous) = self.current.take() {
            let summary = self.summarize(
                previous.ordinal,
                &previous.name,
                StepStatus::Abandoned,
                previous.started_at,
                &previous.data,
                None,
            );
            warn!(
                step = %previous.name,
                ordinal = previous.ordinal,
                next = %name,
                "step abandoned before completion"
            );
            self.abandoned.retain(|s| s.name != previous.name);
            self.abandoned.push(summary.clone());
            self.pending.push(StepEvent::Abandoned(summary));
            self.known.insert(
                previous.name.clone(),
                KnownStep {
                    ordinal: previous.ordinal,
                    started_at: previous.started_at,
                    data: previous.data,
                },
            );
            abandoned = Some(previous.name);
        }

        // A restarted step supersedes its stale abandoned entry.
        self.abandoned.retain(|s| s.name != name);

        self.last_ordinal += 1;
        let ordinal = self.last_ordinal;
        debug!(step = %name, ordinal, "step started");
        self.current = Some(ActiveStep::new(ordinal, name.clone(), now));
        self.known.insert(
            name.clone(),
            KnownStep {
                ordinal,
                started_at: now,
                data: StepData::new(),
            },
        );
        self.pending.push(StepEvent::Started {
            ordinal,
            name: name.clone(),
        });

        StepHandle {
            ordinal,
            name,
            abandoned,
        }
    }

    /// Merge one value into the current step's data.
    ///
    /// Returns `false` (and logs a warning) when no step is running.
    pub fn update_step_data(&mut self, key: impl Into<String>, value: impl Into<StepValue>) -> bool {
        let mut data = StepData::new();
        data.insert(key, value);
        self.merge_step_data(data)
    }

    /// Merge a map of values into the current step's data.
    pub fn merge_step_data(&mut self, data: StepData) -> bool {
        let Some(current) = self.current.as_mut() else {
            warn!(keys = data.len(), "step data update ignored: no step is running");
            return false;
        };
        current.data.merge(data);
        let details = self.config.formatter.format(&current.data);
        self.pending.push(StepEvent::DataUpdated {
            name: current.name.clone(),
            details,
        });
        true
    }

    /// Mark a step (the current one when `name` is `None`) as failed.
    ///
    /// The error counter is left alone; callers record errors separately.
    pub fn fail_step(
        &mut self,
        name: Option<&str>,
        message: impl Into<String>,
    ) -> Result<StepSummary, PanelError> {
        self.finish(name, StepStatus::Failed, Some(message.into()), StepData::new())
    }

    /// Count a pipeline error. Step status is not affected.
    pub fn record_error(&mut self) -> u64 {
        self.errors += 1;
        self.pending
            .push(StepEvent::ErrorRecorded { count: self.errors });
        self.errors
    }

    /// Stored result of a completed step.
    #[must_use]
    pub fn get_result(&self, name: &str) -> Option<&R> {
        self.results.get(name)
    }

    /// All stored results.
    #[must_use]
    pub fn results(&self) -> &HashMap<String, R> {
        &self.results
    }

    /// Consume the tracker, keeping only its results.
    #[must_use]
    pub fn into_results(self) -> HashMap<String, R> {
        self.results
    }

    /// Name of the running step.
    #[must_use]
    pub fn current_step(&self) -> Option<&str> {
        self.current.as_ref().map(|s| s.name.as_str())
    }

    /// Whether `name` was started and has not finished (running or abandoned).
    #[must_use]
    pub fn is_unfinished(&self, name: &str) -> bool {
        self.current_step() == Some(name) || self.abandoned.iter().any(|s| s.name == name)
    }

    /// Recorded error count.
    #[must_use]
    pub fn errors(&self) -> u64 {
        self.errors
    }

    /// Configured history capacity.
    #[must_use]
    pub fn history_capacity(&self) -> usize {
        self.config.history_capacity
    }

    /// Queue the session-closed event.
    pub fn mark_closed(&mut self) {
        self.pending.push(StepEvent::Closed {
            completed: self.completed,
            failed: self.failed,
            errors: self.errors,
        });
    }

    /// Take the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<StepEvent> {
        std::mem::take(&mut self.pending)
    }

    /// Freeze the current state.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let now = self.clock.now();
        let current = self.current.as_ref().map(|step| CurrentStep {
            ordinal: step.ordinal,
            name: step.name.clone(),
            data: step.data.clone(),
            details: self.config.formatter.format(&step.data),
            started_at: step.started_at,
            elapsed: elapsed_between(step.started_at, now),
        });
        Snapshot {
            total_steps: self.total_steps,
            started: self.last_ordinal,
            completed: self.completed,
            failed: self.failed,
            errors: self.errors,
            current,
            history: self.history.iter().cloned().collect(),
            hidden_history: self.hidden_history,
            abandoned: self.abandoned.clone(),
            created_at: self.created_at,
            taken_at: now,
            time_label: self.clock.format_time(now),
            elapsed: elapsed_between(self.created_at, now),
        }
    }

    fn finish(
        &mut self,
        name: Option<&str>,
        status: StepStatus,
        message: Option<String>,
        final_data: StepData,
    ) -> Result<StepSummary, PanelError> {
        let is_current = match (name, self.current.as_ref()) {
            (None, Some(_)) => true,
            (None, None) => return Err(PanelError::NoCurrentStep),
            (Some(n), Some(current)) => current.name == n,
            (Some(_), None) => false,
        };

        // Only running or abandoned steps can finish; `known` holds exactly those.
        let (ordinal, step_name, started_at, mut data) = if is_current {
            let step = self.current.take().ok_or(PanelError::NoCurrentStep)?;
            self.known.remove(&step.name);
            (step.ordinal, step.name, step.started_at, step.data)
        } else {
            let n = name.unwrap_or_default();
            let known = self
                .known
                .remove(n)
                .ok_or_else(|| PanelError::UnknownStep(n.to_string()))?;
            self.abandoned.retain(|s| s.name != n);
            (known.ordinal, n.to_string(), known.started_at, known.data)
        };

        data.merge(final_data);
        let summary = self.summarize(ordinal, &step_name, status, started_at, &data, message);
        debug!(step = %step_name, ordinal, status = status.verb(), "step finished");

        self.push_history(summary.clone());
        match status {
            StepStatus::Failed => {
                self.failed += 1;
                self.pending.push(StepEvent::Failed(summary.clone()));
            }
            _ => {
                self.completed += 1;
                self.pending.push(StepEvent::Completed(summary.clone()));
            }
        }
        Ok(summary)
    }

    fn push_history(&mut self, summary: StepSummary) {
        if self.config.history_capacity == 0 {
            self.hidden_history += 1;
            return;
        }
        while self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
            self.hidden_history += 1;
        }
        self.history.push_back(summary);
    }

    fn summarize(
        &self,
        ordinal: u32,
        name: &str,
        status: StepStatus,
        started_at: SystemTime,
        data: &StepData,
        message: Option<String>,
    ) -> StepSummary {
        let now = self.clock.now();
        StepSummary {
            ordinal,
            name: name.to_string(),
            status,
            finished_at: self.clock.format_time(now),
            duration: elapsed_between(started_at, now),
            details: self.config.formatter.format(data),
            message,
        }
    }
}

impl<R: Clone> StepTracker<R> {
    /// Complete a step (the current one when `name` is `None`).
    ///
    /// The result is stored under the step name, replacing any earlier one,
    /// and handed back unchanged.
    pub fn complete_step(
        &mut self,
        name: Option<&str>,
        result: Option<R>,
        final_data: StepData,
    ) -> Result<Option<R>, PanelError> {
        let summary = self.finish(name, StepStatus::Completed, None, final_data)?;
        if let Some(value) = &result {
            self.results.insert(summary.name.clone(), value.clone());
        }
        Ok(result)
    }
}

impl<R> Default for StepTracker<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::clock::ManualClock;

    fn tracker() -> (StepTracker, ManualClock) {
        let clock = ManualClock::at_noon();
        let t = StepTracker::with_clock(TrackerConfig::default(), Arc::new(clock.clone()));
        (t, clock)
    }

    #[test]
    fn ordinals_increase_from_one() {
        let (mut t, _) = tracker();
        let a = t.start_step("A");
        t.complete_step(None, None, StepData::new()).unwrap();
        let b = t.start_step("B");
        let c = t.start_step("C");
        assert_eq!((a.ordinal, b.ordinal, c.ordinal), (1, 2, 3));
        assert_eq!(t.snapshot().started, 3);
    }

    #[test]
    fn complete_without_name_targets_current() {
        let (mut t, _) = tracker();
        t.start_step("Load");
        let out = t
            .complete_step(None, Some(json!({"n": 10})), StepData::new())
            .unwrap();
        assert_eq!(out, Some(json!({"n": 10})));
        assert_eq!(t.get_result("Load"), Some(&json!({"n": 10})));
        assert!(t.current_step().is_none());
    }

    #[test]
    fn result_overwrite_by_name() {
        let (mut t, _) = tracker();
        t.start_step("Load");
        t.complete_step(None, Some(json!(1)), StepData::new()).unwrap();
        t.start_step("Load");
        t.complete_step(None, Some(json!(2)), StepData::new()).unwrap();
        assert_eq!(t.get_result("Load"), Some(&json!(2)));
    }

    #[test]
    fn complete_unknown_step_is_rejected() {
        let (mut t, _) = tracker();
        t.start_step("A");
        let err = t
            .complete_step(Some("Nope"), None, StepData::new())
            .unwrap_err();
        assert_eq!(err, PanelError::UnknownStep("Nope".into()));
        // State is untouched.
        assert_eq!(t.current_step(), Some("A"));
        assert_eq!(t.snapshot().completed, 0);
    }

    #[test]
    fn complete_without_current_is_rejected() {
        let (mut t, _) = tracker();
        let err = t.complete_step(None, None, StepData::new()).unwrap_err();
        assert_eq!(err, PanelError::NoCurrentStep);
    }

    #[test]
    fn update_without_current_is_noop() {
        let (mut t, _) = tracker();
        assert!(!t.update_step_data("lines_processed", 10));
        assert!(t.drain_events().is_empty());
    }

    #[test]
    fn update_merges_and_formats() {
        let (mut t, _) = tracker();
        t.start_step("Load");
        assert!(t.update_step_data("records_found", 1500));
        assert!(t.update_step_data("lines_processed", 2000));
        t.update_step_data("records_found", 1600);
        let snap = t.snapshot();
        let current = snap.current.unwrap();
        assert_eq!(current.details, "1,600 records, 2,000 lines");
    }

    #[test]
    fn final_data_is_merged_into_summary() {
        let (mut t, clock) = tracker();
        t.start_step("Load");
        t.update_step_data("lines_processed", 1000);
        clock.advance(Duration::from_secs(1));
        t.complete_step(None, None, StepData::new().with("processing_time", 1.5))
            .unwrap();
        let snap = t.snapshot();
        assert_eq!(
            snap.history[0].to_string(),
            "✓ Load completed at 12:00:01 (1,000 lines, 1.50s)"
        );
        assert_eq!(snap.history[0].duration, Duration::from_secs(1));
    }

    #[test]
    fn start_abandons_running_step() {
        let (mut t, _) = tracker();
        t.start_step("A");
        let handle = t.start_step("B");
        assert_eq!(handle.abandoned.as_deref(), Some("A"));
        let snap = t.snapshot();
        assert!(snap.history.is_empty());
        assert_eq!(snap.abandoned.len(), 1);
        assert_eq!(snap.abandoned[0].name, "A");
        assert_eq!(snap.abandoned[0].status, StepStatus::Abandoned);
        let events = t.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, StepEvent::Abandoned(s) if s.name == "A")));
    }

    #[test]
    fn abandoned_step_can_still_complete() {
        let (mut t, _) = tracker();
        t.start_step("A");
        t.update_step_data("records_found", 5);
        t.start_step("B");
        assert!(t.is_unfinished("A"));
        assert!(t.is_unfinished("B"));
        t.complete_step(Some("A"), Some(json!("late")), StepData::new())
            .unwrap();
        assert!(!t.is_unfinished("A"));
        let snap = t.snapshot();
        assert!(snap.abandoned.is_empty());
        assert_eq!(snap.history[0].name, "A");
        assert_eq!(snap.history[0].ordinal, 1);
        assert_eq!(snap.history[0].details, "5 records");
        assert_eq!(snap.current.unwrap().name, "B");
        assert_eq!(t.get_result("A"), Some(&json!("late")));
    }

    #[test]
    fn finished_step_cannot_finish_again() {
        let (mut t, _) = tracker();
        t.set_total_steps(Some(4));
        t.start_step("Load");
        t.complete_step(None, None, StepData::new()).unwrap();
        for _ in 0..2 {
            let err = t
                .complete_step(Some("Load"), None, StepData::new())
                .unwrap_err();
            assert_eq!(err, PanelError::UnknownStep("Load".into()));
        }
        assert_eq!(
            t.fail_step(Some("Load"), "late").unwrap_err(),
            PanelError::UnknownStep("Load".into())
        );
        let snap = t.snapshot();
        assert_eq!((snap.started, snap.completed, snap.failed), (1, 1, 0));
        assert_eq!(snap.progress_label(), "1/4");
        assert_eq!(snap.history.len(), 1);
    }

    #[test]
    fn failed_abandoned_step_cannot_finish_again() {
        let (mut t, _) = tracker();
        t.start_step("A");
        t.start_step("B");
        t.fail_step(Some("A"), "gave up").unwrap();
        assert!(t.complete_step(Some("A"), None, StepData::new()).is_err());
        let snap = t.snapshot();
        assert_eq!((snap.completed, snap.failed), (0, 1));
        assert_eq!(snap.current.unwrap().name, "B");
    }

    #[test]
    fn restart_drops_stale_abandoned_entry() {
        let (mut t, _) = tracker();
        t.start_step("Load");
        t.start_step("Other");
        assert_eq!(t.snapshot().abandoned.len(), 1);
        t.start_step("Load");
        let snap = t.snapshot();
        let abandoned: Vec<&str> = snap.abandoned.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(abandoned, vec!["Other"]);
        t.complete_step(Some("Load"), None, StepData::new()).unwrap();
        let snap = t.snapshot();
        assert_eq!(snap.history[0].ordinal, 3);
        assert!(t.current_step().is_none());
        assert!(!t.is_unfinished("Load"));
    }

    #[test]
    fn history_ring_is_bounded() {
        let clock = ManualClock::at_noon();
        let config = TrackerConfig::default().with_history_capacity(2);
        let mut t: StepTracker = StepTracker::with_clock(config, Arc::new(clock));
        for (i, name) in ["A", "B", "C"].iter().enumerate() {
            t.start_step(*name);
            t.complete_step(None, Some(json!(i)), StepData::new()).unwrap();
        }
        let snap = t.snapshot();
        let names: Vec<&str> = snap.history.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C"]);
        assert_eq!(snap.hidden_history, 1);
        assert_eq!(t.get_result("A"), Some(&json!(0)));
    }

    #[test]
    fn zero_capacity_hides_everything() {
        let clock = ManualClock::at_noon();
        let config = TrackerConfig::default().with_history_capacity(0);
        let mut t: StepTracker = StepTracker::with_clock(config, Arc::new(clock));
        t.start_step("A");
        t.complete_step(None, None, StepData::new()).unwrap();
        let snap = t.snapshot();
        assert!(snap.history.is_empty());
        assert_eq!(snap.hidden_history, 1);
        assert_eq!(snap.completed, 1);
    }

    #[test]
    fn errors_do_not_change_status() {
        let (mut t, _) = tracker();
        t.start_step("Process");
        assert_eq!(t.record_error(), 1);
        assert_eq!(t.record_error(), 2);
        assert_eq!(t.current_step(), Some("Process"));
        t.complete_step(None, None, StepData::new()).unwrap();
        let snap = t.snapshot();
        assert_eq!(snap.errors, 2);
        assert_eq!(snap.history[0].status, StepStatus::Completed);
    }

    #[test]
    fn fail_step_records_message() {
        let (mut t, _) = tracker();
        t.start_step("Save");
        let summary = t.fail_step(None, "disk full").unwrap();
        assert_eq!(summary.status, StepStatus::Failed);
        let snap = t.snapshot();
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.completed, 0);
        assert_eq!(snap.errors, 0);
        assert_eq!(
            snap.history[0].to_string(),
            "✗ Save failed at 12:00:00: disk full"
        );
    }

    #[test]
    fn events_follow_mutations() {
        let (mut t, _) = tracker();
        t.set_total_steps(Some(2));
        t.start_step("A");
        t.update_step_data("x", 1);
        t.record_error();
        t.complete_step(None, None, StepData::new()).unwrap();
        let kinds: Vec<&str> = t.drain_events().iter().map(StepEvent::kind).collect();
        assert_eq!(
            kinds,
            vec!["total_declared", "started", "data_updated", "error_recorded", "completed"]
        );
        assert!(t.drain_events().is_empty());
    }

    #[test]
    fn snapshot_elapsed_follows_clock() {
        let (mut t, clock) = tracker();
        t.start_step("A");
        clock.advance(Duration::from_secs(2));
        let snap = t.snapshot();
        assert_eq!(snap.elapsed, Duration::from_secs(2));
        assert_eq!(snap.current.unwrap().elapsed, Duration::from_secs(2));
        assert_eq!(snap.time_label, "12:00:02");
    }
}
