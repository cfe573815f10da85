//! Immutable point-in-time view of a tracker, consumed by renderers.

use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::clock::{elapsed_between, Clock};
use crate::constants::UNBOUNDED_TOTAL;
use crate::step::StepSummary;
use crate::value::StepData;

/// The running step as seen in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentStep {
    /// 1-based ordinal.
    pub ordinal: u32,
    /// Step name.
    pub name: String,
    /// Raw display data.
    pub data: StepData,
    /// Display data phrased by the formatter.
    pub details: String,
    /// When the step started.
    pub started_at: SystemTime,
    /// Time spent in the step when the snapshot was taken.
    pub elapsed: Duration,
}

/// Frozen tracker state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Declared step count; `None` when unknown.
    pub total_steps: Option<u32>,
    /// Number of steps started so far.
    pub started: u32,
    /// Number of steps completed successfully.
    pub completed: u32,
    /// Number of steps that failed.
    pub failed: u32,
    /// Recorded pipeline errors.
    pub errors: u64,
    /// The running step, if any.
    pub current: Option<CurrentStep>,
    /// Most recent finished steps, oldest first.
    pub history: Vec<StepSummary>,
    /// Finished steps that fell out of the history ring.
    pub hidden_history: usize,
    /// Steps superseded while still running.
    pub abandoned: Vec<StepSummary>,
    /// When the session began.
    pub created_at: SystemTime,
    /// When this snapshot was taken.
    pub taken_at: SystemTime,
    /// `taken_at` as `HH:MM:SS`.
    pub time_label: String,
    /// Session elapsed time at `taken_at`.
    pub elapsed: Duration,
}

impl Snapshot {
    /// Progress as `completed/total`, with `∞` for an unknown total.
    #[must_use]
    pub fn progress_label(&self) -> String {
        match self.total_steps {
            Some(total) if total > 0 => format!("{}/{total}", self.completed),
            _ => format!("{}/{UNBOUNDED_TOTAL}", self.completed),
        }
    }

    /// Completed fraction in `[0, 1]`, if the total is known.
    #[must_use]
    pub fn progress_fraction(&self) -> Option<f64> {
        match self.total_steps {
            Some(total) if total > 0 => {
                Some((f64::from(self.completed) / f64::from(total)).min(1.0))
            }
            _ => None,
        }
    }

    /// Copy with only the time fields moved to the clock's current time.
    #[must_use]
    pub fn retimed(&self, clock: &dyn Clock) -> Snapshot {
        let now = clock.now();
        let mut next = self.clone();
        next.taken_at = now;
        next.time_label = clock.format_time(now);
        next.elapsed = elapsed_between(self.created_at, now);
        if let Some(current) = next.current.as_mut() {
            current.elapsed = elapsed_between(current.started_at, now);
        }
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn empty(total: Option<u32>, clock: &ManualClock) -> Snapshot {
        let now = clock.now();
        Snapshot {
            total_steps: total,
            started: 0,
            completed: 0,
            failed: 0,
            errors: 0,
            current: None,
            history: Vec::new(),
            hidden_history: 0,
            abandoned: Vec::new(),
            created_at: now,
            taken_at: now,
            time_label: clock.format_time(now),
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn progress_with_total() {
        let clock = ManualClock::at_noon();
        let mut snap = empty(Some(4), &clock);
        snap.completed = 1;
        assert_eq!(snap.progress_label(), "1/4");
        assert_eq!(snap.progress_fraction(), Some(0.25));
    }

    #[test]
    fn progress_unbounded() {
        let clock = ManualClock::at_noon();
        let mut snap = empty(None, &clock);
        snap.completed = 3;
        assert_eq!(snap.progress_label(), "3/∞");
        assert_eq!(snap.progress_fraction(), None);
        let zero = empty(Some(0), &clock);
        assert_eq!(zero.progress_label(), "0/∞");
    }

    #[test]
    fn retimed_only_moves_time() {
        let clock = ManualClock::at_noon();
        let snap = empty(Some(2), &clock);
        clock.advance(Duration::from_secs(3));
        let later = snap.retimed(&clock);
        assert_eq!(later.elapsed, Duration::from_secs(3));
        assert_eq!(later.time_label, "12:00:03");
        assert_eq!(later.total_steps, snap.total_steps);
        assert_eq!(later.errors, snap.errors);
    }
}
