//! Wall-clock capability used for timestamps and elapsed time.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use chrono::{DateTime, Local, Utc};
use parking_lot::Mutex;

/// Source of the current time and its `HH:MM:SS` rendering.
pub trait Clock: Send + Sync {
    /// Current time.
    fn now(&self) -> SystemTime;

    /// Render a timestamp as `HH:MM:SS`.
    fn format_time(&self, at: SystemTime) -> String;
}

/// System clock rendering local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }

    fn format_time(&self, at: SystemTime) -> String {
        DateTime::<Local>::from(at).format("%H:%M:%S").to_string()
    }
}

/// Manually advanced clock rendering UTC; used in tests and golden output.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
    /// Clock frozen at `start`.
    #[must_use]
    pub fn new(start: SystemTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Clock frozen at 12:00:00 UTC on 2024-01-01.
    #[must_use]
    pub fn at_noon() -> Self {
        Self::new(SystemTime::UNIX_EPOCH + Duration::from_secs(1_704_110_400))
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        *self.now.lock()
    }

    fn format_time(&self, at: SystemTime) -> String {
        DateTime::<Utc>::from(at).format("%H:%M:%S").to_string()
    }
}

/// Elapsed time between two timestamps, zero if the clock went backwards.
#[must_use]
pub fn elapsed_between(from: SystemTime, to: SystemTime) -> Duration {
    to.duration_since(from).unwrap_or_default()
}
