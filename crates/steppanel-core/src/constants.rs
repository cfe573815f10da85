//! Defaults shared by the tracker, the renderer, and the demo binary.

use std::time::Duration;

/// Number of finished steps kept in the panel's history ring.
pub const DEFAULT_HISTORY_CAPACITY: usize = 5;

/// Interval between periodic redraws (4 Hz).
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Title drawn in the panel border.
pub const DEFAULT_TITLE: &str = "Processing Status";

/// Shown in place of the total when no step count was declared.
pub const UNBOUNDED_TOTAL: &str = "∞";

/// Exit codes used by the demo binary.
pub mod exit_codes {
    /// Successful execution.
    pub const SUCCESS: i32 = 0;
    /// Generic error.
    pub const ERROR_GENERIC: i32 = 1;
    /// One or more pipeline steps failed.
    pub const ERROR_STEP_FAILED: i32 = 2;
    /// Misuse of the tracker API (unknown step, closed session).
    pub const ERROR_USAGE: i32 = 3;
    /// The terminal is already owned by another panel.
    pub const ERROR_SURFACE: i32 = 4;
    /// Run cancelled by user (Ctrl+C).
    pub const ERROR_CANCELED: i32 = 130;
}
