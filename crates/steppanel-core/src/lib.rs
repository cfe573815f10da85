//! # steppanel-core
//!
//! Core library for the steppanel terminal status panel: the step tracker
//! state machine, immutable snapshots, display data formatting, and the
//! observer plumbing that feeds renderers and loggers.

pub mod cancel;
pub mod clock;
pub mod constants;
pub mod error;
pub mod event;
pub mod format;
pub mod observer;
pub mod observers;
pub mod snapshot;
pub mod step;
pub mod tracker;
pub mod value;

// Re-exports
pub use cancel::CancellationToken;
pub use clock::{Clock, ManualClock, SystemClock};
pub use constants::{
    exit_codes, DEFAULT_HISTORY_CAPACITY, DEFAULT_TICK_INTERVAL, DEFAULT_TITLE, UNBOUNDED_TOTAL,
};
pub use error::PanelError;
pub use event::StepEvent;
pub use format::{format_elapsed, format_number, DataFormatter, Rule};
pub use observer::{EventSubject, StepObserver};
pub use observers::{ChannelObserver, LoggingObserver, NoOpObserver};
pub use snapshot::{CurrentStep, Snapshot};
pub use step::{StepHandle, StepStatus, StepSummary};
pub use tracker::{StepTracker, TrackerConfig};
pub use value::{StepData, StepValue};
