//! Error handling and exit codes.

use steppanel_core::{exit_codes, PanelError};

use crate::app::RunOutcome;

/// Exit code for an error that stopped the run.
pub fn handle_error(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PanelError>() {
        Some(PanelError::SurfaceAlreadyOwned) => exit_codes::ERROR_SURFACE,
        Some(panel) if panel.is_usage_error() => exit_codes::ERROR_USAGE,
        _ => exit_codes::ERROR_GENERIC,
    }
}

/// Exit code for a run that reached the end of its pipeline.
pub fn exit_code(outcome: &RunOutcome) -> i32 {
    if outcome.pipeline.cancelled {
        exit_codes::ERROR_CANCELED
    } else if !outcome.pipeline.is_success() || !outcome.session.is_success() {
        exit_codes::ERROR_STEP_FAILED
    } else {
        exit_codes::SUCCESS
    }
}
