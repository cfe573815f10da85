//! Error type shared by the tracker, the renderer, and sessions.

/// Errors surfaced by the status panel.
///
/// `SurfaceUnavailable` is recovered inside the session (degraded mode) and
/// normally never reaches pipeline code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PanelError {
    /// No usable terminal: not interactive, redirected, or too small.
    #[error("render surface unavailable: {0}")]
    SurfaceUnavailable(String),

    /// Another panel already owns this output stream.
    #[error("render surface already owned by another panel")]
    SurfaceAlreadyOwned,

    /// A step name that was never started.
    #[error("unknown step: {0}")]
    UnknownStep(String),

    /// An operation needed a current step and none is running.
    #[error("no step is currently running")]
    NoCurrentStep,

    /// The session was already closed.
    #[error("session closed")]
    SessionClosed,

    /// Writing to the render surface failed.
    #[error("render surface write failed: {0}")]
    Surface(String),
}

impl PanelError {
    /// Whether the error is caller misuse rather than an environment problem.
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self,
            PanelError::UnknownStep(_) | PanelError::NoCurrentStep | PanelError::SessionClosed
        )
    }
}

impl From<std::io::Error> for PanelError {
    fn from(err: std::io::Error) -> Self {
        PanelError::Surface(err.to_string())
    }
}
