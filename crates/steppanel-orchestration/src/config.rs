//! Session configuration, injected into [`begin`](crate::session::begin).

use std::io::Write;
use std::sync::Arc;

use steppanel_core::{Clock, StepObserver, SystemClock, TrackerConfig};
use steppanel_render::{RenderSurface, RendererConfig, Stream};

/// Where the panel is drawn.
pub enum SurfaceChoice {
    /// A real terminal stream.
    Terminal(Stream),
    /// A caller-supplied surface.
    Custom(Box<dyn RenderSurface>),
    /// No panel; transitions are printed plainly.
    Disabled,
}

/// Where degraded-mode transition lines go.
pub enum PlainOutput {
    Stdout,
    Stderr,
    Writer(Box<dyn Write + Send>),
    /// Print nothing.
    Off,
}

/// Everything a session needs, with no process-wide defaults behind it.
pub struct SessionConfig {
    pub surface: SurfaceChoice,
    pub clock: Arc<dyn Clock>,
    pub tracker: TrackerConfig,
    pub renderer: RendererConfig,
    /// Extra observers notified of every step event.
    pub observers: Vec<Arc<dyn StepObserver>>,
    /// Log step events through `tracing`.
    pub log_events: bool,
    pub plain_output: PlainOutput,
    /// Also print transitions to `plain_output` while a panel is drawn.
    pub echo_transitions: bool,
    /// Step total declared at `begin`.
    pub total_steps: Option<u32>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            surface: SurfaceChoice::Terminal(Stream::Stdout),
            clock: Arc::new(SystemClock),
            tracker: TrackerConfig::default(),
            renderer: RendererConfig::default(),
            observers: Vec::new(),
            log_events: true,
            plain_output: PlainOutput::Stdout,
            echo_transitions: false,
            total_steps: None,
        }
    }
}

impl SessionConfig {
    /// Draw on the given surface.
    #[must_use]
    pub fn with_surface(mut self, surface: impl RenderSurface + 'static) -> Self {
        self.surface = SurfaceChoice::Custom(Box::new(surface));
        self
    }

    /// Draw on a terminal stream.
    #[must_use]
    pub fn with_stream(mut self, stream: Stream) -> Self {
        self.surface = SurfaceChoice::Terminal(stream);
        self
    }

    /// Run without a panel.
    #[must_use]
    pub fn headless(mut self) -> Self {
        self.surface = SurfaceChoice::Disabled;
        self
    }

    /// Use `clock` for timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Set tracker settings.
    #[must_use]
    pub fn with_tracker(mut self, tracker: TrackerConfig) -> Self {
        self.tracker = tracker;
        self
    }

    /// Set renderer settings.
    #[must_use]
    pub fn with_renderer(mut self, renderer: RendererConfig) -> Self {
        self.renderer = renderer;
        self
    }

    /// Add an observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn StepObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Enable or disable `tracing` output for step events.
    #[must_use]
    pub fn with_logging(mut self, enabled: bool) -> Self {
        self.log_events = enabled;
        self
    }

    /// Set where degraded-mode lines go.
    #[must_use]
    pub fn with_plain_output(mut self, output: PlainOutput) -> Self {
        self.plain_output = output;
        self
    }

    /// Print transition lines below the panel as well.
    #[must_use]
    pub fn with_echo(mut self, enabled: bool) -> Self {
        self.echo_transitions = enabled;
        self
    }

    /// Declare the step total up front.
    #[must_use]
    pub fn with_total_steps(mut self, total: Option<u32>) -> Self {
        self.total_steps = total;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert!(matches!(config.surface, SurfaceChoice::Terminal(Stream::Stdout)));
        assert!(config.log_events);
        assert!(config.observers.is_empty());
        assert_eq!(config.total_steps, None);
        assert!(!config.echo_transitions);
    }

    #[test]
    fn builders() {
        let config = SessionConfig::default()
            .headless()
            .with_logging(false)
            .with_total_steps(Some(4))
            .with_echo(true)
            .with_plain_output(PlainOutput::Off);
        assert!(matches!(config.surface, SurfaceChoice::Disabled));
        assert!(!config.log_events);
        assert_eq!(config.total_steps, Some(4));
        assert!(config.echo_transitions);
        assert!(matches!(config.plain_output, PlainOutput::Off));
    }
}
