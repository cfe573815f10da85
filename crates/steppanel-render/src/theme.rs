//! Panel colors and the `NO_COLOR` switch.

use console::{Color, Style};

/// Check if color output is disabled via `NO_COLOR` env var.
#[must_use]
pub fn is_color_disabled() -> bool {
    std::env::var_os("NO_COLOR").is_some()
}

/// Color theme for the panel and plain transition lines.
#[derive(Debug, Clone)]
pub struct PanelTheme {
    pub border: Color,
    pub title: Color,
    pub success: Color,
    pub error: Color,
    pub warning: Color,
    /// When false every style is a pass-through.
    pub enabled: bool,
}

impl Default for PanelTheme {
    fn default() -> Self {
        Self {
            border: Color::Blue,
            title: Color::Cyan,
            success: Color::Green,
            error: Color::Red,
            warning: Color::Yellow,
            enabled: !is_color_disabled(),
        }
    }
}

impl PanelTheme {
    /// A theme that never emits escape codes.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn style(&self, color: Color) -> Style {
        Style::new().fg(color).force_styling(self.enabled)
    }

    /// Style for box borders.
    #[must_use]
    pub fn border_style(&self) -> Style {
        self.style(self.border)
    }

    /// Style for the panel title.
    #[must_use]
    pub fn title_style(&self) -> Style {
        self.style(self.title).bold()
    }

    /// Style for completed steps.
    #[must_use]
    pub fn success_style(&self) -> Style {
        self.style(self.success)
    }

    /// Style for failures and a non-zero error count.
    #[must_use]
    pub fn error_style(&self) -> Style {
        self.style(self.error).bold()
    }

    /// Style for abandoned steps and degraded-mode notices.
    #[must_use]
    pub fn warning_style(&self) -> Style {
        self.style(self.warning)
    }

    /// Apply `style` to `text` (pass-through when disabled).
    #[must_use]
    pub fn paint(&self, style: &Style, text: &str) -> String {
        if self.enabled {
            style.apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }
}
