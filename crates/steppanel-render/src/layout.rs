//! Panel layout: turns a snapshot into exactly `height` clipped lines.

use std::borrow::Cow;

use console::{measure_text_width, truncate_str};
use steppanel_core::format::format_elapsed;
use steppanel_core::{Snapshot, StepStatus, DEFAULT_TITLE};

use crate::theme::PanelTheme;

/// Body rows that do not depend on history size: current step, progress,
/// errors, time, current data, abandoned, blank, history header, overflow.
const FIXED_BODY_ROWS: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tone {
    Normal,
    Success,
    Error,
    Warning,
}

/// How the panel is drawn.
#[derive(Debug, Clone)]
pub struct PanelLayout {
    /// Title shown in the top border.
    pub title: String,
    /// Colors.
    pub theme: PanelTheme,
    /// Draw a rounded box around the body.
    pub border: bool,
    /// Cap on the panel width; `None` uses the full terminal width.
    pub max_width: Option<u16>,
}

impl Default for PanelLayout {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            theme: PanelTheme::default(),
            border: true,
            max_width: None,
        }
    }
}

impl PanelLayout {
    /// Set the title.
    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    /// Set the theme.
    #[must_use]
    pub fn with_theme(mut self, theme: PanelTheme) -> Self {
        self.theme = theme;
        self
    }

    /// Draw with or without the box.
    #[must_use]
    pub fn with_border(mut self, border: bool) -> Self {
        self.border = border;
        self
    }

    /// Tallest panel this layout produces for a history of `capacity` steps.
    #[must_use]
    pub fn natural_height(&self, history_capacity: usize) -> u16 {
        let borders = if self.border { 2 } else { 0 };
        u16::try_from(FIXED_BODY_ROWS + history_capacity + borders).unwrap_or(u16::MAX)
    }

    /// Unclipped, unstyled body text, one entry per row.
    #[must_use]
    pub fn body(&self, snapshot: &Snapshot) -> Vec<String> {
        body_lines(snapshot).into_iter().map(|(text, _)| text).collect()
    }

    /// Render `snapshot` into exactly `height` lines no wider than `cols`.
    #[must_use]
    pub fn render(&self, snapshot: &Snapshot, height: u16, cols: u16) -> Vec<String> {
        let height = usize::from(height);
        if height == 0 {
            return Vec::new();
        }
        let width = usize::from(self.max_width.map_or(cols, |max| max.min(cols)));
        let boxed = self.border && width >= 4 && height >= 2;
        let inner = if boxed { width - 4 } else { width };
        let body_rows = if boxed { height - 2 } else { height };

        let body = body_lines(snapshot);
        let mut out = Vec::with_capacity(height);
        if boxed {
            out.push(self.top_border(width));
        }
        let edge_left = self.theme.paint(&self.theme.border_style(), "│ ");
        let edge_right = self.theme.paint(&self.theme.border_style(), " │");
        for row in 0..body_rows {
            let (text, tone) = body
                .get(row)
                .map_or(("", Tone::Normal), |(text, tone)| (text.as_str(), *tone));
            let mut cell = clip(text, inner);
            if boxed {
                let fill = inner.saturating_sub(measure_text_width(&cell));
                cell.push_str(&" ".repeat(fill));
            }
            let painted = self.paint(tone, &cell);
            if boxed {
                out.push(format!("{edge_left}{painted}{edge_right}"));
            } else {
                out.push(painted);
            }
        }
        if boxed {
            let bottom = format!("╰{}╯", "─".repeat(width - 2));
            out.push(self.theme.paint(&self.theme.border_style(), &bottom));
        }
        out
    }

    fn top_border(&self, width: usize) -> String {
        let border = self.theme.border_style();
        // "╭─ " + title + " " + fill + "╮"
        let title = if width >= 6 {
            clip(&self.title, width - 5)
        } else {
            String::new()
        };
        if title.is_empty() {
            return self
                .theme
                .paint(&border, &format!("╭{}╮", "─".repeat(width - 2)));
        }
        let fill = width - 5 - measure_text_width(&title);
        format!(
            "{}{}{}",
            self.theme.paint(&border, "╭─ "),
            self.theme.paint(&self.theme.title_style(), &title),
            self.theme
                .paint(&border, &format!(" {}╮", "─".repeat(fill)))
        )
    }

    fn paint(&self, tone: Tone, text: &str) -> String {
        match tone {
            Tone::Normal => text.to_string(),
            Tone::Success => self.theme.paint(&self.theme.success_style(), text),
            Tone::Error => self.theme.paint(&self.theme.error_style(), text),
            Tone::Warning => self.theme.paint(&self.theme.warning_style(), text),
        }
    }
}

/// Clip `text` to `width` display cells, marking the cut with `…`.
///
/// Control characters (line feeds, tabs, escapes) become spaces first, so a
/// clipped line always occupies exactly one terminal row.
#[must_use]
pub fn clip(text: &str, width: usize) -> String {
    let text = printable(text);
    let text = text.as_ref();
    if measure_text_width(text) <= width {
        text.to_string()
    } else if width == 0 {
        String::new()
    } else {
        truncate_str(text, width, "…").into_owned()
    }
}

fn printable(text: &str) -> Cow<'_, str> {
    if text.chars().any(char::is_control) {
        Cow::Owned(
            text.chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}

fn body_lines(snapshot: &Snapshot) -> Vec<(String, Tone)> {
    let mut lines = Vec::new();
    let current = snapshot.current.as_ref().map_or_else(
        || "none".to_string(),
        |step| {
            format!(
                "{}. {} ({})",
                step.ordinal,
                step.name,
                format_elapsed(step.elapsed)
            )
        },
    );
    lines.push((format!("Current Step: {current}"), Tone::Normal));

    let mut progress = format!("Progress: {} steps completed", snapshot.progress_label());
    if snapshot.failed > 0 {
        progress.push_str(&format!(", {} failed", snapshot.failed));
    }
    lines.push((progress, Tone::Normal));

    let error_tone = if snapshot.errors > 0 {
        Tone::Error
    } else {
        Tone::Normal
    };
    lines.push((format!("Errors: {}", snapshot.errors), error_tone));
    lines.push((
        format!(
            "Time: {} (elapsed {})",
            snapshot.time_label,
            format_elapsed(snapshot.elapsed)
        ),
        Tone::Normal,
    ));

    if let Some(step) = snapshot.current.as_ref().filter(|s| !s.details.is_empty()) {
        lines.push((format!("Current Data: {}", step.details), Tone::Normal));
    }
    if !snapshot.abandoned.is_empty() {
        let names: Vec<&str> = snapshot.abandoned.iter().map(|s| s.name.as_str()).collect();
        lines.push((format!("Abandoned: {}", names.join(", ")), Tone::Warning));
    }

    if !snapshot.history.is_empty() || snapshot.hidden_history > 0 {
        lines.push((String::new(), Tone::Normal));
        lines.push(("Completed Steps:".to_string(), Tone::Normal));
        for summary in &snapshot.history {
            let tone = match summary.status {
                StepStatus::Completed => Tone::Success,
                StepStatus::Failed => Tone::Error,
                StepStatus::Abandoned => Tone::Warning,
                StepStatus::Pending | StepStatus::Running => Tone::Normal,
            };
            lines.push((summary.to_string(), tone));
        }
        if snapshot.hidden_history > 0 {
            lines.push((
                format!("... and {} more", snapshot.hidden_history),
                Tone::Normal,
            ));
        }
    }
    lines
}
