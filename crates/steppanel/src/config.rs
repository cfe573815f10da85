//! Application configuration from CLI flags and environment.

use std::time::Duration;

use clap::Parser;
use steppanel_core::{DEFAULT_HISTORY_CAPACITY, DEFAULT_TITLE};

/// steppanel: a four-step data pipeline under a live terminal status panel.
#[derive(Parser, Debug)]
#[command(name = "steppanel", version, about)]
pub struct AppConfig {
    /// Number of simulated records the first step loads.
    #[arg(short, long, default_value = "1000", env = "STEPPANEL_RECORDS")]
    pub records: u64,

    /// Make step N (1-based) fail.
    #[arg(long, value_name = "N")]
    pub fail_at: Option<u32>,

    /// Keep running the remaining steps after a failure.
    #[arg(long)]
    pub continue_on_error: bool,

    /// Duration of one simulated unit of work (e.g. "200ms", "1s").
    #[arg(long, default_value = "200ms", env = "STEPPANEL_DELAY", value_parser = parse_duration)]
    pub delay: Duration,

    /// Completed steps kept in the panel's history.
    #[arg(long, default_value_t = DEFAULT_HISTORY_CAPACITY)]
    pub history: usize,

    /// Panel height in rows (defaults to the tallest possible content).
    #[arg(long)]
    pub height: Option<u16>,

    /// Interval between periodic redraws; "0" turns them off.
    #[arg(long, default_value = "250ms", value_parser = parse_duration)]
    pub tick: Duration,

    /// Print step transitions plainly instead of drawing a panel.
    #[arg(long, env = "STEPPANEL_NO_PANEL")]
    pub no_panel: bool,

    /// Also print step transitions below the panel.
    #[arg(long, conflicts_with = "no_panel")]
    pub echo: bool,

    /// Panel title.
    #[arg(long, default_value = DEFAULT_TITLE)]
    pub title: String,

    /// Print a JSON report on stdout; the panel moves to stderr.
    #[arg(long)]
    pub json: bool,

    /// Generate shell completion.
    #[arg(long, value_enum)]
    pub completion: Option<clap_complete::Shell>,
}

impl AppConfig {
    /// Parse CLI arguments.
    #[must_use]
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Redraw interval, `None` when ticking is off.
    #[must_use]
    pub fn tick_interval(&self) -> Option<Duration> {
        Some(self.tick).filter(|tick| !tick.is_zero())
    }
}

/// Parse a duration string like "250ms", "30s", "5m", "1h" or bare seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (digits, unit): (&str, fn(u64) -> Duration) = if let Some(ms) = s.strip_suffix("ms") {
        (ms, Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        (secs, Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        (mins, |n| Duration::from_secs(n * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        (hours, |n| Duration::from_secs(n * 3600))
    } else {
        (s, Duration::from_secs)
    };
    digits
        .parse::<u64>()
        .map(unit)
        .map_err(|_| format!("expected a duration like 250ms, 2s or 1m, got {s:?}"))
}
