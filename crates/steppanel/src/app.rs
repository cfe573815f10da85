//! Application entry point and the demo pipeline.
//!
//! Four steps load, clean, analyze and save a synthetic data set. Each step
//! narrates into the scrolling region below the panel and reports display
//! data to the panel as it goes; results flow between steps through the
//! session's result store.

use std::thread;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use steppanel_core::{format_number, CancellationToken, StepData, TrackerConfig};
use steppanel_orchestration::{
    begin, FailurePolicy, Pipeline, PipelineReport, PlainOutput, Session, SessionConfig,
    SessionReport, StepScope,
};
use steppanel_render::{PanelLayout, PanelTheme, RendererConfig, Stream};

use crate::completion::generate_completion;
use crate::config::AppConfig;
use crate::version::full_version;

pub const LOAD: &str = "Load Data";
pub const PROCESS: &str = "Process Data";
pub const ANALYZE: &str = "Analyze Data";
pub const SAVE: &str = "Save Results";

const COLUMNS: u64 = 4;
const CATEGORIES: [&str; 3] = ["A", "B", "C"];

/// Everything a finished run produced.
#[derive(Debug, Serialize)]
pub struct RunOutcome {
    pub pipeline: PipelineReport,
    pub session: SessionReport,
}

/// Run the application. `Ok(None)` when there was nothing to run.
pub fn run(config: &AppConfig) -> Result<Option<RunOutcome>> {
    // Handle shell completion
    if let Some(shell) = config.completion {
        let mut cmd = <AppConfig as clap::CommandFactory>::command();
        generate_completion(&mut cmd, shell, &mut std::io::stdout());
        return Ok(None);
    }

    info!(version = %full_version(), "starting");
    let cancel = CancellationToken::new();
    ctrlc_handler(cancel.clone());
    run_demo(config, &cancel).map(Some)
}

/// Session settings for `config`.
pub fn session_config(config: &AppConfig) -> SessionConfig {
    let stream = if config.json {
        Stream::Stderr
    } else {
        Stream::Stdout
    };
    let colors = match stream {
        Stream::Stdout => console::colors_enabled(),
        Stream::Stderr => console::colors_enabled_stderr(),
    };
    let theme = if colors {
        PanelTheme::default()
    } else {
        PanelTheme::plain()
    };

    let mut renderer = RendererConfig::default()
        .with_tick_interval(config.tick_interval())
        .with_layout(
            PanelLayout::default()
                .with_title(config.title.clone())
                .with_theme(theme),
        );
    if let Some(height) = config.height {
        renderer = renderer.with_height(height);
    }

    let session = SessionConfig::default()
        .with_tracker(TrackerConfig::default().with_history_capacity(config.history))
        .with_renderer(renderer)
        .with_echo(config.echo)
        .with_plain_output(if config.json {
            PlainOutput::Stderr
        } else {
            PlainOutput::Stdout
        });
    if config.no_panel {
        session.headless()
    } else {
        session.with_stream(stream)
    }
}

fn run_demo(config: &AppConfig, cancel: &CancellationToken) -> Result<RunOutcome> {
    let session: Session =
        begin(session_config(config)).context("cannot start the status panel")?;
    let demo = Demo {
        config,
        session: &session,
        cancel,
    };
    let policy = if config.continue_on_error {
        FailurePolicy::Continue
    } else {
        FailurePolicy::Abort
    };

    let pipeline = Pipeline::new()
        .with_policy(policy)
        .with_cancellation(cancel.clone())
        .step(LOAD, |scope| demo.load(scope))
        .step(PROCESS, |scope| demo.process(scope))
        .step(ANALYZE, |scope| demo.analyze(scope))
        .step(SAVE, |scope| demo.save(scope));
    let report = pipeline.run(&session)?;
    let outcome = RunOutcome {
        pipeline: report,
        session: session.close()?,
    };

    if config.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    }
    Ok(outcome)
}

struct Demo<'a> {
    config: &'a AppConfig,
    session: &'a Session,
    cancel: &'a CancellationToken,
}

impl Demo<'_> {
    /// Simulate `units` of work, stopping early on cancellation.
    fn work(&self, units: u32) -> Result<()> {
        for _ in 0..units {
            if self.cancel.is_cancelled() {
                bail!("cancelled");
            }
            thread::sleep(self.config.delay);
        }
        Ok(())
    }

    fn narrate(&self, line: &str) {
        if !self.config.json {
            println!("  - {line}");
        }
    }

    fn injected_failure(&self, scope: &StepScope<'_, Value>) -> Result<()> {
        if self.config.fail_at == Some(scope.ordinal()) {
            bail!("simulated failure in {}", scope.name());
        }
        Ok(())
    }

    fn input(&self, step: &str) -> Result<Value> {
        self.session
            .get_result(step)?
            .with_context(|| format!("{step} produced no result"))
    }

    fn load(&self, scope: &StepScope<'_, Value>) -> Result<Option<Value>> {
        self.narrate("Reading CSV file...");
        let records = self.config.records;
        let chunk = (records / 4).max(1);
        let mut loaded = 0;
        scope.update("lines_processed", loaded)?;
        while loaded < records {
            self.work(1)?;
            loaded = (loaded + chunk).min(records);
            scope.update("lines_processed", loaded)?;
        }
        self.injected_failure(scope)?;

        scope.merge(
            StepData::new()
                .with("dataframe_shape", (records, COLUMNS))
                .with("dataframe_memory", megabytes(records.saturating_mul(COLUMNS * 8))),
        )?;
        self.narrate(&format!("Loaded {} records", count(records)));
        info!(records, columns = COLUMNS, "data loaded");
        Ok(Some(json!({ "records": records, "columns": COLUMNS })))
    }

    fn process(&self, scope: &StepScope<'_, Value>) -> Result<Option<Value>> {
        let records = self.input(LOAD)?["records"].as_u64().unwrap_or(0);
        self.narrate("Cleaning data...");
        self.work(2)?;
        let clean = records - records / 50;
        scope.update("records_after_cleaning", clean)?;

        self.narrate("Computing statistics...");
        self.work(2)?;
        let high = signal(clean).filter(|v| *v > 0.5).count();
        self.injected_failure(scope)?;
        scope.merge(
            StepData::new()
                .with("high_value_records", high)
                .with("categories_found", CATEGORIES.len()),
        )?;
        self.narrate(&format!("Found {high} high-value records"));
        info!(clean, high, "data processed");
        Ok(Some(json!({ "clean_records": clean, "high_value_records": high })))
    }

    fn analyze(&self, scope: &StepScope<'_, Value>) -> Result<Option<Value>> {
        let clean = self.input(PROCESS)?["clean_records"].as_u64().unwrap_or(0);
        self.narrate("Running statistical analysis...");
        self.work(3)?;
        let mean = mean(clean);
        let mut counts = serde_json::Map::new();
        for (i, category) in CATEGORIES.iter().enumerate() {
            let share = (clean + (CATEGORIES.len() - 1 - i) as u64) / CATEGORIES.len() as u64;
            counts.insert((*category).to_string(), json!(share));
        }
        self.injected_failure(scope)?;
        scope.merge(
            StepData::new()
                .with("analyses_completed", 5)
                .with("mean_value", (mean * 1000.0).round() / 1000.0)
                .with("categories_analyzed", counts.len()),
        )?;
        self.narrate(&format!("Analysis complete, mean value: {mean:.3}"));
        info!(mean, "analysis completed");
        Ok(Some(json!({ "mean_value": mean, "category_counts": counts })))
    }

    fn save(&self, scope: &StepScope<'_, Value>) -> Result<Option<Value>> {
        let clean = self.input(PROCESS)?["clean_records"].as_u64().unwrap_or(0);
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let data_file = format!("processed_data_{stamp}.csv");
        let analysis_file = format!("analysis_results_{stamp}.json");

        self.narrate("Saving processed data...");
        self.work(2)?;
        self.narrate("Saving analysis results...");
        self.work(1)?;
        self.injected_failure(scope)?;
        scope.merge(
            StepData::new()
                .with("data_file", data_file.as_str())
                .with("analysis_file", analysis_file.as_str())
                .with("records_saved", clean),
        )?;
        self.narrate(&format!("Saved {} records to {data_file}", count(clean)));
        info!(file = %data_file, "results saved");
        Ok(Some(json!({
            "data_file": data_file,
            "analysis_file": analysis_file,
            "records_saved": clean,
        })))
    }
}

fn count(n: u64) -> String {
    format_number(i64::try_from(n).unwrap_or(i64::MAX))
}

#[allow(clippy::cast_precision_loss)]
fn megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Deterministic stand-in for a column of measurements.
#[allow(clippy::cast_precision_loss)]
fn signal(n: u64) -> impl Iterator<Item = f64> {
    (0..n).map(|i| (i as f64 * 0.7).sin())
}

#[allow(clippy::cast_precision_loss)]
fn mean(n: u64) -> f64 {
    if n == 0 {
        return 0.0;
    }
    signal(n).sum::<f64>() / n as f64
}

fn ctrlc_handler(cancel: CancellationToken) {
    if let Err(err) = ctrlc::set_handler(move || cancel.cancel()) {
        warn!(error = %err, "cannot install the Ctrl+C handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::Parser;

    fn config(args: &[&str]) -> AppConfig {
        let mut argv = vec!["steppanel", "--no-panel", "--delay", "0ms", "--json"];
        argv.extend_from_slice(args);
        AppConfig::try_parse_from(argv).unwrap()
    }

    #[test]
    fn demo_runs_all_steps() {
        let outcome = run_demo(&config(&[]), &CancellationToken::new()).unwrap();
        assert!(outcome.pipeline.is_success());
        assert_eq!(outcome.pipeline.completed, vec![LOAD, PROCESS, ANALYZE, SAVE]);
        assert_eq!(outcome.session.snapshot.completed, 4);
        assert_eq!(outcome.session.results[LOAD]["records"], json!(1000));
        assert_eq!(outcome.session.results[SAVE]["records_saved"], json!(980));
    }

    #[test]
    fn injected_failure_aborts() {
        let outcome = run_demo(&config(&["--fail-at", "2"]), &CancellationToken::new()).unwrap();
        assert_eq!(outcome.pipeline.completed, vec![LOAD]);
        assert_eq!(outcome.pipeline.skipped, vec![ANALYZE, SAVE]);
        assert_eq!(
            outcome.pipeline.failed,
            vec![(PROCESS.to_string(), "simulated failure in Process Data".to_string())]
        );
        assert_eq!(outcome.session.snapshot.errors, 1);
    }

    #[test]
    fn continue_on_error_runs_later_steps() {
        let outcome = run_demo(
            &config(&["--fail-at", "3", "--continue-on-error"]),
            &CancellationToken::new(),
        )
        .unwrap();
        assert_eq!(outcome.pipeline.completed, vec![LOAD, PROCESS, SAVE]);
        assert_eq!(outcome.pipeline.failed.len(), 1);
    }

    #[test]
    fn cancelled_run_skips_everything() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = run_demo(&config(&[]), &cancel).unwrap();
        assert!(outcome.pipeline.cancelled);
        assert_eq!(outcome.pipeline.skipped.len(), 4);
        assert_eq!(outcome.session.snapshot.started, 0);
    }

    #[test]
    fn json_mode_moves_panel_to_stderr() {
        let session = session_config(&AppConfig::try_parse_from(["steppanel", "--json"]).unwrap());
        assert!(matches!(
            session.surface,
            steppanel_orchestration::SurfaceChoice::Terminal(Stream::Stderr)
        ));
        assert!(matches!(session.plain_output, PlainOutput::Stderr));
        assert!(!session.echo_transitions);
    }

    #[test]
    fn echo_flag_reaches_the_session() {
        let session = session_config(&AppConfig::try_parse_from(["steppanel", "--echo"]).unwrap());
        assert!(session.echo_transitions);
    }

    #[test]
    fn signal_mean_is_small() {
        assert!(mean(0).abs() < f64::EPSILON);
        assert!(mean(1000).abs() < 0.05);
    }
}
