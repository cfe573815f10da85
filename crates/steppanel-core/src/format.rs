//! Human-readable phrasing of step display data.

use std::collections::HashMap;
use std::time::Duration;

use crate::value::{StepData, StepValue};

/// How a recognized key is phrased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    /// `1,000 <suffix>`.
    Count(&'static str),
    /// `<value:.2>s`.
    Seconds,
    /// `<value:.1>MB`.
    Megabytes,
    /// `<label>: <value:.2%>`.
    Percent(&'static str),
    /// `saved to <value>`.
    SavedTo,
    /// `<label>: R×C`.
    Shape(&'static str),
}

impl Rule {
    /// Apply the rule, or `None` when the value has the wrong shape.
    fn apply(&self, value: &StepValue) -> Option<String> {
        match (self, value) {
            (Rule::Count(suffix), StepValue::Int(n)) => {
                Some(format!("{} {suffix}", format_number(*n)))
            }
            (Rule::Seconds, StepValue::Duration(d)) => Some(format_seconds(*d)),
            (Rule::Seconds | Rule::Megabytes | Rule::Percent(_), StepValue::Text(_))
            | (Rule::Megabytes | Rule::Percent(_), StepValue::Duration(_)) => None,
            (Rule::Seconds, v) => v.as_f64().map(|s| format!("{s:.2}s")),
            (Rule::Megabytes, v) => v.as_f64().map(|mb| format!("{mb:.1}MB")),
            (Rule::Percent(label), v) => v
                .as_f64()
                .map(|ratio| format!("{label}: {:.2}%", ratio * 100.0)),
            (Rule::SavedTo, StepValue::Text(path)) => Some(format!("saved to {path}")),
            (Rule::Shape(label), StepValue::Shape(rows, cols)) => {
                Some(format!("{label}: {rows}×{cols}"))
            }
            _ => None,
        }
    }
}

/// Maps semantic keys to phrasing; unknown keys fall back to `key: value`.
#[derive(Debug, Clone)]
pub struct DataFormatter {
    rules: HashMap<String, Rule>,
}

impl DataFormatter {
    /// Formatter with the built-in rules.
    #[must_use]
    pub fn new() -> Self {
        let rules = [
            ("lines_processed", Rule::Count("lines")),
            ("records_found", Rule::Count("records")),
            ("records_saved", Rule::Count("records saved")),
            ("files_created", Rule::Count("files created")),
            ("notifications_sent", Rule::Count("notifications sent")),
            ("errors_found", Rule::Count("errors found")),
            ("output_file", Rule::SavedTo),
            ("data_file", Rule::SavedTo),
            ("processing_time", Rule::Seconds),
            ("dataframe_shape", Rule::Shape("df")),
            ("dataframe_memory", Rule::Megabytes),
            ("model_accuracy", Rule::Percent("accuracy")),
        ]
        .into_iter()
        .map(|(k, r)| (k.to_string(), r))
        .collect();
        Self { rules }
    }

    /// Formatter with no recognized keys.
    #[must_use]
    pub fn plain() -> Self {
        Self {
            rules: HashMap::new(),
        }
    }

    /// Add or replace a rule.
    #[must_use]
    pub fn with_rule(mut self, key: impl Into<String>, rule: Rule) -> Self {
        self.rules.insert(key.into(), rule);
        self
    }

    /// Phrase a single entry.
    #[must_use]
    pub fn format_entry(&self, key: &str, value: &StepValue) -> String {
        self.rules
            .get(key)
            .and_then(|rule| rule.apply(value))
            .unwrap_or_else(|| format!("{key}: {value}"))
    }

    /// Phrase the whole map, comma separated, in insertion order.
    #[must_use]
    pub fn format(&self, data: &StepData) -> String {
        data.iter()
            .map(|(k, v)| self.format_entry(k, v))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for DataFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Format a number with thousand separators.
#[must_use]
pub fn format_number(n: i64) -> String {
    let s = n.unsigned_abs().to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    if n < 0 {
        result.push('-');
    }
    result.chars().rev().collect()
}

/// Format a duration as seconds with two decimals.
#[must_use]
pub fn format_seconds(d: Duration) -> String {
    format!("{:.2}s", d.as_secs_f64())
}

/// Format an elapsed time for the panel: `850ms`, `4.2s`, `2m05s`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        let mins = (secs / 60.0).floor() as u64;
        let remaining = d.as_secs() - mins * 60;
        format!("{mins}m{remaining:02}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_thousands() {
        assert_eq!(format_number(1_000_000), "1,000,000");
        assert_eq!(format_number(42), "42");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(-1234), "-1,234");
    }

    #[test]
    fn format_seconds_two_decimals() {
        assert_eq!(format_seconds(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_seconds(Duration::ZERO), "0.00s");
    }

    #[test]
    fn format_elapsed_ranges() {
        assert_eq!(format_elapsed(Duration::from_millis(850)), "850ms");
        assert_eq!(format_elapsed(Duration::from_millis(4200)), "4.2s");
        assert_eq!(format_elapsed(Duration::from_secs(125)), "2m05s");
    }

    #[test]
    fn recognized_keys() {
        let f = DataFormatter::new();
        assert_eq!(f.format_entry("lines_processed", &1000.into()), "1,000 lines");
        assert_eq!(f.format_entry("records_found", &12345.into()), "12,345 records");
        assert_eq!(f.format_entry("output_file", &"out.csv".into()), "saved to out.csv");
        assert_eq!(f.format_entry("files_created", &3.into()), "3 files created");
        assert_eq!(f.format_entry("processing_time", &1.5.into()), "1.50s");
        assert_eq!(
            f.format_entry("processing_time", &Duration::from_millis(250).into()),
            "0.25s"
        );
        assert_eq!(
            f.format_entry("dataframe_shape", &(1000u64, 4u64).into()),
            "df: 1000×4"
        );
        assert_eq!(f.format_entry("dataframe_memory", &0.34.into()), "0.3MB");
        assert_eq!(f.format_entry("model_accuracy", &0.934.into()), "accuracy: 93.40%");
    }

    #[test]
    fn unknown_key_falls_back() {
        let f = DataFormatter::new();
        assert_eq!(f.format_entry("mean_value", &0.5.into()), "mean_value: 0.5");
        assert_eq!(f.format_entry("label", &"x".into()), "label: x");
    }

    #[test]
    fn mismatched_shape_falls_back() {
        let f = DataFormatter::new();
        assert_eq!(
            f.format_entry("processing_time", &"slow".into()),
            "processing_time: slow"
        );
        assert_eq!(
            f.format_entry("dataframe_shape", &7.into()),
            "dataframe_shape: 7"
        );
        assert_eq!(
            f.format_entry("lines_processed", &"many".into()),
            "lines_processed: many"
        );
        assert_eq!(f.format_entry("output_file", &3.into()), "output_file: 3");
    }

    #[test]
    fn whole_map_keeps_insertion_order() {
        let data = StepData::new()
            .with("records_found", 1500)
            .with("lines_processed", 2000)
            .with("processing_time", 1.25);
        assert_eq!(
            DataFormatter::new().format(&data),
            "1,500 records, 2,000 lines, 1.25s"
        );
    }

    #[test]
    fn empty_map_formats_empty() {
        assert_eq!(DataFormatter::new().format(&StepData::new()), "");
    }

    #[test]
    fn custom_rule() {
        let f = DataFormatter::plain().with_rule("rows", Rule::Count("rows"));
        assert_eq!(f.format_entry("rows", &5000.into()), "5,000 rows");
        assert_eq!(
            f.format_entry("lines_processed", &10.into()),
            "lines_processed: 10"
        );
    }
}
