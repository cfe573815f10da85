//! Display values attached to a step.
//!
//! Step bodies report metrics as a small closed set of value shapes rather
//! than free-form strings, so the formatter can pick phrasing by tag.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A single display value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StepValue {
    /// Signed integer count.
    Int(i64),
    /// Floating point measurement.
    Float(f64),
    /// Free text (paths, labels).
    Text(String),
    /// Elapsed time.
    Duration(Duration),
    /// Rows × columns.
    Shape(u64, u64),
}

impl StepValue {
    /// Numeric view of the value, if it has one.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StepValue::Int(v) => Some(*v as f64),
            StepValue::Float(v) => Some(*v),
            StepValue::Duration(d) => Some(d.as_secs_f64()),
            StepValue::Text(_) | StepValue::Shape(..) => None,
        }
    }

    /// Integer view of the value, if it is an integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StepValue::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for StepValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepValue::Int(v) => write!(f, "{v}"),
            StepValue::Float(v) => write!(f, "{v}"),
            StepValue::Text(s) => f.write_str(s),
            StepValue::Duration(d) => write!(f, "{:.2}s", d.as_secs_f64()),
            StepValue::Shape(rows, cols) => write!(f, "{rows}×{cols}"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for StepValue {
                fn from(v: $t) -> Self {
                    StepValue::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<u64> for StepValue {
    fn from(v: u64) -> Self {
        StepValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<usize> for StepValue {
    fn from(v: usize) -> Self {
        StepValue::Int(i64::try_from(v).unwrap_or(i64::MAX))
    }
}

impl From<f32> for StepValue {
    fn from(v: f32) -> Self {
        StepValue::Float(f64::from(v))
    }
}

impl From<f64> for StepValue {
    fn from(v: f64) -> Self {
        StepValue::Float(v)
    }
}

impl From<&str> for StepValue {
    fn from(v: &str) -> Self {
        StepValue::Text(v.to_string())
    }
}

impl From<String> for StepValue {
    fn from(v: String) -> Self {
        StepValue::Text(v)
    }
}

impl From<Duration> for StepValue {
    fn from(v: Duration) -> Self {
        StepValue::Duration(v)
    }
}

impl From<(u64, u64)> for StepValue {
    fn from((rows, cols): (u64, u64)) -> Self {
        StepValue::Shape(rows, cols)
    }
}

impl From<(usize, usize)> for StepValue {
    fn from((rows, cols): (usize, usize)) -> Self {
        StepValue::Shape(rows as u64, cols as u64)
    }
}

/// Insertion-ordered key → value map of display data.
///
/// Re-inserting a key replaces its value but keeps its original position, so
/// the caller's narrative order survives repeated updates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    entries: Vec<(String, StepValue)>,
}

impl StepData {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<StepValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or overwrite a value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<StepValue>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    /// Merge another map into this one, in the other map's order.
    pub fn merge(&mut self, other: StepData) {
        for (key, value) in other.entries {
            self.insert(key, value);
        }
    }

    /// Look up a value by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&StepValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &StepValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K: Into<String>, V: Into<StepValue>> FromIterator<(K, V)> for StepData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut data = StepData::new();
        for (k, v) in iter {
            data.insert(k, v);
        }
        data
    }
}
