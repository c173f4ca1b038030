//! Headline figures derived from aggregated data.
//!
//! Every ratio helper returns `0` when its denominator is zero, so no KPI can
//! serialize as `NaN` or `Infinity`.

use serde_json::{Map, Value};

pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 100.0).round() / 100.0
}

/// `numerator / denominator`, or `0` when the denominator is zero.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Share of `part` in `whole` as a percentage, rounded to two decimals.
pub fn percent_share(part: f64, whole: f64) -> f64 {
    round2(ratio(part, whole) * 100.0)
}

/// Percentage change from `previous` to `current`, rounded to two decimals.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    round2(ratio(current - previous, previous) * 100.0)
}

/// Flat, ordered KPI mapping.
#[derive(Debug, Clone, Default)]
pub struct Kpis {
    values: Map<String, Value>,
}

impl Kpis {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numeric KPI, rounded to two decimals.
    pub fn number(mut self, name: &str, value: f64) -> Self {
        self.values.insert(name.to_string(), Value::from(round2(value)));
        self
    }

    pub fn count(mut self, name: &str, value: usize) -> Self {
        self.values.insert(name.to_string(), Value::from(value));
        self
    }

    pub fn text(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), Value::from(value.into()));
        self
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }
}
