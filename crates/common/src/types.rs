use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder stored for a metric that a report does not have.
pub const SENTINEL: &str = "n/a";

/// A single metric value as found in a `ci-results-*` file.
///
/// Most metrics are numbers. Durations (`"1:23:00"`), per-tag breakdowns
/// (`"3 / 1 / 0"`) and the sentinel are text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Number(f64),
    Text(String),
}

impl MetricValue {
    pub fn sentinel() -> Self {
        MetricValue::Text(SENTINEL.to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        matches!(self, MetricValue::Text(s) if s == SENTINEL)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetricValue::Number(n) => Some(*n),
            MetricValue::Text(_) => None,
        }
    }

    /// Round numbers to `places` decimal places; text is returned unchanged.
    pub fn rounded(&self, places: u32) -> Self {
        match self {
            MetricValue::Number(n) => MetricValue::Number(round_to(*n, places)),
            MetricValue::Text(s) => MetricValue::Text(s.clone()),
        }
    }
}

impl std::fmt::Display for MetricValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricValue::Number(n) => write!(f, "{n}"),
            MetricValue::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<f64> for MetricValue {
    fn from(value: f64) -> Self {
        MetricValue::Number(value)
    }
}

impl From<u64> for MetricValue {
    fn from(value: u64) -> Self {
        MetricValue::Number(value as f64)
    }
}

impl From<&str> for MetricValue {
    fn from(value: &str) -> Self {
        MetricValue::Text(value.to_string())
    }
}

impl From<String> for MetricValue {
    fn from(value: String) -> Self {
        MetricValue::Text(value)
    }
}

/// Metric key → value for one backtest timerange.
pub type MetricSet = BTreeMap<String, MetricValue>;

/// Round to `places` decimal places from the exact decimal expansion of
/// `value`; exact ties go to the even digit.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.prec$}", prec = places as usize)
        .parse()
        .unwrap_or(value)
}

/// A commit comment as stored by the comment host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    /// Login of the identity that authored the comment.
    pub author: String,
    pub body: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_recognised() {
        assert!(MetricValue::sentinel().is_sentinel());
        assert!(!MetricValue::from("1 / 0 / 0").is_sentinel());
        assert!(!MetricValue::from(0.0).is_sentinel());
    }

    #[test]
    fn untagged_deserialization_keeps_numbers_and_text_apart() {
        let set: MetricSet =
            serde_json::from_str(r#"{"trades": 42, "winrate": 81.25, "duration_avg": "1:05:00"}"#)
                .unwrap();
        assert_eq!(set["trades"], MetricValue::Number(42.0));
        assert_eq!(set["winrate"], MetricValue::Number(81.25));
        assert_eq!(set["duration_avg"], MetricValue::Text("1:05:00".into()));
    }

    #[test]
    fn rounding_only_touches_numbers() {
        assert_eq!(MetricValue::from(1.234_56).rounded(4), MetricValue::Number(1.2346));
        assert_eq!(MetricValue::sentinel().rounded(4), MetricValue::sentinel());
    }

    #[test]
    fn rounding_follows_the_exact_decimal_value() {
        // 2.675 is stored as 2.67499999...
        assert_eq!(round_to(2.675, 2), 2.67);
        // 3.125 is exact; the tie goes to the even digit.
        assert_eq!(round_to(3.125, 2), 3.12);
        assert_eq!(round_to(-1.005, 2), -1.0);
        assert_eq!(round_to(57.123_456, 4), 57.1235);
        assert_eq!(round_to(42.0, 4), 42.0);
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(MetricValue::from(42u64).to_string(), "42");
        assert_eq!(MetricValue::from(12.5).to_string(), "12.5");
    }
}
