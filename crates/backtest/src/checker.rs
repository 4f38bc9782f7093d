use std::fmt;

use tracing::{info, warn};

use common::{Error, Result};

use crate::expected::ExpectedResult;
use crate::results::StatsPct;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckedMetric {
    Winrate,
    MaxDrawdown,
}

impl CheckedMetric {
    /// Field name in the expectation table.
    pub fn field(&self) -> &'static str {
        match self {
            CheckedMetric::Winrate => "winrate",
            CheckedMetric::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for CheckedMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckedMetric::Winrate => write!(f, "Winrate"),
            CheckedMetric::MaxDrawdown => write!(f, "Max Drawdown"),
        }
    }
}

/// A tolerance breach, with the value that would make the check pass again.
#[derive(Debug, Clone, PartialEq)]
pub struct Regression {
    pub metric: CheckedMetric,
    pub actual: f64,
    pub expected: f64,
    /// Literal to put in the expectation table. Always derived from `actual`.
    pub suggested: i64,
    /// `exchange/strategy/stake_currency/timerange`
    pub key: String,
}

impl fmt::Display for Regression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let direction = match self.metric {
            CheckedMetric::Winrate => "below",
            CheckedMetric::MaxDrawdown => "above",
        };
        write!(
            f,
            "{} regressed for {}: actual {} is {direction} the expected {}. \
             Set `{} = {}` in the expected results table to accept it.",
            self.metric,
            self.key,
            self.actual,
            self.expected,
            self.metric.field(),
            self.suggested,
        )
    }
}

/// Floor of the observed win rate.
pub fn suggested_winrate(actual: f64) -> i64 {
    actual.floor() as i64
}

/// Integer part of the observed drawdown, plus one.
pub fn suggested_max_drawdown(actual: f64) -> i64 {
    actual.trunc() as i64 + 1
}

/// Win rate may exceed the expectation freely.
pub fn check_winrate(actual: f64, expected: &ExpectedResult) -> Option<Regression> {
    (actual < expected.winrate).then(|| Regression {
        metric: CheckedMetric::Winrate,
        actual,
        expected: expected.winrate,
        suggested: suggested_winrate(actual),
        key: expected.key(),
    })
}

/// Drawdown may come in under the expectation freely.
pub fn check_max_drawdown(actual: f64, expected: &ExpectedResult) -> Option<Regression> {
    (actual > expected.max_drawdown).then(|| Regression {
        metric: CheckedMetric::MaxDrawdown,
        actual,
        expected: expected.max_drawdown,
        suggested: suggested_max_drawdown(actual),
        key: expected.key(),
    })
}

/// Run both checks. Neither short-circuits the other.
pub fn check(stats: &StatsPct, expected: &ExpectedResult) -> Vec<Regression> {
    let regressions: Vec<Regression> = [
        check_winrate(stats.winrate, expected),
        check_max_drawdown(stats.max_drawdown, expected),
    ]
    .into_iter()
    .flatten()
    .collect();

    if regressions.is_empty() {
        info!(
            key = %expected.key(),
            winrate = stats.winrate,
            max_drawdown = stats.max_drawdown,
            "Backtest within expectations"
        );
    }
    for regression in &regressions {
        warn!(
            key = %regression.key,
            metric = regression.metric.field(),
            actual = regression.actual,
            expected = regression.expected,
            suggested = regression.suggested,
            "Backtest regressed"
        );
    }
    regressions
}

/// `Ok` when nothing regressed, otherwise one error carrying every message.
pub fn into_result(regressions: &[Regression]) -> Result<()> {
    if regressions.is_empty() {
        return Ok(());
    }
    let messages: Vec<String> = regressions.iter().map(|r| r.to_string()).collect();
    Err(Error::Regression(messages.join("\n")))
}
