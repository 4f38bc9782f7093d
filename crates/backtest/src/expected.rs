use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use common::{Error, Result};

/// One pinned expectation for a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedResult {
    pub exchange: String,
    pub strategy: String,
    pub stake_currency: String,
    pub timerange: String,
    /// Lowest acceptable win rate, percent.
    pub winrate: f64,
    /// Highest acceptable drawdown, percent.
    pub max_drawdown: f64,
}

impl ExpectedResult {
    /// `exchange/strategy/stake_currency/timerange`
    pub fn key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.exchange, self.strategy, self.stake_currency, self.timerange
        )
    }
}

/// The hand-curated expectation table.
///
/// Example `config/expected-results.toml`:
/// ```toml
/// [[result]]
/// exchange = "binance"
/// strategy = "Apollo11"
/// stake_currency = "usdt"
/// timerange = "20210101-20210201"
/// winrate = 80
/// max_drawdown = 128
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ExpectedResults {
    #[serde(rename = "result", default)]
    results: Vec<ExpectedResult>,
}

impl ExpectedResults {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read expected results at '{}': {e}",
                path.display()
            ))
        })?;
        let table = Self::from_toml(&content)?;
        debug!(path = %path.display(), rows = table.results.len(), "Loaded expected results");
        Ok(table)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn results(&self) -> &[ExpectedResult] {
        &self.results
    }

    /// Distinct timeranges in the order they first appear.
    pub fn timeranges(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for result in &self.results {
            if !seen.contains(&result.timerange) {
                seen.push(result.timerange.clone());
            }
        }
        seen
    }

    /// The row matching all four keys exactly.
    pub fn find(
        &self,
        exchange: &str,
        strategy: &str,
        stake_currency: &str,
        timerange: &str,
    ) -> Result<&ExpectedResult> {
        self.results
            .iter()
            .find(|r| {
                r.exchange == exchange
                    && r.strategy == strategy
                    && r.stake_currency == stake_currency
                    && r.timerange == timerange
            })
            .ok_or_else(|| {
                Error::DataIntegrity(format!(
                    "Could not find expected_results for {exchange} using {stake_currency} \
                     for {strategy} and {timerange}"
                ))
            })
    }
}
