use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Error, MetricSet, MetricValue, Result};

/// Sell reason the engine records for trades closed at the end of a backtest.
pub const FORCE_SELL: &str = "force_sell";

/// Suffix of the per-tag statistics keys.
pub const TAG_STATS_SUFFIX: &str = "wins / losses / force-sell";

/// The JSON document the engine exports after a backtest.
///
/// Only the fields the CI checks read are modelled; everything else is ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct BacktestExport {
    pub strategy: BTreeMap<String, StrategyResults>,
    pub strategy_comparison: Vec<ComparisonRow>,
}

/// Detailed results of a single strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyResults {
    /// Fraction, e.g. `0.57` for 57 %.
    pub max_drawdown: f64,
    #[serde(default)]
    pub trades: Vec<TradeRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    #[serde(default)]
    pub buy_tag: Option<String>,
    pub profit_abs: f64,
    #[serde(default)]
    pub sell_reason: Option<String>,
}

/// One row of the strategy comparison summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonRow {
    #[serde(default)]
    pub key: Option<String>,
    /// Usually an `H:MM:SS` string.
    pub duration_avg: MetricValue,
    pub profit_sum_pct: f64,
    pub profit_mean_pct: f64,
    pub profit_total_pct: f64,
    pub trades: u64,
    pub wins: u64,
}

/// The statistics a CI run records and checks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsPct {
    pub duration_avg: MetricValue,
    pub profit_sum_pct: f64,
    pub profit_mean_pct: f64,
    pub profit_total_pct: f64,
    /// Percent.
    pub max_drawdown: f64,
    pub trades: u64,
    /// Percent of winning trades, two decimal places.
    pub winrate: f64,
    /// `"<buy_tag> wins / losses / force-sell"` → `"W / L / F"`.
    #[serde(flatten)]
    pub tags: BTreeMap<String, String>,
}

impl StatsPct {
    pub fn new(results: &StrategyResults, stats: &ComparisonRow) -> Self {
        Self {
            duration_avg: stats.duration_avg.clone(),
            profit_sum_pct: stats.profit_sum_pct,
            profit_mean_pct: stats.profit_mean_pct,
            profit_total_pct: stats.profit_total_pct,
            max_drawdown: results.max_drawdown * 100.0,
            trades: stats.trades,
            winrate: winrate(stats.wins, stats.trades),
            tags: tag_breakdown(&results.trades),
        }
    }

    /// Flatten into the metric set stored in a `ci-results-*` file.
    pub fn to_metrics(&self) -> MetricSet {
        let mut metrics = MetricSet::new();
        metrics.insert("duration_avg".into(), self.duration_avg.clone());
        metrics.insert("profit_sum_pct".into(), self.profit_sum_pct.into());
        metrics.insert("profit_mean_pct".into(), self.profit_mean_pct.into());
        metrics.insert("profit_total_pct".into(), self.profit_total_pct.into());
        metrics.insert("max_drawdown".into(), self.max_drawdown.into());
        metrics.insert("trades".into(), self.trades.into());
        metrics.insert("winrate".into(), self.winrate.into());
        for (key, value) in &self.tags {
            metrics.insert(key.clone(), value.as_str().into());
        }
        metrics
    }
}

/// Winning trades as a percentage, rounded to two places. Zero trades is 0.
pub fn winrate(wins: u64, trades: u64) -> f64 {
    if trades == 0 {
        return 0.0;
    }
    common::round_to(wins as f64 * 100.0 / trades as f64, 2)
}

/// Count wins, losses and force-sells per buy tag.
///
/// A force-sell is counted as such regardless of its profit. Trades without a
/// tag are grouped under `None`.
pub fn tag_breakdown(trades: &[TradeRecord]) -> BTreeMap<String, String> {
    let mut counts: BTreeMap<String, (u64, u64, u64)> = BTreeMap::new();
    for trade in trades {
        let tag = trade.buy_tag.as_deref().unwrap_or("None");
        let entry = counts
            .entry(format!("{tag} {TAG_STATS_SUFFIX}"))
            .or_default();
        if trade.sell_reason.as_deref() == Some(FORCE_SELL) {
            entry.2 += 1;
        } else if trade.profit_abs > 0.0 {
            entry.0 += 1;
        } else {
            entry.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(key, (wins, losses, force))| (key, format!("{wins} / {losses} / {force}")))
        .collect()
}

/// The outcome of one successful backtest run.
#[derive(Debug, Clone)]
pub struct BacktestRunResult {
    pub strategy: String,
    pub stdout: String,
    pub stderr: String,
    pub results: StrategyResults,
    pub full_stats: ComparisonRow,
    pub stats_pct: StatsPct,
}

impl BacktestRunResult {
    pub fn from_json(strategy: &str, stdout: &str, stderr: &str, text: &str) -> Result<Self> {
        let export: BacktestExport = serde_json::from_str(text)
            .map_err(|e| Error::DataIntegrity(format!("invalid backtest export: {e}")))?;
        Self::from_export(strategy, stdout, stderr, export)
    }

    /// Pick the strategy's results and its comparison row out of an export.
    ///
    /// The comparison row whose `key` names the strategy is preferred; the
    /// first row is used otherwise.
    pub fn from_export(
        strategy: &str,
        stdout: &str,
        stderr: &str,
        mut export: BacktestExport,
    ) -> Result<Self> {
        let results = export.strategy.remove(strategy).ok_or_else(|| {
            Error::DataIntegrity(format!("backtest export has no results for {strategy}"))
        })?;
        if export.strategy_comparison.is_empty() {
            return Err(Error::DataIntegrity(
                "backtest export has an empty strategy comparison".into(),
            ));
        }
        let idx = export
            .strategy_comparison
            .iter()
            .position(|row| row.key.as_deref() == Some(strategy))
            .unwrap_or(0);
        let full_stats = export.strategy_comparison.swap_remove(idx);
        let stats_pct = StatsPct::new(&results, &full_stats);

        Ok(Self {
            strategy: strategy.to_string(),
            stdout: stdout.trim().to_string(),
            stderr: stderr.trim().to_string(),
            results,
            full_stats,
            stats_pct,
        })
    }

    pub fn log_info(&self) {
        debug!(
            strategy = %self.strategy,
            results = ?self.results,
            full_stats = ?self.full_stats,
            "Backtest results"
        );
        info!(
            strategy = %self.strategy,
            stats_pct = ?self.stats_pct,
            "Backtest stats (more at debug level)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(tag: Option<&str>, profit: f64, reason: &str) -> TradeRecord {
        TradeRecord {
            buy_tag: tag.map(String::from),
            profit_abs: profit,
            sell_reason: Some(reason.to_string()),
        }
    }

    const EXPORT: &str = r#"{
        "strategy": {
            "Apollo11": {
                "max_drawdown": 0.5712,
                "trades": [
                    {"buy_tag": "buy_signal_1", "profit_abs": 3.2, "sell_reason": "roi"},
                    {"buy_tag": "buy_signal_1", "profit_abs": -1.0, "sell_reason": "stop_loss"},
                    {"buy_tag": "buy_signal_2", "profit_abs": 2.0, "sell_reason": "force_sell"},
                    {"buy_tag": null, "profit_abs": 0.0, "sell_reason": "roi"}
                ]
            }
        },
        "strategy_comparison": [
            {"key": "Apollo11", "duration_avg": "1:23:00", "profit_sum_pct": 4.2,
             "profit_mean_pct": 1.05, "profit_total_pct": 0.28, "trades": 4, "wins": 1,
             "draws": 1, "losses": 2}
        ]
    }"#;

    #[test]
    fn stats_are_extracted_from_export() {
        let run = BacktestRunResult::from_json("Apollo11", " out \n", "", EXPORT).unwrap();
        let stats = &run.stats_pct;
        assert_eq!(run.stdout, "out");
        assert_eq!(stats.trades, 4);
        assert_eq!(stats.winrate, 25.0);
        assert!((stats.max_drawdown - 57.12).abs() < 1e-9);
        assert_eq!(stats.duration_avg, MetricValue::Text("1:23:00".into()));
        assert_eq!(stats.tags["buy_signal_1 wins / losses / force-sell"], "1 / 1 / 0");
        assert_eq!(stats.tags["buy_signal_2 wins / losses / force-sell"], "0 / 0 / 1");
        assert_eq!(stats.tags["None wins / losses / force-sell"], "0 / 1 / 0");
    }

    #[test]
    fn metrics_carry_tags_as_text() {
        let run = BacktestRunResult::from_json("Apollo11", "", "", EXPORT).unwrap();
        let metrics = run.stats_pct.to_metrics();
        assert_eq!(metrics["trades"], MetricValue::Number(4.0));
        assert_eq!(
            metrics["buy_signal_2 wins / losses / force-sell"],
            MetricValue::Text("0 / 0 / 1".into())
        );
    }

    #[test]
    fn serialized_stats_flatten_tags() {
        let run = BacktestRunResult::from_json("Apollo11", "", "", EXPORT).unwrap();
        let json = serde_json::to_value(&run.stats_pct).unwrap();
        assert_eq!(json["winrate"], 25.0);
        assert_eq!(json["None wins / losses / force-sell"], "0 / 1 / 0");
        assert!(json.get("tags").is_none());
    }

    #[test]
    fn unknown_strategy_is_a_data_error() {
        let err = BacktestRunResult::from_json("Saturn5", "", "", EXPORT).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(ref m) if m.contains("Saturn5")));
    }

    #[test]
    fn zero_trades_has_zero_winrate() {
        assert_eq!(winrate(0, 0), 0.0);
        assert_eq!(winrate(2, 3), 66.67);
    }

    #[test]
    fn winrate_ties_round_to_even() {
        // 100 / 32 = 3.125 exactly.
        assert_eq!(winrate(1, 32), 3.12);
        // 300 / 32 = 9.375 exactly.
        assert_eq!(winrate(3, 32), 9.38);
        assert_eq!(winrate(1, 3), 33.33);
    }

    #[test]
    fn force_sell_wins_over_profit() {
        let tags = tag_breakdown(&[
            trade(Some("t"), 5.0, "force_sell"),
            trade(Some("t"), -5.0, "force_sell"),
            trade(Some("t"), 5.0, "roi"),
        ]);
        assert_eq!(tags["t wins / losses / force-sell"], "1 / 0 / 2");
    }
}
