use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use common::{Error, MetricSet, MetricValue, Result};

use crate::manifest::{Manifest, ReportManifestEntry};

/// Prefix of the per-timerange result files written by the backtest harness.
pub const RESULT_FILE_PREFIX: &str = "ci-results-";

/// timerange → metrics
pub type TimerangeResults = BTreeMap<String, MetricSet>;
/// strategy → timerange → metrics
pub type StrategyResults = BTreeMap<String, TimerangeResults>;
/// currency → strategy → timerange → metrics
pub type CurrencyResults = BTreeMap<String, StrategyResults>;

/// All results of one report for one exchange.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Report {
    pub sha: String,
    pub results: CurrencyResults,
}

impl Report {
    pub fn new(sha: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            results: CurrencyResults::new(),
        }
    }

    pub fn metrics(&self, currency: &str, strategy: &str, timerange: &str) -> Option<&MetricSet> {
        self.results.get(currency)?.get(strategy)?.get(timerange)
    }
}

/// exchange → report name → report.
///
/// After [`ResultTree::normalize`] every report of an exchange covers the same
/// (currency, strategy, timerange) combinations with the same metric keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResultTree {
    exchanges: BTreeMap<String, BTreeMap<String, Report>>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every report declared in the manifest and normalize the result.
    pub fn load(manifest: &Manifest) -> Result<Self> {
        let mut tree = ResultTree::new();
        for (exchange, entries) in manifest.iter() {
            // Exchanges without any report still count as processed.
            tree.exchanges.entry(exchange.to_string()).or_default();
            for entry in entries {
                let report = load_report(entry)?;
                info!(
                    exchange = %exchange,
                    report = %entry.report_name,
                    sha = %entry.source_sha,
                    currencies = report.results.len(),
                    "Loaded report"
                );
                tree.insert_report(exchange, &entry.report_name, report);
            }
        }
        tree.normalize();
        Ok(tree)
    }

    pub fn insert_report(&mut self, exchange: &str, name: &str, report: Report) {
        self.exchanges
            .entry(exchange.to_string())
            .or_default()
            .insert(name.to_string(), report);
    }

    pub fn exchanges(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    pub fn reports(&self, exchange: &str) -> Option<&BTreeMap<String, Report>> {
        self.exchanges.get(exchange)
    }

    pub fn report(&self, exchange: &str, name: &str) -> Option<&Report> {
        self.exchanges.get(exchange)?.get(name)
    }

    /// Look up a single metric, failing with the full key path when absent.
    pub fn metric(
        &self,
        exchange: &str,
        report: &str,
        currency: &str,
        strategy: &str,
        timerange: &str,
        key: &str,
    ) -> Result<&MetricValue> {
        self.report(exchange, report)
            .and_then(|r| r.metrics(currency, strategy, timerange))
            .and_then(|m| m.get(key))
            .ok_or_else(|| {
                Error::DataIntegrity(format!(
                    "no value for {exchange}/{report}/{currency}/{strategy}/{timerange}/{key}"
                ))
            })
    }

    /// Make every report under an exchange cover the union of the
    /// (currency, strategy, timerange, metric) keys seen in any of its reports.
    ///
    /// Missing metrics are set to the sentinel. Existing values are never
    /// replaced. Returns the number of sentinel values inserted.
    pub fn normalize(&mut self) -> usize {
        let mut filled = 0;
        for (exchange, reports) in self.exchanges.iter_mut() {
            let mut union: BTreeMap<(&str, &str, &str), BTreeSet<&str>> = BTreeMap::new();
            for report in reports.values() {
                for (currency, strategies) in &report.results {
                    for (strategy, timeranges) in strategies {
                        for (timerange, metrics) in timeranges {
                            union
                                .entry((currency.as_str(), strategy.as_str(), timerange.as_str()))
                                .or_default()
                                .extend(metrics.keys().map(String::as_str));
                        }
                    }
                }
            }
            let union: Vec<((String, String, String), Vec<String>)> = union
                .into_iter()
                .map(|((c, s, t), keys)| {
                    (
                        (c.to_string(), s.to_string(), t.to_string()),
                        keys.into_iter().map(str::to_string).collect(),
                    )
                })
                .collect();

            let mut exchange_filled = 0;
            for report in reports.values_mut() {
                for ((currency, strategy, timerange), keys) in &union {
                    let metrics = report
                        .results
                        .entry(currency.clone())
                        .or_default()
                        .entry(strategy.clone())
                        .or_default()
                        .entry(timerange.clone())
                        .or_default();
                    for key in keys {
                        if !metrics.contains_key(key) {
                            metrics.insert(key.clone(), MetricValue::sentinel());
                            exchange_filled += 1;
                        }
                    }
                }
            }
            debug!(exchange = %exchange, filled = exchange_filled, "Normalized reports");
            filled += exchange_filled;
        }
        filled
    }
}

/// Load `<source_path>/<exchange>/<currency>/<strategy>/**/ci-results-*`.
///
/// Files under one (currency, strategy) are merged in ascending path order;
/// a timerange found in a later file replaces the earlier one.
pub fn load_report(entry: &ReportManifestEntry) -> Result<Report> {
    let mut report = Report::new(entry.source_sha.clone());
    let exchange_dir = entry.source_path.join(&entry.exchange);
    if !exchange_dir.is_dir() {
        warn!(
            exchange = %entry.exchange,
            report = %entry.report_name,
            path = %exchange_dir.display(),
            "No results directory for report"
        );
        return Ok(report);
    }

    for currency_dir in sorted_subdirs(&exchange_dir)? {
        let currency = dir_name(&currency_dir);
        let strategies = report.results.entry(currency).or_default();
        for strategy_dir in sorted_subdirs(&currency_dir)? {
            let timeranges = strategies.entry(dir_name(&strategy_dir)).or_default();
            for file in result_files(&strategy_dir)? {
                let text = std::fs::read_to_string(&file)?;
                let parsed: TimerangeResults = serde_json::from_str(&text).map_err(|e| {
                    Error::DataIntegrity(format!("invalid results file {}: {e}", file.display()))
                })?;
                timeranges.extend(parsed);
            }
        }
    }
    Ok(report)
}

/// Immediate subdirectories of `dir`, by name.
fn sorted_subdirs(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn result_files(dir: &Path) -> Result<Vec<std::path::PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(RESULT_FILE_PREFIX))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}
