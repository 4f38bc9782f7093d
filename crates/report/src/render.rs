use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use common::{Error, MetricValue, Result};

use crate::manifest::{CURRENT, CURRENT_DIR, PREVIOUS};
use crate::metrics::{classify, ordered_keys, MetricRow, Polarity, Trend};
use crate::tree::{Report, ResultTree};

pub const GLYPH_UNCHANGED: &str = "\u{2744}";
pub const GLYPH_IMPROVED: &str = "\u{1F680}";
pub const GLYPH_WORSENED: &str = "\u{1F4A5}";
pub const GLYPH_WARNING: &str = "\u{203C}";
pub const GLYPH_DURATION: &str = "\u{23F1}";
pub const GLYPH_TAG: &str = "\u{1F3C5}";

/// One rendered comment body for an (exchange, currency, strategy) triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub exchange: String,
    pub currency: String,
    pub strategy: String,
    pub body: String,
}

/// Renders comparison documents from a normalized [`ResultTree`].
pub struct Renderer<'a> {
    tree: &'a ResultTree,
    artifacts_root: &'a Path,
    /// `org/name`, used for commit links in column headers.
    repo: &'a str,
}

impl<'a> Renderer<'a> {
    pub fn new(tree: &'a ResultTree, artifacts_root: &'a Path, repo: &'a str) -> Self {
        Self {
            tree,
            artifacts_root,
            repo,
        }
    }

    /// Documents for every exchange, in exchange order.
    pub fn render_all(&self) -> Result<Vec<Document>> {
        let mut documents = Vec::new();
        for exchange in self.tree.exchanges() {
            documents.extend(self.render_exchange(exchange)?);
        }
        Ok(documents)
    }

    /// One document per (currency, strategy) of the exchange's "Current" report.
    pub fn render_exchange(&self, exchange: &str) -> Result<Vec<Document>> {
        let reports = self.tree.reports(exchange).ok_or_else(|| {
            Error::DataIntegrity(format!("no reports loaded for exchange {exchange}"))
        })?;
        let current = reports.get(CURRENT).ok_or_else(|| {
            Error::DataIntegrity(format!("no {CURRENT} report for exchange {exchange}"))
        })?;
        let columns = column_order(reports);

        let mut documents = Vec::new();
        for (currency, strategies) in &current.results {
            for (strategy, timeranges) in strategies {
                let mut body = format!(
                    "# {} - {} - {}\n\n",
                    capitalize(exchange),
                    currency.to_uppercase(),
                    capitalize(strategy)
                );
                for (timerange, metrics) in timeranges {
                    body.push_str(&self.render_section(
                        exchange, &columns, currency, strategy, timerange, metrics.keys(),
                    )?);
                }
                debug!(exchange = %exchange, currency = %currency, strategy = %strategy, "Rendered document");
                documents.push(Document {
                    exchange: exchange.to_string(),
                    currency: currency.clone(),
                    strategy: strategy.clone(),
                    body: body.trim_end().to_string(),
                });
            }
        }
        Ok(documents)
    }

    fn render_section<'k>(
        &self,
        exchange: &str,
        columns: &[(&str, &Report)],
        currency: &str,
        strategy: &str,
        timerange: &str,
        keys: impl IntoIterator<Item = &'k String>,
    ) -> Result<String> {
        let mut section = format!("## {timerange}\n\n");
        section.push_str(&self.table_header(columns));

        for key in ordered_keys(keys) {
            let mut values = Vec::with_capacity(columns.len());
            for (name, _) in columns {
                values.push(
                    self.tree
                        .metric(exchange, name, currency, strategy, timerange, key)?,
                );
            }
            section.push_str(&render_row(key, &values));
            section.push('\n');
        }

        let output_path =
            backtest_output_path(self.artifacts_root, exchange, currency, strategy, timerange);
        let output = std::fs::read_to_string(&output_path).map_err(|e| {
            Error::DataIntegrity(format!(
                "cannot read backtest output {}: {e}",
                output_path.display()
            ))
        })?;
        section.push_str("\n<details>\n");
        section.push_str("<summary>Freqtrade Backtest Output (click me)</summary>\n");
        section.push_str(&format!("<pre>{}</pre>\n", output.trim()));
        section.push_str("</details>\n");
        section.push_str("\n\n");
        Ok(section)
    }

    fn table_header(&self, columns: &[(&str, &Report)]) -> String {
        let mut header = String::from("|     |      |");
        let mut separator = String::from("|  --: | :--: |");
        for (name, report) in columns {
            if *name == CURRENT {
                header.push_str(&format!(" {name} |"));
            } else {
                header.push_str(&format!(
                    " [{name}](https://github.com/{}/commit/{}) |",
                    self.repo, report.sha
                ));
            }
            separator.push_str(" --: |");
        }
        format!("{header}\n{separator}\n")
    }
}

/// Report columns: "Current", then "Previous", then the other labels ascending.
/// The second column, if any, is the comparison baseline.
pub fn column_order(reports: &BTreeMap<String, Report>) -> Vec<(&str, &Report)> {
    let mut columns: Vec<(&str, &Report)> = Vec::with_capacity(reports.len());
    for name in [CURRENT, PREVIOUS] {
        if let Some((name, report)) = reports.get_key_value(name) {
            columns.push((name.as_str(), report));
        }
    }
    columns.extend(
        reports
            .iter()
            .filter(|(name, _)| name.as_str() != CURRENT && name.as_str() != PREVIOUS)
            .map(|(name, report)| (name.as_str(), report)),
    );
    columns
}

/// Render one table row. `values[0]` is the current value and `values[1]`,
/// when present, the baseline.
pub fn render_row(key: &str, values: &[&MetricValue]) -> String {
    let (label, glyph, cells): (&str, &str, Vec<String>) = match classify(key) {
        MetricRow::Trend {
            label,
            polarity,
            percent,
            places,
        } => {
            let values: Vec<MetricValue> = values
                .iter()
                .map(|v| match places {
                    Some(places) => v.rounded(places),
                    None => (*v).clone(),
                })
                .collect();
            let suffix = if percent { " %" } else { "" };
            let glyph = trend_glyph(polarity, values.first(), values.get(1));
            let cells = values
                .iter()
                .map(|v| match v {
                    MetricValue::Number(_) => format!("{v}{suffix}"),
                    MetricValue::Text(s) => s.clone(),
                })
                .collect();
            (label, glyph, cells)
        }
        MetricRow::Duration { label } => (label, GLYPH_DURATION, raw_cells(values)),
        MetricRow::Tag => (key, GLYPH_TAG, raw_cells(values)),
        MetricRow::Generic => (key, "", raw_cells(values)),
    };

    let mut line = format!("|  {label} | {glyph} |");
    for cell in cells {
        line.push_str(&format!(" {cell} |"));
    }
    line
}

fn raw_cells(values: &[&MetricValue]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn trend_glyph(
    polarity: Polarity,
    current: Option<&MetricValue>,
    baseline: Option<&MetricValue>,
) -> &'static str {
    // Outer `None`: no such column. Inner `None`: text such as the sentinel.
    match (
        current.map(MetricValue::as_number),
        baseline.map(MetricValue::as_number),
    ) {
        (Some(Some(current)), Some(Some(baseline))) => match polarity.compare(current, baseline) {
            Trend::Improved => GLYPH_IMPROVED,
            Trend::Unchanged => GLYPH_UNCHANGED,
            Trend::Worsened => GLYPH_WORSENED,
        },
        (Some(None), _) | (_, Some(None)) => GLYPH_WARNING,
        _ => "",
    }
}

/// `<root>/current/<exchange>/<currency>/<strategy>/backtest-output-<timerange>.txt`
pub fn backtest_output_path(
    artifacts_root: &Path,
    exchange: &str,
    currency: &str,
    strategy: &str,
    timerange: &str,
) -> PathBuf {
    artifacts_root
        .join(CURRENT_DIR)
        .join(exchange)
        .join(currency)
        .join(strategy)
        .join(format!("backtest-output-{timerange}.txt"))
}

/// First character upper case, the rest lower case.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
