//! How each metric key is labelled, compared and formatted in a results table.

/// Prefix of per-tag breakdown keys. These rows are always listed last.
pub const TAG_PREFIX: &str = "buy_signal_";

/// Decimal places percentage metrics are rounded to before display and comparison.
pub const PERCENT_PLACES: u32 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Outcome of comparing a current value against its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improved,
    Unchanged,
    Worsened,
}

impl Polarity {
    pub fn compare(self, current: f64, baseline: f64) -> Trend {
        match current.partial_cmp(&baseline) {
            Some(std::cmp::Ordering::Greater) => match self {
                Polarity::HigherIsBetter => Trend::Improved,
                Polarity::LowerIsBetter => Trend::Worsened,
            },
            Some(std::cmp::Ordering::Less) => match self {
                Polarity::HigherIsBetter => Trend::Worsened,
                Polarity::LowerIsBetter => Trend::Improved,
            },
            Some(std::cmp::Ordering::Equal) | None => Trend::Unchanged,
        }
    }
}

/// Rendering class of a metric key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricRow {
    /// Compared against the baseline and shown with a trend glyph.
    Trend {
        label: &'static str,
        polarity: Polarity,
        /// Append a percent sign to numeric values.
        percent: bool,
        /// Decimal places to round to, if any.
        places: Option<u32>,
    },
    /// Informational, never compared.
    Duration { label: &'static str },
    /// `buy_signal_*` wins/losses/force-sell breakdown.
    Tag,
    /// Anything not listed in the table; shown raw.
    Generic,
}

const METRIC_TABLE: &[(&str, MetricRow)] = &[
    (
        "max_drawdown",
        MetricRow::Trend {
            label: "Max Drawdown",
            polarity: Polarity::LowerIsBetter,
            percent: true,
            places: Some(PERCENT_PLACES),
        },
    ),
    (
        "profit_mean_pct",
        MetricRow::Trend {
            label: "Profit Mean",
            polarity: Polarity::HigherIsBetter,
            percent: true,
            places: Some(PERCENT_PLACES),
        },
    ),
    (
        "profit_sum_pct",
        MetricRow::Trend {
            label: "Profit Sum",
            polarity: Polarity::HigherIsBetter,
            percent: true,
            places: Some(PERCENT_PLACES),
        },
    ),
    (
        "profit_total_pct",
        MetricRow::Trend {
            label: "Profit Total",
            polarity: Polarity::HigherIsBetter,
            percent: true,
            places: Some(PERCENT_PLACES),
        },
    ),
    (
        "winrate",
        MetricRow::Trend {
            label: "Win Rate",
            polarity: Polarity::HigherIsBetter,
            percent: true,
            places: Some(PERCENT_PLACES),
        },
    ),
    (
        "trades",
        MetricRow::Trend {
            label: "Trades",
            polarity: Polarity::HigherIsBetter,
            percent: false,
            places: None,
        },
    ),
    (
        "duration_avg",
        MetricRow::Duration {
            label: "Average Duration",
        },
    ),
];

pub fn classify(key: &str) -> MetricRow {
    if let Some((_, row)) = METRIC_TABLE.iter().find(|(k, _)| *k == key) {
        return *row;
    }
    if key.starts_with(TAG_PREFIX) {
        MetricRow::Tag
    } else {
        MetricRow::Generic
    }
}

/// Table order for a timerange's metric keys: plain keys ascending, then tag
/// keys ascending.
pub fn ordered_keys<'a, I>(keys: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut keys: Vec<&str> = keys.into_iter().map(String::as_str).collect();
    keys.sort_by(|a, b| {
        (a.starts_with(TAG_PREFIX), *a).cmp(&(b.starts_with(TAG_PREFIX), *b))
    });
    keys
}
