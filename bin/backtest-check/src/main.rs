use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use backtest::checker::{self, into_result};
use backtest::{Backtest, ExpectedResults};
use common::{EngineConfig, Error, Result};

/// Backtest a strategy over every pinned timerange and check win rate and
/// drawdown against the expectation table.
#[derive(Parser, Debug)]
#[command(name = "backtest-check")]
struct Cli {
    #[arg(long, default_value = "busd", value_parser = ["usdt", "busd"])]
    stake_currency: String,

    #[arg(long, default_value = "Apollo11", value_parser = ["Apollo11", "Saturn5"])]
    strategy: String,

    #[arg(long, default_value = "binance", value_parser = ["binance", "kucoin"])]
    exchange: String,

    /// Where CI artifacts are written; created if absent
    #[arg(long)]
    artifacts_path: Option<PathBuf>,

    /// Expectation table
    #[arg(long, default_value = "config/expected-results.toml")]
    expected: PathBuf,

    /// Working directory of the backtesting engine
    #[arg(long, default_value = ".")]
    repo_root: PathBuf,

    /// Only check this timerange
    #[arg(long)]
    timerange: Option<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(failures) if failures.is_empty() => ExitCode::SUCCESS,
        Ok(failures) => {
            for (timerange, e) in &failures {
                eprintln!("[{timerange}] {e}");
            }
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Every timerange is attempted; failures are collected rather than fatal.
fn run(cli: &Cli) -> Result<Vec<(String, Error)>> {
    let engine = EngineConfig::from_env();
    let table = ExpectedResults::load(&cli.expected)?;
    if let Some(path) = &cli.artifacts_path {
        std::fs::create_dir_all(path)?;
    }

    let timeranges = match &cli.timerange {
        Some(timerange) => vec![timerange.clone()],
        None => table.timeranges(),
    };
    info!(
        exchange = %cli.exchange,
        strategy = %cli.strategy,
        stake_currency = %cli.stake_currency,
        timeranges = timeranges.len(),
        "Starting backtest checks"
    );

    let mut failures = Vec::new();
    for timerange in &timeranges {
        if let Err(e) = check_timerange(cli, &engine, &table, timerange) {
            error!(timerange = %timerange, error = %e, "Backtest check failed");
            failures.push((timerange.clone(), e));
        }
    }
    info!(
        passed = timeranges.len() - failures.len(),
        failed = failures.len(),
        "Backtest checks finished"
    );
    Ok(failures)
}

fn check_timerange(
    cli: &Cli,
    engine: &EngineConfig,
    table: &ExpectedResults,
    timerange: &str,
) -> Result<()> {
    let expected = table.find(&cli.exchange, &cli.strategy, &cli.stake_currency, timerange)?;

    let mut backtest = Backtest::new(
        &cli.repo_root,
        engine.clone(),
        &expected.exchange,
        &cli.strategy,
        &cli.stake_currency,
        timerange,
    );
    if let Some(path) = &cli.artifacts_path {
        backtest = backtest.with_artifacts_path(path);
    }

    let run = backtest.run()?;
    into_result(&checker::check(&run.stats_pct, expected))
}
