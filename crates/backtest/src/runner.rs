use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};
use walkdir::WalkDir;

use common::{EngineConfig, Error, Result};

use crate::results::BacktestRunResult;

pub const DEFAULT_MAX_OPEN_TRADES: u32 = 6;
pub const DEFAULT_STAKE_AMOUNT: &str = "150";
const EXPORT_PREFIX: &str = "backtest-results-";

/// Exit code, output and command line of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessResult {
    pub exitcode: i32,
    pub stdout: String,
    pub stderr: String,
    pub cmdline: Vec<String>,
}

impl fmt::Display for ProcessResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProcessResult")?;
        if !self.cmdline.is_empty() {
            write!(f, "\n Command Line: {:?}", self.cmdline)?;
        }
        write!(f, "\n Exitcode: {}", self.exitcode)?;
        if !self.stdout.is_empty() || !self.stderr.is_empty() {
            write!(f, "\n Process Output:")?;
        }
        if !self.stdout.is_empty() {
            write!(f, "\n   >>>>> STDOUT >>>>>\n{}\n   <<<<< STDOUT <<<<<", self.stdout)?;
        }
        if !self.stderr.is_empty() {
            write!(f, "\n   >>>>> STDERR >>>>>\n{}\n   <<<<< STDERR <<<<<", self.stderr)?;
        }
        writeln!(f)
    }
}

/// One backtest invocation of the external engine.
#[derive(Debug, Clone)]
pub struct Backtest {
    /// Working directory of the engine; engine paths are relative to it.
    repo_root: PathBuf,
    engine: EngineConfig,
    exchange: String,
    strategy: String,
    stake_currency: String,
    timerange: String,
    max_open_trades: u32,
    stake_amount: String,
    /// Replaces the static exchange pairlist when set.
    pairlist: Option<Vec<String>>,
    /// Root of the CI artifacts tree.
    artifacts_path: Option<PathBuf>,
}

impl Backtest {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        engine: EngineConfig,
        exchange: &str,
        strategy: &str,
        stake_currency: &str,
        timerange: &str,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            engine,
            exchange: exchange.to_string(),
            strategy: strategy.to_string(),
            stake_currency: stake_currency.to_string(),
            timerange: timerange.to_string(),
            max_open_trades: DEFAULT_MAX_OPEN_TRADES,
            stake_amount: DEFAULT_STAKE_AMOUNT.to_string(),
            pairlist: None,
            artifacts_path: None,
        }
    }

    pub fn with_pairlist(mut self, pairs: Vec<String>) -> Self {
        self.pairlist = Some(pairs);
        self
    }

    pub fn with_artifacts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.artifacts_path = Some(path.into());
        self
    }

    pub fn with_max_open_trades(mut self, max_open_trades: u32) -> Self {
        self.max_open_trades = max_open_trades;
        self
    }

    pub fn with_stake_amount(mut self, stake_amount: &str) -> Self {
        self.stake_amount = stake_amount.to_string();
        self
    }

    /// Engine arguments for this backtest.
    pub fn cmdline(&self, exchange_config: &str, export: &Path) -> Vec<String> {
        let user_data = &self.engine.user_data;
        vec![
            self.engine.freqtrade_bin.clone(),
            "backtesting".to_string(),
            "--timeframe=15m".to_string(),
            "--timeframe-detail=5m".to_string(),
            "--enable-protections".to_string(),
            format!("--user-data={user_data}"),
            format!("--strategy-list={}", self.strategy),
            format!("--timerange={}", self.timerange),
            format!("--max-open-trades={}", self.max_open_trades),
            format!("--stake-amount={}", self.stake_amount),
            format!("--config={user_data}/data/pairlists.json"),
            format!("--config={user_data}/data/pairlists-{}.json", self.stake_currency),
            format!("--config={exchange_config}"),
            format!("--export-filename={}", export.display()),
        ]
    }

    fn static_exchange_config(&self) -> String {
        format!(
            "{}/data/{}-{}-static.json",
            self.engine.user_data, self.exchange, self.stake_currency
        )
    }

    /// Fail unless the exchange's market data is checked out.
    pub fn ensure_exchange_data(&self) -> Result<()> {
        let dir = self
            .repo_root
            .join(&self.engine.user_data)
            .join("data")
            .join(&self.exchange);
        let has_data = dir.is_dir()
            && WalkDir::new(&dir)
                .into_iter()
                .filter_map(|e| e.ok())
                .any(|e| {
                    e.file_type().is_file()
                        && e.file_name().to_string_lossy().ends_with(".json.gz")
                });
        if !has_data {
            return Err(Error::DataIntegrity(format!(
                "There's no exchange data for {}. Make sure the repository submodule is \
                 init/update. Check the repository README.md for more information.",
                self.exchange
            )));
        }
        Ok(())
    }

    /// Write an exchange config restricting the backtest to `pairs`.
    pub fn write_pairlist(&self, dir: &Path, pairs: &[String]) -> Result<PathBuf> {
        let path = dir.join("test-pairlist.json");
        let config = serde_json::json!({
            "exchange": {
                "name": self.exchange,
                "pair_whitelist": pairs,
            }
        });
        fs::write(&path, serde_json::to_string_pretty(&config)?)?;
        Ok(path)
    }

    /// `<artifacts>/<exchange>/<stake_currency>/<strategy>`
    pub fn artifacts_dir(&self) -> Option<PathBuf> {
        self.artifacts_path.as_ref().map(|root| {
            root.join(&self.exchange)
                .join(&self.stake_currency)
                .join(&self.strategy)
        })
    }

    /// Run the engine and read back its exported results.
    pub fn run(&self) -> Result<BacktestRunResult> {
        self.ensure_exchange_data()?;

        let tmp = tempfile::tempdir()?;
        let exchange_config = match &self.pairlist {
            Some(pairs) => self
                .write_pairlist(tmp.path(), pairs)?
                .display()
                .to_string(),
            None => self.static_exchange_config(),
        };
        let export = tmp.path().join("backtest-results.json");
        let cmdline = self.cmdline(&exchange_config, &export);

        let ret = self.execute(cmdline)?;
        if ret.exitcode != 0 {
            info!("Command result:\n{ret}");
            return Err(Error::Process(ret.to_string()));
        }
        debug!("Command result:\n{ret}");

        let generated = find_export(tmp.path())?;
        let artifacts = self.artifacts_dir();
        if let Some(dir) = &artifacts {
            fs::create_dir_all(dir)?;
            if let Some(name) = generated.file_name() {
                fs::copy(&generated, dir.join(name))?;
            }
            fs::write(
                dir.join(format!("backtest-output-{}.txt", self.timerange)),
                &ret.stdout,
            )?;
        }

        let text = fs::read_to_string(&generated)?;
        let run = BacktestRunResult::from_json(&self.strategy, &ret.stdout, &ret.stderr, &text)?;

        if let Some(dir) = &artifacts {
            let ci_results = BTreeMap::from([(self.timerange.as_str(), &run.stats_pct)]);
            let path = dir.join(format!("ci-results-{}.json", self.timerange));
            fs::write(&path, serde_json::to_string(&ci_results)?)?;
            debug!(path = %path.display(), "Wrote CI results artifact");
        }

        run.log_info();
        Ok(run)
    }

    fn execute(&self, cmdline: Vec<String>) -> Result<ProcessResult> {
        let (program, args) = cmdline
            .split_first()
            .ok_or_else(|| Error::Process("empty command line".into()))?;
        info!(
            cmdline = %cmdline.join(" "),
            cwd = %self.repo_root.display(),
            "Running backtest"
        );
        let output = Command::new(program)
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .map_err(|e| Error::Process(format!("failed to start '{program}': {e}")))?;

        Ok(ProcessResult {
            // `None` when killed by a signal.
            exitcode: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            cmdline,
        })
    }
}

/// The timestamped results file the engine wrote next to `--export-filename`.
pub fn find_export(dir: &Path) -> Result<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| {
            let name = e.file_name().to_string_lossy();
            e.file_type().is_file()
                && name.starts_with(EXPORT_PREFIX)
                && name.ends_with(".json")
                && !name.ends_with(".meta.json")
        })
        .map(|e| e.into_path())
        .ok_or_else(|| {
            Error::DataIntegrity(format!(
                "no {EXPORT_PREFIX}*.json file written to {}",
                dir.display()
            ))
        })
}
