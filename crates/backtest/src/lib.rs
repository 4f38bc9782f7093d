pub mod checker;
pub mod expected;
pub mod results;
pub mod runner;

pub use checker::{check, CheckedMetric, Regression};
pub use expected::{ExpectedResult, ExpectedResults};
pub use results::{BacktestExport, BacktestRunResult, StatsPct};
pub use runner::{Backtest, ProcessResult};
