use proptest::prelude::*;

use backtest::checker::{check_max_drawdown, check_winrate, suggested_max_drawdown, suggested_winrate};
use backtest::ExpectedResult;

fn expected(winrate: f64, max_drawdown: f64) -> ExpectedResult {
    ExpectedResult {
        exchange: "kucoin".into(),
        strategy: "Saturn5".into(),
        stake_currency: "busd".into(),
        timerange: "20210601-20210701".into(),
        winrate,
        max_drawdown,
    }
}

proptest! {
    /// Win rate fails exactly when it drops below the expectation.
    #[test]
    fn winrate_fails_only_below_expected(expected_wr in 0.0f64..100.0, actual in 0.0f64..100.0) {
        let row = expected(expected_wr, 50.0);
        prop_assert_eq!(check_winrate(actual, &row).is_some(), actual < expected_wr);
    }

    /// Drawdown fails exactly when it rises above the expectation.
    #[test]
    fn drawdown_fails_only_above_expected(expected_dd in 0.0f64..300.0, actual in 0.0f64..300.0) {
        let row = expected(50.0, expected_dd);
        prop_assert_eq!(check_max_drawdown(actual, &row).is_some(), actual > expected_dd);
    }

    /// Substituting the suggested win rate makes the same run pass.
    #[test]
    fn suggested_winrate_accepts_the_run(actual in 0.0f64..100.0) {
        let suggested = suggested_winrate(actual);
        prop_assert!(check_winrate(actual, &expected(suggested as f64, 50.0)).is_none());
        prop_assert!(actual - (suggested as f64) < 1.0);
    }

    /// Substituting the suggested drawdown makes the same run pass.
    #[test]
    fn suggested_drawdown_accepts_the_run(actual in 0.0f64..300.0) {
        let suggested = suggested_max_drawdown(actual);
        prop_assert!(check_max_drawdown(actual, &expected(50.0, suggested as f64)).is_none());
        prop_assert!((suggested as f64) - actual <= 1.0);
    }

    /// The suggestion depends only on the observed value.
    #[test]
    fn suggestion_ignores_expected_value(actual in 0.0f64..100.0, a in 0.0f64..100.0, b in 0.0f64..100.0) {
        let first = check_winrate(actual, &expected(a, 0.0)).map(|r| r.suggested);
        let second = check_winrate(actual, &expected(b, 0.0)).map(|r| r.suggested);
        if let (Some(x), Some(y)) = (first, second) {
            prop_assert_eq!(x, y);
            prop_assert_eq!(x, suggested_winrate(actual));
        }
    }
}
