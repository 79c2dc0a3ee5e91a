//! Property-based tests for solver and lookback invariants.
//!
//! Price paths are generated from bounded daily returns so every matrix is
//! valid; the solver may still legitimately fail to converge (for example
//! when every asset falls), so properties are checked on successful solves.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use tangent::stats::estimate;
use tangent::{tangency_portfolio, LookbackSearch, PriceMatrix, Symbol};

const NAMES: [&str; 5] = ["AAA", "BBB", "CCC", "DDD", "EEE"];

/// Build a price matrix from per-row returns (in basis points).
fn build_prices(returns_bps: Vec<Vec<i32>>) -> PriceMatrix {
    let width = returns_bps[0].len();
    let symbols: Vec<Symbol> = NAMES[..width].iter().map(|s| Symbol::new(s)).collect();
    let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap();

    let mut price = vec![100.0; width];
    let mut rows = vec![price.clone()];
    for ret in &returns_bps {
        for (p, r) in price.iter_mut().zip(ret) {
            *p *= 1.0 + f64::from(*r) / 10_000.0;
        }
        rows.push(price.clone());
    }
    let dates = (0..rows.len())
        .map(|i| start.checked_add_days(Days::new(i as u64)).unwrap())
        .collect();
    PriceMatrix::new(symbols, dates, rows).unwrap()
}

/// Between 2 and 5 assets over 6 to 30 return rows.
fn prices_strategy() -> impl Strategy<Value = PriceMatrix> {
    (2usize..=5, 6usize..=30).prop_flat_map(|(width, len)| {
        prop::collection::vec(prop::collection::vec(-300i32..=320, width), len)
            .prop_map(build_prices)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Long-only weights are non-negative and sum to 1.
    #[test]
    fn long_only_weights_are_a_distribution(prices in prices_strategy()) {
        let est = estimate(&prices).unwrap();
        if let Ok(w) = tangency_portfolio(&est.covariance, &est.expected_returns, false) {
            prop_assert!((w.sum() - 1.0).abs() < 1e-9, "sum = {}", w.sum());
            for (sym, wi) in w.iter() {
                prop_assert!(wi >= 0.0, "{} has weight {}", sym, wi);
            }
            prop_assert_eq!(w.len(), prices.width());
        }
    }

    /// Shorting weights still sum to 1.
    #[test]
    fn shorting_weights_sum_to_one(prices in prices_strategy()) {
        let est = estimate(&prices).unwrap();
        if let Ok(w) = tangency_portfolio(&est.covariance, &est.expected_returns, true) {
            let scale = w.iter().map(|(_, wi)| wi.abs()).fold(1.0, f64::max);
            prop_assert!((w.sum() - 1.0).abs() < 1e-9 * scale, "sum = {}", w.sum());
        }
    }

    /// The chosen window scores at least as well as every evaluated window.
    #[test]
    fn lookback_keeps_the_best_window(prices in prices_strategy(), min in 2usize..6) {
        let outcome = LookbackSearch::new(min).search(&prices);

        prop_assert!(outcome.sharpe >= 0.0);
        for score in &outcome.evaluated {
            prop_assert!(outcome.sharpe >= score.sharpe);
        }
        prop_assert_eq!(outcome.evaluated.len(), prices.len() + 1 - min.max(2));
        if !outcome.weights.is_empty() {
            prop_assert!((outcome.weights.sum() - 1.0).abs() < 1e-9);
        }
    }
}
