//! Lookback search benchmarks: single solve and full window sweep.

use chrono::{Days, NaiveDate};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use tangent::stats::estimate;
use tangent::{tangency_portfolio, LookbackSearch, PriceMatrix, Symbol};

/// Synthetic daily closes with `n_days` rows and `n_stocks` columns.
///
/// Prices start at $100 and drift with a deterministic xorshift32 walk.
fn generate_prices(n_days: usize, n_stocks: usize) -> PriceMatrix {
    let symbols: Vec<Symbol> = (0..n_stocks)
        .map(|i| Symbol::new(&format!("S{i:03}")))
        .collect();
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

    let mut prices = vec![100.0f64; n_stocks];
    let mut rng_state: u32 = 42;
    let mut rows = Vec::with_capacity(n_days);
    let mut dates = Vec::with_capacity(n_days);

    for day in 0..n_days {
        for (i, price) in prices.iter_mut().enumerate() {
            rng_state ^= rng_state << 13;
            rng_state ^= rng_state >> 17;
            rng_state ^= rng_state << 5;

            // -2%..+2% with a small per-asset drift
            let ret = f64::from(rng_state % 401) - 200.0 + i as f64;
            *price = (*price * (1.0 + ret / 10_000.0)).max(1.0);
        }
        rows.push(prices.clone());
        dates.push(start.checked_add_days(Days::new(day as u64)).unwrap());
    }

    PriceMatrix::new(symbols, dates, rows).unwrap()
}

fn bench_tangency(c: &mut Criterion) {
    let mut group = c.benchmark_group("tangency");
    for n_stocks in [5, 20, 50] {
        let est = estimate(&generate_prices(250, n_stocks)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n_stocks), &est, |b, est| {
            b.iter(|| {
                tangency_portfolio(
                    black_box(&est.covariance),
                    black_box(&est.expected_returns),
                    false,
                )
            })
        });
    }
    group.finish();
}

fn bench_lookback(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookback");
    group.sample_size(20);
    for n_days in [30, 120, 250] {
        let prices = generate_prices(n_days, 10);
        group.bench_with_input(BenchmarkId::from_parameter(n_days), &prices, |b, prices| {
            b.iter(|| LookbackSearch::new(7).search(black_box(prices)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_tangency, bench_lookback);
criterion_main!(benches);
