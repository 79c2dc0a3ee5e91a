//! End-to-end rebalance runs against the mock broker.

use std::io::Write;
use std::time::Duration;

use tangent::Symbol;
use tangent_broker::mock::{MockBroker, MockBrokerBuilder};
use tangent_broker::Side;
use tangent_rebalancer::config::Config;
use tangent_rebalancer::error::Error;
use tangent_rebalancer::execution::{self, RebalanceReport, RunOptions, RunOutcome, StrategySet};
use tangent_rebalancer::orders::OrderState;

fn spy() -> Symbol {
    Symbol::new("SPY")
}
fn tlt() -> Symbol {
    Symbol::new("TLT")
}
fn hyg() -> Symbol {
    Symbol::new("HYG")
}

const SPY: [f64; 12] = [
    100.0, 101.0, 100.5, 102.0, 103.1, 102.4, 104.0, 104.8, 104.1, 105.5, 106.2, 105.9,
];
const TLT: [f64; 12] = [
    90.0, 90.4, 91.1, 90.8, 91.5, 92.0, 91.7, 92.6, 93.0, 93.4, 93.1, 94.0,
];
const HYG: [f64; 12] = [
    80.0, 79.5, 79.8, 79.0, 78.6, 78.9, 78.1, 77.7, 77.9, 77.2, 76.8, 76.5,
];

fn market() -> MockBrokerBuilder {
    MockBroker::builder()
        .with_closes(spy(), &SPY)
        .with_closes(tlt(), &TLT)
        .with_closes(hyg(), &HYG)
        .with_quote(spy(), 105.8, 106.0)
        .with_quote(tlt(), 93.9, 94.1)
        .with_quote(hyg(), 76.4, 76.6)
        .with_watchlist("Empty", &[])
        .with_account(100_000.0, 0.0)
}

fn config(body: &str) -> Config {
    let toml = format!(
        r#"
[broker]
account_id = "TEST"

[execution]
settle_pause_secs = 0
workers = 2

{body}
"#
    );
    Config::from_toml(&toml).unwrap()
}

fn core_config() -> Config {
    config(
        r#"
[[strategies]]
name = "core"
class = "secondary"
universe = ["SPY", "TLT"]
min_lookback = 5

[fallback]
enabled = false
"#,
    )
}

fn run(broker: &MockBroker, config: &Config, opts: &RunOptions) -> RunOutcome {
    execution::rebalance(
        broker,
        &StrategySet::from_config(config),
        config.capital_policy(),
        config.blend_caps(),
        opts,
    )
    .unwrap()
}

fn completed(outcome: RunOutcome) -> RebalanceReport {
    match outcome {
        RunOutcome::Completed(report) => report,
        RunOutcome::NotRun { reason } => panic!("run did not complete: {reason}"),
    }
}

// ============================================================================
// Full runs
// ============================================================================

#[test]
fn full_run_sells_then_buys_at_limit() {
    let broker = market()
        .with_position(hyg(), 7.0)
        .with_position(spy(), 10.0)
        .build();
    let config = core_config();
    let opts = RunOptions::from_config(&config);
    let report = completed(run(&broker, &config, &opts));

    assert_eq!(report.delta.get(hyg()), -7.0);
    assert!(!report.target.contains_key(&hyg()));
    assert!(report.target.values().all(|&q| q >= 0.0));

    let orders = broker.submitted_orders();
    let first_buy = orders.iter().position(|o| o.side == Side::Buy).unwrap();
    assert!(orders[first_buy..].iter().all(|o| o.side == Side::Buy));
    assert!(orders[..first_buy].iter().any(|o| o.symbol == hyg() && o.quantity == 7));

    let policy = config.capital_policy();
    for order in &orders[first_buy..] {
        let mid = if order.symbol == spy() { 105.9 } else { 94.0 };
        assert_eq!(order.price, Some(policy.buy_limit(mid)));
    }

    assert_eq!(report.executions.sells.failed(), 0);
    assert_eq!(report.executions.buys.failed(), 0);
}

#[test]
fn deployed_capital_stays_near_budget() {
    let broker = market().build();
    let config = core_config();
    let mut opts = RunOptions::from_config(&config);
    opts.dry_run = true;

    let plan = execution::plan(
        &broker,
        &StrategySet::from_config(&config),
        config.capital_policy(),
        config.blend_caps(),
        &opts,
    )
    .unwrap();

    // The full 12-row window scores best.
    assert!((plan.weights.target.get(spy()) - 0.341_05).abs() < 1e-4);
    assert!((plan.weights.target.get(tlt()) - 0.658_95).abs() < 1e-4);
    assert!((plan.weights.target.sum() - 1.0).abs() < 1e-9);
    assert!((plan.capital - 99_000.0).abs() < 1e-6);
    // Nearest rounding can overshoot by at most half a share per symbol.
    let slack = (105.9 + 94.0) / 2.0;
    assert!(plan.capital_used <= plan.capital + slack);
    assert!(plan.capital_used >= plan.capital - slack);
}

#[test]
fn capped_sell_is_retried_at_the_cap() {
    let xyz = Symbol::new("XYZ");
    let broker = market()
        .with_position(xyz, 100.0)
        .with_quantity_cap(xyz, Side::Sell, 40)
        .build();
    let config = core_config();
    let report = completed(run(&broker, &config, &RunOptions::from_config(&config)));

    let sells: Vec<_> = broker
        .submitted_orders()
        .into_iter()
        .filter(|o| o.side == Side::Sell)
        .map(|o| (o.symbol, o.quantity))
        .collect();
    assert_eq!(sells, vec![(xyz, 100), (xyz, 40)]);

    let outcomes: Vec<_> = report
        .executions
        .sells
        .attempts
        .iter()
        .map(|a| &a.outcome)
        .collect();
    assert_eq!(outcomes[0], &OrderState::Retried { max_quantity: 40 });
    assert!(matches!(outcomes[1], OrderState::Filled { .. }));
    assert_eq!(report.executions.sells.retried(), 1);
}

// ============================================================================
// Runs that stop early
// ============================================================================

#[test]
fn closed_market_is_not_run() {
    let broker = market().market_open(false).build();
    let config = core_config();
    let outcome = run(&broker, &config, &RunOptions::from_config(&config));
    assert!(matches!(outcome, RunOutcome::NotRun { ref reason } if reason == "markets closed"));
    assert!(broker.submitted_orders().is_empty());
}

#[test]
fn market_check_can_be_skipped() {
    let broker = market().market_open(false).build();
    let config = core_config();
    let opts = RunOptions {
        market_check: false,
        ..RunOptions::from_config(&config)
    };
    completed(run(&broker, &config, &opts));
    assert!(!broker.submitted_orders().is_empty());
}

#[test]
fn dry_run_submits_nothing() {
    let broker = market().with_position(hyg(), 7.0).build();
    let config = core_config();
    let opts = RunOptions {
        dry_run: true,
        ..RunOptions::from_config(&config)
    };
    let report = completed(run(&broker, &config, &opts));
    assert_eq!(report.delta.get(hyg()), -7.0);
    assert!(report.executions.sells.attempts.is_empty());
    assert!(report.executions.buys.attempts.is_empty());
    assert!(broker.submitted_orders().is_empty());
}

#[test]
fn empty_blend_falls_back() {
    let broker = market().build();
    let config = config(
        r#"
[[strategies]]
name = "picks"
class = "primary"
watchlist = "Empty"

[fallback]
universe = ["TLT", "HYG", "SPY"]
lookback = 12
min_lookback = 5
"#,
    );
    let mut opts = RunOptions::from_config(&config);
    opts.dry_run = true;
    let report = completed(run(&broker, &config, &opts));

    // HYG only loses money over every window.
    assert_eq!(report.target.get(&hyg()).copied().unwrap_or(0.0), 0.0);
    assert!(report.target[&tlt()] > report.target[&spy()]);
}

#[test]
fn losing_universe_finds_no_portfolio() {
    let broker = market().build();
    let config = config(
        r#"
[[strategies]]
name = "credit"
class = "secondary"
universe = ["HYG"]
min_lookback = 5

[fallback]
universe = ["HYG"]
min_lookback = 5
"#,
    );
    let outcome = run(&broker, &config, &RunOptions::from_config(&config));
    match outcome {
        RunOutcome::NotRun { reason } => assert_eq!(reason, "No optimal portfolio found."),
        RunOutcome::Completed(_) => panic!("expected NotRun"),
    }
    assert!(broker.submitted_orders().is_empty());
}

#[test]
fn unknown_symbol_fails_the_run() {
    let broker = market().build();
    let config = config(
        r#"
[[strategies]]
name = "core"
class = "secondary"
universe = ["SPY", "NOPE"]
"#,
    );
    let err = execution::rebalance(
        &broker,
        &StrategySet::from_config(&config),
        config.capital_policy(),
        config.blend_caps(),
        &RunOptions::from_config(&config),
    )
    .unwrap_err();
    assert!(matches!(err, Error::Broker(_)));
}

// ============================================================================
// Config files
// ============================================================================

#[test]
fn config_file_resolves_token_from_env() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[broker]
account_id = "5RY82436"
token_env = "TANGENT_IT_TOKEN"

[execution]
settle_pause_secs = 1
"#
    )
    .unwrap();

    // SAFETY: no other test reads or writes this variable.
    unsafe { std::env::set_var("TANGENT_IT_TOKEN", "secret-token") };
    let config = Config::load(file.path()).unwrap();
    let token = config.broker.token.as_ref().unwrap();
    assert_eq!(token.expose().as_str(), "secret-token");
    assert!(!format!("{config:?}").contains("secret-token"));

    let opts = RunOptions::from_config(&config);
    assert_eq!(opts.settle_pause, Duration::from_secs(1));
}

#[test]
fn missing_config_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::ConfigRead { .. }));
}
