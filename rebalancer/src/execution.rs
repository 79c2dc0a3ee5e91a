//! Run orchestrator: strategies → blend → sizing → delta → orders.
//!
//! This is the main workflow that ties together all components.

use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use tangent::{Symbol, WeightVector};
use tangent_broker::Brokerage;

use crate::blend::{self, Blend, BlendCaps};
use crate::config::{Config, StrategyClass};
use crate::diff::{self, PortfolioDelta};
use crate::error::{Error, Result};
use crate::orders::{ExecutionReport, OrderManager, SubmitError};
use crate::sizing::{self, CapitalPolicy, Holdings, Quotes, Rounding};
use crate::strategy::{self, Strategy, UniverseStrategy};

/// Strategies grouped by role.
#[derive(Default)]
pub struct StrategySet {
    pub primary: Vec<Box<dyn Strategy>>,
    pub secondary: Vec<Box<dyn Strategy>>,
    /// Used only when the blended target is empty.
    pub fallback: Option<Box<dyn Strategy>>,
}

impl StrategySet {
    pub fn from_config(config: &Config) -> Self {
        let mut set = StrategySet::default();
        for cfg in &config.strategies {
            let strategy = strategy::from_config(cfg);
            match cfg.class {
                StrategyClass::Primary => set.primary.push(strategy),
                StrategyClass::Secondary => set.secondary.push(strategy),
            }
        }
        if config.fallback.enabled {
            set.fallback = Some(Box::new(UniverseStrategy::new(
                "fallback",
                config.fallback.universe.clone(),
                config.fallback.params(),
            )));
        }
        set
    }
}

/// Options for a rebalance run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Compute everything but submit no orders.
    pub dry_run: bool,
    pub market_check: bool,
    pub settle_pause: Duration,
    pub workers: usize,
    pub rounding: Rounding,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            market_check: true,
            settle_pause: Duration::from_secs(5),
            workers: 4,
            rounding: Rounding::Nearest,
        }
    }
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dry_run: false,
            market_check: config.execution.market_check,
            settle_pause: Duration::from_secs(config.execution.settle_pause_secs),
            workers: config.execution.workers,
            rounding: config.execution.rounding,
        }
    }
}

/// Everything computed before any order is sent.
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    pub weights: Blend,
    pub capital: f64,
    pub quotes: Quotes,
    pub target: Holdings,
    pub current: Holdings,
    pub delta: PortfolioDelta,
    pub capital_used: f64,
}

/// Order activity of a run, by phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Executions {
    pub sells: ExecutionReport,
    pub buys: ExecutionReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct RebalanceReport {
    pub generated_at: DateTime<Utc>,
    pub target: Holdings,
    pub current: Holdings,
    pub delta: PortfolioDelta,
    pub executions: Executions,
}

/// How a run ended.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    NotRun { reason: String },
    Completed(RebalanceReport),
}

// ---------------------------------------------------------------------------
// Weights
// ---------------------------------------------------------------------------

/// Run primary and secondary strategies on a bounded pool and blend them.
///
/// Both groups must finish before blending; the first error wins.
pub fn run_strategies(
    broker: &dyn Brokerage,
    strategies: &StrategySet,
    caps: BlendCaps,
    workers: usize,
) -> Result<Blend> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(|i| format!("strategy-{i}"))
        .build()
        .map_err(|e| Error::Pool(e.to_string()))?;

    let (primary, secondary) = pool.install(|| {
        rayon::join(
            || optimise_group(broker, &strategies.primary),
            || optimise_group(broker, &strategies.secondary),
        )
    });

    Ok(blend::blend(&primary?, &secondary?, caps))
}

fn optimise_group(
    broker: &dyn Brokerage,
    strategies: &[Box<dyn Strategy>],
) -> Result<Vec<WeightVector>> {
    strategies.par_iter().map(|s| s.optimise(broker)).collect()
}

/// Blended target weights, falling back to the fallback strategy when the
/// blend is empty.
///
/// Fails with [`Error::NoPortfolioFound`] if nothing produced weights.
pub fn target_weights(
    broker: &dyn Brokerage,
    strategies: &StrategySet,
    caps: BlendCaps,
    workers: usize,
) -> Result<Blend> {
    let mut blend = run_strategies(broker, strategies, caps, workers)?;

    if blend.target.is_empty() {
        if let Some(fallback) = &strategies.fallback {
            warn!("Blend is empty; running {}", fallback.name());
            let weights = fallback.optimise(broker)?;
            blend = Blend {
                target: weights,
                ..Blend::default()
            };
        }
    }

    if blend.target.is_empty() {
        return Err(Error::NoPortfolioFound);
    }
    info!("Target weights: {}", blend.target);
    Ok(blend)
}

// ---------------------------------------------------------------------------
// Plan and execute
// ---------------------------------------------------------------------------

/// Compute target holdings and the delta from current holdings.
pub fn plan(
    broker: &dyn Brokerage,
    strategies: &StrategySet,
    policy: CapitalPolicy,
    caps: BlendCaps,
    opts: &RunOptions,
) -> Result<Plan> {
    let weights = target_weights(broker, strategies, caps, opts.workers)?;

    info!("STEP: CAPITAL");
    let equity = broker.equity()?;
    let margin = broker.margin()?;
    let capital = policy.capital(equity, margin);
    info!("Capital: {capital:.2} (equity: {equity:.2}, margin: {margin:.2})");

    info!("STEP: QUOTES");
    let symbols: Vec<Symbol> = weights.target.symbols();
    let quotes: Quotes = broker.quotes(&symbols)?.into_iter().collect();
    debug!("Quotes: {quotes:?}");

    info!("STEP: TARGET HOLDINGS");
    let target = sizing::size_positions(&weights.target, &quotes, capital, opts.rounding);
    info!("Target holdings: {}", sizing::describe(&target));

    let capital_used = sizing::capital_used(&target, &quotes);
    let utilisation = if capital > 0.0 { capital_used / capital } else { 0.0 };
    info!("Total portfolio value: {capital_used:.2} ({:.1}%)", utilisation * 100.0);

    info!("STEP: CURRENT HOLDINGS");
    let mut current = Holdings::new();
    for (symbol, quantity) in broker.open_positions()? {
        *current.entry(symbol).or_insert(0.0) += quantity;
    }
    info!("Current holdings: {}", sizing::describe(&current));

    info!("STEP: DETERMINE MOVEMENTS");
    let delta = diff::compute_delta(&target, &current);
    info!("Delta: {delta}");

    Ok(Plan {
        weights,
        capital,
        quotes,
        target,
        current,
        delta,
        capital_used,
    })
}

/// Submit the plan's sells, pause for settlement, then submit its buys.
pub fn execute_plan(
    broker: &dyn Brokerage,
    plan: &Plan,
    policy: CapitalPolicy,
    opts: &RunOptions,
) -> Result<Executions> {
    let mut manager = OrderManager::new(broker);

    info!("STEP: SELL");
    for (symbol, quantity) in plan.delta.sells() {
        manager.sell(symbol, quantity, None);
    }
    let had_sells = !manager.is_empty();
    let sells = match manager.execute() {
        Ok(report) => report,
        Err(e) => {
            return Err(interrupted(&manager, e, |report| Executions {
                sells: report,
                buys: ExecutionReport::default(),
            }))
        }
    };

    if had_sells && !opts.settle_pause.is_zero() {
        info!("Waiting {:?} for sells to settle", opts.settle_pause);
        thread::sleep(opts.settle_pause);
    }

    info!("STEP: BUY");
    for (symbol, quantity) in plan.delta.buys() {
        match plan.quotes.get(&symbol) {
            Some(&mid) => manager.buy(symbol, quantity, policy.buy_limit(mid)),
            None => warn!("No quote for {symbol}; not buying"),
        }
    }
    let buys = match manager.execute() {
        Ok(report) => report,
        Err(e) => {
            return Err(interrupted(&manager, e, |report| Executions {
                sells,
                buys: report,
            }))
        }
    };

    info!(
        "Orders: {} sells filled, {} buys filled, {} retried, {} failed",
        sells.filled(),
        buys.filled(),
        sells.retried() + buys.retried(),
        sells.failed() + buys.failed()
    );
    Ok(Executions { sells, buys })
}

fn interrupted(
    manager: &OrderManager<'_>,
    e: SubmitError,
    executions: impl FnOnce(ExecutionReport) -> Executions,
) -> Error {
    let unsent: Vec<_> = manager.pending().iter().cloned().collect();
    error!(
        "Execution interrupted: {} filled before the failure, {} never sent",
        e.report.filled(),
        unsent.len()
    );
    Error::Interrupted {
        executions: Box::new(executions(e.report)),
        in_flight: Box::new(e.in_flight),
        unsent,
        source: e.source,
    }
}

/// Full rebalance: market check, plan, and (unless dry-run) execution.
///
/// Closed markets and an empty target are reported as
/// [`RunOutcome::NotRun`]; every other failure is an error.
pub fn rebalance(
    broker: &dyn Brokerage,
    strategies: &StrategySet,
    policy: CapitalPolicy,
    caps: BlendCaps,
    opts: &RunOptions,
) -> Result<RunOutcome> {
    rebalance_with(broker, strategies, policy, caps, opts, |_| Ok(true))
}

/// [`rebalance`] with an approval hook called between planning and
/// execution. A declined plan ends the run with [`Error::Aborted`].
/// The hook is not called on a dry run.
pub fn rebalance_with<F>(
    broker: &dyn Brokerage,
    strategies: &StrategySet,
    policy: CapitalPolicy,
    caps: BlendCaps,
    opts: &RunOptions,
    approve: F,
) -> Result<RunOutcome>
where
    F: FnOnce(&Plan) -> Result<bool>,
{
    if opts.market_check {
        info!("PRE: MARKETS OPEN?");
        if !broker.market_open()? {
            warn!("Markets are closed! Cancelling");
            return Ok(RunOutcome::NotRun {
                reason: "markets closed".into(),
            });
        }
    }

    let plan = match plan(broker, strategies, policy, caps, opts) {
        Ok(plan) => plan,
        Err(Error::NoPortfolioFound) => {
            return Ok(RunOutcome::NotRun {
                reason: Error::NoPortfolioFound.to_string(),
            });
        }
        Err(e) => return Err(e),
    };

    let executions = if opts.dry_run {
        info!("[DRY RUN] No orders submitted.");
        Executions::default()
    } else if plan.delta.sells().next().is_none() && plan.delta.buys().next().is_none() {
        info!("Already at target. Nothing to do.");
        Executions::default()
    } else {
        if !approve(&plan)? {
            return Err(Error::Aborted("Aborted.".into()));
        }
        execute_plan(broker, &plan, policy, opts)?
    };

    Ok(RunOutcome::Completed(RebalanceReport {
        generated_at: Utc::now(),
        target: plan.target,
        current: plan.current,
        delta: plan.delta,
        executions,
    }))
}

// ---------------------------------------------------------------------------
// CLI views
// ---------------------------------------------------------------------------

/// Print the plan as a table.
pub fn display_plan(plan: &Plan, policy: CapitalPolicy) {
    println!(
        "\nCapital ${:.2}, target deploys ${:.2}",
        plan.capital, plan.capital_used
    );
    println!("\nREBALANCE PLAN:");
    println!(
        "  {:8} {:>8} {:>8} {:>8} {:>8} {:>10}",
        "Symbol", "Weight", "Current", "Target", "Delta", "Price"
    );
    for (symbol, delta) in plan.delta.entries() {
        let price = plan.quotes.get(symbol).copied();
        let shown = match price {
            Some(mid) if *delta > 0.0 => format!("{:.2}", policy.buy_limit(mid)),
            Some(_) if *delta < 0.0 => "market".to_string(),
            Some(mid) => format!("{mid:.2}"),
            None => "-".to_string(),
        };
        println!(
            "  {:8} {:>7.1}% {:>8.0} {:>8.0} {:>+8.0} {:>10}",
            symbol.as_str(),
            plan.weights.target.get(*symbol) * 100.0,
            plan.current.get(symbol).copied().unwrap_or(0.0),
            plan.target.get(symbol).copied().unwrap_or(0.0),
            delta,
            shown,
        );
    }
}

/// Show current positions and equity.
pub fn show_positions(broker: &dyn Brokerage) -> Result<()> {
    let equity = broker.equity()?;
    let positions = broker.open_positions()?;

    println!("Equity: ${equity:.2}\n");
    if positions.is_empty() {
        println!("No positions.");
        return Ok(());
    }
    println!("CURRENT PORTFOLIO:");
    for (symbol, quantity) in positions {
        println!("  {:8} {:>10}", symbol.as_str(), quantity);
    }
    Ok(())
}

/// Check connectivity and report account figures.
pub fn check_status(broker: &dyn Brokerage) -> Result<()> {
    let equity = broker.equity()?;
    let margin = broker.margin()?;
    let open = broker.market_open()?;
    println!("Equity: ${equity:.2}");
    println!("Margin: ${margin:.2}");
    println!("Markets: {}", if open { "open" } else { "closed" });
    Ok(())
}
