//! Weight-producing strategies.
//!
//! A strategy picks a universe of symbols, fetches their price history, and
//! runs a [`LookbackSearch`] for the maximum-Sharpe weights.

use log::{debug, info};
use tangent::{LookbackSearch, Symbol, WeightVector};
use tangent_broker::Brokerage;

use crate::config::{StrategyConfig, UniverseSource};
use crate::error::Result;

/// Lookback search settings shared by every strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SharpeParams {
    /// Most recent rows of history considered.
    pub lookback: usize,
    /// Shortest window the search evaluates.
    pub min_lookback: usize,
    pub allow_short: bool,
}

impl Default for SharpeParams {
    fn default() -> Self {
        Self {
            lookback: 21,
            min_lookback: 7,
            allow_short: false,
        }
    }
}

/// A source of target weights.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    fn params(&self) -> SharpeParams;

    /// Symbols this strategy chooses from.
    fn universe(&self, broker: &dyn Brokerage) -> Result<Vec<Symbol>>;

    /// Maximum-Sharpe weights over the universe; empty if the universe is
    /// empty or no window produced a portfolio.
    fn optimise(&self, broker: &dyn Brokerage) -> Result<WeightVector> {
        let universe = self.universe(broker)?;
        if universe.is_empty() {
            info!("[{}] Empty universe", self.name());
            return Ok(WeightVector::new());
        }

        let params = self.params();
        let history = broker.historical_prices(&universe)?;
        let prices = history.tail(params.lookback);
        if let (Some(first), Some(last)) = (prices.first_date(), prices.last_date()) {
            let names: Vec<&str> = prices.symbols().iter().map(Symbol::as_str).collect();
            info!(
                "[{}] Found prices {first} - {last} for {}",
                self.name(),
                names.join(", ")
            );
        }
        debug!("[{}] {} rows of history", self.name(), prices.len());

        let outcome = LookbackSearch::new(params.min_lookback)
            .allow_short(params.allow_short)
            .search(&prices);
        for score in &outcome.evaluated {
            debug!(
                "[{}] {:>3} rows from {:?}: Sharpe {:.4}",
                self.name(),
                score.rows,
                score.start,
                score.sharpe
            );
        }
        info!("[{}] Target weights: {}", self.name(), outcome.weights);
        Ok(outcome.weights)
    }
}

/// Fixed list of symbols.
#[derive(Debug, Clone)]
pub struct UniverseStrategy {
    name: String,
    symbols: Vec<Symbol>,
    params: SharpeParams,
}

impl UniverseStrategy {
    pub fn new(name: impl Into<String>, symbols: Vec<Symbol>, params: SharpeParams) -> Self {
        Self {
            name: name.into(),
            symbols,
            params,
        }
    }
}

impl Strategy for UniverseStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> SharpeParams {
        self.params
    }

    fn universe(&self, _broker: &dyn Brokerage) -> Result<Vec<Symbol>> {
        Ok(self.symbols.clone())
    }
}

/// Symbols from a named broker watchlist, read at optimisation time.
#[derive(Debug, Clone)]
pub struct WatchlistStrategy {
    name: String,
    watchlist: String,
    params: SharpeParams,
}

impl WatchlistStrategy {
    pub fn new(name: impl Into<String>, watchlist: impl Into<String>, params: SharpeParams) -> Self {
        Self {
            name: name.into(),
            watchlist: watchlist.into(),
            params,
        }
    }
}

impl Strategy for WatchlistStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn params(&self) -> SharpeParams {
        self.params
    }

    fn universe(&self, broker: &dyn Brokerage) -> Result<Vec<Symbol>> {
        let symbols = broker.watchlist(&self.watchlist)?;
        let names: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
        info!("[{}] Found {}", self.name, names.join(", "));
        Ok(symbols)
    }
}

/// Build a strategy from its config entry.
pub fn from_config(config: &StrategyConfig) -> Box<dyn Strategy> {
    let params = config.params();
    match config.source() {
        UniverseSource::Fixed(symbols) => {
            Box::new(UniverseStrategy::new(&config.name, symbols, params))
        }
        UniverseSource::Watchlist(name) => {
            Box::new(WatchlistStrategy::new(&config.name, name, params))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tangent_broker::mock::MockBroker;

    fn a() -> Symbol {
        Symbol::new("A")
    }
    fn b() -> Symbol {
        Symbol::new("B")
    }

    fn broker() -> MockBroker {
        MockBroker::builder()
            .with_closes(a(), &[100.0, 101.0, 100.5, 102.0, 103.1, 102.4, 104.0, 104.8, 104.1, 105.5])
            .with_closes(b(), &[50.0, 50.5, 51.2, 50.9, 51.5, 52.0, 51.8, 52.6, 53.0, 53.4])
            .with_watchlist("Default", &[a(), b()])
            .with_watchlist("Empty", &[])
            .build()
    }

    #[test]
    fn universe_strategy_produces_distribution() {
        let s = UniverseStrategy::new("core", vec![a(), b()], SharpeParams::default());
        let w = s.optimise(&broker()).unwrap();
        assert_eq!(w.len(), 2);
        assert!((w.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn watchlist_and_universe_agree_on_same_symbols() {
        let params = SharpeParams::default();
        let broker = broker();
        let from_list = WatchlistStrategy::new("wl", "Default", params)
            .optimise(&broker)
            .unwrap();
        let fixed = UniverseStrategy::new("u", vec![a(), b()], params)
            .optimise(&broker)
            .unwrap();
        assert_eq!(from_list, fixed);
    }

    #[test]
    fn empty_universe_gives_empty_weights() {
        let s = WatchlistStrategy::new("wl", "Empty", SharpeParams::default());
        assert!(s.optimise(&broker()).unwrap().is_empty());
    }

    #[test]
    fn broker_errors_propagate() {
        let s = WatchlistStrategy::new("wl", "Missing", SharpeParams::default());
        assert!(s.optimise(&broker()).is_err());

        let s = UniverseStrategy::new("u", vec![Symbol::new("ZZZ")], SharpeParams::default());
        assert!(s.optimise(&broker()).is_err());
    }
}
