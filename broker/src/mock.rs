//! Mock broker for testing: implements [`Brokerage`] with configurable behavior.
//!
//! Use this in integration tests to simulate broker responses without network calls.
//!
//! ```
//! use tangent::Symbol;
//! use tangent_broker::Brokerage;
//! use tangent_broker::mock::MockBroker;
//!
//! let broker = MockBroker::builder()
//!     .with_closes(Symbol::new("SPY"), &[400.0, 402.0, 401.5])
//!     .with_quote(Symbol::new("SPY"), 401.0, 402.0)
//!     .with_position(Symbol::new("SPY"), 10.0)
//!     .with_account(50_000.0, 0.0)
//!     .build();
//!
//! assert_eq!(broker.equity().unwrap(), 50_000.0);
//! assert_eq!(broker.historical_prices(&[Symbol::new("SPY")]).unwrap().len(), 3);
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{Days, NaiveDate};
use rustc_hash::FxHashMap;
use tangent::{PriceMatrix, Symbol};

use crate::Brokerage;
use crate::error::BrokerError;
use crate::types::{OrderResult, Side};

/// How the mock broker handles submitted orders.
#[derive(Clone, Debug, PartialEq)]
pub enum FillMode {
    /// Orders are accepted unless they exceed a configured quantity cap.
    Accept,
    /// All orders are rejected without a quantity hint.
    Reject,
    /// Every submission fails at the transport level.
    Disconnected,
}

/// A recorded order submission for assertion in tests.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedOrder {
    pub symbol: Symbol,
    pub side: Side,
    pub quantity: u64,
    /// Limit price for buys, stop price for sells.
    pub price: Option<f64>,
}

/// Builder for [`MockBroker`].
pub struct MockBrokerBuilder {
    fill_mode: FillMode,
    history: FxHashMap<Symbol, Vec<(NaiveDate, f64)>>,
    quotes: Vec<(Symbol, f64)>,
    positions: Vec<(Symbol, f64)>,
    equity: f64,
    margin: f64,
    watchlists: FxHashMap<String, Vec<Symbol>>,
    market_open: bool,
    caps: FxHashMap<(Symbol, Side), u64>,
    scripted: VecDeque<OrderResult>,
    disconnect_after: Option<usize>,
}

impl MockBrokerBuilder {
    pub fn fill_mode(mut self, mode: FillMode) -> Self {
        self.fill_mode = mode;
        self
    }

    /// Daily closes for `symbol`, one per calendar day from 2024-01-02.
    pub fn with_closes(self, symbol: Symbol, closes: &[f64]) -> Self {
        let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default();
        let series = closes
            .iter()
            .enumerate()
            .filter_map(|(i, p)| Some((start.checked_add_days(Days::new(i as u64))?, *p)))
            .collect();
        self.with_history(symbol, series)
    }

    /// Dated closes for `symbol`.
    pub fn with_history(mut self, symbol: Symbol, series: Vec<(NaiveDate, f64)>) -> Self {
        self.history.insert(symbol, series);
        self
    }

    /// Quote from bid and ask; the broker reports the midpoint.
    pub fn with_quote(mut self, symbol: Symbol, bid: f64, ask: f64) -> Self {
        self.quotes.push((symbol, (bid + ask) / 2.0));
        self
    }

    pub fn with_position(mut self, symbol: Symbol, quantity: f64) -> Self {
        self.positions.push((symbol, quantity));
        self
    }

    pub fn with_account(mut self, equity: f64, margin: f64) -> Self {
        self.equity = equity;
        self.margin = margin;
        self
    }

    pub fn with_watchlist(mut self, name: &str, symbols: &[Symbol]) -> Self {
        self.watchlists.insert(name.to_string(), symbols.to_vec());
        self
    }

    pub fn market_open(mut self, open: bool) -> Self {
        self.market_open = open;
        self
    }

    /// Reject `side` orders on `symbol` above `max` shares, naming `max`.
    pub fn with_quantity_cap(mut self, symbol: Symbol, side: Side, max: u64) -> Self {
        self.caps.insert((symbol, side), max);
        self
    }

    /// Queue a response returned verbatim by the next submission, ahead of
    /// the fill mode.
    pub fn with_response(mut self, result: OrderResult) -> Self {
        self.scripted.push_back(result);
        self
    }

    /// Drop the connection after `submissions` orders have gone through;
    /// every later submission fails like [`FillMode::Disconnected`].
    pub fn disconnect_after(mut self, submissions: usize) -> Self {
        self.disconnect_after = Some(submissions);
        self
    }

    pub fn build(self) -> MockBroker {
        MockBroker {
            fill_mode: self.fill_mode,
            history: self.history,
            quotes: self.quotes,
            positions: self.positions,
            equity: self.equity,
            margin: self.margin,
            watchlists: self.watchlists,
            market_open: self.market_open,
            caps: self.caps,
            scripted: Mutex::new(self.scripted),
            disconnect_after: self.disconnect_after,
            submitted_orders: Mutex::new(Vec::new()),
        }
    }
}

/// A mock broker that records submitted orders and returns configurable responses.
pub struct MockBroker {
    fill_mode: FillMode,
    history: FxHashMap<Symbol, Vec<(NaiveDate, f64)>>,
    quotes: Vec<(Symbol, f64)>,
    positions: Vec<(Symbol, f64)>,
    equity: f64,
    margin: f64,
    watchlists: FxHashMap<String, Vec<Symbol>>,
    market_open: bool,
    caps: FxHashMap<(Symbol, Side), u64>,
    scripted: Mutex<VecDeque<OrderResult>>,
    disconnect_after: Option<usize>,
    submitted_orders: Mutex<Vec<RecordedOrder>>,
}

impl MockBroker {
    pub fn builder() -> MockBrokerBuilder {
        MockBrokerBuilder {
            fill_mode: FillMode::Accept,
            history: FxHashMap::default(),
            quotes: Vec::new(),
            positions: Vec::new(),
            equity: 100_000.0,
            margin: 0.0,
            watchlists: FxHashMap::default(),
            market_open: true,
            caps: FxHashMap::default(),
            scripted: VecDeque::new(),
            disconnect_after: None,
        }
    }

    /// Get all orders that were submitted (for assertion in tests).
    pub fn submitted_orders(&self) -> Vec<RecordedOrder> {
        self.submitted_orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn submit(
        &self,
        symbol: Symbol,
        side: Side,
        quantity: u64,
        price: Option<f64>,
    ) -> Result<OrderResult, BrokerError> {
        if self.fill_mode == FillMode::Disconnected {
            return Err(BrokerError::Connection("mock: broker unreachable".into()));
        }

        let mut orders = self
            .submitted_orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.disconnect_after.is_some_and(|n| orders.len() >= n) {
            return Err(BrokerError::Connection("mock: connection dropped".into()));
        }
        orders.push(RecordedOrder {
            symbol,
            side,
            quantity,
            price,
        });
        let order_id = format!("mock-{}", orders.len());
        drop(orders);

        if let Some(result) = self
            .scripted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
        {
            return Ok(result);
        }

        if self.fill_mode == FillMode::Reject {
            return Ok(OrderResult::rejected("mock: order rejected"));
        }

        match self.caps.get(&(symbol, side)) {
            Some(&max) if quantity > max => {
                let verb = match side {
                    Side::Buy => "purchase",
                    Side::Sell => "sell",
                };
                Ok(OrderResult::capped(
                    format!("You can only {verb} {max} shares of {symbol}."),
                    max,
                ))
            }
            _ => Ok(OrderResult::accepted(order_id, "filled")),
        }
    }
}

impl Brokerage for MockBroker {
    fn historical_prices(&self, symbols: &[Symbol]) -> Result<PriceMatrix, BrokerError> {
        let series = symbols
            .iter()
            .map(|sym| {
                self.history
                    .get(sym)
                    .map(|s| (*sym, s.clone()))
                    .ok_or_else(|| BrokerError::InvalidSymbol(sym.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PriceMatrix::from_series(series)?)
    }

    fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<(Symbol, f64)>, BrokerError> {
        Ok(self
            .quotes
            .iter()
            .filter(|(s, _)| symbols.contains(s))
            .copied()
            .collect())
    }

    fn open_positions(&self) -> Result<Vec<(Symbol, f64)>, BrokerError> {
        Ok(self
            .positions
            .iter()
            .filter(|(_, q)| *q > 0.0)
            .copied()
            .collect())
    }

    fn equity(&self) -> Result<f64, BrokerError> {
        Ok(self.equity)
    }

    fn margin(&self) -> Result<f64, BrokerError> {
        Ok(self.margin)
    }

    fn buy(
        &self,
        symbol: Symbol,
        quantity: u64,
        limit_price: f64,
    ) -> Result<OrderResult, BrokerError> {
        self.submit(symbol, Side::Buy, quantity, Some(limit_price))
    }

    fn sell(
        &self,
        symbol: Symbol,
        quantity: u64,
        stop_price: Option<f64>,
    ) -> Result<OrderResult, BrokerError> {
        self.submit(symbol, Side::Sell, quantity, stop_price)
    }

    fn watchlist(&self, name: &str) -> Result<Vec<Symbol>, BrokerError> {
        self.watchlists
            .get(name)
            .cloned()
            .ok_or_else(|| BrokerError::Other(format!("no watchlist named '{name}'")))
    }

    fn market_open(&self) -> Result<bool, BrokerError> {
        Ok(self.market_open)
    }
}
