//! Brokerage abstraction for tangent.
//!
//! The rebalancer talks to its brokerage only through [`Brokerage`].
//! Implementations:
//!
//! - [`mock::MockBroker`]: scripted in-memory broker for tests and dry runs
//! - **Robinhood** (feature `robinhood`): blocking REST client

pub mod error;
pub mod mock;
pub mod types;

#[cfg(feature = "robinhood")]
pub mod robinhood;

pub use error::BrokerError;
pub use types::*;

use tangent::{PriceMatrix, Symbol};

/// A brokerage account that can report prices and holdings and take orders.
///
/// Implementations are shared across strategy worker threads, so every
/// method takes `&self`; internal caches need their own synchronization.
pub trait Brokerage: Send + Sync {
    /// Daily closing prices for `symbols`, aligned on common dates.
    fn historical_prices(&self, symbols: &[Symbol]) -> Result<PriceMatrix, BrokerError>;

    /// Mid prices (bid/ask midpoint). Symbols without a quote are omitted.
    fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<(Symbol, f64)>, BrokerError>;

    /// Positions with a positive share count.
    fn open_positions(&self) -> Result<Vec<(Symbol, f64)>, BrokerError>;

    /// Total account equity (cash plus held assets).
    fn equity(&self) -> Result<f64, BrokerError>;

    /// Margin limit available to the account.
    fn margin(&self) -> Result<f64, BrokerError>;

    /// Submit a limit buy.
    fn buy(&self, symbol: Symbol, quantity: u64, limit_price: f64)
    -> Result<OrderResult, BrokerError>;

    /// Submit a sell; market order unless `stop_price` is given.
    fn sell(
        &self,
        symbol: Symbol,
        quantity: u64,
        stop_price: Option<f64>,
    ) -> Result<OrderResult, BrokerError>;

    /// Symbols on the named watchlist.
    fn watchlist(&self, name: &str) -> Result<Vec<Symbol>, BrokerError>;

    /// Whether the primary exchange is open today.
    fn market_open(&self) -> Result<bool, BrokerError>;
}
