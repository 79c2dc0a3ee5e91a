//! Robinhood broker implementation.

pub mod client;
pub mod types;

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use rustc_hash::FxHashMap;
use tangent::{PriceMatrix, Symbol};
use zeroize::Zeroizing;

use crate::Brokerage;
use crate::error::BrokerError;
use crate::types::{InstrumentRef, OrderResult, Side};
use client::RobinhoodClient;
use types::{
    Account, Historicals, Instrument, MarketHours, OrderResponse, Page, Portfolio, PositionEntry,
    QuoteEntry, WatchlistEntry,
};

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://api.robinhood.com";

/// Exchange whose hours decide whether markets are open.
const MARKET_MIC: &str = "XNYS";

/// Connection settings for [`RobinhoodBroker`].
#[derive(Clone)]
pub struct RobinhoodConfig {
    pub base_url: String,
    pub account_id: String,
    pub token: Zeroizing<String>,
    pub timeout: Duration,
}

impl std::fmt::Debug for RobinhoodConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RobinhoodConfig")
            .field("base_url", &self.base_url)
            .field("account_id", &self.account_id)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Robinhood brokerage implementing [`Brokerage`] over the REST API.
///
/// Instrument lookups are cached by id and by ticker for the lifetime of
/// the broker; call [`RobinhoodBroker::invalidate_instruments`] to drop them.
pub struct RobinhoodBroker {
    client: RobinhoodClient,
    account_id: String,
    instruments: Mutex<FxHashMap<String, Instrument>>,
}

impl RobinhoodBroker {
    pub fn new(config: RobinhoodConfig) -> Result<Self, BrokerError> {
        if config.token.is_empty() {
            return Err(BrokerError::Auth("empty API token".into()));
        }
        if config.account_id.is_empty() {
            return Err(BrokerError::Other("account id is required".into()));
        }
        let client = RobinhoodClient::new(&config.base_url, config.token, config.timeout)?;
        Ok(Self {
            client,
            account_id: config.account_id,
            instruments: Mutex::new(FxHashMap::default()),
        })
    }

    /// Forget every cached instrument.
    pub fn invalidate_instruments(&self) {
        self.cache().clear();
    }

    fn cache(&self) -> std::sync::MutexGuard<'_, FxHashMap<String, Instrument>> {
        self.instruments
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn account_url(&self) -> String {
        self.client.url(&format!("/accounts/{}/", self.account_id))
    }

    /// Look up an instrument by id, URL, or ticker.
    pub fn instrument(&self, reference: &InstrumentRef) -> Result<Instrument, BrokerError> {
        let key = reference.to_string();
        if let Some(hit) = self.cache().get(&key) {
            return Ok(hit.clone());
        }

        info!("Finding instrument {key}");
        let instrument: Instrument = match reference {
            InstrumentRef::Identified(id) => self.client.get(&format!("/instruments/{id}/"), &[])?,
            InstrumentRef::Symbol(sym) => {
                let page: Page<Instrument> =
                    self.client.get("/instruments/", &[("symbol", sym.as_str())])?;
                page.results
                    .into_iter()
                    .next()
                    .ok_or_else(|| BrokerError::InvalidSymbol(sym.to_string()))?
            }
        };

        let mut cache = self.cache();
        cache.insert(instrument.id.clone(), instrument.clone());
        cache.insert(instrument.symbol.clone(), instrument.clone());
        Ok(instrument)
    }

    fn symbol_for(&self, instrument_url: &str) -> Result<Option<Symbol>, BrokerError> {
        let Some(reference) = InstrumentRef::parse(instrument_url) else {
            warn!("Unrecognized instrument reference {instrument_url}");
            return Ok(None);
        };
        let instrument = self.instrument(&reference)?;
        let symbol = Symbol::try_new(&instrument.symbol);
        if symbol.is_none() {
            warn!("Skipping instrument with unsupported ticker {}", instrument.symbol);
        }
        Ok(symbol)
    }

    fn submit(&self, symbol: Symbol, side: Side, form: Vec<(&str, String)>) -> Result<OrderResult, BrokerError> {
        let submission = self.client.post_form("/orders/", &form)?;
        if submission.status.is_success() {
            let order: OrderResponse = serde_json::from_str(&submission.body)
                .map_err(|e| BrokerError::Parse(format!("order response: {e}")))?;
            debug!("{side} {symbol} accepted as {} ({})", order.id, order.state);
            return Ok(OrderResult::accepted(order.id, order.state));
        }

        Ok(OrderResult::Rejected {
            max_quantity: types::parse_quantity_cap(&submission.body, side),
            reason: format!("{}: {}", submission.status, submission.body),
        })
    }

    fn order_form(&self, symbol: Symbol, side: Side, quantity: u64) -> Result<Vec<(&'static str, String)>, BrokerError> {
        let instrument = self.instrument(&InstrumentRef::Symbol(symbol))?;
        Ok(vec![
            ("account", self.account_url()),
            ("instrument", instrument.url),
            ("symbol", symbol.to_string()),
            ("time_in_force", "gfd".to_string()),
            ("quantity", quantity.to_string()),
            ("side", side.to_string()),
        ])
    }
}

impl Brokerage for RobinhoodBroker {
    fn historical_prices(&self, symbols: &[Symbol]) -> Result<PriceMatrix, BrokerError> {
        if symbols.is_empty() {
            return Ok(PriceMatrix::empty(Vec::new()));
        }
        let list = symbols.iter().map(Symbol::as_str).collect::<Vec<_>>().join(",");
        let page: Page<Historicals> = self
            .client
            .get("/quotes/historicals/", &[("symbols", list.as_str()), ("interval", "day")])?;

        let mut by_symbol: FxHashMap<Symbol, Vec<_>> = page
            .results
            .iter()
            .map(types::parse_historicals)
            .collect::<Result<_, _>>()?;

        // Keep the caller's column order.
        let series = symbols
            .iter()
            .map(|sym| {
                by_symbol
                    .remove(sym)
                    .map(|s| (*sym, s))
                    .ok_or_else(|| BrokerError::InvalidSymbol(sym.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PriceMatrix::from_series(series)?)
    }

    fn quotes(&self, symbols: &[Symbol]) -> Result<Vec<(Symbol, f64)>, BrokerError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let list = symbols.iter().map(Symbol::as_str).collect::<Vec<_>>().join(",");
        let page: Page<Option<QuoteEntry>> = self.client.get("/quotes/", &[("symbols", list.as_str())])?;

        let mut quotes = Vec::with_capacity(page.results.len());
        for entry in page.results.into_iter().flatten() {
            let Some(symbol) = Symbol::try_new(&entry.symbol) else {
                continue;
            };
            match types::parse_mid(&entry)? {
                Some(mid) => quotes.push((symbol, mid)),
                None => warn!("No bid/ask for {symbol}"),
            }
        }
        Ok(quotes)
    }

    fn open_positions(&self) -> Result<Vec<(Symbol, f64)>, BrokerError> {
        let entries: Vec<PositionEntry> = self
            .client
            .get_all(&format!("/accounts/{}/positions/", self.account_id), &[])?;

        let mut positions = Vec::new();
        for entry in entries {
            let quantity = types::parse_decimal(&entry.quantity, "quantity")?;
            if quantity <= 0.0 {
                continue;
            }
            if let Some(symbol) = self.symbol_for(&entry.instrument)? {
                positions.push((symbol, quantity));
            }
        }
        Ok(positions)
    }

    fn equity(&self) -> Result<f64, BrokerError> {
        let portfolio: Portfolio = self
            .client
            .get(&format!("/accounts/{}/portfolio/", self.account_id), &[])?;
        types::parse_decimal(&portfolio.equity, "equity")
    }

    fn margin(&self) -> Result<f64, BrokerError> {
        let account: Account = self
            .client
            .get(&format!("/accounts/{}/", self.account_id), &[])?;
        match account.margin_balances.and_then(|m| m.margin_limit) {
            Some(limit) => types::parse_decimal(&limit, "margin_limit"),
            None => Ok(0.0),
        }
    }

    fn buy(&self, symbol: Symbol, quantity: u64, limit_price: f64) -> Result<OrderResult, BrokerError> {
        let mut form = self.order_form(symbol, Side::Buy, quantity)?;
        form.push(("type", "limit".to_string()));
        form.push(("price", format!("{limit_price:.2}")));
        form.push(("trigger", "immediate".to_string()));
        self.submit(symbol, Side::Buy, form)
    }

    fn sell(&self, symbol: Symbol, quantity: u64, stop_price: Option<f64>) -> Result<OrderResult, BrokerError> {
        let mut form = self.order_form(symbol, Side::Sell, quantity)?;
        form.push(("type", "market".to_string()));
        match stop_price {
            Some(stop) => {
                form.push(("trigger", "stop".to_string()));
                form.push(("stop_price", format!("{stop:.2}")));
            }
            None => form.push(("trigger", "immediate".to_string())),
        }
        self.submit(symbol, Side::Sell, form)
    }

    fn watchlist(&self, name: &str) -> Result<Vec<Symbol>, BrokerError> {
        let entries: Vec<WatchlistEntry> = self.client.get_all(&format!("/watchlists/{name}/"), &[])?;
        let mut symbols = Vec::with_capacity(entries.len());
        for entry in entries {
            if let Some(symbol) = self.symbol_for(&entry.instrument)? {
                symbols.push(symbol);
            }
        }
        Ok(symbols)
    }

    fn market_open(&self) -> Result<bool, BrokerError> {
        let today = types::exchange_date(Utc::now());
        let hours: MarketHours = self
            .client
            .get(&format!("/markets/{MARKET_MIC}/hours/{}/", today.format("%Y-%m-%d")), &[])?;
        Ok(hours.is_open)
    }
}
