//! Robinhood REST payloads and the parsers that turn them into tangent types.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::New_York;
use regex::Regex;
use serde::Deserialize;
use tangent::Symbol;

use crate::error::BrokerError;
use crate::types::Side;

/// A page of results; `next` is the absolute URL of the following page.
#[derive(Debug, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

/// One symbol's entry in `/quotes/historicals/`.
#[derive(Debug, Deserialize)]
pub struct Historicals {
    pub symbol: String,
    pub historicals: Vec<HistoricalBar>,
}

#[derive(Debug, Deserialize)]
pub struct HistoricalBar {
    pub begins_at: String,
    pub close_price: String,
}

/// `/quotes/` entry. Unknown symbols come back as `null` results.
#[derive(Debug, Deserialize)]
pub struct QuoteEntry {
    pub symbol: String,
    #[serde(default)]
    pub bid_price: Option<String>,
    #[serde(default)]
    pub ask_price: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Portfolio {
    pub equity: String,
}

#[derive(Debug, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub margin_balances: Option<MarginBalances>,
}

#[derive(Debug, Deserialize)]
pub struct MarginBalances {
    #[serde(default)]
    pub margin_limit: Option<String>,
}

/// `/accounts/{id}/positions/` entry; includes closed (zero) positions.
#[derive(Debug, Deserialize)]
pub struct PositionEntry {
    pub instrument: String,
    pub quantity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub symbol: String,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct WatchlistEntry {
    pub instrument: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketHours {
    pub is_open: bool,
}

#[derive(Debug, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub state: String,
}

/// Parse a decimal string field (Robinhood sends numbers as strings).
pub fn parse_decimal(value: &str, field: &str) -> Result<f64, BrokerError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|e| BrokerError::Parse(format!("{field} '{value}': {e}")))
}

/// Calendar date of a `begins_at` timestamp such as `2024-01-02T00:00:00Z`.
pub fn parse_bar_date(begins_at: &str) -> Result<NaiveDate, BrokerError> {
    let day = begins_at.get(..10).unwrap_or(begins_at);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map_err(|e| BrokerError::Parse(format!("begins_at '{begins_at}': {e}")))
}

/// Convert one historicals entry into a dated close series.
pub fn parse_historicals(entry: &Historicals) -> Result<(Symbol, Vec<(NaiveDate, f64)>), BrokerError> {
    let symbol = Symbol::try_new(&entry.symbol)
        .ok_or_else(|| BrokerError::InvalidSymbol(entry.symbol.clone()))?;
    let series = entry
        .historicals
        .iter()
        .map(|bar| {
            Ok((
                parse_bar_date(&bar.begins_at)?,
                parse_decimal(&bar.close_price, "close_price")?,
            ))
        })
        .collect::<Result<Vec<_>, BrokerError>>()?;
    Ok((symbol, series))
}

/// Bid/ask midpoint, or `None` when either side is missing.
pub fn parse_mid(entry: &QuoteEntry) -> Result<Option<f64>, BrokerError> {
    match (&entry.bid_price, &entry.ask_price) {
        (Some(bid), Some(ask)) => {
            let bid = parse_decimal(bid, "bid_price")?;
            let ask = parse_decimal(ask, "ask_price")?;
            Ok(Some((bid + ask) / 2.0))
        }
        _ => Ok(None),
    }
}

static PURCHASE_CAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Yy]ou can only purchase (\d+) shares").expect("valid purchase-cap pattern")
});

static SELL_CAP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Yy]ou can only sell (\d+) shares").expect("valid sell-cap pattern")
});

/// Trading date on the exchange (US Eastern) at `now`.
pub fn exchange_date(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&New_York).date_naive()
}

/// Extract N from rejection text like "You can only purchase N shares"
/// (buys) or "You can only sell N shares" (sells).
pub fn parse_quantity_cap(text: &str, side: Side) -> Option<u64> {
    let pattern = match side {
        Side::Buy => &PURCHASE_CAP,
        Side::Sell => &SELL_CAP,
    };
    pattern.captures(text)?.get(1)?.as_str().parse().ok()
}
