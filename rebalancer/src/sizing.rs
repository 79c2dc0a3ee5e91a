//! Turn target weights into whole-share holdings.

use std::collections::BTreeMap;

use log::warn;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use tangent::{Symbol, WeightVector};

/// Share counts by symbol; values are whole numbers stored as f64.
pub type Holdings = BTreeMap<Symbol, f64>;

/// Mid quotes by symbol.
pub type Quotes = FxHashMap<Symbol, f64>;

/// How fractional share counts become whole shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rounding {
    /// Round to nearest, halves to even.
    #[default]
    Nearest,
    /// Round down.
    Floor,
}

impl Rounding {
    fn apply(self, shares: f64) -> f64 {
        match self {
            Rounding::Nearest => shares.round_ties_even(),
            Rounding::Floor => shares.floor(),
        }
    }
}

/// How much of the account a run may deploy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapitalPolicy {
    pub equity_utilisation: f64,
    pub margin_utilisation: f64,
}

impl Default for CapitalPolicy {
    fn default() -> Self {
        Self {
            equity_utilisation: 0.99,
            margin_utilisation: 0.0,
        }
    }
}

impl CapitalPolicy {
    /// `equity · equity_utilisation + margin · margin_utilisation`.
    pub fn capital(&self, equity: f64, margin: f64) -> f64 {
        equity * self.equity_utilisation + margin * self.margin_utilisation
    }

    /// Limit price for a buy: the mid plus half the unused equity share,
    /// rounded to cents.
    pub fn buy_limit(&self, mid: f64) -> f64 {
        let markup = 1.0 + (1.0 - self.equity_utilisation) / 2.0;
        (mid * markup * 100.0).round() / 100.0
    }
}

/// `shares = round(weight · capital / quote)` for every weighted symbol.
///
/// Symbols without a usable quote (missing, non-finite, or non-positive)
/// are skipped.
pub fn size_positions(
    weights: &WeightVector,
    quotes: &Quotes,
    capital: f64,
    rounding: Rounding,
) -> Holdings {
    let mut holdings = Holdings::new();
    for (symbol, weight) in weights.iter() {
        match quotes.get(&symbol) {
            Some(&quote) if quote.is_finite() && quote > 0.0 => {
                holdings.insert(symbol, rounding.apply(weight * capital / quote));
            }
            other => warn!("Skipping {symbol}: no usable quote ({other:?})"),
        }
    }
    holdings
}

/// Money the holdings deploy at the given quotes.
pub fn capital_used(holdings: &Holdings, quotes: &Quotes) -> f64 {
    holdings
        .iter()
        .filter_map(|(sym, shares)| quotes.get(sym).map(|q| shares * q))
        .sum()
}

/// `SYM: shares` pairs for log lines.
pub fn describe(holdings: &Holdings) -> String {
    holdings
        .iter()
        .map(|(sym, shares)| format!("{sym}: {shares:.0}"))
        .collect::<Vec<_>>()
        .join(", ")
}
