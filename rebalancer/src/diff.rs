//! CURRENT→TARGET delta engine.
//!
//! Computes the signed share movements needed to go from current holdings
//! to target holdings.

use std::fmt;

use rustc_hash::FxHashSet;
use serde::Serialize;
use tangent::Symbol;

use crate::sizing::Holdings;

/// Signed share changes, sorted ascending (largest sells first), ties by symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PortfolioDelta(Vec<(Symbol, f64)>);

impl PortfolioDelta {
    pub fn entries(&self) -> &[(Symbol, f64)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Delta for `symbol`, 0.0 if absent.
    pub fn get(&self, symbol: Symbol) -> f64 {
        self.0
            .iter()
            .find(|(s, _)| *s == symbol)
            .map_or(0.0, |(_, d)| *d)
    }

    /// Negative entries as whole-share sell quantities, never more than
    /// the shares held.
    pub fn sells(&self) -> impl Iterator<Item = (Symbol, u64)> + '_ {
        self.0
            .iter()
            .filter(|(_, d)| *d < 0.0)
            .filter_map(|(s, d)| whole_shares(-d).map(|q| (*s, q)))
    }

    /// Positive entries as whole-share buy quantities, never past the target.
    pub fn buys(&self) -> impl Iterator<Item = (Symbol, u64)> + '_ {
        self.0
            .iter()
            .filter(|(_, d)| *d > 0.0)
            .filter_map(|(s, d)| whole_shares(*d).map(|q| (*s, q)))
    }
}

/// Fractional remainders (from fractional current positions) are floored;
/// anything below one share is not traded.
fn whole_shares(quantity: f64) -> Option<u64> {
    let q = quantity.floor();
    (q >= 1.0 && q.is_finite()).then_some(q as u64)
}

impl fmt::Display for PortfolioDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (sym, d)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{sym}: {d:.0}")?;
        }
        Ok(())
    }
}

/// `target − current` over the union of symbols (missing = 0).
pub fn compute_delta(target: &Holdings, current: &Holdings) -> PortfolioDelta {
    let symbols: FxHashSet<Symbol> = target.keys().chain(current.keys()).copied().collect();

    let mut entries: Vec<(Symbol, f64)> = symbols
        .into_iter()
        .map(|sym| {
            let t = target.get(&sym).copied().unwrap_or(0.0);
            let c = current.get(&sym).copied().unwrap_or(0.0);
            (sym, t - c)
        })
        .collect();

    entries.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    PortfolioDelta(entries)
}
