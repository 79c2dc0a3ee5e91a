//! Daily closing-price matrix: trading dates × symbols.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use log::debug;
use rustc_hash::FxHashSet;

use crate::error::{Error, Result};
use crate::types::Symbol;

/// Closing prices indexed by date (rows) and symbol (columns).
///
/// Invariants (checked on construction):
/// - dates are strictly increasing,
/// - every row holds exactly one price per symbol,
/// - every price is finite and positive,
/// - symbols are unique.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceMatrix {
    symbols: Vec<Symbol>,
    dates: Vec<NaiveDate>,
    rows: Vec<Vec<f64>>,
}

impl PriceMatrix {
    /// Build a matrix from column symbols, row dates, and row-major prices.
    pub fn new(symbols: Vec<Symbol>, dates: Vec<NaiveDate>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let mut seen = FxHashSet::default();
        for sym in &symbols {
            if !seen.insert(*sym) {
                return Err(Error::InvalidPrices(format!("duplicate symbol {sym}")));
            }
        }

        if dates.len() != rows.len() {
            return Err(Error::InvalidPrices(format!(
                "{} dates for {} rows",
                dates.len(),
                rows.len()
            )));
        }

        if let Some(pair) = dates.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(Error::InvalidPrices(format!(
                "dates not strictly increasing: {} then {}",
                pair[0], pair[1]
            )));
        }

        for (date, row) in dates.iter().zip(&rows) {
            if row.len() != symbols.len() {
                return Err(Error::InvalidPrices(format!(
                    "row {date} has {} prices for {} symbols",
                    row.len(),
                    symbols.len()
                )));
            }
            if let Some(bad) = row.iter().find(|p| !p.is_finite() || **p <= 0.0) {
                return Err(Error::InvalidPrices(format!("row {date} has price {bad}")));
            }
        }

        Ok(Self {
            symbols,
            dates,
            rows,
        })
    }

    /// A matrix with columns but no rows.
    pub fn empty(symbols: Vec<Symbol>) -> Self {
        Self {
            symbols,
            dates: Vec::new(),
            rows: Vec::new(),
        }
    }

    /// Align per-symbol date series into one matrix.
    ///
    /// Only dates present in every series are kept (inner join); columns
    /// follow the order of `series`.
    pub fn from_series(series: Vec<(Symbol, Vec<(NaiveDate, f64)>)>) -> Result<Self> {
        let width = series.len();
        let mut by_date: BTreeMap<NaiveDate, Vec<Option<f64>>> = BTreeMap::new();

        for (col, (_, points)) in series.iter().enumerate() {
            for &(date, price) in points {
                by_date.entry(date).or_insert_with(|| vec![None; width])[col] = Some(price);
            }
        }

        let total = by_date.len();
        let mut dates = Vec::with_capacity(total);
        let mut rows = Vec::with_capacity(total);
        for (date, row) in by_date {
            if let Some(complete) = row.into_iter().collect::<Option<Vec<f64>>>() {
                dates.push(date);
                rows.push(complete);
            }
        }

        if dates.len() < total {
            debug!(
                "Dropped {} of {} dates missing a price for some symbol",
                total - dates.len(),
                total
            );
        }

        let symbols = series.into_iter().map(|(sym, _)| sym).collect();
        Self::new(symbols, dates, rows)
    }

    /// Column symbols, in order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Row dates, oldest first.
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Row-major prices.
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Number of rows (dates).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of columns (symbols).
    pub fn width(&self) -> usize {
        self.symbols.len()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// The most recent `n` rows (all rows if `n >= len`).
    pub fn tail(&self, n: usize) -> PriceMatrix {
        let start = self.rows.len().saturating_sub(n);
        Self {
            symbols: self.symbols.clone(),
            dates: self.dates[start..].to_vec(),
            rows: self.rows[start..].to_vec(),
        }
    }

    /// The same window without its oldest row.
    pub fn drop_first(&self) -> PriceMatrix {
        self.tail(self.rows.len().saturating_sub(1))
    }

    /// Restrict to a subset of columns, in the given order.
    pub fn select(&self, symbols: &[Symbol]) -> Result<PriceMatrix> {
        let indices = symbols
            .iter()
            .map(|sym| {
                self.symbols
                    .iter()
                    .position(|s| s == sym)
                    .ok_or_else(|| Error::InvalidPrices(format!("no prices for {sym}")))
            })
            .collect::<Result<Vec<usize>>>()?;

        let rows = self
            .rows
            .iter()
            .map(|row| indices.iter().map(|&i| row[i]).collect())
            .collect();

        Self::new(symbols.to_vec(), self.dates.clone(), rows)
    }

    /// Prices of one symbol, oldest first.
    pub fn column(&self, symbol: Symbol) -> Option<Vec<f64>> {
        let col = self.symbols.iter().position(|s| *s == symbol)?;
        Some(self.rows.iter().map(|row| row[col]).collect())
    }
}
