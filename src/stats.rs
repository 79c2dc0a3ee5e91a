//! Return and risk estimates derived from a price matrix.
//!
//! Returns are simple percentage changes between consecutive closes. The
//! covariance uses the sample (n − 1) denominator; expected returns are the
//! total return across the window, `last / first − 1`.

use crate::error::{Error, Result};
use crate::prices::PriceMatrix;
use crate::types::Symbol;

/// Trading days per year used for annualization.
pub const TRADING_DAYS: f64 = 252.0;

// ---------------------------------------------------------------------------
// Estimate types
// ---------------------------------------------------------------------------

/// Expected return per symbol over an estimation window.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpectedReturns {
    symbols: Vec<Symbol>,
    values: Vec<f64>,
}

impl ExpectedReturns {
    pub fn new(symbols: Vec<Symbol>, values: Vec<f64>) -> Result<Self> {
        if symbols.len() != values.len() {
            return Err(Error::ShapeMismatch(format!(
                "{} symbols for {} expected returns",
                symbols.len(),
                values.len()
            )));
        }
        Ok(Self { symbols, values })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, symbol: Symbol) -> Option<f64> {
        let i = self.symbols.iter().position(|s| *s == symbol)?;
        Some(self.values[i])
    }
}

/// Symmetric sample covariance of daily returns.
#[derive(Debug, Clone, PartialEq)]
pub struct CovarianceMatrix {
    symbols: Vec<Symbol>,
    values: Vec<Vec<f64>>,
}

impl CovarianceMatrix {
    pub fn new(symbols: Vec<Symbol>, values: Vec<Vec<f64>>) -> Result<Self> {
        let n = symbols.len();
        if values.len() != n || values.iter().any(|row| row.len() != n) {
            return Err(Error::ShapeMismatch(format!(
                "covariance is not {n}x{n} for {n} symbols"
            )));
        }
        Ok(Self { symbols, values })
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    pub fn get(&self, a: Symbol, b: Symbol) -> Option<f64> {
        let i = self.symbols.iter().position(|s| *s == a)?;
        let j = self.symbols.iter().position(|s| *s == b)?;
        Some(self.values[i][j])
    }

    /// Portfolio variance `wᵀΣw` for weights aligned with [`Self::symbols`].
    pub fn variance(&self, weights: &[f64]) -> f64 {
        self.values
            .iter()
            .zip(weights)
            .map(|(row, wi)| wi * row.iter().zip(weights).map(|(c, wj)| c * wj).sum::<f64>())
            .sum()
    }
}

/// Everything the solver and the Sharpe scorer need from one window.
#[derive(Debug, Clone, PartialEq)]
pub struct Estimates {
    pub expected_returns: ExpectedReturns,
    pub covariance: CovarianceMatrix,
    /// Mean daily return per symbol, aligned with the covariance index.
    pub mean_returns: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Percentage change between consecutive rows (`len − 1` rows).
pub fn pct_change(prices: &PriceMatrix) -> Vec<Vec<f64>> {
    prices
        .rows()
        .windows(2)
        .map(|pair| {
            pair[1]
                .iter()
                .zip(&pair[0])
                .map(|(now, prev)| now / prev - 1.0)
                .collect()
        })
        .collect()
}

/// Estimate expected returns, covariance, and mean daily returns.
///
/// Fails with [`Error::InsufficientData`] for fewer than 2 rows.
pub fn estimate(prices: &PriceMatrix) -> Result<Estimates> {
    if prices.len() < 2 {
        return Err(Error::InsufficientData {
            rows: prices.len(),
            required: 2,
        });
    }

    let rows = prices.rows();
    let first = &rows[0];
    let last = &rows[rows.len() - 1];
    let totals: Vec<f64> = last.iter().zip(first).map(|(l, f)| l / f - 1.0).collect();

    let returns = pct_change(prices);
    let means = column_means(&returns);
    let cov = sample_covariance(&returns, &means);

    let symbols = prices.symbols().to_vec();
    Ok(Estimates {
        expected_returns: ExpectedReturns::new(symbols.clone(), totals)?,
        covariance: CovarianceMatrix::new(symbols, cov)?,
        mean_returns: means,
    })
}

/// Annualized Sharpe ratio of realized returns under `weights`.
///
/// `(Σ meanᵢ·wᵢ)·252 / sqrt(wᵀΣw·sqrt(252))`. Returns 0.0 whenever the
/// ratio is not finite (zero variance, empty input).
pub fn annualized_sharpe(mean_returns: &[f64], covariance: &CovarianceMatrix, weights: &[f64]) -> f64 {
    let ret = mean_returns
        .iter()
        .zip(weights)
        .map(|(m, w)| m * w)
        .sum::<f64>()
        * TRADING_DAYS;
    let stddev = (covariance.variance(weights) * TRADING_DAYS.sqrt()).sqrt();
    let sharpe = ret / stddev;
    if sharpe.is_finite() { sharpe } else { 0.0 }
}

fn column_means(matrix: &[Vec<f64>]) -> Vec<f64> {
    let Some(first) = matrix.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0; first.len()];
    for row in matrix {
        for (j, v) in row.iter().enumerate() {
            sums[j] += v;
        }
    }
    let n = matrix.len() as f64;
    sums.into_iter().map(|s| s / n).collect()
}

fn sample_covariance(matrix: &[Vec<f64>], means: &[f64]) -> Vec<Vec<f64>> {
    let cols = means.len();
    let mut cov = vec![vec![0.0; cols]; cols];

    for row in matrix {
        for i in 0..cols {
            let di = row[i] - means[i];
            for j in i..cols {
                cov[i][j] += di * (row[j] - means[j]);
            }
        }
    }

    let denom = (matrix.len() as f64 - 1.0).max(1.0);
    for i in 0..cols {
        for j in i..cols {
            let v = cov[i][j] / denom;
            cov[i][j] = v;
            cov[j][i] = v;
        }
    }
    cov
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
