//! Tangency (maximum-Sharpe) portfolio solver and lookback-window search.
//!
//! The tangency portfolio is found as the convex quadratic program
//!
//! ```text
//! minimize  xᵀΣx
//! subject to μᵀx ≥ 1,  x ≥ 0 (long-only)
//! ```
//!
//! whose solution, rescaled to sum to 1, maximizes μᵀw / sqrt(wᵀΣw). The
//! return floor of 1 only fixes the scale and disappears in the rescale.
//!
//! The long-only program is solved with a primal active-set method: start
//! from the single asset with the best μ/σ, add the bound variable whose KKT
//! multiplier is most negative, and when the equality-constrained step would
//! push a free variable below zero, stop at the boundary and release it.

use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::error::{Error, Result};
use crate::prices::PriceMatrix;
use crate::stats::{self, CovarianceMatrix, ExpectedReturns};
use crate::weights::WeightVector;

/// Active-set iterations before the solver gives up.
const MAX_ITERATIONS: usize = 500;

/// Pivots below this fraction of the largest diagonal entry are singular.
const PIVOT_TOLERANCE: f64 = 1e-12;

/// KKT multipliers above `-tolerance * λ` count as satisfied.
const KKT_TOLERANCE: f64 = 1e-10;

/// Smallest lookback the search will evaluate.
pub const MIN_WINDOW: usize = 2;

// ---------------------------------------------------------------------------
// Tangency solver
// ---------------------------------------------------------------------------

/// Maximum-Sharpe weights for the given estimates, normalized to sum to 1.
///
/// # Errors
///
/// - [`Error::ShapeMismatch`] if `covariance` and `expected_returns` are not
///   indexed by the same symbols in the same order.
/// - [`Error::Convergence`] if the program is infeasible (no positive
///   expected return when long-only), a sub-system is singular, or the
///   iteration budget runs out.
pub fn tangency_portfolio(
    covariance: &CovarianceMatrix,
    expected_returns: &ExpectedReturns,
    allow_short: bool,
) -> Result<WeightVector> {
    if covariance.symbols() != expected_returns.symbols() {
        return Err(Error::ShapeMismatch(format!(
            "covariance index {:?} does not match expected returns index {:?}",
            covariance.symbols(),
            expected_returns.symbols()
        )));
    }

    let cov = covariance.values();
    let mu = expected_returns.values();
    if mu.is_empty() {
        return Err(Error::Convergence("empty universe".into()));
    }
    if mu.iter().chain(cov.iter().flatten()).any(|v| !v.is_finite()) {
        return Err(Error::Convergence("non-finite estimates".into()));
    }

    let x = if allow_short {
        let all: Vec<usize> = (0..mu.len()).collect();
        equality_solution(cov, mu, &all)?
    } else {
        solve_long_only(cov, mu)?
    };

    let total: f64 = x.iter().sum();
    if !total.is_finite() || total.abs() <= f64::EPSILON {
        return Err(Error::Convergence(format!("weights sum to {total}")));
    }

    Ok(covariance
        .symbols()
        .iter()
        .zip(&x)
        .map(|(sym, xi)| (*sym, xi / total))
        .collect())
}

fn solve_long_only(cov: &[Vec<f64>], mu: &[f64]) -> Result<Vec<f64>> {
    let n = mu.len();

    let start = (0..n)
        .filter(|&i| mu[i] > 0.0)
        .map(|i| (i, mu[i] / cov[i][i].max(0.0).sqrt()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .ok_or_else(|| Error::Convergence("no asset has a positive expected return".into()))?;

    let mut x = vec![0.0; n];
    let mut free = vec![false; n];
    x[start] = 1.0 / mu[start];
    free[start] = true;

    let mut iterations = 0;
    loop {
        let sigma_x = mat_vec_mul(cov, &x);
        let lambda = 2.0 * dot(&x, &sigma_x);
        let tolerance = KKT_TOLERANCE * lambda.abs().max(f64::MIN_POSITIVE);

        let entering = (0..n)
            .filter(|&i| !free[i])
            .map(|i| (i, 2.0 * sigma_x[i] - lambda * mu[i]))
            .filter(|&(_, nu)| nu < -tolerance)
            .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let Some((k, _)) = entering else {
            return Ok(x);
        };
        free[k] = true;

        loop {
            iterations += 1;
            if iterations > MAX_ITERATIONS {
                return Err(Error::Convergence(format!(
                    "no optimum after {MAX_ITERATIONS} iterations"
                )));
            }

            let active: Vec<usize> = (0..n).filter(|&i| free[i]).collect();
            let z = equality_solution(cov, mu, &active)?;

            if active.iter().all(|&i| z[i] > 0.0) {
                x = z;
                break;
            }

            // Walk toward z until the first free variable reaches zero.
            let (blocking, alpha) = active
                .iter()
                .filter(|&&i| z[i] <= 0.0)
                .map(|&i| {
                    let gap = x[i] - z[i];
                    (i, if gap > 0.0 { x[i] / gap } else { 0.0 })
                })
                .min_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or((k, 0.0));

            for i in 0..n {
                x[i] += alpha * (z[i] - x[i]);
            }

            let scale = x.iter().copied().fold(0.0, f64::max);
            x[blocking] = 0.0;
            free[blocking] = false;
            for &i in &active {
                if x[i] <= 1e-12 * scale {
                    x[i] = 0.0;
                    free[i] = false;
                }
            }
        }
    }
}

/// Minimizer of xᵀΣx subject to μᵀx = 1 over the `active` coordinates
/// (others fixed at zero): x = Σ⁻¹μ / (μᵀΣ⁻¹μ).
fn equality_solution(cov: &[Vec<f64>], mu: &[f64], active: &[usize]) -> Result<Vec<f64>> {
    let a: Vec<Vec<f64>> = active
        .iter()
        .map(|&i| active.iter().map(|&j| cov[i][j]).collect())
        .collect();
    let b: Vec<f64> = active.iter().map(|&i| mu[i]).collect();

    let y = solve_linear(a, b.clone())?;
    let denom = dot(&b, &y);
    if !(denom > 0.0) || !denom.is_finite() {
        return Err(Error::Convergence(format!(
            "return constraint unattainable (μᵀΣ⁻¹μ = {denom})"
        )));
    }

    let mut x = vec![0.0; mu.len()];
    for (k, &i) in active.iter().enumerate() {
        x[i] = y[k] / denom;
    }
    Ok(x)
}

/// Gaussian elimination with partial pivoting.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    let scale = (0..n).map(|i| a[i][i].abs()).fold(0.0, f64::max);
    if scale == 0.0 {
        return Err(Error::Convergence("covariance sub-matrix is zero".into()));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&r, &s| {
                a[r][col]
                    .abs()
                    .partial_cmp(&a[s][col].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);
        if a[pivot][col].abs() <= PIVOT_TOLERANCE * scale {
            return Err(Error::Convergence(
                "covariance sub-matrix is singular".into(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in col + 1..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    Ok(x)
}

fn mat_vec_mul(matrix: &[Vec<f64>], vec: &[f64]) -> Vec<f64> {
    matrix
        .iter()
        .map(|row| row.iter().zip(vec).map(|(a, b)| a * b).sum::<f64>())
        .collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// Lookback search
// ---------------------------------------------------------------------------

/// Score of one evaluated window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowScore {
    /// Rows in the window.
    pub rows: usize,
    /// Oldest date in the window.
    pub start: Option<NaiveDate>,
    /// Realized annualized Sharpe; 0.0 when the window failed.
    pub sharpe: f64,
    /// Whether the estimate or solve failed.
    pub failed: bool,
}

/// Result of a lookback search.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SearchOutcome {
    /// Best weights found; empty when no window beat the 0.0 floor.
    pub weights: WeightVector,
    pub sharpe: f64,
    /// Rows in the winning window (0 when none).
    pub window: usize,
    /// Every window evaluated, longest first.
    pub evaluated: Vec<WindowScore>,
}

/// Brute-force search over lookback lengths.
///
/// Starting from the full matrix, each window is estimated, solved, and
/// scored by its realized Sharpe; the oldest row is then dropped until fewer
/// than `min_lookback` rows remain. A window scoring at least the best so far
/// replaces it, so ties go to the shorter (more recent) window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookbackSearch {
    min_lookback: usize,
    allow_short: bool,
}

impl Default for LookbackSearch {
    fn default() -> Self {
        Self::new(7)
    }
}

impl LookbackSearch {
    /// Search down to `min_lookback` rows (raised to 2 if smaller).
    pub fn new(min_lookback: usize) -> Self {
        Self {
            min_lookback: min_lookback.max(MIN_WINDOW),
            allow_short: false,
        }
    }

    pub fn allow_short(mut self, allow: bool) -> Self {
        self.allow_short = allow;
        self
    }

    pub fn min_lookback(&self) -> usize {
        self.min_lookback
    }

    /// Solve and score a single window.
    pub fn solve_window(&self, window: &PriceMatrix) -> Result<(WeightVector, f64)> {
        let est = stats::estimate(window)?;
        let weights = tangency_portfolio(&est.covariance, &est.expected_returns, self.allow_short)?;
        let aligned: Vec<f64> = window.symbols().iter().map(|s| weights.get(*s)).collect();
        let sharpe = stats::annualized_sharpe(&est.mean_returns, &est.covariance, &aligned);
        Ok((weights, sharpe))
    }

    /// Run the search over `prices`.
    pub fn search(&self, prices: &PriceMatrix) -> SearchOutcome {
        let mut best = SearchOutcome::default();
        let mut window = prices.clone();

        while window.len() >= self.min_lookback {
            let rows = window.len();
            let (weights, sharpe, failed) = match self.solve_window(&window) {
                Ok((w, s)) => (w, s, false),
                Err(e) => {
                    warn!("Lookback of {rows} rows failed: {e}");
                    (WeightVector::new(), 0.0, true)
                }
            };

            debug!("Lookback {rows:>3} rows: Sharpe {sharpe:>10.4} [{weights}]");
            best.evaluated.push(WindowScore {
                rows,
                start: window.first_date(),
                sharpe,
                failed,
            });

            if sharpe >= best.sharpe {
                best.weights = weights;
                best.sharpe = sharpe;
                best.window = rows;
            }

            window = window.drop_first();
        }

        if best.weights.is_empty() {
            info!(
                "No lookback window produced a portfolio ({} evaluated)",
                best.evaluated.len()
            );
        } else {
            info!("Best lookback {} rows (Sharpe {:.4})", best.window, best.sharpe);
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Symbol;

    fn syms(names: &[&str]) -> Vec<Symbol> {
        names.iter().map(|s| Symbol::new(s)).collect()
    }

    fn diag_cov(vars: &[f64]) -> CovarianceMatrix {
        let n = vars.len();
        let names = ["A", "B", "C", "D"];
        let values = (0..n)
            .map(|i| (0..n).map(|j| if i == j { vars[i] } else { 0.0 }).collect())
            .collect();
        CovarianceMatrix::new(syms(&names[..n]), values).unwrap()
    }

    #[test]
    fn diagonal_covariance_weights_are_mu_over_variance() {
        // With uncorrelated assets the tangency weights are ∝ μᵢ/σᵢ².
        let cov = diag_cov(&[0.04, 0.01]);
        let mu = ExpectedReturns::new(syms(&["A", "B"]), vec![0.10, 0.05]).unwrap();
        let w = tangency_portfolio(&cov, &mu, false).unwrap();
        // 0.10/0.04 = 2.5, 0.05/0.01 = 5.0 → 1/3, 2/3
        assert!((w.get(Symbol::new("A")) - 1.0 / 3.0).abs() < 1e-12);
        assert!((w.get(Symbol::new("B")) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn negative_return_asset_gets_zero_weight() {
        let cov = diag_cov(&[0.04, 0.01, 0.02]);
        let mu = ExpectedReturns::new(syms(&["A", "B", "C"]), vec![0.10, 0.05, -0.02]).unwrap();
        let w = tangency_portfolio(&cov, &mu, false).unwrap();
        assert_eq!(w.get(Symbol::new("C")), 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn shorting_allowed_goes_negative() {
        let cov = diag_cov(&[0.04, 0.01, 0.02]);
        let mu = ExpectedReturns::new(syms(&["A", "B", "C"]), vec![0.10, 0.05, -0.02]).unwrap();
        let w = tangency_portfolio(&cov, &mu, true).unwrap();
        assert!(w.get(Symbol::new("C")) < 0.0);
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn all_negative_returns_do_not_converge() {
        let cov = diag_cov(&[0.04, 0.01]);
        let mu = ExpectedReturns::new(syms(&["A", "B"]), vec![-0.10, -0.05]).unwrap();
        assert!(matches!(
            tangency_portfolio(&cov, &mu, false),
            Err(Error::Convergence(_))
        ));
    }

    #[test]
    fn mismatched_indices_are_rejected() {
        let cov = diag_cov(&[0.04, 0.01]);
        let mu = ExpectedReturns::new(syms(&["B", "A"]), vec![0.10, 0.05]).unwrap();
        assert!(matches!(
            tangency_portfolio(&cov, &mu, false),
            Err(Error::ShapeMismatch(_))
        ));
    }

    #[test]
    fn singular_covariance_does_not_converge() {
        // Two perfectly correlated assets with proportional returns make the
        // KKT system singular once both are free.
        let cov = CovarianceMatrix::new(
            syms(&["A", "B"]),
            vec![vec![0.01, 0.01], vec![0.01, 0.01]],
        )
        .unwrap();
        let mu = ExpectedReturns::new(syms(&["A", "B"]), vec![0.05, 0.05]).unwrap();
        let w = tangency_portfolio(&cov, &mu, true);
        assert!(matches!(w, Err(Error::Convergence(_))));
    }

    #[test]
    fn lookback_min_is_at_least_two() {
        assert_eq!(LookbackSearch::new(0).min_lookback(), 2);
        assert_eq!(LookbackSearch::new(9).min_lookback(), 9);
    }

    #[test]
    fn lookback_on_too_short_matrix_is_empty() {
        let prices = PriceMatrix::new(
            syms(&["A"]),
            vec![NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()],
            vec![vec![10.0]],
        )
        .unwrap();
        let outcome = LookbackSearch::new(3).search(&prices);
        assert!(outcome.weights.is_empty());
        assert!(outcome.evaluated.is_empty());
        assert_eq!(outcome.window, 0);
    }
}
