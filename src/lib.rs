//! # tangent
//!
//! Maximum-Sharpe (tangency) portfolio estimation over sliding lookback
//! windows of daily closing prices.
//!
//! ## Pipeline
//!
//! 1. A [`PriceMatrix`] holds aligned daily closes, oldest row first.
//! 2. [`stats::estimate`] turns a window into period expected returns
//!    and a sample covariance matrix.
//! 3. [`tangency_portfolio`] solves the long-only (or shorting) quadratic
//!    program for the weights with the highest Sharpe ratio.
//! 4. [`LookbackSearch`] repeats 2 and 3 for every window length from the
//!    full history down to a minimum, keeping the best realized Sharpe.
//!
//! ## Quick Start
//!
//! ```
//! use tangent::{tangency_portfolio, CovarianceMatrix, ExpectedReturns, Symbol};
//!
//! let symbols = vec![Symbol::new("A"), Symbol::new("B")];
//! let cov = CovarianceMatrix::new(
//!     symbols.clone(),
//!     vec![vec![0.04, 0.0], vec![0.0, 0.01]],
//! )
//! .unwrap();
//! let mu = ExpectedReturns::new(symbols, vec![0.10, 0.05]).unwrap();
//!
//! let weights = tangency_portfolio(&cov, &mu, false).unwrap();
//! assert!((weights.sum() - 1.0).abs() < 1e-12);
//! assert!(weights.get(Symbol::new("B")) > weights.get(Symbol::new("A")));
//! ```
//!
//! ## Features
//!
//! - `serde`: `Serialize`/`Deserialize` for [`Symbol`] and [`WeightVector`].

mod error;
pub mod optimize;
mod prices;
pub mod stats;
mod types;
mod weights;

pub use error::{Error, Result};
pub use optimize::{tangency_portfolio, LookbackSearch, SearchOutcome, WindowScore};
pub use prices::PriceMatrix;
pub use stats::{CovarianceMatrix, Estimates, ExpectedReturns};
pub use types::{Symbol, SYMBOL_CAPACITY};
pub use weights::WeightVector;
