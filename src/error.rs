//! Errors raised while estimating statistics and solving for weights.

/// Errors returned by the estimation and optimization layer.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Fewer price rows than the calculation needs.
    #[error("insufficient data: {rows} price rows, need at least {required}")]
    InsufficientData { rows: usize, required: usize },

    /// The solver did not reach an optimal point.
    #[error("solver did not converge: {0}")]
    Convergence(String),

    /// Covariance and expected-return indices disagree.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A price matrix violated its construction invariants.
    #[error("invalid price matrix: {0}")]
    InvalidPrices(String),
}

pub type Result<T> = std::result::Result<T, Error>;
