//! Error types for the rebalancer.

use std::path::PathBuf;

use tangent_broker::BrokerError;

use crate::execution::Executions;
use crate::orders::Order;

/// All errors that can occur during rebalancer operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("optimization error: {0}")]
    Optimize(#[from] tangent::Error),

    #[error("No optimal portfolio found.")]
    NoPortfolioFound,

    #[error("failed to build worker pool: {0}")]
    Pool(String),

    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    /// The broker dropped mid-run. `executions` holds what was already
    /// submitted; `unsent` never reached the broker.
    #[error("execution interrupted while submitting {in_flight}: {source}")]
    Interrupted {
        executions: Box<Executions>,
        in_flight: Box<Order>,
        unsent: Vec<Order>,
        #[source]
        source: BrokerError,
    },

    #[error("execution aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, Error>;
