//! Broker error types.

/// Errors that can occur during broker operations.
///
/// Order rejections are not errors: they come back as
/// [`OrderResult::Rejected`](crate::OrderResult::Rejected). These variants
/// cover transport, authentication, and payload failures.
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("authentication error: {0}")]
    Auth(String),

    #[error("order error: {0}")]
    Order(String),

    #[error("invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("failed to parse response: {0}")]
    Parse(String),

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Other(String),
}

impl From<tangent::Error> for BrokerError {
    fn from(e: tangent::Error) -> Self {
        BrokerError::Parse(e.to_string())
    }
}
