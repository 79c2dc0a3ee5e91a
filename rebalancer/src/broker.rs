//! Broker connection from config.

use tangent_broker::Brokerage;
use tangent_broker::robinhood::{RobinhoodBroker, RobinhoodConfig};

use crate::config::Config;
use crate::error::{Error, Result};

/// Connection settings for the REST broker; fails if no token was resolved.
pub fn robinhood_config(config: &Config) -> Result<RobinhoodConfig> {
    let token = config.broker.token.as_ref().ok_or_else(|| {
        Error::Config(format!(
            "environment variable {} is not set",
            config.broker.token_env
        ))
    })?;
    Ok(RobinhoodConfig {
        base_url: config.broker.base_url.clone(),
        account_id: config.broker.account_id.clone(),
        token: token.expose().clone(),
        timeout: config.timeout(),
    })
}

/// Open the configured brokerage.
pub fn connect(config: &Config) -> Result<Box<dyn Brokerage>> {
    let broker = RobinhoodBroker::new(robinhood_config(config)?)?;
    Ok(Box::new(broker))
}
