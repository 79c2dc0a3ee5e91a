//! TOML configuration loading and validation.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tangent::Symbol;
use zeroize::Zeroizing;

use crate::blend::BlendCaps;
use crate::error::{Error, Result};
use crate::sizing::{CapitalPolicy, Rounding};
use crate::strategy::SharpeParams;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub broker: BrokerConfig,
    #[serde(default)]
    pub capital: CapitalConfig,
    #[serde(default)]
    pub blend: BlendConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

/// API token, wiped from memory on drop and never printed.
#[derive(Clone)]
pub struct Secret(Zeroizing<String>);

impl Secret {
    pub fn new(value: String) -> Self {
        Self(Zeroizing::new(value))
    }

    pub fn expose(&self) -> &Zeroizing<String> {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    pub account_id: String,
    /// Environment variable holding the API token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Resolved from `token_env` by [`Config::load`].
    #[serde(skip)]
    pub token: Option<Secret>,
}

fn default_base_url() -> String {
    "https://api.robinhood.com".into()
}
fn default_token_env() -> String {
    "ROBINHOOD_TOKEN".into()
}
fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapitalConfig {
    #[serde(default = "default_equity_utilisation")]
    pub equity_utilisation: f64,
    #[serde(default)]
    pub margin_utilisation: f64,
}

fn default_equity_utilisation() -> f64 {
    0.99
}

impl Default for CapitalConfig {
    fn default() -> Self {
        Self {
            equity_utilisation: default_equity_utilisation(),
            margin_utilisation: 0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlendConfig {
    #[serde(default = "default_primary_cap")]
    pub primary_cap: f64,
    #[serde(default = "default_secondary_cap")]
    pub secondary_cap: f64,
}

fn default_primary_cap() -> f64 {
    1.0 / 12.0
}
fn default_secondary_cap() -> f64 {
    5.0 / 6.0
}

impl Default for BlendConfig {
    fn default() -> Self {
        Self {
            primary_cap: default_primary_cap(),
            secondary_cap: default_secondary_cap(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub rounding: Rounding,
    /// Pause between the sell and buy phases.
    #[serde(default = "default_settle_pause")]
    pub settle_pause_secs: u64,
    /// Threads used to run strategies.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Refuse to trade while the exchange is closed.
    #[serde(default = "default_true")]
    pub market_check: bool,
}

fn default_settle_pause() -> u64 {
    5
}
fn default_workers() -> usize {
    4
}
fn default_true() -> bool {
    true
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            rounding: Rounding::default(),
            settle_pause_secs: default_settle_pause(),
            workers: default_workers(),
            market_check: true,
        }
    }
}

/// Whether a strategy's weights are capped primaries or fill-in secondaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyClass {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    pub name: String,
    pub class: StrategyClass,
    /// Fixed symbols; mutually exclusive with `watchlist`.
    #[serde(default)]
    pub universe: Vec<Symbol>,
    #[serde(default)]
    pub watchlist: Option<String>,
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    #[serde(default = "default_min_lookback")]
    pub min_lookback: usize,
    #[serde(default)]
    pub allow_short: bool,
}

fn default_lookback() -> usize {
    21
}
fn default_min_lookback() -> usize {
    7
}

/// Where a strategy's symbols come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UniverseSource {
    Fixed(Vec<Symbol>),
    Watchlist(String),
}

impl StrategyConfig {
    pub fn params(&self) -> SharpeParams {
        SharpeParams {
            lookback: self.lookback,
            min_lookback: self.min_lookback,
            allow_short: self.allow_short,
        }
    }

    pub fn source(&self) -> UniverseSource {
        match &self.watchlist {
            Some(name) => UniverseSource::Watchlist(name.clone()),
            None => UniverseSource::Fixed(self.universe.clone()),
        }
    }

    fn validate(&self) -> Result<()> {
        let name = &self.name;
        if name.is_empty() {
            return Err(Error::Config("strategy name must not be empty".into()));
        }
        if self.watchlist.is_some() == !self.universe.is_empty() {
            return Err(Error::Config(format!(
                "strategy '{name}' needs exactly one of `universe` or `watchlist`"
            )));
        }
        validate_lookback(name, self.lookback, self.min_lookback)
    }
}

/// Fixed-universe strategy used when the blend comes back empty.
#[derive(Debug, Clone, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_fallback_universe")]
    pub universe: Vec<Symbol>,
    #[serde(default = "default_lookback")]
    pub lookback: usize,
    #[serde(default = "default_fallback_min_lookback")]
    pub min_lookback: usize,
}

fn default_fallback_universe() -> Vec<Symbol> {
    vec![Symbol::new("TLT"), Symbol::new("HYG"), Symbol::new("SPY")]
}
fn default_fallback_min_lookback() -> usize {
    9
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            universe: default_fallback_universe(),
            lookback: default_lookback(),
            min_lookback: default_fallback_min_lookback(),
        }
    }
}

impl FallbackConfig {
    pub fn params(&self) -> SharpeParams {
        SharpeParams {
            lookback: self.lookback,
            min_lookback: self.min_lookback,
            allow_short: false,
        }
    }
}

fn validate_lookback(name: &str, lookback: usize, min_lookback: usize) -> Result<()> {
    if min_lookback < 2 {
        return Err(Error::Config(format!(
            "'{name}': min_lookback must be >= 2"
        )));
    }
    if lookback < min_lookback {
        return Err(Error::Config(format!(
            "'{name}': lookback must be >= min_lookback"
        )));
    }
    Ok(())
}

impl Config {
    /// Load config from a TOML file and resolve the broker token from the
    /// environment.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let mut config = Self::from_toml(&contents)?;
        config.broker.token = std::env::var(&config.broker.token_env).ok().map(Secret::new);
        Ok(config)
    }

    /// Parse and validate without touching the environment.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate config invariants.
    fn validate(&self) -> Result<()> {
        if self.broker.account_id.is_empty() {
            return Err(Error::Config("account_id must not be empty".into()));
        }
        if self.broker.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be > 0".into()));
        }
        for (field, value) in [
            ("equity_utilisation", self.capital.equity_utilisation),
            ("margin_utilisation", self.capital.margin_utilisation),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{field} must be in [0.0, 1.0]")));
            }
        }
        for (field, value) in [
            ("primary_cap", self.blend.primary_cap),
            ("secondary_cap", self.blend.secondary_cap),
        ] {
            if value <= 0.0 || value > 1.0 {
                return Err(Error::Config(format!("{field} must be in (0.0, 1.0]")));
            }
        }
        if self.execution.workers == 0 {
            return Err(Error::Config("workers must be >= 1".into()));
        }
        for strategy in &self.strategies {
            strategy.validate()?;
        }
        if self.fallback.enabled {
            if self.fallback.universe.is_empty() {
                return Err(Error::Config("fallback universe must not be empty".into()));
            }
            validate_lookback("fallback", self.fallback.lookback, self.fallback.min_lookback)?;
        }
        Ok(())
    }

    pub fn capital_policy(&self) -> CapitalPolicy {
        CapitalPolicy {
            equity_utilisation: self.capital.equity_utilisation,
            margin_utilisation: self.capital.margin_utilisation,
        }
    }

    pub fn blend_caps(&self) -> BlendCaps {
        BlendCaps {
            primary_cap: self.blend.primary_cap,
            secondary_cap: self.blend.secondary_cap,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.broker.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn example_toml() -> &'static str {
        r#"
[broker]
account_id = "5RY82436"
token_env = "TANGENT_TEST_TOKEN"
timeout_secs = 10

[capital]
equity_utilisation = 0.95
margin_utilisation = 0.1

[blend]
primary_cap = 0.1
secondary_cap = 0.8

[execution]
rounding = "floor"
settle_pause_secs = 0
workers = 2
market_check = false

[[strategies]]
name = "picks"
class = "primary"
watchlist = "Default"
lookback = 60

[[strategies]]
name = "core"
class = "secondary"
universe = ["SPY", "TLT", "HYG"]
min_lookback = 9
"#
    }

    #[test]
    fn parse_example_config() {
        let config = Config::from_toml(example_toml()).unwrap();
        assert_eq!(config.broker.base_url, "https://api.robinhood.com");
        assert_eq!(config.broker.timeout_secs, 10);
        assert!(config.broker.token.is_none());
        assert_eq!(config.capital.equity_utilisation, 0.95);
        assert_eq!(config.execution.rounding, Rounding::Floor);
        assert_eq!(config.execution.workers, 2);
        assert!(!config.execution.market_check);
        assert_eq!(config.strategies.len(), 2);

        let picks = &config.strategies[0];
        assert_eq!(picks.class, StrategyClass::Primary);
        assert_eq!(picks.source(), UniverseSource::Watchlist("Default".into()));
        assert_eq!(picks.params().lookback, 60);
        assert_eq!(picks.params().min_lookback, 7);

        let core = &config.strategies[1];
        assert_eq!(
            core.source(),
            UniverseSource::Fixed(vec![Symbol::new("SPY"), Symbol::new("TLT"), Symbol::new("HYG")])
        );
    }

    #[test]
    fn defaults_for_missing_sections() {
        let config = Config::from_toml("[broker]\naccount_id = \"A1\"\n").unwrap();
        assert_eq!(config.capital_policy(), CapitalPolicy::default());
        assert_eq!(config.blend_caps(), BlendCaps::default());
        assert_eq!(config.execution.rounding, Rounding::Nearest);
        assert_eq!(config.execution.settle_pause_secs, 5);
        assert!(config.execution.market_check);
        assert!(config.strategies.is_empty());
        assert!(config.fallback.enabled);
        assert_eq!(config.fallback.universe.len(), 3);
        assert_eq!(config.fallback.params().min_lookback, 9);
    }

    #[test]
    fn validate_catches_bad_utilisation() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.capital.equity_utilisation = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_bad_caps() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.blend.primary_cap = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_catches_zero_workers() {
        let mut config = Config::from_toml(example_toml()).unwrap();
        config.execution.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn strategy_needs_exactly_one_source() {
        let both = example_toml().replace("watchlist = \"Default\"", "watchlist = \"Default\"\nuniverse = [\"SPY\"]");
        assert!(matches!(Config::from_toml(&both), Err(Error::Config(_))));

        let neither = example_toml().replace("watchlist = \"Default\"\n", "");
        assert!(matches!(Config::from_toml(&neither), Err(Error::Config(_))));
    }

    #[test]
    fn lookback_below_minimum_is_rejected() {
        let bad = example_toml().replace("lookback = 60", "lookback = 3");
        assert!(Config::from_toml(&bad).is_err());
    }

    #[test]
    fn overlong_symbol_is_a_parse_error() {
        let bad = example_toml().replace("\"HYG\"", "\"NOTASYMBOL\"");
        assert!(matches!(Config::from_toml(&bad), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn unknown_class_is_a_parse_error() {
        let bad = example_toml().replace("\"primary\"", "\"tertiary\"");
        assert!(matches!(Config::from_toml(&bad), Err(Error::ConfigParse(_))));
    }

    #[test]
    fn token_is_redacted() {
        let secret = Secret::new("hunter2".into());
        assert_eq!(format!("{secret:?}"), "<redacted>");
        assert_eq!(secret.expose().as_str(), "hunter2");
    }
}
