//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs. Every
//! engine constant has a serde default, so a partial file (or none at all
//! in tests) yields the documented defaults. Secrets are referenced by
//! env-var name and resolved at start-up into explicit credential structs.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::types::EngineError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub model: ModelConfig,
    pub quoting: QuotingConfig,
    pub risk: RiskConfig,
    pub execution: ExecutionConfig,
    pub venue: VenueConfig,
    pub data_sources: DataSourcesConfig,
    pub assets: Vec<AssetConfig>,
    pub fallback: FallbackConfig,
    pub log_sink: LogSinkConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            agent: AgentConfig::default(),
            model: ModelConfig::default(),
            quoting: QuotingConfig::default(),
            risk: RiskConfig::default(),
            execution: ExecutionConfig::default(),
            venue: VenueConfig::default(),
            data_sources: DataSourcesConfig::default(),
            assets: AssetConfig::defaults(),
            fallback: FallbackConfig::default(),
            log_sink: LogSinkConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub scan_interval_secs: u64,
    /// Market category requested from the market source.
    pub market_category: String,
    /// Route orders to the in-memory paper venue instead of the gateway.
    pub dry_run: bool,
    /// Starting balance for the paper venue.
    pub paper_balance: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "binary-edge".to_string(),
            scan_interval_secs: 60,
            market_category: "crypto".to_string(),
            dry_run: true,
            paper_balance: 1_000.0,
        }
    }
}

/// Pricing model inputs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelConfig {
    /// Annualised implied volatility σ.
    pub volatility: f64,
    /// Horizon T in years (0.0000095 ≈ 5 minutes).
    pub horizon_years: f64,
    /// Risk-free rate r.
    pub risk_free_rate: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            volatility: 0.50,
            horizon_years: 0.0000095,
            risk_free_rate: 0.0433,
        }
    }
}

/// Avellaneda–Stoikov quoting parameters.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct QuotingConfig {
    /// Risk aversion γ.
    pub risk_aversion: f64,
    /// Belief volatility σ_b (log-odds space).
    pub belief_volatility: f64,
    /// Order-arrival decay k.
    pub arrival_decay: f64,
}

impl Default for QuotingConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 0.10,
            belief_volatility: 0.328,
            arrival_decay: 1.50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RiskConfig {
    /// Minimum |fair − market| in percentage points to emit a signal.
    pub edge_threshold: f64,
    /// Fractional Kelly multiplier (0.25 = quarter-Kelly).
    pub kelly_fraction: f64,
    /// Maximum bankroll fraction per position.
    pub max_position_pct: f64,
    /// Maximum aggregate exposure as a bankroll fraction.
    pub max_total_exposure_pct: f64,
    pub stop_loss_pct: f64,
    pub max_drawdown_pct: f64,
    /// Emit HALT advisories from the monitor when a fill breaches the stop.
    pub enforce_stop_loss: bool,
    /// Refuse to size new positions while in drawdown beyond the limit.
    pub enforce_drawdown: bool,
    /// Yes-prices at or below this are treated as settled.
    pub min_tradeable_price: f64,
    /// Yes-prices at or above this are treated as settled.
    pub max_tradeable_price: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            edge_threshold: 3.0,
            kelly_fraction: 0.25,
            max_position_pct: 0.05,
            max_total_exposure_pct: 0.40,
            stop_loss_pct: 0.15,
            max_drawdown_pct: 0.20,
            enforce_stop_loss: false,
            enforce_drawdown: false,
            min_tradeable_price: 0.02,
            max_tradeable_price: 0.98,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Venue minimum price increment.
    pub tick_size: f64,
    /// Per-call timeout applied to every external call.
    pub call_timeout_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            tick_size: 0.01,
            call_timeout_ms: 5_000,
        }
    }
}

impl ExecutionConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenueConfig {
    pub gateway_url: String,
    pub api_key_env: String,
    pub passphrase_env: String,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://127.0.0.1:8787".to_string(),
            api_key_env: "VENUE_API_KEY".to_string(),
            passphrase_env: "VENUE_PASSPHRASE".to_string(),
        }
    }
}

/// Resolved venue credentials, passed explicitly to the venue client.
#[derive(Debug)]
pub struct VenueCredentials {
    pub api_key: SecretString,
    pub passphrase: SecretString,
}

impl VenueConfig {
    /// Resolve the credential env vars named in the config.
    pub fn credentials(&self) -> Result<VenueCredentials> {
        Ok(VenueCredentials {
            api_key: SecretString::new(AppConfig::resolve_env(&self.api_key_env)?),
            passphrase: SecretString::new(AppConfig::resolve_env(&self.passphrase_env)?),
        })
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataSourcesConfig {
    pub gamma_url: String,
    pub market_limit: u32,
    pub coingecko_url: String,
    pub spot_cache_ttl_secs: i64,
}

impl Default for DataSourcesConfig {
    fn default() -> Self {
        Self {
            gamma_url: "https://gamma-api.polymarket.com".to_string(),
            market_limit: 100,
            coingecko_url: "https://api.coingecko.com/api/v3".to_string(),
            spot_cache_ttl_secs: 30,
        }
    }
}

/// An underlying asset markets can be matched against.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AssetConfig {
    pub symbol: String,
    pub name: String,
    /// Identifier used by the spot source (CoinGecko id).
    pub spot_id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl AssetConfig {
    pub fn new(symbol: &str, name: &str, spot_id: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            spot_id: spot_id.to_string(),
            aliases: Vec::new(),
        }
    }

    /// Default asset universe.
    pub fn defaults() -> Vec<AssetConfig> {
        vec![
            AssetConfig::new("BTC", "Bitcoin", "bitcoin"),
            AssetConfig::new("ETH", "Ethereum", "ethereum"),
            AssetConfig::new("SOL", "Solana", "solana"),
            AssetConfig::new("XRP", "Ripple", "ripple"),
        ]
    }
}

/// Default asset/spot pair used when a market matches no known asset.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct FallbackConfig {
    pub asset: String,
    pub spot: f64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            asset: "BTC".to_string(),
            spot: 66_235.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct LogSinkConfig {
    /// JSON-lines file receiving every cycle's log. Disabled when unset.
    pub path: Option<String>,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(contents)?;
        if config.assets.is_empty() {
            config.assets = AssetConfig::defaults();
        }
        config.validate()?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Reject values the engine cannot run with. Comparisons are written so
    /// that NaN fails them.
    pub fn validate(&self) -> Result<(), EngineError> {
        let r = &self.risk;
        if !(self.model.volatility > 0.0 && self.model.horizon_years > 0.0) {
            return Err(EngineError::Config(
                "model.volatility and model.horizon_years must be positive".into(),
            ));
        }
        if !self.model.risk_free_rate.is_finite() {
            return Err(EngineError::Config("model.risk_free_rate must be finite".into()));
        }
        if !(self.quoting.risk_aversion > 0.0 && self.quoting.arrival_decay > 0.0) {
            return Err(EngineError::Config(
                "quoting.risk_aversion and quoting.arrival_decay must be positive".into(),
            ));
        }
        for (name, value) in [
            ("risk.kelly_fraction", r.kelly_fraction),
            ("risk.max_position_pct", r.max_position_pct),
            ("risk.max_total_exposure_pct", r.max_total_exposure_pct),
            ("risk.stop_loss_pct", r.stop_loss_pct),
            ("risk.max_drawdown_pct", r.max_drawdown_pct),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Config(format!("{name} must be within [0, 1], got {value}")));
            }
        }
        if !(self.quoting.belief_volatility >= 0.0) {
            return Err(EngineError::Config("quoting.belief_volatility must be non-negative".into()));
        }
        if !(r.edge_threshold >= 0.0) {
            return Err(EngineError::Config("risk.edge_threshold must be non-negative".into()));
        }
        if !(r.min_tradeable_price < r.max_tradeable_price) {
            return Err(EngineError::Config(
                "risk.min_tradeable_price must be below risk.max_tradeable_price".into(),
            ));
        }
        if !(self.execution.tick_size > 0.0 && self.execution.tick_size < 1.0) {
            return Err(EngineError::Config("execution.tick_size must be within (0, 1)".into()));
        }
        Ok(())
    }
}
