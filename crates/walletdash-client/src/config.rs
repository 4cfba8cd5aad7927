//! Client configuration
//!
//! Layered like the rest of the workspace: built-in defaults, then an
//! optional config file, then `WALLETDASH__*` environment variables
//! (`.env` is honoured). Nested keys use `__`, e.g.
//! `WALLETDASH__DASHBOARD_QUEUE__MIN_DELAY=2s`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use walletdash_queue::QueueConfig;

use crate::error::{ClientError, ClientResult};
use crate::SOLANA_CHAIN_INDEX;

/// Settings shared by the dashboard and cross-chain loaders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST backend
    pub base_url: String,
    /// Wallet whose portfolio is displayed
    pub wallet_address: String,
    /// Chain index used for portfolio queries
    pub chain_index: String,
    /// Per-request HTTP timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Transactions requested from the history endpoint
    pub transaction_limit: u32,
    /// Pause before the first request of a load cycle
    #[serde(with = "humantime_serde")]
    pub warmup_delay: Duration,
    /// Interval between automatic dashboard refreshes
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
    /// Queue settings for the portfolio dashboard
    pub dashboard_queue: QueueConfig,
    /// Queue settings for the cross-chain wizard
    pub cross_chain_queue: QueueConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            wallet_address: "52C9T2T7JRojtxumYnYZhyUmrN7kqzvCLc4Ksvjk7TxD".to_string(),
            chain_index: SOLANA_CHAIN_INDEX.to_string(),
            timeout: Duration::from_secs(30),
            transaction_limit: 20,
            warmup_delay: Duration::from_secs(1),
            refresh_interval: Duration::from_secs(300),
            dashboard_queue: QueueConfig::dashboard(),
            cross_chain_queue: QueueConfig::cross_chain(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(config_path: Option<&str>) -> ClientResult<Self> {
        // Load .env file if present
        let _ = dotenvy::dotenv();

        let mut builder = Self::defaults()?;

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        Self::build(builder.add_source(Self::environment()))
    }

    /// Builder seeded with [`ClientConfig::default`], so a partial override
    /// of a nested table keeps the rest of its preset
    fn defaults() -> ClientResult<ConfigBuilder<DefaultState>> {
        let defaults = config::Config::try_from(&Self::default())
            .map_err(|e| ClientError::config(e.to_string()))?;
        Ok(config::Config::builder().add_source(defaults))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix("WALLETDASH")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> ClientResult<Self> {
        let config: Self = builder
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| ClientError::config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the loaders cannot work with
    pub fn validate(&self) -> ClientResult<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ClientError::config(format!(
                "base_url must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }
        if self.wallet_address.trim().is_empty() {
            return Err(ClientError::config("wallet_address must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(ClientError::config("timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dashboard_queue.min_delay, Duration::from_secs(3));
        assert_eq!(config.cross_chain_queue.min_delay, Duration::from_secs(5));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = ClientConfig::default();
        config.base_url = "localhost:3000".to_string();
        assert!(matches!(config.validate(), Err(ClientError::Config(_))));

        let mut config = ClientConfig::default();
        config.wallet_address = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_root_trims_slash() {
        let config = ClientConfig {
            base_url: "https://dash.example.com/".to_string(),
            ..ClientConfig::default()
        };
        assert_eq!(config.api_root(), "https://dash.example.com");
    }

    #[test]
    fn test_partial_document() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"base_url":"https://api.example.com","warmup_delay":"250ms"}"#,
        )
        .unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.warmup_delay, Duration::from_millis(250));
        assert_eq!(config.dashboard_queue, QueueConfig::dashboard());
    }

    #[test]
    fn test_env_override_keeps_dashboard_preset() {
        let vars = config::Map::from([(
            "WALLETDASH__DASHBOARD_QUEUE__MIN_DELAY".to_string(),
            "2s".to_string(),
        )]);
        let builder = ClientConfig::defaults()
            .unwrap()
            .add_source(ClientConfig::environment().source(Some(vars)));
        let config = ClientConfig::build(builder).unwrap();

        assert_eq!(config.dashboard_queue.min_delay, Duration::from_secs(2));
        assert_eq!(config.dashboard_queue.initial_delay, Duration::from_secs(3));
        assert_eq!(config.cross_chain_queue, QueueConfig::cross_chain());
    }

    #[test]
    fn test_file_override_keeps_dashboard_preset() {
        let file = config::File::from_str(
            "base_url = \"https://api.example.com\"\n\n[dashboard_queue]\nmax_retries = 5\n",
            config::FileFormat::Toml,
        );
        let config = ClientConfig::build(ClientConfig::defaults().unwrap().add_source(file)).unwrap();

        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.dashboard_queue.max_retries, 5);
        assert_eq!(config.dashboard_queue.min_delay, Duration::from_secs(3));
        assert_eq!(config.dashboard_queue.initial_delay, Duration::from_secs(3));
        assert_eq!(config.warmup_delay, Duration::from_secs(1));
    }
}
