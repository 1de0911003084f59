//! Application configuration loaded from environment variables.

use serde::Deserialize;

use crate::exchange::types::Currency;
use crate::policy::CurrencyPolicy;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Bitfinex Credentials ===
    /// API key.
    #[serde(default)]
    pub bitfinex_api_key: String,

    /// API secret.
    #[serde(default)]
    pub bitfinex_api_secret: String,

    // === Endpoints ===
    /// Public REST base URL.
    #[serde(default = "default_public_url")]
    pub bitfinex_public_url: String,

    /// Authenticated REST base URL.
    #[serde(default = "default_auth_url")]
    pub bitfinex_auth_url: String,

    // === Funding Parameters ===
    /// Currencies to manage, comma separated (e.g. `USD,EUR`).
    #[serde(default = "default_currencies")]
    pub currencies: Vec<Currency>,

    // === Persistence ===
    /// Directory holding the idle-series files.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    // === Alerting ===
    /// Webhook URL alerts are POSTed to.
    #[serde(default)]
    pub alerts_webhook_url: Option<String>,

    /// Whether alerts are delivered (disabled alerts are logged and dropped).
    #[serde(default)]
    pub enable_alerts: bool,

    // === Operation Modes ===
    /// Dry-run mode: read everything, log intended actions, mutate nothing.
    #[serde(default = "default_true")]
    pub dry_run: bool,

    /// Seconds between ticks in loop mode.
    #[serde(default = "default_tick_interval")]
    pub tick_interval_secs: u64,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// HTTP client timeout in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_public_url() -> String {
    "https://api-pub.bitfinex.com".to_string()
}

fn default_auth_url() -> String {
    "https://api.bitfinex.com".to_string()
}

fn default_currencies() -> Vec<Currency> {
    vec![Currency::Usd]
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tick_interval() -> u64 {
    3600
}

fn default_port() -> u16 {
    8080
}

fn default_http_timeout() -> u64 {
    10_000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.bitfinex_api_key.is_empty() {
            return Err("BITFINEX_API_KEY is required".to_string());
        }

        if self.bitfinex_api_secret.is_empty() {
            return Err("BITFINEX_API_SECRET is required".to_string());
        }

        if self.currencies.is_empty() {
            return Err("CURRENCIES must name at least one currency".to_string());
        }

        if self.enable_alerts && self.alerts_webhook_url.is_none() {
            return Err("ENABLE_ALERTS requires ALERTS_WEBHOOK_URL".to_string());
        }

        if self.tick_interval_secs == 0 {
            return Err("TICK_INTERVAL_SECS must be positive".to_string());
        }

        Ok(())
    }

    /// Built-in policies for the configured currencies.
    pub fn policies(&self) -> Vec<CurrencyPolicy> {
        self.currencies
            .iter()
            .map(|c| CurrencyPolicy::builtin(*c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        Config {
            bitfinex_api_key: "key".to_string(),
            bitfinex_api_secret: "secret".to_string(),
            bitfinex_public_url: default_public_url(),
            bitfinex_auth_url: default_auth_url(),
            currencies: vec![Currency::Usd, Currency::Eur],
            data_dir: default_data_dir(),
            alerts_webhook_url: None,
            enable_alerts: false,
            dry_run: true,
            tick_interval_secs: default_tick_interval(),
            port: default_port(),
            http_timeout_ms: default_http_timeout(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_currencies(), vec![Currency::Usd]);
        assert_eq!(default_tick_interval(), 3600);
        assert!(default_true());
        assert!(default_public_url().starts_with("https://"));
    }

    #[test]
    fn valid_config_passes() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        let config = Config {
            bitfinex_api_key: String::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());

        let config = Config {
            bitfinex_api_secret: String::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_alerts_without_webhook() {
        let config = Config {
            enable_alerts: true,
            alerts_webhook_url: None,
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_currency_list() {
        let config = Config {
            currencies: Vec::new(),
            ..valid_config()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn policies_follow_configured_currencies() {
        let policies = valid_config().policies();
        assert_eq!(policies.len(), 2);
        assert_eq!(policies[0].currency, Currency::Usd);
        assert_eq!(policies[1].currency, Currency::Eur);
    }
}
