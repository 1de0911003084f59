//! Unified error types for the funding bot.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::exchange::types::Currency;

/// Unified error type for the funding bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Exchange transport or API error.
    #[error("exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    /// Idle-series persistence error.
    #[error("idle series store error: {0}")]
    Store(#[from] StoreError),

    /// Alert delivery error.
    #[error("alert error: {0}")]
    Alert(#[from] AlertError),

    /// Wallet/offer accounting no longer adds up; never clamped away.
    #[error("accounting anomaly for {currency}: idle balance is {idle}")]
    NegativeIdleBalance {
        /// Affected currency.
        currency: Currency,
        /// The negative idle figure that was computed.
        idle: Decimal,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Exchange transport and API errors.
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Transport-level HTTP failure.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response from the exchange.
    #[error("{endpoint} returned http {status}: {body}")]
    Status {
        /// Endpoint path that failed.
        endpoint: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// Response shape did not match the documented payload.
    #[error("failed to parse {endpoint} response: {reason}")]
    Parse {
        /// Endpoint path whose payload failed to parse.
        endpoint: String,
        /// What was wrong.
        reason: String,
    },

    /// The exchange acknowledged the request but reported a failure status.
    #[error("{action} failed with exchange status: {status}")]
    Action {
        /// The action that was attempted.
        action: String,
        /// Status or message reported by the exchange.
        status: String,
    },

    /// Request signing failed.
    #[error("failed to sign request: {0}")]
    Signing(String),
}

/// Idle-series store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying storage unreachable or unreadable.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored series exists but cannot be decoded.
    #[error("malformed idle series: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Alert sink errors.
#[derive(Error, Debug)]
pub enum AlertError {
    /// Transport-level HTTP failure.
    #[error("http error delivering alert: {0}")]
    Http(#[from] reqwest::Error),

    /// Webhook answered with a non-2xx status.
    #[error("alert delivery failed with http {status}")]
    Delivery {
        /// HTTP status code.
        status: u16,
    },

    /// Alerts are enabled but no webhook URL is configured.
    #[error("alerts enabled but no webhook url configured")]
    MissingWebhook,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;
