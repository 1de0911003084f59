//! Operator alerting.

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::AlertError;

/// Channel for operator-facing messages.
///
/// Fire-and-forget from the caller's perspective, but delivery failures
/// propagate so a tick never silently loses its alert.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver one message.
    async fn publish(&self, message: &str) -> Result<(), AlertError>;
}

/// Sink that POSTs alerts to a configured webhook.
#[derive(Debug, Clone)]
pub struct WebhookAlertSink {
    http: reqwest::Client,
    url: Option<String>,
    enabled: bool,
}

impl WebhookAlertSink {
    /// Create a sink.
    pub fn new(url: Option<String>, enabled: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            url,
            enabled,
        }
    }

    /// Build the sink from configuration.
    pub fn from_config(config: &Config) -> Result<Self, AlertError> {
        if config.enable_alerts && config.alerts_webhook_url.is_none() {
            return Err(AlertError::MissingWebhook);
        }
        Ok(Self::new(
            config.alerts_webhook_url.clone(),
            config.enable_alerts,
        ))
    }
}

#[async_trait]
impl AlertSink for WebhookAlertSink {
    async fn publish(&self, message: &str) -> Result<(), AlertError> {
        if !self.enabled {
            debug!(alert = message, "alerts disabled, dropping");
            return Ok(());
        }

        let url = self.url.as_ref().ok_or(AlertError::MissingWebhook)?;
        let body = json!({ "text": format!("bitfinex funding bot alert:\n\n{message}") });

        let response = self.http.post(url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(AlertError::Delivery {
                status: response.status().as_u16(),
            });
        }

        info!(alert = message, "alert sent");
        Ok(())
    }
}

/// Sink that records messages in memory, for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<String>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages published so far.
    pub async fn published(&self) -> Vec<String> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl AlertSink for MemorySink {
    async fn publish(&self, message: &str) -> Result<(), AlertError> {
        self.messages.lock().await.push(message.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_sink_drops_without_url() {
        let sink = WebhookAlertSink::new(None, false);
        assert!(sink.publish("something is idle").await.is_ok());
    }

    #[tokio::test]
    async fn enabled_sink_without_url_errors() {
        let sink = WebhookAlertSink::new(None, true);
        let result = sink.publish("something is idle").await;
        assert!(matches!(result, Err(AlertError::MissingWebhook)));
    }

    #[tokio::test]
    async fn memory_sink_records_messages() {
        let sink = MemorySink::new();
        sink.publish("first").await.unwrap();
        sink.publish("second").await.unwrap();
        assert_eq!(sink.published().await, vec!["first", "second"]);
    }
}
