use std::time::Duration;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;
use crate::compliance::AlertMessage;
use crate::config::WebhookConfig;
use crate::error::{MigReconError, NotificationError, Result};
use super::AlertChannel;

const CHANNEL: &str = "webhook";

/// Chat-style incoming webhook. Posts `{"text": ...}` and treats any
/// non-2xx response as a failed delivery.
pub struct WebhookChannel {
    client: reqwest::Client,
    url: String,
}

impl WebhookChannel {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MigReconError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &WebhookConfig) -> Result<Self> {
        Self::new(config.resolve_url()?, Duration::from_secs(config.timeout_secs))
    }

    pub fn payload(message: &AlertMessage) -> serde_json::Value {
        json!({ "text": format!(":rotating_light: {}", message.text()) })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotificationError> {
        debug!(unit = %message.unit, "Posting webhook alert");

        let response = self.client
            .post(&self.url)
            .json(&Self::payload(message))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotificationError::new(CHANNEL, "request timed out")
                } else {
                    NotificationError::new(CHANNEL, e)
                }
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            let body = body.trim();
            let reason = if body.is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body)
            };
            Err(NotificationError::new(CHANNEL, reason))
        }
    }
}
