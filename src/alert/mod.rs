mod email;
mod webhook;

use std::sync::Arc;
use async_trait::async_trait;
use tracing::{info, warn};
use crate::compliance::AlertMessage;
use crate::config::AlertsConfig;
use crate::error::{NotificationError, Result};

pub use email::EmailChannel;
pub use webhook::WebhookChannel;

#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotificationError>;
}

/// Outcome of delivering one alert over every configured channel.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub delivered: Vec<String>,
    pub failures: Vec<NotificationError>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.delivered.len() + self.failures.len()
    }

    pub fn all_failed(&self) -> bool {
        self.delivered.is_empty() && !self.failures.is_empty()
    }
}

/// Fans an alert out to every channel. A failing channel is reported and
/// never stops delivery on the others.
#[derive(Clone, Default)]
pub struct AlertDispatcher {
    channels: Vec<Arc<dyn AlertChannel>>,
}

impl AlertDispatcher {
    pub fn new(channels: Vec<Arc<dyn AlertChannel>>) -> Self {
        Self { channels }
    }

    pub fn from_config(config: &AlertsConfig) -> Result<Self> {
        let mut channels: Vec<Arc<dyn AlertChannel>> = Vec::new();
        if let Some(webhook) = &config.webhook {
            channels.push(Arc::new(WebhookChannel::from_config(webhook)?));
        }
        if let Some(email) = &config.email {
            channels.push(Arc::new(EmailChannel::from_config(email)?));
        }
        Ok(Self::new(channels))
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub async fn dispatch(&self, message: &AlertMessage) -> DispatchReport {
        let mut report = DispatchReport::default();

        if self.channels.is_empty() {
            warn!(unit = %message.unit, "No alert channels configured; alert not delivered");
            return report;
        }

        for channel in &self.channels {
            match channel.send(message).await {
                Ok(()) => {
                    info!(unit = %message.unit, channel = channel.name(), "Alert sent");
                    report.delivered.push(channel.name().to_string());
                }
                Err(e) => {
                    warn!(unit = %message.unit, channel = channel.name(), "Alert delivery failed: {}", e.reason);
                    report.failures.push(e);
                }
            }
        }

        report
    }
}
