use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;
use crate::compliance::AlertMessage;
use crate::config::EmailConfig;
use crate::error::{MigReconError, NotificationError, Result};
use super::AlertChannel;

const CHANNEL: &str = "email";

/// Plain-text alert mail over SMTP, one message per alert to every recipient.
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Vec<Mailbox>,
    subject: String,
}

impl EmailChannel {
    /// Addresses and credentials are checked here so a bad config fails at
    /// startup instead of on the first alert.
    pub fn from_config(config: &EmailConfig) -> Result<Self> {
        let from = parse_mailbox(&config.from)?;
        let to = config.to.iter().map(|addr| parse_mailbox(addr)).collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(MigReconError::Config("email alerts need at least one recipient".into()));
        }

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
                .map_err(|e| MigReconError::Config(format!("invalid smtp host '{}': {}", config.smtp_host, e)))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.smtp_host)
        };
        builder = builder.port(config.smtp_port);

        if let Some(user) = &config.username {
            let password = config.resolve_password()?.unwrap_or_default();
            builder = builder.credentials(Credentials::new(user.clone(), password));
        }

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            subject: config.subject.clone(),
        })
    }

    pub fn build_message(&self, message: &AlertMessage) -> std::result::Result<Message, NotificationError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(self.subject.clone())
            .header(ContentType::TEXT_PLAIN);
        for rcpt in &self.to {
            builder = builder.to(rcpt.clone());
        }
        builder
            .body(message.text().to_string())
            .map_err(|e| NotificationError::new(CHANNEL, e))
    }
}

fn parse_mailbox(addr: &str) -> Result<Mailbox> {
    addr.parse::<Mailbox>()
        .map_err(|e| MigReconError::Config(format!("invalid email address '{}': {}", addr, e)))
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        CHANNEL
    }

    async fn send(&self, message: &AlertMessage) -> std::result::Result<(), NotificationError> {
        let email = self.build_message(message)?;
        debug!(unit = %message.unit, recipients = self.to.len(), "Sending email alert");

        self.transport
            .send(email)
            .await
            .map(|_| ())
            .map_err(|e| NotificationError::new(CHANNEL, e))
    }
}
