//! SMTP delivery for booking notices.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport};
use tracing::debug;

use super::BaseNotifier;
use crate::config::SmtpConfig;

const EXPIRY_SUBJECT: &str = "Your booking has expired";

/// Sends each notice as a plain-text email through an SMTP relay.
#[derive(Clone)]
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .with_context(|| format!("Invalid SMTP sender address: {}", config.from))?;

        let transport = SmtpTransport::relay(&config.host)
            .with_context(|| format!("Invalid SMTP relay: {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self { transport, from })
    }
}

#[async_trait]
impl BaseNotifier for SmtpNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        let email = build_email(&self.from, recipient, message)?;
        let transport = self.transport.clone();

        // lettre's SmtpTransport blocks on network I/O
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| anyhow!("Email task failed: {}", e))?
            .context("Failed to send email")?;

        debug!(recipient = %recipient, "Email sent");
        Ok(())
    }
}

fn build_email(from: &Mailbox, recipient: &str, body: &str) -> Result<Message> {
    let to: Mailbox = recipient
        .parse()
        .with_context(|| format!("Invalid recipient address: {}", recipient))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(EXPIRY_SUBJECT)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .context("Failed to build email")
}
