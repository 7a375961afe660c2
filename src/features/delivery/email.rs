//! Email delivery channel
//!
//! All emails leave from the bot's centralized SMTP account; the operator
//! address (when configured) rides along as Reply-To and CC so replies reach
//! a human instead of the noreply box.

use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use log::{info, warn};

use super::{ReminderSender, SendOutcome};
use crate::core::SmtpConfig;

const SUBJECT: &str = "⏰ Recordatorio";

/// Sends reminders by email. The target is the recipient address.
pub struct EmailSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    notify: Option<Mailbox>,
}

impl EmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .with_context(|| format!("invalid SMTP relay host {}", config.host))?
            .port(config.port)
            .credentials(Credentials::new(
                config.user.clone(),
                config.password.clone(),
            ))
            .build();

        let from: Mailbox = format!("{} <{}>", config.from_name, config.user)
            .parse()
            .with_context(|| format!("invalid SMTP sender address {}", config.user))?;

        let notify = match &config.notify_email {
            Some(address) => Some(
                address
                    .parse()
                    .with_context(|| format!("invalid NOTIFY_EMAIL address {address}"))?,
            ),
            None => None,
        };

        Ok(Self {
            transport,
            from,
            notify,
        })
    }

    fn build_message(&self, target: &str, body: &str) -> Result<Message> {
        let to: Mailbox = target
            .parse()
            .with_context(|| format!("'{target}' is not a valid email address"))?;

        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(SUBJECT)
            .header(ContentType::TEXT_PLAIN);

        if let Some(notify) = &self.notify {
            builder = builder.reply_to(notify.clone()).cc(notify.clone());
        }

        builder
            .body(body.to_string())
            .context("failed to build email message")
    }
}

#[async_trait]
impl ReminderSender for EmailSender {
    async fn send(&self, target: &str, message: &str) -> SendOutcome {
        let email = match self.build_message(target, message) {
            Ok(email) => email,
            Err(e) => return SendOutcome::failure(e.to_string()),
        };

        match self.transport.send(email).await {
            Ok(_) => {
                info!("📧 Email reminder delivered to {target}");
                SendOutcome::ok()
            }
            Err(e) => {
                warn!("Email delivery to {target} failed: {e}");
                SendOutcome::failure(e.to_string())
            }
        }
    }
}
