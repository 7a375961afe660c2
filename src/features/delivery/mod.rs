//! # Feature: Delivery
//!
//! Channel-specific senders and the router that fans a reminder out to the
//! channels its configuration selects. Senders never fail out-of-band: every
//! attempt collapses into a `SendOutcome` the scheduler can log.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.3.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Email channel via SMTP
//! - 1.0.0: Initial release with the Telegram channel

pub mod email;
pub mod telegram;

pub use email::EmailSender;
pub use telegram::TelegramSender;

use async_trait::async_trait;
use std::sync::Arc;

use crate::features::reminders::{DeliveryChannel, Reminder};

/// Result of one send attempt on one channel.
#[derive(Debug, Clone)]
pub struct SendOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SendOutcome {
    pub fn ok() -> Self {
        SendOutcome {
            success: true,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        SendOutcome {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// One delivery transport. `target` is interpreted per channel: a Telegram
/// chat id for chat, a recipient address for email.
#[async_trait]
pub trait ReminderSender: Send + Sync {
    async fn send(&self, target: &str, message: &str) -> SendOutcome;
}

/// Routes a reminder to the sender(s) its channel selects.
pub struct DeliveryRouter {
    chat: Arc<dyn ReminderSender>,
    email: Option<Arc<dyn ReminderSender>>,
}

impl DeliveryRouter {
    pub fn new(chat: Arc<dyn ReminderSender>, email: Option<Arc<dyn ReminderSender>>) -> Self {
        Self { chat, email }
    }

    /// Deliver `reminder` on its configured channel(s).
    ///
    /// `Both` counts as sent only when every leg succeeded; leg errors are
    /// joined so the delivery record keeps the full picture.
    pub async fn dispatch(&self, reminder: &Reminder) -> SendOutcome {
        let text = format_reminder(&reminder.message);
        match reminder.channel {
            DeliveryChannel::Chat => self.chat.send(&reminder.owner_id, &text).await,
            DeliveryChannel::Email => self.send_email(&reminder.owner_id, &text).await,
            DeliveryChannel::Both => {
                let chat = self.chat.send(&reminder.owner_id, &text).await;
                let email = self.send_email(&reminder.owner_id, &text).await;
                combine(&[("chat", chat), ("email", email)])
            }
        }
    }

    async fn send_email(&self, target: &str, text: &str) -> SendOutcome {
        match &self.email {
            Some(sender) => sender.send(target, text).await,
            None => SendOutcome::failure("email channel not configured"),
        }
    }
}

/// The text actually delivered to the owner.
fn format_reminder(message: &str) -> String {
    format!("⏰ *RECORDATORIO*\n\n{message}")
}

fn combine(legs: &[(&str, SendOutcome)]) -> SendOutcome {
    let errors: Vec<String> = legs
        .iter()
        .filter(|(_, outcome)| !outcome.success)
        .map(|(name, outcome)| {
            format!(
                "{name}: {}",
                outcome.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    if errors.is_empty() {
        SendOutcome::ok()
    } else {
        SendOutcome::failure(errors.join("; "))
    }
}
