//! Telegram delivery channel

use async_trait::async_trait;
use log::{info, warn};

use super::{ReminderSender, SendOutcome};
use crate::telegram::TelegramClient;

/// Sends reminders as Telegram chat messages. The target is the chat id the
/// reminder was created from.
pub struct TelegramSender {
    client: TelegramClient,
}

impl TelegramSender {
    pub fn new(client: TelegramClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReminderSender for TelegramSender {
    async fn send(&self, target: &str, message: &str) -> SendOutcome {
        let chat_id: i64 = match target.parse() {
            Ok(id) => id,
            Err(_) => {
                return SendOutcome::failure(format!("'{target}' is not a valid chat id"));
            }
        };

        match self.client.send_message(chat_id, message).await {
            Ok(message_id) => {
                info!("📱 Telegram reminder delivered to {chat_id} (message {message_id})");
                SendOutcome::ok()
            }
            Err(e) => {
                warn!("Telegram delivery to {chat_id} failed: {e:#}");
                SendOutcome::failure(e.to_string())
            }
        }
    }
}
