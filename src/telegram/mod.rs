//! # Telegram Bot API client
//!
//! Thin wrapper over the HTTP Bot API: long-polled updates in, messages out.
//! Only the handful of fields the bot actually uses are modeled.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use anyhow::{anyhow, Context, Result};
use log::debug;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Seconds the server holds a getUpdates long poll open.
pub const POLL_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUser {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub chat: TelegramChat,
    pub from: Option<TelegramUser>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramUpdate {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

/// Bot API envelope: `ok` plus either `result` or `description`.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

impl<T> ApiResponse<T> {
    fn into_result(self, method: &str) -> Result<T> {
        if self.ok {
            self.result
                .ok_or_else(|| anyhow!("Telegram {method} returned ok without a result"))
        } else {
            Err(anyhow!(
                "Telegram {method} failed: {}",
                self.description.unwrap_or_else(|| "unknown error".to_string())
            ))
        }
    }
}

#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
}

impl TelegramClient {
    pub fn new(token: &str) -> Result<Self> {
        // Client timeout must outlive the long-poll window
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(POLL_TIMEOUT_SECS + 10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: format!("https://api.telegram.org/bot{token}"),
        })
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(&self, offset: i64) -> Result<Vec<TelegramUpdate>> {
        let response: ApiResponse<Vec<TelegramUpdate>> = self
            .http
            .post(format!("{}/getUpdates", self.base_url))
            .json(&json!({
                "offset": offset,
                "timeout": POLL_TIMEOUT_SECS,
                "allowed_updates": ["message"],
            }))
            .send()
            .await
            .context("getUpdates request failed")?
            .json()
            .await
            .context("getUpdates returned invalid JSON")?;

        let updates = response.into_result("getUpdates")?;
        if !updates.is_empty() {
            debug!("Received {} update(s)", updates.len());
        }
        Ok(updates)
    }

    /// Send a Markdown message; returns the new message id.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<i64> {
        let response: ApiResponse<IncomingMessage> = self
            .http
            .post(format!("{}/sendMessage", self.base_url))
            .json(&json!({
                "chat_id": chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await
            .context("sendMessage request failed")?
            .json()
            .await
            .context("sendMessage returned invalid JSON")?;

        Ok(response.into_result("sendMessage")?.message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_deserialization() {
        let raw = r#"{
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "message_id": 42,
                    "chat": {"id": 123456, "type": "private"},
                    "from": {"id": 123456, "is_bot": false, "first_name": "Ana"},
                    "text": "recordame mañana a las 10 llamar a Juan"
                }
            }]
        }"#;

        let parsed: ApiResponse<Vec<TelegramUpdate>> = serde_json::from_str(raw).unwrap();
        let updates = parsed.into_result("getUpdates").unwrap();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].update_id, 7);

        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, 123456);
        assert_eq!(message.from.as_ref().unwrap().first_name, "Ana");
        assert!(message.text.as_ref().unwrap().contains("recordame"));
    }

    #[test]
    fn test_non_text_update_deserializes() {
        // Sticker/photo messages arrive without text; must not fail
        let raw = r#"{
            "update_id": 8,
            "message": {
                "message_id": 43,
                "chat": {"id": 9},
                "from": {"id": 9, "is_bot": false, "first_name": "Ana"}
            }
        }"#;
        let update: TelegramUpdate = serde_json::from_str(raw).unwrap();
        assert!(update.message.unwrap().text.is_none());
    }

    #[test]
    fn test_api_error_surfaces_description() {
        let raw = r#"{"ok": false, "description": "Unauthorized"}"#;
        let parsed: ApiResponse<Vec<TelegramUpdate>> = serde_json::from_str(raw).unwrap();
        let err = parsed.into_result("getUpdates").unwrap_err();
        assert!(err.to_string().contains("Unauthorized"));
    }
}
