//! # Commands
//!
//! Inbound message handling: slash commands (`/start`, `/ayuda`,
//! `/mis_recordatorios`, `/cancelar`) and free-text reminder creation. All
//! replies are Spanish and shaped for Telegram Markdown.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.2.0: /cancelar command
//! - 1.1.0: Rate-limit gate in front of the parser
//! - 1.0.0: Initial implementation with core shared state

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use chrono_tz::Tz;
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::{truncate_message, Clock};
use crate::features::parser::{ParsedReminder, TemporalParser};
use crate::features::rate_limiting::RateLimiter;
use crate::features::reminders::{DeliveryChannel, NewReminder, Reminder};
use crate::storage::ReminderStore;
use crate::telegram::{TelegramClient, TelegramUpdate};

/// How many reminders a listing shows at most.
const MAX_LISTED: usize = 20;

const WELCOME_TEXT: &str = "👋 *¡Hola! Soy tu bot de recordatorios*\n\n\
Escribime mensajes como:\n\n\
• `recordame mañana a las 10 llamar al cliente`\n\
• `genera recordatorio para el 25/12 a las 12hs que diga: reunión importante`\n\
• `avisame el lunes 9hs revisar emails`\n\
• `recordatorio cada día a las 8 tomar vitaminas`\n\n\
📖 *Comandos:*\n\
• /mis\\_recordatorios - Ver tus recordatorios activos\n\
• /cancelar <id> - Cancelar un recordatorio\n\
• /ayuda - Ver esta ayuda\n\n\
¡Simplemente escribime y te ayudo! ⏰";

const NOT_A_REMINDER_TEXT: &str = "🤔 No entendí tu mensaje como un recordatorio.\n\n\
Probá con algo como:\n\
• _recordame mañana a las 10 llamar a Juan_\n\
• _genera recordatorio para el 25/12 a las 15hs que diga: reunión_";

/// Shared services for all inbound handling.
pub struct CommandContext {
    pub store: Arc<dyn ReminderStore>,
    pub parser: TemporalParser,
    pub telegram: TelegramClient,
    pub rate_limiter: RateLimiter,
    pub timezone: Tz,
    pub clock: Arc<dyn Clock>,
}

impl CommandContext {
    /// Entry point for every update the poll loop hands over.
    pub async fn handle_update(&self, update: &TelegramUpdate) -> Result<()> {
        let Some(message) = &update.message else {
            return Ok(());
        };
        if message.from.as_ref().is_some_and(|u| u.is_bot) {
            return Ok(());
        }
        let Some(text) = &message.text else {
            return Ok(());
        };

        let chat_id = message.chat.id;
        if text.starts_with('/') {
            self.handle_command(chat_id, text).await
        } else {
            self.handle_text(chat_id, text).await
        }
    }

    async fn handle_command(&self, chat_id: i64, text: &str) -> Result<()> {
        let (command, argument) = split_command(text);
        debug!("Command '{command}' from chat {chat_id}");

        match command.as_str() {
            "/start" | "/ayuda" | "/help" => {
                self.telegram.send_message(chat_id, WELCOME_TEXT).await?;
            }
            "/mis_recordatorios" => {
                let reminders = self
                    .store
                    .list_user_reminders(&chat_id.to_string(), MAX_LISTED)
                    .await?;
                let listing = format_reminder_list(&reminders, self.timezone);
                self.telegram
                    .send_message(chat_id, &truncate_message(&listing))
                    .await?;
            }
            "/cancelar" => {
                self.handle_cancel(chat_id, argument.as_deref()).await?;
            }
            _ => {
                self.telegram
                    .send_message(chat_id, "🤔 No conozco ese comando. Probá /ayuda")
                    .await?;
            }
        }
        Ok(())
    }

    async fn handle_cancel(&self, chat_id: i64, argument: Option<&str>) -> Result<()> {
        let Some(id) = argument.and_then(|raw| raw.trim_start_matches('#').parse::<i64>().ok())
        else {
            self.telegram
                .send_message(
                    chat_id,
                    "❌ Indicá el número del recordatorio: `/cancelar 3`.\n\
                     Usá /mis\\_recordatorios para ver los números.",
                )
                .await?;
            return Ok(());
        };

        if self.store.cancel_reminder(id, &chat_id.to_string()).await? {
            info!("🗑️ Reminder {id} cancelled by chat {chat_id}");
            self.telegram
                .send_message(chat_id, &format!("✅ Recordatorio #{id} cancelado."))
                .await?;
        } else {
            self.telegram
                .send_message(
                    chat_id,
                    &format!("❌ No encontré el recordatorio #{id} entre los tuyos."),
                )
                .await?;
        }
        Ok(())
    }

    /// Free text: rate-limit, parse, store, confirm.
    async fn handle_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let request_id = Uuid::new_v4();
        info!(
            "[{request_id}] 📥 Message from chat {chat_id}: '{}'",
            text.chars().take(100).collect::<String>()
        );

        if !self.rate_limiter.check_rate_limit(&chat_id.to_string()) {
            warn!("[{request_id}] 🚫 Rate limit exceeded for chat {chat_id}");
            self.telegram
                .send_message(chat_id, "⏳ Demasiados mensajes seguidos, esperá un momento.")
                .await?;
            return Ok(());
        }

        let now_utc = self.clock.now_utc();
        let now_local = now_utc.with_timezone(&self.timezone);
        let Some(parsed) = self.parser.parse(text, now_local) else {
            debug!("[{request_id}] No reminder intent detected");
            self.telegram.send_message(chat_id, NOT_A_REMINDER_TEXT).await?;
            return Ok(());
        };

        let fire_at = resolve_fire_instant(&parsed, self.timezone, now_utc);
        let reminder = self
            .store
            .add_reminder(NewReminder {
                owner_id: chat_id.to_string(),
                fire_at,
                recurrence: parsed.recurrence,
                message: parsed.message.clone(),
                channel: DeliveryChannel::Chat,
            })
            .await?;

        info!(
            "[{request_id}] ✅ Reminder {} created for chat {chat_id}, firing at {fire_at}",
            reminder.id
        );
        self.telegram
            .send_message(chat_id, &format_confirmation(&reminder, self.timezone))
            .await?;
        Ok(())
    }
}

/// Split "/cancelar 3" into the command (group suffix stripped) and the rest.
fn split_command(text: &str) -> (String, Option<String>) {
    let mut parts = text.split_whitespace();
    let command = parts
        .next()
        .unwrap_or("")
        .split('@') // "/start@mi_bot" in group chats
        .next()
        .unwrap_or("")
        .to_string();
    let argument = parts.next().map(String::from);
    (command, argument)
}

/// Combine the parsed date and time into the firing instant.
///
/// A past instant without recurrence moves to the same time tomorrow rather
/// than firing immediately; recurring reminders keep the past instant and let
/// the scheduler's catch-up handle it.
fn resolve_fire_instant(parsed: &ParsedReminder, tz: Tz, now_utc: DateTime<Utc>) -> DateTime<Utc> {
    let naive = parsed.date.and_time(parsed.time);
    let mut fire_at = localize(tz, naive).with_timezone(&Utc);
    if fire_at < now_utc && parsed.recurrence.is_none() {
        fire_at += Duration::days(1);
    }
    fire_at
}

/// Interpret a wall-clock datetime in `tz`. Ambiguous times (clock set back)
/// take the earlier instant; nonexistent times (clock set forward) shift one
/// hour ahead.
fn localize(tz: Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    use chrono::TimeZone;

    match tz.from_local_datetime(&naive).earliest() {
        Some(instant) => instant,
        None => match tz.from_local_datetime(&(naive + Duration::hours(1))).earliest() {
            Some(instant) => instant,
            None => tz.from_utc_datetime(&naive),
        },
    }
}

fn format_confirmation(reminder: &Reminder, tz: Tz) -> String {
    let local = reminder.fire_at.with_timezone(&tz);
    let mut text = format!(
        "✅ *Recordatorio creado*\n\n\
         📅 Fecha: *{}*\n\
         🕐 Hora: *{}*\n\
         📝 Mensaje: _{}_",
        local.format("%d/%m/%Y"),
        local.format("%H:%M"),
        reminder.message
    );
    if let Some(recurrence) = &reminder.recurrence {
        text.push_str(&format!("\n🔁 Repetición: *{}*", recurrence.label()));
    }
    text.push_str(&format!("\n\n_ID: #{}_", reminder.id));
    text
}

fn format_reminder_list(reminders: &[Reminder], tz: Tz) -> String {
    if reminders.is_empty() {
        return "📭 No tienes recordatorios activos.".to_string();
    }

    let mut lines = vec!["📋 *Tus recordatorios activos:*".to_string(), String::new()];
    for (i, reminder) in reminders.iter().enumerate() {
        let local = reminder.fire_at.with_timezone(&tz);
        let icon = if reminder.recurrence.is_some() {
            "🔁"
        } else {
            "⏰"
        };
        lines.push(format!(
            "{}. {} *{}* (#{})\n   _{}_",
            i + 1,
            icon,
            local.format("%d/%m/%Y %H:%M"),
            reminder.id,
            reminder.message
        ));
    }
    lines.push(String::new());
    lines.push("_Usá /cancelar <id> para cancelar uno._".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::recurrence::Recurrence;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn tz() -> Tz {
        "America/Argentina/Buenos_Aires".parse().unwrap()
    }

    fn reminder(recurrence: Option<Recurrence>) -> Reminder {
        Reminder {
            id: 3,
            owner_id: "123456".to_string(),
            // 10:00 local is 13:00 UTC in Buenos Aires (UTC-3)
            fire_at: Utc.with_ymd_and_hms(2024, 3, 11, 13, 0, 0).unwrap(),
            recurrence,
            message: "llamar a juan".to_string(),
            channel: DeliveryChannel::Chat,
            active: true,
            created_at: Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("/start"), ("/start".to_string(), None));
        assert_eq!(
            split_command("/cancelar 3"),
            ("/cancelar".to_string(), Some("3".to_string()))
        );
        assert_eq!(
            split_command("/start@recordatorio_bot"),
            ("/start".to_string(), None)
        );
    }

    #[test]
    fn test_resolve_fire_instant_future_unchanged() {
        let parsed = ParsedReminder {
            date: NaiveDate::from_ymd_opt(2024, 3, 11).unwrap(),
            time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            recurrence: None,
            message: "llamar a juan".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap();

        let fire_at = resolve_fire_instant(&parsed, tz(), now);
        // 10:00 Buenos Aires = 13:00 UTC
        assert_eq!(fire_at, Utc.with_ymd_and_hms(2024, 3, 11, 13, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_fire_instant_past_one_shot_moves_to_tomorrow() {
        let parsed = ParsedReminder {
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            recurrence: None,
            message: "llamar a juan".to_string(),
        };
        // 12:00 local, well past 08:00
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();

        let fire_at = resolve_fire_instant(&parsed, tz(), now);
        assert_eq!(fire_at, Utc.with_ymd_and_hms(2024, 3, 11, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_fire_instant_past_recurring_left_for_catchup() {
        let parsed = ParsedReminder {
            date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            recurrence: Some(Recurrence::Daily),
            message: "tomar vitaminas".to_string(),
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 15, 0, 0).unwrap();

        let fire_at = resolve_fire_instant(&parsed, tz(), now);
        assert_eq!(fire_at, Utc.with_ymd_and_hms(2024, 3, 10, 11, 0, 0).unwrap());
    }

    #[test]
    fn test_confirmation_shows_local_time_and_id() {
        let text = format_confirmation(&reminder(None), tz());
        assert!(text.contains("11/03/2024"));
        assert!(text.contains("10:00"));
        assert!(text.contains("llamar a juan"));
        assert!(text.contains("#3"));
        assert!(!text.contains("Repetición"));
    }

    #[test]
    fn test_confirmation_mentions_recurrence() {
        let text = format_confirmation(&reminder(Some(Recurrence::Daily)), tz());
        assert!(text.contains("Repetición"));
        assert!(text.contains("cada día"));
    }

    #[test]
    fn test_list_formatting() {
        let listing = format_reminder_list(
            &[reminder(None), reminder(Some(Recurrence::Weekly))],
            tz(),
        );
        assert!(listing.contains("1. ⏰"));
        assert!(listing.contains("2. 🔁"));
        assert!(listing.contains("11/03/2024 10:00"));
        assert!(listing.contains("/cancelar"));
    }

    #[test]
    fn test_empty_list_message() {
        let listing = format_reminder_list(&[], tz());
        assert!(listing.contains("No tienes recordatorios"));
    }
}
