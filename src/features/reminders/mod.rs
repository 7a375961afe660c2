//! # Feature: Reminders
//!
//! Reminder records, the due-set resolver and the dispatch scheduler that
//! delivers reminders on time without double-firing.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 2.0.0: Delivery log with per-occurrence dedup, optimistic advancement
//! - 1.0.0: Initial release with the periodic dispatch loop

pub mod resolver;
pub mod scheduler;

pub use resolver::{DueReminder, DueResolver};
pub use scheduler::ReminderScheduler;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::features::recurrence::Recurrence;

/// Delivery channel selector for a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryChannel {
    /// Telegram chat message
    Chat,
    /// Email to the owner address
    Email,
    /// Both channels; delivery counts as sent only if every leg succeeds
    Both,
}

impl std::fmt::Display for DeliveryChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryChannel::Chat => write!(f, "chat"),
            DeliveryChannel::Email => write!(f, "email"),
            DeliveryChannel::Both => write!(f, "both"),
        }
    }
}

impl std::str::FromStr for DeliveryChannel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "chat" | "telegram" => Ok(DeliveryChannel::Chat),
            "email" => Ok(DeliveryChannel::Email),
            "both" | "ambos" => Ok(DeliveryChannel::Both),
            _ => Err(anyhow::anyhow!("Invalid delivery channel: {}", s)),
        }
    }
}

/// A scheduled reminder.
///
/// While `active` is true, `fire_at` is the next unfired occurrence. After a
/// firing the scheduler either advances `fire_at` (recurring) or clears
/// `active` (one-shot, or explicitly cancelled).
#[derive(Debug, Clone)]
pub struct Reminder {
    /// Unique reminder identifier
    pub id: i64,

    /// Delivery target: a Telegram chat id, or an email address for
    /// email-channel reminders
    pub owner_id: String,

    /// Next scheduled firing instant
    pub fire_at: DateTime<Utc>,

    /// Repetition pattern; None fires once and retires
    pub recurrence: Option<Recurrence>,

    /// Payload text delivered to the owner
    pub message: String,

    /// Where the reminder is delivered
    pub channel: DeliveryChannel,

    /// False once a one-shot reminder fired or a recurring one was cancelled
    pub active: bool,

    /// When the reminder was created
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a reminder; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub owner_id: String,
    pub fire_at: DateTime<Utc>,
    pub recurrence: Option<Recurrence>,
    pub message: String,
    pub channel: DeliveryChannel,
}

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Failed,
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Sent => write!(f, "sent"),
            DeliveryOutcome::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for DeliveryOutcome {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sent" => Ok(DeliveryOutcome::Sent),
            "failed" => Ok(DeliveryOutcome::Failed),
            _ => Err(anyhow::anyhow!("Invalid delivery outcome: {}", s)),
        }
    }
}

/// One row of the append-only delivery log.
///
/// `scheduled_for` carries the occurrence's `fire_at` so a `sent` record is
/// unambiguously tied to one occurrence; records are never updated or
/// deleted. At most one `sent` record exists per (reminder, occurrence) —
/// that is the dedup guarantee the resolver enforces.
#[derive(Debug, Clone)]
pub struct DeliveryRecord {
    pub id: i64,
    pub reminder_id: i64,
    /// When the attempt actually happened
    pub fired_at: DateTime<Utc>,
    /// The occurrence this attempt belongs to
    pub scheduled_for: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
    pub error_detail: Option<String>,
}

/// Fields for appending to the delivery log; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewDeliveryRecord {
    pub reminder_id: i64,
    pub fired_at: DateTime<Utc>,
    pub scheduled_for: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
    pub error_detail: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_display() {
        assert_eq!(DeliveryChannel::Chat.to_string(), "chat");
        assert_eq!(DeliveryChannel::Email.to_string(), "email");
        assert_eq!(DeliveryChannel::Both.to_string(), "both");
    }

    #[test]
    fn test_channel_parse() {
        assert_eq!(
            "chat".parse::<DeliveryChannel>().unwrap(),
            DeliveryChannel::Chat
        );
        assert_eq!(
            "telegram".parse::<DeliveryChannel>().unwrap(),
            DeliveryChannel::Chat
        );
        assert_eq!(
            "ambos".parse::<DeliveryChannel>().unwrap(),
            DeliveryChannel::Both
        );
        assert!("paloma".parse::<DeliveryChannel>().is_err());
    }

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [DeliveryOutcome::Sent, DeliveryOutcome::Failed] {
            let parsed: DeliveryOutcome = outcome.to_string().parse().unwrap();
            assert_eq!(parsed, outcome);
        }
        assert!("lost".parse::<DeliveryOutcome>().is_err());
    }
}
