//! # Features Layer
//!
//! All feature modules of the reminder bot.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

pub mod delivery;
pub mod parser;
pub mod rate_limiting;
pub mod recurrence;
pub mod reminders;

pub use delivery::{
    DeliveryRouter, EmailSender, ReminderSender, SendOutcome, TelegramSender,
};
pub use parser::{ParsedReminder, TemporalParser};
pub use rate_limiting::RateLimiter;
pub use recurrence::Recurrence;
pub use reminders::{
    DeliveryChannel, DeliveryOutcome, DeliveryRecord, DueReminder, DueResolver, NewDeliveryRecord,
    NewReminder, Reminder, ReminderScheduler,
};
