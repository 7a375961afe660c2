// Core layer - configuration, clock and message shaping
pub mod core;

// Features layer - parser, recurrence, reminders, delivery, rate limiting
pub mod features;

// Infrastructure - persistence and the Telegram API client
pub mod storage;
pub mod telegram;

// Application layer - inbound command and message handling
pub mod commands;

// Re-export core config for convenience
pub use self::core::Config;

// Re-export the main feature items
pub use commands::CommandContext;
pub use features::{
    DeliveryChannel, DeliveryRouter, DueResolver, EmailSender, ParsedReminder, RateLimiter,
    Recurrence, Reminder, ReminderScheduler, ReminderSender, TelegramSender, TemporalParser,
};
pub use storage::{Database, InMemoryStore, ReminderStore};
pub use telegram::TelegramClient;
