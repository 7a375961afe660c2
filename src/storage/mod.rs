//! # Storage
//!
//! Persistence boundary for reminders and the delivery log. The dispatch
//! pipeline only sees the `ReminderStore` trait; `Database` is the SQLite
//! implementation used in production and `InMemoryStore` backs tests and
//! simulations.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.1.0: Conditional advancement for optimistic concurrency
//! - 1.0.0: Initial release with SQLite and in-memory stores

pub mod memory;
pub mod sqlite;

pub use memory::InMemoryStore;
pub use sqlite::Database;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::features::reminders::{DeliveryRecord, NewDeliveryRecord, NewReminder, Reminder};

/// Result of a conditional advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceOutcome {
    /// fire_at moved to the next occurrence, reminder stays active
    Advanced(DateTime<Utc>),
    /// No further occurrences; reminder deactivated
    Retired,
    /// Another writer touched the reminder first; the caller must skip,
    /// not retry, to preserve the single-firing invariant
    Conflict,
}

/// Read/write capability the reminder pipeline needs from storage.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// Insert a new reminder and return it with its assigned id.
    async fn add_reminder(&self, new: NewReminder) -> Result<Reminder>;

    /// Fetch a reminder by id.
    async fn get_reminder(&self, id: i64) -> Result<Option<Reminder>>;

    /// Active reminders for one owner, ordered by fire time.
    async fn list_user_reminders(&self, owner_id: &str, limit: usize) -> Result<Vec<Reminder>>;

    /// Deactivate a reminder if it belongs to `owner_id`; true when a row
    /// actually changed.
    async fn cancel_reminder(&self, id: i64, owner_id: &str) -> Result<bool>;

    /// All active reminders whose fire_at is at or before `instant`.
    async fn list_active_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Whether a `sent` delivery exists for this reminder at or after
    /// `since`. This is the dedup gate; failed attempts never count.
    async fn has_sent_since(&self, reminder_id: i64, since: DateTime<Utc>) -> Result<bool>;

    /// Append to the delivery log. Records are immutable once written.
    async fn record_delivery(&self, record: NewDeliveryRecord) -> Result<DeliveryRecord>;

    /// Advance or retire a reminder, conditional on its fire_at still being
    /// `prev_fire_at` and the reminder still active. `next = None` retires.
    async fn advance_reminder(
        &self,
        id: i64,
        prev_fire_at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> Result<AdvanceOutcome>;
}
