//! In-memory reminder store
//!
//! Mutex-over-Vec implementation of `ReminderStore`. Backs the resolver and
//! scheduler tests so they can run against a controllable store without
//! touching disk; behavior mirrors the SQLite store exactly.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Mutex;

use super::{AdvanceOutcome, ReminderStore};
use crate::features::reminders::{
    DeliveryOutcome, DeliveryRecord, NewDeliveryRecord, NewReminder, Reminder,
};

#[derive(Default)]
pub struct InMemoryStore {
    reminders: Mutex<Vec<Reminder>>,
    deliveries: Mutex<Vec<DeliveryRecord>>,
    next_reminder_id: AtomicI64,
    next_delivery_id: AtomicI64,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the delivery log, oldest first. Test helper.
    pub fn deliveries(&self) -> Vec<DeliveryRecord> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReminderStore for InMemoryStore {
    async fn add_reminder(&self, new: NewReminder) -> Result<Reminder> {
        let reminder = Reminder {
            id: self.next_reminder_id.fetch_add(1, Ordering::SeqCst) + 1,
            owner_id: new.owner_id,
            fire_at: new.fire_at,
            recurrence: new.recurrence,
            message: new.message,
            channel: new.channel,
            active: true,
            created_at: Utc::now(),
        };
        self.reminders.lock().unwrap().push(reminder.clone());
        Ok(reminder)
    }

    async fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        Ok(self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id)
            .cloned())
    }

    async fn list_user_reminders(&self, owner_id: &str, limit: usize) -> Result<Vec<Reminder>> {
        let mut matching: Vec<Reminder> = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active && r.owner_id == owner_id)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.fire_at);
        matching.truncate(limit);
        Ok(matching)
    }

    async fn cancel_reminder(&self, id: i64, owner_id: &str) -> Result<bool> {
        let mut reminders = self.reminders.lock().unwrap();
        for reminder in reminders.iter_mut() {
            if reminder.id == id && reminder.owner_id == owner_id && reminder.active {
                reminder.active = false;
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn list_active_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let mut due: Vec<Reminder> = self
            .reminders
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.active && r.fire_at <= instant)
            .cloned()
            .collect();
        due.sort_by_key(|r| r.fire_at);
        Ok(due)
    }

    async fn has_sent_since(&self, reminder_id: i64, since: DateTime<Utc>) -> Result<bool> {
        Ok(self.deliveries.lock().unwrap().iter().any(|d| {
            d.reminder_id == reminder_id
                && d.outcome == DeliveryOutcome::Sent
                && d.fired_at >= since
        }))
    }

    async fn record_delivery(&self, record: NewDeliveryRecord) -> Result<DeliveryRecord> {
        let record = DeliveryRecord {
            id: self.next_delivery_id.fetch_add(1, Ordering::SeqCst) + 1,
            reminder_id: record.reminder_id,
            fired_at: record.fired_at,
            scheduled_for: record.scheduled_for,
            outcome: record.outcome,
            error_detail: record.error_detail,
        };
        self.deliveries.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn advance_reminder(
        &self,
        id: i64,
        prev_fire_at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> Result<AdvanceOutcome> {
        let mut reminders = self.reminders.lock().unwrap();
        for reminder in reminders.iter_mut() {
            if reminder.id == id && reminder.active && reminder.fire_at == prev_fire_at {
                return Ok(match next {
                    Some(next_fire_at) => {
                        reminder.fire_at = next_fire_at;
                        AdvanceOutcome::Advanced(next_fire_at)
                    }
                    None => {
                        reminder.active = false;
                        AdvanceOutcome::Retired
                    }
                });
            }
        }
        Ok(AdvanceOutcome::Conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::reminders::DeliveryChannel;
    use chrono::TimeZone;

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, 0, 0).unwrap()
    }

    fn new_reminder(owner: &str, fire_at: DateTime<Utc>) -> NewReminder {
        NewReminder {
            owner_id: owner.to_string(),
            fire_at,
            recurrence: None,
            message: "llamar a juan".to_string(),
            channel: DeliveryChannel::Chat,
        }
    }

    #[tokio::test]
    async fn test_ids_are_assigned_sequentially() {
        let store = InMemoryStore::new();
        let a = store.add_reminder(new_reminder("1", at(9))).await.unwrap();
        let b = store.add_reminder(new_reminder("1", at(10))).await.unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_due_listing_matches_sqlite_semantics() {
        let store = InMemoryStore::new();
        store.add_reminder(new_reminder("1", at(8))).await.unwrap();
        store.add_reminder(new_reminder("1", at(12))).await.unwrap();

        let due = store.list_active_due_by(at(9)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].fire_at, at(8));
    }

    #[tokio::test]
    async fn test_conflict_on_stale_advance() {
        let store = InMemoryStore::new();
        let r = store.add_reminder(new_reminder("1", at(8))).await.unwrap();

        assert_eq!(
            store
                .advance_reminder(r.id, at(8), Some(at(9)))
                .await
                .unwrap(),
            AdvanceOutcome::Advanced(at(9))
        );
        assert_eq!(
            store
                .advance_reminder(r.id, at(8), Some(at(10)))
                .await
                .unwrap(),
            AdvanceOutcome::Conflict
        );
    }
}
