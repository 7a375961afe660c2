//! Due-set resolution
//!
//! Decides which reminders must fire at a given instant, consulting the
//! delivery log so an occurrence already delivered is never handed out twice
//! (overlapping ticks, process restarts).
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::debug;
use std::sync::Arc;

use crate::features::reminders::Reminder;
use crate::storage::ReminderStore;

/// A reminder that must fire now, paired with the occurrence instant that
/// triggered it (its stored fire_at).
#[derive(Debug, Clone)]
pub struct DueReminder {
    pub reminder: Reminder,
    pub occurrence: DateTime<Utc>,
}

/// Computes the due set for a tick.
pub struct DueResolver {
    store: Arc<dyn ReminderStore>,
}

impl DueResolver {
    pub fn new(store: Arc<dyn ReminderStore>) -> Self {
        Self { store }
    }

    /// All active reminders with `fire_at <= now` that do not yet have a
    /// `sent` delivery for the current occurrence.
    ///
    /// The dedup gate checks for any `sent` record since the reminder's
    /// current fire_at was set; failed attempts never count, so a reminder
    /// whose delivery failed is resolved again on the next tick. Ordering of
    /// the returned set follows fire_at but callers must not rely on it.
    ///
    /// A storage error aborts the whole resolution; the caller treats that
    /// as a failed tick and waits for the next one.
    pub async fn resolve_due(&self, now: DateTime<Utc>) -> Result<Vec<DueReminder>> {
        let candidates = self.store.list_active_due_by(now).await?;

        let mut due = Vec::with_capacity(candidates.len());
        for reminder in candidates {
            if self.store.has_sent_since(reminder.id, reminder.fire_at).await? {
                debug!(
                    "Reminder {} already delivered for occurrence {}, skipping",
                    reminder.id, reminder.fire_at
                );
                continue;
            }
            let occurrence = reminder.fire_at;
            due.push(DueReminder {
                reminder,
                occurrence,
            });
        }
        Ok(due)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::recurrence::Recurrence;
    use crate::features::reminders::{
        DeliveryChannel, DeliveryOutcome, NewDeliveryRecord, NewReminder,
    };
    use crate::storage::InMemoryStore;
    use chrono::TimeZone;

    fn at(h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, h, mi, 0).unwrap()
    }

    fn new_reminder(fire_at: DateTime<Utc>, recurrence: Option<Recurrence>) -> NewReminder {
        NewReminder {
            owner_id: "123456".to_string(),
            fire_at,
            recurrence,
            message: "llamar a juan".to_string(),
            channel: DeliveryChannel::Chat,
        }
    }

    #[tokio::test]
    async fn test_only_past_due_reminders_resolve() {
        let store = Arc::new(InMemoryStore::new());
        store
            .add_reminder(new_reminder(at(9, 0), None))
            .await
            .unwrap();
        store
            .add_reminder(new_reminder(at(18, 0), None))
            .await
            .unwrap();

        let resolver = DueResolver::new(store);
        let due = resolver.resolve_due(at(10, 0)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].occurrence, at(9, 0));
    }

    #[tokio::test]
    async fn test_sent_record_gates_reresolution() {
        let store = Arc::new(InMemoryStore::new());
        let r = store
            .add_reminder(new_reminder(at(9, 0), None))
            .await
            .unwrap();
        let resolver = DueResolver::new(store.clone());

        // First resolution sees it
        assert_eq!(resolver.resolve_due(at(9, 1)).await.unwrap().len(), 1);

        store
            .record_delivery(NewDeliveryRecord {
                reminder_id: r.id,
                fired_at: at(9, 1),
                scheduled_for: at(9, 0),
                outcome: DeliveryOutcome::Sent,
                error_detail: None,
            })
            .await
            .unwrap();

        // Same instant, same reminder: gated now
        assert!(resolver.resolve_due(at(9, 1)).await.unwrap().is_empty());
        // And on the overlapping next tick too
        assert!(resolver.resolve_due(at(9, 2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_does_not_gate() {
        let store = Arc::new(InMemoryStore::new());
        let r = store
            .add_reminder(new_reminder(at(9, 0), None))
            .await
            .unwrap();
        store
            .record_delivery(NewDeliveryRecord {
                reminder_id: r.id,
                fired_at: at(9, 1),
                scheduled_for: at(9, 0),
                outcome: DeliveryOutcome::Failed,
                error_detail: Some("timeout".to_string()),
            })
            .await
            .unwrap();

        let resolver = DueResolver::new(store);
        let due = resolver.resolve_due(at(9, 2)).await.unwrap();
        assert_eq!(due.len(), 1, "failed sends must be retried");
    }

    #[tokio::test]
    async fn test_stale_sent_from_previous_occurrence_does_not_gate() {
        let store = Arc::new(InMemoryStore::new());
        let r = store
            .add_reminder(new_reminder(at(8, 0), Some(Recurrence::Hourly)))
            .await
            .unwrap();

        // Delivered for the 08:00 occurrence, then advanced to 09:00
        store
            .record_delivery(NewDeliveryRecord {
                reminder_id: r.id,
                fired_at: at(8, 0),
                scheduled_for: at(8, 0),
                outcome: DeliveryOutcome::Sent,
                error_detail: None,
            })
            .await
            .unwrap();
        store
            .advance_reminder(r.id, at(8, 0), Some(at(9, 0)))
            .await
            .unwrap();

        let resolver = DueResolver::new(store);
        let due = resolver.resolve_due(at(9, 30)).await.unwrap();
        assert_eq!(due.len(), 1, "a new occurrence is not gated by old sends");
        assert_eq!(due[0].occurrence, at(9, 0));
    }

    #[tokio::test]
    async fn test_far_past_reminder_resolves_once_not_per_period() {
        let store = Arc::new(InMemoryStore::new());
        // Missed for days while the process was down
        let r = store
            .add_reminder(new_reminder(
                Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
                Some(Recurrence::Daily),
            ))
            .await
            .unwrap();

        let resolver = DueResolver::new(store.clone());
        let due = resolver.resolve_due(at(9, 0)).await.unwrap();
        assert_eq!(due.len(), 1);

        // After the single catch-up delivery it stops resolving
        store
            .record_delivery(NewDeliveryRecord {
                reminder_id: r.id,
                fired_at: at(9, 0),
                scheduled_for: due[0].occurrence,
                outcome: DeliveryOutcome::Sent,
                error_detail: None,
            })
            .await
            .unwrap();
        assert!(resolver.resolve_due(at(9, 1)).await.unwrap().is_empty());
    }
}
