//! Periodic reminder dispatch
//!
//! The process-wide loop that resolves the due set, sends each reminder
//! through its channel, records the attempt in the delivery log and advances
//! or retires the configuration. One tick at a time, never two in flight.
//!
//! - **Version**: 2.0.0
//! - **Since**: 0.2.0
//!
//! ## Changelog
//! - 2.0.0: Optimistic advancement, catch-up fast-forward, graceful shutdown
//! - 1.0.0: Initial release

use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::core::Clock;
use crate::features::delivery::DeliveryRouter;
use crate::features::reminders::{DeliveryOutcome, NewDeliveryRecord, Reminder};
use crate::features::reminders::resolver::{DueReminder, DueResolver};
use crate::storage::{AdvanceOutcome, ReminderStore};

/// The dispatch scheduler.
///
/// Dependencies are injected (store, senders, clock) so the loop runs in
/// tests against an in-memory store and a fixed clock.
pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    resolver: DueResolver,
    router: DeliveryRouter,
    clock: Arc<dyn Clock>,
    interval: Duration,
    shutdown: watch::Sender<bool>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        router: DeliveryRouter,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            resolver: DueResolver::new(store.clone()),
            store,
            router,
            clock,
            interval,
            shutdown,
        }
    }

    /// Drive the dispatch loop until `stop` is called.
    ///
    /// Ticks run inline, so at most one is in flight; if a tick overruns the
    /// interval the missed firings are skipped, not queued. A tick-level
    /// error (storage read down) aborts that tick only.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut shutdown_rx = self.shutdown.subscribe();

        info!(
            "⏰ Reminder dispatch loop started (every {}s)",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(0) => {}
                        Ok(delivered) => info!("📨 Tick processed {delivered} reminder(s)"),
                        Err(e) => error!("❌ Tick aborted: {e:#}"),
                    }
                }
                _ = shutdown_rx.changed() => {
                    info!("⏹️ Reminder dispatch loop stopped");
                    break;
                }
            }
        }
    }

    /// Spawn the dispatch loop on the runtime. The returned handle resolves
    /// once `stop` is called and the in-flight tick (if any) finished.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move { scheduler.run().await })
    }

    /// Request a graceful stop: no new ticks are scheduled and an in-flight
    /// tick finishes before `run` returns.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// One dispatch pass. Public so operators can trigger a manual check.
    pub async fn tick(&self) -> Result<usize> {
        let now = self.clock.now_utc();
        let due = self.resolver.resolve_due(now).await?;
        if due.is_empty() {
            debug!("No reminders due at {now}");
            return Ok(0);
        }

        info!("📋 {} reminder(s) due", due.len());
        let mut processed = 0;
        for item in &due {
            // One bad reminder must not take the tick down with it
            match self.process_due(item).await {
                Ok(()) => processed += 1,
                Err(e) => error!(
                    "❌ Error processing reminder {}: {e:#}",
                    item.reminder.id
                ),
            }
        }
        Ok(processed)
    }

    /// Send, log, then advance — in that order, for a single reminder.
    ///
    /// The attempt is always logged, success or not. Only a successful send
    /// advances or retires the reminder; after a failure the configuration is
    /// left untouched so the next tick retries it (the dedup gate only
    /// recognizes `sent` records).
    async fn process_due(&self, due: &DueReminder) -> Result<()> {
        let reminder = &due.reminder;
        let outcome = self.router.dispatch(reminder).await;
        let fired_at = self.clock.now_utc();

        self.store
            .record_delivery(NewDeliveryRecord {
                reminder_id: reminder.id,
                fired_at,
                scheduled_for: due.occurrence,
                outcome: if outcome.success {
                    DeliveryOutcome::Sent
                } else {
                    DeliveryOutcome::Failed
                },
                error_detail: outcome.error.clone(),
            })
            .await?;

        if !outcome.success {
            warn!(
                "📭 Delivery of reminder {} failed ({}); will retry next tick",
                reminder.id,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
            return Ok(());
        }

        let next = next_fire_at(reminder, due.occurrence, fired_at);
        match self
            .store
            .advance_reminder(reminder.id, due.occurrence, next)
            .await?
        {
            AdvanceOutcome::Advanced(next_fire) => {
                info!("🔁 Reminder {} rescheduled for {next_fire}", reminder.id);
            }
            AdvanceOutcome::Retired => {
                info!("✅ Reminder {} delivered and deactivated", reminder.id);
            }
            AdvanceOutcome::Conflict => {
                // Another writer won the race; skipping preserves the
                // single-advance-per-tick invariant
                warn!(
                    "⚠️ Reminder {} changed concurrently, skipping advancement",
                    reminder.id
                );
            }
        }
        Ok(())
    }
}

/// Next occurrence for a fired reminder, or None to retire it.
///
/// Advancement starts from the occurrence that fired, not from `now`, then
/// fast-forwards past occurrences that already elapsed: a reminder missed
/// for ten days fires once and lands strictly in the future, it is not
/// re-delivered for every missed period.
fn next_fire_at(
    reminder: &Reminder,
    occurrence: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let pattern = reminder.recurrence?;
    let mut next = pattern.next_occurrence(occurrence);
    while next <= now {
        next = pattern.next_occurrence(next);
    }
    Some(next)
}
