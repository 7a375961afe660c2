//! SQLite-backed reminder store
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Delivery log with scheduled_for stamping
//! - 1.0.0: Initial release

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::info;
use sqlite::{Connection, State, Statement};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{AdvanceOutcome, ReminderStore};
use crate::features::recurrence::Recurrence;
use crate::features::reminders::{DeliveryRecord, NewDeliveryRecord, NewReminder, Reminder};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS reminders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    owner_id TEXT NOT NULL,
    fire_at TEXT NOT NULL,
    recurrence TEXT,
    message TEXT NOT NULL,
    channel TEXT NOT NULL DEFAULT 'chat',
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_reminders_due
    ON reminders (active, fire_at);
CREATE INDEX IF NOT EXISTS idx_reminders_owner
    ON reminders (owner_id, active);

CREATE TABLE IF NOT EXISTS deliveries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    reminder_id INTEGER NOT NULL,
    fired_at TEXT NOT NULL,
    scheduled_for TEXT NOT NULL,
    outcome TEXT NOT NULL,
    error_detail TEXT
);
CREATE INDEX IF NOT EXISTS idx_deliveries_dedup
    ON deliveries (reminder_id, outcome, fired_at);
";

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that string
/// comparison in SQL orders them correctly.
fn fmt_ts(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("invalid stored timestamp: {raw}"))?
        .with_timezone(&Utc))
}

/// SQLite reminder store.
///
/// Cheap to clone; all clones share one connection behind an async mutex, so
/// multi-statement operations (insert + rowid lookup, conditional update +
/// change count) are atomic with respect to other tasks.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file and ensure the schema exists.
    pub async fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;
        conn.execute(SCHEMA).context("failed to create schema")?;
        info!("💾 Database ready at {path}");
        Ok(Database {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_reminder(stmt: &Statement<'_>) -> Result<Reminder> {
        let recurrence = match stmt.read::<Option<String>, _>("recurrence")? {
            Some(raw) => Some(raw.parse::<Recurrence>()?),
            None => None,
        };
        Ok(Reminder {
            id: stmt.read::<i64, _>("id")?,
            owner_id: stmt.read::<String, _>("owner_id")?,
            fire_at: parse_ts(&stmt.read::<String, _>("fire_at")?)?,
            recurrence,
            message: stmt.read::<String, _>("message")?,
            channel: stmt.read::<String, _>("channel")?.parse()?,
            active: stmt.read::<i64, _>("active")? != 0,
            created_at: parse_ts(&stmt.read::<String, _>("created_at")?)?,
        })
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn add_reminder(&self, new: NewReminder) -> Result<Reminder> {
        let conn = self.conn.lock().await;
        let created_at = Utc::now();
        let mut stmt = conn.prepare(
            "INSERT INTO reminders (owner_id, fire_at, recurrence, message, channel, active, created_at)
             VALUES (?, ?, ?, ?, ?, 1, ?)",
        )?;
        stmt.bind((1, new.owner_id.as_str()))?;
        stmt.bind((2, fmt_ts(new.fire_at).as_str()))?;
        match &new.recurrence {
            Some(r) => stmt.bind((3, r.to_string().as_str()))?,
            None => stmt.bind((3, ()))?,
        }
        stmt.bind((4, new.message.as_str()))?;
        stmt.bind((5, new.channel.to_string().as_str()))?;
        stmt.bind((6, fmt_ts(created_at).as_str()))?;
        while stmt.next()? != State::Done {}
        drop(stmt);

        let mut rowid_stmt = conn.prepare("SELECT last_insert_rowid()")?;
        rowid_stmt.next()?;
        let id = rowid_stmt.read::<i64, _>(0)?;

        Ok(Reminder {
            id,
            owner_id: new.owner_id,
            fire_at: new.fire_at,
            recurrence: new.recurrence,
            message: new.message,
            channel: new.channel,
            active: true,
            created_at,
        })
    }

    async fn get_reminder(&self, id: i64) -> Result<Option<Reminder>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare("SELECT * FROM reminders WHERE id = ?")?;
        stmt.bind((1, id))?;
        if stmt.next()? == State::Row {
            Ok(Some(Self::row_to_reminder(&stmt)?))
        } else {
            Ok(None)
        }
    }

    async fn list_user_reminders(&self, owner_id: &str, limit: usize) -> Result<Vec<Reminder>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM reminders WHERE owner_id = ? AND active = 1
             ORDER BY fire_at LIMIT ?",
        )?;
        stmt.bind((1, owner_id))?;
        stmt.bind((2, limit as i64))?;

        let mut reminders = Vec::new();
        while stmt.next()? == State::Row {
            reminders.push(Self::row_to_reminder(&stmt)?);
        }
        Ok(reminders)
    }

    async fn cancel_reminder(&self, id: i64, owner_id: &str) -> Result<bool> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "UPDATE reminders SET active = 0 WHERE id = ? AND owner_id = ? AND active = 1",
        )?;
        stmt.bind((1, id))?;
        stmt.bind((2, owner_id))?;
        while stmt.next()? != State::Done {}
        Ok(conn.change_count() == 1)
    }

    async fn list_active_due_by(&self, instant: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT * FROM reminders WHERE active = 1 AND fire_at <= ? ORDER BY fire_at",
        )?;
        stmt.bind((1, fmt_ts(instant).as_str()))?;

        let mut reminders = Vec::new();
        while stmt.next()? == State::Row {
            reminders.push(Self::row_to_reminder(&stmt)?);
        }
        Ok(reminders)
    }

    async fn has_sent_since(&self, reminder_id: i64, since: DateTime<Utc>) -> Result<bool> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT 1 FROM deliveries
             WHERE reminder_id = ? AND outcome = 'sent' AND fired_at >= ? LIMIT 1",
        )?;
        stmt.bind((1, reminder_id))?;
        stmt.bind((2, fmt_ts(since).as_str()))?;
        Ok(stmt.next()? == State::Row)
    }

    async fn record_delivery(&self, record: NewDeliveryRecord) -> Result<DeliveryRecord> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "INSERT INTO deliveries (reminder_id, fired_at, scheduled_for, outcome, error_detail)
             VALUES (?, ?, ?, ?, ?)",
        )?;
        stmt.bind((1, record.reminder_id))?;
        stmt.bind((2, fmt_ts(record.fired_at).as_str()))?;
        stmt.bind((3, fmt_ts(record.scheduled_for).as_str()))?;
        stmt.bind((4, record.outcome.to_string().as_str()))?;
        match &record.error_detail {
            Some(detail) => stmt.bind((5, detail.as_str()))?,
            None => stmt.bind((5, ()))?,
        }
        while stmt.next()? != State::Done {}
        drop(stmt);

        let mut rowid_stmt = conn.prepare("SELECT last_insert_rowid()")?;
        rowid_stmt.next()?;
        let id = rowid_stmt.read::<i64, _>(0)?;

        Ok(DeliveryRecord {
            id,
            reminder_id: record.reminder_id,
            fired_at: record.fired_at,
            scheduled_for: record.scheduled_for,
            outcome: record.outcome,
            error_detail: record.error_detail,
        })
    }

    async fn advance_reminder(
        &self,
        id: i64,
        prev_fire_at: DateTime<Utc>,
        next: Option<DateTime<Utc>>,
    ) -> Result<AdvanceOutcome> {
        let conn = self.conn.lock().await;
        match next {
            Some(next_fire_at) => {
                let mut stmt = conn.prepare(
                    "UPDATE reminders SET fire_at = ?
                     WHERE id = ? AND active = 1 AND fire_at = ?",
                )?;
                stmt.bind((1, fmt_ts(next_fire_at).as_str()))?;
                stmt.bind((2, id))?;
                stmt.bind((3, fmt_ts(prev_fire_at).as_str()))?;
                while stmt.next()? != State::Done {}
                drop(stmt);
                if conn.change_count() == 1 {
                    Ok(AdvanceOutcome::Advanced(next_fire_at))
                } else {
                    Ok(AdvanceOutcome::Conflict)
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "UPDATE reminders SET active = 0
                     WHERE id = ? AND active = 1 AND fire_at = ?",
                )?;
                stmt.bind((1, id))?;
                stmt.bind((2, fmt_ts(prev_fire_at).as_str()))?;
                while stmt.next()? != State::Done {}
                drop(stmt);
                if conn.change_count() == 1 {
                    Ok(AdvanceOutcome::Retired)
                } else {
                    Ok(AdvanceOutcome::Conflict)
                }
            }
        }
    }
}
