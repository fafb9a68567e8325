//! SQLite-based durable state for snooze counters and deferred jobs.
//!
//! Two tables back the state machine:
//! - `snooze_counts`: one row per alarm with the current deferral count
//! - `deferred_jobs`: snoozed re-evaluations, `pending` until the daemon
//!   claims them
//!
//! Every mutation is a single statement (or a pair of statements with no
//! ordering hazard), so SQLite's writer serialization gives per-alarm
//! atomicity even with concurrent short-lived invocations.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::data_dir;
use crate::alarm::Action;
use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Completed,
}

impl JobStatus {
    fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
        }
    }
}

/// A snoozed alarm's next due re-evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferredJob {
    pub id: String,
    pub alarm: String,
    pub due_at: DateTime<Utc>,
    pub action: Action,
    /// Deferral count at the moment the job was created.
    pub snooze_count: u32,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
}

/// A per-alarm snooze counter row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnoozeRecord {
    pub alarm: String,
    pub count: u32,
    pub updated_at: DateTime<Utc>,
}

/// Parse datetime from RFC3339 string with fallback to current time
fn parse_datetime_fallback(dt_str: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(dt_str)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_status(status_str: &str) -> JobStatus {
    match status_str {
        "completed" => JobStatus::Completed,
        _ => JobStatus::Pending,
    }
}

fn row_to_job(row: &rusqlite::Row) -> Result<DeferredJob, rusqlite::Error> {
    let due_at: String = row.get(2)?;
    let action: String = row.get(3)?;
    let count: i64 = row.get(4)?;
    let status: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    Ok(DeferredJob {
        id: row.get(0)?,
        alarm: row.get(1)?,
        due_at: parse_datetime_fallback(&due_at),
        // A malformed action is recovered as the mildest one.
        action: action.parse().unwrap_or(Action::Suspend),
        snooze_count: count.max(0) as u32,
        status: parse_status(&status),
        created_at: parse_datetime_fallback(&created_at),
    })
}

/// SQLite database for snooze counters and the deferred job queue.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `~/.config/snoozed/snoozed.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, StoreError> {
        let path = data_dir()?.join("snoozed.db");
        let conn = Connection::open(&path).map_err(|source| StoreError::OpenFailed {
            path: path.clone(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    #[cfg(test)]
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS snooze_counts (
                    alarm      TEXT PRIMARY KEY,
                    count      INTEGER NOT NULL DEFAULT 0,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS deferred_jobs (
                    id           TEXT PRIMARY KEY,
                    alarm        TEXT NOT NULL,
                    due_at       TEXT NOT NULL,
                    action       TEXT NOT NULL,
                    snooze_count INTEGER NOT NULL,
                    status       TEXT NOT NULL DEFAULT 'pending',
                    created_at   TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_deferred_jobs_status_due
                    ON deferred_jobs(status, due_at);
                CREATE INDEX IF NOT EXISTS idx_deferred_jobs_alarm
                    ON deferred_jobs(alarm);",
            )
            .map_err(|e| StoreError::MigrationFailed(e.to_string()))
    }

    // ── Snooze counters ──────────────────────────────────────────────

    /// Current deferral count for an alarm. A missing row reads as zero.
    pub fn snooze_count(&self, alarm: &str) -> Result<u32, StoreError> {
        let count: Option<i64> = self
            .conn
            .query_row(
                "SELECT count FROM snooze_counts WHERE alarm = ?1",
                params![alarm],
                |row| row.get(0),
            )
            .optional()?;
        Ok(count.map(|c| c.max(0) as u32).unwrap_or(0))
    }

    /// Atomically add one deferral and return the new count.
    pub fn increment_snooze(&self, alarm: &str, now: DateTime<Utc>) -> Result<u32, StoreError> {
        self.conn.execute(
            "INSERT INTO snooze_counts (alarm, count, updated_at) VALUES (?1, 1, ?2)
             ON CONFLICT(alarm) DO UPDATE SET count = count + 1, updated_at = ?2",
            params![alarm, now.to_rfc3339()],
        )?;
        self.snooze_count(alarm)
    }

    /// Reset an alarm's counter to zero (drops the row).
    pub fn reset_snooze(&self, alarm: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "DELETE FROM snooze_counts WHERE alarm = ?1",
            params![alarm],
        )?;
        Ok(())
    }

    /// Drop counters not touched since `cutoff`. Returns rows deleted.
    pub fn purge_stale_counts(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM snooze_counts WHERE updated_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }

    /// All counter rows, for status reporting.
    pub fn snooze_records(&self) -> Result<Vec<SnoozeRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT alarm, count, updated_at FROM snooze_counts ORDER BY alarm")?;
        let rows = stmt.query_map([], |row| {
            let count: i64 = row.get(1)?;
            let updated_at: String = row.get(2)?;
            Ok(SnoozeRecord {
                alarm: row.get(0)?,
                count: count.max(0) as u32,
                updated_at: parse_datetime_fallback(&updated_at),
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Deferred jobs ────────────────────────────────────────────────

    /// Create a pending job for an alarm, superseding any earlier pending
    /// job for the same alarm wholesale.
    pub fn create_job(
        &self,
        alarm: &str,
        due_at: DateTime<Utc>,
        action: Action,
        snooze_count: u32,
        now: DateTime<Utc>,
    ) -> Result<DeferredJob, StoreError> {
        self.clear_pending(alarm)?;
        let job = DeferredJob {
            id: Uuid::new_v4().to_string(),
            alarm: alarm.to_string(),
            due_at,
            action,
            snooze_count,
            status: JobStatus::Pending,
            created_at: now,
        };
        self.conn.execute(
            "INSERT INTO deferred_jobs (id, alarm, due_at, action, snooze_count, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                job.id,
                job.alarm,
                job.due_at.to_rfc3339(),
                job.action.as_str(),
                job.snooze_count,
                job.status.as_str(),
                job.created_at.to_rfc3339(),
            ],
        )?;
        Ok(job)
    }

    /// Pending jobs whose due time has passed, oldest first.
    pub fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<DeferredJob>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alarm, due_at, action, snooze_count, status, created_at
             FROM deferred_jobs
             WHERE status = 'pending' AND due_at <= ?1
             ORDER BY due_at",
        )?;
        let rows = stmt.query_map(params![now.to_rfc3339()], row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// All pending jobs, for status reporting.
    pub fn pending_jobs(&self) -> Result<Vec<DeferredJob>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alarm, due_at, action, snooze_count, status, created_at
             FROM deferred_jobs
             WHERE status = 'pending'
             ORDER BY due_at",
        )?;
        let rows = stmt.query_map([], row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Pending jobs for one alarm.
    pub fn pending_jobs_for(&self, alarm: &str) -> Result<Vec<DeferredJob>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alarm, due_at, action, snooze_count, status, created_at
             FROM deferred_jobs
             WHERE status = 'pending' AND alarm = ?1
             ORDER BY due_at",
        )?;
        let rows = stmt.query_map(params![alarm], row_to_job)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Move a job to completed. Returns true iff this call did the
    /// transition, so a job can be claimed exactly once.
    pub fn claim_job(&self, id: &str) -> Result<bool, StoreError> {
        let changed = self.conn.execute(
            "UPDATE deferred_jobs SET status = 'completed'
             WHERE id = ?1 AND status = 'pending'",
            params![id],
        )?;
        Ok(changed == 1)
    }

    /// Delete every pending job for an alarm. Returns rows deleted.
    pub fn clear_pending(&self, alarm: &str) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM deferred_jobs WHERE alarm = ?1 AND status = 'pending'",
            params![alarm],
        )?;
        Ok(deleted)
    }

    /// Drop completed job records created before `cutoff`.
    pub fn purge_completed(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let deleted = self.conn.execute(
            "DELETE FROM deferred_jobs WHERE status = 'completed' AND created_at < ?1",
            params![cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}
