// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable retry queue for failed journal entry submissions.
//!
//! Workers claim jobs through [`acquire_due_job`], a compare-and-set inside a
//! single transaction, so a job has at most one owner at a time. Completion
//! and failure updates are gated on the claiming worker's id; a stale worker
//! gets [`TallyError::LockMismatch`] instead of silently clobbering another
//! worker's claim.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::params;
use tally_core::{RetryJob, TallyError};

use crate::database::{map_tr_err, Database};

/// Insert a new job. Returns the auto-generated job id.
pub async fn enqueue(db: &Database, job: &RetryJob) -> Result<i64, TallyError> {
    job.validate()?;
    let thread_id = job.thread_id.clone();
    let payload = job.payload.to_string();
    let attempts = job.attempts;
    let next_run_at = encode_ts(job.next_run_at);
    let error = job.error.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO retry_jobs (thread_id, payload, attempts, next_run_at, error)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![thread_id, payload, attempts, next_run_at, error],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a job by id.
pub async fn get(db: &Database, id: i64) -> Result<Option<RetryJob>, TallyError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, thread_id, payload, attempts, next_run_at, error, locked_by, locked_at
                 FROM retry_jobs WHERE id = ?1",
            )?;
            match stmt.query_row(params![id], row_to_job) {
                Ok(job) => Ok(Some(job)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Claim the earliest due unlocked job for `worker_id`.
///
/// Selects the unlocked job with the smallest `next_run_at <= now` (id breaks
/// ties) and stamps the lock with a conditional update in the same
/// transaction. If another worker won the race between select and update,
/// returns `None` rather than handing out a second claim.
pub async fn acquire_due_job(
    db: &Database,
    worker_id: &str,
    now: DateTime<Utc>,
) -> Result<Option<RetryJob>, TallyError> {
    let worker_id = worker_id.to_string();
    let now_text = encode_ts(now);
    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;

            let candidate = {
                let mut stmt = tx.prepare(
                    "SELECT id, thread_id, payload, attempts, next_run_at, error, locked_by, locked_at
                     FROM retry_jobs
                     WHERE locked_by IS NULL AND next_run_at <= ?1
                     ORDER BY next_run_at ASC, id ASC
                     LIMIT 1",
                )?;
                match stmt.query_row(params![now_text], row_to_job) {
                    Ok(job) => Some(job),
                    Err(rusqlite::Error::QueryReturnedNoRows) => None,
                    Err(e) => return Err(e),
                }
            };

            let Some(mut job) = candidate else {
                tx.commit()?;
                return Ok(None);
            };

            let changed = tx.execute(
                "UPDATE retry_jobs
                 SET locked_by = ?1, locked_at = ?2,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3 AND locked_by IS NULL",
                params![worker_id, now_text, job.id],
            )?;
            tx.commit()?;

            if changed == 0 {
                // Lost the claim race; caller polls again.
                return Ok(None);
            }
            job.locked_by = Some(worker_id);
            job.locked_at = Some(now);
            Ok(Some(job))
        })
        .await
        .map_err(map_tr_err)
}

/// Record a failed attempt and release the lock.
///
/// Increments the attempt counter, stores the latest error, and reschedules
/// the job for `next_run_at`. Fails with `LockMismatch` if the job is not
/// currently locked by `worker_id`.
pub async fn mark_failure(
    db: &Database,
    job_id: i64,
    worker_id: &str,
    error: &str,
    next_run_at: DateTime<Utc>,
) -> Result<(), TallyError> {
    let worker = worker_id.to_string();
    let error = error.to_string();
    let next_run_text = encode_ts(next_run_at);
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_jobs
                 SET attempts = attempts + 1, error = ?1, next_run_at = ?2,
                     locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?3 AND locked_by = ?4",
                params![error, next_run_text, job_id, worker],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(TallyError::LockMismatch {
            job_id,
            worker_id: worker_id.to_string(),
        });
    }
    Ok(())
}

/// Remove a successfully resubmitted (or exhausted) job.
///
/// Fails with `LockMismatch` if the job is not currently locked by
/// `worker_id`.
pub async fn mark_success(db: &Database, job_id: i64, worker_id: &str) -> Result<(), TallyError> {
    let worker = worker_id.to_string();
    let changed = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM retry_jobs WHERE id = ?1 AND locked_by = ?2",
                params![job_id, worker],
            )
        })
        .await
        .map_err(map_tr_err)?;

    if changed == 0 {
        return Err(TallyError::LockMismatch {
            job_id,
            worker_id: worker_id.to_string(),
        });
    }
    Ok(())
}

/// Remove a job regardless of lock ownership. Used when a job exhausts its
/// attempts and cannot be retried further.
pub async fn delete(db: &Database, job_id: i64) -> Result<(), TallyError> {
    db.connection()
        .call(move |conn| {
            conn.execute("DELETE FROM retry_jobs WHERE id = ?1", params![job_id])?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Clear a job's lock unconditionally. Startup recovery for claims left
/// behind by a crashed worker.
pub async fn reset_lock(db: &Database, job_id: i64) -> Result<(), TallyError> {
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE retry_jobs
                 SET locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE id = ?1",
                params![job_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Release every held lock. Run once at startup before workers spawn.
pub async fn reset_all_locks(db: &Database) -> Result<usize, TallyError> {
    db.connection()
        .call(|conn| {
            conn.execute(
                "UPDATE retry_jobs
                 SET locked_by = NULL, locked_at = NULL,
                     updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
                 WHERE locked_by IS NOT NULL",
                [],
            )
        })
        .await
        .map_err(map_tr_err)
}

fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_ts(idx: usize, value: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

fn row_to_job(row: &rusqlite::Row<'_>) -> Result<RetryJob, rusqlite::Error> {
    let payload_text: String = row.get(2)?;
    let payload = serde_json::from_str(&payload_text).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let next_run_text: String = row.get(4)?;
    let locked_at_text: Option<String> = row.get(7)?;
    Ok(RetryJob {
        id: Some(row.get(0)?),
        thread_id: row.get(1)?,
        payload,
        attempts: row.get(3)?,
        next_run_at: parse_ts(4, &next_run_text)?,
        error: row.get(5)?,
        locked_by: row.get(6)?,
        locked_at: locked_at_text.as_deref().map(|t| parse_ts(7, t)).transpose()?,
    })
}
