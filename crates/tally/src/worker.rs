// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry queue worker.
//!
//! Polls the retry queue, claims due jobs under a worker-scoped lock, and
//! re-submits their payloads to the ledger. Failures reschedule with
//! exponential backoff; a job whose retry budget is spent is dropped with a
//! terminal log entry. Locks are advisory: any locks left behind by a crash
//! are released when the worker starts.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tally_core::{LedgerClient, RetryJob, RetryPolicy, TallyError};
use tally_storage::{queries::retry_jobs, Database};
use tracing::{error, info, warn};
use uuid::Uuid;

pub struct RetryWorker {
    db: Database,
    ledger: Arc<dyn LedgerClient>,
    policy: RetryPolicy,
    worker_id: String,
}

impl RetryWorker {
    pub fn new(db: Database, ledger: Arc<dyn LedgerClient>, policy: RetryPolicy) -> Self {
        Self {
            db,
            ledger,
            policy,
            worker_id: format!("worker-{}", Uuid::new_v4().simple()),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Release locks left behind by a previous process. Run once at startup.
    pub async fn release_stale_locks(&self) -> Result<(), TallyError> {
        let released = retry_jobs::reset_all_locks(&self.db).await?;
        if released > 0 {
            info!(released, "released stale retry job locks");
        }
        Ok(())
    }

    /// Poll until cancelled, sleeping `poll_interval` between empty polls.
    pub async fn run(&self, poll_interval: Duration) -> Result<(), TallyError> {
        self.release_stale_locks().await?;
        info!(worker_id = %self.worker_id, "retry worker started");
        loop {
            if !self.poll_once().await? {
                tokio::time::sleep(poll_interval).await;
            }
        }
    }

    /// Claim and process at most one due job. Returns whether a job was
    /// handled, so the caller can decide to sleep.
    pub async fn poll_once(&self) -> Result<bool, TallyError> {
        let Some(job) = retry_jobs::acquire_due_job(&self.db, &self.worker_id, Utc::now()).await?
        else {
            return Ok(false);
        };
        self.process_job(job).await?;
        Ok(true)
    }

    async fn process_job(&self, job: RetryJob) -> Result<(), TallyError> {
        let Some(job_id) = job.id else {
            return Err(TallyError::Internal(
                "acquired retry job has no row id".into(),
            ));
        };

        if job.is_exhausted() {
            error!(
                job_id,
                thread_id = %job.thread_id,
                attempts = job.attempts,
                last_error = job.error.as_deref().unwrap_or("unknown"),
                "retry budget exhausted, dropping job"
            );
            return retry_jobs::delete(&self.db, job_id).await;
        }

        match self.ledger.post_journal_entry(&job.payload).await {
            Ok(result) => {
                info!(
                    job_id,
                    thread_id = %job.thread_id,
                    journal_entry_id = %result.journal_entry_id,
                    "queued journal entry posted"
                );
                retry_jobs::mark_success(&self.db, job_id, &self.worker_id).await
            }
            Err(err) => {
                // The initial enqueue already consumed the first backoff step,
                // so failure number `attempts` in the queue is overall failure
                // number `attempts + 1`.
                let delay = self.policy.delay_for(job.attempts + 1);
                let next_run_at = Utc::now() + delay;
                warn!(
                    job_id,
                    thread_id = %job.thread_id,
                    attempts = job.attempts + 1,
                    delay_secs = delay.as_secs(),
                    error = %err,
                    "ledger re-submission failed, rescheduling"
                );
                retry_jobs::mark_failure(
                    &self.db,
                    job_id,
                    &self.worker_id,
                    &err.to_string(),
                    next_run_at,
                )
                .await
            }
        }
    }
}
