// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Journal entry submission with durable retry.
//!
//! [`PostingCoordinator`] turns an approved draft into a balanced two-line
//! journal entry payload and submits it. A ledger failure is not an error at
//! this layer: the payload lands in the retry queue and the worker takes it
//! from there.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::json;
use tally_core::{
    ConfirmationStatus, ConversationState, ExpenseDraft, JournalEntryResult, LedgerClient,
    RetryJob, RetryPolicy, TallyError,
};
use tally_storage::{queries::retry_jobs, Database};
use tracing::{info, warn};

/// Result of one posting attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum PostOutcome {
    /// The ledger accepted the entry synchronously.
    Posted(JournalEntryResult),
    /// The ledger call failed; the payload is queued for retry.
    Queued {
        job_id: i64,
        next_run_at: DateTime<Utc>,
    },
}

pub struct PostingCoordinator {
    db: Database,
    policy: RetryPolicy,
}

impl PostingCoordinator {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            policy: RetryPolicy::default(),
        }
    }

    pub fn with_policy(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    /// Submit the approved draft on `state` to the ledger.
    ///
    /// Requires a draft with approved confirmation status; anything else is
    /// a precondition violation. On success the ledger result is stored on
    /// the state; on ledger failure the payload is enqueued with the first
    /// backoff delay and the attempt is reported as queued.
    pub async fn post_expense(
        &self,
        state: &mut ConversationState,
        ledger: &dyn LedgerClient,
    ) -> Result<PostOutcome, TallyError> {
        let Some(draft) = state.expense_draft.as_ref() else {
            return Err(TallyError::Validation(
                "cannot post without an expense draft".into(),
            ));
        };
        if state.confirmation_status != ConfirmationStatus::Approved {
            return Err(TallyError::Validation(
                "expense draft has not been approved".into(),
            ));
        }

        let payload = build_journal_entry_payload(draft);
        match ledger.post_journal_entry(&payload).await {
            Ok(result) => {
                info!(
                    thread_id = %state.thread_id,
                    journal_entry_id = %result.journal_entry_id,
                    "journal entry posted"
                );
                state.submission = Some(result.clone());
                Ok(PostOutcome::Posted(result))
            }
            Err(err) => {
                warn!(
                    thread_id = %state.thread_id,
                    error = %err,
                    "ledger submission failed, queueing for retry"
                );
                let next_run_at = Utc::now() + self.policy.first_delay();
                let mut job = RetryJob::new(state.thread_id.clone(), payload, next_run_at);
                job.error = Some(err.to_string());
                let job_id = retry_jobs::enqueue(&self.db, &job).await?;
                state.record_error(format!(
                    "Ledger submission failed and was queued for retry: {err}"
                ));
                Ok(PostOutcome::Queued {
                    job_id,
                    next_run_at,
                })
            }
        }
    }
}

/// Balanced two-line journal entry payload for the draft.
pub fn build_journal_entry_payload(draft: &ExpenseDraft) -> serde_json::Value {
    let amount = draft.amount.to_f64().unwrap_or_default();
    json!({
        "posting_date": draft.posting_date.format("%Y-%m-%d").to_string(),
        "user_remark": draft.narration,
        "accounts": [
            {
                "account": draft.debit_account.account_code,
                "debit_in_account_currency": amount,
                "credit_in_account_currency": 0.0,
            },
            {
                "account": draft.credit_account.account_code,
                "debit_in_account_currency": 0.0,
                "credit_in_account_currency": amount,
            },
        ],
    })
}
