// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tally expense bot.

use thiserror::Error;

/// The primary error type used across all Tally crates.
///
/// Expected conversational outcomes (missing fields, ambiguous accounts,
/// denied confirmations) are modeled as typed result values, not errors.
/// `TallyError` is reserved for faults: bad construction input, storage
/// failures, unreachable collaborators, and lock-ownership violations.
#[derive(Debug, Error)]
pub enum TallyError {
    /// Configuration errors (invalid TOML, missing required fields, bad thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// Domain validation errors (non-positive amount, oversize narration,
    /// out-of-range confidence). Never partially applied.
    #[error("validation error: {0}")]
    Validation(String),

    /// The acting user is not on the authorization allow-list. Raised before
    /// any state mutation so callers can render a fixed denial message.
    #[error("user {user_id:?} is not authorized to capture expenses")]
    Unauthorized { user_id: Option<i64> },

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Ledger system errors (ERPNext unreachable, HTTP failure, malformed response).
    #[error("ledger error: {message}")]
    Ledger {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The caller no longer holds the lock on a retry job. Indicates a stale
    /// reference or a logic bug; must be logged loudly, never swallowed.
    #[error("retry job {job_id} is not locked by worker {worker_id}")]
    LockMismatch { job_id: i64, worker_id: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}
