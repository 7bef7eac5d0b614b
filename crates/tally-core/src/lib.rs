// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Tally expense bot.
//!
//! Defines the shared error type, the conversation and ledger domain model,
//! the retry backoff policy, and the narrow traits through which the core
//! talks to external collaborators (ledger client, account catalog).

pub mod backoff;
pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use backoff::RetryPolicy;
pub use error::TallyError;
pub use state::{ConversationState, RecentMessage, MAX_RECENT_MESSAGES};
pub use traits::{ChartSource, LedgerClient};
pub use types::{
    AccountCandidate, AccountMatch, AccountRole, AttachmentRef, ChartRow, ClarificationField,
    ConfirmationStatus, ExpenseDraft, JournalEntryResult, RetryJob, MAX_NARRATION_LEN,
    MAX_RETRY_ATTEMPTS,
};
