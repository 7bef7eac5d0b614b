// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the downstream accounting system.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::types::JournalEntryResult;

/// Submits balanced journal entries to the ledger system.
///
/// Implementations must treat a response missing the document id or posting
/// date as a hard failure. Calls are expected to carry bounded timeouts; the
/// core never blocks indefinitely on a submission.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Post a journal-entry payload and return the parsed document metadata.
    async fn post_journal_entry(
        &self,
        payload: &serde_json::Value,
    ) -> Result<JournalEntryResult, TallyError>;
}
