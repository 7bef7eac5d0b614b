// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-thread conversation state.
//!
//! [`ConversationState`] is the mutable record the state machine operates on.
//! It carries no logic beyond its own invariants: the rolling message window
//! and the append-only error log. One record per chat thread, persisted
//! across turns, never deleted -- cancellation only clears the draft.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    AccountCandidate, ChartRow, ClarificationField, ConfirmationStatus, ExpenseDraft,
    JournalEntryResult,
};

/// Rolling window of recent messages kept per thread. Oldest dropped first.
pub const MAX_RECENT_MESSAGES: usize = 6;

/// A user message retained in the rolling history window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub content: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl RecentMessage {
    pub fn new(
        content: impl Into<String>,
        message_id: Option<String>,
        user_id: Option<i64>,
    ) -> Self {
        Self {
            content: content.into(),
            message_id,
            user_id,
        }
    }
}

/// Conversation checkpoint for a single chat thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub thread_id: String,
    #[serde(default)]
    pub messages: Vec<RecentMessage>,
    #[serde(default)]
    pub expense_draft: Option<ExpenseDraft>,
    #[serde(default)]
    pub clarifications_needed: Vec<ClarificationField>,
    #[serde(default)]
    pub account_candidates: Vec<AccountCandidate>,
    #[serde(default)]
    pub confirmation_status: ConfirmationStatus,
    #[serde(default)]
    pub submission: Option<JournalEntryResult>,
    #[serde(default)]
    pub error_log: Vec<String>,
    /// Count of `error_log` entries already surfaced to the user. Replies
    /// show only entries past this cursor.
    #[serde(default)]
    pub errors_rendered: usize,

    // Transient per-turn inputs, cleared by the handling step.
    #[serde(default)]
    pub pending_message: Option<String>,
    #[serde(default)]
    pub pending_message_id: Option<String>,
    #[serde(default)]
    pub pending_user_id: Option<i64>,

    /// One-shot catalog override consumed by the next resolve step.
    #[serde(default)]
    pub chart_override: Option<Vec<ChartRow>>,
}

impl ConversationState {
    pub fn new(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: thread_id.into(),
            messages: Vec::new(),
            expense_draft: None,
            clarifications_needed: Vec::new(),
            account_candidates: Vec::new(),
            confirmation_status: ConfirmationStatus::Pending,
            submission: None,
            error_log: Vec::new(),
            errors_rendered: 0,
            pending_message: None,
            pending_message_id: None,
            pending_user_id: None,
            chart_override: None,
        }
    }

    /// Append a message, evicting the oldest once the window is full.
    pub fn push_message(&mut self, message: RecentMessage) {
        self.messages.push(message);
        if self.messages.len() > MAX_RECENT_MESSAGES {
            let excess = self.messages.len() - MAX_RECENT_MESSAGES;
            self.messages.drain(..excess);
        }
    }

    /// Add a human-readable error entry. Empty messages are ignored.
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !message.is_empty() {
            self.error_log.push(message);
        }
    }

    /// Error entries not yet surfaced in a reply.
    pub fn unrendered_errors(&self) -> &[String] {
        let start = self.errors_rendered.min(self.error_log.len());
        &self.error_log[start..]
    }

    /// Mark every current error entry as surfaced.
    pub fn mark_errors_rendered(&mut self) {
        self.errors_rendered = self.error_log.len();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(format!("thread-{}", Uuid::new_v4().simple()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(content: &str) -> RecentMessage {
        RecentMessage {
            content: content.to_string(),
            message_id: None,
            user_id: None,
        }
    }

    #[test]
    fn message_window_evicts_oldest_first() {
        let mut state = ConversationState::new("t-window");
        for i in 0..8 {
            state.push_message(msg(&format!("m{i}")));
        }
        assert_eq!(state.messages.len(), MAX_RECENT_MESSAGES);
        assert_eq!(state.messages.first().unwrap().content, "m2");
        assert_eq!(state.messages.last().unwrap().content, "m7");
    }

    #[test]
    fn record_error_skips_empty_entries() {
        let mut state = ConversationState::new("t-errors");
        state.record_error("");
        state.record_error("boom");
        assert_eq!(state.error_log, vec!["boom"]);
    }

    #[test]
    fn default_state_gets_a_generated_thread_id() {
        let a = ConversationState::default();
        let b = ConversationState::default();
        assert!(a.thread_id.starts_with("thread-"));
        assert_ne!(a.thread_id, b.thread_id);
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = ConversationState::new("t-serde");
        state.push_message(msg("Paid $10 cash for taxi"));
        state.record_error("transient");
        let json = serde_json::to_string(&state).unwrap();
        let back: ConversationState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
