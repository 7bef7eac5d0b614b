// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state machine, posting coordinator, and reply rendering.
//!
//! The crate splits one chat turn into three layers: [`machine`] holds the
//! pure step functions, [`engine`] routes a turn through them, and
//! [`posting`] submits approved drafts with durable retry. [`render`]
//! formats the outgoing reply from the resulting state.

pub mod engine;
pub mod machine;
pub mod posting;
pub mod render;

pub use engine::{FlowConfig, FlowEngine, FlowState, TurnOutcome};
pub use machine::{
    apply_confirmation_decision, cancel_expense_attempt, parse_expense_message,
    select_accounts_for_draft, ConfirmationDecision, ResolveOptions, RoleCandidates,
};
pub use posting::{build_journal_entry_payload, PostOutcome, PostingCoordinator};
pub use render::{render_response, ResponseEvent, CONFIRMATION_PROMPT};
