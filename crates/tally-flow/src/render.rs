// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-facing message rendering.
//!
//! Pure functions from conversation state to reply text. The precedence in
//! [`render_response`] mirrors the state machine: a finished attempt wins
//! over clarifications, clarifications win over the draft preview, and bare
//! errors surface only when nothing else applies.

use tally_core::{
    AccountCandidate, ClarificationField, ConfirmationStatus, ConversationState, ExpenseDraft,
};

pub const CONFIRMATION_PROMPT: &str =
    "Reply with confirm to post, edit to change the draft, or cancel to abort.";

/// Classification of the outgoing reply, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseEvent {
    Preview,
    Confirmation,
    Cancellation,
}

fn field_label(field: ClarificationField) -> &'static str {
    match field {
        ClarificationField::Amount => "amount",
        ClarificationField::DebitAccount => "debit account",
        ClarificationField::CreditAccount => "credit account",
    }
}

pub fn format_preview(draft: &ExpenseDraft) -> String {
    let narration = if draft.narration.is_empty() {
        "No description provided."
    } else {
        &draft.narration
    };
    [
        "Here is your expense draft:".to_string(),
        format!("- Amount: {:.2} {}", draft.amount, draft.currency),
        format!("- Debit account: {}", draft.debit_account.display_name),
        format!("- Credit account: {}", draft.credit_account.display_name),
        format!("- Narration: {narration}"),
        String::new(),
        CONFIRMATION_PROMPT.to_string(),
    ]
    .join("\n")
}

pub fn format_clarification(missing_fields: &[ClarificationField]) -> String {
    let labels: Vec<&str> = missing_fields.iter().copied().map(field_label).collect();
    format!(
        "I still need the following detail(s) to draft your expense: {}. \
         Please include them in your next message.",
        labels.join(", ")
    )
}

/// Numbered list of account suggestions for the first unresolved role.
pub fn format_candidates(role: ClarificationField, candidates: &[AccountCandidate]) -> String {
    let mut lines = vec![format!(
        "Suggestions for the {}:",
        field_label(role)
    )];
    for (index, candidate) in candidates.iter().enumerate() {
        lines.push(format!(
            "{}. {} ({}) -- {}",
            index + 1,
            candidate.account_name,
            candidate.account_code,
            candidate.reason
        ));
    }
    lines.push("Reply with a number, account code, or account name.".to_string());
    lines.join("\n")
}

pub fn format_confirmation(state: &ConversationState) -> String {
    let reference = state
        .submission
        .as_ref()
        .map(|submission| {
            let link = submission
                .link
                .as_deref()
                .unwrap_or(&submission.journal_entry_id);
            format!(" (ERPNext reference: {link})")
        })
        .unwrap_or_default();
    format!(
        "Expense confirmed and queued for ERPNext{reference}. \
         Send another message when you're ready for the next entry."
    )
}

pub fn format_cancellation(state: &ConversationState) -> String {
    let extra = state
        .error_log
        .last()
        .map(|reason| format!(" Reason: {reason}"))
        .unwrap_or_default();
    format!("Expense attempt cancelled.{extra} You can start over by sending a new message.")
}

fn format_errors(errors: &[String]) -> Option<String> {
    if errors.is_empty() {
        None
    } else {
        Some(errors.join("\n"))
    }
}

fn append_error(message: String, error_text: Option<&str>) -> String {
    match error_text {
        Some(errors) => format!("{message}\n\n{errors}"),
        None => message,
    }
}

/// Render the reply for the current state, if any reply is warranted.
///
/// Only errors recorded since the previous reply are appended; rendering
/// advances the state's error cursor so a fault is surfaced once instead of
/// trailing every later reply.
pub fn render_response(state: &mut ConversationState) -> (Option<String>, Option<ResponseEvent>) {
    let (message, event) = compose_response(state);
    if message.is_some() {
        state.mark_errors_rendered();
    }
    (message, event)
}

fn compose_response(state: &ConversationState) -> (Option<String>, Option<ResponseEvent>) {
    let error_text = format_errors(state.unrendered_errors());

    if state.confirmation_status == ConfirmationStatus::Approved {
        let message = append_error(format_confirmation(state), error_text.as_deref());
        return (Some(message), Some(ResponseEvent::Confirmation));
    }
    if state.confirmation_status == ConfirmationStatus::Rejected && state.expense_draft.is_none() {
        let message = append_error(format_cancellation(state), error_text.as_deref());
        return (Some(message), Some(ResponseEvent::Cancellation));
    }
    if !state.clarifications_needed.is_empty() {
        let mut message = format_clarification(&state.clarifications_needed);
        if !state.account_candidates.is_empty() {
            let role = state.clarifications_needed[0];
            message = format!(
                "{message}\n\n{}",
                format_candidates(role, &state.account_candidates)
            );
        }
        return (Some(append_error(message, error_text.as_deref())), None);
    }
    if let Some(draft) = &state.expense_draft {
        if state.confirmation_status == ConfirmationStatus::Pending {
            let message = append_error(format_preview(draft), error_text.as_deref());
            return (Some(message), Some(ResponseEvent::Preview));
        }
    }
    if let Some(errors) = error_text {
        return (Some(errors), None);
    }
    (None, None)
}
