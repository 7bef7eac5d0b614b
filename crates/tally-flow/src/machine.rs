// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation step functions: parse, resolve, confirm, cancel.
//!
//! Each function mutates a [`ConversationState`] and returns a typed result.
//! Draft mutations happen only after validation succeeds, so a failed step
//! never leaves a partially updated draft behind.

use chrono::Utc;
use tally_core::{
    AccountCandidate, AccountMatch, AccountRole, ChartRow, ClarificationField, ConfirmationStatus,
    ConversationState, ExpenseDraft, TallyError,
};
use tally_parse::{parse_expense_text, rank_account_candidates, HintOrigin, ParsedExpense};
use tracing::{debug, warn};

pub const CONFIRM_COMMANDS: &[&str] = &["confirm", "confirmed", "approve", "approved", "yes", "y"];
pub const CANCEL_COMMANDS: &[&str] = &["cancel", "cancelled", "reject", "rejected", "stop", "no", "n"];
pub const EDIT_COMMANDS: &[&str] = &["edit", "change", "update", "revise"];

/// Thresholds governing account resolution.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    pub auto_select_threshold: f64,
    pub min_candidate_confidence: f64,
    pub max_suggestions: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            auto_select_threshold: 0.85,
            min_candidate_confidence: 0.5,
            max_suggestions: 5,
        }
    }
}

impl ResolveOptions {
    fn validate(&self) -> Result<(), TallyError> {
        if !(0.0 < self.auto_select_threshold && self.auto_select_threshold <= 1.0) {
            return Err(TallyError::Validation(
                "auto_select_threshold must be between 0 and 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_candidate_confidence) {
            return Err(TallyError::Validation(
                "min_candidate_confidence must be between 0 and 1".into(),
            ));
        }
        if self.max_suggestions == 0 {
            return Err(TallyError::Validation(
                "max_suggestions must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

/// Ranked candidates per ledger role from one resolution pass.
#[derive(Debug, Clone, Default)]
pub struct RoleCandidates {
    pub debit: Vec<AccountCandidate>,
    pub credit: Vec<AccountCandidate>,
}

/// Outcome of interpreting a confirmation reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationDecision {
    Approved,
    Rejected,
    Edit,
    Invalid,
}

/// Parse the latest chat message into a structured draft on the state.
///
/// On missing fields the draft is cleared and the missing-field list stored.
/// On success the draft carries placeholder account matches (confidence 0)
/// built from the raw hints, and confirmation resets to pending.
pub fn parse_expense_message(
    state: &mut ConversationState,
    message: &str,
    default_currency: &str,
    source_message_id: Option<&str>,
) -> Result<ParsedExpense, TallyError> {
    let parsed = parse_expense_text(message, Some(default_currency), source_message_id);
    state.account_candidates.clear();
    state.submission = None;
    state.clarifications_needed = parsed.missing_fields.clone();

    if !parsed.missing_fields.is_empty() {
        debug!(missing = ?parsed.missing_fields, "parse left fields unresolved");
        state.expense_draft = None;
        return Ok(parsed);
    }

    let (Some(amount), Some(debit_hint), Some(credit_hint)) =
        (parsed.amount, parsed.debit_hint.as_deref(), parsed.credit_hint.as_deref())
    else {
        // missing_fields should have captured this; guard anyway.
        warn!("parse produced empty missing_fields without critical data");
        state.clarifications_needed = vec![
            ClarificationField::Amount,
            ClarificationField::DebitAccount,
            ClarificationField::CreditAccount,
        ];
        state.expense_draft = None;
        return Ok(parsed);
    };

    let currency = parsed.currency.as_deref().unwrap_or(default_currency);
    let draft = ExpenseDraft::new(
        amount,
        currency,
        placeholder_account(Some(debit_hint), AccountRole::DebitAccount),
        placeholder_account(Some(credit_hint), AccountRole::CreditAccount),
        Utc::now().date_naive(),
        parsed.narration.clone(),
        parsed.source_message_id.clone(),
    )?;
    state.expense_draft = Some(draft);
    state.confirmation_status = ConfirmationStatus::Pending;
    Ok(parsed)
}

/// Resolve debit and credit accounts for the current draft against the
/// chart of accounts.
///
/// Each role resolves independently: an explicit user choice wins; otherwise
/// the top-ranked candidate is auto-accepted when its confidence clears the
/// threshold. Unresolved roles land in `clarifications_needed` and the first
/// unresolved role's candidates are stored for display.
pub fn select_accounts_for_draft(
    state: &mut ConversationState,
    chart_of_accounts: &[ChartRow],
    options: &ResolveOptions,
    debit_choice: Option<&str>,
    credit_choice: Option<&str>,
) -> Result<RoleCandidates, TallyError> {
    options.validate()?;
    let Some(draft) = state.expense_draft.as_ref() else {
        return Err(TallyError::Validation(
            "cannot resolve accounts without an expense draft".into(),
        ));
    };

    let parsed = parse_expense_text(
        &draft.narration,
        Some(&draft.currency),
        draft.source_message_id.as_deref(),
    );
    if parsed.credit_hint_origin == Some(HintOrigin::Inferred) {
        debug!("credit hint was inferred from position; relying on ranking confidence");
    }

    let candidates = RoleCandidates {
        debit: rank_for_role(
            parsed.debit_hint.as_deref(),
            &parsed.keywords,
            chart_of_accounts,
            options,
        ),
        credit: rank_for_role(
            parsed.credit_hint.as_deref(),
            &parsed.keywords,
            chart_of_accounts,
            options,
        ),
    };

    let mut unresolved: Vec<AccountRole> = Vec::new();
    if !resolve_account(
        state,
        AccountRole::DebitAccount,
        &candidates.debit,
        options.auto_select_threshold,
        debit_choice,
    ) {
        unresolved.push(AccountRole::DebitAccount);
    }
    if !resolve_account(
        state,
        AccountRole::CreditAccount,
        &candidates.credit,
        options.auto_select_threshold,
        credit_choice,
    ) {
        unresolved.push(AccountRole::CreditAccount);
    }

    state.clarifications_needed = unresolved.iter().copied().map(Into::into).collect();
    state.account_candidates = match unresolved.first() {
        Some(AccountRole::DebitAccount) => candidates.debit.clone(),
        Some(AccountRole::CreditAccount) => candidates.credit.clone(),
        None => Vec::new(),
    };

    if !unresolved.is_empty() && chart_of_accounts.is_empty() {
        state.record_error(
            "Chart of accounts data is unavailable; unable to auto-select ledgers.",
        );
        return Err(TallyError::Config(
            "chart of accounts catalog is empty; account resolution is impossible".into(),
        ));
    }

    Ok(candidates)
}

/// Interpret the user's confirmation reply and update the status.
pub fn apply_confirmation_decision(
    state: &mut ConversationState,
    user_input: &str,
) -> ConfirmationDecision {
    let normalized = user_input.trim().to_lowercase();
    if normalized.is_empty() {
        state.record_error("Confirmation input is required.");
        return ConfirmationDecision::Invalid;
    }

    if CONFIRM_COMMANDS.contains(&normalized.as_str()) {
        if state.expense_draft.is_none() {
            state.record_error("There is no expense draft to approve.");
            return ConfirmationDecision::Invalid;
        }
        state.confirmation_status = ConfirmationStatus::Approved;
        return ConfirmationDecision::Approved;
    }
    if CANCEL_COMMANDS.contains(&normalized.as_str()) {
        state.confirmation_status = ConfirmationStatus::Rejected;
        return ConfirmationDecision::Rejected;
    }
    if EDIT_COMMANDS.contains(&normalized.as_str()) {
        state.confirmation_status = ConfirmationStatus::Pending;
        return ConfirmationDecision::Edit;
    }

    state.record_error(format!(
        "'{user_input}' is not a valid confirmation command. Reply with confirm, edit, or cancel."
    ));
    state.confirmation_status = ConfirmationStatus::Pending;
    ConfirmationDecision::Invalid
}

/// Clear the current draft and mark the attempt as cancelled.
///
/// Thread history and the error log survive; only the attempt resets.
pub fn cancel_expense_attempt(state: &mut ConversationState, reason: Option<&str>) {
    state.expense_draft = None;
    state.account_candidates.clear();
    state.clarifications_needed.clear();
    state.confirmation_status = ConfirmationStatus::Rejected;
    state.submission = None;
    if let Some(reason) = reason {
        state.record_error(reason);
    }
}

/// Placeholder match carrying the raw hint until ranking resolves the role.
fn placeholder_account(hint: Option<&str>, role: AccountRole) -> AccountMatch {
    let label = hint.map(str::trim).filter(|h| !h.is_empty());
    let code = label
        .map(|h| h.to_lowercase().replace(' ', "_"))
        .unwrap_or_else(|| format!("unresolved_{role}"));
    AccountMatch {
        account_code: code,
        display_name: label.unwrap_or(role.label()).to_string(),
        confidence: 0.0,
    }
}

fn rank_for_role(
    hint: Option<&str>,
    keywords: &[String],
    accounts: &[ChartRow],
    options: &ResolveOptions,
) -> Vec<AccountCandidate> {
    let mut query_terms: Vec<String> = Vec::new();
    if let Some(hint) = hint {
        query_terms.push(hint.to_string());
    }
    query_terms.extend(keywords.iter().cloned());
    if query_terms.is_empty() {
        query_terms.push("expense".to_string());
    }
    rank_account_candidates(
        &query_terms,
        accounts,
        options.max_suggestions,
        options.min_candidate_confidence,
    )
}

fn resolve_account(
    state: &mut ConversationState,
    role: AccountRole,
    candidates: &[AccountCandidate],
    auto_threshold: f64,
    user_choice: Option<&str>,
) -> bool {
    // A role resolved on an earlier pass stays resolved unless the user
    // explicitly picks again.
    if user_choice.is_none()
        && state
            .expense_draft
            .as_ref()
            .is_some_and(|draft| !draft.account(role).is_placeholder())
    {
        return true;
    }

    let chosen = if let Some(choice) = user_choice {
        match_user_choice(candidates, choice)
    } else {
        candidates
            .first()
            .filter(|c| c.confidence >= auto_threshold)
    };

    let Some(candidate) = chosen else {
        return false;
    };
    let Some(draft) = state.expense_draft.as_mut() else {
        return false;
    };

    draft.set_account(
        role,
        AccountMatch {
            account_code: candidate.account_code.clone(),
            display_name: candidate.account_name.clone(),
            confidence: candidate.confidence,
        },
    );
    debug!(
        role = %role,
        code = %candidate.account_code,
        confidence = candidate.confidence,
        "resolved ledger account"
    );
    true
}

/// Match a disambiguation reply against the candidate list: a 1-based index,
/// or a case-insensitive exact account code or name.
fn match_user_choice<'a>(
    candidates: &'a [AccountCandidate],
    choice: &str,
) -> Option<&'a AccountCandidate> {
    let normalized = choice.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    if let Ok(position) = normalized.parse::<usize>() {
        if position >= 1 && position <= candidates.len() {
            return Some(&candidates[position - 1]);
        }
    }
    candidates.iter().find(|c| {
        normalized == c.account_code.to_lowercase() || normalized == c.account_name.to_lowercase()
    })
}
