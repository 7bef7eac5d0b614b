// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turn-level routing for the expense conversation.
//!
//! [`FlowEngine`] drives one chat turn through the closed set of
//! [`FlowState`] routes. Routing is decided once per turn from the stored
//! state, never by string inspection mid-flight: a turn either lands in the
//! confirmation handler, continues an account disambiguation, or starts a
//! fresh capture.

use std::sync::Arc;

use tally_core::{
    ChartSource, ClarificationField, ConfirmationStatus, ConversationState, RecentMessage,
    TallyError,
};
use tally_parse::parse_expense_text;
use tracing::{debug, warn};

use crate::machine::{
    apply_confirmation_decision, cancel_expense_attempt, parse_expense_message,
    select_accounts_for_draft, ConfirmationDecision, ResolveOptions,
};

/// Route derived from the stored conversation state at the start of a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// No draft yet; the next message is parsed as a new expense.
    Collecting,
    /// A draft exists but account roles still need disambiguation.
    Resolving,
    /// A complete draft awaits a confirm / edit / cancel reply.
    Confirming,
    /// The previous attempt was approved; the next message starts a new one.
    Approved,
    /// The previous attempt was cancelled; the next message starts a new one.
    Rejected,
}

impl FlowState {
    pub fn of(state: &ConversationState) -> Self {
        match (&state.expense_draft, state.confirmation_status) {
            (_, ConfirmationStatus::Approved) => FlowState::Approved,
            (_, ConfirmationStatus::Rejected) => FlowState::Rejected,
            (Some(_), ConfirmationStatus::Pending) if state.clarifications_needed.is_empty() => {
                FlowState::Confirming
            }
            (Some(_), ConfirmationStatus::Pending) => FlowState::Resolving,
            (None, ConfirmationStatus::Pending) => FlowState::Collecting,
        }
    }
}

/// What one handled turn produced, for the caller to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// A complete draft is ready for confirmation.
    Preview,
    /// The listed fields are still missing or ambiguous.
    Clarify(Vec<ClarificationField>),
    /// The user approved the draft; it is ready to post.
    Approved,
    /// The user cancelled the attempt.
    Cancelled,
    /// The user asked to edit; the draft was discarded for re-capture.
    EditRequested,
    /// The reply was not a recognized confirmation command.
    Invalid,
    /// A transient fault (catalog fetch failure) was recorded; retry later.
    Faulted,
}

#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub default_currency: String,
    /// When non-empty, only these user ids may capture expenses.
    pub allowed_user_ids: Vec<i64>,
    pub resolve: ResolveOptions,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            default_currency: "USD".to_string(),
            allowed_user_ids: Vec::new(),
            resolve: ResolveOptions::default(),
        }
    }
}

pub struct FlowEngine {
    config: FlowConfig,
    chart_source: Arc<dyn ChartSource>,
}

impl FlowEngine {
    pub fn new(config: FlowConfig, chart_source: Arc<dyn ChartSource>) -> Self {
        Self {
            config,
            chart_source,
        }
    }

    /// Handle one incoming chat message for `state`.
    ///
    /// Authorization is checked before any mutation: a denied turn leaves
    /// the state untouched. Empty messages are rejected the same way.
    pub async fn handle_turn(
        &self,
        state: &mut ConversationState,
        message: &str,
        message_id: Option<&str>,
        user_id: Option<i64>,
    ) -> Result<TurnOutcome, TallyError> {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Err(TallyError::Validation("message text is required".into()));
        }
        if !self.config.allowed_user_ids.is_empty() {
            let authorized = user_id.is_some_and(|id| self.config.allowed_user_ids.contains(&id));
            if !authorized {
                warn!(?user_id, "denied turn from unauthorized user");
                return Err(TallyError::Unauthorized { user_id });
            }
        }

        state.pending_message = Some(trimmed.to_string());
        state.pending_message_id = message_id.map(str::to_string);
        state.pending_user_id = user_id;
        state.push_message(RecentMessage::new(
            trimmed,
            message_id.map(str::to_string),
            user_id,
        ));

        let route = FlowState::of(state);
        debug!(thread_id = %state.thread_id, ?route, "routing turn");
        let outcome = match route {
            FlowState::Confirming => self.confirm_turn(state, trimmed),
            FlowState::Resolving => {
                // A message that parses as a complete expense supersedes the
                // pending disambiguation and starts a new capture. Anything
                // partial (a bare number, a code, an account name) is a
                // choice reply.
                let peek = parse_expense_text(
                    trimmed,
                    Some(&self.config.default_currency),
                    message_id,
                );
                if peek.missing_fields.is_empty() {
                    self.capture_turn(state, trimmed, message_id).await
                } else {
                    self.choice_turn(state, trimmed).await
                }
            }
            FlowState::Collecting | FlowState::Approved | FlowState::Rejected => {
                self.capture_turn(state, trimmed, message_id).await
            }
        };

        state.pending_message = None;
        state.pending_message_id = None;
        state.pending_user_id = None;
        outcome
    }

    async fn capture_turn(
        &self,
        state: &mut ConversationState,
        message: &str,
        message_id: Option<&str>,
    ) -> Result<TurnOutcome, TallyError> {
        if state.confirmation_status != ConfirmationStatus::Pending {
            state.confirmation_status = ConfirmationStatus::Pending;
            state.submission = None;
        }
        parse_expense_message(state, message, &self.config.default_currency, message_id)?;
        if !state.clarifications_needed.is_empty() {
            return Ok(TurnOutcome::Clarify(state.clarifications_needed.clone()));
        }
        self.resolve_turn(state, None, None).await
    }

    async fn choice_turn(
        &self,
        state: &mut ConversationState,
        choice: &str,
    ) -> Result<TurnOutcome, TallyError> {
        let target = state.clarifications_needed.first().copied();
        let (debit_choice, credit_choice) = match target {
            Some(ClarificationField::DebitAccount) => (Some(choice), None),
            Some(ClarificationField::CreditAccount) => (None, Some(choice)),
            _ => (None, None),
        };
        let outcome = self.resolve_turn(state, debit_choice, credit_choice).await?;
        if let Some(field) = target {
            if state.clarifications_needed.contains(&field) {
                state.record_error(format!(
                    "'{choice}' did not match any of the suggested accounts."
                ));
            }
        }
        Ok(outcome)
    }

    async fn resolve_turn(
        &self,
        state: &mut ConversationState,
        debit_choice: Option<&str>,
        credit_choice: Option<&str>,
    ) -> Result<TurnOutcome, TallyError> {
        let chart = match state.chart_override.take() {
            Some(rows) => rows,
            None => match self.chart_source.fetch_chart_of_accounts().await {
                Ok(rows) => rows,
                Err(err) => {
                    warn!(error = %err, "chart of accounts fetch failed");
                    state.record_error(
                        "Unable to fetch the chart of accounts right now. Please try again.",
                    );
                    return Ok(TurnOutcome::Faulted);
                }
            },
        };
        select_accounts_for_draft(
            state,
            &chart,
            &self.config.resolve,
            debit_choice,
            credit_choice,
        )?;
        if state.clarifications_needed.is_empty() {
            Ok(TurnOutcome::Preview)
        } else {
            Ok(TurnOutcome::Clarify(state.clarifications_needed.clone()))
        }
    }

    fn confirm_turn(
        &self,
        state: &mut ConversationState,
        reply: &str,
    ) -> Result<TurnOutcome, TallyError> {
        match apply_confirmation_decision(state, reply) {
            ConfirmationDecision::Approved => Ok(TurnOutcome::Approved),
            ConfirmationDecision::Rejected => {
                cancel_expense_attempt(state, Some("User cancelled the expense."));
                Ok(TurnOutcome::Cancelled)
            }
            ConfirmationDecision::Edit => {
                cancel_expense_attempt(state, Some("User requested edits."));
                state.confirmation_status = ConfirmationStatus::Pending;
                Ok(TurnOutcome::EditRequested)
            }
            ConfirmationDecision::Invalid => Ok(TurnOutcome::Invalid),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tally_core::ChartRow;

    struct StaticChart(Vec<ChartRow>);

    #[async_trait]
    impl ChartSource for StaticChart {
        async fn fetch_chart_of_accounts(&self) -> Result<Vec<ChartRow>, TallyError> {
            Ok(self.0.clone())
        }
    }

    struct FailingChart;

    #[async_trait]
    impl ChartSource for FailingChart {
        async fn fetch_chart_of_accounts(&self) -> Result<Vec<ChartRow>, TallyError> {
            Err(TallyError::Ledger {
                message: "connection refused".to_string(),
                source: None,
            })
        }
    }

    fn catalog() -> Vec<ChartRow> {
        vec![
            ChartRow::new("Taxi Expense - HQ", "5110").with_aliases(["Taxi"]),
            ChartRow::new("Cash - HQ", "1000").with_aliases(["Cash"]),
        ]
    }

    fn engine(chart: Vec<ChartRow>) -> FlowEngine {
        FlowEngine::new(FlowConfig::default(), Arc::new(StaticChart(chart)))
    }

    #[tokio::test]
    async fn full_turn_reaches_preview_then_approval() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");

        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", Some("m1"), Some(7))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
        assert_eq!(FlowState::of(&state), FlowState::Confirming);

        let outcome = engine
            .handle_turn(&mut state, "confirm", Some("m2"), Some(7))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Approved);
        assert_eq!(FlowState::of(&state), FlowState::Approved);
        assert_eq!(state.messages.len(), 2);
    }

    #[tokio::test]
    async fn empty_message_is_rejected_before_any_mutation() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");
        let err = engine
            .handle_turn(&mut state, "   ", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
        assert!(state.messages.is_empty());
    }

    #[tokio::test]
    async fn allow_list_denies_outsiders_without_mutation() {
        let config = FlowConfig {
            allowed_user_ids: vec![7],
            ..FlowConfig::default()
        };
        let engine = FlowEngine::new(config, Arc::new(StaticChart(catalog())));
        let mut state = ConversationState::new("t-engine");

        let err = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, Some(99))
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::Unauthorized { user_id: Some(99) }));
        assert!(state.messages.is_empty());
        assert!(state.expense_draft.is_none());

        // Member of the list gets through.
        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, Some(7))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
    }

    #[tokio::test]
    async fn empty_allow_list_imposes_no_restriction() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");
        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, Some(12345))
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
    }

    #[tokio::test]
    async fn missing_amount_asks_for_clarification() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");
        let outcome = engine
            .handle_turn(&mut state, "paid for taxi with cash", None, None)
            .await
            .unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::Clarify(vec![ClarificationField::Amount])
        );
        assert_eq!(FlowState::of(&state), FlowState::Collecting);
    }

    #[tokio::test]
    async fn ambiguous_roles_resolve_through_numbered_choices() {
        let ambiguous = vec![
            ChartRow::new("Travel Costs - HQ", "5200"),
            ChartRow::new("Transport Misc - HQ", "5210"),
        ];
        let config = FlowConfig {
            resolve: ResolveOptions {
                min_candidate_confidence: 0.1,
                ..ResolveOptions::default()
            },
            ..FlowConfig::default()
        };
        let engine = FlowEngine::new(config, Arc::new(StaticChart(ambiguous)));
        let mut state = ConversationState::new("t-engine");

        let outcome = engine
            .handle_turn(&mut state, "Paid $30 card for tvl", None, None)
            .await
            .unwrap();
        let TurnOutcome::Clarify(fields) = outcome else {
            panic!("expected clarification");
        };
        assert!(!fields.is_empty());
        assert_eq!(FlowState::of(&state), FlowState::Resolving);
        assert!(!state.account_candidates.is_empty());

        // Answer each pending role by 1-based index until the preview lands.
        let mut guard = 0;
        loop {
            let outcome = engine.handle_turn(&mut state, "1", None, None).await.unwrap();
            match outcome {
                TurnOutcome::Preview => break,
                TurnOutcome::Clarify(_) => {
                    guard += 1;
                    assert!(guard < 3, "choice loop did not converge");
                }
                other => panic!("unexpected outcome {other:?}"),
            }
        }
        let draft = state.expense_draft.as_ref().unwrap();
        assert!(!draft.debit_account.is_placeholder());
        assert!(!draft.credit_account.is_placeholder());
    }

    #[tokio::test]
    async fn new_expense_message_supersedes_pending_disambiguation() {
        let ambiguous = vec![
            ChartRow::new("Travel Costs - HQ", "5200"),
            ChartRow::new("Transport Misc - HQ", "5210"),
            ChartRow::new("Cash - HQ", "1000").with_aliases(["Cash"]),
            ChartRow::new("Taxi Expense - HQ", "5110").with_aliases(["Taxi"]),
        ];
        let config = FlowConfig {
            resolve: ResolveOptions {
                min_candidate_confidence: 0.1,
                ..ResolveOptions::default()
            },
            ..FlowConfig::default()
        };
        let engine = FlowEngine::new(config, Arc::new(StaticChart(ambiguous)));
        let mut state = ConversationState::new("t-engine");

        engine
            .handle_turn(&mut state, "Paid $30 card for tvl", None, None)
            .await
            .unwrap();
        assert_eq!(FlowState::of(&state), FlowState::Resolving);

        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
        let draft = state.expense_draft.as_ref().unwrap();
        assert_eq!(draft.debit_account.account_code, "5110");
    }

    #[tokio::test]
    async fn cancel_then_next_message_starts_fresh() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");

        engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        let outcome = engine
            .handle_turn(&mut state, "cancel", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert!(state.expense_draft.is_none());
        assert_eq!(FlowState::of(&state), FlowState::Rejected);

        let outcome = engine
            .handle_turn(&mut state, "Paid $20 cash for taxi", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
        assert_eq!(state.confirmation_status, ConfirmationStatus::Pending);
    }

    #[tokio::test]
    async fn edit_discards_draft_but_stays_pending() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");

        engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        let outcome = engine
            .handle_turn(&mut state, "edit", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::EditRequested);
        assert!(state.expense_draft.is_none());
        assert_eq!(FlowState::of(&state), FlowState::Collecting);
    }

    #[tokio::test]
    async fn invalid_confirmation_reply_keeps_the_draft() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");

        engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        let outcome = engine
            .handle_turn(&mut state, "perhaps", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Invalid);
        assert!(state.expense_draft.is_some());
        assert_eq!(FlowState::of(&state), FlowState::Confirming);
    }

    #[tokio::test]
    async fn chart_fetch_failure_is_a_recoverable_fault() {
        let engine = FlowEngine::new(FlowConfig::default(), Arc::new(FailingChart));
        let mut state = ConversationState::new("t-engine");
        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Faulted);
        assert!(state
            .error_log
            .iter()
            .any(|e| e.contains("chart of accounts")));
        // Draft survives so a later turn can retry resolution.
        assert!(state.expense_draft.is_some());
    }

    #[tokio::test]
    async fn chart_override_is_consumed_once() {
        let engine = FlowEngine::new(FlowConfig::default(), Arc::new(FailingChart));
        let mut state = ConversationState::new("t-engine");
        state.chart_override = Some(catalog());

        let outcome = engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
        assert!(state.chart_override.is_none());
    }

    #[tokio::test]
    async fn approval_clears_before_next_capture() {
        let engine = engine(catalog());
        let mut state = ConversationState::new("t-engine");

        engine
            .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
            .await
            .unwrap();
        engine.handle_turn(&mut state, "yes", None, None).await.unwrap();
        assert_eq!(FlowState::of(&state), FlowState::Approved);

        let outcome = engine
            .handle_turn(&mut state, "Paid $25 cash for taxi", None, None)
            .await
            .unwrap();
        assert_eq!(outcome, TurnOutcome::Preview);
        assert_eq!(state.confirmation_status, ConfirmationStatus::Pending);
        assert!(state.submission.is_none());
    }
}
