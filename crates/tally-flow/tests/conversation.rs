// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end conversation scenarios: capture, clarification, confirmation,
//! posting, and the retry queue fallback.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tally_core::{
    ChartRow, ChartSource, ConfirmationStatus, ConversationState, JournalEntryResult,
    LedgerClient, TallyError,
};
use tally_flow::{
    render_response, FlowConfig, FlowEngine, PostOutcome, PostingCoordinator, ResolveOptions,
    ResponseEvent, TurnOutcome,
};
use tally_storage::{queries::retry_jobs, Database};
use tempfile::tempdir;

struct StaticChart(Vec<ChartRow>);

#[async_trait]
impl ChartSource for StaticChart {
    async fn fetch_chart_of_accounts(&self) -> Result<Vec<ChartRow>, TallyError> {
        Ok(self.0.clone())
    }
}

struct StubLedger {
    fail: bool,
}

#[async_trait]
impl LedgerClient for StubLedger {
    async fn post_journal_entry(
        &self,
        _payload: &serde_json::Value,
    ) -> Result<JournalEntryResult, TallyError> {
        if self.fail {
            return Err(TallyError::Ledger {
                message: "ERPNext unreachable".to_string(),
                source: None,
            });
        }
        Ok(JournalEntryResult {
            journal_entry_id: "JE-1000".to_string(),
            posting_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            voucher_no: "JE-1000".to_string(),
            link: Some("https://erp.example.com/app/journal-entry/JE-1000".to_string()),
        })
    }
}

fn catalog() -> Vec<ChartRow> {
    vec![
        ChartRow::new("Taxi Expense - HQ", "5110").with_aliases(["Taxi"]),
        ChartRow::new("Cash - HQ", "1000").with_aliases(["Cash"]),
        ChartRow::new("Office Supplies - HQ", "5300"),
    ]
}

fn engine() -> FlowEngine {
    FlowEngine::new(FlowConfig::default(), Arc::new(StaticChart(catalog())))
}

async fn open_db() -> (tempfile::TempDir, Database) {
    let dir = tempdir().unwrap();
    let db = Database::open(dir.path().join("tally.db")).await.unwrap();
    (dir, db)
}

#[tokio::test]
async fn single_message_capture_posts_after_confirmation() {
    let (_dir, db) = open_db().await;
    let engine = engine();
    let coordinator = PostingCoordinator::new(db);
    let mut state = ConversationState::new("scenario-capture");

    let outcome = engine
        .handle_turn(&mut state, "Paid $10 cash for taxi", Some("m1"), Some(42))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Preview);

    let draft = state.expense_draft.as_ref().unwrap();
    assert_eq!(draft.debit_account.account_code, "5110");
    assert_eq!(draft.credit_account.account_code, "1000");

    let (reply, event) = render_response(&mut state);
    assert_eq!(event, Some(ResponseEvent::Preview));
    assert!(reply.unwrap().contains("- Amount: 10.00 USD"));

    let outcome = engine
        .handle_turn(&mut state, "Confirm", Some("m2"), Some(42))
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Approved);

    let outcome = coordinator
        .post_expense(&mut state, &StubLedger { fail: false })
        .await
        .unwrap();
    assert!(matches!(outcome, PostOutcome::Posted(_)));

    let (reply, event) = render_response(&mut state);
    assert_eq!(event, Some(ResponseEvent::Confirmation));
    assert!(reply.unwrap().contains("JE-1000"));
}

#[tokio::test]
async fn missing_amount_stops_before_a_draft_exists() {
    let engine = engine();
    let mut state = ConversationState::new("scenario-clarify");

    let outcome = engine
        .handle_turn(&mut state, "paid for taxi with cash", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Clarify(_)));
    assert!(state.expense_draft.is_none());

    let (reply, event) = render_response(&mut state);
    assert_eq!(event, None);
    assert!(reply.unwrap().contains("amount"));

    // Re-stating the expense with an amount recovers in one turn.
    let outcome = engine
        .handle_turn(&mut state, "Paid $12 cash for taxi", None, None)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Preview);
}

#[tokio::test]
async fn ambiguous_accounts_are_settled_by_index_replies() {
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
    let mut state = ConversationState::new("scenario-ambiguous");

    let outcome = engine
        .handle_turn(&mut state, "Paid $30 card for tvl", None, None)
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Clarify(_)));
    assert!(!state.account_candidates.is_empty());

    let (reply, _) = render_response(&mut state);
    assert!(reply.unwrap().contains("1. "));

    let mut turns = 0;
    loop {
        let outcome = engine.handle_turn(&mut state, "1", None, None).await.unwrap();
        turns += 1;
        assert!(turns <= 2, "index replies should settle both roles");
        if outcome == TurnOutcome::Preview {
            break;
        }
    }
    let draft = state.expense_draft.as_ref().unwrap();
    assert_eq!(draft.debit_account.account_code, "5200");
    assert!(!draft.credit_account.is_placeholder());
}

#[tokio::test]
async fn ledger_outage_queues_the_payload_for_retry() {
    let (_dir, db) = open_db().await;
    let engine = engine();
    let coordinator = PostingCoordinator::new(db.clone());
    let mut state = ConversationState::new("scenario-outage");

    engine
        .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
        .await
        .unwrap();
    engine
        .handle_turn(&mut state, "yes", None, None)
        .await
        .unwrap();

    let before = Utc::now();
    let outcome = coordinator
        .post_expense(&mut state, &StubLedger { fail: true })
        .await
        .unwrap();
    let PostOutcome::Queued { job_id, next_run_at } = outcome else {
        panic!("expected queued outcome");
    };
    assert!(next_run_at >= before + chrono::Duration::seconds(59));

    let job = retry_jobs::get(&db, job_id).await.unwrap().unwrap();
    assert_eq!(job.thread_id, "scenario-outage");
    assert_eq!(job.attempts, 0);
    assert!(job.locked_by.is_none());

    // The job is not yet claimable before its due time.
    let acquired = retry_jobs::acquire_due_job(&db, "w1", Utc::now()).await.unwrap();
    assert!(acquired.is_none());

    // The user still sees their attempt as confirmed-with-errors, not lost.
    assert_eq!(state.confirmation_status, ConfirmationStatus::Approved);
    let (reply, _) = render_response(&mut state);
    assert!(reply.unwrap().contains("queued"));
}

#[tokio::test]
async fn cancel_and_restart_share_one_thread_history() {
    let engine = engine();
    let mut state = ConversationState::new("scenario-cancel");

    engine
        .handle_turn(&mut state, "Paid $10 cash for taxi", None, None)
        .await
        .unwrap();
    let outcome = engine
        .handle_turn(&mut state, "no", None, None)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Cancelled);

    let (reply, event) = render_response(&mut state);
    assert_eq!(event, Some(ResponseEvent::Cancellation));
    assert!(reply.unwrap().contains("cancelled"));

    let outcome = engine
        .handle_turn(&mut state, "Paid $15 cash for taxi", None, None)
        .await
        .unwrap();
    assert_eq!(outcome, TurnOutcome::Preview);
    assert_eq!(state.messages.len(), 3);
}
