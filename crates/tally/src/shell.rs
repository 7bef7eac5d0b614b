// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally shell` command implementation.
//!
//! Interactive expense capture from the terminal. Each input line is one
//! conversation turn; state persists per session thread so a capture can be
//! resumed after a restart with the same thread id.

use std::sync::Arc;

use tally_config::TallyConfig;
use tally_core::{ConversationState, TallyError};
use tally_flow::{
    render_response, FlowConfig, FlowEngine, PostOutcome, PostingCoordinator, ResolveOptions,
    TurnOutcome,
};
use tally_storage::queries::thread_states;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::debug;

const SHELL_THREAD_ID: &str = "shell-session";

pub async fn run(config: TallyConfig) -> Result<(), TallyError> {
    let db = crate::serve::open_database(&config).await?;
    let client = Arc::new(crate::serve::build_ledger_client(&config)?);
    let coordinator =
        PostingCoordinator::with_policy(db.clone(), crate::serve::retry_policy(&config));

    let flow_config = FlowConfig {
        default_currency: config.bot.default_currency.clone(),
        allowed_user_ids: config.bot.allowed_user_ids.clone(),
        resolve: ResolveOptions {
            auto_select_threshold: config.resolver.auto_select_threshold,
            min_candidate_confidence: config.resolver.min_candidate_confidence,
            max_suggestions: config.resolver.max_suggestions,
        },
    };
    let engine = FlowEngine::new(flow_config, client.clone());

    let mut state = thread_states::get(&db, SHELL_THREAD_ID)
        .await?
        .unwrap_or_else(|| ConversationState::new(SHELL_THREAD_ID));

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    stdout
        .write_all(b"tally shell: describe an expense, or press Ctrl-D to exit\n> ")
        .await
        .map_err(io_err)?;
    stdout.flush().await.map_err(io_err)?;

    while let Some(line) = lines.next_line().await.map_err(io_err)? {
        if line.trim().is_empty() {
            stdout.write_all(b"> ").await.map_err(io_err)?;
            stdout.flush().await.map_err(io_err)?;
            continue;
        }

        match engine.handle_turn(&mut state, &line, None, None).await {
            Ok(TurnOutcome::Approved) => {
                match coordinator.post_expense(&mut state, client.as_ref()).await {
                    Ok(PostOutcome::Posted(result)) => {
                        debug!(journal_entry_id = %result.journal_entry_id, "posted from shell");
                    }
                    Ok(PostOutcome::Queued { job_id, .. }) => {
                        debug!(job_id, "submission queued for retry");
                    }
                    Err(err) => state.record_error(err.to_string()),
                }
            }
            Ok(_) => {}
            Err(err) => state.record_error(err.to_string()),
        }

        if let (Some(reply), _) = render_response(&mut state) {
            stdout
                .write_all(format!("{reply}\n").as_bytes())
                .await
                .map_err(io_err)?;
        }
        thread_states::upsert(&db, &state).await?;

        stdout.write_all(b"> ").await.map_err(io_err)?;
        stdout.flush().await.map_err(io_err)?;
    }

    thread_states::upsert(&db, &state).await?;
    Ok(())
}

fn io_err(e: std::io::Error) -> TallyError {
    TallyError::Internal(format!("terminal i/o: {e}"))
}
