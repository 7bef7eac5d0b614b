// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation state checkpoints, one row per chat thread.
//!
//! The state is stored as a JSON document so schema evolution happens in the
//! domain type, not in SQL. Unknown fields in old checkpoints deserialize
//! through `serde(default)` on [`ConversationState`].

use rusqlite::params;
use tally_core::{ConversationState, TallyError};

use crate::database::{map_tr_err, Database};

/// Persist the latest state for a thread, replacing any previous checkpoint.
pub async fn upsert(db: &Database, state: &ConversationState) -> Result<(), TallyError> {
    let thread_id = state.thread_id.clone();
    let document = serde_json::to_string(state)
        .map_err(|e| TallyError::Internal(format!("failed to serialize thread state: {e}")))?;
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO thread_states (thread_id, state, updated_at)
                 VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
                 ON CONFLICT(thread_id) DO UPDATE SET
                     state = excluded.state,
                     updated_at = excluded.updated_at",
                params![thread_id, document],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Load the checkpoint for a thread, if one exists.
pub async fn get(db: &Database, thread_id: &str) -> Result<Option<ConversationState>, TallyError> {
    let thread_id = thread_id.to_string();
    let document: Option<String> = db
        .connection()
        .call(move |conn| {
            match conn.query_row(
                "SELECT state FROM thread_states WHERE thread_id = ?1",
                params![thread_id],
                |row| row.get(0),
            ) {
                Ok(doc) => Ok(Some(doc)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)?;

    document
        .map(|doc| {
            serde_json::from_str(&doc).map_err(|e| {
                TallyError::Internal(format!("corrupt thread state checkpoint: {e}"))
            })
        })
        .transpose()
}

/// Drop the checkpoint for a thread.
pub async fn delete(db: &Database, thread_id: &str) -> Result<(), TallyError> {
    let thread_id = thread_id.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM thread_states WHERE thread_id = ?1",
                params![thread_id],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}
