// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use std::path::Path;

use tally_core::TallyError;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Handle to the SQLite database. Cheap to clone; all clones share the
/// single writer thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, run pending migrations, and
    /// apply connection pragmas.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, TallyError> {
        let path = path.as_ref().to_path_buf();

        // Migrations run on a short-lived blocking connection before the
        // writer connection is handed out.
        let migrate_path = path.clone();
        tokio::task::spawn_blocking(move || -> Result<(), TallyError> {
            let mut conn = rusqlite::Connection::open(&migrate_path)
                .map_err(|e| TallyError::Storage { source: Box::new(e) })?;
            migrations::run_migrations(&mut conn)
        })
        .await
        .map_err(|e| TallyError::Internal(format!("migration task failed: {e}")))??;

        // tokio-rusqlite's open surfaces the underlying rusqlite error.
        let conn = Connection::open(&path)
            .await
            .map_err(|e| TallyError::Storage { source: Box::new(e) })?;
        conn.call(|conn| {
            conn.pragma_update(None, "journal_mode", "WAL")?;
            conn.pragma_update(None, "synchronous", "NORMAL")?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            conn.pragma_update(None, "busy_timeout", 5000)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;

        debug!(path = %path.display(), "database opened");
        Ok(Self { conn })
    }

    /// The underlying tokio-rusqlite connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush and close the connection. Remaining clones become unusable.
    pub async fn close(self) -> Result<(), TallyError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Convert a tokio-rusqlite error into the crate error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> TallyError {
    TallyError::Storage { source: Box::new(e) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_schema() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("tally.db")).await.unwrap();

        let tables: Vec<String> = db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
                )?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok::<_, rusqlite::Error>(names)
            })
            .await
            .unwrap();

        assert!(tables.contains(&"retry_jobs".to_string()));
        assert!(tables.contains(&"thread_states".to_string()));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn reopen_is_idempotent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tally.db");

        let db = Database::open(&path).await.unwrap();
        db.close().await.unwrap();

        // Second open replays no migrations and succeeds.
        let db = Database::open(&path).await.unwrap();
        db.close().await.unwrap();
    }
}
