// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Tally expense bot.
//!
//! Provides WAL-mode SQLite storage with embedded migrations, a single-writer
//! concurrency model via `tokio-rusqlite`, typed queries for the durable
//! retry queue, and per-thread conversation state checkpoints.

pub mod database;
pub mod migrations;
pub mod queries;

pub use database::Database;
