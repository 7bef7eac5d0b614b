// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits at the boundary of the core.
//!
//! The chat transport, the accounting-system HTTP client, and configuration
//! loading are external collaborators. The core consumes them through these
//! narrow interfaces and is otherwise unaware of their implementation.

pub mod catalog;
pub mod ledger;

pub use catalog::ChartSource;
pub use ledger::LedgerClient;
