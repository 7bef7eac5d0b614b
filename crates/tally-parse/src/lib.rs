// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expense message parsing and account candidate ranking.
//!
//! [`parse_expense_text`] turns a free-form chat message into a structured
//! [`ParsedExpense`]; [`rank_account_candidates`] scores chart-of-accounts
//! rows against the extracted hints and keywords. Both are pure functions so
//! the conversation flow can replay them deterministically.

pub mod expense;
pub mod fuzzy;
pub mod ranker;

pub use expense::{parse_expense_text, HintOrigin, ParsedExpense};
pub use ranker::rank_account_candidates;
