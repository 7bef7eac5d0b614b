// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query functions. Each module covers one table.

pub mod retry_jobs;
pub mod thread_states;
