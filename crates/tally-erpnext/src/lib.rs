// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! ERPNext REST integration for the Tally expense bot.
//!
//! [`ErpNextClient`] speaks the ERPNext document API: chart of accounts
//! queries and journal entry creation with token authentication.

pub mod client;

pub use client::ErpNextClient;
