// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Interface to the live chart-of-accounts catalog.

use async_trait::async_trait;

use crate::error::TallyError;
use crate::types::ChartRow;

/// Fetches the chart of accounts for ranking.
///
/// A fetch failure is recoverable: the resolve step records a user-facing
/// error and leaves the draft unresolved for the next turn.
#[async_trait]
pub trait ChartSource: Send + Sync {
    async fn fetch_chart_of_accounts(&self) -> Result<Vec<ChartRow>, TallyError>;
}
