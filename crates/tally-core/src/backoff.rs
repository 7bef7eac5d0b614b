// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Retry backoff policy for failed ledger submissions.
//!
//! Delays double from a one-minute base (1, 2, 4, 8 minutes) and are capped
//! so the cumulative wait never exceeds a fifteen-minute policy window. The
//! attempt cap itself lives in [`crate::types::MAX_RETRY_ATTEMPTS`].

use std::time::Duration;

/// Exponential backoff bounded by a cumulative policy window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay before the first retry.
    pub base: Duration,
    /// Ceiling on the total time spent waiting across all retries.
    pub window: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(60),
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl RetryPolicy {
    /// Delay to apply after the failure numbered `attempts` (zero-based:
    /// the first failure passes 0 and waits one base interval).
    ///
    /// The raw delay is `base * 2^attempts`, clamped so the cumulative wait
    /// across all prior delays never exceeds the policy window.
    pub fn delay_for(&self, attempts: u32) -> Duration {
        let mut elapsed = Duration::ZERO;
        for n in 0..=attempts {
            let raw = self
                .base
                .checked_mul(1u32 << n.min(31))
                .unwrap_or(self.window);
            let remaining = self.window.saturating_sub(elapsed);
            let delay = raw.min(remaining);
            if n == attempts {
                return delay;
            }
            elapsed += delay;
        }
        Duration::ZERO
    }

    /// Delay before the very first retry, used when a fresh job is enqueued.
    pub fn first_delay(&self) -> Duration {
        self.delay_for(0)
    }
}
