// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Tally expense bot.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Tally configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable
/// overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Chat bot behavior settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Account resolution thresholds.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// ERPNext ledger connection settings.
    #[serde(default)]
    pub erpnext: ErpNextConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Retry queue and backoff settings.
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Chat bot behavior configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BotConfig {
    /// Currency assumed when a message carries a bare amount.
    #[serde(default = "default_currency")]
    pub default_currency: String,

    /// Chat user ids allowed to capture expenses. An empty list imposes no
    /// restriction.
    #[serde(default)]
    pub allowed_user_ids: Vec<i64>,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            allowed_user_ids: Vec::new(),
            log_level: default_log_level(),
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Account resolution thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ResolverConfig {
    /// A top candidate at or above this confidence is selected without
    /// asking the user.
    #[serde(default = "default_auto_select_threshold")]
    pub auto_select_threshold: f64,

    /// Candidates below this confidence are never shown.
    #[serde(default = "default_min_candidate_confidence")]
    pub min_candidate_confidence: f64,

    /// Maximum number of suggestions presented per clarification.
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            auto_select_threshold: default_auto_select_threshold(),
            min_candidate_confidence: default_min_candidate_confidence(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

fn default_auto_select_threshold() -> f64 {
    0.85
}

fn default_min_candidate_confidence() -> f64 {
    0.5
}

fn default_max_suggestions() -> usize {
    5
}

/// ERPNext ledger connection configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ErpNextConfig {
    /// Base URL of the ERPNext instance, e.g. `https://erp.example.com`.
    #[serde(default)]
    pub base_url: Option<String>,

    /// API key for token authentication.
    #[serde(default)]
    pub api_key: Option<String>,

    /// API secret for token authentication.
    #[serde(default)]
    pub api_secret: Option<String>,

    /// Company whose chart of accounts is queried and whose journal
    /// entries are created.
    #[serde(default)]
    pub company: Option<String>,
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tally").join("tally.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("tally.db"))
        .to_string_lossy()
        .into_owned()
}

/// Retry queue and backoff configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetryConfig {
    /// Seconds between retry worker polls of the queue.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// First retry delay in seconds. Subsequent delays double.
    #[serde(default = "default_base_delay_secs")]
    pub base_delay_secs: u64,

    /// Total retry window in seconds. No delay schedules a run past it.
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            base_delay_secs: default_base_delay_secs(),
            window_secs: default_window_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_base_delay_secs() -> u64 {
    60
}

fn default_window_secs() -> u64 {
    900
}
