// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `tally serve` command implementation.
//!
//! Runs the retry worker against the configured database and ERPNext
//! instance until interrupted.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tally_config::TallyConfig;
use tally_core::{RetryPolicy, TallyError};
use tally_erpnext::ErpNextClient;
use tally_storage::Database;
use tracing::info;

pub async fn run(config: TallyConfig) -> Result<(), TallyError> {
    let db = open_database(&config).await?;
    let client = Arc::new(build_ledger_client(&config)?);
    let policy = retry_policy(&config);
    let poll_interval = Duration::from_secs(config.retry.poll_interval_secs);

    let worker = crate::worker::RetryWorker::new(db, client, policy);
    info!(
        database = %config.storage.database_path,
        poll_secs = config.retry.poll_interval_secs,
        "starting retry worker"
    );

    tokio::select! {
        result = worker.run(poll_interval) => result,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
            Ok(())
        }
    }
}

/// Open the configured database, creating parent directories as needed.
pub(crate) async fn open_database(config: &TallyConfig) -> Result<Database, TallyError> {
    let path = Path::new(&config.storage.database_path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TallyError::Config(format!(
                    "cannot create database directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
    }
    Database::open(path).await
}

/// Build the ERPNext client from config; all four connection fields are
/// required once a command actually talks to the ledger.
pub(crate) fn build_ledger_client(config: &TallyConfig) -> Result<ErpNextClient, TallyError> {
    let erpnext = &config.erpnext;
    let (Some(base_url), Some(api_key), Some(api_secret), Some(company)) = (
        erpnext.base_url.as_deref(),
        erpnext.api_key.as_deref(),
        erpnext.api_secret.as_deref(),
        erpnext.company.as_deref(),
    ) else {
        return Err(TallyError::Config(
            "erpnext.base_url, erpnext.api_key, erpnext.api_secret, and erpnext.company \
             must all be set"
                .into(),
        ));
    };
    ErpNextClient::new(base_url, api_key, api_secret, company)
}

pub(crate) fn retry_policy(config: &TallyConfig) -> RetryPolicy {
    RetryPolicy {
        base: Duration::from_secs(config.retry.base_delay_secs),
        window: Duration::from_secs(config.retry.window_secs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_client_requires_all_connection_fields() {
        let mut config = TallyConfig::default();
        assert!(matches!(
            build_ledger_client(&config),
            Err(TallyError::Config(_))
        ));

        config.erpnext.base_url = Some("https://erp.example.com".to_string());
        config.erpnext.api_key = Some("key".to_string());
        config.erpnext.api_secret = Some("secret".to_string());
        config.erpnext.company = Some("Example Corp".to_string());
        assert!(build_ledger_client(&config).is_ok());
    }

    #[test]
    fn retry_policy_reflects_config_intervals() {
        let config = TallyConfig::default();
        let policy = retry_policy(&config);
        assert_eq!(policy.base, Duration::from_secs(60));
        assert_eq!(policy.window, Duration::from_secs(900));
    }

    #[tokio::test]
    async fn open_database_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = TallyConfig::default();
        config.storage.database_path = dir
            .path()
            .join("nested/dir/tally.db")
            .to_string_lossy()
            .into_owned();
        let db = open_database(&config).await.unwrap();
        db.close().await.unwrap();
    }
}
