// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the ERPNext REST API.
//!
//! Provides [`ErpNextClient`] which handles token authentication, chart of
//! accounts retrieval, and journal entry creation. Implements the
//! [`ChartSource`] and [`LedgerClient`] traits so the conversation flow and
//! retry worker stay transport-agnostic.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, HeaderValue};
use tally_core::{ChartRow, ChartSource, JournalEntryResult, LedgerClient, TallyError};
use tracing::debug;

/// Account fields requested from ERPNext.
const ACCOUNT_FIELDS: &[&str] = &[
    "name",
    "account_name",
    "account_number",
    "is_group",
    "root_type",
    "report_type",
    "company",
    "parent_account",
];

/// Page size for chart of accounts queries.
const DEFAULT_PAGE_LENGTH: u32 = 500;

/// Client for ERPNext REST operations.
#[derive(Debug, Clone)]
pub struct ErpNextClient {
    client: reqwest::Client,
    base_url: String,
    company: String,
}

impl ErpNextClient {
    /// Creates a new ERPNext client authenticated via API key and secret.
    pub fn new(
        base_url: &str,
        api_key: &str,
        api_secret: &str,
        company: &str,
    ) -> Result<Self, TallyError> {
        let auth = format!("token {api_key}:{api_secret}");
        let mut headers = HeaderMap::new();
        headers.insert(
            "Authorization",
            HeaderValue::from_str(&auth)
                .map_err(|e| TallyError::Config(format!("invalid API credentials: {e}")))?,
        );
        headers.insert("Accept", HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| TallyError::Ledger {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            company: company.to_string(),
        })
    }

    /// The company whose ledger this client targets.
    pub fn company(&self) -> &str {
        &self.company
    }

    /// Overrides the base URL (for testing with wiremock).
    #[cfg(test)]
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Fetch leaf accounts for the configured company, ordered by name.
    async fn fetch_accounts(&self) -> Result<Vec<ChartRow>, TallyError> {
        let fields = serde_json::to_string(ACCOUNT_FIELDS)
            .map_err(|e| TallyError::Internal(format!("field list serialization: {e}")))?;
        let filters = serde_json::json!([
            ["company", "=", self.company],
            ["is_group", "=", 0],
        ])
        .to_string();

        let url = format!("{}/api/resource/Account", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fields", fields.as_str()),
                ("filters", filters.as_str()),
                ("limit_page_length", &DEFAULT_PAGE_LENGTH.to_string()),
                ("order_by", "account_name asc"),
            ])
            .send()
            .await
            .map_err(|e| ledger_err("ERPNext request failed", e))?;

        let body = check_status(response).await?;
        let payload: serde_json::Value =
            serde_json::from_str(&body).map_err(|e| TallyError::Ledger {
                message: format!("ERPNext response was not valid JSON: {e}"),
                source: Some(Box::new(e)),
            })?;

        let Some(accounts) = payload.get("data").and_then(|d| d.as_array()) else {
            return Err(TallyError::Ledger {
                message: "unexpected ERPNext response format for accounts".to_string(),
                source: None,
            });
        };

        let rows: Vec<ChartRow> = accounts
            .iter()
            .filter_map(|row| serde_json::from_value(row.clone()).ok())
            .collect();
        debug!(count = rows.len(), company = %self.company, "fetched chart of accounts");
        Ok(rows)
    }

    /// Create a journal entry. The company is filled in when the payload
    /// leaves it unset.
    async fn create_journal_entry(
        &self,
        payload: &serde_json::Value,
    ) -> Result<JournalEntryResult, TallyError> {
        let mut body = payload.clone();
        if let Some(map) = body.as_object_mut() {
            map.entry("company")
                .or_insert_with(|| serde_json::Value::String(self.company.clone()));
        }

        let url = format!("{}/api/resource/Journal Entry", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ledger_err("ERPNext request failed", e))?;

        let text = check_status(response).await?;
        let payload: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| TallyError::Ledger {
                message: format!("ERPNext response was not valid JSON: {e}"),
                source: Some(Box::new(e)),
            })?;

        let Some(data) = payload.get("data").and_then(|d| d.as_object()) else {
            return Err(TallyError::Ledger {
                message: "ERPNext response is missing journal entry data".to_string(),
                source: None,
            });
        };

        let entry_id = data.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let posting_date_str = data
            .get("posting_date")
            .and_then(|v| v.as_str())
            .unwrap_or("");
        if entry_id.is_empty() || posting_date_str.is_empty() {
            return Err(TallyError::Ledger {
                message: "ERPNext response missing required fields (name/posting_date)"
                    .to_string(),
                source: None,
            });
        }

        let posting_date = NaiveDate::parse_from_str(posting_date_str, "%Y-%m-%d").map_err(
            |e| TallyError::Ledger {
                message: format!("invalid posting_date returned from ERPNext: {posting_date_str}"),
                source: Some(Box::new(e)),
            },
        )?;

        // Voucher field fallbacks differ across ERPNext versions.
        let voucher = data
            .get("voucher_number")
            .or_else(|| data.get("voucher_no"))
            .and_then(|v| v.as_str())
            .unwrap_or(entry_id)
            .to_string();

        let link = data
            .get("link")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("{}/app/journal-entry/{entry_id}", self.base_url));

        Ok(JournalEntryResult {
            journal_entry_id: entry_id.to_string(),
            posting_date,
            voucher_no: voucher,
            link: Some(link),
        })
    }
}

#[async_trait]
impl ChartSource for ErpNextClient {
    async fn fetch_chart_of_accounts(&self) -> Result<Vec<ChartRow>, TallyError> {
        self.fetch_accounts().await
    }
}

#[async_trait]
impl LedgerClient for ErpNextClient {
    async fn post_journal_entry(
        &self,
        payload: &serde_json::Value,
    ) -> Result<JournalEntryResult, TallyError> {
        self.create_journal_entry(payload).await
    }
}

fn ledger_err(context: &str, e: reqwest::Error) -> TallyError {
    TallyError::Ledger {
        message: format!("{context}: {e}"),
        source: Some(Box::new(e)),
    }
}

/// Return the response body on success, or a ledger error carrying the
/// ERPNext error detail when the status is not 2xx.
async fn check_status(response: reqwest::Response) -> Result<String, TallyError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ledger_err("failed to read ERPNext response body", e))?;

    if status.is_success() {
        return Ok(body);
    }

    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("exc_type"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| format!("ERPNext error {status}"));

    Err(TallyError::Ledger {
        message: detail,
        source: None,
    })
}
