// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain model shared across the Tally workspace.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::error::TallyError;

/// Hard cap on retry attempts per job. Enforced structurally at construction;
/// the posting worker decides what to do with an exhausted job.
pub const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Upper bound on narration length accepted into a draft.
pub const MAX_NARRATION_LEN: usize = 500;

/// Confirmation state of a single expense attempt.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConfirmationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

/// The two ledger legs of a double-entry journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccountRole {
    DebitAccount,
    CreditAccount,
}

impl AccountRole {
    /// Human-facing label used in placeholder accounts and prompts.
    pub fn label(self) -> &'static str {
        match self {
            AccountRole::DebitAccount => "Debit account",
            AccountRole::CreditAccount => "Credit account",
        }
    }
}

/// A field the conversation still needs before a draft can be confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ClarificationField {
    Amount,
    DebitAccount,
    CreditAccount,
}

impl From<AccountRole> for ClarificationField {
    fn from(role: AccountRole) -> Self {
        match role {
            AccountRole::DebitAccount => ClarificationField::DebitAccount,
            AccountRole::CreditAccount => ClarificationField::CreditAccount,
        }
    }
}

impl ClarificationField {
    pub fn label(self) -> &'static str {
        match self {
            ClarificationField::Amount => "the expense amount",
            ClarificationField::DebitAccount => "the debit (expense) account",
            ClarificationField::CreditAccount => "the credit (payment) account",
        }
    }
}

/// Finalized ledger match surfaced to the user and stored for audit.
///
/// A confidence of exactly zero denotes an unresolved placeholder built from
/// the raw text hint before ranking has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountMatch {
    pub account_code: String,
    pub display_name: String,
    pub confidence: f64,
}

impl AccountMatch {
    pub fn new(
        account_code: impl Into<String>,
        display_name: impl Into<String>,
        confidence: f64,
    ) -> Result<Self, TallyError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TallyError::Validation(
                "account match confidence must be between 0 and 1".into(),
            ));
        }
        Ok(Self {
            account_code: account_code.into(),
            display_name: display_name.into(),
            confidence,
        })
    }

    /// True when this match is still the parse-time placeholder.
    pub fn is_placeholder(&self) -> bool {
        self.confidence == 0.0
    }
}

/// Ranked chart-of-accounts suggestion. Ephemeral: recomputed on every
/// resolution attempt, never persisted independently of the state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountCandidate {
    pub account_name: String,
    pub account_code: String,
    pub confidence: f64,
    pub reason: String,
}

impl AccountCandidate {
    pub fn new(
        account_name: impl Into<String>,
        account_code: impl Into<String>,
        confidence: f64,
        reason: impl Into<String>,
    ) -> Result<Self, TallyError> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(TallyError::Validation(
                "account candidate confidence must be between 0 and 1".into(),
            ));
        }
        Ok(Self {
            account_name: account_name.into(),
            account_code: account_code.into(),
            confidence,
            reason: reason.into(),
        })
    }
}

/// Reference to a receipt or supporting document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_url: String,
    pub caption: Option<String>,
}

/// Structured snapshot of an expense extracted from the conversation.
///
/// Replaced wholesale on each successful re-parse. Construction fails on a
/// non-positive amount or an oversize narration; a draft is never built in a
/// partially valid form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseDraft {
    pub amount: Decimal,
    pub currency: String,
    pub debit_account: AccountMatch,
    pub credit_account: AccountMatch,
    pub posting_date: NaiveDate,
    pub narration: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
    #[serde(default)]
    pub source_message_id: Option<String>,
}

impl ExpenseDraft {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        amount: Decimal,
        currency: impl Into<String>,
        debit_account: AccountMatch,
        credit_account: AccountMatch,
        posting_date: NaiveDate,
        narration: impl Into<String>,
        source_message_id: Option<String>,
    ) -> Result<Self, TallyError> {
        let narration = narration.into();
        if amount <= Decimal::ZERO {
            return Err(TallyError::Validation(
                "expense amount must be greater than zero".into(),
            ));
        }
        if narration.chars().count() > MAX_NARRATION_LEN {
            return Err(TallyError::Validation(format!(
                "narration cannot exceed {MAX_NARRATION_LEN} characters"
            )));
        }
        Ok(Self {
            amount,
            currency: currency.into(),
            debit_account,
            credit_account,
            posting_date,
            narration,
            attachments: Vec::new(),
            source_message_id,
        })
    }

    /// Account match for the given role.
    pub fn account(&self, role: AccountRole) -> &AccountMatch {
        match role {
            AccountRole::DebitAccount => &self.debit_account,
            AccountRole::CreditAccount => &self.credit_account,
        }
    }

    pub fn set_account(&mut self, role: AccountRole, account: AccountMatch) {
        match role {
            AccountRole::DebitAccount => self.debit_account = account,
            AccountRole::CreditAccount => self.credit_account = account,
        }
    }
}

/// Parsed ledger response for a submitted journal entry. Immutable once received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntryResult {
    pub journal_entry_id: String,
    pub posting_date: NaiveDate,
    pub voucher_no: String,
    pub link: Option<String>,
}

/// A pending ledger re-submission stored in the retry queue.
///
/// The lock fields are owned by the repository; callers never set them
/// directly. `attempts` is structurally bounded by [`MAX_RETRY_ATTEMPTS`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryJob {
    pub id: Option<i64>,
    pub thread_id: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub next_run_at: DateTime<Utc>,
    pub error: Option<String>,
    #[serde(default)]
    pub locked_by: Option<String>,
    #[serde(default)]
    pub locked_at: Option<DateTime<Utc>>,
}

impl RetryJob {
    pub fn new(
        thread_id: impl Into<String>,
        payload: serde_json::Value,
        next_run_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            thread_id: thread_id.into(),
            payload,
            attempts: 0,
            next_run_at,
            error: None,
            locked_by: None,
            locked_at: None,
        }
    }

    /// Validate the structural attempts bound after loading from storage.
    pub fn validate(&self) -> Result<(), TallyError> {
        if self.attempts > MAX_RETRY_ATTEMPTS {
            return Err(TallyError::Validation(format!(
                "retry attempts cannot exceed {MAX_RETRY_ATTEMPTS} per policy"
            )));
        }
        Ok(())
    }

    /// True when the retry budget is spent and the job must not run again.
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= MAX_RETRY_ATTEMPTS
    }
}

/// One row of the chart of accounts as consumed from the ledger system.
///
/// ERPNext exposes the code under `name` and the display name under
/// `account_name`; locally curated catalogs may carry `aliases` as either a
/// single string or a list. All shapes normalize into this struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartRow {
    pub account_name: String,
    pub account_code: String,
    pub aliases: Vec<String>,
}

impl ChartRow {
    pub fn new(account_name: impl Into<String>, account_code: impl Into<String>) -> Self {
        Self {
            account_name: account_name.into(),
            account_code: account_code.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }
}

impl<'de> Deserialize<'de> for ChartRow {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum AliasField {
            One(String),
            Many(Vec<String>),
        }

        #[derive(Deserialize)]
        struct Raw {
            account_name: Option<String>,
            account_code: Option<String>,
            name: Option<String>,
            aliases: Option<AliasField>,
            alias: Option<AliasField>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let account_name = raw
            .account_name
            .or_else(|| raw.name.clone())
            .unwrap_or_default()
            .trim()
            .to_string();
        let account_code = raw
            .account_code
            .or(raw.name)
            .unwrap_or_default()
            .trim()
            .to_string();
        let aliases = match raw.aliases.or(raw.alias) {
            Some(AliasField::One(value)) => vec![value],
            Some(AliasField::Many(values)) => {
                values.into_iter().filter(|v| !v.is_empty()).collect()
            }
            None => Vec::new(),
        };
        Ok(ChartRow {
            account_name,
            account_code,
            aliases,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn placeholder(role: AccountRole) -> AccountMatch {
        AccountMatch::new(format!("unresolved_{role}"), role.label(), 0.0).unwrap()
    }

    fn draft(amount: Decimal, narration: &str) -> Result<ExpenseDraft, TallyError> {
        ExpenseDraft::new(
            amount,
            "USD",
            placeholder(AccountRole::DebitAccount),
            placeholder(AccountRole::CreditAccount),
            NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            narration,
            None,
        )
    }

    #[test]
    fn draft_accepts_positive_amount_and_bounded_narration() {
        let draft = draft(dec("10.00"), "Paid $10 cash for taxi").unwrap();
        assert_eq!(draft.currency, "USD");
        assert!(draft.debit_account.is_placeholder());
    }

    #[test]
    fn draft_rejects_non_positive_amount() {
        assert!(draft(Decimal::ZERO, "zero").is_err());
        assert!(draft(dec("-5"), "negative").is_err());
    }

    #[test]
    fn draft_rejects_oversize_narration() {
        let narration = "x".repeat(MAX_NARRATION_LEN + 1);
        assert!(draft(dec("1"), &narration).is_err());
        let narration = "x".repeat(MAX_NARRATION_LEN);
        assert!(draft(dec("1"), &narration).is_ok());
    }

    #[test]
    fn confidence_bounds_are_enforced() {
        assert!(AccountMatch::new("c", "n", -0.01).is_err());
        assert!(AccountMatch::new("c", "n", 1.01).is_err());
        assert!(AccountMatch::new("c", "n", 0.0).is_ok());
        assert!(AccountCandidate::new("n", "c", 1.0, "Matched 'n'").is_ok());
        assert!(AccountCandidate::new("n", "c", 1.5, "bad").is_err());
    }

    #[test]
    fn retry_job_exhaustion_tracks_attempt_cap() {
        let mut job = RetryJob::new("thread-1", serde_json::json!({}), Utc::now());
        assert!(!job.is_exhausted());
        job.attempts = MAX_RETRY_ATTEMPTS;
        assert!(job.is_exhausted());
        assert!(job.validate().is_ok());
        job.attempts = MAX_RETRY_ATTEMPTS + 1;
        assert!(job.validate().is_err());
    }

    #[test]
    fn chart_row_accepts_erpnext_shape() {
        let row: ChartRow = serde_json::from_value(serde_json::json!({
            "name": "Taxi Expense - HQ",
            "account_name": "Taxi Expense",
        }))
        .unwrap();
        assert_eq!(row.account_name, "Taxi Expense");
        assert_eq!(row.account_code, "Taxi Expense - HQ");
        assert!(row.aliases.is_empty());
    }

    #[test]
    fn chart_row_accepts_string_or_list_aliases() {
        let row: ChartRow = serde_json::from_value(serde_json::json!({
            "account_name": "Cash - HQ",
            "account_code": "1100",
            "aliases": "Cash",
        }))
        .unwrap();
        assert_eq!(row.aliases, vec!["Cash"]);

        let row: ChartRow = serde_json::from_value(serde_json::json!({
            "account_name": "Cash - HQ",
            "account_code": "1100",
            "alias": ["Cash", "Petty Cash"],
        }))
        .unwrap();
        assert_eq!(row.aliases, vec!["Cash", "Petty Cash"]);
    }

    #[test]
    fn confirmation_status_round_trips_as_lowercase() {
        use std::str::FromStr;
        for status in [
            ConfirmationStatus::Pending,
            ConfirmationStatus::Approved,
            ConfirmationStatus::Rejected,
        ] {
            let text = status.to_string();
            assert_eq!(text, text.to_lowercase());
            assert_eq!(ConfirmationStatus::from_str(&text).unwrap(), status);
        }
    }
}
