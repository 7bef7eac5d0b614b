// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Free-text expense message parsing.
//!
//! Pure functions: no state, no I/O, safe to call repeatedly and
//! concurrently. The parser extracts an amount, a currency, and debit/credit
//! account hints from a chat message, plus the keyword tokens the ranker
//! feeds into fuzzy matching.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use tally_core::ClarificationField;

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?P<prefix_currency>\$|€|£|usd|eur|gbp|cad|aud|mxn|cop|clp|pen|ars|brl)?\s*(?P<amount>\d{1,3}(?:,\d{3})*(?:\.\d+)?|\d+(?:\.\d+)?)\s*(?P<suffix_currency>usd|eur|gbp|cad|aud|mxn|cop|clp|pen|ars|brl)?",
    )
    .expect("amount pattern is valid")
});

static DEBIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:for|to|on)\s+(?P<account>[a-z0-9][a-z0-9\s:/&-]*)")
        .expect("debit pattern is valid")
});

static CREDIT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:from|using|with|via)\s+(?P<account>[a-z0-9][a-z0-9\s:/&-]*)")
        .expect("credit pattern is valid")
});

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("token pattern is valid"));

static CONJUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:and|but|then)\b").expect("conjunction pattern is valid"));

static SENTENCE_BREAK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.,;]").expect("sentence-break pattern is valid"));

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "for", "from", "of", "on", "paid", "the", "to", "using", "with", "via",
];

/// Where a credit hint came from.
///
/// Hints scanned out of the gap between the amount and the debit phrase (or
/// trailing the amount) are approximate; the resolver must never treat them
/// as confident extractions and asks the user whenever ranking does not
/// independently clear the auto-select threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintOrigin {
    /// Introduced by an explicit marker word (from/using/with/via).
    Marker,
    /// Inferred from sentence position as a fallback.
    Inferred,
}

/// Structured representation of a parsed expense message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedExpense {
    pub amount: Option<Decimal>,
    pub currency: Option<String>,
    pub narration: String,
    pub debit_hint: Option<String>,
    pub credit_hint: Option<String>,
    pub credit_hint_origin: Option<HintOrigin>,
    pub keywords: Vec<String>,
    pub missing_fields: Vec<ClarificationField>,
    pub source_message_id: Option<String>,
}

/// Extract amount, currency, and ledger hints from a chat message.
///
/// The narration is the original trimmed text; all matching runs on a
/// whitespace-normalized, lower-cased working copy.
pub fn parse_expense_text(
    message: &str,
    default_currency: Option<&str>,
    source_message_id: Option<&str>,
) -> ParsedExpense {
    let narration = message.trim().to_string();
    let working_text = narration
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let (amount, currency, amount_span) =
        extract_amount_and_currency(&working_text, default_currency);
    let (debit_hint, debit_span) = extract_debit_hint(&working_text);
    let (credit_hint, credit_hint_origin) = extract_credit_hint(
        &working_text,
        amount_span,
        debit_span,
        debit_hint.as_deref(),
    );

    let keywords = extract_keywords(&working_text);

    let mut missing_fields = Vec::new();
    if amount.is_none() {
        missing_fields.push(ClarificationField::Amount);
    }
    if debit_hint.is_none() {
        missing_fields.push(ClarificationField::DebitAccount);
    }
    if credit_hint.is_none() {
        missing_fields.push(ClarificationField::CreditAccount);
    }

    ParsedExpense {
        amount,
        currency,
        narration,
        debit_hint,
        credit_hint,
        credit_hint_origin,
        keywords,
        missing_fields,
        source_message_id: source_message_id.map(str::to_string),
    }
}

type Span = (usize, usize);

fn extract_amount_and_currency(
    text: &str,
    default_currency: Option<&str>,
) -> (Option<Decimal>, Option<String>, Option<Span>) {
    let fallback = default_currency.map(str::to_string);
    let Some(caps) = AMOUNT_RE.captures(text) else {
        return (None, fallback, None);
    };

    let raw_amount = caps
        .name("amount")
        .map(|m| m.as_str().replace(',', ""))
        .unwrap_or_default();
    let Ok(amount) = Decimal::from_str(&raw_amount) else {
        return (None, fallback, None);
    };

    let currency_token = caps
        .name("prefix_currency")
        .or_else(|| caps.name("suffix_currency"))
        .map(|m| m.as_str());
    let currency = normalize_currency(currency_token, fallback);

    let full = caps.get(0).expect("capture group 0 always present");
    (Some(amount), currency, Some((full.start(), full.end())))
}

fn normalize_currency(token: Option<&str>, fallback: Option<String>) -> Option<String> {
    let Some(token) = token else {
        return fallback;
    };
    let cleaned = token.trim().to_uppercase();
    let normalized = match cleaned.as_str() {
        "$" => "USD",
        "€" => "EUR",
        "£" => "GBP",
        other => other,
    };
    Some(normalized.to_string())
}

fn extract_debit_hint(text: &str) -> (Option<String>, Option<Span>) {
    let Some(caps) = DEBIT_RE.captures(text) else {
        return (None, None);
    };
    let hint = clean_hint(caps.name("account").map(|m| m.as_str()).unwrap_or(""));
    match hint {
        Some(hint) => {
            let full = caps.get(0).expect("capture group 0 always present");
            (Some(hint), Some((full.start(), full.end())))
        }
        None => (None, None),
    }
}

fn extract_credit_hint(
    text: &str,
    amount_span: Option<Span>,
    debit_span: Option<Span>,
    debit_hint: Option<&str>,
) -> (Option<String>, Option<HintOrigin>) {
    if let Some(caps) = CREDIT_RE.captures(text) {
        let hint = clean_hint(caps.name("account").map(|m| m.as_str()).unwrap_or(""));
        return (hint, Some(HintOrigin::Marker));
    }

    // Fallback: the segment strictly between the amount and the debit phrase.
    if let (Some((_, amount_end)), Some((debit_start, _))) = (amount_span, debit_span) {
        if amount_end < debit_start {
            if let Some(hint) = clean_hint(&text[amount_end..debit_start]) {
                return (Some(hint), Some(HintOrigin::Inferred));
            }
        }
    }

    // Last resort: whatever trails the amount, unless identical to the debit hint.
    if let Some((_, amount_end)) = amount_span {
        if let Some(hint) = clean_hint(&text[amount_end..]) {
            if Some(hint.as_str()) != debit_hint {
                return (Some(hint), Some(HintOrigin::Inferred));
            }
        }
    }

    (None, None)
}

fn clean_hint(value: &str) -> Option<String> {
    let mut cleaned = value.trim_matches(&[' ', '.', ',', ':', ';'][..]);
    if let Some(m) = CONJUNCTION_RE.find(cleaned) {
        cleaned = &cleaned[..m.start()];
    }
    if let Some(m) = SENTENCE_BREAK_RE.find(cleaned) {
        cleaned = &cleaned[..m.start()];
    }
    let cleaned = cleaned.replace(" account", "");
    let collapsed = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    (!collapsed.is_empty()).then_some(collapsed)
}

fn extract_keywords(text: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for m in TOKEN_RE.find_iter(text) {
        let token = m.as_str();
        if STOPWORDS.contains(&token) || tokens.iter().any(|t| t == token) {
            continue;
        }
        tokens.push(token.to_string());
    }
    tokens
}
