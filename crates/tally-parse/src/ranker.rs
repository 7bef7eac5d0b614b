// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chart-of-accounts candidate ranking.
//!
//! Deterministic and stateless: identical `(query_terms, accounts)` inputs
//! always produce an identical ordered result, which auto-selection depends
//! on. Earlier query terms carry more weight -- the hint comes first, then
//! the message keywords in order of appearance.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use tally_core::{AccountCandidate, ChartRow};

use crate::fuzzy;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9]+").expect("token pattern is valid"));

/// Confidence at or above which a candidate's reason reads as a match
/// rather than a similarity.
const EXACT_MATCH_CONFIDENCE: f64 = 0.95;

/// Rank chart rows against the query terms, confidence descending.
///
/// Rows with a blank name or code, or a code already seen, are skipped.
/// Alias strings score through the weighted per-token measure only and fold
/// into the row's best score. Rows below `min_confidence` are dropped; ties
/// keep first-seen catalog order; the result is truncated to `limit`.
pub fn rank_account_candidates(
    query_terms: &[String],
    accounts: &[ChartRow],
    limit: usize,
    min_confidence: f64,
) -> Vec<AccountCandidate> {
    let tokens = normalize_query_terms(query_terms);
    if tokens.is_empty() {
        return Vec::new();
    }
    let combined_query = tokens.join(" ");

    let mut scored: Vec<AccountCandidate> = Vec::new();
    let mut seen_codes: HashSet<&str> = HashSet::new();

    for row in accounts {
        let account_name = row.account_name.trim();
        let account_code = row.account_code.trim();
        if account_name.is_empty() || account_code.is_empty() || seen_codes.contains(account_code)
        {
            continue;
        }

        let cleaned_name = account_name.to_lowercase();
        let mut best_score = score_label(&cleaned_name, &tokens, &combined_query);
        for alias in &row.aliases {
            let alias_score = weighted_token_max(&alias.to_lowercase(), &tokens);
            best_score = best_score.max(alias_score);
        }

        let confidence = (best_score * 10_000.0).round() / 10_000.0;
        if confidence < min_confidence {
            continue;
        }

        seen_codes.insert(account_code);
        let reason = if confidence >= EXACT_MATCH_CONFIDENCE {
            format!("Matched '{account_name}'")
        } else {
            format!("Similar to '{account_name}'")
        };
        trace!(code = account_code, confidence, "scored account row");
        scored.push(AccountCandidate {
            account_name: account_name.to_string(),
            account_code: account_code.to_string(),
            confidence: confidence.min(1.0),
            reason,
        });
    }

    // Stable sort keeps first-seen catalog order for equal confidences.
    scored.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    scored.truncate(limit);
    scored
}

/// Lower-case and regex-tokenize the query terms, dropping duplicates while
/// preserving first-seen order.
fn normalize_query_terms(query_terms: &[String]) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for term in query_terms {
        if term.is_empty() {
            continue;
        }
        for m in TOKEN_RE.find_iter(&term.to_lowercase()) {
            let token = m.as_str();
            if !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    }
    tokens
}

fn score_label(label: &str, tokens: &[String], combined_query: &str) -> f64 {
    if label.is_empty() {
        return 0.0;
    }
    let combined_score = fuzzy::token_set_similarity(combined_query, label);
    let weighted_max = weighted_token_max(label, tokens);
    combined_score.max(weighted_max)
}

/// Best per-token partial match, with earlier tokens weighted higher:
/// token `i` carries weight `max(0.2, 1 - 0.15 * i)`.
fn weighted_token_max(label: &str, tokens: &[String]) -> f64 {
    let mut score: f64 = 0.0;
    for (index, token) in tokens.iter().enumerate() {
        let weight = (1.0 - index as f64 * 0.15).max(0.2);
        score = score.max(weight * fuzzy::partial_similarity(token, label));
    }
    score
}
