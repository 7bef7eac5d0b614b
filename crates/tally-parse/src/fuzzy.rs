// SPDX-FileCopyrightText: 2026 Tally Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fuzzy string similarity primitives used by the account ranker.
//!
//! Two measures, both normalized to `[0, 1]`:
//! - [`partial_similarity`]: the best alignment of the shorter string against
//!   any equal-length window of the longer one, so a short token like "taxi"
//!   scores 1.0 against "taxi expense - hq".
//! - [`token_set_similarity`]: order-insensitive comparison of whitespace
//!   token sets, tolerant of extra tokens on either side.

use std::collections::BTreeSet;

/// Plain normalized similarity between two strings.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(a, b)
}

/// Best similarity of the shorter string against any sliding window of the
/// longer string. Returns 0.0 when either side is empty.
pub fn partial_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let (short, long) = if a_chars.len() <= b_chars.len() {
        (a_chars, b_chars)
    } else {
        (b_chars, a_chars)
    };

    let needle: String = short.iter().collect();
    let mut best: f64 = 0.0;
    for window in long.windows(short.len()) {
        let haystack: String = window.iter().collect();
        best = best.max(strsim::normalized_levenshtein(&needle, &haystack));
        if best >= 1.0 {
            break;
        }
    }
    best
}

/// Token-set similarity: both strings are split on whitespace into sets, and
/// the score is the best pairwise similarity between the sorted intersection
/// and each side's intersection-plus-remainder string.
pub fn token_set_similarity(a: &str, b: &str) -> f64 {
    let set_a: BTreeSet<&str> = a.split_whitespace().collect();
    let set_b: BTreeSet<&str> = b.split_whitespace().collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let sect = join(set_a.intersection(&set_b));
    let diff_ab = join(set_a.difference(&set_b));
    let diff_ba = join(set_b.difference(&set_a));

    let sect_and_ab = concat(&sect, &diff_ab);
    let sect_and_ba = concat(&sect, &diff_ba);

    let mut best = similarity(&sect_and_ab, &sect_and_ba);
    if !sect.is_empty() {
        best = best
            .max(similarity(&sect, &sect_and_ab))
            .max(similarity(&sect, &sect_and_ba));
    }
    best
}

fn join<'a>(tokens: impl Iterator<Item = &'a &'a str>) -> String {
    tokens.copied().collect::<Vec<_>>().join(" ")
}

fn concat(head: &str, tail: &str) -> String {
    match (head.is_empty(), tail.is_empty()) {
        (true, _) => tail.to_string(),
        (_, true) => head.to_string(),
        _ => format!("{head} {tail}"),
    }
}
