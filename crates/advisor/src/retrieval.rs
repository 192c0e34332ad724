//! Lexical relevance ranking of runbook passages.
//!
//! Passages and queries are reduced to sets of lower-cased ASCII
//! alphanumeric tokens and scored by the size of their intersection.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::runbook::split_passages;
use crate::text::truncate_chars;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

/// Distinct tokens of `text`.
pub fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Best passage of `corpus` for `query`, truncated to `max_chars`.
///
/// Returns an empty string when no passage shares a token with the query.
pub fn retrieve(corpus: &str, query: &str, max_chars: usize) -> String {
    let passages = split_passages(corpus);
    best_passage(passages.iter().map(String::as_str), query, max_chars)
}

/// Highest-scoring passage; on equal scores the earliest passage is kept.
pub fn best_passage<'a>(
    passages: impl IntoIterator<Item = &'a str>,
    query: &str,
    max_chars: usize,
) -> String {
    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return String::new();
    }

    let mut best = "";
    let mut best_score = 0;
    for passage in passages {
        let score = tokenize(passage).intersection(&query_tokens).count();
        if score > best_score {
            best = passage;
            best_score = score;
        }
    }

    truncate_chars(best, max_chars).to_string()
}
