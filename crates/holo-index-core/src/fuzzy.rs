//! Query normalization and token-Jaccard similarity.
//!
//! ```text
//!                  |tokens(a) ∩ tokens(b)|
//! fuzzy_score  =  ─────────────────────────
//!                  |tokens(a) ∪ tokens(b)|
//! ```
//!
//! Tokens are maximal runs of alphanumeric characters or `_`, lowercased.
//! Two token-less strings score `0.0`.

use std::collections::BTreeSet;

/// Lowercase, trim, and collapse internal whitespace to single spaces.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Split text into a deduplicated, lowercased token set.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Token Jaccard similarity in `[0.0, 1.0]`.
pub fn fuzzy_score(a: &str, b: &str) -> f64 {
    let ta = tokenize(a);
    let tb = tokenize(b);
    let union = ta.union(&tb).count();
    if union == 0 {
        return 0.0;
    }
    let inter = ta.intersection(&tb).count();
    inter as f64 / union as f64
}
