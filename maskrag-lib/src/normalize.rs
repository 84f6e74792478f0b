//! Answer normalization used by every text comparison in the metrics engine.
//!
//! The pipeline is the usual SQuAD one: lowercase, drop ASCII punctuation,
//! drop the articles "a", "an" and "the" as whole words, then collapse
//! whitespace.

use once_cell::sync::Lazy;
use regex::Regex;

static ARTICLES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(a|an|the)\b").expect("valid article regex"));

/// Canonicalize free text for comparison.
///
/// The result contains no ASCII punctuation, no standalone articles and no
/// leading, trailing or repeated whitespace. Normalizing twice yields the
/// same string.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let stripped: String = lowered
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect();
    let without_articles = ARTICLES.replace_all(&stripped, " ");

    without_articles.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an optional value, treating a missing one as empty.
pub fn normalize_opt(text: Option<&str>) -> String {
    text.map(normalize).unwrap_or_default()
}

/// Whitespace tokens of already-normalized text.
pub fn tokens(normalized: &str) -> Vec<&str> {
    normalized.split_whitespace().collect()
}
