//! Keyword extraction for indexing and recalling questions.
//!
//! A question is reduced to a canonical tag set: lowercase, split on anything
//! that is not a letter or digit, short words and stop words dropped, then
//! deduplicated and sorted. The sort only makes the stored tags canonical; it
//! carries no meaning about word order.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

/// Tokens shorter than this (in characters) are dropped.
pub const MIN_KEYWORD_CHARS: usize = 2;

/// Runs of Unicode letters and decimal digits.
static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{L}\p{Nd}]+").expect("Valid keyword token regex"));

/// Words too common in "how do I ..." questions to say anything about a command.
pub fn stop_words() -> &'static HashSet<&'static str> {
    static SET: Lazy<HashSet<&'static str>> = Lazy::new(|| {
        [
            "how", "do", "i", "to", "the", "a", "an", "in", "on", "for", "is", "it", "of",
            "and", "or", "with", "from", "by", "at", "as", "this", "that", "what", "which",
            "where", "when", "who", "why", "can", "will", "my", "me", "all", "if", "not",
            "but", "so", "up", "out", "about", "into", "just", "get", "make", "use",
        ]
        .into_iter()
        .collect()
    });
    &SET
}

/// Extract the sorted, deduplicated keyword set of a question.
///
/// Total over all inputs: an empty or stop-word-only question yields an empty
/// vector.
pub fn extract(question: &str) -> Vec<String> {
    let lower = question.to_lowercase();
    let stop = stop_words();

    TOKEN
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|word| word.chars().count() >= MIN_KEYWORD_CHARS)
        .filter(|word| !stop.contains(word))
        .map(str::to_owned)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// The space-joined form of [`extract`], as stored in the `tags` column.
pub fn tags_for(question: &str) -> String {
    extract(question).join(" ")
}
