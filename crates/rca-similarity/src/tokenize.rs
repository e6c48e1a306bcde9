//! Text normalization into terms

use crate::index::IndexConfig;
use once_cell::sync::Lazy;
use std::collections::HashSet;

static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "after", "again", "against", "all", "also", "am", "an", "and", "any", "are",
        "as", "at", "be", "because", "been", "before", "being", "between", "both", "but", "by",
        "can", "could", "did", "do", "does", "doing", "down", "during", "each", "few", "for",
        "from", "further", "had", "has", "have", "having", "he", "her", "here", "hers", "him",
        "his", "how", "i", "if", "in", "into", "is", "it", "its", "itself", "just", "me", "more",
        "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only", "or", "other",
        "our", "ours", "out", "over", "own", "same", "she", "should", "so", "some", "such",
        "than", "that", "the", "their", "theirs", "them", "then", "there", "these", "they",
        "this", "those", "through", "to", "too", "under", "until", "up", "very", "was", "we",
        "were", "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with",
        "would", "you", "your", "yours",
    ]
    .into_iter()
    .collect()
});

/// Whether `term` (already lowercased) is an English stop word
#[must_use]
pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.contains(term)
}

/// Split text into normalized terms
///
/// Terms are maximal runs of alphanumeric characters, lowercased. With
/// `include_bigrams`, each pair of adjacent kept terms is appended as
/// `"first second"`.
#[must_use]
pub fn tokenize(text: &str, config: &IndexConfig) -> Vec<String> {
    let unigrams: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|raw| !raw.is_empty())
        .map(str::to_lowercase)
        .filter(|term| !(config.remove_stop_words && is_stop_word(term)))
        .collect();

    if !config.include_bigrams || unigrams.len() < 2 {
        return unigrams;
    }

    let bigrams: Vec<String> = unigrams
        .windows(2)
        .map(|pair| format!("{} {}", pair[0], pair[1]))
        .collect();
    let mut terms = unigrams;
    terms.extend(bigrams);
    terms
}
