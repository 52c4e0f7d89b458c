//! Lexical relevance scoring.
//!
//! Final per-kind scores:
//! ```text
//! api     = tfidf * exact_boost * 0.6 + tag_overlap * 0.2 + importance * 0.2
//! example = tfidf * exact_boost * 0.7 + tag_overlap * 0.3
//! ```

use ahash::{AHashMap, AHashSet};

pub(crate) const API_TFIDF_WEIGHT: f32 = 0.6;
pub(crate) const API_TAG_WEIGHT: f32 = 0.2;
pub(crate) const API_IMPORTANCE_WEIGHT: f32 = 0.2;
pub(crate) const EXAMPLE_TFIDF_WEIGHT: f32 = 0.7;
pub(crate) const EXAMPLE_TAG_WEIGHT: f32 = 0.3;

/// Multiplier when the whole query appears verbatim in the primary text.
pub(crate) const EXACT_MATCH_BOOST: f32 = 2.0;
/// Maximum additional multiplier for partial multi-word matches.
pub(crate) const PARTIAL_MATCH_BOOST: f32 = 0.5;

/// Sum of `tf * idf` over query tokens present in the entry.
///
/// `tf` is normalized by the entry's total token count. Repeated query tokens
/// contribute once per occurrence.
pub fn tf_idf(
    query_tokens: &[String],
    term_counts: &AHashMap<String, usize>,
    total_tokens: usize,
    idf: impl Fn(&str) -> f32,
) -> f32 {
    if total_tokens == 0 {
        return 0.0;
    }
    query_tokens
        .iter()
        .filter_map(|token| {
            term_counts
                .get(token)
                .map(|&count| (count as f32 / total_tokens as f32) * idf(token))
        })
        .sum()
}

/// Multiplier rewarding literal query matches in the entry's primary text.
///
/// Both arguments must already be lowercase.
/// - 2.0 when the whole query is a substring
/// - `1 + 0.5 * matched / words` for multi-word queries
/// - 1.0 otherwise
pub fn exact_match_boost(query_lower: &str, primary_lower: &str) -> f32 {
    if primary_lower.contains(query_lower) {
        return EXACT_MATCH_BOOST;
    }

    let words: Vec<&str> = query_lower.split_whitespace().collect();
    if words.len() > 1 {
        let matched = words.iter().filter(|w| primary_lower.contains(*w)).count();
        return 1.0 + PARTIAL_MATCH_BOOST * (matched as f32 / words.len() as f32);
    }

    1.0
}

/// Fraction of shared terms between the query and an entry's tags.
///
/// `|query ∩ tags| / max(|query|, |tags|)`, 0 when the entry has no tags.
pub fn tag_overlap(query_terms: &AHashSet<&str>, tags: &AHashSet<String>) -> f32 {
    if tags.is_empty() {
        return 0.0;
    }
    let overlap = query_terms
        .iter()
        .filter(|term| tags.contains(**term))
        .count();
    overlap as f32 / query_terms.len().max(tags.len()) as f32
}

/// Combined lexical score for an API entry.
pub fn api_score(tfidf: f32, exact_boost: f32, tag_score: f32, importance: f32) -> f32 {
    tfidf * exact_boost * API_TFIDF_WEIGHT
        + tag_score * API_TAG_WEIGHT
        + importance * API_IMPORTANCE_WEIGHT
}

/// Combined lexical score for an example entry.
pub fn example_score(tfidf: f32, exact_boost: f32, tag_score: f32) -> f32 {
    tfidf * exact_boost * EXAMPLE_TFIDF_WEIGHT + tag_score * EXAMPLE_TAG_WEIGHT
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    fn tags(values: &[&str]) -> AHashSet<String> {
        values.iter().map(|s| (*s).to_string()).collect()
    }

    #[rstest]
    #[case("connect", "lancedb.connect connect to a database", 2.0)]
    #[case("connect database", "connect to a database", 1.5)]
    #[case("connect cloud", "connect to a database", 1.25)]
    #[case("vector", "connect to a database", 1.0)]
    #[case("cloud storage", "connect to a database", 1.0)]
    fn test_exact_match_boost(#[case] query: &str, #[case] text: &str, #[case] expected: f32) {
        check!((exact_match_boost(query, text) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_tag_overlap_empty_tags_is_zero() {
        let query: AHashSet<&str> = ["io"].into_iter().collect();
        check!(tag_overlap(&query, &AHashSet::new()) == 0.0);
    }

    #[rstest]
    #[case(&["io"], &["io"], 1.0)]
    #[case(&["io", "read"], &["io"], 0.5)]
    #[case(&["io"], &["io", "file", "disk", "sync"], 0.25)]
    #[case(&["net"], &["io"], 0.0)]
    fn test_tag_overlap(#[case] query: &[&str], #[case] entry_tags: &[&str], #[case] expected: f32) {
        let query: AHashSet<&str> = query.iter().copied().collect();
        check!((tag_overlap(&query, &tags(entry_tags)) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_tf_idf_normalizes_by_length() {
        let mut counts = AHashMap::new();
        counts.insert("connect".to_string(), 2);
        counts.insert("database".to_string(), 2);
        let query = vec!["connect".to_string(), "missing".to_string()];

        let score = tf_idf(&query, &counts, 4, |_| 1.0);
        check!((score - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_tf_idf_empty_entry() {
        let query = vec!["connect".to_string()];
        check!(tf_idf(&query, &AHashMap::new(), 0, |_| 1.0) == 0.0);
    }

    #[test]
    fn test_api_score_weights() {
        check!((api_score(1.0, 2.0, 0.5, 1.0) - (1.2 + 0.1 + 0.2)).abs() < 1e-6);
        check!((example_score(1.0, 2.0, 0.5) - (1.4 + 0.15)).abs() < 1e-6);
    }
}
