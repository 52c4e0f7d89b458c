//! Text tokenization for lexical indexing.

use ahash::AHashMap;
use regex::Regex;
use std::sync::LazyLock;

/// Tokens must be longer than this many bytes to be indexed.
const MIN_TOKEN_LENGTH: usize = 1;

/// Common English stop words to filter out from indexing.
/// These high-frequency words add little value to search relevance.
pub(crate) const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];

/// Runs of lowercase alphanumerics, underscores and dots, so that API names
/// like `lancedb.connect` or `create_table` survive as single tokens.
static TOKEN_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[a-z0-9_.]+").expect("token pattern is valid"));

/// Tokenizes text into searchable terms.
///
/// The same function is applied to entry text at build time and to queries at
/// search time.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowercase = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowercase)
        .map(|m| m.as_str())
        .filter(|token| token.len() > MIN_TOKEN_LENGTH && !STOP_WORDS.contains(token))
        .map(str::to_owned)
        .collect()
}

/// Counts occurrences of each token.
pub(crate) fn term_counts(tokens: &[String]) -> AHashMap<String, usize> {
    let mut counts = AHashMap::with_capacity(tokens.len());
    for token in tokens {
        *counts.entry(token.clone()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case("Connect to database", vec!["connect", "database"])]
    #[case("lancedb.connect(uri)", vec!["lancedb.connect", "uri"])]
    #[case("create_table AND drop", vec!["create_table", "drop"])]
    #[case("a b c io", vec!["io"])] // single characters are dropped
    fn test_tokenize_exact(#[case] input: &str, #[case] expected: Vec<&str>) {
        check!(tokenize(input) == expected);
    }

    #[rstest]
    #[case("the quick brown fox", vec!["quick", "brown", "fox"])]
    #[case("search for vectors with filters", vec!["search", "vectors", "filters"])]
    fn test_stop_words_filtered(#[case] input: &str, #[case] expected: Vec<&str>) {
        let tokens = tokenize(input);

        for stop_word in STOP_WORDS {
            check!(!tokens.contains(&stop_word.to_string()));
        }
        check!(tokens == expected);
    }

    #[rstest]
    #[case("Москва")] // Cyrillic
    #[case("日本")] // Japanese
    #[case("🦀")] // Emoji
    fn test_non_ascii_produces_no_tokens(#[case] input: &str) {
        check!(tokenize(input).is_empty());
    }

    #[test]
    fn test_hyphen_splits_tokens() {
        check!(tokenize("multi-vector") == vec!["multi", "vector"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        check!(tokenize("").is_empty());
        check!(tokenize("   ").is_empty());
        check!(tokenize("\n\t").is_empty());
    }

    #[test]
    fn test_term_counts() {
        let tokens = tokenize("table table create");
        let counts = term_counts(&tokens);
        check!(counts["table"] == 2);
        check!(counts["create"] == 1);
    }
}
