//! TF-IDF lexical index over API and example entries.

use super::filters::{ApiFilter, EntryFilter, ExampleFilter};
use super::scoring::{api_score, exact_match_boost, example_score, tag_overlap, tf_idf};
use super::tokenize::{term_counts, tokenize};
use crate::kb::{KbEntry, KnowledgeBase, ResultKind};
use crate::types::SearchResult;
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Which entries form the corpus for document-frequency counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdfScope {
    /// APIs and examples share one corpus and one vocabulary.
    #[default]
    Combined,
    /// Each kind has its own corpus.
    PerKind,
}

impl std::str::FromStr for IdfScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "combined" => Ok(Self::Combined),
            "per-kind" | "per_kind" => Ok(Self::PerKind),
            other => Err(format!("unknown idf scope '{other}'")),
        }
    }
}

/// An entry with its derived lexical features.
#[derive(Debug, Clone)]
pub struct IndexedEntry {
    entry: KbEntry,
    tokens: Vec<String>,
    term_counts: AHashMap<String, usize>,
    tag_set: AHashSet<String>,
    /// Lowercased primary text used for exact-match boosting.
    match_text: String,
}

impl IndexedEntry {
    fn new(entry: KbEntry) -> Self {
        let tokens = tokenize(&entry.searchable_text());
        let term_counts = term_counts(&tokens);
        let tag_set = entry.tags().iter().cloned().collect();
        let match_text = entry.primary_text().to_lowercase();
        Self {
            entry,
            tokens,
            term_counts,
            tag_set,
            match_text,
        }
    }

    pub const fn entry(&self) -> &KbEntry {
        &self.entry
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub const fn term_counts(&self) -> &AHashMap<String, usize> {
        &self.term_counts
    }

    pub const fn tag_set(&self) -> &AHashSet<String> {
        &self.tag_set
    }
}

/// Inverse document frequencies for one corpus.
#[derive(Debug, Clone, Default)]
pub struct IdfTable {
    scores: AHashMap<String, f32>,
}

impl IdfTable {
    /// Computes `ln(N / df(t))` for every term appearing in `entries`.
    fn build<'a>(entries: impl IntoIterator<Item = &'a IndexedEntry>) -> Self {
        let mut total_docs = 0usize;
        let mut doc_frequencies: AHashMap<&str, usize> = AHashMap::new();

        for indexed in entries {
            total_docs += 1;
            let unique: AHashSet<&str> = indexed.tokens.iter().map(String::as_str).collect();
            for term in unique {
                *doc_frequencies.entry(term).or_insert(0) += 1;
            }
        }

        let scores = doc_frequencies
            .into_iter()
            .map(|(term, df)| (term.to_string(), (total_docs as f32 / df as f32).ln()))
            .collect();

        Self { scores }
    }

    /// IDF for `term`, 0 for terms that never occur.
    pub fn get(&self, term: &str) -> f32 {
        self.scores.get(term).copied().unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Immutable lexical index; built once, queried many times.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    apis: Vec<IndexedEntry>,
    examples: Vec<IndexedEntry>,
    api_idf: Arc<IdfTable>,
    example_idf: Arc<IdfTable>,
    scope: IdfScope,
}

impl LexicalIndex {
    /// Tokenizes every entry and computes the IDF table(s).
    pub fn build(kb: &KnowledgeBase, scope: IdfScope) -> Self {
        let start = std::time::Instant::now();

        let apis: Vec<IndexedEntry> = kb.apis().iter().cloned().map(IndexedEntry::new).collect();
        let examples: Vec<IndexedEntry> = kb
            .examples()
            .iter()
            .cloned()
            .map(IndexedEntry::new)
            .collect();

        let (api_idf, example_idf) = match scope {
            IdfScope::Combined => {
                let shared = Arc::new(IdfTable::build(apis.iter().chain(&examples)));
                (shared.clone(), shared)
            }
            IdfScope::PerKind => (
                Arc::new(IdfTable::build(&apis)),
                Arc::new(IdfTable::build(&examples)),
            ),
        };

        let index = Self {
            apis,
            examples,
            api_idf,
            example_idf,
            scope,
        };

        tracing::info!(
            "Built lexical index: {} APIs, {} examples, {} terms ({:?} IDF) in {:?}",
            index.apis.len(),
            index.examples.len(),
            index.vocabulary_size(),
            scope,
            start.elapsed()
        );

        index
    }

    pub const fn scope(&self) -> IdfScope {
        self.scope
    }

    /// Number of distinct indexed terms across both kinds.
    pub fn vocabulary_size(&self) -> usize {
        match self.scope {
            IdfScope::Combined => self.api_idf.len(),
            IdfScope::PerKind => {
                let mut terms: AHashSet<&str> =
                    self.api_idf.scores.keys().map(String::as_str).collect();
                terms.extend(self.example_idf.scores.keys().map(String::as_str));
                terms.len()
            }
        }
    }

    pub fn entries(&self, kind: ResultKind) -> &[IndexedEntry] {
        match kind {
            ResultKind::Api => &self.apis,
            ResultKind::Example => &self.examples,
        }
    }

    pub fn idf(&self, kind: ResultKind) -> &IdfTable {
        match kind {
            ResultKind::Api => &self.api_idf,
            ResultKind::Example => &self.example_idf,
        }
    }

    /// Ranks API entries for `query`.
    pub fn search_apis(&self, query: &str, filter: &ApiFilter, top_k: usize) -> Vec<SearchResult> {
        self.search_kind(ResultKind::Api, query, EntryFilter::Api(filter), top_k)
    }

    /// Ranks example entries for `query`.
    pub fn search_examples(
        &self,
        query: &str,
        filter: &ExampleFilter,
        top_k: usize,
    ) -> Vec<SearchResult> {
        self.search_kind(ResultKind::Example, query, EntryFilter::Example(filter), top_k)
    }

    fn search_kind(
        &self,
        kind: ResultKind,
        query: &str,
        filter: EntryFilter<'_>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        if top_k == 0 {
            return vec![];
        }

        let query_tokens = tokenize(query);
        let query_terms: AHashSet<&str> = query_tokens.iter().map(String::as_str).collect();
        let query_lower = query.trim().to_lowercase();
        let idf = self.idf(kind);

        let mut results: Vec<SearchResult> = self
            .entries(kind)
            .iter()
            .filter(|indexed| filter.matches(&indexed.entry))
            .filter_map(|indexed| {
                let tfidf = tf_idf(
                    &query_tokens,
                    &indexed.term_counts,
                    indexed.tokens.len(),
                    |term| idf.get(term),
                );
                let boost = exact_match_boost(&query_lower, &indexed.match_text);
                let tags = tag_overlap(&query_terms, &indexed.tag_set);

                let score = match &indexed.entry {
                    KbEntry::Api(api) => api_score(tfidf, boost, tags, api.importance_score),
                    KbEntry::Example(_) => example_score(tfidf, boost, tags),
                };

                (score > 0.0).then(|| SearchResult::from_entry(&indexed.entry, score))
            })
            .collect();

        // Stable sort: equal scores keep load order.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);

        tracing::debug!(
            "Lexical {} search for '{}' returned {} results",
            kind,
            query,
            results.len()
        );

        results
    }
}
