//! The retrieval facade: one immutable snapshot combining both indices.

use crate::config::EngineConfig;
use crate::embedding::{CacheStore, EmbeddingIndex, FsCacheStore, VectorBackend};
use crate::error::EngineError;
use crate::kb::{KbEntry, KbMetadata, KnowledgeBase, LibraryOverview, ResultKind};
use crate::search::{ApiFilter, ExampleFilter, IdfScope, LexicalIndex, fuse};
use crate::types::SearchResult;
use rapidfuzz::distance::jaro_winkler;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Minimum Jaro-Winkler similarity for an id suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.8;

/// Side-by-side rankings for one query, used for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct MethodComparison {
    pub query: String,
    pub result_kind: Option<ResultKind>,
    pub language: Option<String>,
    pub lexical_results: Vec<SearchResult>,
    /// Empty when semantic retrieval is unavailable.
    pub vector_results: Vec<SearchResult>,
    pub fused_results: Vec<SearchResult>,
}

/// Corpus and index statistics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub library: String,
    pub total_apis: usize,
    pub total_examples: usize,
    pub apis_by_language: BTreeMap<String, usize>,
    pub examples_by_language: BTreeMap<String, usize>,
    pub vocabulary_size: usize,
    pub idf_scope: IdfScope,
    pub hybrid: bool,
    pub embedding_model: Option<String>,
}

/// A near-miss id for a failed lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdSuggestion {
    pub id: String,
    pub kind: ResultKind,
    pub score: f64,
}

/// Hybrid retrieval over a loaded knowledge base.
///
/// Construction loads and indexes everything up front; afterwards every
/// operation is a read and the engine can be shared across threads.
#[derive(Debug)]
pub struct RetrievalEngine {
    config: EngineConfig,
    kb: KnowledgeBase,
    lexical: LexicalIndex,
    vectors: Option<EmbeddingIndex>,
    disabled_reason: Option<String>,
}

impl RetrievalEngine {
    /// Builds an engine that caches embeddings on disk.
    pub fn build(config: EngineConfig) -> Result<Self, EngineError> {
        let store = FsCacheStore::new(config.resolved_cache_dir());
        Self::build_with(config, &store, &CancellationToken::new())
    }

    /// Builds an engine with an explicit cache store and cancellation token.
    pub fn build_with(
        config: EngineConfig,
        store: &dyn CacheStore,
        cancel: &CancellationToken,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let kb = KnowledgeBase::load(&config.knowledge_base)?;
        Self::from_knowledge_base(config, kb, store, cancel)
    }

    /// Builds an engine from an already loaded knowledge base.
    pub fn from_knowledge_base(
        config: EngineConfig,
        kb: KnowledgeBase,
        store: &dyn CacheStore,
        cancel: &CancellationToken,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let lexical = LexicalIndex::build(&kb, config.idf_scope);

        let (vectors, disabled_reason) = match VectorBackend::from_config(&config.embedding) {
            VectorBackend::Enabled(embedder) => {
                match EmbeddingIndex::build(&kb, embedder, store, &config.embedding, cancel) {
                    Ok(index) => (Some(index), None),
                    Err(EngineError::Backend(e)) => {
                        tracing::warn!("Semantic search unavailable, using lexical only: {}", e);
                        (None, Some(e.to_string()))
                    }
                    Err(e) => return Err(e),
                }
            }
            VectorBackend::Disabled { reason } => (None, Some(reason)),
        };

        let engine = Self {
            config,
            kb,
            lexical,
            vectors,
            disabled_reason,
        };
        tracing::info!("Retrieval engine ready: {}", engine.mode_description());
        Ok(engine)
    }

    /// Builds on a blocking task so async callers are not stalled.
    pub async fn build_async(
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Result<Arc<Self>, EngineError> {
        tokio::task::spawn_blocking(move || {
            let store = FsCacheStore::new(config.resolved_cache_dir());
            Self::build_with(config, &store, &cancel).map(Arc::new)
        })
        .await
        .unwrap_or_else(|e| {
            if e.is_panic() {
                std::panic::resume_unwind(e.into_panic());
            }
            Err(EngineError::Cancelled)
        })
    }

    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub const fn knowledge_base(&self) -> &KnowledgeBase {
        &self.kb
    }

    pub const fn lexical(&self) -> &LexicalIndex {
        &self.lexical
    }

    pub const fn vectors(&self) -> Option<&EmbeddingIndex> {
        self.vectors.as_ref()
    }

    pub const fn library_overview(&self) -> &LibraryOverview {
        self.kb.overview()
    }

    pub const fn metadata(&self) -> Option<&KbMetadata> {
        self.kb.metadata()
    }

    /// Whether a vector ranking participates in fusion.
    pub const fn is_hybrid(&self) -> bool {
        self.vectors.is_some()
    }

    pub fn mode_description(&self) -> String {
        if self.is_hybrid() {
            let fusion = &self.config.fusion;
            format!(
                "Hybrid (keyword: {}, vector: {})",
                fusion.keyword_weight, fusion.vector_weight
            )
        } else {
            match &self.disabled_reason {
                Some(reason) => format!("Keyword-only ({reason})"),
                None => "Keyword-only".to_string(),
            }
        }
    }

    /// Hybrid API search.
    pub fn search_apis(&self, query: &str, filter: &ApiFilter, top_k: usize) -> Vec<SearchResult> {
        let candidates = self.config.fusion.candidates(top_k);
        let keyword = self.lexical.search_apis(query, filter, candidates);
        let vector = self
            .vectors
            .as_ref()
            .map(|v| v.search_apis(query, filter, candidates))
            .unwrap_or_default();
        self.fuse_or_keyword(keyword, &vector, top_k)
    }

    /// Hybrid example search.
    pub fn search_examples(
        &self,
        query: &str,
        filter: &ExampleFilter,
        top_k: usize,
    ) -> Vec<SearchResult> {
        let candidates = self.config.fusion.candidates(top_k);
        let keyword = self.lexical.search_examples(query, filter, candidates);
        let vector = self
            .vectors
            .as_ref()
            .map(|v| v.search_examples(query, filter, candidates))
            .unwrap_or_default();
        self.fuse_or_keyword(keyword, &vector, top_k)
    }

    /// Searches one kind, or both kinds merged when `kind` is `None`.
    ///
    /// At equal score APIs come before examples.
    pub fn search(
        &self,
        query: &str,
        kind: Option<ResultKind>,
        language: Option<&str>,
        top_k: usize,
    ) -> Vec<SearchResult> {
        Self::dispatch(
            kind,
            language,
            top_k,
            |filter| self.search_apis(query, filter, top_k),
            |filter| self.search_examples(query, filter, top_k),
        )
    }

    /// Looks an id up among APIs first, then examples.
    pub fn get_entry_details(&self, id: &str) -> Option<&KbEntry> {
        self.kb
            .apis()
            .iter()
            .chain(self.kb.examples())
            .find(|entry| entry.id() == id)
    }

    /// Ids similar to `id`, best first.
    pub fn suggest_ids(&self, id: &str, limit: usize) -> Vec<IdSuggestion> {
        let mut suggestions: Vec<IdSuggestion> = self
            .kb
            .apis()
            .iter()
            .chain(self.kb.examples())
            .map(|entry| IdSuggestion {
                id: entry.id().to_string(),
                kind: entry.kind(),
                score: jaro_winkler::similarity(id.chars(), entry.id().chars()),
            })
            .filter(|s| s.score > SUGGESTION_THRESHOLD)
            .collect();
        suggestions.sort_by(|a, b| b.score.total_cmp(&a.score));
        suggestions.truncate(limit);
        suggestions
    }

    /// Lexical, vector and fused rankings for the same query.
    pub fn compare_methods(
        &self,
        query: &str,
        kind: Option<ResultKind>,
        language: Option<&str>,
        top_k: usize,
    ) -> MethodComparison {
        let lexical_results = Self::dispatch(
            kind,
            language,
            top_k,
            |filter| self.lexical.search_apis(query, filter, top_k),
            |filter| self.lexical.search_examples(query, filter, top_k),
        );
        let vector_results = self.vectors.as_ref().map_or_else(Vec::new, |vectors| {
            Self::dispatch(
                kind,
                language,
                top_k,
                |filter| vectors.search_apis(query, filter, top_k),
                |filter| vectors.search_examples(query, filter, top_k),
            )
        });
        let fused_results = self.search(query, kind, language, top_k);

        MethodComparison {
            query: query.to_string(),
            result_kind: kind,
            language: language.map(str::to_string),
            lexical_results,
            vector_results,
            fused_results,
        }
    }

    pub fn stats(&self) -> EngineStats {
        let count_by_language = |entries: &[KbEntry]| {
            let mut counts = BTreeMap::new();
            for entry in entries {
                *counts.entry(entry.language().to_string()).or_insert(0) += 1;
            }
            counts
        };

        EngineStats {
            library: self.kb.overview().name.clone(),
            total_apis: self.kb.apis().len(),
            total_examples: self.kb.examples().len(),
            apis_by_language: count_by_language(self.kb.apis()),
            examples_by_language: count_by_language(self.kb.examples()),
            vocabulary_size: self.lexical.vocabulary_size(),
            idf_scope: self.lexical.scope(),
            hybrid: self.is_hybrid(),
            embedding_model: self.vectors.as_ref().map(EmbeddingIndex::model_identity),
        }
    }

    fn fuse_or_keyword(
        &self,
        mut keyword: Vec<SearchResult>,
        vector: &[SearchResult],
        top_k: usize,
    ) -> Vec<SearchResult> {
        if vector.is_empty() {
            keyword.truncate(top_k);
            return keyword;
        }
        fuse(&keyword, vector, &self.config.fusion.rrf(), top_k)
    }

    /// Runs the per-kind searches `kind` asks for and merges the lists.
    fn dispatch(
        kind: Option<ResultKind>,
        language: Option<&str>,
        top_k: usize,
        search_apis: impl FnOnce(&ApiFilter) -> Vec<SearchResult>,
        search_examples: impl FnOnce(&ExampleFilter) -> Vec<SearchResult>,
    ) -> Vec<SearchResult> {
        if top_k == 0 {
            return vec![];
        }
        let mut api_filter = ApiFilter::new();
        let mut example_filter = ExampleFilter::new();
        if let Some(language) = language {
            api_filter = api_filter.language(language);
            example_filter = example_filter.language(language);
        }

        let mut results = Vec::new();
        if kind.is_none_or(|k| k == ResultKind::Api) {
            results.extend(search_apis(&api_filter));
        }
        if kind.is_none_or(|k| k == ResultKind::Example) {
            results.extend(search_examples(&example_filter));
        }
        // Stable: APIs stay ahead of examples at equal score.
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }
}
