//! Dense vector index with cosine-similarity search.

use super::cache::{CacheKey, CacheStore, EmbeddingRecord};
use super::embedder::{Embedder, cosine_similarity};
use crate::config::EmbeddingConfig;
use crate::error::{BackendError, EngineError};
use crate::kb::{KbEntry, KnowledgeBase, ResultKind};
use crate::search::{ApiFilter, EntryFilter, ExampleFilter};
use crate::types::SearchResult;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

/// Embedded rows for one entry kind. Row `i` belongs to `entries[i]`.
#[derive(Debug, Clone)]
struct KindMatrix {
    entries: Vec<KbEntry>,
    dims: usize,
    vectors: Vec<f32>,
}

impl KindMatrix {
    fn row(&self, index: usize) -> &[f32] {
        &self.vectors[index * self.dims..(index + 1) * self.dims]
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Semantic index over both entry kinds.
///
/// Immutable after construction apart from the query-vector memo.
#[derive(Debug)]
pub struct EmbeddingIndex {
    embedder: Arc<dyn Embedder>,
    apis: KindMatrix,
    examples: KindMatrix,
    min_similarity: f32,
    query_cache: Option<Mutex<LruCache<String, Arc<Vec<f32>>>>>,
    /// Held around `encode_batch` when the embedder is not reentrant.
    encode_lock: Option<Mutex<()>>,
}

impl EmbeddingIndex {
    /// Loads cached vectors for each kind or encodes them in batches.
    ///
    /// A cached record is reused only if its model identity, row ids and
    /// stored entries all match the current knowledge base. Cancellation is
    /// checked before every batch; a cancelled build writes nothing.
    pub fn build(
        kb: &KnowledgeBase,
        embedder: Arc<dyn Embedder>,
        store: &dyn CacheStore,
        config: &EmbeddingConfig,
        cancel: &CancellationToken,
    ) -> Result<Self, EngineError> {
        let start = std::time::Instant::now();
        let batch_size = config.batch_size.max(1);

        let apis = build_kind(
            ResultKind::Api,
            kb.apis(),
            embedder.as_ref(),
            store,
            batch_size,
            cancel,
        )?;
        let examples = build_kind(
            ResultKind::Example,
            kb.examples(),
            embedder.as_ref(),
            store,
            batch_size,
            cancel,
        )?;

        tracing::info!(
            "Built embedding index with '{}': {} APIs, {} examples in {:?}",
            embedder.model_identity(),
            apis.len(),
            examples.len(),
            start.elapsed()
        );

        let query_cache = NonZeroUsize::new(config.query_cache_size)
            .map(|capacity| Mutex::new(LruCache::new(capacity)));
        let encode_lock = (!embedder.is_reentrant()).then(|| Mutex::new(()));

        Ok(Self {
            embedder,
            apis,
            examples,
            min_similarity: config.min_similarity.max(0.0),
            query_cache,
            encode_lock,
        })
    }

    pub fn model_identity(&self) -> String {
        self.embedder.model_identity()
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub const fn min_similarity(&self) -> f32 {
        self.min_similarity
    }

    /// Number of embedded entries of `kind`.
    pub fn len(&self, kind: ResultKind) -> usize {
        self.matrix(kind).len()
    }

    /// Raw vector for an entry, if embedded.
    pub fn vector(&self, kind: ResultKind, id: &str) -> Option<&[f32]> {
        let matrix = self.matrix(kind);
        let index = matrix.entries.iter().position(|entry| entry.id() == id)?;
        Some(matrix.row(index))
    }

    pub fn search_apis(&self, query: &str, filter: &ApiFilter, top_k: usize) -> Vec<SearchResult> {
        self.search_kind(ResultKind::Api, query, EntryFilter::Api(filter), top_k)
    }

    pub fn search_examples(
        &self,
        query: &str,
        filter: &ExampleFilter,
        top_k: usize,
    ) -> Vec<SearchResult> {
        self.search_kind(ResultKind::Example, query, EntryFilter::Example(filter), top_k)
    }

    fn matrix(&self, kind: ResultKind) -> &KindMatrix {
        match kind {
            ResultKind::Api => &self.apis,
            ResultKind::Example => &self.examples,
        }
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
        let Some(query_vector) = self.encode_query(query) else {
            return vec![];
        };
        if query_vector.iter().all(|v| *v == 0.0) {
            tracing::debug!("Query '{}' has no embeddable content", query);
            return vec![];
        }

        let matrix = self.matrix(kind);
        let mut results: Vec<SearchResult> = matrix
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| filter.matches(entry))
            .filter_map(|(i, entry)| {
                let similarity = cosine_similarity(&query_vector, matrix.row(i));
                (similarity >= self.min_similarity)
                    .then(|| SearchResult::from_entry(entry, similarity))
            })
            .collect();

        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results.truncate(top_k);
        results
    }

    /// Encodes a query, consulting the memo first. Failures are logged and
    /// yield `None`.
    fn encode_query(&self, query: &str) -> Option<Arc<Vec<f32>>> {
        if let Some(cache) = &self.query_cache
            && let Some(vector) = lock(cache).get(query)
        {
            return Some(vector.clone());
        }

        let encoded = {
            let _guard = self.encode_lock.as_ref().map(lock);
            self.embedder.encode_batch(&[query])
        };
        let vector = match encoded {
            Ok(mut vectors) if vectors.len() == 1 => Arc::new(vectors.swap_remove(0)),
            Ok(vectors) => {
                tracing::warn!(
                    "Embedding backend returned {} vectors for one query",
                    vectors.len()
                );
                return None;
            }
            Err(e) => {
                tracing::warn!("Failed to embed query '{}': {}", query, e);
                return None;
            }
        };

        if let Some(cache) = &self.query_cache {
            lock(cache).put(query.to_string(), vector.clone());
        }
        Some(vector)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn build_kind(
    kind: ResultKind,
    entries: &[KbEntry],
    embedder: &dyn Embedder,
    store: &dyn CacheStore,
    batch_size: usize,
    cancel: &CancellationToken,
) -> Result<KindMatrix, EngineError> {
    let identity = embedder.model_identity();
    let dims = embedder.dims();
    let key = CacheKey::new(kind.purpose(), identity.clone());

    match store.get(&key) {
        Ok(Some(record)) if record_matches(&record, &identity, dims, entries) => {
            tracing::debug!("Embedding cache hit for {} ({})", kind.purpose(), identity);
            return Ok(KindMatrix {
                entries: entries.to_vec(),
                dims,
                vectors: record.vectors,
            });
        }
        Ok(Some(_)) => {
            tracing::debug!(
                "Embedding cache for {} ({}) is stale, rebuilding",
                kind.purpose(),
                identity
            );
        }
        Ok(None) => {
            tracing::debug!("Embedding cache miss for {} ({})", kind.purpose(), identity);
        }
        Err(e) => {
            tracing::warn!("Discarding unusable embedding cache: {}", e);
        }
    }

    let texts: Vec<String> = entries.iter().map(KbEntry::embedding_text).collect();
    let mut vectors = Vec::with_capacity(entries.len() * dims);

    for batch in texts.chunks(batch_size) {
        if cancel.is_cancelled() {
            tracing::info!("Embedding build for {} cancelled", kind.purpose());
            return Err(EngineError::Cancelled);
        }
        let refs: Vec<&str> = batch.iter().map(String::as_str).collect();
        let encoded = embedder.encode_batch(&refs)?;
        if encoded.len() != batch.len() || encoded.iter().any(|v| v.len() != dims) {
            return Err(BackendError::Encode(format!(
                "expected {} vectors of {} dims from '{}'",
                batch.len(),
                dims,
                identity
            ))
            .into());
        }
        for vector in encoded {
            vectors.extend(vector);
        }
    }

    let raw_entries: HashMap<String, String> = entries
        .iter()
        .filter_map(|entry| Some((entry.id().to_string(), serde_json::to_string(entry).ok()?)))
        .collect();
    let record = EmbeddingRecord::new(
        identity,
        entries.iter().map(|e| e.id().to_string()).collect(),
        dims,
        vectors,
        raw_entries,
    );
    if let Err(e) = store.put(&key, &record) {
        tracing::warn!("Failed to persist embedding cache: {}", e);
    }

    Ok(KindMatrix {
        entries: entries.to_vec(),
        dims,
        vectors: record.vectors,
    })
}

/// A record is reusable only as a whole: same model, same rows, same content.
fn record_matches(record: &EmbeddingRecord, identity: &str, dims: usize, entries: &[KbEntry]) -> bool {
    record.model_identity == identity
        && record.dims == dims
        && record.is_well_formed()
        && record.ids.len() == entries.len()
        && record.ids.iter().zip(entries).all(|(id, entry)| {
            id == entry.id()
                && record
                    .raw_entries
                    .get(id)
                    .is_some_and(|raw| serde_json::to_string(entry).is_ok_and(|current| *raw == current))
        })
}
