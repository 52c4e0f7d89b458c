mod common;

use assert2::{check, let_assert};
use common::{TempKnowledgeBase, sample_kb};
use kb_retrieval::{
    BackendError, CacheKey, CacheStore, EmbeddingConfig, EmbeddingIndex, EmbeddingRecord,
    Embedder, FsCacheStore, HashEmbedder, KnowledgeBase, MemoryCacheStore, ResultKind,
    RetrievalEngine,
};
use rstest::rstest;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Hash embedder that counts how many texts it was asked to encode.
#[derive(Debug)]
struct CountingEmbedder {
    inner: HashEmbedder,
    encoded: AtomicUsize,
}

impl CountingEmbedder {
    fn new(dims: usize) -> Arc<Self> {
        Arc::new(Self {
            inner: HashEmbedder::new(dims),
            encoded: AtomicUsize::new(0),
        })
    }

    fn encoded(&self) -> usize {
        self.encoded.load(Ordering::SeqCst)
    }
}

impl Embedder for CountingEmbedder {
    fn model_identity(&self) -> String {
        self.inner.model_identity()
    }

    fn dims(&self) -> usize {
        self.inner.dims()
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BackendError> {
        self.encoded.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.encode_batch(texts)
    }
}

fn build_index(
    kb: &KnowledgeBase,
    embedder: &Arc<CountingEmbedder>,
    store: &dyn CacheStore,
) -> EmbeddingIndex {
    let embedder: Arc<dyn Embedder> = embedder.clone();
    EmbeddingIndex::build(
        kb,
        embedder,
        store,
        &EmbeddingConfig::default(),
        &CancellationToken::new(),
    )
    .unwrap()
}

fn cache_files(kb: &TempKnowledgeBase) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(kb.cache_dir())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Test: a second build over an unchanged corpus reads vectors from disk.
#[rstest]
fn filesystem_cache_round_trip(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = FsCacheStore::new(sample_kb.cache_dir());

    let first = CountingEmbedder::new(64);
    let cold = build_index(&kb, &first, &store);
    check!(first.encoded() == 8);

    let second = CountingEmbedder::new(64);
    let warm = build_index(&kb, &second, &store);
    check!(second.encoded() == 0);

    for entry in kb.apis() {
        check!(
            warm.vector(ResultKind::Api, entry.id()) == cold.vector(ResultKind::Api, entry.id())
        );
    }
    check!(warm.len(ResultKind::Example) == 3);

    let files = cache_files(&sample_kb);
    check!(files.len() == 2);
    check!(files.iter().any(|f| f.starts_with("apis_hash-fnv1a-64_")));
    check!(files.iter().any(|f| f.starts_with("examples_hash-fnv1a-64_")));
    check!(files.iter().all(|f| f.ends_with(".bin")));
}

/// Test: engines built through the facade share the default cache directory.
#[rstest]
fn engine_writes_default_cache_dir(sample_kb: TempKnowledgeBase) {
    let first = RetrievalEngine::build(sample_kb.config()).unwrap();
    check!(cache_files(&sample_kb).len() == 2);

    let second = RetrievalEngine::build(sample_kb.config()).unwrap();
    check!(
        second.search("connect database", None, None, 5)
            == first.search("connect database", None, None, 5)
    );
}

#[rstest]
fn different_dims_get_separate_records(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = FsCacheStore::new(sample_kb.cache_dir());

    build_index(&kb, &CountingEmbedder::new(64), &store);
    build_index(&kb, &CountingEmbedder::new(128), &store);

    check!(cache_files(&sample_kb).len() == 4);
    check!(CacheKey::new("apis", "hash-fnv1a-64").file_name() != CacheKey::new("apis", "hash-fnv1a-128").file_name());
}

/// Test: an undecodable cache file is treated as a miss and replaced.
#[rstest]
fn corrupt_cache_is_rebuilt(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = FsCacheStore::new(sample_kb.cache_dir());
    let key = CacheKey::new("apis", "hash-fnv1a-64");

    std::fs::create_dir_all(sample_kb.cache_dir()).unwrap();
    std::fs::write(store.path_for(&key), b"definitely not postcard").unwrap();

    let embedder = CountingEmbedder::new(64);
    build_index(&kb, &embedder, &store);
    check!(embedder.encoded() == 8);

    let_assert!(Ok(Some(record)) = store.get(&key));
    check!(record.len() == 5);
    check!(record.is_well_formed());
}

/// Test: editing an entry invalidates the record for its kind only.
#[rstest]
fn changed_entry_triggers_rebuild(mut sample_kb: TempKnowledgeBase) {
    let store = FsCacheStore::new(sample_kb.cache_dir());
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    build_index(&kb, &CountingEmbedder::new(64), &store);

    sample_kb.add_api(json!({
        "api_id": "lancedb.table.Table.update",
        "language": "python",
        "description": "Update rows in place",
    }));
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();

    let embedder = CountingEmbedder::new(64);
    let index = build_index(&kb, &embedder, &store);
    check!(embedder.encoded() == 6);
    check!(index.len(ResultKind::Api) == 6);
    check!(index.vector(ResultKind::Api, "lancedb.table.Table.update").is_some());
}

#[rstest]
fn memory_store_receives_both_kinds(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = MemoryCacheStore::new();

    build_index(&kb, &CountingEmbedder::new(32), &store);

    check!(store.len() == 2);
    check!(store.contains(&CacheKey::new("apis", "hash-fnv1a-32")));
    check!(store.contains(&CacheKey::new("examples", "hash-fnv1a-32")));
}

/// Test: a record stored under a key but produced by another model is replaced.
#[rstest]
fn mismatched_identity_is_overwritten(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = MemoryCacheStore::new();
    let key = CacheKey::new("apis", "hash-fnv1a-32");

    let stale = EmbeddingRecord::new(
        "some-other-model",
        vec!["lancedb.connect".into()],
        32,
        vec![0.0; 32],
        HashMap::new(),
    );
    store.put(&key, &stale).unwrap();

    let embedder = CountingEmbedder::new(32);
    build_index(&kb, &embedder, &store);
    check!(embedder.encoded() == 8);

    let_assert!(Ok(Some(record)) = store.get(&key));
    check!(record.model_identity == "hash-fnv1a-32");
    check!(record.len() == 5);
}

#[rstest]
fn invalidate_is_idempotent(sample_kb: TempKnowledgeBase) {
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = FsCacheStore::new(sample_kb.cache_dir());
    let key = CacheKey::new("examples", "hash-fnv1a-64");

    build_index(&kb, &CountingEmbedder::new(64), &store);
    check!(store.path_for(&key).exists());

    store.invalidate(&key).unwrap();
    store.invalidate(&key).unwrap();
    check!(!store.path_for(&key).exists());
    let_assert!(Ok(None) = store.get(&key));
}

/// Test: an entry carrying its own `kind` field does not defeat the disk cache.
#[rstest]
fn entry_with_kind_field_stays_cached(mut sample_kb: TempKnowledgeBase) {
    sample_kb.add_api(json!({
        "api_id": "db.Table",
        "kind": "class",
        "language": "python",
        "description": "A table handle",
    }));
    let kb = KnowledgeBase::load(sample_kb.path()).unwrap();
    let store = FsCacheStore::new(sample_kb.cache_dir());

    let first = CountingEmbedder::new(64);
    build_index(&kb, &first, &store);
    check!(first.encoded() == 9);

    let second = CountingEmbedder::new(64);
    build_index(&kb, &second, &store);
    check!(second.encoded() == 0);

    let_assert!(Ok(Some(record)) = store.get(&CacheKey::new("apis", "hash-fnv1a-64")));
    check!(record.raw_entries["db.Table"].matches("\"kind\"").count() == 1);
}
