//! Persistent storage for embedding matrices.
//!
//! Records are keyed by `(purpose, model_identity)`. Stores never validate
//! record contents against the knowledge base; that is the index's job.

use crate::error::CacheError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};
use xxhash_rust::xxh3::xxh3_64;

/// Bumped whenever the on-disk record layout changes.
pub const CACHE_FORMAT_VERSION: u32 = 2;

/// Maximum length of the model slug embedded in a cache file name.
const MAX_SLUG_LEN: usize = 64;

/// Identifies one cached record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// `apis` or `examples`.
    pub purpose: String,
    pub model_identity: String,
}

impl CacheKey {
    pub fn new(purpose: impl Into<String>, model_identity: impl Into<String>) -> Self {
        Self {
            purpose: purpose.into(),
            model_identity: model_identity.into(),
        }
    }

    /// Deterministic file name; distinct identities never collide.
    pub fn file_name(&self) -> String {
        let slug: String = self
            .model_identity
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(MAX_SLUG_LEN)
            .collect();
        format!(
            "{}_{}_{:016x}.bin",
            self.purpose,
            slug,
            xxh3_64(self.model_identity.as_bytes())
        )
    }
}

/// A persisted embedding matrix for one entry kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub format_version: u32,
    pub model_identity: String,
    /// Row order of `vectors`.
    pub ids: Vec<String>,
    pub dims: usize,
    /// Row-major `ids.len() x dims` matrix.
    pub vectors: Vec<f32>,
    /// Entries serialized to JSON as they were when the vectors were computed.
    pub raw_entries: HashMap<String, String>,
}

impl EmbeddingRecord {
    pub fn new(
        model_identity: impl Into<String>,
        ids: Vec<String>,
        dims: usize,
        vectors: Vec<f32>,
        raw_entries: HashMap<String, String>,
    ) -> Self {
        Self {
            format_version: CACHE_FORMAT_VERSION,
            model_identity: model_identity.into(),
            ids,
            dims,
            vectors,
            raw_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// The vector for row `index`.
    pub fn row(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.dims)?;
        self.vectors.get(start..start + self.dims)
    }

    /// Whether the matrix shape agrees with `ids` and `dims`.
    pub fn is_well_formed(&self) -> bool {
        self.dims > 0 && self.vectors.len() == self.ids.len() * self.dims
    }
}

/// Storage backend for embedding records.
pub trait CacheStore: Send + Sync + std::fmt::Debug {
    /// Returns the record for `key`, `Ok(None)` on a clean miss.
    fn get(&self, key: &CacheKey) -> Result<Option<EmbeddingRecord>, CacheError>;

    /// Stores `record`, replacing any previous record for `key`.
    fn put(&self, key: &CacheKey, record: &EmbeddingRecord) -> Result<(), CacheError>;

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError>;
}

/// Postcard files in a directory, one per key.
#[derive(Debug, Clone)]
pub struct FsCacheStore {
    dir: PathBuf,
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(key.file_name())
    }

    fn temp_path_for(&self, key: &CacheKey) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir
            .join(format!(".{}.{}.{}.tmp", key.file_name(), std::process::id(), n))
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<EmbeddingRecord>, CacheError> {
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };

        let record: EmbeddingRecord =
            postcard::from_bytes(&bytes).map_err(|source| CacheError::Decode {
                path: path.clone(),
                source,
            })?;

        if record.format_version != CACHE_FORMAT_VERSION {
            return Err(CacheError::FormatVersion {
                found: record.format_version,
                expected: CACHE_FORMAT_VERSION,
            });
        }

        tracing::debug!("Read embedding cache {}", path.display());
        Ok(Some(record))
    }

    fn put(&self, key: &CacheKey, record: &EmbeddingRecord) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let bytes = postcard::to_stdvec(record).map_err(CacheError::Encode)?;
        let path = self.path_for(key);
        let temp = self.temp_path_for(key);

        std::fs::write(&temp, &bytes).map_err(|source| CacheError::Io {
            path: temp.clone(),
            source,
        })?;
        if let Err(source) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(CacheError::Io { path, source });
        }

        tracing::debug!(
            "Cached {} embeddings to {} ({} bytes)",
            record.len(),
            path.display(),
            bytes.len()
        );
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}

/// In-process store for tests and ephemeral engines.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    records: RwLock<HashMap<CacheKey, EmbeddingRecord>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<EmbeddingRecord>, CacheError> {
        Ok(self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn put(&self, key: &CacheKey, record: &EmbeddingRecord) -> Result<(), CacheError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), record.clone());
        Ok(())
    }

    fn invalidate(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }
}

/// Never stores anything; every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheStore;

impl CacheStore for NullCacheStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<EmbeddingRecord>, CacheError> {
        Ok(None)
    }

    fn put(&self, _key: &CacheKey, _record: &EmbeddingRecord) -> Result<(), CacheError> {
        Ok(())
    }

    fn invalidate(&self, _key: &CacheKey) -> Result<(), CacheError> {
        Ok(())
    }
}
