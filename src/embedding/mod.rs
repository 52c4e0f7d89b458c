//! Optional semantic retrieval: embedding backends, the vector index and
//! persistent embedding caches.

pub mod cache;
pub mod embedder;
pub mod index;
pub mod onnx;

pub use cache::{
    CACHE_FORMAT_VERSION, CacheKey, CacheStore, EmbeddingRecord, FsCacheStore, MemoryCacheStore,
    NullCacheStore,
};
pub use embedder::{Embedder, HashEmbedder, VectorBackend, build_embedder, cosine_similarity};
pub use index::EmbeddingIndex;
#[cfg(feature = "fastembed")]
pub use onnx::FastEmbedder;
