//! Hybrid retrieval over a knowledge base of API descriptors and usage
//! examples.
//!
//! A [`RetrievalEngine`] combines a TF-IDF [`LexicalIndex`] with an optional
//! [`EmbeddingIndex`] and merges both rankings with Reciprocal Rank Fusion.

pub mod cli;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod error;
pub mod format;
pub mod kb;
pub mod request;
pub mod search;
pub mod tracing;
pub mod types;

pub use config::{EmbeddingConfig, EngineConfig, FusionConfig};
pub use embedding::{
    CacheKey, CacheStore, EmbeddingIndex, EmbeddingRecord, Embedder, FsCacheStore, HashEmbedder,
    MemoryCacheStore, NullCacheStore, VectorBackend,
};
#[cfg(feature = "fastembed")]
pub use embedding::FastEmbedder;
pub use engine::{EngineStats, IdSuggestion, MethodComparison, RetrievalEngine};
pub use error::{BackendError, CacheError, ConfigurationError, EngineError, QueryError};
pub use kb::{
    ApiEntry, Complexity, ExampleEntry, KbEntry, KbMetadata, KnowledgeBase, LibraryOverview,
    ResultKind,
};
pub use request::{ApiSearchRequest, ExampleSearchRequest, SearchRequest};
pub use search::{ApiFilter, ExampleFilter, IdfScope, LexicalIndex, RrfConfig};
pub use types::SearchResult;
