//! Error handling types and utilities.
//!
//! Construction-time failures ([`ConfigurationError`], [`EngineError`]) abort
//! engine creation. Cache and backend failures are recoverable and are only
//! ever logged by the engine. [`QueryError`] is reported for a single call.

use std::path::PathBuf;

/// A specialized Result type for binary-level operations.
///
/// This is an alias for `anyhow::Result` with context added via `.context()` and
/// `.with_context()` methods at the CLI edge.
pub type Result<T> = anyhow::Result<T>;

/// The knowledge base or engine configuration could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    /// A required file is absent.
    #[error("required file not found: {}", path.display())]
    MissingFile { path: PathBuf },
    /// A required file exists but could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A required file could not be parsed.
    #[error("failed to parse {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Engine construction failed; no engine instance is produced.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    /// The embedding backend failed while encoding the corpus. The engine
    /// recovers from this by falling back to lexical retrieval.
    #[error(transparent)]
    Backend(#[from] BackendError),
    /// Construction was interrupted at a batch boundary.
    #[error("engine construction cancelled")]
    Cancelled,
}

/// A persisted embedding record is unusable. Always treated as a cache miss.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cache file {} is corrupt: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },
    #[error("failed to encode embedding record: {0}")]
    Encode(#[source] postcard::Error),
    #[error("cache format version {found} does not match expected {expected}")]
    FormatVersion { found: u32, expected: u32 },
}

/// The embedding backend is unavailable or failed to encode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    #[error("unknown embedding backend '{0}'")]
    UnknownBackend(String),
    #[error("embedding dimensions must be greater than 0")]
    InvalidDimensions,
    #[error("unknown embedding model '{0}'")]
    UnknownModel(String),
    #[error("embedding backend '{0}' is not compiled in; rebuild with `--features {0}`")]
    FeatureDisabled(String),
    #[error("failed to load embedding model '{model}': {message}")]
    ModelInit { model: String, message: String },
    #[error("embedding failed: {0}")]
    Encode(String),
}

/// A query carried a malformed filter value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QueryError {
    #[error("unknown complexity '{0}' (expected beginner, intermediate or advanced)")]
    UnknownComplexity(String),
    #[error("unknown result kind '{0}' (expected api or example)")]
    UnknownResultKind(String),
    #[error("min_importance must be a finite value between 0 and 1, got {0}")]
    InvalidImportance(f32),
}
