//! Engine configuration, loadable from TOML.

use crate::error::ConfigurationError;
use crate::search::{IdfScope, RrfConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Rank fusion settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub k: f32,
    pub keyword_weight: f32,
    pub vector_weight: f32,
    /// Each source ranking is asked for `candidate_multiplier * top_k` hits.
    pub candidate_multiplier: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        let rrf = RrfConfig::default();
        Self {
            k: rrf.k,
            keyword_weight: rrf.keyword_weight,
            vector_weight: rrf.vector_weight,
            candidate_multiplier: 2,
        }
    }
}

impl FusionConfig {
    pub const fn rrf(&self) -> RrfConfig {
        RrfConfig {
            k: self.k,
            keyword_weight: self.keyword_weight,
            vector_weight: self.vector_weight,
        }
    }

    /// Number of candidates to request from each source ranking.
    pub const fn candidates(&self, top_k: usize) -> usize {
        top_k.saturating_mul(self.candidate_multiplier)
    }
}

/// Model loaded by the `fastembed` backend unless configured otherwise.
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-MiniLM-L6-v2";

/// Embedding backend settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `hash`, `fastembed`, or `disabled` / `none` / `off` for lexical-only
    /// retrieval.
    pub backend: String,
    /// Sentence-embedding model loaded by the `fastembed` backend.
    pub model: String,
    /// Vector size for the `hash` backend. Model backends report their own.
    pub dims: usize,
    pub batch_size: usize,
    /// Vector hits with cosine similarity below this are dropped.
    pub min_similarity: f32,
    /// Capacity of the query-embedding LRU; 0 disables it.
    pub query_cache_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hash".to_string(),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dims: 384,
            batch_size: 32,
            min_similarity: 0.0,
            query_cache_size: 256,
        }
    }
}

/// Everything needed to build a [`crate::RetrievalEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub knowledge_base: PathBuf,
    /// Defaults to `<knowledge_base>/../embeddings`.
    pub cache_dir: Option<PathBuf>,
    pub idf_scope: IdfScope,
    pub fusion: FusionConfig,
    pub embedding: EmbeddingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            knowledge_base: PathBuf::from("data/knowledge_base"),
            cache_dir: None,
            idf_scope: IdfScope::default(),
            fusion: FusionConfig::default(),
            embedding: EmbeddingConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(knowledge_base: impl Into<PathBuf>) -> Self {
        Self {
            knowledge_base: knowledge_base.into(),
            ..Self::default()
        }
    }

    /// Reads a TOML file. Paths starting with `~` are expanded.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigurationError::MissingFile {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: Self =
            toml::from_str(&content).map_err(|e| ConfigurationError::Malformed {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        config.knowledge_base = expand_path(&config.knowledge_base);
        config.cache_dir = config.cache_dir.as_deref().map(expand_path);
        config.validate()?;

        tracing::debug!("Loaded engine configuration from {}", path.display());
        Ok(config)
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(cache_dir.into());
        self
    }

    #[must_use]
    pub const fn with_idf_scope(mut self, scope: IdfScope) -> Self {
        self.idf_scope = scope;
        self
    }

    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.embedding.backend = backend.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.embedding.model = model.into();
        self
    }

    #[must_use]
    pub const fn with_fusion(mut self, fusion: FusionConfig) -> Self {
        self.fusion = fusion;
        self
    }

    #[must_use]
    pub fn with_embedding(mut self, embedding: EmbeddingConfig) -> Self {
        self.embedding = embedding;
        self
    }

    /// Directory holding persisted embedding records.
    pub fn resolved_cache_dir(&self) -> PathBuf {
        if let Some(dir) = &self.cache_dir {
            return dir.clone();
        }
        self.knowledge_base
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("embeddings")
    }

    /// Rejects values that would make scoring meaningless.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| Err(ConfigurationError::InvalidConfig(msg));
        let fusion = &self.fusion;

        if !fusion.k.is_finite() || fusion.k <= 0.0 {
            return invalid(format!("fusion.k must be positive, got {}", fusion.k));
        }
        for (name, weight) in [
            ("keyword_weight", fusion.keyword_weight),
            ("vector_weight", fusion.vector_weight),
        ] {
            if !weight.is_finite() || weight < 0.0 {
                return invalid(format!("fusion.{name} must be non-negative, got {weight}"));
            }
        }
        if fusion.candidate_multiplier == 0 {
            return invalid("fusion.candidate_multiplier must be at least 1".to_string());
        }
        if self.embedding.batch_size == 0 {
            return invalid("embedding.batch_size must be at least 1".to_string());
        }
        if !self.embedding.min_similarity.is_finite() {
            return invalid(format!(
                "embedding.min_similarity must be finite, got {}",
                self.embedding.min_similarity
            ));
        }
        Ok(())
    }
}

fn expand_path(path: &Path) -> PathBuf {
    let Some(input) = path.to_str() else {
        return path.to_path_buf();
    };
    if let Some(stripped) = input.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(stripped);
    }
    if input == "~"
        && let Some(home) = dirs::home_dir()
    {
        return home;
    }
    path.to_path_buf()
}
