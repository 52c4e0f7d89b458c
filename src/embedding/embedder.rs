//! Embedding backends.
//!
//! The bundled [`HashEmbedder`] implements FNV-1a feature hashing: fully
//! deterministic and free of model files. Sentence-transformer models are
//! available through the `fastembed` backend, see [`super::onnx`].

use crate::config::EmbeddingConfig;
use crate::error::BackendError;
use super::onnx;
use crate::search::tokenize;
use std::sync::Arc;

/// Pluggable embedding backend interface.
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Stable identifier for the model; cached vectors are only reused when
    /// this matches exactly.
    fn model_identity(&self) -> String;

    fn dims(&self) -> usize;

    /// Encodes each text into a vector of `dims()` components.
    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BackendError>;

    /// Whether concurrent `encode_batch` calls are safe.
    fn is_reentrant(&self) -> bool {
        true
    }
}

/// Whether semantic retrieval is available.
#[derive(Debug, Clone)]
pub enum VectorBackend {
    Enabled(Arc<dyn Embedder>),
    Disabled { reason: String },
}

impl VectorBackend {
    /// Resolves the configured backend.
    ///
    /// Unknown names, zero dimensions and models that fail to load yield
    /// [`VectorBackend::Disabled`] with a single warning.
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        match build_embedder(config) {
            Ok(Some(embedder)) => Self::Enabled(embedder),
            Ok(None) => Self::Disabled {
                reason: "embedding backend disabled by configuration".to_string(),
            },
            Err(e) => {
                tracing::warn!("Semantic search unavailable, using lexical only: {}", e);
                Self::Disabled {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        match self {
            Self::Enabled(embedder) => Some(embedder),
            Self::Disabled { .. } => None,
        }
    }

    pub const fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }
}

/// Builds an embedder from config; `Ok(None)` when explicitly disabled.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Option<Arc<dyn Embedder>>, BackendError> {
    let backend = config.backend.trim().to_lowercase();
    match backend.as_str() {
        "disabled" | "none" | "off" => Ok(None),
        "" | "hash" => {
            if config.dims == 0 {
                return Err(BackendError::InvalidDimensions);
            }
            Ok(Some(Arc::new(HashEmbedder::new(config.dims))))
        }
        "fastembed" | "sentence-transformers" => onnx::load(&config.model).map(Some),
        other => Err(BackendError::UnknownBackend(other.to_string())),
    }
}

/// Hash embedder using FNV-1a over unigrams and bigrams.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dim: usize,
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dim: 384 }
    }
}

impl HashEmbedder {
    pub const fn new(dim: usize) -> Self {
        Self { dim }
    }

    /// Embeds a single text. Texts without tokens map to the zero vector.
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0; self.dim];
        if self.dim == 0 {
            return embedding;
        }

        let tokens = tokenize(text);
        for token in &tokens {
            accumulate_embedding(&mut embedding, token, 1.0);
        }
        for window in tokens.windows(2) {
            let bigram = format!("{} {}", window[0], window[1]);
            accumulate_embedding(&mut embedding, &bigram, 0.5);
        }

        l2_normalize(&mut embedding);
        embedding
    }
}

impl Embedder for HashEmbedder {
    fn model_identity(&self) -> String {
        format!("hash-fnv1a-{}", self.dim)
    }

    fn dims(&self) -> usize {
        self.dim
    }

    fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BackendError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }
}

/// Cosine similarity; 0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

fn accumulate_embedding(embedding: &mut [f32], token: &str, weight: f32) {
    let token_hash = fnv1a_hash(token.as_bytes());
    let len = embedding.len();

    for i in 0..len {
        let dim_hash = fnv1a_hash_with_salt(token_hash, i as u64);
        let sign = if dim_hash & 1 == 0 { weight } else { -weight };
        #[allow(clippy::cast_possible_truncation)]
        let dim = ((dim_hash >> 1) % len as u64) as usize;
        embedding[dim] += sign;
    }
}

fn fnv1a_hash_with_salt(seed: u64, salt: u64) -> u64 {
    let mut bytes = [0u8; 16];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8..].copy_from_slice(&salt.to_le_bytes());
    fnv1a_hash(&bytes)
}

fn fnv1a_hash(data: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in data {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vec.iter_mut() {
            *value /= norm;
        }
    }
}
