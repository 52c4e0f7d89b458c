//! Sentence-embedding models run locally through `fastembed` (ONNX Runtime).
//!
//! Model names resolve without the `fastembed` feature so configuration
//! errors are reported the same way in every build.

use super::embedder::Embedder;
use crate::error::BackendError;
use std::sync::Arc;

/// Canonical name, accepted aliases and output dimensions.
const MODELS: &[(&str, &[&str], usize)] = &[
    ("all-MiniLM-L6-v2", &["sentence-transformers/all-MiniLM-L6-v2"], 384),
    ("all-MiniLM-L12-v2", &["sentence-transformers/all-MiniLM-L12-v2"], 384),
    ("bge-small-en-v1.5", &["BAAI/bge-small-en-v1.5"], 384),
    ("bge-base-en-v1.5", &["BAAI/bge-base-en-v1.5"], 768),
    ("nomic-embed-text-v1.5", &["nomic-ai/nomic-embed-text-v1.5"], 768),
];

/// Canonical name and dimensions for a configured model name.
pub fn resolve_model(name: &str) -> Result<(&'static str, usize), BackendError> {
    let name = name.trim();
    MODELS
        .iter()
        .find(|(canonical, aliases, _)| {
            canonical.eq_ignore_ascii_case(name) || aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
        })
        .map(|(canonical, _, dims)| (*canonical, *dims))
        .ok_or_else(|| BackendError::UnknownModel(name.to_string()))
}

/// Loads `model`, downloading its files on first use.
#[cfg(feature = "fastembed")]
pub fn load(model: &str) -> Result<Arc<dyn Embedder>, BackendError> {
    Ok(Arc::new(FastEmbedder::new(model)?))
}

#[cfg(not(feature = "fastembed"))]
pub fn load(model: &str) -> Result<Arc<dyn Embedder>, BackendError> {
    resolve_model(model)?;
    Err(BackendError::FeatureDisabled("fastembed".to_string()))
}

#[cfg(feature = "fastembed")]
pub use backend::FastEmbedder;

#[cfg(feature = "fastembed")]
mod backend {
    use super::{Embedder, resolve_model};
    use crate::error::BackendError;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Mutex, PoisonError};

    /// A `fastembed` text model. Inference takes the model lock, so batches
    /// are encoded one at a time.
    pub struct FastEmbedder {
        model: Mutex<TextEmbedding>,
        name: &'static str,
        dims: usize,
    }

    impl FastEmbedder {
        pub fn new(model: &str) -> Result<Self, BackendError> {
            let (name, dims) = resolve_model(model)?;
            let kind = fastembed_model(name).ok_or_else(|| BackendError::UnknownModel(name.to_string()))?;

            let embedding = TextEmbedding::try_new(InitOptions::new(kind).with_show_download_progress(false))
                .map_err(|e| BackendError::ModelInit {
                    model: name.to_string(),
                    message: e.to_string(),
                })?;
            tracing::info!("Loaded embedding model {} ({} dims)", name, dims);

            Ok(Self {
                model: Mutex::new(embedding),
                name,
                dims,
            })
        }
    }

    impl std::fmt::Debug for FastEmbedder {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("FastEmbedder")
                .field("name", &self.name)
                .field("dims", &self.dims)
                .finish_non_exhaustive()
        }
    }

    impl Embedder for FastEmbedder {
        fn model_identity(&self) -> String {
            self.name.to_string()
        }

        fn dims(&self) -> usize {
            self.dims
        }

        fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, BackendError> {
            let mut model = self.model.lock().unwrap_or_else(PoisonError::into_inner);
            model
                .embed(texts.to_vec(), None)
                .map_err(|e| BackendError::Encode(e.to_string()))
        }

        fn is_reentrant(&self) -> bool {
            false
        }
    }

    fn fastembed_model(name: &str) -> Option<EmbeddingModel> {
        match name {
            "all-MiniLM-L6-v2" => Some(EmbeddingModel::AllMiniLML6V2),
            "all-MiniLM-L12-v2" => Some(EmbeddingModel::AllMiniLML12V2),
            "bge-small-en-v1.5" => Some(EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Some(EmbeddingModel::BGEBaseENV15),
            "nomic-embed-text-v1.5" => Some(EmbeddingModel::NomicEmbedTextV15),
            _ => None,
        }
    }
}
