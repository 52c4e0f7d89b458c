//! Reciprocal Rank Fusion of a lexical and a vector ranking.
//!
//! ```text
//! RRF(d) = keyword_weight / (k + rank_kw(d)) + vector_weight / (k + rank_vec(d))
//! ```
//!
//! Ranks are 1-based. A document absent from one list gets no contribution
//! from it.

use crate::types::SearchResult;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Smoothing constant used unless configured otherwise.
pub const DEFAULT_RRF_K: f32 = 60.0;

/// Reciprocal Rank Fusion configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RrfConfig {
    /// Higher values reduce the impact of rank differences.
    pub k: f32,
    pub keyword_weight: f32,
    pub vector_weight: f32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self {
            k: DEFAULT_RRF_K,
            keyword_weight: 0.5,
            vector_weight: 0.5,
        }
    }
}

impl RrfConfig {
    /// Weights that reproduce the lexical ranking alone.
    pub fn keyword_only() -> Self {
        Self {
            keyword_weight: 1.0,
            vector_weight: 0.0,
            ..Self::default()
        }
    }

    pub fn with_weights(keyword_weight: f32, vector_weight: f32) -> Self {
        Self {
            keyword_weight,
            vector_weight,
            ..Self::default()
        }
    }

    /// Contribution of a single 1-based rank.
    fn contribution(&self, weight: f32, rank: usize) -> f32 {
        weight / (self.k + rank as f32)
    }
}

/// One document after fusion, with provenance from both rankings.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedHit {
    pub id: String,
    pub score: f32,
    pub keyword_rank: Option<usize>,
    pub vector_rank: Option<usize>,
    pub keyword_score: Option<f32>,
    pub vector_score: Option<f32>,
}

/// Fuses two rankings into scored hits.
///
/// Both inputs must already be sorted best first. Only the first occurrence
/// of an id within a list counts. Output is sorted by fused score, then best
/// keyword rank, then vector rank, then id.
pub fn fuse_rankings(
    keyword: &[SearchResult],
    vector: &[SearchResult],
    config: &RrfConfig,
) -> Vec<FusedHit> {
    let mut hits: AHashMap<&str, FusedHit> = AHashMap::new();

    for (i, result) in keyword.iter().enumerate() {
        let rank = i + 1;
        let hit = hits.entry(result.id.as_str()).or_insert_with(|| empty_hit(&result.id));
        if hit.keyword_rank.is_none() {
            hit.score += config.contribution(config.keyword_weight, rank);
            hit.keyword_rank = Some(rank);
            hit.keyword_score = Some(result.score);
        }
    }

    for (i, result) in vector.iter().enumerate() {
        let rank = i + 1;
        let hit = hits.entry(result.id.as_str()).or_insert_with(|| empty_hit(&result.id));
        if hit.vector_rank.is_none() {
            hit.score += config.contribution(config.vector_weight, rank);
            hit.vector_rank = Some(rank);
            hit.vector_score = Some(result.score);
        }
    }

    let mut fused: Vec<FusedHit> = hits.into_values().collect();
    fused.sort_by(compare_hits);
    fused
}

/// Fuses two rankings and materializes the top `top_k` as results.
///
/// Each result keeps the descriptive fields of its source entry and gains
/// `fusion_method`, `keyword_rank`, `vector_rank`, `original_keyword_score`
/// and `original_vector_score` metadata keys (null when absent).
pub fn fuse(
    keyword: &[SearchResult],
    vector: &[SearchResult],
    config: &RrfConfig,
    top_k: usize,
) -> Vec<SearchResult> {
    if top_k == 0 {
        return vec![];
    }

    let mut sources: AHashMap<&str, &SearchResult> = AHashMap::new();
    for result in keyword.iter().chain(vector) {
        sources.entry(result.id.as_str()).or_insert(result);
    }

    fuse_rankings(keyword, vector, config)
        .into_iter()
        .take(top_k)
        .filter_map(|hit| {
            let source = sources.get(hit.id.as_str())?;
            let mut result = (*source).clone();
            result.score = hit.score;
            result.metadata.insert("fusion_method".into(), Value::from("rrf"));
            result
                .metadata
                .insert("keyword_rank".into(), Value::from(hit.keyword_rank));
            result
                .metadata
                .insert("vector_rank".into(), Value::from(hit.vector_rank));
            result
                .metadata
                .insert("original_keyword_score".into(), Value::from(hit.keyword_score));
            result
                .metadata
                .insert("original_vector_score".into(), Value::from(hit.vector_score));
            Some(result)
        })
        .collect()
}

fn empty_hit(id: &str) -> FusedHit {
    FusedHit {
        id: id.to_string(),
        score: 0.0,
        keyword_rank: None,
        vector_rank: None,
        keyword_score: None,
        vector_score: None,
    }
}

/// Missing ranks sort after any present rank.
fn rank_key(rank: Option<usize>) -> usize {
    rank.unwrap_or(usize::MAX)
}

fn compare_hits(a: &FusedHit, b: &FusedHit) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| rank_key(a.keyword_rank).cmp(&rank_key(b.keyword_rank)))
        .then_with(|| rank_key(a.vector_rank).cmp(&rank_key(b.vector_rank)))
        .then_with(|| a.id.cmp(&b.id))
}
