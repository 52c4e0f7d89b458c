use crate::kb::{KbEntry, ResultKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single ranked hit returned by every search operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(rename = "result_type")]
    pub kind: ResultKind,
    pub id: String,
    pub title: String,
    pub description: String,
    pub score: f32,
    pub language: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl SearchResult {
    pub fn from_entry(entry: &KbEntry, score: f32) -> Self {
        Self {
            kind: entry.kind(),
            id: entry.id().to_string(),
            title: entry.title().to_string(),
            description: entry.description().to_string(),
            score,
            language: entry.language().to_string(),
            metadata: entry.result_metadata(),
        }
    }
}
