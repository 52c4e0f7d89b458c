//! Knowledge base entry types as stored on disk.

use crate::error::QueryError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::str::FromStr;

/// Which of the two entry families a value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultKind {
    Api,
    Example,
}

impl ResultKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Example => "example",
        }
    }

    /// Cache purpose label for this kind.
    pub const fn purpose(self) -> &'static str {
        match self {
            Self::Api => "apis",
            Self::Example => "examples",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResultKind {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "api" | "apis" => Ok(Self::Api),
            "example" | "examples" => Ok(Self::Example),
            _ => Err(QueryError::UnknownResultKind(s.to_string())),
        }
    }
}

/// Coarse difficulty label attached to example entries.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl Complexity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Complexity {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(QueryError::UnknownComplexity(s.to_string())),
        }
    }
}

/// A single parameter of an API signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// An API descriptor (function, class, method).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEntry {
    /// Fully qualified name, e.g. `lancedb.connect`.
    #[serde(rename = "api_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub returns: Option<Map<String, Value>>,
    /// Example ids that exercise this API.
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance_score: f32,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_apis: Vec<String>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Fields this crate does not interpret, carried through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

const fn default_importance() -> f32 {
    0.5
}

/// A usage example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleEntry {
    #[serde(rename = "example_id", alias = "id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub apis_used: Vec<String>,
    #[serde(default)]
    pub use_case: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub expected_output: Option<String>,
    #[serde(default)]
    pub validated: bool,
    #[serde(default)]
    pub source_file: String,
    #[serde(default)]
    pub line_number: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// JSON number for `value` as written, without the noise of widening to f64.
fn shortest_f32(value: f32) -> Value {
    value
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map_or(Value::Null, Value::Number)
}

/// Either kind of knowledge base entry.
///
/// Serializes as the bare inner entry. Source files may carry their own
/// `kind` field in `extra`, so no tag is added.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KbEntry {
    Api(ApiEntry),
    Example(ExampleEntry),
}

impl KbEntry {
    pub fn id(&self) -> &str {
        match self {
            Self::Api(api) => &api.id,
            Self::Example(example) => &example.id,
        }
    }

    pub const fn kind(&self) -> ResultKind {
        match self {
            Self::Api(_) => ResultKind::Api,
            Self::Example(_) => ResultKind::Example,
        }
    }

    pub fn language(&self) -> &str {
        match self {
            Self::Api(api) => &api.language,
            Self::Example(example) => &example.language,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Api(api) => &api.tags,
            Self::Example(example) => &example.tags,
        }
    }

    /// Display title: the API id or the example title.
    pub fn title(&self) -> &str {
        match self {
            Self::Api(api) => &api.id,
            Self::Example(example) => &example.title,
        }
    }

    /// Short description: the API description or the example use case.
    pub fn description(&self) -> &str {
        match self {
            Self::Api(api) => &api.description,
            Self::Example(example) => &example.use_case,
        }
    }

    pub const fn as_api(&self) -> Option<&ApiEntry> {
        match self {
            Self::Api(api) => Some(api),
            Self::Example(_) => None,
        }
    }

    pub const fn as_example(&self) -> Option<&ExampleEntry> {
        match self {
            Self::Example(example) => Some(example),
            Self::Api(_) => None,
        }
    }

    /// All text the lexical index tokenizes for this entry.
    pub fn searchable_text(&self) -> String {
        match self {
            Self::Api(api) => join_parts(
                [
                    api.id.as_str(),
                    api.signature.as_str(),
                    api.description.as_str(),
                ]
                .into_iter()
                .chain(api.search_keywords.iter().map(String::as_str)),
            ),
            Self::Example(example) => join_parts(
                [example.title.as_str(), example.use_case.as_str()]
                    .into_iter()
                    .chain(example.apis_used.iter().map(String::as_str)),
            ),
        }
    }

    /// The text checked for a literal match of the whole query.
    pub fn primary_text(&self) -> String {
        match self {
            Self::Api(api) => format!("{} {}", api.id, api.description),
            Self::Example(example) => format!("{} {}", example.title, example.use_case),
        }
    }

    /// Text blob fed to the embedding model. Empty parts are skipped.
    pub fn embedding_text(&self) -> String {
        self.searchable_text()
    }

    /// Kind-specific fields rendered into a result's metadata map.
    ///
    /// Unrecognised fields from the source file are copied in afterwards
    /// without overwriting the kind-specific keys.
    pub fn result_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        let extra = match self {
            Self::Api(api) => {
                metadata.insert("signature".into(), Value::from(api.signature.clone()));
                metadata.insert("importance_score".into(), shortest_f32(api.importance_score));
                metadata.insert("tags".into(), Value::from(api.tags.clone()));
                metadata.insert("related_apis".into(), Value::from(api.related_apis.clone()));
                &api.extra
            }
            Self::Example(example) => {
                metadata.insert("complexity".into(), Value::from(example.complexity.as_str()));
                metadata.insert("apis_used".into(), Value::from(example.apis_used.clone()));
                metadata.insert("tags".into(), Value::from(example.tags.clone()));
                metadata.insert("validated".into(), Value::from(example.validated));
                &example.extra
            }
        };
        for (key, value) in extra {
            metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        metadata
    }
}

fn join_parts<'a>(parts: impl Iterator<Item = &'a str>) -> String {
    let mut text = String::new();
    for part in parts.filter(|p| !p.is_empty()) {
        if !text.is_empty() {
            text.push(' ');
        }
        text.push_str(part);
    }
    text
}

/// Library-level description loaded from `library_overview.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryOverview {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub quickstart_summary: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Generation statistics from the optional `metadata.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KbMetadata {
    #[serde(default)]
    pub generation_mode: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub total_apis: usize,
    #[serde(default)]
    pub total_examples: usize,
    #[serde(default)]
    pub apis_by_language: std::collections::BTreeMap<String, usize>,
    #[serde(default)]
    pub examples_by_language: std::collections::BTreeMap<String, usize>,
    #[serde(default)]
    pub validated_examples: Option<usize>,
    #[serde(default)]
    pub knowledge_base_version: Option<String>,
}
