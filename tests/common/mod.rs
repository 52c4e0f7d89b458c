//! Shared test fixtures and utilities for integration tests.
//!
//! # Test Isolation Strategy
//!
//! Every test writes its own knowledge base into a fresh temporary directory:
//! - `<tmp>/knowledge_base/` holds `index.json`, the overview and entry files
//! - `<tmp>/embeddings/` is where the default filesystem cache lands
//!
//! No test ever sees another test's embedding cache.
//!
//! # Available Fixtures
//!
//! - `sample_kb`: a small vector-database library with APIs in two languages
//!   and examples of every complexity
//! - `empty_kb`: an overview and an empty index

use kb_retrieval::EngineConfig;
use kb_retrieval::kb::safe_file_stem;
use rstest::fixture;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A temporary directory for test isolation.
///
/// Provides basic filesystem operations within a temp directory that is
/// automatically cleaned up when dropped.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempWorkspace {
    _temp: TempDir,
    root: PathBuf,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempWorkspace {
    /// Creates a new empty temporary workspace.
    pub fn new() -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let root = temp.path().to_path_buf();
        Self { _temp: temp, root }
    }

    /// Returns the root path of this workspace.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Creates a file with the given content within this workspace.
    ///
    /// Parent directories are created automatically if they don't exist.
    ///
    /// # Panics
    /// Panics if file creation fails.
    pub fn create_file(&self, path: &str, content: &str) {
        let full_path = self.root.join(path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap_or_else(|e| {
                panic!("Failed to create parent directory for '{}': {}", path, e)
            });
        }
        std::fs::write(&full_path, content)
            .unwrap_or_else(|e| panic!("Failed to write file '{}': {}", path, e));
    }

    /// Removes a file within this workspace.
    pub fn remove_file(&self, path: &str) {
        std::fs::remove_file(self.root.join(path))
            .unwrap_or_else(|e| panic!("Failed to remove file '{}': {}", path, e));
    }
}

impl Default for TempWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes a knowledge base in the on-disk layout the loader expects.
///
/// Every `add_*` call writes the entry file and rewrites `index.json`.
#[allow(dead_code)] // Methods used across different integration test crates
pub struct TempKnowledgeBase {
    workspace: TempWorkspace,
    apis: serde_json::Map<String, Value>,
    examples: serde_json::Map<String, Value>,
}

#[allow(dead_code)] // Methods used across different integration test crates
impl TempKnowledgeBase {
    pub const DIR: &'static str = "knowledge_base";

    /// Creates a knowledge base with an overview and no entries.
    pub fn new(library: &str) -> Self {
        let kb = Self {
            workspace: TempWorkspace::new(),
            apis: serde_json::Map::new(),
            examples: serde_json::Map::new(),
        };
        kb.write_json(
            "library_overview.json",
            &json!({
                "name": library,
                "version": "0.1.0",
                "languages": ["python", "typescript"],
                "domain": "vector database",
                "description": format!("{library} test fixture"),
                "key_concepts": ["tables", "vector search"],
                "quickstart_summary": "connect, create a table, search",
            }),
        );
        kb.write_index();
        kb
    }

    /// Directory passed to the loader.
    pub fn path(&self) -> PathBuf {
        self.workspace.path().join(Self::DIR)
    }

    /// Default embedding cache directory for this knowledge base.
    pub fn cache_dir(&self) -> PathBuf {
        self.workspace.path().join("embeddings")
    }

    pub const fn workspace(&self) -> &TempWorkspace {
        &self.workspace
    }

    /// Engine configuration pointing at this knowledge base.
    pub fn config(&self) -> EngineConfig {
        EngineConfig::new(self.path())
    }

    /// Engine configuration with semantic search turned off.
    pub fn lexical_config(&self) -> EngineConfig {
        self.config().with_backend("disabled")
    }

    /// Writes an API entry; `entry` must contain `api_id` and `language`.
    pub fn add_api(&mut self, entry: Value) -> &mut Self {
        let file = self.write_entry("api_catalog", "api_id", &entry);
        push_listing(&mut self.apis, &entry, json!({ "api_id": entry["api_id"], "file": file }));
        self.write_index();
        self
    }

    /// Writes an example entry; `entry` must contain `example_id` and `language`.
    pub fn add_example(&mut self, entry: Value) -> &mut Self {
        let file = self.write_entry("examples_db", "example_id", &entry);
        push_listing(
            &mut self.examples,
            &entry,
            json!({ "example_id": entry["example_id"], "file": file }),
        );
        self.write_index();
        self
    }

    /// Lists an entry in `index.json` without writing its file.
    pub fn add_dangling_api(&mut self, id: &str, language: &str) -> &mut Self {
        let entry = json!({ "api_id": id, "language": language });
        let file = format!("api_catalog/{}/{}.json", language, safe_file_stem(id));
        push_listing(&mut self.apis, &entry, json!({ "api_id": id, "file": file }));
        self.write_index();
        self
    }

    /// Writes `content` into the knowledge base directory.
    pub fn write_raw(&self, path: &str, content: &str) {
        self.workspace
            .create_file(&format!("{}/{}", Self::DIR, path), content);
    }

    pub fn write_json(&self, path: &str, value: &Value) {
        self.write_raw(path, &serde_json::to_string_pretty(value).expect("serializable"));
    }

    fn write_entry(&self, dir: &str, id_key: &str, entry: &Value) -> String {
        let id = entry[id_key].as_str().expect("entry id");
        let language = entry["language"].as_str().expect("entry language");
        let file = format!("{}/{}/{}.json", dir, language, safe_file_stem(id));
        self.write_json(&file, entry);
        file
    }

    fn write_index(&self) {
        self.write_json(
            "index.json",
            &json!({ "apis": self.apis, "examples": self.examples }),
        );
    }
}

fn push_listing(listings: &mut serde_json::Map<String, Value>, entry: &Value, listing: Value) {
    let language = entry["language"].as_str().expect("entry language").to_string();
    listings
        .entry(language)
        .or_insert_with(|| Value::Array(vec![]))
        .as_array_mut()
        .expect("listing array")
        .push(listing);
}

/// A small vector-database library.
///
/// Python APIs: `lancedb.connect`, `lancedb.DBConnection.create_table`,
/// `lancedb.table.Table.search`, `lancedb.table.Table.delete`.
/// TypeScript API: `connect`.
/// Examples: `quickstart_connect` (beginner), `delete_rows` (intermediate),
/// `vector_search_filter` (advanced).
pub fn build_sample_kb() -> TempKnowledgeBase {
    let mut kb = TempKnowledgeBase::new("lancedb");
    kb.add_api(json!({
        "api_id": "lancedb.connect",
        "language": "python",
        "signature": "lancedb.connect(uri: str) -> DBConnection",
        "description": "Connect to a LanceDB database",
        "parameters": [{"name": "uri", "type": "str", "required": true, "description": "Database location"}],
        "importance_score": 0.9,
        "tags": ["connection", "database"],
        "related_apis": ["lancedb.DBConnection.create_table"],
        "search_keywords": ["connect", "open"],
    }))
    .add_api(json!({
        "api_id": "lancedb.DBConnection.create_table",
        "language": "python",
        "signature": "create_table(name: str, data) -> Table",
        "description": "Create a new table from data",
        "importance_score": 0.8,
        "tags": ["table", "create"],
        "search_keywords": ["create", "table", "new"],
    }))
    .add_api(json!({
        "api_id": "lancedb.table.Table.search",
        "language": "python",
        "signature": "search(query) -> LanceQueryBuilder",
        "description": "Search the table for nearest vectors",
        "importance_score": 0.85,
        "tags": ["search", "vector"],
        "search_keywords": ["vector", "similarity", "nearest"],
    }))
    .add_api(json!({
        "api_id": "lancedb.table.Table.delete",
        "language": "python",
        "signature": "delete(where: str)",
        "description": "Delete rows matching a filter",
        "importance_score": 0.4,
        "tags": ["table"],
    }))
    .add_api(json!({
        "api_id": "connect",
        "language": "typescript",
        "signature": "connect(uri: string): Promise<Connection>",
        "description": "Open a connection from Node",
        "importance_score": 0.7,
        "tags": ["connection"],
    }))
    .add_example(json!({
        "example_id": "quickstart_connect",
        "language": "python",
        "title": "Connect and create a table",
        "use_case": "Open a database connection and create your first table",
        "code": "import lancedb\ndb = lancedb.connect(\"data/db\")\n",
        "apis_used": ["lancedb.connect", "lancedb.DBConnection.create_table"],
        "complexity": "beginner",
        "tags": ["quickstart"],
        "validated": true,
    }))
    .add_example(json!({
        "example_id": "delete_rows",
        "language": "python",
        "title": "Delete rows",
        "use_case": "Remove rows from a table using a SQL predicate",
        "apis_used": ["lancedb.table.Table.delete"],
        "complexity": "intermediate",
        "tags": ["table"],
    }))
    .add_example(json!({
        "example_id": "vector_search_filter",
        "language": "python",
        "title": "Vector search with filters",
        "use_case": "Run a nearest neighbour query with a metadata filter",
        "apis_used": ["lancedb.table.Table.search"],
        "complexity": "advanced",
        "tags": ["search", "vector"],
        "validated": true,
    }));
    kb.write_json(
        "metadata.json",
        &json!({
            "generation_mode": "fixture",
            "total_apis": 5,
            "total_examples": 3,
            "apis_by_language": {"python": 4, "typescript": 1},
            "examples_by_language": {"python": 3},
            "validated_examples": 2,
        }),
    );
    kb
}

#[fixture]
pub fn sample_kb() -> TempKnowledgeBase {
    build_sample_kb()
}

#[fixture]
pub fn empty_kb() -> TempKnowledgeBase {
    TempKnowledgeBase::new("empty")
}
