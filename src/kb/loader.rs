//! Loads an on-disk knowledge base into memory.
//!
//! Layout:
//! ```text
//! knowledge_base/
//!   index.json              {"apis": {lang: [{api_id, file}]}, "examples": {lang: [{example_id, file}]}}
//!   library_overview.json
//!   metadata.json           (optional)
//!   api_catalog/<language>/<safe-id>.json
//!   examples_db/<language>/<safe-id>.json
//! ```

use super::entry::{ApiEntry, ExampleEntry, KbEntry, KbMetadata, LibraryOverview};
use crate::error::ConfigurationError;
use ahash::AHashSet;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Maximum length in bytes of a generated entry file stem.
const MAX_FILE_STEM_LEN: usize = 200;

/// One listing in `index.json`.
#[derive(Debug, Clone, Deserialize)]
struct IndexListing {
    #[serde(alias = "api_id", alias = "example_id")]
    id: String,
    file: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct IndexFile {
    #[serde(default)]
    apis: BTreeMap<String, Vec<IndexListing>>,
    #[serde(default)]
    examples: BTreeMap<String, Vec<IndexListing>>,
}

/// In-memory snapshot of a knowledge base.
///
/// Entries are kept in load order: languages ascending, then listing order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    root: PathBuf,
    overview: LibraryOverview,
    metadata: Option<KbMetadata>,
    apis: Vec<KbEntry>,
    examples: Vec<KbEntry>,
}

impl KnowledgeBase {
    /// Loads the index, the overview and every listed entry under `root`.
    ///
    /// Missing or malformed `index.json` / `library_overview.json` is fatal.
    /// Individual entry files that are missing or unparseable are skipped.
    pub fn load(root: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let root = root.as_ref().to_path_buf();
        let start = std::time::Instant::now();

        let index: IndexFile = read_required(&root.join("index.json"))?;
        let overview: LibraryOverview = read_required(&root.join("library_overview.json"))?;
        let metadata = read_optional::<KbMetadata>(&root.join("metadata.json"));

        let apis = load_listings(&root, &index.apis, |path| {
            read_entry::<ApiEntry>(path).map(KbEntry::Api)
        });
        let examples = load_listings(&root, &index.examples, |path| {
            read_entry::<ExampleEntry>(path).map(KbEntry::Example)
        });

        tracing::info!(
            "Loaded knowledge base '{}' from {}: {} APIs, {} examples in {:?}",
            overview.name,
            root.display(),
            apis.len(),
            examples.len(),
            start.elapsed()
        );

        Ok(Self {
            root,
            overview,
            metadata,
            apis,
            examples,
        })
    }

    /// Builds a knowledge base from already materialized entries.
    pub fn from_entries(
        overview: LibraryOverview,
        apis: Vec<ApiEntry>,
        examples: Vec<ExampleEntry>,
    ) -> Self {
        Self {
            root: PathBuf::new(),
            overview,
            metadata: None,
            apis: apis.into_iter().map(KbEntry::Api).collect(),
            examples: examples.into_iter().map(KbEntry::Example).collect(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub const fn overview(&self) -> &LibraryOverview {
        &self.overview
    }

    pub const fn metadata(&self) -> Option<&KbMetadata> {
        self.metadata.as_ref()
    }

    pub fn apis(&self) -> &[KbEntry] {
        &self.apis
    }

    pub fn examples(&self) -> &[KbEntry] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.apis.len() + self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Converts an entry id into the file stem used on disk.
///
/// `.`, `:`, `/`, `\` and spaces become `_`; the result is capped at 200 bytes.
pub fn safe_file_stem(id: &str) -> String {
    let mut safe: String = id
        .chars()
        .map(|c| match c {
            '.' | ':' | '/' | '\\' | ' ' => '_',
            other => other,
        })
        .collect();
    if safe.len() > MAX_FILE_STEM_LEN {
        let mut cut = MAX_FILE_STEM_LEN;
        while !safe.is_char_boundary(cut) {
            cut -= 1;
        }
        safe.truncate(cut);
    }
    safe
}

fn load_listings(
    root: &Path,
    listings: &BTreeMap<String, Vec<IndexListing>>,
    read: impl Fn(&Path) -> Option<KbEntry>,
) -> Vec<KbEntry> {
    let mut seen = AHashSet::new();
    let mut entries = Vec::new();

    for (language, list) in listings {
        for listing in list {
            if !seen.insert(listing.id.as_str()) {
                tracing::warn!(
                    "Duplicate entry '{}' listed under '{}', keeping first occurrence",
                    listing.id,
                    language
                );
                continue;
            }

            let path = root.join(&listing.file);
            if !path.exists() {
                tracing::warn!("Entry file not found: {}", path.display());
                continue;
            }

            if let Some(entry) = read(&path) {
                if entry.id() != listing.id {
                    tracing::debug!(
                        "Entry file {} declares id '{}' but is listed as '{}'",
                        path.display(),
                        entry.id(),
                        listing.id
                    );
                }
                entries.push(entry);
            }
        }
    }

    entries
}

fn read_entry<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("Failed to read entry file {}: {}", path.display(), e);
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!("Skipping malformed entry file {}: {}", path.display(), e);
            None
        }
    }
}

fn read_required<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigurationError> {
    if !path.exists() {
        return Err(ConfigurationError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigurationError::Malformed {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

fn read_optional<T: DeserializeOwned>(path: &Path) -> Option<T> {
    let content = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Ignoring malformed {}: {}", path.display(), e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::check;
    use rstest::rstest;

    #[rstest]
    #[case("lancedb.connect", "lancedb_connect")]
    #[case("Table::add", "Table__add")]
    #[case("a/b c\\d", "a_b_c_d")]
    fn test_safe_file_stem(#[case] input: &str, #[case] expected: &str) {
        check!(safe_file_stem(input) == expected);
    }

    #[test]
    fn test_safe_file_stem_truncates_on_char_boundary() {
        let long = "é".repeat(150);
        let stem = safe_file_stem(&long);
        check!(stem.len() <= MAX_FILE_STEM_LEN);
        check!(stem.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_index_listing_accepts_both_id_keys() {
        let index: IndexFile = serde_json::from_str(
            r#"{"apis": {"python": [{"api_id": "a", "file": "api_catalog/python/a.json"}]},
                "examples": {"python": [{"example_id": "e", "file": "examples_db/python/e.json", "title": "t"}]}}"#,
        )
        .unwrap();
        check!(index.apis["python"][0].id == "a");
        check!(index.examples["python"][0].id == "e");
    }
}
