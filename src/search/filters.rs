//! Query-time filters shared by the lexical and vector indices.

use crate::kb::{Complexity, KbEntry};

/// Filters for API searches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiFilter {
    /// Exact language match.
    pub language: Option<String>,
    /// Entries whose importance is below this value are excluded.
    pub min_importance: Option<f32>,
}

impl ApiFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub const fn min_importance(mut self, min_importance: f32) -> Self {
        self.min_importance = Some(min_importance);
        self
    }

    pub fn matches(&self, entry: &KbEntry) -> bool {
        let Some(api) = entry.as_api() else {
            return false;
        };
        if let Some(language) = &self.language
            && api.language != *language
        {
            return false;
        }
        self.min_importance
            .is_none_or(|min| api.importance_score >= min)
    }
}

/// Filters for example searches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExampleFilter {
    pub language: Option<String>,
    pub complexity: Option<Complexity>,
}

impl ExampleFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub const fn complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = Some(complexity);
        self
    }

    pub fn matches(&self, entry: &KbEntry) -> bool {
        let Some(example) = entry.as_example() else {
            return false;
        };
        if let Some(language) = &self.language
            && example.language != *language
        {
            return false;
        }
        self.complexity.is_none_or(|c| example.complexity == c)
    }
}

/// A filter for one entry kind.
#[derive(Debug, Clone, Copy)]
pub(crate) enum EntryFilter<'a> {
    Api(&'a ApiFilter),
    Example(&'a ExampleFilter),
}

impl EntryFilter<'_> {
    pub(crate) fn matches(self, entry: &KbEntry) -> bool {
        match self {
            Self::Api(filter) => filter.matches(entry),
            Self::Example(filter) => filter.matches(entry),
        }
    }
}
