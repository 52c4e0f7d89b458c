//! Untyped query boundary.
//!
//! Requests carry filter values as raw strings and numbers, as they arrive
//! from a CLI or a tool call. `execute` validates them before searching.

use crate::engine::RetrievalEngine;
use crate::error::QueryError;
use crate::kb::{Complexity, ResultKind};
use crate::search::{ApiFilter, ExampleFilter};
use crate::types::SearchResult;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ApiSearchRequest {
    pub query: String,
    /// Exact language match
    #[serde(default)]
    pub language: Option<String>,
    /// Maximum number of results to return (default: 5)
    #[serde(default = "default_api_top_k")]
    pub top_k: usize,
    /// Minimum importance in `[0, 1]` (default: 0)
    #[serde(default)]
    pub min_importance: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExampleSearchRequest {
    pub query: String,
    #[serde(default)]
    pub language: Option<String>,
    /// `beginner`, `intermediate` or `advanced`
    #[serde(default)]
    pub complexity: Option<String>,
    /// Maximum number of results to return (default: 5)
    #[serde(default = "default_example_top_k")]
    pub top_k: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    /// `api` or `example`; both when absent
    #[serde(default, alias = "result_type")]
    pub result_kind: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Maximum number of results to return (default: 10)
    #[serde(default = "default_search_top_k")]
    pub top_k: usize,
}

const fn default_api_top_k() -> usize {
    5
}

const fn default_example_top_k() -> usize {
    5
}

const fn default_search_top_k() -> usize {
    10
}

impl ApiSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            top_k: default_api_top_k(),
            min_importance: 0.0,
        }
    }

    pub fn filter(&self) -> Result<ApiFilter, QueryError> {
        let min_importance = self.min_importance;
        if !min_importance.is_finite() || !(0.0..=1.0).contains(&min_importance) {
            return Err(QueryError::InvalidImportance(min_importance));
        }
        let mut filter = ApiFilter::new().min_importance(min_importance);
        if let Some(language) = &self.language {
            filter = filter.language(language.as_str());
        }
        Ok(filter)
    }

    pub fn execute(&self, engine: &RetrievalEngine) -> Result<Vec<SearchResult>, QueryError> {
        let filter = self.filter()?;
        Ok(engine.search_apis(&self.query, &filter, self.top_k))
    }
}

impl ExampleSearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            language: None,
            complexity: None,
            top_k: default_example_top_k(),
        }
    }

    pub fn filter(&self) -> Result<ExampleFilter, QueryError> {
        let mut filter = ExampleFilter::new();
        if let Some(language) = &self.language {
            filter = filter.language(language.as_str());
        }
        if let Some(complexity) = &self.complexity {
            filter = filter.complexity(complexity.parse::<Complexity>()?);
        }
        Ok(filter)
    }

    pub fn execute(&self, engine: &RetrievalEngine) -> Result<Vec<SearchResult>, QueryError> {
        let filter = self.filter()?;
        Ok(engine.search_examples(&self.query, &filter, self.top_k))
    }
}

impl SearchRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            result_kind: None,
            language: None,
            top_k: default_search_top_k(),
        }
    }

    pub fn kind(&self) -> Result<Option<ResultKind>, QueryError> {
        self.result_kind
            .as_deref()
            .map(str::parse::<ResultKind>)
            .transpose()
    }

    pub fn execute(&self, engine: &RetrievalEngine) -> Result<Vec<SearchResult>, QueryError> {
        let kind = self.kind()?;
        Ok(engine.search(&self.query, kind, self.language.as_deref(), self.top_k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};
    use rstest::rstest;

    #[test]
    fn test_defaults_from_json() {
        let request: ApiSearchRequest = serde_json::from_str(r#"{"query": "connect"}"#).unwrap();
        check!(request.top_k == 5);
        check!(request.min_importance == 0.0);

        let request: SearchRequest =
            serde_json::from_str(r#"{"query": "connect", "result_type": "api"}"#).unwrap();
        check!(request.top_k == 10);
        check!(request.kind() == Ok(Some(ResultKind::Api)));
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    #[case(f32::NAN)]
    #[case(f32::INFINITY)]
    fn test_invalid_importance(#[case] value: f32) {
        let mut request = ApiSearchRequest::new("connect");
        request.min_importance = value;
        let_assert!(Err(QueryError::InvalidImportance(_)) = request.filter());
    }

    #[test]
    fn test_unknown_complexity() {
        let mut request = ExampleSearchRequest::new("connect");
        request.complexity = Some("expert".into());
        let_assert!(Err(QueryError::UnknownComplexity(raw)) = request.filter());
        check!(raw == "expert");
    }

    #[test]
    fn test_unknown_result_kind() {
        let mut request = SearchRequest::new("connect");
        request.result_kind = Some("tutorial".into());
        let_assert!(Err(QueryError::UnknownResultKind(_)) = request.kind());
    }

    #[test]
    fn test_filters_carry_language() {
        let mut request = ExampleSearchRequest::new("connect");
        request.language = Some("python".into());
        request.complexity = Some("Advanced".into());
        let filter = request.filter().unwrap();
        check!(filter == ExampleFilter::new().language("python").complexity(Complexity::Advanced));
    }
}
