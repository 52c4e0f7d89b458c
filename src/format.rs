//! Plain-text rendering of search output for terminals.

use crate::engine::{EngineStats, IdSuggestion, MethodComparison};
use crate::kb::{KbEntry, KbMetadata, LibraryOverview};
use crate::types::SearchResult;
use std::collections::BTreeSet;
use std::fmt::Write as _;

/// Numbered result list with relevance relative to the best hit.
pub fn format_search_results(results: &[SearchResult], query: &str) -> String {
    if results.is_empty() {
        let mut msg = format!("No results found for '{}'.\n\n", query);
        msg.push_str("Search tips:\n");
        msg.push_str("• Try a shorter or more general term\n");
        msg.push_str("• Search for API names like 'connect' or 'create_table'\n");
        msg.push_str("• Drop language or complexity filters\n");
        return msg;
    }

    let mut output = format!("Search results for '{}':\n\n", query);
    write_results(&mut output, results);
    output
}

fn write_results(output: &mut String, results: &[SearchResult]) {
    let max_score = results
        .first()
        .map(|r| r.score)
        .filter(|s| *s > 0.0)
        .unwrap_or(1.0);

    for (idx, result) in results.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let relevance = ((result.score / max_score) * 100.0).round() as u8;
        let _ = writeln!(
            output,
            "{}. `{}` ({}, {}) - relevance: {}%",
            idx + 1,
            result.title,
            result.kind,
            result.language,
            relevance
        );
        if result.title != result.id {
            let _ = writeln!(output, "   id: {}", result.id);
        }
        if let Some(first_line) = result.description.lines().find(|l| !l.trim().is_empty()) {
            let _ = writeln!(output, "   {}", first_line.trim());
        }
        output.push('\n');
    }
}

/// Full details for a single entry.
pub fn format_entry_details(entry: &KbEntry) -> String {
    let mut output = String::new();
    match entry {
        KbEntry::Api(api) => {
            let _ = writeln!(output, "API `{}` ({})", api.id, api.language);
            if !api.signature.is_empty() {
                let _ = writeln!(output, "\n    {}", api.signature);
            }
            if !api.description.is_empty() {
                let _ = writeln!(output, "\n{}", api.description);
            }
            if !api.parameters.is_empty() {
                output.push_str("\nParameters:\n");
                for param in &api.parameters {
                    let ty = if param.ty.is_empty() { "any" } else { param.ty.as_str() };
                    let required = if param.required { "" } else { ", optional" };
                    let _ = write!(output, "• `{}`: {}{}", param.name, ty, required);
                    if let Some(default) = &param.default {
                        let _ = write!(output, " = {}", default);
                    }
                    if !param.description.is_empty() {
                        let _ = write!(output, " - {}", param.description);
                    }
                    output.push('\n');
                }
            }
            let _ = writeln!(output, "\nImportance: {:.2}", api.importance_score);
            write_list(&mut output, "Tags", &api.tags);
            write_list(&mut output, "Related APIs", &api.related_apis);
            write_list(&mut output, "Examples", &api.examples);
        }
        KbEntry::Example(example) => {
            let _ = writeln!(
                output,
                "Example `{}` ({}, {})",
                example.id, example.language, example.complexity
            );
            if !example.title.is_empty() {
                let _ = writeln!(output, "\n{}", example.title);
            }
            if !example.use_case.is_empty() {
                let _ = writeln!(output, "{}", example.use_case);
            }
            if !example.code.is_empty() {
                let _ = writeln!(output, "\n```{}\n{}\n```", example.language, example.code.trim_end());
            }
            write_list(&mut output, "APIs used", &example.apis_used);
            write_list(&mut output, "Prerequisites", &example.prerequisites);
            write_list(&mut output, "Tags", &example.tags);
            let _ = writeln!(output, "Validated: {}", example.validated);
        }
    }
    output
}

fn write_list(output: &mut String, label: &str, values: &[String]) {
    if !values.is_empty() {
        let _ = writeln!(output, "{}: {}", label, values.join(", "));
    }
}

/// Not-found message with near-miss ids.
pub fn format_not_found(id: &str, suggestions: &[IdSuggestion]) -> String {
    let mut output = format!("Entry '{}' not found.", id);
    if !suggestions.is_empty() {
        output.push_str(" Did you mean one of these?\n\n");
        for suggestion in suggestions {
            let _ = writeln!(output, "• `{}` ({})", suggestion.id, suggestion.kind);
        }
    } else {
        output.push('\n');
    }
    output
}

/// Three rankings for one query, one section each.
pub fn format_comparison(comparison: &MethodComparison, mode: &str) -> String {
    let mut output = format!("Comparison for '{}' [{}]\n\n", comparison.query, mode);
    for (label, results) in [
        ("Keyword", &comparison.lexical_results),
        ("Vector", &comparison.vector_results),
        ("Hybrid", &comparison.fused_results),
    ] {
        let _ = writeln!(output, "== {} ({} results) ==\n", label, results.len());
        write_results(&mut output, results);
    }
    output
}

/// Library overview followed by corpus statistics.
pub fn format_overview(
    overview: &LibraryOverview,
    metadata: Option<&KbMetadata>,
    stats: &EngineStats,
    mode: &str,
) -> String {
    let mut output = String::new();
    let _ = write!(output, "# {}", overview.name);
    if !overview.version.is_empty() {
        let _ = write!(output, " {}", overview.version);
    }
    output.push_str("\n\n");
    if !overview.description.is_empty() {
        let _ = writeln!(output, "{}\n", overview.description);
    }
    write_list(&mut output, "Languages", &overview.languages);
    if let Some(domain) = &overview.domain {
        let _ = writeln!(output, "Domain: {}", domain);
    }
    write_list(&mut output, "Key concepts", &overview.key_concepts);
    if !overview.quickstart_summary.is_empty() {
        let _ = writeln!(output, "\nQuickstart: {}", overview.quickstart_summary);
    }

    let _ = writeln!(
        output,
        "\nIndexed: {} APIs, {} examples, {} terms",
        stats.total_apis, stats.total_examples, stats.vocabulary_size
    );
    let languages: BTreeSet<&String> = stats
        .apis_by_language
        .keys()
        .chain(stats.examples_by_language.keys())
        .collect();
    for language in languages {
        let apis = stats.apis_by_language.get(language).copied().unwrap_or(0);
        let examples = stats.examples_by_language.get(language).copied().unwrap_or(0);
        let _ = writeln!(output, "• {}: {} APIs, {} examples", language, apis, examples);
    }
    if let Some(metadata) = metadata {
        if let Some(validated) = metadata.validated_examples {
            let _ = writeln!(output, "Validated examples: {}", validated);
        }
        if let Some(timestamp) = &metadata.timestamp {
            let _ = writeln!(output, "Generated: {}", timestamp);
        }
    }
    let _ = writeln!(output, "Search mode: {}", mode);
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kb::ResultKind;
    use assert2::check;
    use serde_json::Map;

    fn result(id: &str, score: f32) -> SearchResult {
        SearchResult {
            kind: ResultKind::Api,
            id: id.into(),
            title: id.into(),
            description: "Connect to a database\nMore text".into(),
            score,
            language: "python".into(),
            metadata: Map::new(),
        }
    }

    #[test]
    fn test_relative_relevance() {
        let output = format_search_results(&[result("a", 2.0), result("b", 1.0)], "connect");
        check!(output.contains("1. `a` (api, python) - relevance: 100%"));
        check!(output.contains("2. `b` (api, python) - relevance: 50%"));
        check!(output.contains("   Connect to a database\n"));
        check!(!output.contains("More text"));
    }

    #[test]
    fn test_empty_results_give_tips() {
        check!(format_search_results(&[], "zzz").starts_with("No results found for 'zzz'"));
    }

    #[test]
    fn test_not_found_lists_suggestions() {
        let suggestions = [IdSuggestion {
            id: "db.connect".into(),
            kind: ResultKind::Api,
            score: 0.9,
        }];
        let output = format_not_found("db.conect", &suggestions);
        check!(output.contains("• `db.connect` (api)"));
    }
}
