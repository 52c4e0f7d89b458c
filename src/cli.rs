//! Command-line interface for querying a knowledge base.

use crate::config::EngineConfig;
use crate::engine::RetrievalEngine;
use crate::error::Result;
use crate::format::{
    format_comparison, format_entry_details, format_not_found, format_overview,
    format_search_results,
};
use crate::kb::ResultKind;
use crate::request::{ApiSearchRequest, ExampleSearchRequest, SearchRequest};
use crate::search::IdfScope;
use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

/// Number of id suggestions shown for a failed lookup.
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Parser)]
#[command(name = "kb-search", version)]
#[command(about = "Hybrid keyword + semantic search over API and example knowledge bases", long_about = None)]
pub struct Cli {
    /// Knowledge base directory (overrides the config file)
    #[arg(long, global = true)]
    pub kb: Option<PathBuf>,

    /// TOML engine configuration
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Embedding backend: hash, fastembed, or disabled for keyword-only search
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Embedding model for the fastembed backend
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Directory for cached embeddings
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// IDF corpus: combined or per-kind
    #[arg(long, global = true)]
    pub idf_scope: Option<IdfScope>,

    /// Output results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Search APIs and examples together
    Search {
        query: String,
        /// Restrict to `api` or `example`
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Search API entries
    Apis {
        query: String,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
        #[arg(long, default_value = "0.0")]
        min_importance: f32,
    },
    /// Search example entries
    Examples {
        query: String,
        #[arg(short, long)]
        language: Option<String>,
        /// beginner, intermediate or advanced
        #[arg(short, long)]
        complexity: Option<String>,
        #[arg(short = 'n', long, default_value = "5")]
        limit: usize,
    },
    /// Show a single entry by id
    Details { id: String },
    /// Show keyword, vector and hybrid rankings side by side
    Compare {
        query: String,
        #[arg(short, long)]
        kind: Option<String>,
        #[arg(short, long)]
        language: Option<String>,
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
    /// Describe the library and the indexed corpus
    Overview,
}

impl Cli {
    /// Resolves the engine configuration: file (if any), then flag overrides.
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => EngineConfig::default(),
        };
        if let Some(kb) = &self.kb {
            config.knowledge_base.clone_from(kb);
        }
        if let Some(backend) = &self.backend {
            config = config.with_backend(backend.as_str());
        }
        if let Some(model) = &self.model {
            config = config.with_model(model.as_str());
        }
        if let Some(cache_dir) = &self.cache_dir {
            config = config.with_cache_dir(cache_dir);
        }
        if let Some(scope) = self.idf_scope {
            config = config.with_idf_scope(scope);
        }
        Ok(config)
    }
}

/// Builds the engine and runs one command, returning the text to print.
///
/// Ctrl-C during the index build cancels it.
pub async fn run(cli: Cli) -> Result<String> {
    let cancel = CancellationToken::new();
    let interrupt = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling index build");
                cancel.cancel();
            }
        }
    });

    let output = run_with_cancel(cli, cancel).await;
    interrupt.abort();
    output
}

/// [`run`] with a caller-owned cancellation token.
pub async fn run_with_cancel(cli: Cli, cancel: CancellationToken) -> Result<String> {
    let config = cli.engine_config()?;
    let kb_path = config.knowledge_base.clone();
    let engine = RetrievalEngine::build_async(config, cancel)
        .await
        .with_context(|| format!("Failed to open knowledge base {}", kb_path.display()))?;

    execute(&engine, &cli.command, cli.json)
}

/// Runs one command against a built engine.
pub fn execute(engine: &RetrievalEngine, command: &Commands, json: bool) -> Result<String> {
    match command {
        Commands::Search {
            query,
            kind,
            language,
            limit,
        } => {
            let request = SearchRequest {
                query: query.clone(),
                result_kind: kind.clone(),
                language: language.clone(),
                top_k: *limit,
            };
            let results = request.execute(engine)?;
            render(json, &results, || format_search_results(&results, query))
        }
        Commands::Apis {
            query,
            language,
            limit,
            min_importance,
        } => {
            let request = ApiSearchRequest {
                query: query.clone(),
                language: language.clone(),
                top_k: *limit,
                min_importance: *min_importance,
            };
            let results = request.execute(engine)?;
            render(json, &results, || format_search_results(&results, query))
        }
        Commands::Examples {
            query,
            language,
            complexity,
            limit,
        } => {
            let request = ExampleSearchRequest {
                query: query.clone(),
                language: language.clone(),
                complexity: complexity.clone(),
                top_k: *limit,
            };
            let results = request.execute(engine)?;
            render(json, &results, || format_search_results(&results, query))
        }
        Commands::Details { id } => match engine.get_entry_details(id) {
            Some(entry) => render(json, entry, || format_entry_details(entry)),
            None => {
                let suggestions = engine.suggest_ids(id, MAX_SUGGESTIONS);
                let not_found = serde_json::json!({
                    "error": format!("Entry '{id}' not found"),
                    "suggestions": suggestions,
                });
                render(json, &not_found, || format_not_found(id, &suggestions))
            }
        },
        Commands::Compare {
            query,
            kind,
            language,
            limit,
        } => {
            let kind = kind.as_deref().map(str::parse::<ResultKind>).transpose()?;
            let comparison = engine.compare_methods(query, kind, language.as_deref(), *limit);
            render(json, &comparison, || {
                format_comparison(&comparison, &engine.mode_description())
            })
        }
        Commands::Overview => {
            let stats = engine.stats();
            let overview = serde_json::json!({
                "library": engine.library_overview(),
                "metadata": engine.metadata(),
                "stats": stats,
                "mode": engine.mode_description(),
            });
            render(json, &overview, || {
                format_overview(
                    engine.library_overview(),
                    engine.metadata(),
                    &stats,
                    &engine.mode_description(),
                )
            })
        }
    }
}

fn render<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<String> {
    if json {
        Ok(serde_json::to_string_pretty(value)?)
    } else {
        Ok(text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert2::{check, let_assert};

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::parse_from([
            "kb-search",
            "apis",
            "connect",
            "--kb",
            "/srv/kb",
            "--backend",
            "disabled",
            "--idf-scope",
            "per-kind",
            "--model",
            "bge-small-en-v1.5",
            "-n",
            "3",
        ]);
        let config = cli.engine_config().unwrap();
        check!(config.knowledge_base == PathBuf::from("/srv/kb"));
        check!(config.embedding.backend == "disabled");
        check!(config.embedding.model == "bge-small-en-v1.5");
        check!(config.idf_scope == IdfScope::PerKind);
        let_assert!(Commands::Apis { limit: 3, .. } = cli.command);
    }

    #[test]
    fn test_invalid_idf_scope_rejected() {
        check!(Cli::try_parse_from(["kb-search", "--idf-scope", "global", "overview"]).is_err());
    }
}
