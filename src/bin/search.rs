//! Search binary entry point.
//!
//! This binary provides a command-line interface for searching a pre-built
//! paper corpus. It supports both single-query and interactive REPL modes,
//! with flexible output formatting (table or JSON).
//!
//! # Examples
//!
//! Single query with default settings:
//! ```bash
//! search --corpus-dir corpus --protein1 TP53 --protein2 MDM2 \
//!        --query "cancer treatment resistance"
//! ```
//!
//! JSON output with more results:
//! ```bash
//! search --corpus-dir corpus --protein1 BRCA1 --protein2 RAD51 \
//!        --query "PARP inhibitor response" --format json --top-k 20
//! ```
//!
//! Interactive mode:
//! ```bash
//! search --corpus-dir corpus --protein1 TP53 --protein2 MDM2 --interactive
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use ppi_paper_search::{
    context::SearchContext,
    embedding::{fastembed::FastEmbedProvider, openai::OpenAIEmbedding, EmbeddingProvider},
    models::{RelevanceLevel, SearchResult},
    query::{IndexSearchEngine, ProteinPair, SearchEngine, SearchQuery},
};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Wrapper enum for embedding providers to allow dynamic dispatch
enum DynamicEmbeddingProvider {
    FastEmbed(FastEmbedProvider),
    OpenAI(OpenAIEmbedding),
}

#[async_trait::async_trait]
impl EmbeddingProvider for DynamicEmbeddingProvider {
    async fn embed(
        &self,
        text: &str,
    ) -> ppi_paper_search::embedding::EmbeddingResult<Vec<f32>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed(text).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed(text).await,
        }
    }

    async fn embed_batch(
        &self,
        texts: &[&str],
    ) -> ppi_paper_search::embedding::EmbeddingResult<Vec<Vec<f32>>> {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.embed_batch(texts).await,
            DynamicEmbeddingProvider::OpenAI(p) => p.embed_batch(texts).await,
        }
    }

    fn dimension(&self) -> usize {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.dimension(),
            DynamicEmbeddingProvider::OpenAI(p) => p.dimension(),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            DynamicEmbeddingProvider::FastEmbed(p) => p.model_name(),
            DynamicEmbeddingProvider::OpenAI(p) => p.model_name(),
        }
    }
}

/// Output format for search results
#[derive(Debug, Clone, ValueEnum)]
enum OutputFormat {
    /// Human-friendly table with colored relevance levels
    Table,
    /// Machine-readable JSON format
    Json,
}

/// Search CLI for querying the paper corpus
#[derive(Parser, Debug)]
#[command(
    name = "search",
    version,
    about = "Search biomedical papers by protein pair and therapeutic query",
    long_about = "Query the paper corpus using semantic similarity. The free-text query is \
                  enriched with the protein pair before embedding, biasing results toward \
                  literature about that interaction.

EXAMPLES:
  Single query:
    search --corpus-dir corpus --protein1 TP53 --protein2 MDM2 --query \"cancer treatment resistance\"

  JSON output:
    search --corpus-dir corpus --protein1 BRCA1 --protein2 RAD51 --query \"PARP inhibitors\" --format json

  Interactive mode:
    search --corpus-dir corpus --protein1 TP53 --protein2 MDM2 --interactive"
)]
struct Args {
    /// Corpus directory (index.bin, pmids.json, papers.db)
    #[arg(long, value_name = "DIR")]
    corpus_dir: PathBuf,

    /// First protein name
    #[arg(long, value_name = "NAME")]
    protein1: String,

    /// Second protein name
    #[arg(long, value_name = "NAME")]
    protein2: String,

    /// Therapeutic query (required for single-query mode, omitted in interactive mode)
    #[arg(long, value_name = "TEXT", conflicts_with = "interactive")]
    query: Option<String>,

    /// Number of results to return
    #[arg(long, value_name = "N", default_value = "10")]
    top_k: usize,

    /// Deadline for the embedding call, in seconds
    #[arg(long, value_name = "SECS")]
    embed_timeout: Option<u64>,

    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,

    /// Enable interactive REPL mode
    #[arg(long, short = 'i')]
    interactive: bool,

    /// Logging verbosity level
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    /// FastEmbed model cache directory (only used with FastEmbed provider)
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,
}

/// Setup logging with the specified level
fn setup_logging(log_level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level)),
        )
        .init();
}

/// Auto-detect and instantiate the embedding provider based on corpus config
async fn create_embedding_provider(
    model_name: &str,
    dimension: usize,
    cache_dir: Option<PathBuf>,
) -> Result<DynamicEmbeddingProvider> {
    info!("Auto-detecting embedding provider for model: {}", model_name);

    // Check if it's an OpenAI model
    if model_name.contains("text-embedding") {
        info!("Detected OpenAI embedding model");
        let api_key = std::env::var("OPENAI_API_KEY").with_context(|| {
            "OPENAI_API_KEY environment variable required for OpenAI embeddings.\n\
             Set it with: export OPENAI_API_KEY=your-api-key"
        })?;

        let provider = OpenAIEmbedding::new(api_key, Some(model_name.to_string()));

        if provider.dimension() != dimension {
            anyhow::bail!(
                "Dimension mismatch: expected {} from corpus config, but provider returns {}",
                dimension,
                provider.dimension()
            );
        }

        Ok(DynamicEmbeddingProvider::OpenAI(provider))
    } else {
        // Assume FastEmbed for all other models
        info!("Detected FastEmbed model");

        let provider = if let Some(cache_dir) = cache_dir {
            FastEmbedProvider::new(None, Some(cache_dir.to_string_lossy().to_string()))
                .with_context(|| "Failed to create FastEmbed provider with custom cache directory")?
        } else {
            FastEmbedProvider::new(None, None)
                .with_context(|| "Failed to create FastEmbed provider")?
        };

        if provider.dimension() != dimension {
            anyhow::bail!(
                "Dimension mismatch: expected {} from corpus config, but provider returns {}",
                dimension,
                provider.dimension()
            );
        }

        Ok(DynamicEmbeddingProvider::FastEmbed(provider))
    }
}

/// Execute a search query and return results
async fn execute_search<E: EmbeddingProvider>(
    engine: &IndexSearchEngine<E>,
    query_text: &str,
    proteins: &ProteinPair,
    top_k: usize,
    embed_timeout: Option<Duration>,
) -> Result<Vec<SearchResult>> {
    let mut query = SearchQuery::new(query_text.to_string(), proteins.clone(), Some(top_k));
    if let Some(timeout) = embed_timeout {
        query = query.with_embed_timeout(timeout);
    }

    let results = engine
        .search(&query)
        .await
        .with_context(|| format!("Failed to execute search for query: '{}'", query_text))?;

    Ok(results)
}

/// Format results as a pretty table
fn format_results_table(results: &[SearchResult]) -> String {
    if results.is_empty() {
        return "No results found.".to_string();
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Rank").add_attribute(Attribute::Bold),
        Cell::new("PMID").add_attribute(Attribute::Bold),
        Cell::new("Title").add_attribute(Attribute::Bold),
        Cell::new("Journal").add_attribute(Attribute::Bold),
        Cell::new("Year").add_attribute(Attribute::Bold),
        Cell::new("Relevance").add_attribute(Attribute::Bold),
        Cell::new("Score").add_attribute(Attribute::Bold),
    ]);

    for (idx, result) in results.iter().enumerate() {
        // Truncate long titles
        let title_display = if result.title.len() > 60 {
            format!("{}...", &result.title[..57])
        } else {
            result.title.clone()
        };

        // Truncate long journal names
        let journal_display = if result.journal.len() > 30 {
            format!("{}...", &result.journal[..27])
        } else {
            result.journal.clone()
        };

        // Color-code relevance
        let (relevance_str, color) = match result.relevance {
            RelevanceLevel::Identical => ("IDENTICAL", Color::Green),
            RelevanceLevel::HighlySimilar => ("HIGHLY_SIMILAR", Color::Cyan),
            RelevanceLevel::Similar => ("SIMILAR", Color::Yellow),
            RelevanceLevel::Relevant => ("RELEVANT", Color::White),
        };

        table.add_row(vec![
            Cell::new(format!("{}", idx + 1)),
            Cell::new(&result.pmid),
            Cell::new(title_display),
            Cell::new(journal_display),
            Cell::new(result.year),
            Cell::new(relevance_str).fg(color),
            Cell::new(format!("{:.4}", result.score)),
        ]);
    }

    table.to_string()
}

/// Format results as JSON
fn format_results_json(results: &[SearchResult]) -> Result<String> {
    serde_json::to_string_pretty(results).with_context(|| "Failed to serialize results to JSON")
}

/// Display detailed view of a single result
fn display_result_detail(result: &SearchResult, rank: usize) {
    println!("\n{}", "=".repeat(80));
    println!("Rank: {}", rank);
    println!("PMID: {}", result.pmid);
    println!("Title: {}", result.title);
    println!("Journal: {}", result.journal);
    println!("Year: {}", result.year);
    println!("Relevance: {:?}", result.relevance);
    println!("Score: {:.4}", result.score);
    println!("{}", "=".repeat(80));
}

fn print_repl_help() {
    println!("Commands:");
    println!("  <query>            - Search with the current protein pair");
    println!("  /proteins A B      - Change the protein pair");
    println!("  /top N             - Set number of results to N");
    println!("  /format table      - Use table output format");
    println!("  /format json       - Use JSON output format");
    println!("  /detail N          - Show full details for result rank N");
    println!("  /help              - Show this help");
    println!("  Ctrl+D or Ctrl+C   - Exit");
}

/// Run interactive REPL mode
async fn run_interactive<E: EmbeddingProvider>(
    engine: IndexSearchEngine<E>,
    mut proteins: ProteinPair,
    mut top_k: usize,
    embed_timeout: Option<Duration>,
    mut format: OutputFormat,
) -> Result<()> {
    println!("Interactive Paper Search");
    println!("Protein pair: {} / {}", proteins.first, proteins.second);
    print_repl_help();
    println!();

    let mut rl = DefaultEditor::new().with_context(|| "Failed to create readline editor")?;

    let mut last_results: Vec<SearchResult> = Vec::new();

    loop {
        let readline = rl.readline("Search> ");
        match readline {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                rl.add_history_entry(line).ok();

                if line.starts_with('/') {
                    let parts: Vec<&str> = line.split_whitespace().collect();
                    match parts[0] {
                        "/help" => print_repl_help(),
                        "/proteins" => {
                            if parts.len() != 3 {
                                eprintln!("Usage: /proteins FIRST SECOND");
                                continue;
                            }
                            proteins = ProteinPair::new(parts[1], parts[2]);
                            println!("Protein pair set to {} / {}", proteins.first, proteins.second);
                        }
                        "/top" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /top N");
                                continue;
                            }
                            match parts[1].parse::<usize>() {
                                Ok(n) if n > 0 => {
                                    top_k = n;
                                    println!("Set top-k to {}", top_k);
                                }
                                _ => eprintln!("Invalid number: must be a positive integer"),
                            }
                        }
                        "/format" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /format [table|json]");
                                continue;
                            }
                            match parts[1] {
                                "table" => {
                                    format = OutputFormat::Table;
                                    println!("Set output format to table");
                                }
                                "json" => {
                                    format = OutputFormat::Json;
                                    println!("Set output format to JSON");
                                }
                                _ => eprintln!("Invalid format: must be 'table' or 'json'"),
                            }
                        }
                        "/detail" => {
                            if parts.len() != 2 {
                                eprintln!("Usage: /detail N");
                                continue;
                            }
                            match parts[1].parse::<usize>() {
                                Ok(rank) if rank > 0 && rank <= last_results.len() => {
                                    display_result_detail(&last_results[rank - 1], rank);
                                }
                                Ok(rank) if rank > last_results.len() => {
                                    eprintln!(
                                        "Rank {} out of range (last search had {} results)",
                                        rank,
                                        last_results.len()
                                    );
                                }
                                _ => eprintln!("Invalid rank: must be a positive integer"),
                            }
                        }
                        _ => eprintln!(
                            "Unknown command: {}. Type /help for available commands.",
                            parts[0]
                        ),
                    }
                } else {
                    let start = Instant::now();
                    match execute_search(&engine, line, &proteins, top_k, embed_timeout).await {
                        Ok(results) => {
                            let elapsed = start.elapsed();
                            last_results = results.clone();

                            match format {
                                OutputFormat::Table => {
                                    println!("{}", format_results_table(&results));
                                    println!(
                                        "\nFound {} results in {:.2}s",
                                        results.len(),
                                        elapsed.as_secs_f64()
                                    );
                                }
                                OutputFormat::Json => match format_results_json(&results) {
                                    Ok(json) => println!("{}", json),
                                    Err(e) => eprintln!("Error formatting JSON: {}", e),
                                },
                            }
                        }
                        Err(e) => {
                            eprintln!("Search failed: {:#}", e);
                        }
                    }
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!("Error reading input: {}", err);
                break;
            }
        }
    }

    Ok(())
}

/// Run single-query mode
async fn run_single_query<E: EmbeddingProvider>(
    engine: IndexSearchEngine<E>,
    query: &str,
    proteins: &ProteinPair,
    top_k: usize,
    embed_timeout: Option<Duration>,
    format: OutputFormat,
) -> Result<()> {
    let start = Instant::now();
    let results = execute_search(&engine, query, proteins, top_k, embed_timeout).await?;
    let elapsed = start.elapsed();

    match format {
        OutputFormat::Table => {
            println!("{}", format_results_table(&results));
            println!(
                "\nFound {} results in {:.2}s",
                results.len(),
                elapsed.as_secs_f64()
            );
        }
        OutputFormat::Json => {
            let json = format_results_json(&results)?;
            println!("{}", json);
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level);

    if !args.interactive && args.query.is_none() {
        anyhow::bail!(
            "Either --query or --interactive must be specified.\n\
             Use --help for usage information."
        );
    }

    if !args.corpus_dir.is_dir() {
        anyhow::bail!(
            "Corpus directory not found: {}\n\
             Please run the build-index binary first to create the corpus.",
            args.corpus_dir.display()
        );
    }

    info!("Loading corpus from: {}", args.corpus_dir.display());

    let context = SearchContext::load(&args.corpus_dir)
        .await
        .with_context(|| format!("Failed to load corpus from {}", args.corpus_dir.display()))?;

    if context.is_empty() {
        anyhow::bail!(
            "Corpus index is empty (0 vectors).\n\
             Please run the build-index binary to index papers first."
        );
    }

    info!(
        "Corpus contains {} vectors and {} metadata records",
        context.len(),
        context.metadata_count()
    );

    // Auto-detect and create the embedding provider from the stored config
    let config = context.config().clone();
    let embedding_provider =
        create_embedding_provider(&config.model_name, config.dimension, args.cache_dir).await?;

    info!("Embedding provider initialized successfully");

    let engine = IndexSearchEngine::new(embedding_provider, Arc::new(context));

    let proteins = ProteinPair::new(args.protein1.clone(), args.protein2.clone());
    let embed_timeout = args.embed_timeout.map(Duration::from_secs);

    if args.interactive {
        run_interactive(engine, proteins, args.top_k, embed_timeout, args.format).await?;
    } else {
        let query = args.query.unwrap(); // Safe because we validated above
        run_single_query(
            engine,
            &query,
            &proteins,
            args.top_k,
            embed_timeout,
            args.format,
        )
        .await?;
    }

    Ok(())
}
