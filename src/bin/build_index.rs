//! Corpus build binary entry point.
//!
//! This binary runs the offline build pipeline: it reads corpus documents
//! from a JSON file, generates abstract embeddings, and writes the three
//! corpus artifacts (index snapshot, identifier map, metadata database) into
//! the output directory.
//!
//! # Examples
//!
//! Build a corpus with local embeddings:
//! ```bash
//! build-index --input papers.json --corpus-dir corpus
//! ```
//!
//! Use OpenAI embeddings:
//! ```bash
//! OPENAI_API_KEY=sk-... build-index --input papers.json --corpus-dir corpus \
//!     --embedding-provider open-ai
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use ppi_paper_search::{
    context::METADATA_DB,
    embedding::{fastembed::FastEmbedProvider, openai::OpenAIEmbedding, EmbeddingProvider},
    ingestion::IngestionPipeline,
    provider::{json::JsonFileProvider, DocumentProvider},
    storage::sqlite::SqliteStore,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};
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

/// Embedding provider type
#[derive(Debug, Clone, ValueEnum)]
enum EmbeddingProviderType {
    /// FastEmbed local embedding provider (default, no API required)
    FastEmbed,
    /// OpenAI cloud-based embedding provider (requires OPENAI_API_KEY)
    OpenAI,
}

/// Build CLI for creating the searchable paper corpus
#[derive(Parser, Debug)]
#[command(
    name = "build-index",
    version,
    about = "Build the paper search corpus from a document file",
    long_about = "Offline build pipeline: reads corpus documents (citation metadata plus \
                  abstracts), generates embeddings, and writes the corpus artifacts the \
                  search binary consumes.

EXAMPLES:
  Build with local embeddings:
    build-index --input papers.json --corpus-dir corpus

  Use OpenAI embeddings:
    OPENAI_API_KEY=sk-... build-index --input papers.json --corpus-dir corpus --embedding-provider open-ai

  Custom batch size and logging:
    build-index --input papers.json --corpus-dir corpus --batch-size 50 --log-level debug"
)]
struct BuildArgs {
    /// Input JSON file containing corpus documents
    #[arg(short, long, value_name = "FILE")]
    input: PathBuf,

    /// Output corpus directory
    #[arg(long, value_name = "DIR", default_value = "corpus")]
    corpus_dir: PathBuf,

    /// Embedding provider to use
    #[arg(long, value_enum, default_value = "fast-embed")]
    embedding_provider: EmbeddingProviderType,

    /// Specific embedding model name (provider-dependent, optional)
    #[arg(long, value_name = "MODEL")]
    embedding_model: Option<String>,

    /// Number of documents to process per embedding batch
    #[arg(long, value_name = "N", default_value = "100")]
    batch_size: usize,

    /// Logging verbosity level
    #[arg(long, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// FastEmbed model cache directory
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<String>,
}

/// Initialize logging subsystem with the specified level
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Create an embedding provider based on CLI arguments
fn create_embedding_provider(args: &BuildArgs) -> Result<DynamicEmbeddingProvider> {
    match args.embedding_provider {
        EmbeddingProviderType::FastEmbed => {
            info!("Initializing FastEmbed provider");

            let cache_dir = args.cache_dir.clone().or_else(|| {
                dirs::cache_dir().map(|p| p.join("fastembed").to_string_lossy().to_string())
            });
            if let Some(dir) = &cache_dir {
                debug!("Using model cache directory: {}", dir);
            }

            let provider = FastEmbedProvider::new(None, cache_dir)
                .context("Failed to initialize FastEmbed provider")?;

            info!(
                "FastEmbed provider initialized: model={}, dimension={}",
                provider.model_name(),
                provider.dimension()
            );

            Ok(DynamicEmbeddingProvider::FastEmbed(provider))
        }
        EmbeddingProviderType::OpenAI => {
            info!("Initializing OpenAI embedding provider");

            let api_key = std::env::var("OPENAI_API_KEY").context(
                "OPENAI_API_KEY environment variable must be set when using OpenAI provider",
            )?;

            let provider = OpenAIEmbedding::new(api_key, args.embedding_model.clone());

            info!(
                "OpenAI provider initialized: model={}, dimension={}",
                provider.model_name(),
                provider.dimension()
            );

            Ok(DynamicEmbeddingProvider::OpenAI(provider))
        }
    }
}

/// Create a progress bar for tracking the build
fn create_progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} documents | Indexed: {msg}")
            .expect("Invalid progress bar template")
            .progress_chars("##-"),
    );
    pb
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = BuildArgs::parse();

    init_logging(&args.log_level);

    info!("Starting corpus build pipeline");
    debug!("CLI arguments: {:?}", args);

    let start_time = Instant::now();

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }
    info!("Input file: {}", args.input.display());

    std::fs::create_dir_all(&args.corpus_dir).with_context(|| {
        format!(
            "Failed to create corpus directory: {}",
            args.corpus_dir.display()
        )
    })?;

    let db_path = args.corpus_dir.join(METADATA_DB);
    if db_path.exists() {
        anyhow::bail!(
            "Corpus directory already contains {}.\n\
             Incremental updates are not supported; remove the old corpus first.",
            db_path.display()
        );
    }

    let embedding_provider =
        create_embedding_provider(&args).context("Failed to create embedding provider")?;

    let store = SqliteStore::open(&db_path)
        .with_context(|| format!("Failed to open metadata store at {}", db_path.display()))?;

    let mut pipeline =
        IngestionPipeline::initialize_new(embedding_provider, store, Some(args.batch_size))
            .await
            .context("Failed to initialize build pipeline")?;

    info!("Loading documents from {}...", args.input.display());
    let source = JsonFileProvider::from_file(&args.input)
        .await
        .with_context(|| format!("Failed to load documents from {}", args.input.display()))?;

    let document_count = source.count_documents().await?;
    info!("Found {} documents from {}", document_count, source.name());

    if document_count == 0 {
        warn!("No documents found in input file");
        return Ok(());
    }

    let progress = create_progress_bar(document_count);
    progress.set_message("0");

    info!("Processing documents with batch_size={}...", args.batch_size);
    let stats = pipeline
        .ingest_from_provider(&source)
        .await
        .context("Failed to ingest documents")?;

    progress.finish_with_message(format!("{}", stats.indexed));

    pipeline
        .finish(&args.corpus_dir)
        .context("Failed to write corpus artifacts")?;

    let elapsed = start_time.elapsed();
    println!("\nCorpus build completed");
    println!("  Total processed:    {}", stats.total_processed);
    println!("  Indexed:            {}", stats.indexed);
    println!("  Duplicates skipped: {}", stats.duplicates_skipped);
    println!("  Failed:             {}", stats.failed);
    println!("  Elapsed time:       {:.2?}", elapsed);
    println!("  Corpus directory:   {}", args.corpus_dir.display());

    if stats.failed > 0 {
        warn!(
            "{} documents failed to process - check logs for details",
            stats.failed
        );
    }

    info!("Corpus build pipeline completed successfully");

    Ok(())
}
