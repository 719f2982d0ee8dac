//! Corpus build pipeline.
//!
//! This module handles the offline pipeline that turns raw corpus documents
//! into the three artifacts the search path consumes: the vector index, the
//! identifier map, and the metadata database.
//!
//! The pipeline embeds normalized abstracts in batches and feeds the index
//! builder and the metadata store from the same loop, so index rows and
//! identifiers are produced in lockstep and the embedding configuration
//! recorded in the store always matches the vectors in the index.
//!
//! ```ignore
//! use ppi_paper_search::ingestion::IngestionPipeline;
//! use ppi_paper_search::storage::sqlite::SqliteStore;
//! use ppi_paper_search::provider::json::JsonFileProvider;
//!
//! let store = SqliteStore::open(corpus_dir.join("papers.db"))?;
//! let mut pipeline = IngestionPipeline::initialize_new(provider, store, None).await?;
//!
//! let source = JsonFileProvider::from_file("papers.json").await?;
//! let stats = pipeline.ingest_from_provider(&source).await?;
//! pipeline.finish(&corpus_dir)?;
//! println!("Indexed: {}, Duplicates: {}", stats.indexed, stats.duplicates_skipped);
//! ```

use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

use crate::context::{INDEX_FILE, PMIDS_FILE};
use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::index::{IndexBuilder, IndexFileError};
use crate::models::{CorpusDocument, EmbeddingConfig};
use crate::provider::{DocumentProvider, ProviderError};
use crate::storage::DocumentStore;

/// Errors that can occur during the corpus build.
#[derive(Debug, Error)]
pub enum IngestionError {
    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// Storage operation failed
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Provider operation failed
    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    /// Writing an index artifact failed
    #[error("Index file error: {0}")]
    FileError(#[from] IndexFileError),

    /// Invalid input data
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for ingestion operations.
pub type IngestionResult<T> = Result<T, IngestionError>;

/// Statistics from a corpus build run.
#[derive(Debug, Default, Clone)]
pub struct IngestionStats {
    /// Total number of input documents processed
    pub total_processed: usize,

    /// Number of documents embedded and indexed
    pub indexed: usize,

    /// Number of documents skipped because their PMID was already seen
    pub duplicates_skipped: usize,

    /// Number of documents that failed to process
    pub failed: usize,
}

impl IngestionStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successfully indexed document.
    pub fn record_indexed(&mut self) {
        self.total_processed += 1;
        self.indexed += 1;
    }

    /// Record a duplicate that was skipped.
    pub fn record_duplicate(&mut self) {
        self.total_processed += 1;
        self.duplicates_skipped += 1;
    }

    /// Record a failed processing attempt.
    pub fn record_failed(&mut self) {
        self.total_processed += 1;
        self.failed += 1;
    }
}

/// Corpus build coordinator.
///
/// Owns the embedding provider, the metadata store, and the in-progress index
/// builder. Incremental updates to an existing corpus are not supported; a
/// pipeline always produces a complete, fresh set of artifacts.
pub struct IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: DocumentStore,
{
    /// Embedding provider for document embeddings
    embedding_provider: E,

    /// Metadata store being populated
    store: S,

    /// Index + identifier map under construction, in lockstep
    builder: IndexBuilder,

    /// PMIDs accepted so far, for deduplication
    seen: HashSet<String>,

    /// Number of documents to embed per batch
    batch_size: usize,
}

impl<E, S> IngestionPipeline<E, S>
where
    E: EmbeddingProvider,
    S: DocumentStore,
{
    /// Initialize a fresh corpus build.
    ///
    /// Creates the store schema and records the embedding configuration so
    /// query-time providers can be validated against it.
    ///
    /// # Arguments
    /// * `embedding_provider` - Provider for generating document embeddings
    /// * `store` - Freshly opened metadata store to populate
    /// * `batch_size` - Documents per embedding batch (default: 100)
    ///
    /// # Errors
    /// Returns `IngestionError::InvalidInput` for a zero-dimension provider,
    /// `IngestionError::StorageError` if schema or config setup fails
    pub async fn initialize_new(
        embedding_provider: E,
        mut store: S,
        batch_size: Option<usize>,
    ) -> IngestionResult<Self> {
        if embedding_provider.dimension() == 0 {
            return Err(IngestionError::InvalidInput(
                "Embedding provider reports zero dimension".to_string(),
            ));
        }

        store
            .initialize()
            .await
            .map_err(|e| IngestionError::StorageError(e.to_string()))?;

        let config = EmbeddingConfig {
            model_name: embedding_provider.model_name().to_string(),
            dimension: embedding_provider.dimension(),
        };
        store
            .store_config(&config)
            .await
            .map_err(|e| IngestionError::StorageError(e.to_string()))?;

        let builder = IndexBuilder::new(embedding_provider.dimension());

        Ok(Self {
            embedding_provider,
            store,
            builder,
            seen: HashSet::new(),
            batch_size: batch_size.unwrap_or(100),
        })
    }

    /// Ingest every document a provider offers.
    ///
    /// # Errors
    /// Returns `IngestionError` if the provider or a whole batch fails
    pub async fn ingest_from_provider<P>(&mut self, provider: &P) -> IngestionResult<IngestionStats>
    where
        P: DocumentProvider,
    {
        let documents = provider.fetch_documents().await?;
        self.ingest_batch(&documents).await
    }

    /// Ingest a batch of documents.
    ///
    /// Processes documents in chunks of `batch_size`: deduplicates by PMID,
    /// drops documents with blank abstracts, batch-embeds the rest, and feeds
    /// index builder and metadata store together. A document whose metadata
    /// insert or vector is rejected is counted as failed without aborting the
    /// batch.
    ///
    /// # Errors
    /// Returns `IngestionError::EmbeddingError` if a whole embedding batch
    /// fails; per-document problems are absorbed into the stats
    pub async fn ingest_batch(
        &mut self,
        documents: &[CorpusDocument],
    ) -> IngestionResult<IngestionStats> {
        let mut stats = IngestionStats::new();

        for chunk in documents.chunks(self.batch_size) {
            // First pass: dedupe and drop un-embeddable documents.
            let mut to_process: Vec<&CorpusDocument> = Vec::new();

            for document in chunk {
                if self.seen.contains(&document.pmid) {
                    stats.record_duplicate();
                    continue;
                }
                if normalize_text(&document.abstract_text).is_empty() {
                    warn!("PMID {} has a blank abstract, skipping", document.pmid);
                    stats.record_failed();
                    continue;
                }
                self.seen.insert(document.pmid.clone());
                to_process.push(document);
            }

            if to_process.is_empty() {
                continue;
            }

            // Embed the chunk's normalized abstracts in one call.
            let abstract_texts: Vec<String> = to_process
                .iter()
                .map(|d| normalize_text(&d.abstract_text))
                .collect();
            let abstract_refs: Vec<&str> = abstract_texts.iter().map(|s| s.as_str()).collect();

            let embeddings = self
                .embedding_provider
                .embed_batch(&abstract_refs)
                .await
                .map_err(|e| IngestionError::EmbeddingError(e.to_string()))?;

            // Metadata row first, then the index row. A failed vector leaves
            // an orphan metadata record, which the search path never sees;
            // the reverse order could leave an index row that silently drops
            // at query time.
            for (document, embedding) in to_process.iter().zip(embeddings.into_iter()) {
                if let Err(e) = self.store.insert_document(&document.record()).await {
                    warn!("Failed to store metadata for PMID {}: {}", document.pmid, e);
                    stats.record_failed();
                    continue;
                }

                match self.builder.push(document.pmid.clone(), embedding) {
                    Ok(()) => stats.record_indexed(),
                    Err(e) => {
                        warn!("Rejected embedding for PMID {}: {}", document.pmid, e);
                        stats.record_failed();
                    }
                }
            }
        }

        Ok(stats)
    }

    /// Number of documents indexed so far.
    pub fn indexed_count(&self) -> usize {
        self.builder.len()
    }

    /// Finish the build: write the index snapshot and identifier map into the
    /// corpus directory.
    ///
    /// The metadata database is already on disk (the store wrote it row by
    /// row); this completes the artifact set that `SearchContext::load`
    /// consumes.
    ///
    /// # Errors
    /// Returns `IngestionError::FileError` if an artifact cannot be written
    pub fn finish(self, corpus_dir: &Path) -> IngestionResult<()> {
        let (index, identifiers) = self.builder.build();
        index.save(&corpus_dir.join(INDEX_FILE))?;
        identifiers.save(&corpus_dir.join(PMIDS_FILE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SearchContext;
    use crate::embedding::{EmbeddingError, EmbeddingResult};
    use crate::storage::sqlite::SqliteStore;
    use async_trait::async_trait;

    // Deterministic mock: embeds text into a 3-dim vector derived from its
    // bytes, so distinct abstracts get distinct directions.
    struct MockEmbeddingProvider {
        should_fail: bool,
    }

    impl MockEmbeddingProvider {
        fn new() -> Self {
            Self { should_fail: false }
        }

        fn with_failure() -> Self {
            Self { should_fail: true }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for MockEmbeddingProvider {
        async fn embed(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
            if self.should_fail {
                return Err(EmbeddingError::ApiError("Mock embedding failure".to_string()));
            }
            let bytes = text.as_bytes();
            let sum: u32 = bytes.iter().map(|&b| b as u32).sum();
            Ok(vec![
                bytes.len() as f32,
                (sum % 97) as f32 + 1.0,
                (sum % 13) as f32 + 1.0,
            ])
        }

        async fn embed_batch(&self, texts: &[&str]) -> EmbeddingResult<Vec<Vec<f32>>> {
            let mut results = Vec::new();
            for text in texts {
                results.push(self.embed(text).await?);
            }
            Ok(results)
        }

        fn dimension(&self) -> usize {
            3
        }

        fn model_name(&self) -> &str {
            "mock-model"
        }
    }

    fn document(pmid: &str, abstract_text: &str) -> CorpusDocument {
        CorpusDocument {
            pmid: pmid.to_string(),
            title: format!("Paper {}", pmid),
            year: 2020,
            journal: "BMC Bioinformatics".to_string(),
            abstract_text: abstract_text.to_string(),
        }
    }

    async fn fresh_pipeline() -> IngestionPipeline<MockEmbeddingProvider, SqliteStore> {
        let store = SqliteStore::open_in_memory().unwrap();
        IngestionPipeline::initialize_new(MockEmbeddingProvider::new(), store, Some(2))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_ingest_batch_counts_and_lockstep() {
        let mut pipeline = fresh_pipeline().await;
        let docs = vec![
            document("1", "p53 pathway activation"),
            document("2", "mdm2 feedback loop"),
            document("3", "ubiquitin ligase activity"),
        ];

        let stats = pipeline.ingest_batch(&docs).await.unwrap();
        assert_eq!(stats.total_processed, 3);
        assert_eq!(stats.indexed, 3);
        assert_eq!(stats.failed, 0);
        assert_eq!(pipeline.indexed_count(), 3);
    }

    #[tokio::test]
    async fn test_duplicates_skipped() {
        let mut pipeline = fresh_pipeline().await;
        let docs = vec![
            document("1", "first abstract"),
            document("1", "same pmid again"),
            document("2", "second abstract"),
        ];

        let stats = pipeline.ingest_batch(&docs).await.unwrap();
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.duplicates_skipped, 1);
        assert_eq!(pipeline.indexed_count(), 2);
    }

    #[tokio::test]
    async fn test_blank_abstract_is_failed_not_fatal() {
        let mut pipeline = fresh_pipeline().await;
        let docs = vec![
            document("1", "real abstract"),
            document("2", "   "),
            document("3", "another abstract"),
        ];

        let stats = pipeline.ingest_batch(&docs).await.unwrap();
        assert_eq!(stats.indexed, 2);
        assert_eq!(stats.failed, 1);
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_batch() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut pipeline =
            IngestionPipeline::initialize_new(MockEmbeddingProvider::with_failure(), store, None)
                .await
                .unwrap();

        let result = pipeline.ingest_batch(&[document("1", "abstract")]).await;
        assert!(matches!(result, Err(IngestionError::EmbeddingError(_))));
    }

    #[tokio::test]
    async fn test_full_build_produces_loadable_corpus() {
        let dir = tempfile::tempdir().unwrap();

        let store = SqliteStore::open(dir.path().join(crate::context::METADATA_DB)).unwrap();
        let mut pipeline =
            IngestionPipeline::initialize_new(MockEmbeddingProvider::new(), store, None)
                .await
                .unwrap();

        let docs = vec![
            document("10", "protein interaction networks in cancer"),
            document("20", "kinase inhibitor resistance mechanisms"),
            document("30", "tumor suppressor degradation pathways"),
        ];
        let stats = pipeline.ingest_batch(&docs).await.unwrap();
        assert_eq!(stats.indexed, 3);

        pipeline.finish(dir.path()).unwrap();

        let context = SearchContext::load(dir.path()).await.unwrap();
        assert_eq!(context.len(), 3);
        assert_eq!(context.metadata_count(), 3);
        assert_eq!(context.config().model_name, "mock-model");
        assert_eq!(context.resolve(0).unwrap().pmid, "10");
        assert_eq!(context.resolve(2).unwrap().pmid, "30");
    }
}
