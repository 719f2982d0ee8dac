//! Query composition and search orchestration.
//!
//! This module turns a free-text therapeutic query plus a protein pair into a
//! ranked result list. The pipeline is: compose the enriched query string,
//! embed it, L2-normalize the vector, run top-k against the index, then join
//! each hit back to citation metadata, dropping hits whose PMID has no
//! metadata entry rather than failing the query.
//!
//! Entity context is folded directly into the text fed to the embedding
//! function. The model has no native mechanism for structured context, so
//! textual concatenation is the only way to bias the resulting vector toward
//! the protein pair.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::context::SearchContext;
use crate::embedding::{normalize_text, EmbeddingProvider};
use crate::index::{l2_normalize, IndexError};
use crate::models::SearchResult;

/// Default number of results returned when the caller does not specify one.
pub const DEFAULT_TOP_K: usize = 10;

/// Errors that can occur during query processing.
///
/// Every variant fails the whole query; per-hit metadata misses never surface
/// here. Variants are distinct per stage so callers can tell what broke.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A protein name was empty or blank
    #[error("Invalid protein name: {0}")]
    InvalidEntity(String),

    /// Embedding generation failed
    #[error("Embedding error: {0}")]
    EmbeddingError(String),

    /// The index rejected the query (empty index, dimension mismatch)
    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    /// The embedding call exceeded the caller-specified timeout
    #[error("Embedding timed out after {0:?}")]
    Cancelled(Duration),
}

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// An ordered pair of protein names providing entity context for the query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProteinPair {
    /// First protein name
    pub first: String,

    /// Second protein name
    pub second: String,
}

impl ProteinPair {
    /// Create a protein pair. Validation happens at composition time.
    pub fn new(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            first: first.into(),
            second: second.into(),
        }
    }
}

/// Build the enriched query string from free-text intent and protein context.
///
/// Deterministic pure function with a fixed template:
/// `"Impact of <protein1> and <protein2> interaction on <query>"`.
///
/// # Errors
/// `QueryError::InvalidEntity` if either protein name is empty or
/// whitespace-only
pub fn compose_enriched_query(query: &str, proteins: &ProteinPair) -> QueryResult<String> {
    for name in [&proteins.first, &proteins.second] {
        if name.trim().is_empty() {
            return Err(QueryError::InvalidEntity(
                "Protein names must be non-empty".to_string(),
            ));
        }
    }

    Ok(format!(
        "Impact of {} and {} interaction on {}",
        proteins.first, proteins.second, query
    ))
}

/// Search query parameters.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Free-text therapeutic query
    pub query: String,

    /// Protein pair providing entity context
    pub proteins: ProteinPair,

    /// Maximum number of results to return
    pub top_k: usize,

    /// Optional deadline for the embedding call; expiry cancels the query
    pub embed_timeout: Option<Duration>,
}

impl SearchQuery {
    /// Create a new search query.
    ///
    /// # Arguments
    /// * `query` - The free-text query
    /// * `proteins` - The protein pair
    /// * `top_k` - Maximum number of results (default: 10)
    pub fn new(query: String, proteins: ProteinPair, top_k: Option<usize>) -> Self {
        Self {
            query,
            proteins,
            top_k: top_k.unwrap_or(DEFAULT_TOP_K),
            embed_timeout: None,
        }
    }

    /// Set a deadline for the embedding call.
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = Some(timeout);
        self
    }
}

/// Trait for search engines.
///
/// Implementations coordinate an embedding provider and a loaded search
/// context to produce ranked results.
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Execute a search query and return ranked results.
    ///
    /// Results come back in descending similarity order. The list may be
    /// shorter than `top_k` when the index holds fewer vectors or when hits
    /// are dropped for missing metadata.
    ///
    /// # Errors
    /// Returns `QueryError` if the query fails as a whole
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<SearchResult>>;
}

/// Search engine over a loaded corpus context.
///
/// Holds the context behind `Arc` so many engines (or many concurrent calls
/// into one engine) can share a single loaded corpus. Nothing in the search
/// path mutates shared state.
pub struct IndexSearchEngine<E>
where
    E: EmbeddingProvider,
{
    /// Embedding provider for query embedding
    embedding_provider: E,

    /// Loaded read-only corpus state
    context: Arc<SearchContext>,
}

impl<E> IndexSearchEngine<E>
where
    E: EmbeddingProvider,
{
    /// Create a new search engine.
    pub fn new(embedding_provider: E, context: Arc<SearchContext>) -> Self {
        Self {
            embedding_provider,
            context,
        }
    }

    /// The corpus context this engine searches.
    pub fn context(&self) -> &SearchContext {
        &self.context
    }
}

#[async_trait]
impl<E> SearchEngine for IndexSearchEngine<E>
where
    E: EmbeddingProvider,
{
    async fn search(&self, query: &SearchQuery) -> QueryResult<Vec<SearchResult>> {
        // 1. Compose the enriched query text
        let enriched = compose_enriched_query(&query.query, &query.proteins)?;
        let normalized = normalize_text(&enriched);

        // 2. Embed, honoring the caller's deadline if one was set
        let embedded = match query.embed_timeout {
            Some(limit) => tokio::time::timeout(limit, self.embedding_provider.embed(&normalized))
                .await
                .map_err(|_| QueryError::Cancelled(limit))?,
            None => self.embedding_provider.embed(&normalized).await,
        };
        let mut vector = embedded.map_err(|e| QueryError::EmbeddingError(e.to_string()))?;

        // 3. Normalize so inner-product scores are cosine similarities
        l2_normalize(&mut vector);

        // 4. Top-k against the index
        let hits = self.context.index().search(&vector, query.top_k)?;

        // 5. Join hits to metadata, dropping unresolvable rows.
        //    The result may be shorter than top_k; no padding.
        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.context.resolve(hit.position) {
                Some(record) => results.push(SearchResult::new(record, hit.score)),
                None => debug!("Dropping hit at row {}: no metadata entry", hit.position),
            }
        }

        Ok(results)
    }
}
