//! Corpus document provider module.
//!
//! This module defines the interface for sourcing corpus documents for the
//! offline build pipeline, and includes implementations for different data
//! sources.
//!
//! The `DocumentProvider` trait abstracts where documents come from (JSON
//! exports, PubMed dumps, etc.) so the build pipeline never couples to a
//! specific format.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::CorpusDocument;

pub mod json;

/// Errors that can occur when fetching documents from a provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Failed to read from the data source
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse the data format
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Other provider-specific errors
    #[error("Provider error: {0}")]
    Other(String),
}

/// Result type for provider operations.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Trait for sourcing corpus documents.
///
/// Providers return documents with abstract text but without embeddings;
/// embedding happens in the build pipeline. Deduplication is also the
/// pipeline's job, not the provider's.
#[async_trait]
pub trait DocumentProvider: Send + Sync {
    /// Fetch all available documents from this provider.
    ///
    /// # Errors
    /// Returns `ProviderError` if documents cannot be fetched or parsed
    async fn fetch_documents(&self) -> ProviderResult<Vec<CorpusDocument>>;

    /// Get the total count of documents available from this provider.
    ///
    /// The default fetches everything and counts; providers with a cheaper
    /// way should override.
    ///
    /// # Errors
    /// Returns `ProviderError` if the count cannot be determined
    async fn count_documents(&self) -> ProviderResult<usize> {
        self.fetch_documents().await.map(|docs| docs.len())
    }

    /// Human-readable name of this provider, for logging.
    fn name(&self) -> &str;
}
