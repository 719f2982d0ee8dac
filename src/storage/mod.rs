//! Metadata storage abstraction and implementations.
//!
//! This module defines the interface for persisting and retrieving citation
//! metadata. The store is a pure lookup table keyed by PMID: embeddings never
//! live here (they live in the index snapshot), and nothing in the search path
//! writes to it.

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DocumentRecord, EmbeddingConfig};

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Database connection error
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution error
    #[error("Query execution failed: {0}")]
    QueryError(String),

    /// Data serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Schema or migration error
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Duplicate entry (same PMID already stored)
    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Other unexpected errors
    #[error("Unexpected storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for citation metadata storage backends.
///
/// Implementations persist `DocumentRecord`s keyed by PMID plus the embedding
/// configuration the corpus was built with. The search path loads everything
/// once at startup and never goes back to the store, so per-record reads only
/// matter for tooling and tests.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Initialize the storage (create tables, indexes, etc.).
    ///
    /// Idempotent and safe to call multiple times.
    ///
    /// # Errors
    /// Returns `StorageError` if initialization fails
    async fn initialize(&mut self) -> StorageResult<()>;

    /// Store the embedding configuration.
    ///
    /// Persisted so that query-time embedding can be validated against
    /// ingestion-time embedding.
    ///
    /// # Errors
    /// Returns `StorageError` if storage fails
    async fn store_config(&mut self, config: &EmbeddingConfig) -> StorageResult<()>;

    /// Retrieve the embedding configuration, or None if never stored.
    ///
    /// # Errors
    /// Returns `StorageError` if retrieval fails
    async fn get_config(&self) -> StorageResult<Option<EmbeddingConfig>>;

    /// Insert a new citation record.
    ///
    /// # Errors
    /// Returns `StorageError::DuplicateEntry` if a record with the same PMID
    /// already exists, or other `StorageError` variants for other failures
    async fn insert_document(&mut self, record: &DocumentRecord) -> StorageResult<()>;

    /// Get a citation record by PMID.
    ///
    /// # Errors
    /// Returns `StorageError::NotFound` if the PMID is not stored
    async fn get_document(&self, pmid: &str) -> StorageResult<DocumentRecord>;

    /// Retrieve every citation record.
    ///
    /// Used once at startup to build the in-memory metadata map.
    ///
    /// # Errors
    /// Returns `StorageError` if retrieval fails
    async fn load_all(&self) -> StorageResult<Vec<DocumentRecord>>;

    /// Get the total count of stored records.
    ///
    /// # Errors
    /// Returns `StorageError` if the count fails
    async fn count_documents(&self) -> StorageResult<usize>;
}
