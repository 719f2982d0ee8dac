//! Startup-loaded search context.
//!
//! A [`SearchContext`] bundles everything the query path reads: the vector
//! index, the identifier map, the in-memory metadata table, and the embedding
//! configuration the corpus was built with. It is constructed once at startup,
//! validated, and then passed by shared reference to every query. No query
//! ever mutates it, so arbitrarily many searches may run concurrently against
//! one context without locking.
//!
//! Load-time validation is strict: an identifier map whose length disagrees
//! with the index, a non-inner-product metric, or an embedding config whose
//! dimension disagrees with the index are all corruption conditions that abort
//! startup. A PMID present in the index but absent from the metadata store is
//! the one tolerated inconsistency (index and metadata snapshots may have
//! been built at slightly different times) and is handled per-hit at query
//! time, not here.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::index::{IdentifierMap, IndexFileError, VectorIndex};
use crate::models::{DocumentRecord, EmbeddingConfig};
use crate::storage::sqlite::SqliteStore;
use crate::storage::{DocumentStore, StorageError};

/// File name of the vector index snapshot inside a corpus directory.
pub const INDEX_FILE: &str = "index.bin";

/// File name of the identifier map inside a corpus directory.
pub const PMIDS_FILE: &str = "pmids.json";

/// File name of the metadata database inside a corpus directory.
pub const METADATA_DB: &str = "papers.db";

/// Errors raised while loading or validating a search context.
///
/// All of these are fatal startup conditions; none can occur at query time.
#[derive(Debug, Error)]
pub enum ContextError {
    /// A corpus artifact file is missing entirely
    #[error("Missing corpus artifact: {0}")]
    MissingArtifact(PathBuf),

    /// The index or identifier-map file could not be read or decoded
    #[error("Index file error: {0}")]
    Index(#[from] IndexFileError),

    /// The metadata database could not be read
    #[error("Metadata store error: {0}")]
    Storage(#[from] StorageError),

    /// The metadata store has no embedding configuration
    #[error("Corpus has no embedding configuration")]
    MissingConfig,

    /// Identifier map and index row counts disagree
    #[error("Identifier map holds {identifiers} entries but the index holds {vectors} vectors")]
    SizeMismatch { identifiers: usize, vectors: usize },

    /// Stored embedding config disagrees with the index dimensionality
    #[error("Embedding config dimension {config} does not match index dimension {index}")]
    DimensionSkew { config: usize, index: usize },
}

/// Immutable, validated bundle of corpus state for the query path.
pub struct SearchContext {
    index: VectorIndex,
    identifiers: IdentifierMap,
    metadata: HashMap<String, DocumentRecord>,
    config: EmbeddingConfig,
}

impl SearchContext {
    /// Assemble a context from already-loaded parts, enforcing the
    /// cross-artifact invariants.
    ///
    /// # Errors
    /// `ContextError::SizeMismatch` when the identifier map and index lengths
    /// differ; `ContextError::DimensionSkew` when the embedding config
    /// disagrees with the index dimensionality.
    pub fn new(
        index: VectorIndex,
        identifiers: IdentifierMap,
        metadata: HashMap<String, DocumentRecord>,
        config: EmbeddingConfig,
    ) -> Result<Self, ContextError> {
        if identifiers.len() != index.len() {
            return Err(ContextError::SizeMismatch {
                identifiers: identifiers.len(),
                vectors: index.len(),
            });
        }
        if config.dimension != index.dimension() {
            return Err(ContextError::DimensionSkew {
                config: config.dimension,
                index: index.dimension(),
            });
        }

        Ok(Self {
            index,
            identifiers,
            metadata,
            config,
        })
    }

    /// Load and validate a context from a corpus directory.
    ///
    /// Reads `index.bin`, `pmids.json`, and `papers.db`, builds the in-memory
    /// metadata table, and verifies every cross-artifact invariant. The
    /// database handle is released before this function returns, on success
    /// and on every failure path alike.
    ///
    /// # Errors
    /// Any `ContextError` variant; all abort startup.
    pub async fn load(corpus_dir: &Path) -> Result<Self, ContextError> {
        let index_path = corpus_dir.join(INDEX_FILE);
        let pmids_path = corpus_dir.join(PMIDS_FILE);
        let db_path = corpus_dir.join(METADATA_DB);

        for path in [&index_path, &pmids_path, &db_path] {
            if !path.exists() {
                return Err(ContextError::MissingArtifact(path.clone()));
            }
        }

        let index = VectorIndex::load(&index_path)?;
        let identifiers = IdentifierMap::load(&pmids_path)?;

        let store = SqliteStore::open(&db_path)?;
        let config = store.get_config().await?.ok_or(ContextError::MissingConfig)?;
        let records = store.load_all().await?;
        drop(store);

        let metadata: HashMap<String, DocumentRecord> = records
            .into_iter()
            .map(|record| (record.pmid.clone(), record))
            .collect();

        let context = Self::new(index, identifiers, metadata, config)?;
        info!(
            "Loaded corpus: {} vectors (dim {}), {} metadata records, model {}",
            context.index.len(),
            context.index.dimension(),
            context.metadata.len(),
            context.config.model_name
        );

        Ok(context)
    }

    /// Resolve an index row position to its citation record.
    ///
    /// Returns `None` when the position is out of range or when the PMID at
    /// that position has no metadata entry, the expected, recoverable
    /// snapshot-divergence case that callers skip per-hit.
    pub fn resolve(&self, position: usize) -> Option<&DocumentRecord> {
        let pmid = self.identifiers.get(position)?;
        let record = self.metadata.get(pmid);
        if record.is_none() {
            debug!("PMID {} at row {} has no metadata entry", pmid, position);
        }
        record
    }

    /// The vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// The identifier map.
    pub fn identifiers(&self) -> &IdentifierMap {
        &self.identifiers
    }

    /// The embedding configuration the corpus was built with.
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    /// Number of indexed vectors.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Number of metadata records (may differ from `len()` across snapshots).
    pub fn metadata_count(&self) -> usize {
        self.metadata.len()
    }
}

impl std::fmt::Debug for SearchContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchContext")
            .field("vectors", &self.index.len())
            .field("dimension", &self.index.dimension())
            .field("metadata_records", &self.metadata.len())
            .field("model", &self.config.model_name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexBuilder;

    fn config(dimension: usize) -> EmbeddingConfig {
        EmbeddingConfig {
            model_name: "test-model".to_string(),
            dimension,
        }
    }

    fn record(pmid: &str) -> DocumentRecord {
        DocumentRecord {
            pmid: pmid.to_string(),
            title: format!("Paper {}", pmid),
            year: 2022,
            journal: "PLoS ONE".to_string(),
        }
    }

    fn build_parts(pmids: &[&str]) -> (VectorIndex, IdentifierMap) {
        let mut builder = IndexBuilder::new(2);
        for (i, pmid) in pmids.iter().enumerate() {
            let angle = i as f32;
            builder.push(*pmid, vec![angle.cos(), angle.sin()]).unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_new_rejects_size_mismatch() {
        let (index, _) = build_parts(&["1", "2", "3"]);
        let short_map = IdentifierMap::new(vec!["1".to_string(), "2".to_string()]);

        let result = SearchContext::new(index, short_map, HashMap::new(), config(2));
        assert!(matches!(
            result,
            Err(ContextError::SizeMismatch {
                identifiers: 2,
                vectors: 3
            })
        ));
    }

    #[test]
    fn test_new_rejects_dimension_skew() {
        let (index, identifiers) = build_parts(&["1"]);
        let result = SearchContext::new(index, identifiers, HashMap::new(), config(384));
        assert!(matches!(
            result,
            Err(ContextError::DimensionSkew {
                config: 384,
                index: 2
            })
        ));
    }

    #[test]
    fn test_resolve_hit_and_miss() {
        let (index, identifiers) = build_parts(&["a", "b"]);
        let mut metadata = HashMap::new();
        metadata.insert("a".to_string(), record("a"));
        // "b" is indexed but has no metadata entry.

        let context = SearchContext::new(index, identifiers, metadata, config(2)).unwrap();
        assert_eq!(context.resolve(0).unwrap().pmid, "a");
        assert!(context.resolve(1).is_none());
        assert!(context.resolve(99).is_none());
    }

    #[tokio::test]
    async fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();

        let (index, identifiers) = build_parts(&["10", "20"]);
        index.save(&dir.path().join(INDEX_FILE)).unwrap();
        identifiers.save(&dir.path().join(PMIDS_FILE)).unwrap();

        let mut store = SqliteStore::open(dir.path().join(METADATA_DB)).unwrap();
        store.initialize().await.unwrap();
        store.store_config(&config(2)).await.unwrap();
        store.insert_document(&record("10")).await.unwrap();
        store.insert_document(&record("20")).await.unwrap();
        drop(store);

        let context = SearchContext::load(dir.path()).await.unwrap();
        assert_eq!(context.len(), 2);
        assert_eq!(context.metadata_count(), 2);
        assert_eq!(context.config().dimension, 2);
        assert_eq!(context.resolve(1).unwrap().pmid, "20");
    }

    #[tokio::test]
    async fn test_load_missing_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let result = SearchContext::load(dir.path()).await;
        assert!(matches!(result, Err(ContextError::MissingArtifact(_))));
    }

    #[tokio::test]
    async fn test_load_rejects_size_mismatch_at_startup() {
        let dir = tempfile::tempdir().unwrap();

        let (index, _) = build_parts(&["10", "20"]);
        index.save(&dir.path().join(INDEX_FILE)).unwrap();

        // Identifier map from a different (shorter) snapshot.
        IdentifierMap::new(vec!["10".to_string()])
            .save(&dir.path().join(PMIDS_FILE))
            .unwrap();

        let mut store = SqliteStore::open(dir.path().join(METADATA_DB)).unwrap();
        store.initialize().await.unwrap();
        store.store_config(&config(2)).await.unwrap();
        drop(store);

        let result = SearchContext::load(dir.path()).await;
        assert!(matches!(result, Err(ContextError::SizeMismatch { .. })));
    }

    #[tokio::test]
    async fn test_load_rejects_missing_config() {
        let dir = tempfile::tempdir().unwrap();

        let (index, identifiers) = build_parts(&["10"]);
        index.save(&dir.path().join(INDEX_FILE)).unwrap();
        identifiers.save(&dir.path().join(PMIDS_FILE)).unwrap();

        let mut store = SqliteStore::open(dir.path().join(METADATA_DB)).unwrap();
        store.initialize().await.unwrap();
        drop(store);

        let result = SearchContext::load(dir.path()).await;
        assert!(matches!(result, Err(ContextError::MissingConfig)));
    }
}
