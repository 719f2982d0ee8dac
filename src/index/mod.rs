//! Flat inner-product vector index.
//!
//! This module is the heart of the search system: it owns the document
//! embeddings, answers exact top-k queries under cosine similarity, and keeps
//! the identifier map that ties index rows back to PMIDs.
//!
//! Cosine similarity is implemented as a plain inner product, which is only
//! valid when every stored vector and every query vector is L2-normalized.
//! The builder normalizes on insertion; the query path normalizes before
//! searching; the index itself never re-normalizes. Index rows and identifier
//! entries are produced in lockstep by [`IndexBuilder`], so row `i` always
//! corresponds to identifier `i`.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by index queries and construction.
#[derive(Debug, Error)]
pub enum IndexError {
    /// The index holds no vectors; a query cannot rank anything
    #[error("Index is empty")]
    EmptyIndex,

    /// Query or inserted vector length does not match the index dimensionality
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Inserted vector cannot be normalized (zero or non-finite components)
    #[error("Invalid vector: {0}")]
    InvalidVector(String),
}

/// Result type for index operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Errors raised when reading or writing persisted index artifacts.
///
/// These are fatal startup conditions: a corpus whose files cannot be decoded
/// or whose invariants do not hold must not serve queries.
#[derive(Debug, Error)]
pub enum IndexFileError {
    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization failed
    #[error("Encode error: {0}")]
    Encode(String),

    /// Deserialization failed
    #[error("Decode error: {0}")]
    Decode(String),

    /// File decoded but its contents violate an index invariant
    #[error("Corrupt index file: {0}")]
    Corrupt(String),

    /// Persisted metric is not inner-product
    #[error("Unsupported metric: {0}")]
    MetricMismatch(String),
}

/// Similarity metric identifier persisted with the index.
///
/// Only inner product is supported; the variant exists in the file format so
/// a corpus built for a different metric is rejected at load rather than
/// silently mis-ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Metric {
    /// Inner product over L2-normalized vectors (equivalent to cosine)
    InnerProduct,
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Metric::InnerProduct => write!(f, "inner_product"),
        }
    }
}

/// L2-normalize a vector in place.
///
/// Idempotent: normalizing an already-normalized vector leaves it unchanged.
/// Zero vectors are left untouched (there is no direction to normalize to);
/// the builder rejects them before they can reach the index.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// A single index match: a row position and its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexHit {
    /// 0-indexed row in the vector store, join key into the identifier map
    pub position: usize,

    /// Inner-product similarity (cosine, given normalized vectors)
    pub score: f32,
}

/// Ordered sequence of PMIDs aligned with index rows.
///
/// Position `i` is the sole join key between index row `i` and the metadata
/// store. Immutable after construction; never touched at query time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentifierMap(Vec<String>);

impl IdentifierMap {
    /// Wrap an ordered PMID sequence.
    pub fn new(pmids: Vec<String>) -> Self {
        Self(pmids)
    }

    /// The identifier at the given index row, if in range.
    pub fn get(&self, position: usize) -> Option<&str> {
        self.0.get(position).map(String::as_str)
    }

    /// Number of identifiers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the map holds no identifiers.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over identifiers in index-row order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Write the map as a JSON array.
    pub fn save(&self, path: &Path) -> Result<(), IndexFileError> {
        let file = File::create(path)?;
        serde_json::to_writer(BufWriter::new(file), &self.0)
            .map_err(|e| IndexFileError::Encode(e.to_string()))
    }

    /// Read a map previously written by [`IdentifierMap::save`].
    pub fn load(path: &Path) -> Result<Self, IndexFileError> {
        let file = File::open(path)?;
        let pmids: Vec<String> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| IndexFileError::Decode(e.to_string()))?;
        Ok(Self(pmids))
    }
}

/// Flat store of N D-dimensional normalized vectors with exact top-k search.
///
/// Vectors are laid out row-major in one contiguous buffer. Search scans every
/// row; for corpus sizes in the tens of thousands this comfortably beats the
/// overhead of an approximate structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    metric: Metric,
    dimension: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// Dimensionality D of stored and query vectors.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The similarity metric this index was built for.
    pub fn metric(&self) -> Metric {
        self.metric
    }

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Return the `min(k, N)` most similar rows to the query vector.
    ///
    /// The query must already be L2-normalized; the index does not
    /// re-normalize. Hits come back in descending score order, ties broken by
    /// ascending position so repeated queries on an unchanged index always
    /// rank identically.
    ///
    /// # Errors
    /// `IndexError::EmptyIndex` when no vectors are stored;
    /// `IndexError::DimensionMismatch` when the query length is not D.
    pub fn search(&self, query: &[f32], k: usize) -> IndexResult<Vec<IndexHit>> {
        if self.is_empty() {
            return Err(IndexError::EmptyIndex);
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut hits: Vec<IndexHit> = (0..self.len())
            .map(|position| IndexHit {
                position,
                score: dot(self.row(position), query),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.position.cmp(&b.position))
        });

        hits.truncate(k);
        Ok(hits)
    }

    /// Write the index as a bincode snapshot.
    pub fn save(&self, path: &Path) -> Result<(), IndexFileError> {
        let file = File::create(path)?;
        bincode::serialize_into(BufWriter::new(file), self)
            .map_err(|e| IndexFileError::Encode(e.to_string()))
    }

    /// Read an index previously written by [`VectorIndex::save`].
    ///
    /// Validates the structural invariants the search path relies on: the
    /// metric must be inner-product and the data length must be an exact
    /// multiple of the dimension.
    pub fn load(path: &Path) -> Result<Self, IndexFileError> {
        let file = File::open(path)?;
        let index: VectorIndex = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| IndexFileError::Decode(e.to_string()))?;

        if index.metric != Metric::InnerProduct {
            return Err(IndexFileError::MetricMismatch(index.metric.to_string()));
        }
        if index.dimension == 0 && !index.data.is_empty() {
            return Err(IndexFileError::Corrupt(
                "Zero dimension with non-empty data".to_string(),
            ));
        }
        if index.dimension > 0 && index.data.len() % index.dimension != 0 {
            return Err(IndexFileError::Corrupt(format!(
                "Data length {} is not a multiple of dimension {}",
                index.data.len(),
                index.dimension
            )));
        }

        Ok(index)
    }
}

/// Lockstep builder for a vector index and its identifier map.
///
/// Every accepted vector is L2-normalized before storage, and identifier `i`
/// is recorded in the same call that stores row `i`, so the two sequences
/// cannot drift apart during construction.
#[derive(Debug)]
pub struct IndexBuilder {
    dimension: usize,
    data: Vec<f32>,
    pmids: Vec<String>,
}

impl IndexBuilder {
    /// Start a builder for vectors of the given dimensionality.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
            pmids: Vec::new(),
        }
    }

    /// Number of rows accepted so far.
    pub fn len(&self) -> usize {
        self.pmids.len()
    }

    /// Whether no rows have been accepted yet.
    pub fn is_empty(&self) -> bool {
        self.pmids.is_empty()
    }

    /// Append one (identifier, embedding) pair.
    ///
    /// The vector is normalized here, so inner-product search over the
    /// finished index is cosine similarity regardless of what scale the
    /// embedding model emitted.
    ///
    /// # Errors
    /// `IndexError::DimensionMismatch` for wrong-length vectors;
    /// `IndexError::InvalidVector` for non-finite or zero vectors, which a
    /// broken embedding batch can produce and which would poison the ranking.
    pub fn push(&mut self, pmid: impl Into<String>, mut vector: Vec<f32>) -> IndexResult<()> {
        if vector.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if !vector.iter().all(|v| v.is_finite()) {
            return Err(IndexError::InvalidVector(
                "Vector contains non-finite components".to_string(),
            ));
        }
        if vector.iter().all(|&v| v == 0.0) {
            return Err(IndexError::InvalidVector(
                "Vector has zero magnitude".to_string(),
            ));
        }

        l2_normalize(&mut vector);
        self.data.extend_from_slice(&vector);
        self.pmids.push(pmid.into());
        Ok(())
    }

    /// Finish construction, yielding the index and identifier map together.
    pub fn build(self) -> (VectorIndex, IdentifierMap) {
        (
            VectorIndex {
                metric: Metric::InnerProduct,
                dimension: self.dimension,
                data: self.data,
            },
            IdentifierMap::new(self.pmids),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_index(vectors: Vec<Vec<f32>>) -> (VectorIndex, IdentifierMap) {
        let dimension = vectors[0].len();
        let mut builder = IndexBuilder::new(dimension);
        for (i, vector) in vectors.into_iter().enumerate() {
            builder.push(format!("pmid-{}", i), vector).unwrap();
        }
        builder.build()
    }

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
        let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
        dot / (norm_a * norm_b)
    }

    #[test]
    fn test_l2_normalize_unit_length() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_idempotent() {
        let mut once = vec![1.5, -2.5, 0.5];
        l2_normalize(&mut once);
        let mut twice = once.clone();
        l2_normalize(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_l2_normalize_zero_vector_unchanged() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_search_returns_min_k_n_sorted() {
        let (index, _) = build_index(vec![
            vec![1.0, 0.0, 0.0],
            vec![0.9, 0.1, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
            vec![0.5, 0.5, 0.0],
        ]);

        let mut query = vec![1.0, 0.0, 0.0];
        l2_normalize(&mut query);

        let hits = index.search(&query, 3).unwrap();
        assert_eq!(hits.len(), 3);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }

        // K beyond N returns all rows, no padding.
        let hits = index.search(&query, 100).unwrap();
        assert_eq!(hits.len(), 5);
    }

    #[test]
    fn test_search_empty_index_fails() {
        let builder = IndexBuilder::new(3);
        let (index, map) = builder.build();
        assert_eq!(index.len(), 0);
        assert_eq!(map.len(), 0);

        let result = index.search(&[1.0, 0.0, 0.0], 5);
        assert!(matches!(result, Err(IndexError::EmptyIndex)));
    }

    #[test]
    fn test_search_dimension_mismatch_fails() {
        let (index, _) = build_index(vec![vec![1.0, 0.0, 0.0]]);
        let result = index.search(&[1.0, 0.0], 1);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn test_tie_break_by_ascending_position() {
        // Two identical rows tie exactly; the earlier row must rank first.
        let (index, _) = build_index(vec![
            vec![0.0, 1.0],
            vec![1.0, 0.0],
            vec![1.0, 0.0],
        ]);

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].position, 1);
        assert_eq!(hits[1].position, 2);
        assert_eq!(hits[2].position, 0);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[test]
    fn test_search_is_deterministic() {
        let (index, _) = build_index(vec![
            vec![0.2, 0.8, 0.1],
            vec![0.7, 0.2, 0.3],
            vec![0.7, 0.2, 0.3],
            vec![0.1, 0.1, 0.9],
        ]);

        let mut query = vec![0.6, 0.3, 0.2];
        l2_normalize(&mut query);

        let first = index.search(&query, 4).unwrap();
        for _ in 0..10 {
            let again = index.search(&query, 4).unwrap();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn test_inner_product_matches_cosine_oracle() {
        // Raw (unnormalized) vectors; the builder normalizes, so the index
        // score must equal the cosine similarity of the raw vectors.
        let raw = vec![
            vec![2.0, 1.0, 0.5],
            vec![0.1, 3.0, 0.2],
            vec![1.0, 1.0, 1.0],
            vec![0.5, 0.0, 2.5],
        ];
        let (index, _) = build_index(raw.clone());

        let raw_query = vec![1.5, 0.5, 1.0];
        let mut query = raw_query.clone();
        l2_normalize(&mut query);

        let hits = index.search(&query, raw.len()).unwrap();
        for hit in &hits {
            let expected = cosine(&raw[hit.position], &raw_query);
            assert!(
                (hit.score - expected).abs() < 1e-5,
                "row {}: index score {} != cosine {}",
                hit.position,
                hit.score,
                expected
            );
        }

        // The top hit must be the row the exhaustive oracle ranks highest.
        let best_by_oracle = (0..raw.len())
            .max_by(|&a, &b| {
                cosine(&raw[a], &raw_query)
                    .partial_cmp(&cosine(&raw[b], &raw_query))
                    .unwrap()
            })
            .unwrap();
        assert_eq!(hits[0].position, best_by_oracle);
    }

    #[test]
    fn test_builder_lockstep() {
        let (index, map) = build_index(vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(index.len(), map.len());
        assert_eq!(map.get(0), Some("pmid-0"));
        assert_eq!(map.get(1), Some("pmid-1"));
        assert_eq!(map.get(2), None);
    }

    #[test]
    fn test_builder_rejects_wrong_dimension() {
        let mut builder = IndexBuilder::new(3);
        let result = builder.push("p", vec![1.0, 0.0]);
        assert!(matches!(
            result,
            Err(IndexError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert!(builder.is_empty());
    }

    #[test]
    fn test_builder_rejects_bad_vectors() {
        let mut builder = IndexBuilder::new(2);
        assert!(matches!(
            builder.push("nan", vec![f32::NAN, 1.0]),
            Err(IndexError::InvalidVector(_))
        ));
        assert!(matches!(
            builder.push("zero", vec![0.0, 0.0]),
            Err(IndexError::InvalidVector(_))
        ));
        assert_eq!(builder.len(), 0);
    }

    #[test]
    fn test_builder_normalizes_on_insert() {
        let mut builder = IndexBuilder::new(2);
        builder.push("p", vec![10.0, 0.0]).unwrap();
        let (index, _) = builder.build();

        // Stored row is unit-length, so the self-similarity score is 1.0.
        let hits = index.search(&[1.0, 0.0], 1).unwrap();
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_index_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let index_path = dir.path().join("index.bin");
        let pmids_path = dir.path().join("pmids.json");

        let (index, map) = build_index(vec![vec![1.0, 2.0, 3.0], vec![3.0, 2.0, 1.0]]);
        index.save(&index_path).unwrap();
        map.save(&pmids_path).unwrap();

        let loaded = VectorIndex::load(&index_path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.dimension(), 3);
        assert_eq!(loaded.metric(), Metric::InnerProduct);

        let loaded_map = IdentifierMap::load(&pmids_path).unwrap();
        assert_eq!(loaded_map, map);

        // Loaded index ranks identically to the original.
        let mut query = vec![1.0, 2.0, 3.0];
        l2_normalize(&mut query);
        assert_eq!(
            index.search(&query, 2).unwrap(),
            loaded.search(&query, 2).unwrap()
        );
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.bin");
        std::fs::write(&path, b"not an index").unwrap();
        assert!(matches!(
            VectorIndex::load(&path),
            Err(IndexFileError::Decode(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        assert!(matches!(
            VectorIndex::load(&path),
            Err(IndexFileError::Io(_))
        ));
    }
}
