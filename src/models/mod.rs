//! Core data models for the protein-pair paper search system.
//!
//! This module contains the fundamental data structures used across the application:
//! citation metadata records, corpus documents, search results, and the embedding
//! configuration that ties a corpus to the model that produced it.

use serde::{Deserialize, Serialize};

/// Citation metadata for a single paper in the corpus.
///
/// This is the record resolved from the metadata store when an index hit is
/// joined back to human-readable form. It is immutable once loaded; the search
/// path only ever reads it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentRecord {
    /// PubMed identifier (primary key in the metadata store)
    pub pmid: String,

    /// Paper title
    pub title: String,

    /// Year of publication
    pub year: i32,

    /// Journal the paper appeared in
    pub journal: String,
}

/// A corpus document as consumed by the offline build pipeline.
///
/// Carries the citation metadata plus the abstract text that gets embedded.
/// The abstract never reaches the metadata store; only its embedding survives,
/// inside the vector index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusDocument {
    /// PubMed identifier
    pub pmid: String,

    /// Paper title
    pub title: String,

    /// Year of publication
    pub year: i32,

    /// Journal the paper appeared in
    pub journal: String,

    /// Abstract text (embedded during the corpus build)
    pub abstract_text: String,
}

impl CorpusDocument {
    /// Extract the citation record stored in the metadata store.
    pub fn record(&self) -> DocumentRecord {
        DocumentRecord {
            pmid: self.pmid.clone(),
            title: self.title.clone(),
            year: self.year,
            journal: self.journal.clone(),
        }
    }
}

/// Relevance classification for search results.
///
/// Papers are categorized by their semantic similarity to the query,
/// allowing clients to understand the quality of matches.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RelevanceLevel {
    /// Extremely high similarity (cosine similarity > 0.95)
    Identical,

    /// Very high similarity (cosine similarity > 0.85)
    HighlySimilar,

    /// Moderate similarity (cosine similarity > 0.70)
    Similar,

    /// Lower similarity but still relevant
    Relevant,
}

impl RelevanceLevel {
    /// Determine relevance level from a cosine similarity score.
    pub fn from_score(score: f32) -> Self {
        if score > 0.95 {
            RelevanceLevel::Identical
        } else if score > 0.85 {
            RelevanceLevel::HighlySimilar
        } else if score > 0.70 {
            RelevanceLevel::Similar
        } else {
            RelevanceLevel::Relevant
        }
    }
}

/// A single search result joining citation metadata with relevance information.
///
/// Constructed fresh per query, never persisted. Result lists preserve the
/// index's descending score order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// PubMed identifier of the matched paper
    pub pmid: String,

    /// Paper title
    pub title: String,

    /// Year of publication
    pub year: i32,

    /// Journal the paper appeared in
    pub journal: String,

    /// Cosine similarity score (higher is better)
    pub score: f32,

    /// Categorical relevance classification
    pub relevance: RelevanceLevel,
}

impl SearchResult {
    /// Create a new search result from a citation record and similarity score.
    pub fn new(record: &DocumentRecord, score: f32) -> Self {
        Self {
            pmid: record.pmid.clone(),
            title: record.title.clone(),
            year: record.year,
            journal: record.journal.clone(),
            score,
            relevance: RelevanceLevel::from_score(score),
        }
    }
}

/// Configuration of the embedding model a corpus was built with.
///
/// Persisted alongside the corpus so that query-time embedding uses the same
/// model and dimensionality as ingestion-time embedding. A mismatch here means
/// the query vector and the stored vectors live in different spaces, so the
/// load path refuses corpora whose config disagrees with the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingConfig {
    /// Name/identifier of the embedding model
    pub model_name: String,

    /// Dimension of the embedding vectors
    pub dimension: usize,
}
