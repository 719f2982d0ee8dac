//! Protein-pair paper search - semantic retrieval of biomedical literature.
//!
//! This library finds papers relevant to a pair of interacting proteins and a
//! free-text therapeutic query. Queries are enriched with the protein context,
//! embedded into a dense vector, and matched against a precomputed vector
//! index of paper abstracts; hits are joined back to citation metadata.
//!
//! # Architecture
//!
//! The system is organized into several key modules:
//!
//! - **models**: Core data structures (DocumentRecord, SearchResult, etc.)
//! - **embedding**: Text embedding generation and normalization
//! - **index**: Flat inner-product vector index and identifier map
//! - **context**: Startup-loaded, read-only corpus state
//! - **query**: Query composition, search execution, and ranking
//! - **storage**: Citation metadata persistence (SQLite-based)
//! - **provider**: Corpus document sources for the build pipeline
//! - **ingestion**: Offline corpus build pipeline
//!
//! # Workflow
//!
//! ## Offline Build
//!
//! 1. Load corpus documents (citation metadata + abstracts) from a provider
//! 2. Generate embeddings for the abstracts, L2-normalized on insertion
//! 3. Build the vector index and identifier map in lockstep
//! 4. Persist index snapshot, identifier map, and metadata database
//!
//! ## Online Search
//!
//! 1. Compose the enriched query from free text and the protein pair
//! 2. Embed and L2-normalize the query
//! 3. Run exact top-k inner-product search against the index
//! 4. Resolve each hit's row to a PMID and join to citation metadata,
//!    silently dropping rows whose metadata is missing
//! 5. Return ranked results
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ppi_paper_search::{
//!     context::SearchContext,
//!     embedding::fastembed::FastEmbedProvider,
//!     query::{IndexSearchEngine, ProteinPair, SearchEngine, SearchQuery},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let context = Arc::new(SearchContext::load("corpus".as_ref()).await?);
//!     let provider = FastEmbedProvider::with_defaults()?;
//!     let engine = IndexSearchEngine::new(provider, context);
//!
//!     let query = SearchQuery::new(
//!         "cancer treatment resistance".to_string(),
//!         ProteinPair::new("TP53", "MDM2"),
//!         Some(10),
//!     );
//!     let results = engine.search(&query).await?;
//!
//!     for result in results {
//!         println!("{} ({}): {:.3}", result.title, result.pmid, result.score);
//!     }
//!
//!     Ok(())
//! }
//! ```

// Public modules
pub mod context;
pub mod embedding;
pub mod index;
pub mod ingestion;
pub mod models;
pub mod provider;
pub mod query;
pub mod storage;

// Re-export commonly used types at the crate root
pub use context::SearchContext;
pub use embedding::EmbeddingProvider;
pub use index::{IdentifierMap, IndexBuilder, VectorIndex};
pub use models::{DocumentRecord, EmbeddingConfig, RelevanceLevel, SearchResult};
pub use query::{IndexSearchEngine, ProteinPair, SearchEngine, SearchQuery};
pub use storage::DocumentStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of search results
pub const DEFAULT_TOP_K: usize = query::DEFAULT_TOP_K;
