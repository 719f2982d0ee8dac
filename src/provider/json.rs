//! JSON file document provider.
//!
//! Reads a corpus from a JSON file containing an array of documents:
//!
//! ```json
//! [
//!   {
//!     "pmid": "31345061",
//!     "title": "...",
//!     "year": 2019,
//!     "journal": "...",
//!     "abstract_text": "..."
//!   }
//! ]
//! ```

use super::{DocumentProvider, ProviderError, ProviderResult};
use crate::models::CorpusDocument;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Provider backed by a JSON file holding an array of corpus documents.
///
/// The file is parsed eagerly at construction so malformed input fails the
/// build before any embedding work starts.
#[derive(Debug)]
pub struct JsonFileProvider {
    /// Source file, kept for the provider name
    path: PathBuf,

    /// Parsed documents
    documents: Vec<CorpusDocument>,

    /// Display name derived from the path
    name: String,
}

impl JsonFileProvider {
    /// Load a provider from a JSON file.
    ///
    /// # Errors
    /// `ProviderError::IoError` if the file cannot be read;
    /// `ProviderError::ParseError` if it is not a JSON array of documents
    pub async fn from_file(path: impl AsRef<Path>) -> ProviderResult<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = tokio::fs::read_to_string(&path).await?;

        let documents: Vec<CorpusDocument> = serde_json::from_str(&contents)
            .map_err(|e| ProviderError::ParseError(format!("{}: {}", path.display(), e)))?;

        let name = format!("json:{}", path.display());

        Ok(Self {
            path,
            documents,
            name,
        })
    }

    /// Source file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DocumentProvider for JsonFileProvider {
    async fn fetch_documents(&self) -> ProviderResult<Vec<CorpusDocument>> {
        Ok(self.documents.clone())
    }

    async fn count_documents(&self) -> ProviderResult<usize> {
        Ok(self.documents.len())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
