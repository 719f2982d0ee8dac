//! SQLite storage implementation.
//!
//! This module provides a SQLite-based implementation of the `DocumentStore`
//! trait using rusqlite.
//!
//! # Schema
//! The database contains two tables:
//! - `config`: (key TEXT PRIMARY KEY, value TEXT) holding the embedding configuration as JSON
//! - `papers`: (pmid TEXT PRIMARY KEY, title TEXT, year INTEGER, journal TEXT)

use super::{DocumentStore, StorageError, StorageResult};
use crate::models::{DocumentRecord, EmbeddingConfig};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const CONFIG_KEY: &str = "embedding";

/// SQLite-backed citation metadata store.
///
/// The connection sits behind `Arc<Mutex<..>>` because `rusqlite::Connection`
/// is not `Sync`; individual statements are short enough that queuing on the
/// mutex is never the bottleneck.
#[derive(Clone)]
pub struct SqliteStore {
    /// Path to the database file
    db_path: PathBuf,

    /// Open database connection
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    /// Returns `StorageError::ConnectionError` if the file cannot be opened
    pub fn open(db_path: impl AsRef<Path>) -> StorageResult<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            db_path,
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database, for tests and tooling.
    ///
    /// # Errors
    /// Returns `StorageError::ConnectionError` if the connection fails
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StorageError::ConnectionError(e.to_string()))?;

        Ok(Self {
            db_path: PathBuf::from(":memory:"),
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Path this store was opened at.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn map_insert_error(pmid: &str, err: rusqlite::Error) -> StorageError {
        if let rusqlite::Error::SqliteFailure(inner, _) = &err {
            if inner.code == ErrorCode::ConstraintViolation {
                return StorageError::DuplicateEntry(format!("PMID {} already stored", pmid));
            }
        }
        StorageError::QueryError(err.to_string())
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn initialize(&mut self) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS config (
                 key   TEXT PRIMARY KEY,
                 value TEXT NOT NULL
             );
             CREATE TABLE IF NOT EXISTS papers (
                 pmid    TEXT PRIMARY KEY,
                 title   TEXT NOT NULL,
                 year    INTEGER NOT NULL,
                 journal TEXT NOT NULL
             );",
        )
        .map_err(|e| StorageError::SchemaError(e.to_string()))
    }

    async fn store_config(&mut self, config: &EmbeddingConfig) -> StorageResult<()> {
        let value = serde_json::to_string(config)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;

        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO config (key, value) VALUES (?1, ?2)",
            params![CONFIG_KEY, value],
        )
        .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(())
    }

    async fn get_config(&self) -> StorageResult<Option<EmbeddingConfig>> {
        let conn = self.conn.lock().await;
        let value: Option<String> = conn
            .query_row(
                "SELECT value FROM config WHERE key = ?1",
                params![CONFIG_KEY],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        value
            .map(|v| {
                serde_json::from_str(&v)
                    .map_err(|e| StorageError::SerializationError(e.to_string()))
            })
            .transpose()
    }

    async fn insert_document(&mut self, record: &DocumentRecord) -> StorageResult<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO papers (pmid, title, year, journal) VALUES (?1, ?2, ?3, ?4)",
            params![record.pmid, record.title, record.year, record.journal],
        )
        .map_err(|e| Self::map_insert_error(&record.pmid, e))?;

        Ok(())
    }

    async fn get_document(&self, pmid: &str) -> StorageResult<DocumentRecord> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT pmid, title, year, journal FROM papers WHERE pmid = ?1",
            params![pmid],
            |row| {
                Ok(DocumentRecord {
                    pmid: row.get(0)?,
                    title: row.get(1)?,
                    year: row.get(2)?,
                    journal: row.get(3)?,
                })
            },
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => {
                StorageError::NotFound(format!("PMID {} not stored", pmid))
            }
            other => StorageError::QueryError(other.to_string()),
        })
    }

    async fn load_all(&self) -> StorageResult<Vec<DocumentRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT pmid, title, year, journal FROM papers")
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(DocumentRecord {
                    pmid: row.get(0)?,
                    title: row.get(1)?,
                    year: row.get(2)?,
                    journal: row.get(3)?,
                })
            })
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::QueryError(e.to_string()))
    }

    async fn count_documents(&self) -> StorageResult<usize> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM papers", [], |row| row.get(0))
            .map_err(|e| StorageError::QueryError(e.to_string()))?;

        Ok(count as usize)
    }
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pmid: &str, title: &str) -> DocumentRecord {
        DocumentRecord {
            pmid: pmid.to_string(),
            title: title.to_string(),
            year: 2020,
            journal: "Journal of Testing".to_string(),
        }
    }

    async fn fresh_store() -> SqliteStore {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_initialize_is_idempotent() {
        let mut store = fresh_store().await;
        store.initialize().await.unwrap();
        store.initialize().await.unwrap();
    }

    #[tokio::test]
    async fn test_insert_and_get_document() {
        let mut store = fresh_store().await;
        store
            .insert_document(&record("101", "First paper"))
            .await
            .unwrap();

        let fetched = store.get_document("101").await.unwrap();
        assert_eq!(fetched.title, "First paper");
        assert_eq!(fetched.year, 2020);
    }

    #[tokio::test]
    async fn test_get_missing_document_is_not_found() {
        let store = fresh_store().await;
        let result = store.get_document("nope").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_pmid_rejected() {
        let mut store = fresh_store().await;
        store.insert_document(&record("7", "A")).await.unwrap();

        let result = store.insert_document(&record("7", "B")).await;
        assert!(matches!(result, Err(StorageError::DuplicateEntry(_))));
        assert_eq!(store.count_documents().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_all_and_count() {
        let mut store = fresh_store().await;
        for i in 0..4 {
            store
                .insert_document(&record(&i.to_string(), &format!("Paper {}", i)))
                .await
                .unwrap();
        }

        assert_eq!(store.count_documents().await.unwrap(), 4);
        let all = store.load_all().await.unwrap();
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_config_roundtrip() {
        let mut store = fresh_store().await;
        assert!(store.get_config().await.unwrap().is_none());

        let config = EmbeddingConfig {
            model_name: "AllMiniLML6V2".to_string(),
            dimension: 384,
        };
        store.store_config(&config).await.unwrap();

        let loaded = store.get_config().await.unwrap().unwrap();
        assert_eq!(loaded, config);

        // Overwriting replaces rather than duplicating.
        let newer = EmbeddingConfig {
            model_name: "BGEBaseENV15".to_string(),
            dimension: 768,
        };
        store.store_config(&newer).await.unwrap();
        assert_eq!(store.get_config().await.unwrap().unwrap(), newer);
    }

    #[tokio::test]
    async fn test_file_backed_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("papers.db");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.initialize().await.unwrap();
            store.insert_document(&record("42", "Persisted")).await.unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let fetched = reopened.get_document("42").await.unwrap();
        assert_eq!(fetched.title, "Persisted");
    }
}
