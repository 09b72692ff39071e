//! SQLite-backed cache store

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};
use tracing::debug;

use crate::domain::semantic_cache::{CacheEntry, CacheStore};
use crate::domain::DomainError;

const CREATE_CACHE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS cache (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_query TEXT,
        sql_query TEXT,
        response TEXT
    )
"#;

/// Cache store persisted in a single local SQLite file
///
/// Every operation opens its own connection, ensures the `cache` table
/// exists, and closes the connection again. A connection dropped on an
/// error path is released by sqlx, so no handle outlives an operation.
#[derive(Debug, Clone)]
pub struct SqliteCacheStore {
    path: PathBuf,
}

impl SqliteCacheStore {
    /// Create a store for the given file; nothing is touched until first use
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open(&self) -> Result<SqliteConnection, DomainError> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);

        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| {
                DomainError::storage(format!(
                    "Failed to open cache database {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        sqlx::query(CREATE_CACHE_TABLE)
            .execute(&mut conn)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to create cache table: {}", e)))?;

        Ok(conn)
    }

    async fn close(conn: SqliteConnection) -> Result<(), DomainError> {
        conn.close()
            .await
            .map_err(|e| DomainError::storage(format!("Failed to close cache database: {}", e)))
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn append(
        &self,
        user_query: &str,
        sql_query: &str,
        response: &str,
    ) -> Result<i64, DomainError> {
        let mut conn = self.open().await?;

        let result = sqlx::query(
            "INSERT INTO cache (user_query, sql_query, response) VALUES (?, ?, ?)",
        )
        .bind(user_query)
        .bind(sql_query)
        .bind(response)
        .execute(&mut conn)
        .await
        .map_err(|e| DomainError::storage(format!("Failed to insert cache entry: {}", e)))?;

        let id = result.last_insert_rowid();
        Self::close(conn).await?;

        debug!("Appended cache entry {} to {}", id, self.path.display());

        Ok(id)
    }

    async fn all_entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let mut conn = self.open().await?;

        let rows = sqlx::query("SELECT id, user_query, sql_query, response FROM cache ORDER BY id")
            .fetch_all(&mut conn)
            .await
            .map_err(|e| DomainError::storage(format!("Failed to read cache entries: {}", e)))?;

        Self::close(conn).await?;

        rows.iter()
            .map(|row| {
                let text = |column: &str| -> Result<String, DomainError> {
                    row.try_get::<Option<String>, _>(column)
                        .map(Option::unwrap_or_default)
                        .map_err(|e| {
                            DomainError::storage(format!("Failed to decode {}: {}", column, e))
                        })
                };

                let id: i64 = row
                    .try_get("id")
                    .map_err(|e| DomainError::storage(format!("Failed to decode id: {}", e)))?;

                Ok(CacheEntry::new(
                    id,
                    text("user_query")?,
                    text("sql_query")?,
                    text("response")?,
                ))
            })
            .collect()
    }
}
