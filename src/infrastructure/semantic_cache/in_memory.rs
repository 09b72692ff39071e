//! In-memory cache store implementation

use std::sync::RwLock;

use async_trait::async_trait;

use crate::domain::semantic_cache::{CacheEntry, CacheStore};
use crate::domain::DomainError;

/// Process-local append-only cache store
///
/// Suitable for tests and throwaway sessions; entries are lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<Vec<CacheEntry>>,
}

impl InMemoryCacheStore {
    /// Create an empty in-memory cache store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with (user_query, sql_query, response) triples
    pub fn with_entries<'a>(triples: impl IntoIterator<Item = (&'a str, &'a str, &'a str)>) -> Self {
        let entries = triples
            .into_iter()
            .zip(1..)
            .map(|((user_query, sql_query, response), id)| {
                CacheEntry::new(id, user_query, sql_query, response)
            })
            .collect();

        Self {
            entries: RwLock::new(entries),
        }
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn append(
        &self,
        user_query: &str,
        sql_query: &str,
        response: &str,
    ) -> Result<i64, DomainError> {
        let mut entries = self.entries.write().map_err(|e| {
            DomainError::storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let id = entries.last().map_or(1, |last| last.id + 1);
        entries.push(CacheEntry::new(id, user_query, sql_query, response));

        Ok(id)
    }

    async fn all_entries(&self) -> Result<Vec<CacheEntry>, DomainError> {
        let entries = self.entries.read().map_err(|e| {
            DomainError::storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(entries.clone())
    }
}
