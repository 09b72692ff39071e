//! Persists completed agent turns into the cache

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::domain::semantic_cache::{extract_sql_query, CacheStore};
use crate::domain::DomainError;

/// Appends a question/SQL/answer triple after a turn completes naturally
#[derive(Clone)]
pub struct CacheWriter {
    store: Arc<dyn CacheStore>,
}

impl fmt::Debug for CacheWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheWriter").finish_non_exhaustive()
    }
}

impl CacheWriter {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Extract the SQL from `answer` and store the triple, returning its id
    ///
    /// An answer without a `sql_db_query:` line is stored with empty SQL.
    pub async fn commit(&self, user_query: &str, answer: &str) -> Result<i64, DomainError> {
        let sql_query = extract_sql_query(answer);
        let id = self.store.append(user_query, &sql_query, answer).await?;

        debug!(
            "Cached turn as entry {} (sql extracted: {})",
            id,
            !sql_query.is_empty()
        );

        Ok(id)
    }
}
