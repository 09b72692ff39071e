//! Similarity lookup over the cache store

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::domain::semantic_cache::{CacheField, CacheHit, CacheStore};
use crate::domain::similarity::{SimilarityScorer, TfIdfScorer};
use crate::domain::DomainError;

/// Finds the stored entry most similar to a query on one column
///
/// The vector space is rebuilt from the full store contents on every call,
/// so results always reflect the latest appends.
#[derive(Clone)]
pub struct CacheLookupService {
    store: Arc<dyn CacheStore>,
    scorer: Arc<dyn SimilarityScorer>,
}

impl fmt::Debug for CacheLookupService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheLookupService")
            .field("scorer", &self.scorer)
            .finish_non_exhaustive()
    }
}

impl CacheLookupService {
    /// Create a lookup service scoring with TF-IDF cosine similarity
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self::with_scorer(store, Arc::new(TfIdfScorer::new()))
    }

    pub fn with_scorer(store: Arc<dyn CacheStore>, scorer: Arc<dyn SimilarityScorer>) -> Self {
        Self { store, scorer }
    }

    /// Return the best-matching entry if its score reaches `threshold`
    ///
    /// Ties keep the earliest entry. An empty store is a miss, never an error.
    pub async fn lookup(
        &self,
        query: &str,
        threshold: f64,
        field: CacheField,
    ) -> Result<Option<CacheHit>, DomainError> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(DomainError::validation(format!(
                "Similarity threshold must be within [0, 1], got {}",
                threshold
            )));
        }

        let entries = self.store.all_entries().await?;
        if entries.is_empty() {
            debug!("Cache lookup on {} skipped: store is empty", field);
            return Ok(None);
        }

        let candidates: Vec<&str> = entries.iter().map(|entry| entry.field(field)).collect();
        let scores = self.scorer.score(query, &candidates);

        let mut best: Option<(usize, f64)> = None;
        for (index, &score) in scores.iter().enumerate() {
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((index, score));
            }
        }

        let Some((index, similarity)) = best else {
            return Ok(None);
        };

        if similarity < threshold {
            debug!(
                "Cache miss on {}: best similarity {:.4} below threshold {:.2}",
                field, similarity, threshold
            );
            return Ok(None);
        }

        let entry = entries.into_iter().nth(index).ok_or_else(|| {
            DomainError::internal("Similarity scorer returned more scores than candidates")
        })?;

        debug!(
            "Cache hit on {} for entry {} with similarity {:.4}",
            field, entry.id, similarity
        );

        Ok(Some(CacheHit::new(entry, similarity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::semantic_cache::MockCacheStore;
    use crate::infrastructure::semantic_cache::InMemoryCacheStore;

    fn service(store: InMemoryCacheStore) -> CacheLookupService {
        CacheLookupService::new(Arc::new(store))
    }

    fn employees_store() -> InMemoryCacheStore {
        InMemoryCacheStore::with_entries([
            (
                "How many employees are there?",
                "SELECT COUNT(*) FROM employees",
                "There are 8 employees.",
            ),
            (
                "List the first five albums",
                "SELECT * FROM albums LIMIT 5",
                "Here are five albums.",
            ),
        ])
    }

    #[tokio::test]
    async fn test_empty_store_never_matches() {
        let lookup = service(InMemoryCacheStore::new());

        for threshold in [0.0, 0.5, 1.0] {
            for field in [CacheField::UserQuery, CacheField::SqlQuery] {
                let hit = lookup.lookup("anything", threshold, field).await.unwrap();
                assert!(hit.is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_self_similarity_hits_at_full_threshold() {
        let lookup = service(employees_store());

        let hit = lookup
            .lookup("List the first five albums", 1.0, CacheField::UserQuery)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.entry.id, 2);
        assert_eq!(hit.similarity, 1.0);
    }

    #[tokio::test]
    async fn test_threshold_monotonicity() {
        let lookup = service(employees_store());
        let query = "how many employees";

        let strict = lookup
            .lookup(query, 0.5, CacheField::UserQuery)
            .await
            .unwrap()
            .expect("expected a hit at 0.5");

        for threshold in [0.4, 0.2, 0.0] {
            let relaxed = lookup
                .lookup(query, threshold, CacheField::UserQuery)
                .await
                .unwrap()
                .expect("lower threshold must still hit");
            assert!(relaxed.similarity >= strict.similarity);
        }
    }

    #[tokio::test]
    async fn test_ties_prefer_earliest_entry() {
        let lookup = service(InMemoryCacheStore::with_entries([
            ("total sales by country", "", "first"),
            ("total sales by country", "", "second"),
        ]));

        let hit = lookup
            .lookup("total sales by country", 0.9, CacheField::UserQuery)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.entry.id, 1);
        assert_eq!(hit.entry.response, "first");
    }

    #[tokio::test]
    async fn test_disjoint_vocabulary_falls_through() {
        let lookup = service(employees_store());

        let hit = lookup
            .lookup("weather tomorrow Paris", 0.8, CacheField::UserQuery)
            .await
            .unwrap();

        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn test_sql_field_tolerates_trailing_semicolon() {
        let lookup = service(employees_store());

        let hit = lookup
            .lookup("SELECT COUNT(*) FROM employees;", 0.8, CacheField::SqlQuery)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(hit.entry.response, "There are 8 employees.");
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_threshold() {
        let lookup = service(employees_store());

        for threshold in [-0.1, 1.5, f64::NAN] {
            let err = lookup
                .lookup("anything", threshold, CacheField::UserQuery)
                .await
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation { .. }));
        }
    }

    #[tokio::test]
    async fn test_storage_error_propagates() {
        let mut store = MockCacheStore::new();
        store
            .expect_all_entries()
            .returning(|| Err(DomainError::storage("disk on fire")));

        let lookup = CacheLookupService::new(Arc::new(store));
        let err = lookup
            .lookup("anything", 0.7, CacheField::UserQuery)
            .await
            .unwrap_err();

        assert!(err.is_storage());
    }
}
