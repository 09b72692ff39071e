//! Text similarity scoring

mod tfidf;

use std::fmt::Debug;

pub use tfidf::TfIdfScorer;

/// Scores a query against a list of candidate strings
///
/// Implementations must give identical strings the maximum score (1.0),
/// strings with no shared vocabulary the minimum (0.0), and grow
/// monotonically with shared-term overlap. The returned vector is aligned
/// with `candidates`.
pub trait SimilarityScorer: Send + Sync + Debug {
    fn score(&self, query: &str, candidates: &[&str]) -> Vec<f64>;
}
