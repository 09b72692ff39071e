//! Semantic cache domain models and traits
//!
//! Stores question/SQL/answer triples and matches new questions (or the SQL
//! an agent is about to run) against them by textual similarity instead of
//! exact keys.

mod config;
mod extraction;
mod repository;

pub use config::SemanticCacheConfig;
pub use extraction::{extract_sql_query, format_query_trace, QUERY_TOOL_NAME};
pub use repository::{CacheEntry, CacheField, CacheHit, CacheStore};

#[cfg(test)]
pub use repository::MockCacheStore;
