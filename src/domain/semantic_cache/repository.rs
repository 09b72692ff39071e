//! Cache entry types and the append-only store trait

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

#[cfg(test)]
use mockall::automock;

/// One persisted question/SQL/answer triple
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Identity assigned by the store, increasing with insertion order
    pub id: i64,
    /// The natural-language question
    pub user_query: String,
    /// The SQL extracted from the agent's answer, possibly empty
    pub sql_query: String,
    /// The answer shown to the user
    pub response: String,
}

impl CacheEntry {
    pub fn new(
        id: i64,
        user_query: impl Into<String>,
        sql_query: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            id,
            user_query: user_query.into(),
            sql_query: sql_query.into(),
            response: response.into(),
        }
    }

    /// Project the given column
    pub fn field(&self, field: CacheField) -> &str {
        match field {
            CacheField::UserQuery => &self.user_query,
            CacheField::SqlQuery => &self.sql_query,
        }
    }
}

/// Column a similarity lookup is run against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheField {
    UserQuery,
    SqlQuery,
}

impl CacheField {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserQuery => "user_query",
            Self::SqlQuery => "sql_query",
        }
    }
}

impl fmt::Display for CacheField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CacheField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "user_query" => Ok(Self::UserQuery),
            "sql_query" => Ok(Self::SqlQuery),
            other => Err(DomainError::validation(format!(
                "Unknown cache field '{}', expected user_query or sql_query",
                other
            ))),
        }
    }
}

/// A lookup result: the matching entry and how similar it was
#[derive(Debug, Clone, PartialEq)]
pub struct CacheHit {
    pub entry: CacheEntry,
    pub similarity: f64,
}

impl CacheHit {
    pub fn new(entry: CacheEntry, similarity: f64) -> Self {
        Self { entry, similarity }
    }
}

/// Append-only persistence for cache entries
///
/// There is deliberately no update or delete: entries are immutable once
/// written and duplicates are allowed.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Insert a new entry and return its assigned id
    async fn append(
        &self,
        user_query: &str,
        sql_query: &str,
        response: &str,
    ) -> Result<i64, DomainError>;

    /// Every entry in insertion order; empty when nothing was ever written
    async fn all_entries(&self) -> Result<Vec<CacheEntry>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_field_projection() {
        let entry = CacheEntry::new(
            1,
            "How many employees are there?",
            "SELECT COUNT(*) FROM employees",
            "There are 8 employees.",
        );

        assert_eq!(
            entry.field(CacheField::UserQuery),
            "How many employees are there?"
        );
        assert_eq!(
            entry.field(CacheField::SqlQuery),
            "SELECT COUNT(*) FROM employees"
        );
    }

    #[test]
    fn test_cache_field_parsing() {
        assert_eq!("user_query".parse::<CacheField>().unwrap(), CacheField::UserQuery);
        assert_eq!("sql-query".parse::<CacheField>().unwrap(), CacheField::SqlQuery);
        assert_eq!("SQL_QUERY".parse::<CacheField>().unwrap(), CacheField::SqlQuery);
        assert!("response".parse::<CacheField>().is_err());
    }

    #[test]
    fn test_cache_field_display() {
        assert_eq!(CacheField::UserQuery.to_string(), "user_query");
        assert_eq!(CacheField::SqlQuery.to_string(), "sql_query");
    }
}
