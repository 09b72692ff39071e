//! Semantic cache configuration

use serde::{Deserialize, Serialize};

/// Configuration for the question/SQL cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticCacheConfig {
    /// Whether lookups, interception and writes are enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Path of the SQLite cache file
    #[serde(default = "default_path")]
    pub path: String,

    /// Minimum similarity for a question-level hit (0.0 to 1.0)
    #[serde(default = "default_question_threshold")]
    pub question_threshold: f64,

    /// Minimum similarity for intercepting an agent's SQL action (0.0 to 1.0)
    #[serde(default = "default_sql_threshold")]
    pub sql_threshold: f64,

    /// Whether agent actions are checked against cached SQL
    #[serde(default = "default_enabled")]
    pub intercept_actions: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "cache.db".to_string()
}

fn default_question_threshold() -> f64 {
    0.7
}

fn default_sql_threshold() -> f64 {
    0.8
}

impl Default for SemanticCacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
            question_threshold: default_question_threshold(),
            sql_threshold: default_sql_threshold(),
            intercept_actions: default_enabled(),
        }
    }
}

impl SemanticCacheConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether caching is enabled
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the cache file path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the question-level threshold
    pub fn with_question_threshold(mut self, threshold: f64) -> Self {
        self.question_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the SQL-level threshold
    pub fn with_sql_threshold(mut self, threshold: f64) -> Self {
        self.sql_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set whether agent actions are intercepted
    pub fn with_intercept_actions(mut self, intercept: bool) -> Self {
        self.intercept_actions = intercept;
        self
    }

    /// Clamp thresholds loaded from external sources into [0, 1]
    pub fn normalized(self) -> Self {
        let question = self.question_threshold;
        let sql = self.sql_threshold;
        self.with_question_threshold(question).with_sql_threshold(sql)
    }
}
