//! Infrastructure layer - External service implementations

pub mod agent;
pub mod llm;
pub mod logging;
pub mod semantic_cache;
pub mod services;
pub mod sql;
