//! SQL Chat Assistant
//!
//! Answers natural-language questions about a SQL database with an LLM agent,
//! backed by a semantic cache that:
//! - serves answers to previously seen (or similar) questions directly
//! - stops the agent before it re-runs a query that is already cached
//! - records every completed turn for later reuse

pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use config::AgentKind;
use domain::{AgentRuntime, CacheStore, LlmProvider, SemanticCacheConfig};
use infrastructure::agent::{QueryPipeline, ReactSqlAgent};
use infrastructure::llm::LlmProviderFactory;
use infrastructure::semantic_cache::{InMemoryCacheStore, SqliteCacheStore};
use infrastructure::services::ChatAssistant;
use infrastructure::sql::{SqlDatabase, SqlToolkit};

/// Build the assistant described by `config`
///
/// With `persist` off the cache lives in memory and is discarded on exit.
pub async fn create_assistant(config: &AppConfig, persist: bool) -> anyhow::Result<ChatAssistant> {
    let llm = LlmProviderFactory::create(&config.llm)?;
    let db = SqlDatabase::connect(&config.database).await?;

    let runtime = create_runtime(config, llm, db);
    let store = create_cache_store(&config.cache, persist);

    Ok(ChatAssistant::new(runtime, store, config.cache.clone()))
}

/// Cache store for the configured path, or an in-memory one
pub fn create_cache_store(config: &SemanticCacheConfig, persist: bool) -> Arc<dyn CacheStore> {
    if persist {
        info!("Using cache file {}", config.path);
        Arc::new(SqliteCacheStore::new(&config.path))
    } else {
        info!("Using in-memory cache");
        Arc::new(InMemoryCacheStore::new())
    }
}

/// Agent runtime of the configured kind
pub fn create_runtime(
    config: &AppConfig,
    llm: Arc<dyn LlmProvider>,
    db: SqlDatabase,
) -> Arc<dyn AgentRuntime> {
    let llm_config = &config.llm;
    let agent_config = &config.agent;

    match agent_config.kind {
        AgentKind::React => {
            let tools = SqlToolkit::new(db.clone())
                .with_query_checker(llm.clone(), &llm_config.model)
                .tools();

            Arc::new(
                ReactSqlAgent::new(llm, &llm_config.model, db.dialect(), tools)
                    .with_temperature(llm_config.temperature)
                    .with_max_tokens(llm_config.max_tokens)
                    .with_max_iterations(agent_config.max_iterations)
                    .with_handle_parsing_errors(agent_config.handle_parsing_errors)
                    .with_top_k(agent_config.top_k),
            )
        }
        AgentKind::Pipeline => Arc::new(
            QueryPipeline::new(llm, &llm_config.model, db)
                .with_temperature(llm_config.temperature)
                .with_max_tokens(llm_config.max_tokens)
                .with_top_k(agent_config.top_k),
        ),
    }
}
