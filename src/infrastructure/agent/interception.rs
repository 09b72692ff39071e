//! Hook that answers from the cache when the agent is about to repeat a query

use async_trait::async_trait;
use tracing::info;

use crate::domain::agent::{ActionHook, AgentAction, HookDecision, Interception};
use crate::domain::semantic_cache::CacheField;
use crate::domain::DomainError;
use crate::infrastructure::services::CacheLookupService;

/// Vetoes SQL actions whose statement is already in the cache
#[derive(Debug, Clone)]
pub struct CacheInterceptionHook {
    lookup: CacheLookupService,
    threshold: f64,
}

impl CacheInterceptionHook {
    pub fn new(lookup: CacheLookupService, threshold: f64) -> Self {
        Self {
            lookup,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }
}

#[async_trait]
impl ActionHook for CacheInterceptionHook {
    fn name(&self) -> &'static str {
        "cache_interception"
    }

    async fn on_agent_action(&self, action: &AgentAction) -> Result<HookDecision, DomainError> {
        let Some(sql) = action.sql_payload() else {
            return Ok(HookDecision::Continue);
        };

        let hit = self
            .lookup
            .lookup(sql, self.threshold, CacheField::SqlQuery)
            .await?;

        Ok(match hit {
            Some(hit) => {
                info!(
                    "Intercepted '{}' action with cache entry {} (similarity {:.4})",
                    action.tool, hit.entry.id, hit.similarity
                );
                HookDecision::Intercept(Interception {
                    response: hit.entry.response,
                    entry_id: hit.entry.id,
                    similarity: hit.similarity,
                })
            }
            None => HookDecision::Continue,
        })
    }
}
