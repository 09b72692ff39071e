//! Turn handler tying the cache to an agent runtime
//!
//! A turn first checks the question against cached questions. On a miss the
//! agent runs with the interception hook attached; a veto from that hook is
//! an ordinary reply. Only turns the agent finishes on its own are written
//! back to the cache.

use std::sync::Arc;

use tracing::{info, warn, Instrument};
use uuid::Uuid;

use crate::domain::agent::{ActionHook, AgentRuntime, TurnOutcome};
use crate::domain::semantic_cache::{CacheField, CacheStore, SemanticCacheConfig};
use crate::domain::DomainError;
use crate::infrastructure::agent::CacheInterceptionHook;

use super::{CacheLookupService, CacheWriter};

/// Where a reply came from
#[derive(Debug, Clone, PartialEq)]
pub enum ReplySource {
    /// A cached question matched; the agent never ran
    QuestionCache { entry_id: i64, similarity: f64 },
    /// The agent was stopped before running a cached query
    Intercepted { entry_id: i64, similarity: f64 },
    /// The agent answered; `entry_id` is set when the turn was cached
    Agent { entry_id: Option<i64> },
}

/// The assistant's answer to one question
#[derive(Debug)]
pub struct TurnReply {
    pub content: String,
    pub source: ReplySource,
    /// Set when the answer could not be written back to the cache
    pub cache_error: Option<DomainError>,
}

impl TurnReply {
    fn new(content: String, source: ReplySource) -> Self {
        Self {
            content,
            source,
            cache_error: None,
        }
    }

    /// Whether the content was served from the cache
    pub fn is_cached(&self) -> bool {
        !matches!(self.source, ReplySource::Agent { .. })
    }
}

/// Answers questions through the cache and an agent runtime
#[derive(Debug)]
pub struct ChatAssistant {
    runtime: Arc<dyn AgentRuntime>,
    lookup: CacheLookupService,
    writer: CacheWriter,
    hooks: Vec<Arc<dyn ActionHook>>,
    config: SemanticCacheConfig,
}

impl ChatAssistant {
    /// Create an assistant; the interception hook is attached when enabled
    pub fn new(
        runtime: Arc<dyn AgentRuntime>,
        store: Arc<dyn CacheStore>,
        config: SemanticCacheConfig,
    ) -> Self {
        let config = config.normalized();
        let lookup = CacheLookupService::new(store.clone());
        let writer = CacheWriter::new(store);

        let mut hooks: Vec<Arc<dyn ActionHook>> = Vec::new();
        if config.enabled && config.intercept_actions {
            hooks.push(Arc::new(CacheInterceptionHook::new(
                lookup.clone(),
                config.sql_threshold,
            )));
        }

        Self {
            runtime,
            lookup,
            writer,
            hooks,
            config,
        }
    }

    /// Handle one user question from start to finish
    pub async fn handle_turn(&self, question: &str) -> Result<TurnReply, DomainError> {
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", id = %turn_id);

        self.run_turn(question).instrument(span).await
    }

    async fn run_turn(&self, question: &str) -> Result<TurnReply, DomainError> {
        if self.config.enabled {
            let hit = self
                .lookup
                .lookup(question, self.config.question_threshold, CacheField::UserQuery)
                .await?;

            if let Some(hit) = hit {
                info!(
                    "Answered from cached question {} (similarity {:.4})",
                    hit.entry.id, hit.similarity
                );
                return Ok(TurnReply::new(
                    hit.entry.response,
                    ReplySource::QuestionCache {
                        entry_id: hit.entry.id,
                        similarity: hit.similarity,
                    },
                ));
            }
        }

        match self.runtime.run_turn(question, &self.hooks).await? {
            TurnOutcome::Intercepted {
                action,
                interception,
            } => {
                info!(
                    "Agent stopped before '{}' by cache entry {}",
                    action.tool, interception.entry_id
                );
                Ok(TurnReply::new(
                    interception.response,
                    ReplySource::Intercepted {
                        entry_id: interception.entry_id,
                        similarity: interception.similarity,
                    },
                ))
            }
            TurnOutcome::Completed(finish) => {
                let mut entry_id = None;
                let mut cache_error = None;

                if self.config.enabled {
                    match self.writer.commit(question, &finish.output).await {
                        Ok(id) => entry_id = Some(id),
                        Err(e) => {
                            warn!("Failed to cache answer: {}", e);
                            cache_error = Some(e);
                        }
                    }
                }

                Ok(TurnReply {
                    content: finish.output,
                    source: ReplySource::Agent { entry_id },
                    cache_error,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::domain::agent::{check_action, AgentAction, AgentFinish, HookDecision};
    use crate::domain::semantic_cache::{CacheEntry, MockCacheStore};
    use crate::infrastructure::semantic_cache::InMemoryCacheStore;

    /// Runtime that proposes one SQL action, then answers with a trace line
    #[derive(Debug)]
    struct ScriptedRuntime {
        sql: String,
        answer: String,
        runs: AtomicUsize,
        executed: Mutex<Vec<String>>,
    }

    impl ScriptedRuntime {
        fn new(sql: &str, answer: &str) -> Self {
            Self {
                sql: sql.to_string(),
                answer: answer.to_string(),
                runs: AtomicUsize::new(0),
                executed: Mutex::new(Vec::new()),
            }
        }

        fn runs(&self) -> usize {
            self.runs.load(Ordering::SeqCst)
        }

        fn executed(&self) -> Vec<String> {
            self.executed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AgentRuntime for ScriptedRuntime {
        async fn run_turn(
            &self,
            _question: &str,
            hooks: &[Arc<dyn ActionHook>],
        ) -> Result<TurnOutcome, DomainError> {
            self.runs.fetch_add(1, Ordering::SeqCst);

            let action = AgentAction::new("sql_db_query", self.sql.clone(), "");
            if let HookDecision::Intercept(interception) = check_action(hooks, &action).await? {
                return Ok(TurnOutcome::Intercepted {
                    action,
                    interception,
                });
            }

            self.executed.lock().unwrap().push(self.sql.clone());

            Ok(TurnOutcome::Completed(AgentFinish::new(
                format!("{}\nsql_db_query: {}", self.answer, self.sql),
                "",
            )))
        }
    }

    #[derive(Debug)]
    struct FailingRuntime;

    #[async_trait]
    impl AgentRuntime for FailingRuntime {
        async fn run_turn(
            &self,
            _question: &str,
            _hooks: &[Arc<dyn ActionHook>],
        ) -> Result<TurnOutcome, DomainError> {
            Err(DomainError::output_parsing("no Action or Final Answer"))
        }
    }

    fn employees_store() -> Arc<InMemoryCacheStore> {
        Arc::new(InMemoryCacheStore::with_entries([(
            "How many employees are there?",
            "SELECT COUNT(*) FROM employees",
            "There are 8 employees.",
        )]))
    }

    #[tokio::test]
    async fn test_question_hit_skips_agent() {
        let runtime = Arc::new(ScriptedRuntime::new("SELECT 1", "unused"));
        let assistant =
            ChatAssistant::new(runtime.clone(), employees_store(), SemanticCacheConfig::default());

        let reply = assistant
            .handle_turn("How many employees are there?")
            .await
            .unwrap();

        assert_eq!(reply.content, "There are 8 employees.");
        assert!(matches!(
            reply.source,
            ReplySource::QuestionCache { entry_id: 1, .. }
        ));
        assert_eq!(runtime.runs(), 0);
    }

    #[tokio::test]
    async fn test_interception_short_circuits_agent() {
        let runtime = Arc::new(ScriptedRuntime::new(
            "SELECT COUNT(*) FROM employees;",
            "fresh answer",
        ));
        let store = employees_store();
        let assistant =
            ChatAssistant::new(runtime.clone(), store.clone(), SemanticCacheConfig::default());

        let reply = assistant.handle_turn("staff headcount").await.unwrap();

        assert_eq!(reply.content, "There are 8 employees.");
        assert!(matches!(reply.source, ReplySource::Intercepted { entry_id: 1, .. }));
        assert!(runtime.executed().is_empty());
        assert_eq!(store.all_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_completed_turn_is_cached() {
        let runtime = Arc::new(ScriptedRuntime::new(
            "SELECT * FROM albums LIMIT 5",
            "Here are five albums.",
        ));
        let store = employees_store();
        let assistant =
            ChatAssistant::new(runtime.clone(), store.clone(), SemanticCacheConfig::default());

        let reply = assistant.handle_turn("Show me some albums").await.unwrap();

        assert_eq!(
            reply.content,
            "Here are five albums.\nsql_db_query: SELECT * FROM albums LIMIT 5"
        );
        assert_eq!(reply.source, ReplySource::Agent { entry_id: Some(2) });
        assert!(reply.cache_error.is_none());
        assert!(!reply.is_cached());

        let entries = store.all_entries().await.unwrap();
        assert_eq!(
            entries[1],
            CacheEntry::new(
                2,
                "Show me some albums",
                "SELECT * FROM albums LIMIT 5",
                reply.content.clone()
            )
        );

        let again = assistant.handle_turn("Show me some albums").await.unwrap();
        assert!(again.is_cached());
        assert_eq!(runtime.runs(), 1);
    }

    #[tokio::test]
    async fn test_disabled_cache_bypasses_everything() {
        let runtime = Arc::new(ScriptedRuntime::new(
            "SELECT COUNT(*) FROM employees",
            "There are 8 employees.",
        ));
        let store = employees_store();
        let assistant = ChatAssistant::new(
            runtime.clone(),
            store.clone(),
            SemanticCacheConfig::default().with_enabled(false),
        );

        let reply = assistant
            .handle_turn("How many employees are there?")
            .await
            .unwrap();

        assert_eq!(reply.source, ReplySource::Agent { entry_id: None });
        assert!(reply.cache_error.is_none());
        assert_eq!(runtime.executed().len(), 1);
        assert_eq!(store.all_entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_failure_still_returns_answer() {
        let mut store = MockCacheStore::new();
        store.expect_all_entries().returning(|| Ok(Vec::new()));
        store
            .expect_append()
            .times(1)
            .returning(|_, _, _| Err(DomainError::storage("disk full")));

        let runtime = Arc::new(ScriptedRuntime::new("SELECT 1", "one"));
        let assistant =
            ChatAssistant::new(runtime, Arc::new(store), SemanticCacheConfig::default());

        let reply = assistant.handle_turn("pick one").await.unwrap();

        assert_eq!(reply.content, "one\nsql_db_query: SELECT 1");
        assert_eq!(reply.source, ReplySource::Agent { entry_id: None });
        assert!(reply.cache_error.as_ref().is_some_and(DomainError::is_storage));
    }

    #[tokio::test]
    async fn test_lookup_storage_error_propagates() {
        let mut store = MockCacheStore::new();
        store
            .expect_all_entries()
            .returning(|| Err(DomainError::storage("permission denied")));

        let runtime = Arc::new(ScriptedRuntime::new("SELECT 1", "one"));
        let assistant =
            ChatAssistant::new(runtime.clone(), Arc::new(store), SemanticCacheConfig::default());

        let err = assistant.handle_turn("anything").await.unwrap_err();

        assert!(err.is_storage());
        assert_eq!(runtime.runs(), 0);
    }

    #[tokio::test]
    async fn test_agent_failure_is_not_cached() {
        let mut store = MockCacheStore::new();
        store.expect_all_entries().returning(|| Ok(Vec::new()));
        store.expect_append().never();

        let assistant = ChatAssistant::new(
            Arc::new(FailingRuntime),
            Arc::new(store),
            SemanticCacheConfig::default(),
        );

        let err = assistant.handle_turn("gibberish").await.unwrap_err();

        assert!(err.is_output_parsing());
    }
}
