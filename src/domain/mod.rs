//! Domain layer - Core business logic and entities

pub mod agent;
pub mod error;
pub mod llm;
pub mod semantic_cache;
pub mod similarity;

pub use agent::{
    ActionHook, AgentAction, AgentFinish, AgentRuntime, HookDecision, Interception, Tool,
    TurnOutcome,
};
pub use error::DomainError;
pub use llm::{FinishReason, LlmProvider, LlmRequest, LlmResponse, Message, MessageRole, Usage};
pub use semantic_cache::{CacheEntry, CacheField, CacheHit, CacheStore, SemanticCacheConfig};
pub use similarity::{SimilarityScorer, TfIdfScorer};
