use std::fmt::Debug;

use async_trait::async_trait;

use super::AgentAction;
use crate::domain::DomainError;

/// A cached answer that replaces the rest of an agent turn
#[derive(Debug, Clone, PartialEq)]
pub struct Interception {
    /// Answer to surface instead of continuing the turn
    pub response: String,
    /// Cache entry the answer came from
    pub entry_id: i64,
    pub similarity: f64,
}

/// What a hook wants the agent to do with a proposed action
#[derive(Debug, Clone, PartialEq)]
pub enum HookDecision {
    /// Execute the action as proposed
    Continue,
    /// Stop the turn now and answer with the carried response
    Intercept(Interception),
}

/// Observes every action an agent proposes before it executes
#[async_trait]
pub trait ActionHook: Send + Sync + Debug {
    fn name(&self) -> &'static str;

    async fn on_agent_action(&self, action: &AgentAction) -> Result<HookDecision, DomainError>;
}
