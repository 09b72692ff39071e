use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{ActionHook, AgentAction, AgentFinish, HookDecision, Interception};
use crate::domain::DomainError;

/// How an agent turn ended
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The agent reached a final answer on its own
    Completed(AgentFinish),
    /// A hook vetoed `action`; it was never executed
    Intercepted {
        action: AgentAction,
        interception: Interception,
    },
}

/// Runs one question through an agent's reasoning loop
///
/// Implementations must offer every proposed action to every hook before
/// executing it. The first [`HookDecision::Intercept`] ends the turn: the
/// action is not executed, no further model calls are made, and any
/// reasoning accumulated so far is discarded.
#[async_trait]
pub trait AgentRuntime: Send + Sync + Debug {
    async fn run_turn(
        &self,
        question: &str,
        hooks: &[Arc<dyn ActionHook>],
    ) -> Result<TurnOutcome, DomainError>;
}

/// Offer `action` to each hook in order, stopping at the first veto
pub async fn check_action(
    hooks: &[Arc<dyn ActionHook>],
    action: &AgentAction,
) -> Result<HookDecision, DomainError> {
    for hook in hooks {
        if let HookDecision::Intercept(interception) = hook.on_agent_action(action).await? {
            debug!(
                "Hook '{}' intercepted action '{}' with cache entry {}",
                hook.name(),
                action.tool,
                interception.entry_id
            );
            return Ok(HookDecision::Intercept(interception));
        }
    }

    Ok(HookDecision::Continue)
}
