//! Agent runtime contracts
//!
//! An agent turn is a loop of proposed actions. Hooks get to veto each
//! action before it runs; a veto is carried back as a value
//! ([`TurnOutcome::Intercepted`]) rather than an error, so the turn handler
//! can turn it into a normal answer.

mod action;
mod hook;
mod runtime;
mod tool;

pub use action::{AgentAction, AgentFinish};
pub use hook::{ActionHook, HookDecision, Interception};
pub use runtime::{check_action, AgentRuntime, TurnOutcome};
pub use tool::Tool;
