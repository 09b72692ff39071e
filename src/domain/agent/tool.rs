use async_trait::async_trait;

use crate::domain::DomainError;

/// A capability the agent can invoke by name with a text input
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    /// Shown to the model when it chooses an action
    fn description(&self) -> &'static str;

    async fn call(&self, input: &str) -> Result<String, DomainError>;
}
