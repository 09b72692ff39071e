use std::sync::Arc;

use super::http_client::HttpClient;
use super::OpenAiProvider;
use crate::config::LlmConfig;
use crate::domain::{DomainError, LlmProvider};

/// Factory for creating LLM providers
#[derive(Debug)]
pub struct LlmProviderFactory;

impl LlmProviderFactory {
    /// Create the configured provider, resolving the API key from config or `GROQ_API_KEY`
    pub fn create(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, DomainError> {
        let api_key = config.resolve_api_key().ok_or_else(|| {
            DomainError::configuration(
                "No API key configured: set llm.api_key, APP__LLM__API_KEY or GROQ_API_KEY",
            )
        })?;

        Ok(Self::create_openai_with_base_url(api_key, &config.base_url))
    }

    /// Create an OpenAI-compatible provider with a custom base URL
    pub fn create_openai_with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Arc<dyn LlmProvider> {
        Arc::new(OpenAiProvider::with_base_url(
            HttpClient::new(),
            api_key,
            base_url,
        ))
    }
}
