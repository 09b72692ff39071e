use serde::Deserialize;

use crate::domain::semantic_cache::SemanticCacheConfig;

/// Value of `database.uri` that selects the bundled sample database
pub const SAMPLE_DATABASE: &str = "sample";

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: SemanticCacheConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// OpenAI-compatible chat completion endpoint
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Falls back to `GROQ_API_KEY` when unset
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `sample` for the bundled database, otherwise an sqlx SQLite URL
    pub uri: String,
    pub sample_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    /// Free-form reasoning loop over the SQL tools
    #[default]
    React,
    /// Fixed write, execute, answer sequence
    Pipeline,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub kind: AgentKind,
    pub max_iterations: usize,
    pub handle_parsing_errors: bool,
    /// Row limit suggested to the model when writing queries
    pub top_k: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.groq.com/openai".to_string(),
            model: "llama3-8b-8192".to_string(),
            temperature: 0.0,
            max_tokens: 6000,
        }
    }
}

impl LlmConfig {
    /// Configured key, or `GROQ_API_KEY` from the environment
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| std::env::var("GROQ_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: SAMPLE_DATABASE.to_string(),
            sample_path: "data/database/Chinook.db".to_string(),
        }
    }
}

impl DatabaseConfig {
    pub fn is_sample(&self) -> bool {
        self.uri == SAMPLE_DATABASE
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            kind: AgentKind::default(),
            max_iterations: 15,
            handle_parsing_errors: true,
            top_k: 10,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app: Self = config.try_deserialize()?;
        app.cache = app.cache.normalized();

        Ok(app)
    }
}
