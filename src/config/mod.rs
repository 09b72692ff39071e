//! Application configuration

mod app_config;

pub use app_config::{
    AgentConfig, AgentKind, AppConfig, DatabaseConfig, LlmConfig, LogFormat, LoggingConfig,
    SAMPLE_DATABASE,
};
