//! CLI module for the SQL chat assistant
//!
//! Provides subcommands:
//! - `chat`: interactive conversation (default workflow)
//! - `ask`: answer a single question and exit
//! - `cache`: inspect and query the answer cache

pub mod ask;
pub mod cache;
pub mod chat;

use clap::{Parser, Subcommand};

use crate::config::AppConfig;
use crate::domain::DomainError;
use crate::infrastructure::logging;

/// Shown as the assistant's reply when the model output could not be used
pub const REPHRASE_MESSAGE: &str = "I could not understand your question. Could you rephrase it?";

/// SQL Chat Assistant - ask questions about a SQL database in plain language
#[derive(Parser)]
#[command(name = "sql-chat-assistant")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start an interactive chat session
    Chat(chat::ChatArgs),

    /// Answer one question and exit
    Ask(ask::AskArgs),

    /// Inspect the answer cache
    Cache(cache::CacheArgs),
}

/// Load `.env` and configuration, then install logging
pub(crate) fn bootstrap() -> AppConfig {
    dotenvy::dotenv().ok();

    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration, using defaults: {}", e);
        AppConfig::default()
    });
    logging::init_logging(&config.logging);

    config
}

/// User-facing text for a failed turn
pub(crate) fn render_error(error: &DomainError) -> String {
    match error {
        DomainError::Storage { .. } => format!(
            "The answer cache is unavailable ({}). Please try again.",
            error
        ),
        DomainError::OutputParsing { .. } => {
            "An error occurred while processing your question. Try rephrasing it.".to_string()
        }
        _ => format!("Unexpected error: {}", error),
    }
}
