//! Infrastructure services

mod cache_lookup_service;
mod cache_writer;
mod chat_assistant;

pub use cache_lookup_service::CacheLookupService;
pub use cache_writer::CacheWriter;
pub use chat_assistant::{ChatAssistant, ReplySource, TurnReply};
