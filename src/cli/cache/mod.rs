//! Cache command - inspect the answer cache without running the agent

use std::sync::Arc;

use clap::{Args, Subcommand};

use super::bootstrap;
use crate::domain::{CacheEntry, CacheField, CacheHit, CacheStore};
use crate::infrastructure::semantic_cache::SqliteCacheStore;
use crate::infrastructure::services::CacheLookupService;

/// Arguments for the cache command
#[derive(Args, Clone, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Subcommand, Clone, Debug)]
pub enum CacheCommand {
    /// Print every cached entry in insertion order
    List,

    /// Find the entry most similar to a question or SQL statement
    Search(SearchArgs),
}

#[derive(Args, Clone, Debug)]
pub struct SearchArgs {
    /// Text to match against the cache
    pub query: String,

    /// Column to match against (user-query or sql-query)
    #[arg(long, default_value = "user-query")]
    pub field: CacheField,

    /// Minimum similarity; defaults to the configured threshold for the field
    #[arg(long)]
    pub threshold: Option<f64>,
}

/// Run the cache command
pub async fn run(args: CacheArgs) -> anyhow::Result<()> {
    let config = bootstrap();
    let store = Arc::new(SqliteCacheStore::new(&config.cache.path));

    match args.command {
        CacheCommand::List => {
            let entries = store.all_entries().await?;
            if entries.is_empty() {
                println!("The cache at {} is empty", store.path().display());
            }
            for entry in &entries {
                println!("{}\n", format_entry(entry));
            }
        }
        CacheCommand::Search(search) => {
            let threshold = search.threshold.unwrap_or(match search.field {
                CacheField::UserQuery => config.cache.question_threshold,
                CacheField::SqlQuery => config.cache.sql_threshold,
            });

            let lookup = CacheLookupService::new(store);
            match lookup.lookup(&search.query, threshold, search.field).await? {
                Some(hit) => println!("{}", format_hit(&hit)),
                None => println!(
                    "No cached {} reaches similarity {:.2}",
                    search.field, threshold
                ),
            }
        }
    }

    Ok(())
}

fn format_entry(entry: &CacheEntry) -> String {
    let sql = if entry.sql_query.is_empty() {
        "-"
    } else {
        entry.sql_query.as_str()
    };

    format!(
        "#{} {}\n  sql: {}\n  response: {}",
        entry.id,
        entry.user_query,
        sql,
        entry.response.replace('\n', "\n            ")
    )
}

fn format_hit(hit: &CacheHit) -> String {
    format!(
        "{}\n  similarity: {:.4}",
        format_entry(&hit.entry),
        hit.similarity
    )
}
