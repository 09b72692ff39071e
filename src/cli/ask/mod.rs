//! Ask command - answers a single question

use clap::Args;
use tracing::info;

use super::{bootstrap, render_error, REPHRASE_MESSAGE};

/// Arguments for the ask command
#[derive(Args, Clone, Debug)]
pub struct AskArgs {
    /// The question to answer
    pub question: String,

    /// Do not read from or write to the cache file
    #[arg(long)]
    pub no_persist: bool,
}

/// Answer `args.question` and print the reply to stdout
pub async fn run(args: AskArgs) -> anyhow::Result<()> {
    let config = bootstrap();
    let assistant = crate::create_assistant(&config, !args.no_persist).await?;

    match assistant.handle_turn(&args.question).await {
        Ok(reply) => {
            info!("Answered (cached: {})", reply.is_cached());
            println!("{}", reply.content);
            if let Some(e) = &reply.cache_error {
                eprintln!("{}", render_error(e));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", render_error(&e));
            if e.is_output_parsing() {
                println!("{}", REPHRASE_MESSAGE);
            }
            Err(e.into())
        }
    }
}
