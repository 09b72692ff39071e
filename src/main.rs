use clap::Parser;
use sql_chat_assistant::cli::{self, Cli, Command};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Chat(args) => cli::chat::run(args).await,
        Command::Ask(args) => cli::ask::run(args).await,
        Command::Cache(args) => cli::cache::run(args).await,
    }
}
