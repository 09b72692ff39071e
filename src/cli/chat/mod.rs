//! Chat command - interactive question/answer loop

mod session;

pub use session::{ChatSession, ReplCommand, GREETING};

use std::io::Write;

use clap::Args;
use tokio::io::{stdin, AsyncBufReadExt, BufReader};
use tracing::{debug, error};

use super::{bootstrap, render_error, REPHRASE_MESSAGE};
use crate::domain::DomainError;

const HELP: &str = "Ask a question about the database, or use /history, /clear, /exit";

/// Arguments for the chat command
#[derive(Args, Clone, Debug)]
pub struct ChatArgs {
    /// Keep the cache in memory only for this session
    #[arg(long)]
    pub no_persist: bool,
}

/// Run the interactive chat loop until `/exit` or end of input
pub async fn run(args: ChatArgs) -> anyhow::Result<()> {
    let config = bootstrap();
    let assistant = crate::create_assistant(&config, !args.no_persist).await?;
    let mut session = ChatSession::new();

    println!("assistant: {}", GREETING);
    println!("({})", HELP);

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = match ReplCommand::parse(&line) {
            ReplCommand::Empty => continue,
            ReplCommand::Exit => break,
            ReplCommand::Help => {
                println!("{}", HELP);
                continue;
            }
            ReplCommand::History => {
                println!("{}", session.render_history());
                continue;
            }
            ReplCommand::Clear => {
                session.clear();
                println!("assistant: {}", GREETING);
                continue;
            }
            ReplCommand::Ask(question) => question,
        };

        session.push_user(question.as_str());

        match assistant.handle_turn(&question).await {
            Ok(reply) => {
                debug!("Reply source: {:?}", reply.source);
                println!("assistant: {}", reply.content);
                if let Some(e) = &reply.cache_error {
                    eprintln!("{}", render_error(e));
                }
                session.push_assistant(reply.content);
            }
            Err(e @ DomainError::OutputParsing { .. }) => {
                error!("Turn failed: {}", e);
                eprintln!("{}", render_error(&e));
                println!("assistant: {}", REPHRASE_MESSAGE);
                session.push_assistant(REPHRASE_MESSAGE);
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                eprintln!("{}", render_error(&e));
            }
        }
    }

    Ok(())
}
