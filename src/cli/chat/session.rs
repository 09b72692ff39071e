use crate::domain::llm::{Message, MessageRole};

/// Greeting that opens every conversation
pub const GREETING: &str = "How can I help you?";

/// One line of user input, interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Clear,
    History,
    Help,
    Exit,
    Empty,
}

impl ReplCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();

        match line {
            "" => Self::Empty,
            "/exit" | "/quit" => Self::Exit,
            "/clear" => Self::Clear,
            "/history" => Self::History,
            "/help" => Self::Help,
            question => Self::Ask(question.to_string()),
        }
    }
}

/// Message history of the running session
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<Message>,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![Message::assistant(GREETING)],
        }
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(Message::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(Message::assistant(content));
    }

    /// Forget everything but the greeting
    pub fn clear(&mut self) {
        self.messages.truncate(1);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn render_history(&self) -> String {
        self.messages
            .iter()
            .map(|message| {
                let speaker = match message.role {
                    MessageRole::User => "you",
                    MessageRole::Assistant | MessageRole::System => "assistant",
                };
                format!("{}: {}", speaker, message.content_text())
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
