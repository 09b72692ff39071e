//! Fixed write-query, execute-query, generate-answer runtime

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::domain::agent::{
    check_action, ActionHook, AgentAction, AgentFinish, AgentRuntime, HookDecision, TurnOutcome,
};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::semantic_cache::{format_query_trace, QUERY_TOOL_NAME};
use crate::domain::DomainError;
use crate::infrastructure::sql::SqlDatabase;

const WRITE_QUERY_PROMPT: &str = "Given an input question, create a syntactically correct {dialect} query to run to help find the answer. Unless the user specifies in his question a specific number of examples they wish to obtain, always limit your query to at most {top_k} results. You can order the results by a relevant column to return the most interesting examples in the database.

Never query for all the columns from a specific table, only ask for a the few relevant columns given the question.

Pay attention to use only the column names that you can see in the schema description. Be careful to not query for columns that do not exist. Also, pay attention to which column is in which table.

Only use the following tables:
{table_info}

Respond with the SQL query only, without explanation or formatting.";

const ANSWER_PROMPT: &str = "Given the following user question, corresponding SQL query, and SQL result, answer the user question.

Question: {question}
SQL Query: {query}
SQL Result: {result}";

const SCHEMA_SAMPLE_ROWS: usize = 3;

/// Runs every question through the same three model/database steps
///
/// The generated statement is offered to the hooks as a `sql_db_query`
/// action before it touches the database.
#[derive(Debug)]
pub struct QueryPipeline {
    llm: Arc<dyn LlmProvider>,
    model: String,
    db: SqlDatabase,
    temperature: f32,
    max_tokens: Option<u32>,
    top_k: usize,
}

impl QueryPipeline {
    pub fn new(llm: Arc<dyn LlmProvider>, model: impl Into<String>, db: SqlDatabase) -> Self {
        Self {
            llm,
            model: model.into(),
            db,
            temperature: 0.0,
            max_tokens: None,
            top_k: 10,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    async fn complete(&self, system: Option<String>, user: String) -> Result<String, DomainError> {
        let mut builder = LlmRequest::builder().temperature(self.temperature);
        if let Some(system) = system {
            builder = builder.system(system);
        }
        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        let response = self.llm.chat(&self.model, builder.user(user).build()).await?;

        Ok(response.content().to_string())
    }

    async fn write_query(&self, question: &str) -> Result<(String, String), DomainError> {
        let table_info = self.db.table_info(None, SCHEMA_SAMPLE_ROWS).await?;
        let system = WRITE_QUERY_PROMPT
            .replace("{dialect}", self.db.dialect())
            .replace("{top_k}", &self.top_k.to_string())
            .replace("{table_info}", &table_info);

        let raw = self
            .complete(Some(system), format!("Question: {}", question))
            .await?;
        let query = strip_code_fence(&raw);

        if query.is_empty() {
            return Err(DomainError::output_parsing("model returned an empty SQL query"));
        }

        Ok((query, raw))
    }

    async fn generate_answer(
        &self,
        question: &str,
        query: &str,
        result: &str,
    ) -> Result<String, DomainError> {
        let prompt = ANSWER_PROMPT
            .replace("{question}", question)
            .replace("{query}", query)
            .replace("{result}", result);

        Ok(self.complete(None, prompt).await?.trim().to_string())
    }
}

/// Remove a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };

    let body = body.strip_suffix("```").unwrap_or(body);
    let body = match body.find('\n') {
        Some(newline) if !body[..newline].trim().contains(' ') => &body[newline + 1..],
        _ => body,
    };

    body.trim().to_string()
}

#[async_trait]
impl AgentRuntime for QueryPipeline {
    async fn run_turn(
        &self,
        question: &str,
        hooks: &[Arc<dyn ActionHook>],
    ) -> Result<TurnOutcome, DomainError> {
        let (query, raw) = self.write_query(question).await?;
        debug!("Generated query: {}", query);

        let action = AgentAction::new(QUERY_TOOL_NAME, query.clone(), raw);
        if let HookDecision::Intercept(interception) = check_action(hooks, &action).await? {
            return Ok(TurnOutcome::Intercepted {
                action,
                interception,
            });
        }

        let result = self.db.run(&query).await;
        let answer = self.generate_answer(question, &query, &result).await?;

        let output = if result.starts_with("Error:") {
            answer.clone()
        } else {
            format!("{}\n{}", answer, format_query_trace(&query))
        };
        let log = format!(
            "{}\nSQL Result: {}\nAnswer: {}",
            format_query_trace(&query),
            result,
            answer
        );

        Ok(TurnOutcome::Completed(AgentFinish::new(output, log)))
    }
}
