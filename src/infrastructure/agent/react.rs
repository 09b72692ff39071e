//! Zero-shot ReAct agent over the SQL tools
//!
//! The model is prompted to alternate `Thought` / `Action` / `Action Input`
//! lines; generation stops before it can invent an `Observation`, the chosen
//! tool runs, and its output is appended to the scratchpad for the next call.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::domain::agent::{
    check_action, ActionHook, AgentAction, AgentFinish, AgentRuntime, HookDecision, Tool,
    TurnOutcome,
};
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::semantic_cache::{format_query_trace, QUERY_TOOL_NAME};
use crate::domain::DomainError;

const FINAL_ANSWER: &str = "Final Answer:";

const PREFIX: &str = "You are an agent designed to interact with a SQL database.
Given an input question, create a syntactically correct {dialect} query to run, then look at the results of the query and return the answer.
Unless the user specifies a specific number of examples they wish to obtain, always limit your query to at most {top_k} results.
You can order the results by a relevant column to return the most interesting examples in the database.
Never query for all the columns from a specific table, only ask for the relevant columns given the question.
You have access to tools for interacting with the database.
Only use the below tools. Only use the information returned by the below tools to construct your final answer.
You MUST double check your query before executing it. If you get an error while executing a query, rewrite the query and try again.

DO NOT make any DML statements (INSERT, UPDATE, DELETE, DROP etc.) to the database.

If the question does not seem related to the database, just return \"I don't know\" as the answer.";

const FORMAT_INSTRUCTIONS: &str = "Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question";

const SUFFIX: &str = "Begin!

Question: {input}
Thought: I should look at the tables in the database to see what I can query.  Then I should query the schema of the most relevant tables.
";

const MISSING_ACTION: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
const MISSING_ACTION_INPUT: &str = "Invalid Format: Missing 'Action Input:' after 'Action:'";
const ANSWER_AND_ACTION: &str =
    "Invalid Format: Output contains both a final answer and an action, choose one";

static ACTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("action pattern is valid")
});

static ACTION_ONLY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").expect("action pattern is valid"));

/// One parsed model completion
#[derive(Debug, Clone, PartialEq)]
enum Step {
    Action { tool: String, input: String },
    Finish(String),
}

/// Parse a completion; the error is the observation fed back to the model
fn parse_step(text: &str) -> Result<Step, &'static str> {
    let has_answer = text.contains(FINAL_ANSWER);

    if let Some(captures) = ACTION.captures(text) {
        if has_answer {
            return Err(ANSWER_AND_ACTION);
        }

        let tool = captures.get(1).map_or("", |m| m.as_str()).trim();
        let input = captures
            .get(2)
            .map_or("", |m| m.as_str())
            .trim()
            .trim_matches('"');

        return Ok(Step::Action {
            tool: tool.to_string(),
            input: input.to_string(),
        });
    }

    if has_answer {
        let answer = text.rsplit(FINAL_ANSWER).next().unwrap_or_default().trim();
        return Ok(Step::Finish(answer.to_string()));
    }

    if ACTION_ONLY.is_match(text) {
        Err(MISSING_ACTION_INPUT)
    } else {
        Err(MISSING_ACTION)
    }
}

/// ReAct runtime that answers questions with SQL tools
pub struct ReactSqlAgent {
    llm: Arc<dyn LlmProvider>,
    model: String,
    dialect: String,
    tools: Vec<Arc<dyn Tool>>,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: usize,
    handle_parsing_errors: bool,
    top_k: usize,
}

impl fmt::Debug for ReactSqlAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactSqlAgent")
            .field("provider", &self.llm.provider_name())
            .field("model", &self.model)
            .field("tools", &self.tool_names())
            .field("max_iterations", &self.max_iterations)
            .field("handle_parsing_errors", &self.handle_parsing_errors)
            .finish_non_exhaustive()
    }
}

impl ReactSqlAgent {
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        dialect: impl Into<String>,
        tools: Vec<Arc<dyn Tool>>,
    ) -> Self {
        Self {
            llm,
            model: model.into(),
            dialect: dialect.into(),
            tools,
            temperature: 0.0,
            max_tokens: None,
            max_iterations: 15,
            handle_parsing_errors: true,
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

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    /// When off, unparseable model output fails the turn
    pub fn with_handle_parsing_errors(mut self, handle: bool) -> Self {
        self.handle_parsing_errors = handle;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name()).collect()
    }

    fn find_tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|tool| tool.name() == name)
    }

    fn render_prompt(&self, question: &str, scratchpad: &str) -> String {
        let tool_lines = self
            .tools
            .iter()
            .map(|tool| format!("{}: {}", tool.name(), tool.description()))
            .collect::<Vec<_>>()
            .join("\n");

        let prefix = PREFIX
            .replace("{dialect}", &self.dialect)
            .replace("{top_k}", &self.top_k.to_string());
        let instructions = FORMAT_INSTRUCTIONS.replace("{tool_names}", &self.tool_names().join(", "));
        let suffix = SUFFIX.replace("{input}", question);

        format!(
            "{}\n\n{}\n\n{}\n\n{}{}",
            prefix, tool_lines, instructions, suffix, scratchpad
        )
    }

    fn request(&self, prompt: String) -> LlmRequest {
        let mut builder = LlmRequest::builder()
            .user(prompt)
            .temperature(self.temperature)
            .stop("\nObservation:")
            .stop("\n\tObservation:");

        if let Some(max_tokens) = self.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.build()
    }
}

#[async_trait]
impl AgentRuntime for ReactSqlAgent {
    async fn run_turn(
        &self,
        question: &str,
        hooks: &[Arc<dyn ActionHook>],
    ) -> Result<TurnOutcome, DomainError> {
        let mut scratchpad = String::new();
        let mut last_query: Option<String> = None;

        for iteration in 1..=self.max_iterations {
            let prompt = self.render_prompt(question, &scratchpad);
            let response = self.llm.chat(&self.model, self.request(prompt)).await?;
            let text = response.content().to_string();

            let step = match parse_step(&text) {
                Ok(step) => step,
                Err(observation) if self.handle_parsing_errors => {
                    warn!("Iteration {}: unparseable model output", iteration);
                    scratchpad.push_str(&format!(
                        "{}\nObservation: {}\nThought: ",
                        text, observation
                    ));
                    continue;
                }
                Err(observation) => {
                    return Err(DomainError::output_parsing(format!("{}: `{}`", observation, text)));
                }
            };

            let (tool, input) = match step {
                Step::Finish(answer) => {
                    debug!("Agent finished after {} iteration(s)", iteration);
                    let output = match last_query {
                        Some(sql) => format!("{}\n{}", answer, format_query_trace(&sql)),
                        None => answer,
                    };
                    scratchpad.push_str(&text);
                    return Ok(TurnOutcome::Completed(AgentFinish::new(output, scratchpad)));
                }
                Step::Action { tool, input } => (tool, input),
            };

            let action = AgentAction::new(tool, input, text);
            debug!("Iteration {}: action '{}'", iteration, action.tool);

            if let HookDecision::Intercept(interception) = check_action(hooks, &action).await? {
                return Ok(TurnOutcome::Intercepted {
                    action,
                    interception,
                });
            }

            let observation = match self.find_tool(&action.tool) {
                Some(tool) => {
                    let observation = tool.call(&action.tool_input).await?;
                    if tool.name() == QUERY_TOOL_NAME && !observation.starts_with("Error:") {
                        last_query = Some(action.tool_input.clone());
                    }
                    observation
                }
                None => format!(
                    "{} is not a valid tool, try one of [{}].",
                    action.tool,
                    self.tool_names().join(", ")
                ),
            };

            scratchpad.push_str(&format!(
                "{}\nObservation: {}\nThought: ",
                action.log, observation
            ));
        }

        Err(DomainError::agent(format!(
            "Agent stopped after {} iterations without a final answer",
            self.max_iterations
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::domain::llm::MockLlmProvider;
    use crate::infrastructure::agent::CacheInterceptionHook;
    use crate::infrastructure::semantic_cache::InMemoryCacheStore;
    use crate::infrastructure::services::CacheLookupService;

    /// Tool double that records every input it is called with
    #[derive(Default)]
    struct RecordingTool {
        name: &'static str,
        output: &'static str,
        calls: Mutex<Vec<String>>,
    }

    impl RecordingTool {
        fn new(name: &'static str, output: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                output,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Tool for RecordingTool {
        fn name(&self) -> &'static str {
            self.name
        }

        fn description(&self) -> &'static str {
            "test tool"
        }

        async fn call(&self, input: &str) -> Result<String, DomainError> {
            self.calls.lock().unwrap().push(input.to_string());
            Ok(self.output.to_string())
        }
    }

    fn agent(llm: Arc<MockLlmProvider>, tools: Vec<Arc<dyn Tool>>) -> ReactSqlAgent {
        ReactSqlAgent::new(llm, "llama3-8b-8192", "sqlite", tools)
    }

    #[test]
    fn test_parse_action() {
        let step = parse_step(
            "I need the count.\nAction: sql_db_query\nAction Input: \"SELECT COUNT(*) FROM employees\"\n",
        )
        .unwrap();

        assert_eq!(
            step,
            Step::Action {
                tool: "sql_db_query".to_string(),
                input: "SELECT COUNT(*) FROM employees".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_multiline_action_input() {
        let step = parse_step("Action: sql_db_query\nAction Input: SELECT Name\nFROM artists").unwrap();

        assert_eq!(
            step,
            Step::Action {
                tool: "sql_db_query".to_string(),
                input: "SELECT Name\nFROM artists".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_final_answer() {
        let step = parse_step("I now know the final answer\nFinal Answer: There are 8 employees.").unwrap();

        assert_eq!(step, Step::Finish("There are 8 employees.".to_string()));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_step("I am thinking"), Err(MISSING_ACTION));
        assert_eq!(parse_step("Action: sql_db_query"), Err(MISSING_ACTION_INPUT));
        assert_eq!(
            parse_step("Action: sql_db_query\nAction Input: SELECT 1\nFinal Answer: 1"),
            Err(ANSWER_AND_ACTION)
        );
    }

    #[tokio::test]
    async fn test_full_turn_appends_query_trace() {
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("Action: sql_db_list_tables\nAction Input: ")
                .with_response("Action: sql_db_query\nAction Input: SELECT COUNT(*) FROM employees")
                .with_response("I now know the final answer\nFinal Answer: There are 8 employees."),
        );
        let list = RecordingTool::new("sql_db_list_tables", "albums, employees");
        let query = RecordingTool::new("sql_db_query", "[(8,)]");
        let runtime = agent(llm.clone(), vec![list.clone(), query.clone()]);

        let outcome = runtime.run_turn("How many employees are there?", &[]).await.unwrap();

        let TurnOutcome::Completed(finish) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(
            finish.output,
            "There are 8 employees.\nsql_db_query: SELECT COUNT(*) FROM employees"
        );
        assert_eq!(query.calls(), vec!["SELECT COUNT(*) FROM employees"]);
        assert_eq!(list.calls(), vec![""]);

        let requests = llm.requests();
        assert_eq!(requests.len(), 3);
        let last_prompt = requests[2].messages[0].content_text();
        assert!(last_prompt.contains("Question: How many employees are there?"));
        assert!(last_prompt.contains("Observation: albums, employees"));
        assert!(last_prompt.contains("Observation: [(8,)]"));
        assert_eq!(
            requests[0].stop,
            Some(vec!["\nObservation:".to_string(), "\n\tObservation:".to_string()])
        );
    }

    #[tokio::test]
    async fn test_failed_query_is_not_traced() {
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("Action: sql_db_query\nAction Input: SELECT COUNT(*) FROM staff")
                .with_response("Final Answer: I could not count the staff."),
        );
        let query = RecordingTool::new("sql_db_query", "Error: no such table: staff");
        let runtime = agent(llm, vec![query.clone()]);

        let outcome = runtime.run_turn("How many staff?", &[]).await.unwrap();

        let TurnOutcome::Completed(finish) = outcome else {
            panic!("expected completion");
        };
        assert_eq!(finish.output, "I could not count the staff.");
        assert_eq!(query.calls(), vec!["SELECT COUNT(*) FROM staff"]);
    }

    #[tokio::test]
    async fn test_interception_stops_before_execution() {
        let store = InMemoryCacheStore::with_entries([(
            "How many employees are there?",
            "SELECT COUNT(*) FROM employees",
            "There are 8 employees.",
        )]);
        let hook: Arc<dyn ActionHook> = Arc::new(CacheInterceptionHook::new(
            CacheLookupService::new(Arc::new(store)),
            0.8,
        ));
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("Action: sql_db_query\nAction Input: SELECT COUNT(*) FROM employees;")
                .with_response("Final Answer: should never be requested"),
        );
        let query = RecordingTool::new("sql_db_query", "[(8,)]");
        let runtime = agent(llm.clone(), vec![query.clone()]);

        let outcome = runtime.run_turn("count the staff", &[hook]).await.unwrap();

        match outcome {
            TurnOutcome::Intercepted {
                action,
                interception,
            } => {
                assert_eq!(action.tool_input, "SELECT COUNT(*) FROM employees;");
                assert_eq!(interception.response, "There are 8 employees.");
            }
            TurnOutcome::Completed(_) => panic!("expected interception"),
        }
        assert!(query.calls().is_empty());
        assert_eq!(llm.call_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_observation() {
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("Action: run_python\nAction Input: print(1)")
                .with_response("Final Answer: I don't know"),
        );
        let runtime = agent(llm.clone(), vec![RecordingTool::new("sql_db_query", "")]);

        let outcome = runtime.run_turn("anything", &[]).await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Completed(AgentFinish::new(
                "I don't know",
                "Action: run_python\nAction Input: print(1)\nObservation: run_python is not a valid tool, try one of [sql_db_query].\nThought: Final Answer: I don't know",
            ))
        );
    }

    #[tokio::test]
    async fn test_parsing_error_is_fed_back() {
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("I should just answer")
                .with_response("Final Answer: 42"),
        );
        let runtime = agent(llm.clone(), vec![]);

        let outcome = runtime.run_turn("meaning of life", &[]).await.unwrap();

        assert!(matches!(outcome, TurnOutcome::Completed(ref finish) if finish.output == "42"));
        let second_prompt = llm.requests()[1].messages[0].content_text().to_string();
        assert!(second_prompt.contains(MISSING_ACTION));
    }

    #[tokio::test]
    async fn test_parsing_error_fails_when_not_handled() {
        let llm = Arc::new(MockLlmProvider::new("mock").with_response("no idea"));
        let runtime = agent(llm, vec![]).with_handle_parsing_errors(false);

        let err = runtime.run_turn("anything", &[]).await.unwrap_err();

        assert!(err.is_output_parsing());
    }

    #[tokio::test]
    async fn test_iteration_limit_is_an_error() {
        let llm = Arc::new(
            MockLlmProvider::new("mock")
                .with_response("Action: sql_db_list_tables\nAction Input: ")
                .with_response("Action: sql_db_list_tables\nAction Input: "),
        );
        let runtime = agent(llm.clone(), vec![RecordingTool::new("sql_db_list_tables", "albums")])
            .with_max_iterations(2);

        let err = runtime.run_turn("loop forever", &[]).await.unwrap_err();

        assert!(matches!(err, DomainError::Agent { .. }));
        assert_eq!(llm.call_count(), 2);
    }

    #[tokio::test]
    async fn test_provider_error_fails_turn() {
        let llm = Arc::new(MockLlmProvider::new("mock").with_error("rate limited"));
        let query = RecordingTool::new("sql_db_query", "[(1,)]");
        let runtime = agent(llm.clone(), vec![query.clone()]);

        let err = runtime.run_turn("anything", &[]).await.unwrap_err();

        assert!(matches!(err, DomainError::Provider { ref message, .. } if message == "rate limited"));
        assert_eq!(llm.call_count(), 1);
        assert!(query.calls().is_empty());
    }
}
