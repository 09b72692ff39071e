use serde::{Deserialize, Serialize};

use crate::domain::semantic_cache::QUERY_TOOL_NAME;

/// Tools whose input is a SQL statement
const SQL_TOOLS: [&str; 2] = [QUERY_TOOL_NAME, "sql_db_query_checker"];

/// A tool invocation the agent proposes to execute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: String,
    /// Raw model text that produced the action
    pub log: String,
}

impl AgentAction {
    pub fn new(
        tool: impl Into<String>,
        tool_input: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.into(),
            tool_input: tool_input.into(),
            log: log.into(),
        }
    }

    /// The SQL this action would run, if it is a non-empty SQL tool call
    pub fn sql_payload(&self) -> Option<&str> {
        if !SQL_TOOLS.contains(&self.tool.as_str()) {
            return None;
        }

        let sql = self.tool_input.trim();
        (!sql.is_empty()).then_some(sql)
    }
}

/// The agent's final answer for a turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFinish {
    pub output: String,
    /// Full reasoning trace of the turn
    pub log: String,
}

impl AgentFinish {
    pub fn new(output: impl Into<String>, log: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            log: log.into(),
        }
    }
}
