//! SQL tools offered to the ReAct agent

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::agent::Tool;
use crate::domain::llm::{LlmProvider, LlmRequest};
use crate::domain::semantic_cache::QUERY_TOOL_NAME;
use crate::domain::DomainError;

use super::SqlDatabase;

const SCHEMA_SAMPLE_ROWS: usize = 3;

const QUERY_CHECKER_PROMPT: &str = "{query}
Double check the {dialect} query above for common mistakes, including:
- Using NOT IN with NULL values
- Using UNION when UNION ALL should have been used
- Using BETWEEN for exclusive ranges
- Data type mismatch in predicates
- Properly quoting identifiers
- Using the correct number of arguments for functions
- Casting to the correct data type
- Using the proper columns for joins

If there are any of the above mistakes, rewrite the query. If there are no mistakes, just reproduce the original query.

Output the final SQL query only.

SQL Query: ";

/// Builds the tool set for one database
#[derive(Debug, Clone)]
pub struct SqlToolkit {
    db: SqlDatabase,
    checker: Option<(Arc<dyn LlmProvider>, String)>,
}

impl SqlToolkit {
    pub fn new(db: SqlDatabase) -> Self {
        Self { db, checker: None }
    }

    /// Also offer `sql_db_query_checker`, backed by the given model
    pub fn with_query_checker(mut self, llm: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        self.checker = Some((llm, model.into()));
        self
    }

    pub fn tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut tools: Vec<Arc<dyn Tool>> = vec![
            Arc::new(QuerySqlDatabaseTool {
                db: self.db.clone(),
            }),
            Arc::new(InfoSqlDatabaseTool {
                db: self.db.clone(),
            }),
            Arc::new(ListSqlDatabaseTool {
                db: self.db.clone(),
            }),
        ];

        if let Some((llm, model)) = &self.checker {
            tools.push(Arc::new(QuerySqlCheckerTool {
                db: self.db.clone(),
                llm: llm.clone(),
                model: model.clone(),
            }));
        }

        tools
    }
}

/// Executes a statement and returns its rows or an error text
pub struct QuerySqlDatabaseTool {
    db: SqlDatabase,
}

#[async_trait]
impl Tool for QuerySqlDatabaseTool {
    fn name(&self) -> &'static str {
        QUERY_TOOL_NAME
    }

    fn description(&self) -> &'static str {
        "Input to this tool is a detailed and correct SQL query, output is a result from the database. \
         If the query is not correct, an error message will be returned. If an error is returned, \
         rewrite the query, check the query, and try again. If you encounter an issue with Unknown \
         column 'xxxx' in 'field list', use sql_db_schema to query the correct table fields."
    }

    async fn call(&self, input: &str) -> Result<String, DomainError> {
        Ok(self.db.run(input.trim()).await)
    }
}

/// Describes a comma-separated list of tables
pub struct InfoSqlDatabaseTool {
    db: SqlDatabase,
}

#[async_trait]
impl Tool for InfoSqlDatabaseTool {
    fn name(&self) -> &'static str {
        "sql_db_schema"
    }

    fn description(&self) -> &'static str {
        "Input to this tool is a comma-separated list of tables, output is the schema and sample rows \
         for those tables. Be sure that the tables actually exist by calling sql_db_list_tables first! \
         Example Input: table1, table2, table3"
    }

    async fn call(&self, input: &str) -> Result<String, DomainError> {
        let tables: Vec<String> = input
            .split(',')
            .map(|name| name.trim().trim_matches(|c| c == '"' || c == '\'' || c == '`'))
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect();

        match self.db.table_info(Some(&tables), SCHEMA_SAMPLE_ROWS).await {
            Ok(info) => Ok(info),
            Err(e) => Ok(format!("Error: {}", e)),
        }
    }
}

/// Lists every table in the database
pub struct ListSqlDatabaseTool {
    db: SqlDatabase,
}

#[async_trait]
impl Tool for ListSqlDatabaseTool {
    fn name(&self) -> &'static str {
        "sql_db_list_tables"
    }

    fn description(&self) -> &'static str {
        "Input is an empty string, output is a comma-separated list of tables in the database."
    }

    async fn call(&self, _input: &str) -> Result<String, DomainError> {
        Ok(self.db.table_names().await?.join(", "))
    }
}

/// Asks the model to review a statement before it is executed
pub struct QuerySqlCheckerTool {
    db: SqlDatabase,
    llm: Arc<dyn LlmProvider>,
    model: String,
}

#[async_trait]
impl Tool for QuerySqlCheckerTool {
    fn name(&self) -> &'static str {
        "sql_db_query_checker"
    }

    fn description(&self) -> &'static str {
        "Use this tool to double check if your query is correct before executing it. \
         Always use this tool before executing a query with sql_db_query!"
    }

    async fn call(&self, input: &str) -> Result<String, DomainError> {
        let prompt = QUERY_CHECKER_PROMPT
            .replace("{query}", input.trim())
            .replace("{dialect}", self.db.dialect());

        let request = LlmRequest::builder()
            .user(prompt)
            .temperature(0.0)
            .build();

        let response = self.llm.chat(&self.model, request).await?;

        Ok(response.content().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::llm::MockLlmProvider;
    use crate::infrastructure::sql::chinook_subset;

    fn tool<'a>(tools: &'a [Arc<dyn Tool>], name: &str) -> &'a Arc<dyn Tool> {
        tools.iter().find(|tool| tool.name() == name).unwrap()
    }

    #[tokio::test]
    async fn test_default_toolkit() {
        let toolkit = SqlToolkit::new(chinook_subset().await);
        let tools = toolkit.tools();

        let names: Vec<&str> = tools.iter().map(|tool| tool.name()).collect();
        assert_eq!(names, vec!["sql_db_query", "sql_db_schema", "sql_db_list_tables"]);
    }

    #[tokio::test]
    async fn test_list_and_query() {
        let tools = SqlToolkit::new(chinook_subset().await).tools();

        let tables = tool(&tools, "sql_db_list_tables").call("").await.unwrap();
        assert_eq!(tables, "albums, employees");

        let rows = tool(&tools, "sql_db_query")
            .call("SELECT COUNT(*) FROM albums\n")
            .await
            .unwrap();
        assert_eq!(rows, "[(2,)]");
    }

    #[tokio::test]
    async fn test_schema_tool_accepts_quoted_names() {
        let tools = SqlToolkit::new(chinook_subset().await).tools();

        let info = tool(&tools, "sql_db_schema")
            .call("\"employees\", albums")
            .await
            .unwrap();

        assert!(info.contains("CREATE TABLE albums"));
        assert!(info.contains("CREATE TABLE employees"));

        let missing = tool(&tools, "sql_db_schema").call("tracks").await.unwrap();
        assert!(missing.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_query_checker_uses_model() {
        let llm = Arc::new(MockLlmProvider::new("mock").with_response("SELECT COUNT(*) FROM albums;\n"));
        let tools = SqlToolkit::new(chinook_subset().await)
            .with_query_checker(llm.clone(), "llama3-8b-8192")
            .tools();

        let checked = tool(&tools, "sql_db_query_checker")
            .call("SELECT COUNT(*) FROM albums")
            .await
            .unwrap();

        assert_eq!(checked, "SELECT COUNT(*) FROM albums;");
        let prompt = llm.requests()[0].messages[0].content_text().to_string();
        assert!(prompt.starts_with("SELECT COUNT(*) FROM albums\nDouble check the sqlite query"));
    }
}
