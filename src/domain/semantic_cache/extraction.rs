//! Best-effort recovery of the executed SQL from an agent's answer text

use once_cell::sync::Lazy;
use regex::Regex;

/// Name of the tool that executes SQL against the database
pub const QUERY_TOOL_NAME: &str = "sql_db_query";

static QUERY_TRACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"sql_db_query:\s*(.*)").expect("query trace pattern is valid")
});

/// Extract the statement following the first `sql_db_query:` marker.
///
/// Only the remainder of that line is taken. Returns an empty string when
/// the marker is absent.
pub fn extract_sql_query(text: &str) -> String {
    QUERY_TRACE
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|statement| statement.as_str().trim().to_string())
        .unwrap_or_default()
}

/// Render the trace line that [`extract_sql_query`] recognises
pub fn format_query_trace(sql: &str) -> String {
    format!("{}: {}", QUERY_TOOL_NAME, sql.split_whitespace().collect::<Vec<_>>().join(" "))
}
