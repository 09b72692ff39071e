//! Read access to the database the assistant answers questions about

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use tracing::{info, warn};

use crate::config::DatabaseConfig;
use crate::domain::DomainError;

const INJECTION_WARNING: &str = "SQL agent can be vulnerable to prompt injection. \
    Use a DB role with limited permissions.";

/// SQLite database exposed to the agent
#[derive(Debug, Clone)]
pub struct SqlDatabase {
    pool: SqlitePool,
}

impl SqlDatabase {
    /// Open the configured database
    ///
    /// The bundled sample is opened read-only. Any other URI is used as-is
    /// and logs a prompt-injection warning.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DomainError> {
        let options = if config.is_sample() {
            info!("Opening sample database {} read-only", config.sample_path);
            SqliteConnectOptions::new()
                .filename(&config.sample_path)
                .read_only(true)
        } else {
            warn!("{}", INJECTION_WARNING);
            SqliteConnectOptions::from_str(&config.uri).map_err(|e| {
                DomainError::configuration(format!(
                    "Invalid database URI '{}': {}",
                    config.uri, e
                ))
            })?
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| DomainError::configuration(format!("Failed to open database: {}", e)))?;

        Ok(Self::from_pool(pool))
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn dialect(&self) -> &'static str {
        "sqlite"
    }

    /// User tables in name order
    pub async fn table_names(&self) -> Result<Vec<String>, DomainError> {
        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::agent(format!("Failed to list tables: {}", e)))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("name")
                    .map_err(|e| DomainError::agent(format!("Failed to read table name: {}", e)))
            })
            .collect()
    }

    /// `CREATE TABLE` statements plus a few sample rows per table
    ///
    /// `tables` of `None` describes every table. Unknown names are rejected.
    pub async fn table_info(
        &self,
        tables: Option<&[String]>,
        sample_rows: usize,
    ) -> Result<String, DomainError> {
        let known = self.table_names().await?;

        let selected: Vec<&String> = match tables {
            Some(requested) => {
                let missing: Vec<&str> = requested
                    .iter()
                    .filter(|name| !known.contains(name))
                    .map(String::as_str)
                    .collect();
                if !missing.is_empty() {
                    return Err(DomainError::validation(format!(
                        "table_names {{{}}} not found in database",
                        missing.join(", ")
                    )));
                }
                known.iter().filter(|name| requested.contains(name)).collect()
            }
            None => known.iter().collect(),
        };

        let mut sections = Vec::with_capacity(selected.len());
        for table in selected {
            let create: String = sqlx::query_scalar(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::agent(format!("Failed to read schema of {}: {}", table, e)))?;

            let mut section = create.trim().to_string();
            if sample_rows > 0 {
                section.push_str("\n\n");
                section.push_str(&self.sample(table, sample_rows).await?);
            }
            sections.push(section);
        }

        Ok(sections.join("\n\n"))
    }

    async fn sample(&self, table: &str, limit: usize) -> Result<String, DomainError> {
        let sql = format!("SELECT * FROM \"{}\" LIMIT {}", table.replace('"', "\"\""), limit);
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::agent(format!("Failed to sample {}: {}", table, e)))?;

        let header = rows
            .first()
            .map(|row| {
                row.columns()
                    .iter()
                    .map(|column| column.name().to_string())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .unwrap_or_default();

        let body = rows
            .iter()
            .map(|row| {
                (0..row.len())
                    .map(|index| render_value(row, index, false))
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(format!(
            "/*\n{} rows from {} table:\n{}\n{}\n*/",
            limit, table, header, body
        ))
    }

    /// Execute `sql` and render the rows as tuples
    ///
    /// A statement returning no rows renders as an empty string.
    pub async fn try_run(&self, sql: &str) -> Result<String, DomainError> {
        let rows = sqlx::query(sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::agent(e.to_string()))?;

        if rows.is_empty() {
            return Ok(String::new());
        }

        let tuples = rows
            .iter()
            .map(|row| {
                let values: Vec<String> =
                    (0..row.len()).map(|index| render_value(row, index, true)).collect();
                match values.len() {
                    1 => format!("({},)", values[0]),
                    _ => format!("({})", values.join(", ")),
                }
            })
            .collect::<Vec<_>>()
            .join(", ");

        Ok(format!("[{}]", tuples))
    }

    /// Like [`Self::try_run`], but failures become `Error: ...` text the agent can read
    pub async fn run(&self, sql: &str) -> String {
        match self.try_run(sql).await {
            Ok(result) => result,
            Err(DomainError::Agent { message }) => format!("Error: {}", message),
            Err(e) => format!("Error: {}", e),
        }
    }
}

fn render_value(row: &SqliteRow, index: usize, quote_text: bool) -> String {
    let kind = match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return "None".to_string(),
        Ok(raw) => raw.type_info().name().to_string(),
        Err(_) => return "None".to_string(),
    };

    let rendered = match kind.as_str() {
        "INTEGER" | "BOOLEAN" => row.try_get::<i64, _>(index).map(|v| v.to_string()),
        "REAL" => row.try_get::<f64, _>(index).map(|v| v.to_string()),
        "BLOB" => row
            .try_get::<Vec<u8>, _>(index)
            .map(|v| format!("<{} bytes>", v.len())),
        _ => row.try_get::<String, _>(index).map(|v| {
            if quote_text {
                format!("'{}'", v.replace('\'', "\\'"))
            } else {
                v
            }
        }),
    };

    rendered.unwrap_or_else(|_| "None".to_string())
}
