//! Database access and the SQL tools built on it

mod database;
mod tools;

pub use database::SqlDatabase;
pub use tools::{
    InfoSqlDatabaseTool, ListSqlDatabaseTool, QuerySqlCheckerTool, QuerySqlDatabaseTool,
    SqlToolkit,
};

#[cfg(test)]
pub(crate) use database::tests::chinook_subset;
