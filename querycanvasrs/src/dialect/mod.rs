//! SQL dialect abstractions for the databases the builder targets.
//!
//! Each dialect is implemented in its own file. The renderer walks the query;
//! a dialect only maps identifiers, row limits and EXPLAIN to SQL fragments.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::QueryCanvasError;

mod generic;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod sqlite;

pub use generic::GenericDialect;
pub use mssql::MsSqlDialect;
pub use mysql::MySqlDialect;
pub use oracle::OracleDialect;
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

pub trait Dialect {
    fn name(&self) -> &'static str;

    fn quote_ident(&self, ident: &str) -> String;

    /// Quote a possibly qualified name (`schema.table.column`) part by part.
    /// `*` and parts the caller already quoted pass through.
    fn quote_path(&self, path: &str) -> String {
        path.split('.')
            .map(|part| {
                if part == "*" || is_quoted(part) {
                    part.to_string()
                } else {
                    self.quote_ident(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Text placed right after `SELECT`, for dialects that limit rows there.
    fn select_prefix(&self, _limit: Option<u64>, _offset: Option<u64>) -> Option<String> {
        None
    }

    /// Trailing row-limiting clause.
    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(limit), Some(offset)) if offset > 0 => {
                Some(format!("LIMIT {limit} OFFSET {offset}"))
            }
            (Some(limit), _) => Some(format!("LIMIT {limit}")),
            (None, Some(offset)) if offset > 0 => Some(format!("OFFSET {offset}")),
            _ => None,
        }
    }

    /// Statement prefix asking the database for a plan.
    fn explain_prefix(&self) -> &'static str {
        "EXPLAIN "
    }

    /// Grammar used for parser-backed validation.
    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect>;
}

pub(crate) fn is_quoted(part: &str) -> bool {
    let bytes = part.as_bytes();
    if bytes.len() < 2 {
        return false;
    }
    matches!(
        (bytes[0], bytes[bytes.len() - 1]),
        (b'"', b'"') | (b'`', b'`') | (b'[', b']')
    )
}

/// Dialects known to the builder, as stored in configuration and snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialect {
    #[default]
    Generic,
    #[serde(rename = "postgresql")]
    PostgreSql,
    #[serde(rename = "mysql")]
    MySql,
    Sqlite,
    #[serde(rename = "mssql")]
    MsSql,
    Oracle,
}

impl SqlDialect {
    pub fn dialect(&self) -> &'static (dyn Dialect + Send + Sync) {
        match self {
            SqlDialect::Generic => &GenericDialect,
            SqlDialect::PostgreSql => &PostgresDialect,
            SqlDialect::MySql => &MySqlDialect,
            SqlDialect::Sqlite => &SqliteDialect,
            SqlDialect::MsSql => &MsSqlDialect,
            SqlDialect::Oracle => &OracleDialect,
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.dialect().name()
    }
}

impl fmt::Display for SqlDialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SqlDialect {
    type Err = QueryCanvasError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "sql" | "ansi" => Ok(SqlDialect::Generic),
            "postgresql" | "postgres" | "pg" => Ok(SqlDialect::PostgreSql),
            "mysql" | "mariadb" => Ok(SqlDialect::MySql),
            "sqlite" => Ok(SqlDialect::Sqlite),
            "mssql" | "tsql" | "sqlserver" => Ok(SqlDialect::MsSql),
            "oracle" | "plsql" => Ok(SqlDialect::Oracle),
            other => Err(QueryCanvasError::Validation(format!(
                "unknown sql dialect {other}"
            ))),
        }
    }
}
