use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use crate::config::ExecutorConfig;
use crate::dialect::SqlDialect;
use crate::error::Result;
use crate::sql_text::{tokenize, TokenKind};

/// Rows returned by an execution, or the error it ended with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Map<String, Value>>,
    pub row_count: usize,
    /// Wall-clock milliseconds.
    pub execution_time: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueryResult {
    pub fn from_rows(columns: Vec<String>, rows: Vec<Map<String, Value>>) -> Self {
        Self {
            row_count: rows.len(),
            columns,
            rows,
            execution_time: 0,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, execution_time: u64) -> Self {
        Self {
            execution_time,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    Mysql,
    Postgresql,
    Sqlite,
    Mssql,
    Oracle,
    Mariadb,
    Duckdb,
    H2,
    Hsqldb,
    Firebird,
    Informix,
    Db2,
}

impl DatabaseType {
    /// Dialect used to render and explain queries for this database.
    pub fn sql_dialect(&self) -> SqlDialect {
        match self {
            DatabaseType::Mysql | DatabaseType::Mariadb => SqlDialect::MySql,
            DatabaseType::Postgresql | DatabaseType::Duckdb => SqlDialect::PostgreSql,
            DatabaseType::Sqlite => SqlDialect::Sqlite,
            DatabaseType::Mssql => SqlDialect::MsSql,
            DatabaseType::Oracle => SqlDialect::Oracle,
            _ => SqlDialect::Generic,
        }
    }
}

/// Where a query is sent. Opaque to the builder; executors interpret it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDescriptor {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub db_type: DatabaseType,
    pub connection_string: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ConnectionDescriptor {
    pub fn new(
        name: impl Into<String>,
        db_type: DatabaseType,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            db_type,
            connection_string: connection_string.into(),
            parameters: Map::new(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }
}

/// Coarse statement class, read from the first keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Modify,
    Other,
}

impl StatementKind {
    pub fn of(sql: &str) -> Self {
        let first = tokenize(sql).ok().and_then(|tokens| {
            tokens
                .into_iter()
                .find(|t| !t.is_comment())
                .filter(|t| t.kind == TokenKind::Word)
                .map(|t| t.text.to_ascii_uppercase())
        });
        match first.as_deref() {
            Some("SELECT" | "WITH") => StatementKind::Select,
            Some("INSERT" | "UPDATE" | "DELETE") => StatementKind::Modify,
            _ => StatementKind::Other,
        }
    }
}

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, sql: &str, connection: &ConnectionDescriptor) -> Result<QueryResult>;
}

/// Stand-in executor that fabricates plausible results after a delay.
pub struct SimulatedExecutor {
    min_latency_ms: u64,
    max_latency_ms: u64,
    rng: Mutex<StdRng>,
}

impl SimulatedExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self::with_rng(config, StdRng::from_entropy())
    }

    pub fn with_seed(config: &ExecutorConfig, seed: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: &ExecutorConfig, rng: StdRng) -> Self {
        Self {
            min_latency_ms: config.simulated_latency_min_ms,
            max_latency_ms: config.simulated_latency_max_ms.max(config.simulated_latency_min_ms),
            rng: Mutex::new(rng),
        }
    }

    /// Replace the configured latency bounds.
    pub fn with_latency(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.min_latency_ms = min_ms;
        self.max_latency_ms = max_ms.max(min_ms);
        self
    }

    fn draw(&self, kind: StatementKind) -> (u64, usize) {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        let delay = rng.gen_range(self.min_latency_ms..=self.max_latency_ms);
        let affected = match kind {
            StatementKind::Modify => rng.gen_range(1..=5),
            _ => 0,
        };
        (delay, affected)
    }
}

#[async_trait]
impl QueryExecutor for SimulatedExecutor {
    fn name(&self) -> &'static str {
        "simulated"
    }

    async fn execute(&self, sql: &str, connection: &ConnectionDescriptor) -> Result<QueryResult> {
        let start = Instant::now();
        let kind = StatementKind::of(sql);
        let (delay, affected) = self.draw(kind);
        tracing::debug!(
            connection = %connection.name,
            kind = ?kind,
            delay_ms = delay,
            "simulating query"
        );
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut result = match kind {
            StatementKind::Select => sample_rows(),
            StatementKind::Modify => QueryResult {
                row_count: affected,
                ..QueryResult::default()
            },
            StatementKind::Other => QueryResult::from_rows(
                vec!["result".to_string()],
                vec![row(json!({ "result": "Query executed successfully" }))],
            ),
        };
        result.execution_time = start.elapsed().as_millis() as u64;
        Ok(result)
    }
}

fn sample_rows() -> QueryResult {
    let rows = [
        (1, "John Doe", "john@example.com", "2024-01-15T10:30:00Z"),
        (2, "Jane Smith", "jane@example.com", "2024-01-16T14:22:00Z"),
        (3, "Bob Johnson", "bob@example.com", "2024-01-17T09:15:00Z"),
    ]
    .into_iter()
    .map(|(id, name, email, created_at)| {
        row(json!({ "id": id, "name": name, "email": email, "created_at": created_at }))
    })
    .collect();
    QueryResult::from_rows(
        ["id", "name", "email", "created_at"]
            .map(String::from)
            .to_vec(),
        rows,
    )
}

fn row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant() -> SimulatedExecutor {
        SimulatedExecutor::with_seed(&ExecutorConfig::default(), 42).with_latency(0, 0)
    }

    fn conn() -> ConnectionDescriptor {
        ConnectionDescriptor::new("local", DatabaseType::Postgresql, "postgres://localhost/app")
    }

    #[test]
    fn classifies_statements() {
        assert_eq!(StatementKind::of("  select 1"), StatementKind::Select);
        assert_eq!(StatementKind::of("-- hi\nWITH x AS (SELECT 1) SELECT * FROM x"), StatementKind::Select);
        assert_eq!(StatementKind::of("delete from t"), StatementKind::Modify);
        assert_eq!(StatementKind::of("CREATE TABLE t (a INT)"), StatementKind::Other);
        assert_eq!(StatementKind::of(""), StatementKind::Other);
    }

    #[tokio::test]
    async fn select_returns_sample_users() {
        let result = instant().execute("SELECT * FROM users", &conn()).await.unwrap();
        assert_eq!(result.columns, vec!["id", "name", "email", "created_at"]);
        assert_eq!(result.row_count, 3);
        assert_eq!(result.rows[1]["name"], "Jane Smith");
        assert_eq!(result.rows[2]["created_at"], "2024-01-17T09:15:00Z");
        // keys keep column order
        let keys: Vec<_> = result.rows[0].keys().cloned().collect();
        assert_eq!(keys, result.columns);
        assert!(result.is_success());
    }

    #[tokio::test]
    async fn modifications_report_affected_rows() {
        let result = instant().execute("UPDATE t SET a = 1", &conn()).await.unwrap();
        assert!(result.columns.is_empty());
        assert!(result.rows.is_empty());
        assert!((1..=5).contains(&result.row_count));
    }

    #[tokio::test]
    async fn other_statements_acknowledge() {
        let result = instant().execute("CREATE TABLE t (a INT)", &conn()).await.unwrap();
        assert_eq!(result.columns, vec!["result"]);
        assert_eq!(result.rows[0]["result"], "Query executed successfully");
        assert_eq!(result.row_count, 1);
    }

    #[tokio::test]
    async fn latency_is_applied() {
        let exec = SimulatedExecutor::with_seed(&ExecutorConfig::default(), 1).with_latency(20, 20);
        let result = exec.execute("SELECT 1", &conn()).await.unwrap();
        assert!(result.execution_time >= 20);
    }

    #[test]
    fn database_types_map_to_dialects() {
        assert_eq!(DatabaseType::Mariadb.sql_dialect(), SqlDialect::MySql);
        assert_eq!(DatabaseType::Mssql.sql_dialect(), SqlDialect::MsSql);
        assert_eq!(DatabaseType::Db2.sql_dialect(), SqlDialect::Generic);
        let json = serde_json::to_value(conn()).unwrap();
        assert_eq!(json["type"], "postgresql");
        assert!(json["connectionString"].is_string());
    }
}
