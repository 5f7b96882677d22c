//! Executor backed by a DuckDB database file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime};
use duckdb::types::{TimeUnit, Value as DuckValue};
use serde_json::{Map, Value};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

use crate::error::{QueryCanvasError, Result};
use crate::executor::{ConnectionDescriptor, QueryExecutor, QueryResult, StatementKind};

/// Runs queries on the blocking pool against pooled DuckDB connections.
#[derive(Clone)]
pub struct DuckDbExecutor {
    database_path: PathBuf,
    limiter: Arc<Semaphore>,
    pool: Arc<Mutex<Vec<duckdb::Connection>>>,
}

impl DuckDbExecutor {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        tracing::info!(path = %path.display(), max_concurrency = 4, "creating DuckDB executor");
        Self {
            database_path: path,
            limiter: Arc::new(Semaphore::new(4)),
            pool: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_max_concurrency(mut self, max_in_flight: usize) -> Self {
        self.limiter = Arc::new(Semaphore::new(max_in_flight.max(1)));
        self
    }

    async fn acquire_slot(&self) -> Result<SemaphorePermit<'_>> {
        self.limiter
            .acquire()
            .await
            .map_err(|e| QueryCanvasError::Execution(format!("limiter closed: {e}")))
    }

    async fn checkout_connection(&self) -> Result<duckdb::Connection> {
        if let Some(conn) = self.pool.lock().await.pop() {
            return Ok(conn);
        }
        tracing::debug!(path = %self.database_path.display(), "opening DuckDB connection");
        duckdb::Connection::open(&self.database_path)
            .map_err(|e| QueryCanvasError::Execution(format!("open duckdb: {e}")))
    }
}

#[async_trait]
impl QueryExecutor for DuckDbExecutor {
    fn name(&self) -> &'static str {
        "duckdb"
    }

    async fn execute(&self, sql: &str, connection: &ConnectionDescriptor) -> Result<QueryResult> {
        let sql = sql.to_string();
        let kind = StatementKind::of(&sql);
        let _permit = self.acquire_slot().await?;
        let conn = self.checkout_connection().await?;
        tracing::debug!(connection = %connection.name, kind = ?kind, "duckdb execute");

        let outcome = tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let result = run_statement(&conn, &sql, kind).map(|mut result| {
                result.execution_time = start.elapsed().as_millis() as u64;
                result
            });
            (result, conn)
        })
        .await
        .map_err(|e| QueryCanvasError::Execution(format!("task join error: {e}")))?;

        let (result, conn) = outcome;
        self.pool.lock().await.push(conn);
        result
    }
}

fn run_statement(conn: &duckdb::Connection, sql: &str, kind: StatementKind) -> Result<QueryResult> {
    if kind == StatementKind::Modify {
        let affected = conn.execute(sql, [])?;
        return Ok(QueryResult {
            row_count: affected,
            ..QueryResult::default()
        });
    }

    let mut stmt = conn.prepare(sql)?;
    let mut rows_iter = stmt.query([])?;
    let stmt_ref = rows_iter
        .as_ref()
        .ok_or_else(|| QueryCanvasError::Execution("statement missing".to_string()))?;
    let columns: Vec<String> = (0..stmt_ref.column_count())
        .map(|idx| {
            stmt_ref
                .column_name(idx)
                .map(|name| name.to_string())
                .map_err(|e| QueryCanvasError::Execution(e.to_string()))
        })
        .collect::<Result<_>>()?;

    let mut rows = Vec::new();
    while let Some(row) = rows_iter.next()? {
        let mut map = Map::new();
        for (idx, name) in columns.iter().enumerate() {
            map.insert(name.clone(), duck_value_to_json(row.get_ref(idx)?.to_owned()));
        }
        rows.push(map);
    }
    Ok(QueryResult::from_rows(columns, rows))
}

fn duck_value_to_json(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::from(i),
        DuckValue::SmallInt(i) => Value::from(i),
        DuckValue::Int(i) => Value::from(i),
        DuckValue::BigInt(i) => Value::from(i),
        DuckValue::UTinyInt(i) => Value::from(i),
        DuckValue::USmallInt(i) => Value::from(i),
        DuckValue::UInt(i) => Value::from(i),
        DuckValue::UBigInt(i) => Value::from(i),
        DuckValue::Float(f) => Value::from(f),
        DuckValue::Double(f) => Value::from(f),
        DuckValue::HugeInt(i) => Value::String(i.to_string()),
        DuckValue::Decimal(d) => Value::String(d.to_string()),
        DuckValue::Text(s) | DuckValue::Enum(s) => Value::String(s),
        DuckValue::Blob(bytes) => Value::String(hex::encode(bytes)),
        DuckValue::Date32(days) => date_to_json(days),
        DuckValue::Timestamp(unit, t) => timestamp_to_json(unit, t),
        DuckValue::Time64(unit, t) => time_to_json(unit, t),
        DuckValue::Interval {
            months,
            days,
            nanos,
        } => Value::String(format!("{months} months {days} days {nanos} nanos")),
        DuckValue::List(items) | DuckValue::Array(items) => {
            Value::Array(items.into_iter().map(duck_value_to_json).collect())
        }
        DuckValue::Struct(fields) => Value::Object(
            fields
                .iter()
                .map(|(key, val)| (key.clone(), duck_value_to_json(val.clone())))
                .collect(),
        ),
        DuckValue::Map(entries) => Value::Array(
            entries
                .iter()
                .map(|(k, v)| {
                    Value::Array(vec![
                        duck_value_to_json(k.clone()),
                        duck_value_to_json(v.clone()),
                    ])
                })
                .collect(),
        ),
        DuckValue::Union(inner) => duck_value_to_json(*inner),
    }
}

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn to_micros(unit: TimeUnit, value: i64) -> i64 {
    match unit {
        TimeUnit::Second => value.saturating_mul(1_000_000),
        TimeUnit::Millisecond => value.saturating_mul(1_000),
        TimeUnit::Microsecond => value,
        TimeUnit::Nanosecond => value / 1_000,
    }
}

/// ISO-8601 date; out-of-range day counts fall back to the raw number.
fn date_to_json(days: i32) -> Value {
    days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
        .unwrap_or_else(|| Value::from(days))
}

fn timestamp_to_json(unit: TimeUnit, value: i64) -> Value {
    DateTime::from_timestamp_micros(to_micros(unit, value))
        .map(|ts| Value::String(ts.naive_utc().format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
        .unwrap_or_else(|| Value::from(value))
}

fn time_to_json(unit: TimeUnit, value: i64) -> Value {
    let micros = to_micros(unit, value);
    u32::try_from(micros.div_euclid(1_000_000))
        .ok()
        .and_then(|secs| {
            let nanos = (micros.rem_euclid(1_000_000) * 1_000) as u32;
            NaiveTime::from_num_seconds_from_midnight_opt(secs, nanos)
        })
        .map(|time| Value::String(time.format("%H:%M:%S%.f").to_string()))
        .unwrap_or_else(|| Value::from(value))
}
