//! A single editing session: the canvas editors plus query-level settings,
//! and the runner that executes generated SQL.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use uuid::Uuid;

use crate::catalog::SchemaCatalog;
use crate::conditions::WhereConditionList;
use crate::config::{ExecutorConfig, QueryCanvasConfig};
use crate::dialect::SqlDialect;
use crate::error::{QueryCanvasError, Result};
use crate::executor::{ConnectionDescriptor, QueryExecutor, QueryResult};
use crate::explain::{explain_sql, readable_explanation};
use crate::history::{QueryHistory, QueryHistoryEntry};
use crate::ids::{random_ids, IdGenerator};
use crate::joins::JoinGraph;
use crate::models::{OrderByColumn, QueryJoin, SelectedColumn, VisualQuery};
use crate::registry::QueryTableRegistry;
use crate::render::render_query;
use crate::sql_text::tokenize;

const EMPTY_SQL: &str = "-- Add tables to start building your query";
const EMPTY_EXPLANATION: &str = "Add tables from the schema panel to start building your query.";

pub struct QuerySession {
    name: String,
    dialect: SqlDialect,
    registry: QueryTableRegistry,
    joins: JoinGraph,
    conditions: WhereConditionList,
    having: WhereConditionList,
    select_columns: Vec<SelectedColumn>,
    group_by: Vec<String>,
    order_by: Vec<OrderByColumn>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl QuerySession {
    pub fn new(catalog: Arc<SchemaCatalog>, config: &QueryCanvasConfig) -> Self {
        Self::with_ids(catalog, random_ids(), config, StdRng::from_entropy())
    }

    /// Session with injected id source and placement RNG.
    pub fn with_ids(
        catalog: Arc<SchemaCatalog>,
        ids: Arc<dyn IdGenerator>,
        config: &QueryCanvasConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            name: "Untitled Query".to_string(),
            dialect: config.sql.default_dialect,
            registry: QueryTableRegistry::with_rng(catalog, ids.clone(), config.canvas, rng),
            joins: JoinGraph::new(ids.clone()),
            conditions: WhereConditionList::new(ids.clone()),
            having: WhereConditionList::new(ids),
            select_columns: Vec::new(),
            group_by: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn dialect(&self) -> SqlDialect {
        self.dialect
    }

    pub fn set_dialect(&mut self, dialect: SqlDialect) {
        self.dialect = dialect;
    }

    pub fn tables(&self) -> &QueryTableRegistry {
        &self.registry
    }

    pub fn tables_mut(&mut self) -> &mut QueryTableRegistry {
        &mut self.registry
    }

    pub fn joins(&self) -> &JoinGraph {
        &self.joins
    }

    pub fn joins_mut(&mut self) -> &mut JoinGraph {
        &mut self.joins
    }

    /// Add an empty join; needs two tables on the canvas.
    pub fn add_join(&mut self) -> Result<QueryJoin> {
        self.joins.add_join(self.registry.len())
    }

    pub fn conditions(&self) -> &WhereConditionList {
        &self.conditions
    }

    pub fn conditions_mut(&mut self) -> &mut WhereConditionList {
        &mut self.conditions
    }

    /// Conditions on grouped rows, edited like the where list.
    pub fn having(&self) -> &WhereConditionList {
        &self.having
    }

    pub fn having_mut(&mut self) -> &mut WhereConditionList {
        &mut self.having
    }

    pub fn select_columns(&self) -> &[SelectedColumn] {
        &self.select_columns
    }

    pub fn set_select_columns(&mut self, columns: Vec<SelectedColumn>) {
        self.select_columns = columns;
    }

    pub fn add_select_column(&mut self, column: SelectedColumn) {
        self.select_columns.push(column);
    }

    pub fn set_group_by(&mut self, columns: Vec<String>) {
        self.group_by = columns;
    }

    pub fn set_order_by(&mut self, columns: Vec<OrderByColumn>) {
        self.order_by = columns;
    }

    pub fn set_limit(&mut self, limit: Option<u64>) {
        self.limit = limit;
    }

    pub fn set_offset(&mut self, offset: Option<u64>) {
        self.offset = offset;
    }

    pub fn snapshot(&self) -> VisualQuery {
        VisualQuery {
            name: self.name.clone(),
            dialect: self.dialect,
            tables: self.registry.tables().to_vec(),
            joins: self.joins.joins().to_vec(),
            where_conditions: self.conditions.conditions().to_vec(),
            select_columns: self.select_columns.clone(),
            group_by: self.group_by.clone(),
            having_conditions: self.having.conditions().to_vec(),
            order_by: self.order_by.clone(),
            limit: self.limit,
            offset: self.offset,
        }
    }

    /// Replace the whole session state with a saved query.
    pub fn load(&mut self, query: VisualQuery) {
        tracing::debug!(
            name = %query.name,
            tables = query.tables.len(),
            joins = query.joins.len(),
            conditions = query.where_conditions.len(),
            "loading query into session"
        );
        self.name = query.name;
        self.dialect = query.dialect;
        self.registry.replace_all(query.tables);
        self.joins.replace_all(query.joins);
        self.conditions.replace_all(query.where_conditions);
        self.select_columns = query.select_columns;
        self.group_by = query.group_by;
        self.having.replace_all(query.having_conditions);
        self.order_by = query.order_by;
        self.limit = query.limit;
        self.offset = query.offset;
    }

    pub fn sql(&self) -> Result<String> {
        render_query(&self.snapshot())
    }

    /// SQL for display. Never fails: an empty canvas or a rendering error
    /// yields a `--` comment instead.
    pub fn preview_sql(&self) -> String {
        if self.registry.is_empty() {
            return EMPTY_SQL.to_string();
        }
        match self.sql() {
            Ok(sql) => sql,
            Err(e) => {
                tracing::debug!(error = %e, "query preview failed");
                format!("-- Error generating SQL: {}", error_message(&e))
            }
        }
    }

    pub fn explain_sql(&self) -> Result<String> {
        Ok(explain_sql(&self.sql()?, self.dialect))
    }

    pub fn explanation(&self) -> String {
        if self.registry.is_empty() {
            return EMPTY_EXPLANATION.to_string();
        }
        readable_explanation(&self.snapshot())
    }

    /// References that no longer resolve against the canvas. Reported, not
    /// repaired; rendering still emits them.
    pub fn validation_report(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        for join in self.joins.joins() {
            for (side, table) in [(JoinSide::Left, join.left_table), (JoinSide::Right, join.right_table)] {
                match table {
                    None => issues.push(ValidationIssue::UnsetJoinTable {
                        join_id: join.id,
                        side,
                    }),
                    Some(table_id) if self.registry.get(table_id).is_none() => {
                        issues.push(ValidationIssue::MissingJoinTable {
                            join_id: join.id,
                            side,
                            table_id,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        for cond in self
            .conditions
            .conditions()
            .iter()
            .chain(self.having.conditions())
        {
            // Expressions such as `SUM(o.total)` are not resolved.
            if cond.column.contains('(') {
                continue;
            }
            let parts: Vec<&str> = cond.column.split('.').map(unquote).collect();
            let (schema, table) = match parts.as_slice() {
                [.., schema, table, _] => (Some(*schema), *table),
                [table, _] => (None, *table),
                _ => continue,
            };
            let on_canvas = self.registry.tables().iter().any(|t| {
                let named = t.reference_name() == table || t.name == table;
                let same_schema = match (schema, t.schema.as_deref()) {
                    (Some(wanted), Some(actual)) => wanted == actual,
                    _ => true,
                };
                named && same_schema
            });
            if !on_canvas {
                issues.push(ValidationIssue::UnknownConditionTable {
                    condition_id: cond.id,
                    table: table.to_string(),
                });
            }
        }

        issues
    }
}

fn unquote(part: &str) -> &str {
    let part = part.trim();
    for (open, close) in [('"', '"'), ('`', '`'), ('[', ']')] {
        if let Some(inner) = part.strip_prefix(open).and_then(|p| p.strip_suffix(close)) {
            return inner;
        }
    }
    part
}

/// True when `sql` holds something besides comments. Text the lexer rejects
/// is passed on so the executor reports the error.
fn has_statement(sql: &str) -> bool {
    match tokenize(sql) {
        Ok(tokens) => tokens.iter().any(|t| !t.is_comment()),
        Err(_) => true,
    }
}

fn error_message(error: &QueryCanvasError) -> String {
    match error {
        QueryCanvasError::Validation(msg)
        | QueryCanvasError::Sql(msg)
        | QueryCanvasError::Execution(msg) => msg.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl fmt::Display for JoinSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSide::Left => f.write_str("left"),
            JoinSide::Right => f.write_str("right"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    UnsetJoinTable {
        join_id: Uuid,
        side: JoinSide,
    },
    MissingJoinTable {
        join_id: Uuid,
        side: JoinSide,
        table_id: Uuid,
    },
    UnknownConditionTable {
        condition_id: Uuid,
        table: String,
    },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationIssue::UnsetJoinTable { join_id, side } => {
                write!(f, "join {join_id} has no {side} table")
            }
            ValidationIssue::MissingJoinTable {
                join_id,
                side,
                table_id,
            } => write!(
                f,
                "join {join_id} {side} table {table_id} is not on the canvas"
            ),
            ValidationIssue::UnknownConditionTable {
                condition_id,
                table,
            } => write!(
                f,
                "condition {condition_id} references table '{table}' which is not on the canvas"
            ),
        }
    }
}

/// Executes SQL one statement at a time and records every outcome.
pub struct QueryRunner {
    timeout: Option<Duration>,
    executing: AtomicBool,
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl QueryRunner {
    pub fn new(config: &ExecutorConfig) -> Self {
        Self {
            timeout: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
            executing: AtomicBool::new(false),
        }
    }

    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    fn begin(&self) -> Result<InFlight<'_>> {
        self.executing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| QueryCanvasError::Execution("a query is already executing".to_string()))?;
        Ok(InFlight(&self.executing))
    }

    /// Run `sql` and record the outcome in `history`.
    ///
    /// Returns an error only when the run is refused (empty or comment-only
    /// SQL such as the preview placeholders, or another run in flight). Executor failures and timeouts come
    /// back as a [`QueryResult`] with `error` set.
    pub async fn run(
        &self,
        sql: &str,
        executor: &dyn QueryExecutor,
        connection: &ConnectionDescriptor,
        history: &mut QueryHistory,
    ) -> Result<QueryResult> {
        let sql = sql.trim();
        if !has_statement(sql) {
            return Err(QueryCanvasError::Validation(
                "no query to execute".to_string(),
            ));
        }
        let _guard = self.begin()?;

        tracing::info!(
            executor = executor.name(),
            connection = %connection.name,
            "executing query"
        );
        let start = Instant::now();
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, executor.execute(sql, connection))
                .await
                .unwrap_or_else(|_| {
                    Err(QueryCanvasError::Execution(format!(
                        "query timed out after {} ms",
                        limit.as_millis()
                    )))
                }),
            None => executor.execute(sql, connection).await,
        };

        let result = match outcome {
            Ok(result) => {
                tracing::info!(
                    rows = result.row_count,
                    elapsed_ms = result.execution_time,
                    "query finished"
                );
                result
            }
            Err(e) => {
                let elapsed = start.elapsed().as_millis() as u64;
                tracing::warn!(error = %e, elapsed_ms = elapsed, "query failed");
                QueryResult::failed(error_message(&e), elapsed)
            }
        };

        history.record(QueryHistoryEntry::from_result(sql, &result));
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::SequentialIds;
    use crate::models::{JoinCondition, JoinOperator, SchemaColumn, SchemaTable};

    fn catalog() -> Arc<SchemaCatalog> {
        Arc::new(SchemaCatalog::from_tables(vec![
            SchemaTable::new(
                "users",
                vec![
                    SchemaColumn::new("id", "INTEGER").primary_key(),
                    SchemaColumn::new("name", "TEXT"),
                ],
            ),
            SchemaTable::new(
                "orders",
                vec![
                    SchemaColumn::new("id", "INTEGER").primary_key(),
                    SchemaColumn::new("user_id", "INTEGER").references("users", "id"),
                    SchemaColumn::new("status", "TEXT"),
                ],
            ),
        ]))
    }

    fn session() -> QuerySession {
        QuerySession::with_ids(
            catalog(),
            Arc::new(SequentialIds::new()),
            &QueryCanvasConfig::default(),
            StdRng::seed_from_u64(7),
        )
    }

    fn users_orders(session: &mut QuerySession) -> (Uuid, Uuid) {
        let users = session.tables_mut().add_table_by_name("users").unwrap().id;
        let orders = session.tables_mut().add_table_by_name("orders").unwrap().id;
        let join = session.add_join().unwrap();
        session.joins_mut().set_tables(join.id, Some(users), Some(orders)).unwrap();
        session.joins_mut().add_condition(join.id).unwrap();
        session
            .joins_mut()
            .update_condition(join.id, 0, JoinCondition::new("id", JoinOperator::Eq, "user_id"))
            .unwrap();
        let cond = session.conditions_mut().add_condition();
        session.conditions_mut().set_column(cond.id, "orders.status").unwrap();
        session.conditions_mut().set_value(cond.id, "'shipped'").unwrap();
        (users, orders)
    }

    #[test]
    fn empty_session_previews_placeholder() {
        let session = session();
        assert_eq!(session.preview_sql(), EMPTY_SQL);
        assert_eq!(session.explanation(), EMPTY_EXPLANATION);
        assert!(session.sql().is_err());
    }

    #[test]
    fn builds_users_orders_query() {
        let mut session = session();
        users_orders(&mut session);
        assert_eq!(
            session.sql().unwrap(),
            "SELECT * FROM users INNER JOIN orders ON users.id = orders.user_id WHERE orders.status = 'shipped'"
        );
        assert!(session.validation_report().is_empty());
        assert!(session.explain_sql().unwrap().starts_with("EXPLAIN SELECT"));
    }

    #[test]
    fn preview_reports_render_errors() {
        let mut session = session();
        session.tables_mut().add_table_by_name("users").unwrap();
        let cond = session.conditions_mut().add_condition();
        session.conditions_mut().set_column(cond.id, "name").unwrap();
        let preview = session.preview_sql();
        assert!(preview.starts_with("-- Error generating SQL: "), "{preview}");
    }

    #[test]
    fn removed_table_is_reported_not_repaired() {
        let mut session = session();
        let (_, orders) = users_orders(&mut session);
        session.tables_mut().remove_table(orders);

        let sql = session.sql().unwrap();
        assert!(sql.contains(&format!("<missing table {orders}>")));

        let report = session.validation_report();
        assert_eq!(report.len(), 2);
        assert!(matches!(
            report[0],
            ValidationIssue::MissingJoinTable { side: JoinSide::Right, table_id, .. } if table_id == orders
        ));
        assert!(matches!(
            &report[1],
            ValidationIssue::UnknownConditionTable { table, .. } if table == "orders"
        ));
    }

    #[test]
    fn schema_and_quoted_qualifiers_resolve() {
        let mut session = session();
        users_orders(&mut session);
        for column in ["public.orders.status", "\"orders\".status", "[orders].[status]"] {
            let cond = session.conditions_mut().add_condition();
            session.conditions_mut().set_column(cond.id, column).unwrap();
            session.conditions_mut().set_value(cond.id, "1").unwrap();
        }
        assert!(session.validation_report().is_empty(), "{:?}", session.validation_report());

        let cond = session.conditions_mut().add_condition();
        session.conditions_mut().set_column(cond.id, "\"invoices\".total").unwrap();
        let report = session.validation_report();
        assert_eq!(report.len(), 1);
        assert!(matches!(
            &report[0],
            ValidationIssue::UnknownConditionTable { table, .. } if table == "invoices"
        ));
    }

    #[test]
    fn having_rows_render_and_round_trip() {
        let mut session = session();
        session.tables_mut().add_table_by_name("orders").unwrap();
        session.set_select_columns(vec![SelectedColumn::new("status")]);
        session.set_group_by(vec!["status".to_string()]);
        let having = session.having_mut().add_condition();
        session.having_mut().set_column(having.id, "COUNT(*)").unwrap();
        session
            .having_mut()
            .set_operator(having.id, crate::models::WhereOperator::Gt)
            .unwrap();
        session.having_mut().set_value(having.id, "5").unwrap();

        assert_eq!(
            session.sql().unwrap(),
            "SELECT status FROM orders GROUP BY status HAVING COUNT(*) > 5"
        );

        let saved = session.snapshot();
        assert_eq!(saved.having_conditions.len(), 1);
        let mut other = QuerySession::new(catalog(), &QueryCanvasConfig::default());
        other.load(saved);
        assert_eq!(other.having().len(), 1);
        assert_eq!(other.sql().unwrap(), session.sql().unwrap());
    }

    #[test]
    fn snapshot_load_round_trip() {
        let mut session = session();
        users_orders(&mut session);
        session.set_name("shipped orders");
        session.set_dialect(SqlDialect::PostgreSql);
        session.set_limit(Some(25));
        let saved = session.snapshot();

        let json = serde_json::to_string(&saved).unwrap();
        let restored: VisualQuery = serde_json::from_str(&json).unwrap();

        let mut other = QuerySession::new(catalog(), &QueryCanvasConfig::default());
        other.load(restored);
        assert_eq!(other.snapshot(), saved);
        assert_eq!(other.sql().unwrap(), session.sql().unwrap());
        assert_eq!(other.name(), "shipped orders");
    }

    #[test]
    fn join_needs_two_tables() {
        let mut session = session();
        session.tables_mut().add_table_by_name("users").unwrap();
        assert!(session.add_join().is_err());
    }
}
