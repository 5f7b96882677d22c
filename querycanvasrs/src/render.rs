use uuid::Uuid;

use crate::dialect::Dialect;
use crate::error::{QueryCanvasError, Result};
use crate::models::{
    JoinCondition, OrderByColumn, QueryJoin, QueryTable, SelectedColumn, SortDirection,
    VisualQuery,
};
use crate::predicate::build_predicate;

/// Renders a [`VisualQuery`] snapshot to single-line SQL.
pub struct SqlRenderer<'d> {
    dialect: &'d dyn Dialect,
}

impl<'d> SqlRenderer<'d> {
    pub fn new(dialect: &'d dyn Dialect) -> Self {
        Self { dialect }
    }

    pub fn render(&self, query: &VisualQuery) -> Result<String> {
        let from = query.tables.first().ok_or_else(|| {
            QueryCanvasError::Validation("add at least one table to build a query".to_string())
        })?;

        let mut sql = String::from("SELECT ");
        if let Some(prefix) = self.dialect.select_prefix(query.limit, query.offset) {
            sql.push_str(&prefix);
            sql.push(' ');
        }
        sql.push_str(&self.render_projection(&query.select_columns));
        sql.push_str(" FROM ");
        sql.push_str(&self.render_table_ref(from));

        for join in &query.joins {
            sql.push(' ');
            sql.push_str(&self.render_join(join, query));
        }

        if let Some(predicate) = build_predicate(&query.where_conditions)? {
            sql.push_str(" WHERE ");
            sql.push_str(&predicate.render(self.dialect));
        }

        if !query.group_by.is_empty() {
            let groups: Vec<String> = query
                .group_by
                .iter()
                .map(|g| self.dialect.quote_path(g))
                .collect();
            sql.push_str(&format!(" GROUP BY {}", groups.join(", ")));
        }

        if let Some(predicate) = build_predicate(&query.having_conditions)? {
            sql.push_str(" HAVING ");
            sql.push_str(&predicate.render(self.dialect));
        }

        if !query.order_by.is_empty() {
            let orders: Vec<String> = query.order_by.iter().map(|o| self.render_order(o)).collect();
            sql.push_str(&format!(" ORDER BY {}", orders.join(", ")));
        }

        if let Some(clause) = self.dialect.limit_clause(query.limit, query.offset) {
            sql.push(' ');
            sql.push_str(&clause);
        }

        tracing::debug!(dialect = self.dialect.name(), sql = %sql, "rendered query");
        Ok(sql)
    }

    fn render_projection(&self, columns: &[SelectedColumn]) -> String {
        if columns.is_empty() {
            return "*".to_string();
        }
        columns
            .iter()
            .map(|col| {
                let path = match &col.table {
                    Some(table) => format!("{table}.{}", col.column),
                    None => col.column.clone(),
                };
                let expr = self.dialect.quote_path(&path);
                let expr = match col.aggregate {
                    Some(agg) => agg.render(&expr),
                    None => expr,
                };
                match &col.alias {
                    Some(alias) => format!("{expr} AS {}", self.dialect.quote_ident(alias)),
                    None => expr,
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn render_table_ref(&self, table: &QueryTable) -> String {
        let name = match &table.schema {
            Some(schema) => format!("{}.{}", self.dialect.quote_ident(schema), self.dialect.quote_ident(&table.name)),
            None => self.dialect.quote_ident(&table.name),
        };
        match &table.alias {
            Some(alias) => format!("{name} AS {}", self.dialect.quote_ident(alias)),
            None => name,
        }
    }

    fn render_join(&self, join: &QueryJoin, query: &VisualQuery) -> String {
        let left = join.left_table.and_then(|id| query.table(id));
        let right = join.right_table.and_then(|id| query.table(id));

        let right_sql = match right {
            Some(table) => self.render_table_ref(table),
            None => missing_table(join.right_table),
        };
        let mut sql = format!("{} JOIN {right_sql}", join.join_type.keyword());

        let conditions = join.effective_conditions();
        if conditions.is_empty() {
            return sql;
        }

        let left_name = side_name(left, join.left_table);
        let right_name = side_name(right, join.right_table);
        let on: Vec<String> = conditions
            .iter()
            .map(|c| self.render_join_condition(c, &left_name, &right_name))
            .collect();
        sql.push_str(" ON ");
        sql.push_str(&on.join(" AND "));
        sql
    }

    fn render_join_condition(&self, cond: &JoinCondition, left: &str, right: &str) -> String {
        format!(
            "{} {} {}",
            self.qualify(left, &cond.left_column),
            cond.operator.as_str(),
            self.qualify(right, &cond.right_column)
        )
    }

    /// Columns already written as `table.column` are kept; bare ones get the
    /// side's alias or table name.
    fn qualify(&self, side: &str, column: &str) -> String {
        if column.contains('.') {
            return self.dialect.quote_path(column);
        }
        if side.starts_with('<') {
            return format!("{side}.{}", self.dialect.quote_ident(column));
        }
        format!(
            "{}.{}",
            self.dialect.quote_ident(side),
            self.dialect.quote_ident(column)
        )
    }

    fn render_order(&self, order: &OrderByColumn) -> String {
        let dir = match order.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let mut out = format!("{} {dir}", self.dialect.quote_path(&order.column));
        match order.nulls_first {
            Some(true) => out.push_str(" NULLS FIRST"),
            Some(false) => out.push_str(" NULLS LAST"),
            None => {}
        }
        out
    }
}

fn side_name(table: Option<&QueryTable>, id: Option<Uuid>) -> String {
    match table {
        Some(t) => t.reference_name().to_string(),
        None => missing_table(id),
    }
}

/// Placeholder for a join side that does not resolve; never valid SQL.
fn missing_table(id: Option<Uuid>) -> String {
    match id {
        Some(id) => format!("<missing table {id}>"),
        None => "<missing table>".to_string(),
    }
}

/// Render with the dialect recorded in the snapshot.
pub fn render_query(query: &VisualQuery) -> Result<String> {
    SqlRenderer::new(query.dialect.dialect()).render(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GenericDialect, MsSqlDialect, OracleDialect, PostgresDialect};
    use crate::models::{
        Aggregate, ConditionValue, JoinOperator, JoinType, LogicalOperator, Position,
        WhereCondition, WhereOperator,
    };

    fn table(id: u128, name: &str, alias: Option<&str>) -> QueryTable {
        QueryTable {
            id: Uuid::from_u128(id),
            name: name.to_string(),
            schema: None,
            alias: alias.map(str::to_string),
            position: Position::default(),
            columns: Vec::new(),
        }
    }

    fn join(id: u128, kind: JoinType, left: u128, right: u128, conds: Vec<JoinCondition>) -> QueryJoin {
        QueryJoin {
            id: Uuid::from_u128(id),
            join_type: kind,
            left_table: Some(Uuid::from_u128(left)),
            right_table: Some(Uuid::from_u128(right)),
            conditions: conds,
        }
    }

    fn cond(column: &str, op: WhereOperator, value: ConditionValue) -> WhereCondition {
        WhereCondition {
            id: Uuid::nil(),
            column: column.to_string(),
            operator: op,
            value,
            value2: None,
            logical_operator: None,
            group_start: false,
            group_end: false,
            is_subquery: false,
        }
    }

    fn users_orders() -> VisualQuery {
        VisualQuery {
            tables: vec![table(1, "users", None), table(2, "orders", None)],
            joins: vec![join(
                10,
                JoinType::Inner,
                1,
                2,
                vec![JoinCondition::new("id", JoinOperator::Eq, "user_id")],
            )],
            where_conditions: vec![cond(
                "orders.status",
                WhereOperator::Eq,
                ConditionValue::Scalar("'shipped'".into()),
            )],
            ..VisualQuery::default()
        }
    }

    #[test]
    fn users_orders_scenario() {
        let sql = SqlRenderer::new(&GenericDialect).render(&users_orders()).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM users INNER JOIN orders ON users.id = orders.user_id WHERE orders.status = 'shipped'"
        );
    }

    #[test]
    fn between_and_in_values() {
        let mut between = cond("price", WhereOperator::Between, ConditionValue::Scalar("10".into()));
        between.value2 = Some("20".into());
        let mut inlist = cond(
            "category",
            WhereOperator::In,
            ConditionValue::List(vec!["a".into(), "b".into(), "c".into()]),
        );
        inlist.logical_operator = Some(LogicalOperator::And);
        let query = VisualQuery {
            tables: vec![table(1, "products", None)],
            where_conditions: vec![between, inlist],
            ..VisualQuery::default()
        };
        let sql = render_query(&query).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM products WHERE price BETWEEN 10 AND 20 AND category IN (a, b, c)"
        );
    }

    #[test]
    fn cross_join_has_no_on() {
        let mut query = users_orders();
        query.joins[0].join_type = JoinType::Cross;
        query.where_conditions.clear();
        let sql = render_query(&query).unwrap();
        assert_eq!(sql, "SELECT * FROM users CROSS JOIN orders");
    }

    #[test]
    fn join_without_conditions_has_no_on() {
        let mut query = users_orders();
        query.joins[0].conditions.clear();
        query.joins[0].join_type = JoinType::Left;
        query.where_conditions.clear();
        assert_eq!(
            render_query(&query).unwrap(),
            "SELECT * FROM users LEFT JOIN orders"
        );
    }

    #[test]
    fn dangling_join_renders_placeholder() {
        let mut query = users_orders();
        query.tables.truncate(1);
        query.where_conditions.clear();
        let sql = render_query(&query).unwrap();
        let missing = format!("<missing table {}>", Uuid::from_u128(2));
        assert_eq!(
            sql,
            format!("SELECT * FROM users INNER JOIN {missing} ON users.id = {missing}.user_id")
        );
    }

    #[test]
    fn aliases_qualify_self_join() {
        let query = VisualQuery {
            tables: vec![table(1, "employees", Some("e")), table(2, "employees", Some("m"))],
            joins: vec![join(
                5,
                JoinType::Left,
                1,
                2,
                vec![JoinCondition::new("manager_id", JoinOperator::Eq, "id")],
            )],
            select_columns: vec![
                SelectedColumn::of("e", "name"),
                SelectedColumn::of("m", "name").aliased("manager"),
            ],
            ..VisualQuery::default()
        };
        assert_eq!(
            render_query(&query).unwrap(),
            "SELECT e.name, m.name AS manager FROM employees AS e LEFT JOIN employees AS m ON e.manager_id = m.id"
        );
    }

    #[test]
    fn projection_grouping_ordering_and_limit() {
        let query = VisualQuery {
            tables: vec![table(1, "orders", None)],
            select_columns: vec![
                SelectedColumn::new("status"),
                SelectedColumn::new("*").aggregated(Aggregate::Count).aliased("n"),
            ],
            group_by: vec!["status".into()],
            order_by: vec![OrderByColumn::desc("n")],
            limit: Some(10),
            offset: Some(20),
            ..VisualQuery::default()
        };
        assert_eq!(
            SqlRenderer::new(&PostgresDialect).render(&query).unwrap(),
            "SELECT \"status\", COUNT(*) AS \"n\" FROM \"orders\" GROUP BY \"status\" ORDER BY \"n\" DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn having_sits_between_group_and_order() {
        let count = cond("n", WhereOperator::Gt, ConditionValue::Scalar("5".into()));
        let query = VisualQuery {
            tables: vec![table(1, "orders", None)],
            select_columns: vec![
                SelectedColumn::new("status"),
                SelectedColumn::new("*").aggregated(Aggregate::Count).aliased("n"),
            ],
            where_conditions: vec![cond(
                "total",
                WhereOperator::Gt,
                ConditionValue::Scalar("0".into()),
            )],
            group_by: vec!["status".into()],
            having_conditions: vec![count],
            order_by: vec![OrderByColumn::desc("n")],
            ..VisualQuery::default()
        };
        assert_eq!(
            render_query(&query).unwrap(),
            "SELECT status, COUNT(*) AS n FROM orders WHERE total > 0 GROUP BY status HAVING n > 5 ORDER BY n DESC"
        );
    }

    #[test]
    fn incomplete_having_row_fails_render() {
        let query = VisualQuery {
            tables: vec![table(1, "orders", None)],
            group_by: vec!["status".into()],
            having_conditions: vec![cond("", WhereOperator::Gt, ConditionValue::Scalar("1".into()))],
            ..VisualQuery::default()
        };
        assert!(matches!(
            render_query(&query).unwrap_err(),
            QueryCanvasError::Validation(_)
        ));
    }

    #[test]
    fn dialect_row_limits() {
        let query = VisualQuery {
            tables: vec![table(1, "orders", None)],
            limit: Some(5),
            ..VisualQuery::default()
        };
        assert_eq!(
            SqlRenderer::new(&MsSqlDialect).render(&query).unwrap(),
            "SELECT TOP 5 * FROM [orders]"
        );
        assert_eq!(
            SqlRenderer::new(&OracleDialect).render(&query).unwrap(),
            "SELECT * FROM \"ORDERS\" FETCH FIRST 5 ROWS ONLY"
        );
    }

    #[test]
    fn no_tables_is_an_error() {
        let err = render_query(&VisualQuery::default()).unwrap_err();
        assert!(matches!(err, QueryCanvasError::Validation(_)));
    }
}
