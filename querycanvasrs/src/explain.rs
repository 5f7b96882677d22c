//! Query plan statements and plain-language descriptions of a visual query.

use crate::dialect::SqlDialect;
use crate::models::{SortDirection, VisualQuery};

/// Wrap `sql` in the dialect's plan-inspection statement.
pub fn explain_sql(sql: &str, dialect: SqlDialect) -> String {
    format!("{}{}", dialect.dialect().explain_prefix(), sql)
}

/// One-sentence summary, e.g. "Retrieve data all columns from table: users
/// with INNER join with orders filtered by 1 condition(s)".
pub fn readable_explanation(query: &VisualQuery) -> String {
    let mut parts = vec!["Retrieve data".to_string()];

    if query.select_columns.is_empty() {
        parts.push("all columns".to_string());
    } else {
        let columns = query
            .select_columns
            .iter()
            .map(|c| match &c.alias {
                Some(alias) => format!("{} (as {alias})", c.column),
                None => c.column.clone(),
            })
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("columns: {columns}"));
    }

    if let Some(first) = query.tables.first() {
        parts.push(format!("from table: {}", first.name));
    }

    if !query.joins.is_empty() {
        let joins = query
            .joins
            .iter()
            .map(|j| {
                let target = match j.right_table {
                    Some(id) => query
                        .table(id)
                        .map(|t| t.reference_name().to_string())
                        .unwrap_or_else(|| format!("<missing table {id}>")),
                    None => "<missing table>".to_string(),
                };
                format!("{} join with {target}", j.join_type)
            })
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("with {joins}"));
    }

    if !query.where_conditions.is_empty() {
        parts.push(format!(
            "filtered by {} condition(s)",
            query.where_conditions.len()
        ));
    }

    if !query.group_by.is_empty() {
        parts.push(format!("grouped by: {}", query.group_by.join(", ")));
    }

    if !query.order_by.is_empty() {
        let order = query
            .order_by
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {dir}", o.column)
            })
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("ordered by: {order}"));
    }

    if let Some(limit) = query.limit {
        parts.push(format!("limited to {limit} rows"));
    }

    parts.join(" ")
}
