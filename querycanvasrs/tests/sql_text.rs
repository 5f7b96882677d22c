//! Integration tests for the raw SQL helpers: detection, validation, formatting.

use querycanvas::dialect::SqlDialect;
use querycanvas::explain::explain_sql;
use querycanvas::models::{Position, QueryTable, SelectedColumn, VisualQuery};
use querycanvas::render::render_query;
use querycanvas::sql_text::{
    detect_sql_dialect, format_sql_query, validate_sql_strict, validate_sql_syntax,
};
use uuid::Uuid;

fn rendered(dialect: SqlDialect) -> String {
    let query = VisualQuery {
        dialect,
        tables: vec![QueryTable {
            id: Uuid::from_u128(1),
            name: "users".to_string(),
            schema: None,
            alias: None,
            position: Position::default(),
            columns: Vec::new(),
        }],
        select_columns: vec![SelectedColumn::new("name")],
        ..VisualQuery::default()
    };
    render_query(&query).unwrap()
}

#[test]
fn rendered_quoting_is_detected_back() {
    assert_eq!(detect_sql_dialect(&rendered(SqlDialect::MySql)), SqlDialect::MySql);
    assert_eq!(detect_sql_dialect(&rendered(SqlDialect::MsSql)), SqlDialect::MsSql);
    assert_eq!(
        detect_sql_dialect(&rendered(SqlDialect::PostgreSql)),
        SqlDialect::PostgreSql
    );
    assert_eq!(detect_sql_dialect(&rendered(SqlDialect::Generic)), SqlDialect::Generic);
}

#[test]
fn rendered_queries_pass_strict_validation() {
    for dialect in [
        SqlDialect::Generic,
        SqlDialect::PostgreSql,
        SqlDialect::MySql,
        SqlDialect::Sqlite,
        SqlDialect::MsSql,
    ] {
        let sql = rendered(dialect);
        let check = validate_sql_strict(&sql, dialect);
        assert!(check.valid, "{dialect}: {sql}: {:?}", check.error);
    }
}

#[test]
fn heuristic_validation_messages() {
    assert!(validate_sql_syntax("-- note\nSELECT 1").valid);

    let cases = [
        ("   ", "Query cannot be empty"),
        ("FOO BAR", "Query must start with a valid SQL keyword"),
        ("SELECT (1", "Unbalanced parentheses in query"),
        ("UPDATE t WHERE a = 1", "UPDATE statement requires SET"),
        ("DELETE t", "DELETE statement requires FROM"),
    ];
    for (sql, expected) in cases {
        let check = validate_sql_syntax(sql);
        assert!(!check.valid, "{sql} should be invalid");
        assert_eq!(check.error.as_deref(), Some(expected), "for {sql}");
    }

    // parentheses inside literals do not count
    assert!(validate_sql_syntax("SELECT ')' FROM t").valid);
}

#[test]
fn strict_validation_uses_dialect_grammar() {
    assert!(validate_sql_strict("SELECT a FROM t WHERE b = 1", SqlDialect::PostgreSql).valid);
    let check = validate_sql_strict("SELECT * FROM t WHERE", SqlDialect::Generic);
    assert!(!check.valid);
    assert!(check.error.is_some());
}

#[test]
fn formats_generated_queries_readably() {
    let sql = "SELECT * FROM users INNER JOIN orders ON users.id = orders.user_id WHERE orders.status = 'shipped'";
    let formatted = format_sql_query(sql, SqlDialect::Generic);
    assert_eq!(
        formatted,
        "SELECT\n  *\nFROM\n  users\n  INNER JOIN orders ON users.id = orders.user_id\nWHERE\n  orders.status = 'shipped'"
    );
    assert_eq!(format_sql_query(&formatted, SqlDialect::Generic), formatted);
}

#[test]
fn explain_wraps_formatted_sql() {
    let formatted = format_sql_query("select 1", SqlDialect::Sqlite);
    assert_eq!(
        explain_sql(&formatted, SqlDialect::Sqlite),
        "EXPLAIN QUERY PLAN SELECT\n  1"
    );
}
