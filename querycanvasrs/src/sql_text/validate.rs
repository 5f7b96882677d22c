use serde::{Deserialize, Serialize};
use sqlparser::parser::Parser;

use super::tokenize::{tokenize, Token, TokenKind};
use crate::dialect::SqlDialect;

/// Outcome of a syntax check. Problems are values, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxCheck {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyntaxCheck {
    pub fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

const LEADING_KEYWORDS: [&str; 11] = [
    "SELECT", "INSERT", "UPDATE", "DELETE", "CREATE", "ALTER", "DROP", "SHOW", "DESCRIBE",
    "EXPLAIN", "WITH",
];

const OBJECT_KEYWORDS: [&str; 20] = [
    "TABLE", "VIEW", "INDEX", "DATABASE", "SCHEMA", "SEQUENCE", "FUNCTION", "PROCEDURE",
    "TRIGGER", "TYPE", "EXTENSION", "USER", "ROLE", "UNIQUE", "OR", "TEMP", "TEMPORARY",
    "MATERIALIZED", "VIRTUAL", "COLUMN",
];

/// Cheap structural check of raw SQL: not empty, starts with a statement
/// keyword, literals terminated, parentheses balanced, and the clauses each
/// statement kind cannot do without. Heuristic only.
pub fn validate_sql_syntax(sql: &str) -> SyntaxCheck {
    if sql.trim().is_empty() {
        return SyntaxCheck::invalid("Query cannot be empty");
    }

    let tokens = match tokenize(sql) {
        Ok(tokens) => tokens,
        Err(e) => return SyntaxCheck::invalid(e.to_string()),
    };
    let code: Vec<&Token> = tokens.iter().filter(|t| !t.is_comment()).collect();

    let Some(first) = code.first() else {
        return SyntaxCheck::invalid("Query cannot be empty");
    };
    let leading = first.text.to_ascii_uppercase();
    if first.kind != TokenKind::Word || !LEADING_KEYWORDS.contains(&leading.as_str()) {
        return SyntaxCheck::invalid("Query must start with a valid SQL keyword");
    }

    let mut depth: i64 = 0;
    for token in &code {
        match token.kind {
            TokenKind::LParen => depth += 1,
            TokenKind::RParen => {
                depth -= 1;
                if depth < 0 {
                    break;
                }
            }
            _ => {}
        }
    }
    if depth != 0 {
        return SyntaxCheck::invalid("Unbalanced parentheses in query");
    }

    let has = |word: &str| code.iter().any(|t| t.is_word(word));
    match leading.as_str() {
        "INSERT" if !has("INTO") => SyntaxCheck::invalid("INSERT statement requires INTO"),
        "INSERT" if !has("VALUES") && !has("SELECT") => {
            SyntaxCheck::invalid("INSERT statement requires VALUES or SELECT")
        }
        "UPDATE" if !has("SET") => SyntaxCheck::invalid("UPDATE statement requires SET"),
        "DELETE" if !has("FROM") => SyntaxCheck::invalid("DELETE statement requires FROM"),
        "CREATE" | "DROP" | "ALTER" => {
            let object_named = code.get(1).is_some_and(|t| {
                t.kind == TokenKind::Word
                    && OBJECT_KEYWORDS.contains(&t.text.to_ascii_uppercase().as_str())
            });
            if object_named {
                SyntaxCheck::ok()
            } else {
                SyntaxCheck::invalid(format!(
                    "{leading} statement must name an object type (TABLE, VIEW, INDEX, ...)"
                ))
            }
        }
        _ => SyntaxCheck::ok(),
    }
}

/// Full parse with the grammar of `dialect`.
pub fn validate_sql_strict(sql: &str, dialect: SqlDialect) -> SyntaxCheck {
    let quick = validate_sql_syntax(sql);
    if !quick.valid {
        return quick;
    }
    let grammar = dialect.dialect().parser_dialect();
    match Parser::parse_sql(&*grammar, sql) {
        Ok(statements) if statements.is_empty() => SyntaxCheck::invalid("Query cannot be empty"),
        Ok(_) => SyntaxCheck::ok(),
        Err(e) => {
            tracing::debug!(dialect = %dialect, error = %e, "strict validation failed");
            SyntaxCheck::invalid(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error_of(sql: &str) -> String {
        validate_sql_syntax(sql).error.unwrap_or_default()
    }

    #[test]
    fn accepts_common_statements() {
        for sql in [
            "SELECT * FROM users",
            "  -- leading comment\nselect 1",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "INSERT INTO t (a) VALUES (1)",
            "INSERT INTO t SELECT * FROM s",
            "UPDATE t SET a = 1",
            "DELETE FROM t WHERE id = 3",
            "CREATE TABLE t (id INT)",
            "DROP VIEW v",
            "EXPLAIN SELECT 1",
        ] {
            assert!(validate_sql_syntax(sql).valid, "{sql}");
        }
    }

    #[test]
    fn reports_first_problem() {
        assert_eq!(error_of("   "), "Query cannot be empty");
        assert_eq!(error_of("-- only a comment"), "Query cannot be empty");
        assert_eq!(error_of("FOO bar"), "Query must start with a valid SQL keyword");
        assert_eq!(error_of("SELECT (1"), "Unbalanced parentheses in query");
        assert_eq!(error_of("SELECT 1)("), "Unbalanced parentheses in query");
        assert_eq!(error_of("UPDATE t"), "UPDATE statement requires SET");
        assert_eq!(error_of("DELETE t"), "DELETE statement requires FROM");
        assert_eq!(error_of("INSERT t VALUES (1)"), "INSERT statement requires INTO");
        assert!(error_of("SELECT 'open").starts_with("Unterminated string"));
        assert!(error_of("CREATE t").starts_with("CREATE statement must name"));
    }

    #[test]
    fn parentheses_inside_literals_do_not_count() {
        assert!(validate_sql_syntax("SELECT ')' FROM t").valid);
        assert!(validate_sql_syntax("SELECT \"a(b\" FROM t").valid);
    }

    #[test]
    fn strict_validation_uses_parser() {
        assert!(validate_sql_strict("SELECT a FROM t WHERE b = 1", SqlDialect::Generic).valid);
        let check = validate_sql_strict("SELECT * FROM t WHERE", SqlDialect::PostgreSql);
        assert!(!check.valid);
        assert!(check.error.is_some());
        assert!(validate_sql_strict("SELECT TOP 5 * FROM [t]", SqlDialect::MsSql).valid);
    }
}
