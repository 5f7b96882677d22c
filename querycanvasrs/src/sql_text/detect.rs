use once_cell::sync::Lazy;
use regex::Regex;

use crate::dialect::SqlDialect;

static POSTGRES: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(r"(?i)\b(RETURNING|ILIKE|REGEXP|SERIAL|BIGSERIAL|UUID|JSONB)\b")
});

static MYSQL: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(r"(?i)\b(AUTO_INCREMENT|LIMIT\s+\d+\s*,\s*\d+|MEDIUMTEXT|LONGTEXT|TINYINT|UNSIGNED)\b")
});

static SQLITE: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(r"(?i)\b(AUTOINCREMENT|INTEGER\s+PRIMARY\s+KEY|PRAGMA|ATTACH)\b")
});

static MSSQL: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(r"(?i)\b(TOP\s+\d+|NVARCHAR|UNIQUEIDENTIFIER|CHARINDEX)\b|\bGETDATE\s*\(\s*\)")
});

static ORACLE: Lazy<Option<Regex>> = Lazy::new(|| {
    pattern(r"(?i)\b(DUAL|ROWNUM|SYSDATE|VARCHAR2|CONNECT\s+BY)\b|\bNUMBER\s*\(\s*\d+\s*,\s*\d+\s*\)")
});

static BACKTICK_IDENT: Lazy<Option<Regex>> = Lazy::new(|| pattern(r"`[^`]+`"));

static BRACKET_IDENT: Lazy<Option<Regex>> = Lazy::new(|| pattern(r"\[\w+\]"));

static DOUBLE_QUOTED_IDENT: Lazy<Option<Regex>> = Lazy::new(|| pattern(r#""\w+""#));

fn pattern(re: &str) -> Option<Regex> {
    Regex::new(re)
        .map_err(|e| tracing::error!(pattern = re, error = %e, "invalid detection pattern"))
        .ok()
}

fn found(re: &Lazy<Option<Regex>>, sql: &str) -> bool {
    Lazy::force(re).as_ref().is_some_and(|re| re.is_match(sql))
}

/// Guess the dialect of raw SQL from dialect-specific keywords, then from
/// identifier quoting. Falls back to [`SqlDialect::Generic`].
pub fn detect_sql_dialect(sql: &str) -> SqlDialect {
    let keyword_checks: [(&Lazy<Option<Regex>>, SqlDialect); 5] = [
        (&POSTGRES, SqlDialect::PostgreSql),
        (&MYSQL, SqlDialect::MySql),
        (&SQLITE, SqlDialect::Sqlite),
        (&MSSQL, SqlDialect::MsSql),
        (&ORACLE, SqlDialect::Oracle),
    ];
    for (re, dialect) in keyword_checks {
        if found(re, sql) {
            return dialect;
        }
    }

    if found(&BACKTICK_IDENT, sql) {
        SqlDialect::MySql
    } else if found(&BRACKET_IDENT, sql) {
        SqlDialect::MsSql
    } else if found(&DOUBLE_QUOTED_IDENT, sql) {
        SqlDialect::PostgreSql
    } else {
        SqlDialect::Generic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_keywords() {
        assert_eq!(
            detect_sql_dialect("INSERT INTO t (a) VALUES (1) RETURNING id"),
            SqlDialect::PostgreSql
        );
        assert_eq!(
            detect_sql_dialect("SELECT * FROM t LIMIT 10, 20"),
            SqlDialect::MySql
        );
        assert_eq!(
            detect_sql_dialect("CREATE TABLE t (id INTEGER PRIMARY KEY AUTOINCREMENT)"),
            SqlDialect::Sqlite
        );
        assert_eq!(
            detect_sql_dialect("select top 5 name, getdate() from t"),
            SqlDialect::MsSql
        );
        assert_eq!(detect_sql_dialect("SELECT SYSDATE FROM DUAL"), SqlDialect::Oracle);
        assert_eq!(
            detect_sql_dialect("CREATE TABLE t (amount NUMBER(10,2))"),
            SqlDialect::Oracle
        );
    }

    #[test]
    fn earlier_dialects_win() {
        // JSONB (postgres) is checked before TINYINT (mysql)
        assert_eq!(
            detect_sql_dialect("CREATE TABLE t (a JSONB, b TINYINT)"),
            SqlDialect::PostgreSql
        );
    }

    #[test]
    fn falls_back_to_quoting_then_generic() {
        assert_eq!(detect_sql_dialect("SELECT `id` FROM `users`"), SqlDialect::MySql);
        assert_eq!(detect_sql_dialect("SELECT [id] FROM [users]"), SqlDialect::MsSql);
        assert_eq!(
            detect_sql_dialect("SELECT \"id\" FROM \"users\""),
            SqlDialect::PostgreSql
        );
        assert_eq!(detect_sql_dialect("SELECT id FROM users"), SqlDialect::Generic);
    }

    #[test]
    fn keywords_need_word_boundaries() {
        // "topic" and "dualist" are ordinary identifiers
        assert_eq!(
            detect_sql_dialect("SELECT topic FROM dualist"),
            SqlDialect::Generic
        );
    }
}
