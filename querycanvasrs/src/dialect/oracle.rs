//! Oracle dialect implementation. Unquoted Oracle names fold to upper case, so
//! quoted identifiers are upper-cased to keep them addressable.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("\"{}\"", ident.to_uppercase().replace('"', "\"\""))
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(limit), Some(offset)) if offset > 0 => Some(format!(
                "OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY"
            )),
            (Some(limit), _) => Some(format!("FETCH FIRST {limit} ROWS ONLY")),
            (None, Some(offset)) if offset > 0 => Some(format!("OFFSET {offset} ROWS")),
            _ => None,
        }
    }

    fn explain_prefix(&self) -> &'static str {
        "EXPLAIN PLAN FOR "
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        // sqlparser has no Oracle grammar; the ANSI one covers the SELECT subset built here.
        Box::new(sqlparser::dialect::AnsiDialect {})
    }
}
