//! SQL Server dialect implementation.
//!
//! Row limits use `TOP n`, or the `OFFSET ... FETCH` form once an offset is set.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct MsSqlDialect;

impl Dialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn quote_ident(&self, ident: &str) -> String {
        format!("[{}]", ident.replace(']', "]]"))
    }

    fn select_prefix(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(limit), None | Some(0)) => Some(format!("TOP {limit}")),
            _ => None,
        }
    }

    fn limit_clause(&self, limit: Option<u64>, offset: Option<u64>) -> Option<String> {
        match (limit, offset) {
            (Some(limit), Some(offset)) if offset > 0 => Some(format!(
                "OFFSET {offset} ROWS FETCH NEXT {limit} ROWS ONLY"
            )),
            (None, Some(offset)) if offset > 0 => Some(format!("OFFSET {offset} ROWS")),
            _ => None,
        }
    }

    fn explain_prefix(&self) -> &'static str {
        "SET SHOWPLAN_ALL ON\n"
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::MsSqlDialect {})
    }
}
