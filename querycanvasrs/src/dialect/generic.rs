//! Dialect-neutral SQL: identifiers are emitted as written.

use super::Dialect;

#[derive(Debug, Default, Clone, Copy)]
pub struct GenericDialect;

impl Dialect for GenericDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn quote_ident(&self, ident: &str) -> String {
        ident.to_string()
    }

    fn parser_dialect(&self) -> Box<dyn sqlparser::dialect::Dialect> {
        Box::new(sqlparser::dialect::GenericDialect {})
    }
}
