//! Utilities over raw SQL text: dialect detection, validation and formatting.

mod detect;
mod format;
pub mod tokenize;
mod validate;

pub use detect::detect_sql_dialect;
pub use format::format_sql_query;
pub use tokenize::{tokenize, Token, TokenKind, TokenizeError};
pub use validate::{validate_sql_strict, validate_sql_syntax, SyntaxCheck};
