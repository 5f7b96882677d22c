pub mod backends;
pub mod catalog;
pub mod conditions;
pub mod config;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod explain;
pub mod export;
pub mod history;
pub mod ids;
pub mod joins;
pub mod models;
pub mod predicate;
pub mod registry;
pub mod render;
pub mod session;
pub mod sql_text;

use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Load a schema catalog from disk and open an empty session over it.
pub fn open_session<P: AsRef<Path>>(
    schema_dir: P,
    config: &QueryCanvasConfig,
) -> Result<QuerySession> {
    let catalog = SchemaCatalog::load_from_dir(schema_dir)?;
    tracing::info!(tables = catalog.len(), "schema catalog loaded");
    Ok(QuerySession::new(Arc::new(catalog), config))
}

#[cfg(feature = "duckdb")]
pub use backends::DuckDbExecutor;
pub use catalog::SchemaCatalog;
pub use conditions::WhereConditionList;
pub use config::QueryCanvasConfig;
pub use dialect::{Dialect, SqlDialect};
pub use error::QueryCanvasError;
pub use executor::{ConnectionDescriptor, DatabaseType, QueryExecutor, QueryResult, SimulatedExecutor};
pub use export::{parse_csv, to_csv, to_json, ExportFormat};
pub use history::{QueryHistory, QueryHistoryEntry, StatusFilter};
pub use joins::JoinGraph;
pub use models::{SchemaColumn, SchemaTable, VisualQuery};
pub use predicate::Predicate;
pub use registry::QueryTableRegistry;
pub use render::{render_query, SqlRenderer};
pub use session::{QueryRunner, QuerySession, ValidationIssue};
pub use sql_text::{detect_sql_dialect, format_sql_query, validate_sql_syntax, SyntaxCheck};
