use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use glob::glob;

use crate::error::{QueryCanvasError, Result};
use crate::models::SchemaTable;

/// Tables available for placement, keyed by name.
#[derive(Debug, Default, Clone)]
pub struct SchemaCatalog {
    tables: BTreeMap<String, SchemaTable>,
}

impl SchemaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_tables(tables: Vec<SchemaTable>) -> Self {
        let mut catalog = SchemaCatalog::new();
        for table in tables {
            catalog.insert(table);
        }
        catalog
    }

    /// Load one table per `*.yml`, `*.yaml` or `*.json` file in `dir`.
    pub fn load_from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(QueryCanvasError::Validation(format!(
                "schema directory not found: {}",
                dir.display()
            )));
        }
        let mut catalog = SchemaCatalog::new();
        for ext in ["yml", "yaml", "json"] {
            for entry in glob_files(&dir, ext)? {
                catalog.load_table_file(&entry)?;
            }
        }
        tracing::debug!(
            dir = %dir.display(),
            tables = catalog.len(),
            "loaded schema catalog"
        );
        Ok(catalog)
    }

    fn load_table_file(&mut self, path: &Path) -> Result<()> {
        let contents = fs::read_to_string(path)?;
        let table: SchemaTable = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&contents)?,
            _ => serde_yaml::from_str(&contents)?,
        };
        if self.tables.contains_key(&table.name) {
            return Err(QueryCanvasError::Schema(format!(
                "table {} defined more than once (again in {})",
                table.name,
                path.display()
            )));
        }
        self.insert(table);
        Ok(())
    }

    pub fn insert(&mut self, table: SchemaTable) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn get_table(&self, name: &str) -> Option<&SchemaTable> {
        self.tables.get(name)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &SchemaTable> {
        self.tables.values()
    }

    /// Case-insensitive match on table name or comment.
    pub fn search(&self, term: &str) -> Vec<&SchemaTable> {
        let needle = term.to_lowercase();
        self.tables
            .values()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.comment
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&needle))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

fn glob_files(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let pattern = format!("{}/*.{ext}", dir.display());
    Ok(glob(&pattern)
        .map_err(|e| QueryCanvasError::Other(e.into()))?
        .flatten()
        .collect())
}
