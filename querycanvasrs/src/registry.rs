use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use uuid::Uuid;

use crate::catalog::SchemaCatalog;
use crate::config::CanvasConfig;
use crate::error::{QueryCanvasError, Result};
use crate::ids::IdGenerator;
use crate::models::{Position, QueryTable, SchemaTable};

/// Tables currently placed on the canvas.
pub struct QueryTableRegistry {
    tables: Vec<QueryTable>,
    catalog: Arc<SchemaCatalog>,
    ids: Arc<dyn IdGenerator>,
    canvas: CanvasConfig,
    rng: StdRng,
}

impl QueryTableRegistry {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        ids: Arc<dyn IdGenerator>,
        canvas: CanvasConfig,
    ) -> Self {
        Self::with_rng(catalog, ids, canvas, StdRng::from_entropy())
    }

    /// Fixed RNG for the random fallback placement.
    pub fn with_rng(
        catalog: Arc<SchemaCatalog>,
        ids: Arc<dyn IdGenerator>,
        canvas: CanvasConfig,
        rng: StdRng,
    ) -> Self {
        Self {
            tables: Vec::new(),
            catalog,
            ids,
            canvas,
            rng,
        }
    }

    /// Place a schema table. A table with the same name that is already on the
    /// canvas without an alias is returned instead of adding a second copy.
    pub fn add_table(&mut self, schema_table: &SchemaTable) -> QueryTable {
        if let Some(existing) = self
            .tables
            .iter()
            .find(|t| t.name == schema_table.name && t.alias.is_none())
        {
            tracing::debug!(table = %schema_table.name, "table already on canvas");
            return existing.clone();
        }
        self.place(schema_table, None)
    }

    /// Place another instance of a table under an alias (self joins).
    pub fn add_table_with_alias(
        &mut self,
        schema_table: &SchemaTable,
        alias: impl Into<String>,
    ) -> QueryTable {
        self.place(schema_table, Some(alias.into()))
    }

    pub fn add_table_by_name(&mut self, name: &str) -> Result<QueryTable> {
        let schema_table = self
            .catalog
            .get_table(name)
            .cloned()
            .ok_or_else(|| QueryCanvasError::Schema(format!("unknown table {name}")))?;
        Ok(self.add_table(&schema_table))
    }

    fn place(&mut self, schema_table: &SchemaTable, alias: Option<String>) -> QueryTable {
        let position = find_available_position(&self.tables, &self.canvas, &mut self.rng);
        let table = QueryTable {
            id: self.ids.next_id(),
            name: schema_table.name.clone(),
            schema: schema_table.schema.clone(),
            alias,
            position,
            columns: schema_table.columns.clone(),
        };
        tracing::debug!(
            table = %table.name,
            id = %table.id,
            x = position.x,
            y = position.y,
            "placed table"
        );
        self.tables.push(table.clone());
        table
    }

    /// Remove a table. Joins and conditions that reference it are left alone.
    pub fn remove_table(&mut self, id: Uuid) -> Option<QueryTable> {
        let idx = self.tables.iter().position(|t| t.id == id)?;
        let removed = self.tables.remove(idx);
        tracing::debug!(table = %removed.name, id = %id, "removed table");
        Some(removed)
    }

    pub fn update_position(&mut self, id: Uuid, position: Position) -> Result<()> {
        self.get_mut(id)?.position = position;
        Ok(())
    }

    /// Drag-and-drop target: clamp the drop point onto the canvas, then store it.
    pub fn drop_table_at(&mut self, id: Uuid, position: Position) -> Result<Position> {
        let clamped = clamp_position(position, &self.canvas);
        self.update_position(id, clamped)?;
        Ok(clamped)
    }

    pub fn set_alias(&mut self, id: Uuid, alias: Option<String>) -> Result<()> {
        self.get_mut(id)?.alias = alias.filter(|a| !a.trim().is_empty());
        Ok(())
    }

    pub fn get(&self, id: Uuid) -> Option<&QueryTable> {
        self.tables.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut QueryTable> {
        self.tables
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| QueryCanvasError::Validation(format!("unknown table id {id}")))
    }

    pub fn tables(&self) -> &[QueryTable] {
        &self.tables
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    pub fn canvas(&self) -> &CanvasConfig {
        &self.canvas
    }

    /// Replace the placed tables wholesale (loading a saved query).
    pub fn replace_all(&mut self, tables: Vec<QueryTable>) {
        self.tables = tables;
    }
}

/// First free grid slot, scanning rows top to bottom and left to right with
/// table-sized strides; a random on-canvas position when the grid is full.
pub fn find_available_position(
    existing: &[QueryTable],
    canvas: &CanvasConfig,
    rng: &mut impl Rng,
) -> Position {
    let CanvasConfig {
        width,
        height,
        table_width,
        table_height,
        margin,
    } = *canvas;

    // Stored positions are unchecked, so distances are taken in i64.
    let reach_x = i64::from(table_width) + i64::from(margin);
    let reach_y = i64::from(table_height) + i64::from(margin);

    let mut y = margin;
    while y < height - table_height {
        let mut x = margin;
        while x < width - table_width {
            let overlaps = existing.iter().any(|t| {
                i64::from(t.position.x.abs_diff(x)) < reach_x
                    && i64::from(t.position.y.abs_diff(y)) < reach_y
            });
            if !overlaps {
                return Position::new(x, y);
            }
            x += table_width + margin;
        }
        y += table_height + margin;
    }

    let max_x = (width - table_width).max(0);
    let max_y = (height - table_height).max(0);
    tracing::debug!(tables = existing.len(), "canvas grid full, placing randomly");
    Position::new(rng.gen_range(0..=max_x), rng.gen_range(0..=max_y))
}

/// Clamp into `[0, width - table_width] x [0, height - table_height]`.
pub fn clamp_position(position: Position, canvas: &CanvasConfig) -> Position {
    let max_x = (canvas.width - canvas.table_width).max(0);
    let max_y = (canvas.height - canvas.table_height).max(0);
    Position::new(position.x.clamp(0, max_x), position.y.clamp(0, max_y))
}
