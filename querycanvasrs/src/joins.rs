use std::sync::Arc;

use uuid::Uuid;

use crate::error::{QueryCanvasError, Result};
use crate::ids::IdGenerator;
use crate::models::{JoinCondition, JoinType, QueryJoin};

/// Ordered join specifications between placed tables.
pub struct JoinGraph {
    joins: Vec<QueryJoin>,
    ids: Arc<dyn IdGenerator>,
}

impl JoinGraph {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            joins: Vec::new(),
            ids,
        }
    }

    /// Append an empty INNER join. Needs at least two tables on the canvas.
    pub fn add_join(&mut self, table_count: usize) -> Result<QueryJoin> {
        if table_count < 2 {
            return Err(QueryCanvasError::Validation(format!(
                "a join needs at least two tables, {table_count} placed"
            )));
        }
        let join = QueryJoin {
            id: self.ids.next_id(),
            join_type: JoinType::Inner,
            left_table: None,
            right_table: None,
            conditions: Vec::new(),
        };
        tracing::debug!(join = %join.id, "added join");
        self.joins.push(join.clone());
        Ok(join)
    }

    pub fn update_join(&mut self, join: QueryJoin) -> Result<()> {
        let slot = self.get_mut(join.id)?;
        *slot = join;
        Ok(())
    }

    pub fn remove_join(&mut self, id: Uuid) -> Option<QueryJoin> {
        let idx = self.joins.iter().position(|j| j.id == id)?;
        tracing::debug!(join = %id, "removed join");
        Some(self.joins.remove(idx))
    }

    /// Switching to CROSS keeps the stored conditions; they are just not rendered.
    pub fn set_join_type(&mut self, id: Uuid, join_type: JoinType) -> Result<()> {
        self.get_mut(id)?.join_type = join_type;
        Ok(())
    }

    pub fn set_tables(&mut self, id: Uuid, left: Option<Uuid>, right: Option<Uuid>) -> Result<()> {
        let join = self.get_mut(id)?;
        join.left_table = left;
        join.right_table = right;
        Ok(())
    }

    /// Append a blank `=` condition and return its index.
    pub fn add_condition(&mut self, join_id: Uuid) -> Result<usize> {
        let join = self.get_mut(join_id)?;
        join.conditions.push(JoinCondition::default());
        Ok(join.conditions.len() - 1)
    }

    pub fn update_condition(
        &mut self,
        join_id: Uuid,
        index: usize,
        condition: JoinCondition,
    ) -> Result<()> {
        let join = self.get_mut(join_id)?;
        let slot = join
            .conditions
            .get_mut(index)
            .ok_or_else(|| condition_out_of_range(join_id, index))?;
        *slot = condition;
        Ok(())
    }

    pub fn remove_condition(&mut self, join_id: Uuid, index: usize) -> Result<JoinCondition> {
        let join = self.get_mut(join_id)?;
        if index >= join.conditions.len() {
            return Err(condition_out_of_range(join_id, index));
        }
        Ok(join.conditions.remove(index))
    }

    /// Joins whose left or right side points at `table_id`.
    pub fn references_table(&self, table_id: Uuid) -> Vec<&QueryJoin> {
        self.joins.iter().filter(|j| j.references(table_id)).collect()
    }

    pub fn get(&self, id: Uuid) -> Option<&QueryJoin> {
        self.joins.iter().find(|j| j.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut QueryJoin> {
        self.joins
            .iter_mut()
            .find(|j| j.id == id)
            .ok_or_else(|| QueryCanvasError::Validation(format!("unknown join id {id}")))
    }

    pub fn joins(&self) -> &[QueryJoin] {
        &self.joins
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    pub fn replace_all(&mut self, joins: Vec<QueryJoin>) {
        self.joins = joins;
    }
}

fn condition_out_of_range(join_id: Uuid, index: usize) -> QueryCanvasError {
    QueryCanvasError::Validation(format!("join {join_id} has no condition at index {index}"))
}
