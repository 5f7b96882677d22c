use std::sync::Arc;

use uuid::Uuid;

use crate::error::{QueryCanvasError, Result};
use crate::ids::IdGenerator;
use crate::models::{ConditionValue, LogicalOperator, WhereCondition, WhereOperator};
use crate::predicate::{build_predicate, Predicate};

/// Ordered where rows as edited in the builder.
pub struct WhereConditionList {
    conditions: Vec<WhereCondition>,
    ids: Arc<dyn IdGenerator>,
}

impl WhereConditionList {
    pub fn new(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            conditions: Vec::new(),
            ids,
        }
    }

    /// Append a blank `=` row. Every row after the first is connected with AND.
    pub fn add_condition(&mut self) -> WhereCondition {
        let condition = WhereCondition {
            id: self.ids.next_id(),
            column: String::new(),
            operator: WhereOperator::Eq,
            value: ConditionValue::Scalar(String::new()),
            value2: None,
            logical_operator: (!self.conditions.is_empty()).then_some(LogicalOperator::And),
            group_start: false,
            group_end: false,
            is_subquery: false,
        };
        tracing::debug!(condition = %condition.id, rows = self.conditions.len() + 1, "added where condition");
        self.conditions.push(condition.clone());
        condition
    }

    pub fn update_condition(&mut self, condition: WhereCondition) -> Result<()> {
        let first = self.conditions.first().map(|c| c.id) == Some(condition.id);
        let slot = self.get_mut(condition.id)?;
        *slot = condition;
        if first {
            slot.logical_operator = None;
        }
        Ok(())
    }

    pub fn remove_condition(&mut self, id: Uuid) -> Option<WhereCondition> {
        let idx = self.conditions.iter().position(|c| c.id == id)?;
        let removed = self.conditions.remove(idx);
        if let Some(first) = self.conditions.first_mut() {
            first.logical_operator = None;
        }
        tracing::debug!(condition = %id, "removed where condition");
        Some(removed)
    }

    /// Change the operator and reshape the stored value to match it.
    pub fn set_operator(&mut self, id: Uuid, operator: WhereOperator) -> Result<()> {
        let cond = self.get_mut(id)?;
        cond.operator = operator;
        cond.value = std::mem::take(&mut cond.value).coerce_for(operator);
        if !operator.needs_second_value() {
            cond.value2 = None;
        }
        Ok(())
    }

    pub fn set_column(&mut self, id: Uuid, column: impl Into<String>) -> Result<()> {
        self.get_mut(id)?.column = column.into();
        Ok(())
    }

    /// Set the value from editor text; list operators split it on commas.
    pub fn set_value(&mut self, id: Uuid, text: &str) -> Result<()> {
        let cond = self.get_mut(id)?;
        cond.value = if cond.operator.takes_list() {
            ConditionValue::parse_list(text)
        } else {
            ConditionValue::Scalar(text.to_string())
        };
        Ok(())
    }

    pub fn set_value2(&mut self, id: Uuid, text: Option<String>) -> Result<()> {
        self.get_mut(id)?.value2 = text;
        Ok(())
    }

    /// Connector before this row. The first row never carries one.
    pub fn set_logical_operator(&mut self, id: Uuid, operator: LogicalOperator) -> Result<()> {
        let first = self.conditions.first().map(|c| c.id) == Some(id);
        let cond = self.get_mut(id)?;
        cond.logical_operator = if first { None } else { Some(operator) };
        Ok(())
    }

    pub fn set_group_start(&mut self, id: Uuid, on: bool) -> Result<()> {
        self.get_mut(id)?.group_start = on;
        Ok(())
    }

    pub fn set_group_end(&mut self, id: Uuid, on: bool) -> Result<()> {
        self.get_mut(id)?.group_end = on;
        Ok(())
    }

    pub fn set_subquery(&mut self, id: Uuid, on: bool) -> Result<()> {
        self.get_mut(id)?.is_subquery = on;
        Ok(())
    }

    pub fn to_predicate(&self) -> Result<Option<Predicate>> {
        build_predicate(&self.conditions)
    }

    /// Row-by-row text shown under the editor; placeholders stand in for
    /// anything not yet filled in.
    pub fn preview(&self) -> String {
        self.conditions
            .iter()
            .enumerate()
            .map(|(i, c)| preview_row(i, c))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn get(&self, id: Uuid) -> Option<&WhereCondition> {
        self.conditions.iter().find(|c| c.id == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Result<&mut WhereCondition> {
        self.conditions
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| QueryCanvasError::Validation(format!("unknown where condition {id}")))
    }

    pub fn conditions(&self) -> &[WhereCondition] {
        &self.conditions
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn replace_all(&mut self, conditions: Vec<WhereCondition>) {
        self.conditions = conditions;
    }
}

fn preview_row(index: usize, c: &WhereCondition) -> String {
    let mut parts: Vec<String> = Vec::new();
    if c.group_start {
        parts.push("(".into());
    }
    if index > 0 {
        if let Some(op) = c.logical_operator {
            parts.push(op.to_string());
        }
    }
    parts.push(if c.column.is_empty() {
        "column".into()
    } else {
        c.column.clone()
    });
    parts.push(c.operator.to_string());

    let or = |s: &str, placeholder: &str| {
        if s.is_empty() {
            placeholder.to_string()
        } else {
            s.to_string()
        }
    };
    match (&c.operator, &c.value) {
        (op, _) if !op.needs_value() => {}
        (WhereOperator::Between, value) => parts.push(format!(
            "{} AND {}",
            or(&value_text(value), "value1"),
            or(c.value2.as_deref().unwrap_or(""), "value2")
        )),
        (op, ConditionValue::List(items)) if op.takes_list() => {
            parts.push(format!("({})", items.join(", ")))
        }
        (op, value) if op.takes_list() => parts.push(format!("({})", value_text(value))),
        (_, value) => parts.push(or(&value_text(value), "value")),
    }

    if c.group_end {
        parts.push(")".into());
    }
    parts.join(" ")
}

fn value_text(value: &ConditionValue) -> String {
    match value {
        ConditionValue::None => String::new(),
        ConditionValue::Scalar(s) => s.clone(),
        ConditionValue::List(items) => items.join(", "),
    }
}
