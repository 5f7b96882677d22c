use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dialect::SqlDialect;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaColumn {
    pub name: String,
    #[serde(rename = "type")]
    pub data_type: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    #[serde(default)]
    pub index: bool,
}

fn default_true() -> bool {
    true
}

impl SchemaColumn {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            primary_key: false,
            foreign_key: None,
            index: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaTable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl SchemaTable {
    pub fn new(name: impl Into<String>, columns: Vec<SchemaColumn>) -> Self {
        Self {
            name: name.into(),
            schema: None,
            columns,
            row_count: None,
            comment: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A schema table placed on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryTable {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub position: Position,
    #[serde(default)]
    pub columns: Vec<SchemaColumn>,
}

impl QueryTable {
    /// Name used to qualify this table's columns: the alias when set.
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c.name == column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
    Cross,
}

impl JoinType {
    pub fn keyword(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
            JoinType::Cross => "CROSS",
        }
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
}

impl JoinOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            JoinOperator::Eq => "=",
            JoinOperator::Neq => "<>",
            JoinOperator::Lt => "<",
            JoinOperator::Gt => ">",
            JoinOperator::Lte => "<=",
            JoinOperator::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinCondition {
    pub left_column: String,
    pub operator: JoinOperator,
    pub right_column: String,
}

impl JoinCondition {
    pub fn new(
        left_column: impl Into<String>,
        operator: JoinOperator,
        right_column: impl Into<String>,
    ) -> Self {
        Self {
            left_column: left_column.into(),
            operator,
            right_column: right_column.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryJoin {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub join_type: JoinType,
    pub left_table: Option<Uuid>,
    pub right_table: Option<Uuid>,
    #[serde(default)]
    pub conditions: Vec<JoinCondition>,
}

impl QueryJoin {
    /// Conditions that take part in rendering; CROSS joins keep theirs stored but unused.
    pub fn effective_conditions(&self) -> &[JoinCondition] {
        match self.join_type {
            JoinType::Cross => &[],
            _ => &self.conditions,
        }
    }

    pub fn references(&self, table_id: Uuid) -> bool {
        self.left_table == Some(table_id) || self.right_table == Some(table_id)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhereOperator {
    #[default]
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "<>")]
    Neq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "IS NULL")]
    IsNull,
    #[serde(rename = "IS NOT NULL")]
    IsNotNull,
}

impl WhereOperator {
    pub const ALL: [WhereOperator; 12] = [
        WhereOperator::Eq,
        WhereOperator::Neq,
        WhereOperator::Lt,
        WhereOperator::Gt,
        WhereOperator::Lte,
        WhereOperator::Gte,
        WhereOperator::Like,
        WhereOperator::In,
        WhereOperator::NotIn,
        WhereOperator::Between,
        WhereOperator::IsNull,
        WhereOperator::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WhereOperator::Eq => "=",
            WhereOperator::Neq => "<>",
            WhereOperator::Lt => "<",
            WhereOperator::Gt => ">",
            WhereOperator::Lte => "<=",
            WhereOperator::Gte => ">=",
            WhereOperator::Like => "LIKE",
            WhereOperator::In => "IN",
            WhereOperator::NotIn => "NOT IN",
            WhereOperator::Between => "BETWEEN",
            WhereOperator::IsNull => "IS NULL",
            WhereOperator::IsNotNull => "IS NOT NULL",
        }
    }

    pub fn needs_value(&self) -> bool {
        !matches!(self, WhereOperator::IsNull | WhereOperator::IsNotNull)
    }

    pub fn needs_second_value(&self) -> bool {
        matches!(self, WhereOperator::Between)
    }

    pub fn takes_list(&self) -> bool {
        matches!(self, WhereOperator::In | WhereOperator::NotIn)
    }
}

impl fmt::Display for WhereOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operand of a where row. Serializes as `null`, a string, or an array of strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    #[default]
    None,
    Scalar(String),
    List(Vec<String>),
}

impl ConditionValue {
    /// Split free text on commas, as typed into a list input.
    pub fn parse_list(text: &str) -> Self {
        ConditionValue::List(
            text.split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect(),
        )
    }

    /// Reshape the value for an operator: lists for IN, scalars for comparisons,
    /// nothing for null tests.
    pub fn coerce_for(self, op: WhereOperator) -> Self {
        if !op.needs_value() {
            return ConditionValue::None;
        }
        match (self, op.takes_list()) {
            (ConditionValue::Scalar(s), true) => ConditionValue::parse_list(&s),
            (ConditionValue::List(items), false) => ConditionValue::Scalar(items.join(", ")),
            (ConditionValue::None, true) => ConditionValue::List(Vec::new()),
            (ConditionValue::None, false) => ConditionValue::Scalar(String::new()),
            (other, _) => other,
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            ConditionValue::None => true,
            ConditionValue::Scalar(s) => s.trim().is_empty(),
            ConditionValue::List(items) => items.iter().all(|v| v.trim().is_empty()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the where editor. Grouping is expressed with per-row
/// `group_start` / `group_end` flags and turned into a tree before rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhereCondition {
    pub id: Uuid,
    pub column: String,
    pub operator: WhereOperator,
    #[serde(default)]
    pub value: ConditionValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value2: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
    #[serde(default)]
    pub group_start: bool,
    #[serde(default)]
    pub group_end: bool,
    /// The scalar value holds the text of a subquery.
    #[serde(default)]
    pub is_subquery: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Aggregate {
    Count,
    CountDistinct,
    Sum,
    Avg,
    Min,
    Max,
}

impl Aggregate {
    pub fn render(&self, expr: &str) -> String {
        match self {
            Aggregate::Count => format!("COUNT({expr})"),
            Aggregate::CountDistinct => format!("COUNT(DISTINCT {expr})"),
            Aggregate::Sum => format!("SUM({expr})"),
            Aggregate::Avg => format!("AVG({expr})"),
            Aggregate::Min => format!("MIN({expr})"),
            Aggregate::Max => format!("MAX({expr})"),
        }
    }
}

/// A projected column. `column == "*"` selects everything (of `table` when set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
}

impl SelectedColumn {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            table: None,
            column: column.into(),
            alias: None,
            aggregate: None,
        }
    }

    pub fn of(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            ..Self::new(column)
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn aggregated(mut self, aggregate: Aggregate) -> Self {
        self.aggregate = Some(aggregate);
        self
    }

    /// Result-set column name this projection produces.
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.column)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderByColumn {
    pub column: String,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nulls_first: Option<bool>,
}

impl OrderByColumn {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
            nulls_first: None,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            direction: SortDirection::Desc,
            ..Self::asc(column)
        }
    }
}

/// Serializable snapshot of everything the renderer needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualQuery {
    pub name: String,
    pub dialect: SqlDialect,
    pub tables: Vec<QueryTable>,
    pub joins: Vec<QueryJoin>,
    pub where_conditions: Vec<WhereCondition>,
    pub select_columns: Vec<SelectedColumn>,
    pub group_by: Vec<String>,
    /// Filters on grouped rows; same row model as `where_conditions`.
    pub having_conditions: Vec<WhereCondition>,
    pub order_by: Vec<OrderByColumn>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl VisualQuery {
    pub fn table(&self, id: Uuid) -> Option<&QueryTable> {
        self.tables.iter().find(|t| t.id == id)
    }
}
