//! Typed filter tree built from the flat where rows.
//!
//! The where editor stores rows with a connector and group flags; rendering
//! goes through this tree so AND/OR precedence and parenthesis balance are
//! checked once, not rediscovered in string concatenation.

use serde::{Deserialize, Serialize};

use crate::dialect::Dialect;
use crate::error::{QueryCanvasError, Result};
use crate::models::{ConditionValue, LogicalOperator, WhereCondition, WhereOperator};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "items", rename_all = "snake_case")]
pub enum Predicate {
    Comparison(Comparison),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Group(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub column: String,
    pub test: Test,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Neq => "<>",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Lte => "<=",
            CompareOp::Gte => ">=",
        }
    }
}

/// Right-hand side of a comparison. Values are literal SQL tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Test {
    Compare { op: CompareOp, value: String },
    Like { value: String },
    In { negated: bool, values: Vec<String> },
    Between { low: String, high: String },
    IsNull { negated: bool },
}

impl Predicate {
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        match self {
            Predicate::Comparison(cmp) => cmp.render(dialect),
            Predicate::And(items) => items
                .iter()
                .map(|p| match p {
                    // only reachable for hand-built trees
                    Predicate::Or(_) => format!("({})", p.render(dialect)),
                    _ => p.render(dialect),
                })
                .collect::<Vec<_>>()
                .join(" AND "),
            Predicate::Or(items) => items
                .iter()
                .map(|p| p.render(dialect))
                .collect::<Vec<_>>()
                .join(" OR "),
            Predicate::Group(inner) => format!("({})", inner.render(dialect)),
        }
    }

    /// Number of comparisons in the tree.
    pub fn len(&self) -> usize {
        match self {
            Predicate::Comparison(_) => 1,
            Predicate::And(items) | Predicate::Or(items) => items.iter().map(Predicate::len).sum(),
            Predicate::Group(inner) => inner.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Comparison {
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        let column = dialect.quote_path(&self.column);
        match &self.test {
            Test::Compare { op, value } => format!("{column} {} {value}", op.as_str()),
            Test::Like { value } => format!("{column} LIKE {value}"),
            Test::In { negated, values } => {
                let kw = if *negated { "NOT IN" } else { "IN" };
                format!("{column} {kw} ({})", values.join(", "))
            }
            Test::Between { low, high } => format!("{column} BETWEEN {low} AND {high}"),
            Test::IsNull { negated: false } => format!("{column} IS NULL"),
            Test::IsNull { negated: true } => format!("{column} IS NOT NULL"),
        }
    }
}

/// Convert one where row into a comparison, rejecting rows that would render
/// as broken SQL.
pub fn comparison_from_row(position: usize, row: &WhereCondition) -> Result<Comparison> {
    let column = row.column.trim();
    if column.is_empty() {
        return Err(row_error(position, "has no column"));
    }
    let op = row.operator;
    if op.needs_value() && row.value.is_blank() {
        return Err(row_error(position, &format!("needs a value for {op}")));
    }

    let scalar = || {
        let text = match &row.value {
            ConditionValue::Scalar(s) => s.trim().to_string(),
            ConditionValue::List(items) => items.join(", "),
            ConditionValue::None => String::new(),
        };
        if row.is_subquery && !(text.starts_with('(') && text.ends_with(')')) {
            format!("({text})")
        } else {
            text
        }
    };

    let test = match op {
        WhereOperator::Eq => compare(CompareOp::Eq, scalar()),
        WhereOperator::Neq => compare(CompareOp::Neq, scalar()),
        WhereOperator::Lt => compare(CompareOp::Lt, scalar()),
        WhereOperator::Gt => compare(CompareOp::Gt, scalar()),
        WhereOperator::Lte => compare(CompareOp::Lte, scalar()),
        WhereOperator::Gte => compare(CompareOp::Gte, scalar()),
        WhereOperator::Like => Test::Like { value: scalar() },
        WhereOperator::In | WhereOperator::NotIn => {
            let values: Vec<String> = match &row.value {
                ConditionValue::List(items) => items
                    .iter()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect(),
                _ if row.is_subquery => {
                    let text = scalar();
                    let inner = text[1..text.len() - 1].trim();
                    if inner.is_empty() {
                        Vec::new()
                    } else {
                        vec![inner.to_string()]
                    }
                }
                ConditionValue::Scalar(s) => match ConditionValue::parse_list(s) {
                    ConditionValue::List(items) => items,
                    _ => Vec::new(),
                },
                ConditionValue::None => Vec::new(),
            };
            if values.is_empty() {
                return Err(row_error(position, &format!("needs at least one value for {op}")));
            }
            Test::In {
                negated: op == WhereOperator::NotIn,
                values,
            }
        }
        WhereOperator::Between => {
            let high = row
                .value2
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| row_error(position, "needs a second value for BETWEEN"))?;
            Test::Between {
                low: scalar(),
                high: high.to_string(),
            }
        }
        WhereOperator::IsNull => Test::IsNull { negated: false },
        WhereOperator::IsNotNull => Test::IsNull { negated: true },
    };

    Ok(Comparison {
        column: column.to_string(),
        test,
    })
}

fn compare(op: CompareOp, value: String) -> Test {
    Test::Compare { op, value }
}

fn row_error(position: usize, msg: &str) -> QueryCanvasError {
    QueryCanvasError::Validation(format!("where condition {} {msg}", position + 1))
}

#[derive(Debug)]
enum Token {
    Open,
    Close,
    Conn(LogicalOperator),
    Atom(Comparison),
}

/// Build the tree for a list of rows. The first row's connector is ignored;
/// a missing connector on a later row reads as AND.
pub fn build_predicate(rows: &[WhereCondition]) -> Result<Option<Predicate>> {
    if rows.is_empty() {
        return Ok(None);
    }

    let mut tokens = Vec::with_capacity(rows.len() * 2);
    let mut depth: i32 = 0;
    for (i, row) in rows.iter().enumerate() {
        if i > 0 {
            tokens.push(Token::Conn(row.logical_operator.unwrap_or_default()));
        }
        if row.group_start {
            tokens.push(Token::Open);
            depth += 1;
        }
        tokens.push(Token::Atom(comparison_from_row(i, row)?));
        if row.group_end {
            tokens.push(Token::Close);
            depth -= 1;
            if depth < 0 {
                return Err(QueryCanvasError::Validation(format!(
                    "where condition {} closes a group that was never opened",
                    i + 1
                )));
            }
        }
    }
    if depth != 0 {
        return Err(QueryCanvasError::Validation(format!(
            "{depth} where group(s) left open"
        )));
    }

    let mut parser = Parser {
        tokens: tokens.into_iter().peekable(),
    };
    let tree = parser.parse_or()?;
    if parser.tokens.next().is_some() {
        return Err(QueryCanvasError::Validation(
            "unexpected trailing where group".to_string(),
        ));
    }
    Ok(Some(tree))
}

struct Parser {
    tokens: std::iter::Peekable<std::vec::IntoIter<Token>>,
}

impl Parser {
    fn parse_or(&mut self) -> Result<Predicate> {
        let mut terms = vec![self.parse_and()?];
        while matches!(self.tokens.peek(), Some(Token::Conn(LogicalOperator::Or))) {
            self.tokens.next();
            terms.push(self.parse_and()?);
        }
        Ok(collapse(terms, Predicate::Or))
    }

    fn parse_and(&mut self) -> Result<Predicate> {
        let mut factors = vec![self.parse_primary()?];
        while matches!(self.tokens.peek(), Some(Token::Conn(LogicalOperator::And))) {
            self.tokens.next();
            factors.push(self.parse_primary()?);
        }
        Ok(collapse(factors, Predicate::And))
    }

    fn parse_primary(&mut self) -> Result<Predicate> {
        match self.tokens.next() {
            Some(Token::Atom(cmp)) => Ok(Predicate::Comparison(cmp)),
            Some(Token::Open) => {
                let inner = self.parse_or()?;
                match self.tokens.next() {
                    Some(Token::Close) => Ok(Predicate::Group(Box::new(inner))),
                    _ => Err(QueryCanvasError::Validation(
                        "where group is not closed".to_string(),
                    )),
                }
            }
            other => Err(QueryCanvasError::Validation(format!(
                "malformed where conditions near {other:?}"
            ))),
        }
    }
}

fn collapse(mut items: Vec<Predicate>, wrap: fn(Vec<Predicate>) -> Predicate) -> Predicate {
    if items.len() == 1 {
        items.remove(0)
    } else {
        wrap(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{GenericDialect, PostgresDialect};
    use uuid::Uuid;

    fn row(column: &str, op: WhereOperator, value: &str) -> WhereCondition {
        WhereCondition {
            id: Uuid::nil(),
            column: column.to_string(),
            operator: op,
            value: ConditionValue::Scalar(value.to_string()),
            value2: None,
            logical_operator: None,
            group_start: false,
            group_end: false,
            is_subquery: false,
        }
    }

    fn with(mut r: WhereCondition, conn: LogicalOperator) -> WhereCondition {
        r.logical_operator = Some(conn);
        r
    }

    fn render(rows: &[WhereCondition]) -> String {
        build_predicate(rows)
            .unwrap()
            .map(|p| p.render(&GenericDialect))
            .unwrap_or_default()
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let rows = vec![
            row("a", WhereOperator::Eq, "1"),
            with(row("b", WhereOperator::Eq, "2"), LogicalOperator::And),
            with(row("c", WhereOperator::Eq, "3"), LogicalOperator::Or),
        ];
        let tree = build_predicate(&rows).unwrap().unwrap();
        match &tree {
            Predicate::Or(terms) => {
                assert_eq!(terms.len(), 2);
                assert!(matches!(terms[0], Predicate::And(_)));
            }
            other => panic!("expected OR at the root, got {other:?}"),
        }
        assert_eq!(tree.render(&GenericDialect), "a = 1 AND b = 2 OR c = 3");
        assert_eq!(tree.len(), 3);
    }

    #[test]
    fn group_flags_become_parentheses() {
        let mut b = with(row("b", WhereOperator::Eq, "2"), LogicalOperator::And);
        b.group_start = true;
        let mut c = with(row("c", WhereOperator::Eq, "3"), LogicalOperator::Or);
        c.group_end = true;
        let rows = vec![row("a", WhereOperator::Eq, "1"), b, c];
        assert_eq!(render(&rows), "a = 1 AND (b = 2 OR c = 3)");
    }

    #[test]
    fn unbalanced_groups_are_rejected() {
        let mut a = row("a", WhereOperator::Eq, "1");
        a.group_start = true;
        assert!(matches!(
            build_predicate(&[a]),
            Err(QueryCanvasError::Validation(_))
        ));

        let mut b = row("b", WhereOperator::Eq, "1");
        b.group_end = true;
        assert!(build_predicate(&[b]).is_err());
    }

    #[test]
    fn operator_shapes() {
        let mut between = row("price", WhereOperator::Between, "10");
        between.value2 = Some("20".into());
        assert_eq!(render(&[between]), "price BETWEEN 10 AND 20");

        let mut inlist = row("id", WhereOperator::In, "");
        inlist.value = ConditionValue::List(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(render(&[inlist]), "id IN (a, b, c)");

        let not_in = row("id", WhereOperator::NotIn, "1, 2");
        assert_eq!(render(&[not_in]), "id NOT IN (1, 2)");

        let mut null = row("deleted_at", WhereOperator::IsNotNull, "");
        null.value = ConditionValue::None;
        assert_eq!(render(&[null]), "deleted_at IS NOT NULL");

        let like = row("name", WhereOperator::Like, "'J%'");
        assert_eq!(render(&[like]), "name LIKE 'J%'");
    }

    #[test]
    fn subquery_value_is_parenthesized() {
        let mut r = row("user_id", WhereOperator::Eq, "SELECT max(id) FROM users");
        r.is_subquery = true;
        assert_eq!(render(&[r]), "user_id = (SELECT max(id) FROM users)");

        let mut r = row("user_id", WhereOperator::In, "SELECT id FROM admins");
        r.is_subquery = true;
        assert_eq!(render(&[r]), "user_id IN (SELECT id FROM admins)");
    }

    #[test]
    fn incomplete_rows_are_validation_errors() {
        assert!(build_predicate(&[row("", WhereOperator::Eq, "1")]).is_err());
        assert!(build_predicate(&[row("a", WhereOperator::Eq, "  ")]).is_err());
        assert!(build_predicate(&[row("a", WhereOperator::Between, "1")]).is_err());
        assert!(build_predicate(&[row("id", WhereOperator::In, ",")]).is_err());
        assert!(build_predicate(&[row("id", WhereOperator::NotIn, " , ")]).is_err());
        assert_eq!(build_predicate(&[]).unwrap(), None);
    }

    #[test]
    fn columns_are_quoted_by_dialect() {
        let tree = build_predicate(&[row("orders.status", WhereOperator::Eq, "'x'")])
            .unwrap()
            .unwrap();
        assert_eq!(tree.render(&PostgresDialect), "\"orders\".\"status\" = 'x'");
    }
}
