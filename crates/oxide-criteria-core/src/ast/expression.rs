//! Expression AST types.

use std::fmt;

use super::predicate::Predicate;
use super::statement::{OrderByExpression, QuerySpec};
use crate::value::{SqlValue, ToSqlValue};

/// A literal written in expression text.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer literal.
    Integer(i64),
    /// Decimal literal.
    Decimal(f64),
    /// String literal.
    String(String),
    /// Boolean literal.
    Boolean(bool),
    /// NULL literal.
    Null,
    /// `CURRENT_DATE`.
    CurrentDate,
    /// `CURRENT_TIME`.
    CurrentTime,
    /// `CURRENT_TIMESTAMP`.
    CurrentTimestamp,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Decimal(d) => write!(f, "{d:?}"),
            Self::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Boolean(true) => f.write_str("TRUE"),
            Self::Boolean(false) => f.write_str("FALSE"),
            Self::Null => f.write_str("NULL"),
            Self::CurrentDate => f.write_str("CURRENT_DATE"),
            Self::CurrentTime => f.write_str("CURRENT_TIME"),
            Self::CurrentTimestamp => f.write_str("CURRENT_TIMESTAMP"),
        }
    }
}

/// A query parameter reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parameter {
    /// `:name`
    Named(String),
    /// `?1`
    Positional(u32),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => write!(f, ":{name}"),
            Self::Positional(position) => write!(f, "?{position}"),
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithmeticOperator {
    Add,
    Sub,
    Mul,
    Div,
}

impl ArithmeticOperator {
    /// Returns the SQL representation of the operator.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
        }
    }

    /// Returns the operator precedence (higher binds tighter).
    #[must_use]
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul | Self::Div => 2,
        }
    }
}

/// A dotted path such as `c.owner.name`.
///
/// The first segment is usually an alias. A path without a known alias is
/// resolved against the single query root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PathExpression {
    /// Path segments in order.
    pub segments: Vec<String>,
}

impl PathExpression {
    /// Creates a path from its segments.
    #[must_use]
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Splits a dotted string into a path without validating it.
    #[must_use]
    pub fn parse_simple(path: &str) -> Self {
        Self::new(path.split('.').map(str::trim))
    }

    /// The first segment.
    #[must_use]
    pub fn head(&self) -> &str {
        self.segments.first().map_or("", String::as_str)
    }

    /// Everything after the first segment.
    #[must_use]
    pub fn tail(&self) -> &[String] {
        self.segments.get(1..).unwrap_or_default()
    }

    /// The last segment.
    #[must_use]
    pub fn last(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Returns true for a single-segment path.
    #[must_use]
    pub fn is_simple(&self) -> bool {
        self.segments.len() == 1
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Collection operators applied to a path or join alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionOperator {
    /// `SIZE(path)`: number of elements of a collection.
    Size,
    /// `INDEX(alias)`: list index of a joined element.
    Index,
    /// `KEY(alias)`: map key of a joined element.
    Key,
    /// `VALUE(alias)`: map value of a joined element.
    Value,
}

impl CollectionOperator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Size => "SIZE",
            Self::Index => "INDEX",
            Self::Key => "KEY",
            Self::Value => "VALUE",
        }
    }
}

/// A function call.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExpression {
    /// Upper-cased function name.
    pub name: String,
    /// Arguments. `COUNT(*)` has none.
    pub args: Vec<Expression>,
    /// `DISTINCT` inside an aggregate.
    pub distinct: bool,
    /// `FILTER (WHERE ...)` of an aggregate.
    pub filter: Option<Box<Predicate>>,
}

impl FunctionExpression {
    /// Creates a plain function call.
    #[must_use]
    pub fn new(name: &str, args: Vec<Expression>) -> Self {
        Self {
            name: name.to_ascii_uppercase(),
            args,
            distinct: false,
            filter: None,
        }
    }
}

/// Start or end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameBound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl fmt::Display for FrameBound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundedPreceding => f.write_str("UNBOUNDED PRECEDING"),
            Self::Preceding(n) => write!(f, "{n} PRECEDING"),
            Self::CurrentRow => f.write_str("CURRENT ROW"),
            Self::Following(n) => write!(f, "{n} FOLLOWING"),
            Self::UnboundedFollowing => f.write_str("UNBOUNDED FOLLOWING"),
        }
    }
}

/// Frame unit of a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Rows,
    Range,
    Groups,
}

impl FrameMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rows => "ROWS",
            Self::Range => "RANGE",
            Self::Groups => "GROUPS",
        }
    }
}

/// A window frame clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowFrame {
    pub mode: FrameMode,
    pub start: FrameBound,
    pub end: Option<FrameBound>,
}

impl fmt::Display for WindowFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} BETWEEN {} AND {end}", self.mode.as_str(), self.start),
            None => write!(f, "{} {}", self.mode.as_str(), self.start),
        }
    }
}

/// The body of a window specification.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowDefinition {
    /// Named window this definition extends.
    pub base: Option<String>,
    pub partition_by: Vec<Expression>,
    pub order_by: Vec<OrderByExpression>,
    pub frame: Option<WindowFrame>,
}

impl fmt::Display for WindowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(base) = &self.base {
            parts.push(base.clone());
        }
        if !self.partition_by.is_empty() {
            parts.push(format!("PARTITION BY {}", join(&self.partition_by)));
        }
        if !self.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", join(&self.order_by)));
        }
        if let Some(frame) = &self.frame {
            parts.push(frame.to_string());
        }
        f.write_str(&parts.join(" "))
    }
}

/// Reference from a window function to its window.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowReference {
    /// `OVER name`
    Named(String),
    /// `OVER (...)`
    Inline(WindowDefinition),
}

/// A function evaluated over a window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowExpression {
    pub function: FunctionExpression,
    pub window: WindowReference,
}

/// One `WHEN ... THEN ...` branch.
#[derive(Debug, Clone, PartialEq)]
pub struct WhenClause {
    /// A predicate for searched CASE, a comparand for simple CASE.
    pub condition: Expression,
    pub result: Expression,
}

/// `CASE [operand] WHEN ... THEN ... [ELSE ...] END`
#[derive(Debug, Clone, PartialEq)]
pub struct CaseWhenExpression {
    pub operand: Option<Box<Expression>>,
    pub when_clauses: Vec<WhenClause>,
    pub else_result: Option<Box<Expression>>,
}

/// A subquery built through a subquery builder.
#[derive(Debug, Clone, PartialEq)]
pub struct SubqueryExpression {
    pub query: Box<QuerySpec>,
}

impl SubqueryExpression {
    #[must_use]
    pub fn new(query: QuerySpec) -> Self {
        Self {
            query: Box::new(query),
        }
    }
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Attribute path.
    Path(PathExpression),
    /// `OUTER(path)`: a path resolved against the enclosing query.
    Outer(PathExpression),
    /// Literal from expression text.
    Literal(Literal),
    /// Named or positional parameter.
    Parameter(Parameter),
    /// A value that is always bound as a statement parameter.
    Value(SqlValue),
    /// Function call.
    Function(FunctionExpression),
    /// Window function call.
    Window(Box<WindowExpression>),
    /// Binary arithmetic.
    Arithmetic {
        op: ArithmeticOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    /// Unary minus.
    Negation(Box<Expression>),
    /// CASE expression.
    CaseWhen(CaseWhenExpression),
    /// `SIZE`, `INDEX`, `KEY` or `VALUE`.
    Collection {
        op: CollectionOperator,
        path: PathExpression,
    },
    /// Subquery.
    Subquery(SubqueryExpression),
    /// Placeholder for a subquery that is supplied through a builder.
    SubqueryRef(String),
    /// Row value `(a, b, ...)`.
    Tuple(Vec<Expression>),
    /// A predicate used as a boolean expression.
    Predicate(Box<Predicate>),
}

impl Expression {
    /// Creates a path expression from dotted text without validation.
    #[must_use]
    pub fn path(path: &str) -> Self {
        Self::Path(PathExpression::parse_simple(path))
    }

    /// Creates a bound value.
    #[must_use]
    pub fn value(value: impl ToSqlValue) -> Self {
        Self::Value(value.to_sql_value())
    }

    /// Creates a named parameter reference.
    #[must_use]
    pub fn parameter(name: &str) -> Self {
        Self::Parameter(Parameter::Named(String::from(name)))
    }

    /// Creates a function call.
    #[must_use]
    pub fn function(name: &str, args: Vec<Self>) -> Self {
        Self::Function(FunctionExpression::new(name, args))
    }

    /// Creates an arithmetic expression.
    #[must_use]
    pub fn arithmetic(op: ArithmeticOperator, left: Self, right: Self) -> Self {
        Self::Arithmetic {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Returns the path if this is a plain path expression.
    #[must_use]
    pub const fn as_path(&self) -> Option<&PathExpression> {
        match self {
            Self::Path(path) => Some(path),
            _ => None,
        }
    }
}

impl From<PathExpression> for Expression {
    fn from(path: PathExpression) -> Self {
        Self::Path(path)
    }
}

impl From<Predicate> for Expression {
    fn from(predicate: Predicate) -> Self {
        Self::Predicate(Box::new(predicate))
    }
}

pub(crate) fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for FunctionExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        if self.args.is_empty() && self.name == "COUNT" {
            f.write_str("*")?;
        } else {
            f.write_str(&join(&self.args))?;
        }
        f.write_str(")")?;
        if let Some(filter) = &self.filter {
            write!(f, " FILTER (WHERE {filter})")?;
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{path}"),
            Self::Outer(path) => write!(f, "OUTER({path})"),
            Self::Literal(literal) => write!(f, "{literal}"),
            Self::Parameter(parameter) => write!(f, "{parameter}"),
            Self::Value(value) => write!(f, "{value}"),
            Self::Function(function) => write!(f, "{function}"),
            Self::Window(window) => match &window.window {
                WindowReference::Named(name) => write!(f, "{} OVER {name}", window.function),
                WindowReference::Inline(definition) => {
                    write!(f, "{} OVER ({definition})", window.function)
                }
            },
            Self::Arithmetic { op, left, right } => {
                write_operand(f, left, op.precedence(), false)?;
                write!(f, " {} ", op.as_str())?;
                write_operand(f, right, op.precedence(), true)
            }
            Self::Negation(inner) => {
                if matches!(inner.as_ref(), Self::Arithmetic { .. }) {
                    write!(f, "-({inner})")
                } else {
                    write!(f, "-{inner}")
                }
            }
            Self::CaseWhen(case) => {
                f.write_str("CASE")?;
                if let Some(operand) = &case.operand {
                    write!(f, " {operand}")?;
                }
                for clause in &case.when_clauses {
                    write!(f, " WHEN {} THEN {}", clause.condition, clause.result)?;
                }
                if let Some(otherwise) = &case.else_result {
                    write!(f, " ELSE {otherwise}")?;
                }
                f.write_str(" END")
            }
            Self::Collection { op, path } => write!(f, "{}({path})", op.as_str()),
            Self::Subquery(subquery) => write!(f, "({})", subquery.query),
            Self::SubqueryRef(name) => f.write_str(name),
            Self::Tuple(items) => write!(f, "({})", join(items)),
            Self::Predicate(predicate) => write!(f, "{predicate}"),
        }
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    operand: &Expression,
    parent_precedence: u8,
    right_side: bool,
) -> fmt::Result {
    if let Expression::Arithmetic { op, .. } = operand {
        let precedence = op.precedence();
        if precedence < parent_precedence || (right_side && precedence == parent_precedence) {
            return write!(f, "({operand})");
        }
    }
    write!(f, "{operand}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_parts() {
        let path = PathExpression::parse_simple("c.owner.name");
        assert_eq!(path.head(), "c");
        assert_eq!(path.tail(), ["owner", "name"]);
        assert_eq!(path.last(), "name");
        assert_eq!(path.to_string(), "c.owner.name");
        assert!(PathExpression::parse_simple("age").is_simple());
    }

    #[test]
    fn test_arithmetic_display_keeps_grouping() {
        let sum = Expression::arithmetic(
            ArithmeticOperator::Add,
            Expression::path("c.age"),
            Expression::Literal(Literal::Integer(1)),
        );
        let product = Expression::arithmetic(
            ArithmeticOperator::Mul,
            sum.clone(),
            Expression::Literal(Literal::Integer(2)),
        );
        assert_eq!(product.to_string(), "(c.age + 1) * 2");

        let difference = Expression::arithmetic(
            ArithmeticOperator::Sub,
            Expression::Literal(Literal::Integer(10)),
            sum,
        );
        assert_eq!(difference.to_string(), "10 - (c.age + 1)");
    }

    #[test]
    fn test_function_display() {
        let mut count = FunctionExpression::new("count", vec![]);
        assert_eq!(count.to_string(), "COUNT(*)");
        count.args.push(Expression::path("c.id"));
        count.distinct = true;
        assert_eq!(count.to_string(), "COUNT(DISTINCT c.id)");
    }

    #[test]
    fn test_literal_display() {
        assert_eq!(Literal::Decimal(2.0).to_string(), "2.0");
        assert_eq!(Literal::String(String::from("it's")).to_string(), "'it''s'");
        assert_eq!(Expression::value(30).to_string(), "30");
    }
}
