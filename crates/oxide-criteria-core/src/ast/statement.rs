//! Query and statement AST types.
//!
//! `Display` renders the JPQL-like form that builders report through
//! `get_query_string`. SQL is produced by the renderer instead.

use std::fmt;

use super::expression::{Expression, PathExpression, WindowDefinition, join};
use super::predicate::Predicate;
use super::types::ValueType;
use crate::value::SqlValue;

/// Join type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Returns the SQL keywords for the join.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Inner => "INNER JOIN",
            Self::Left => "LEFT JOIN",
            Self::Right => "RIGHT JOIN",
            Self::Full => "FULL JOIN",
        }
    }
}

/// An ORDER BY item with the metadata needed for null ordering and keysets.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderByExpression {
    pub expression: Expression,
    pub ascending: bool,
    /// Resolved null precedence; never left to the database default.
    pub nulls_first: bool,
    /// Whether the expression can evaluate to NULL.
    pub nullable: bool,
    /// Whether the expression identifies a row uniquely.
    pub unique: bool,
    pub result_type: ValueType,
}

impl OrderByExpression {
    /// Creates an item with conservative metadata: nullable and not unique.
    #[must_use]
    pub fn new(expression: Expression, ascending: bool, nulls_first: bool) -> Self {
        Self {
            expression,
            ascending,
            nulls_first,
            nullable: true,
            unique: false,
            result_type: ValueType::Unknown,
        }
    }

    /// Marks the expression as never NULL.
    #[must_use]
    pub const fn non_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Marks the expression as unique.
    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The same item with direction and null precedence inverted.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            ascending: !self.ascending,
            nulls_first: !self.nulls_first,
            ..self.clone()
        }
    }
}

impl fmt::Display for OrderByExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} NULLS {}",
            self.expression,
            if self.ascending { "ASC" } else { "DESC" },
            if self.nulls_first { "FIRST" } else { "LAST" }
        )
    }
}

/// A select list item.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectItem {
    pub expression: Expression,
    pub alias: Option<String>,
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{} AS {alias}", self.expression),
            None => write!(f, "{}", self.expression),
        }
    }
}

/// Inline rows used as a query root.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuesSource {
    pub alias: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
}

/// A query root.
#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Entity { entity: String, alias: String },
    Cte { name: String, alias: String },
    Values(ValuesSource),
}

impl FromSource {
    #[must_use]
    pub fn alias(&self) -> &str {
        match self {
            Self::Entity { alias, .. } | Self::Cte { alias, .. } => alias,
            Self::Values(values) => &values.alias,
        }
    }
}

impl fmt::Display for FromSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Entity { entity, alias } => write!(f, "{entity} {alias}"),
            Self::Cte { name, alias } => write!(f, "{name} {alias}"),
            Self::Values(values) => {
                let rows = values
                    .rows
                    .iter()
                    .map(|row| format!("({})", join(row)))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(
                    f,
                    "(VALUES {rows}) {}({})",
                    values.alias,
                    values.columns.join(", ")
                )
            }
        }
    }
}

/// What a join brings into scope.
#[derive(Debug, Clone, PartialEq)]
pub enum JoinTarget {
    /// Association path such as `c.kittens`.
    Association(PathExpression),
    /// Entity joined with an explicit ON condition.
    Entity(String),
    /// CTE joined with an explicit ON condition.
    Cte(String),
    /// Lateral subquery.
    Subquery(Box<QuerySpec>),
}

/// A join attached to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinNode {
    pub join_type: JoinType,
    pub target: JoinTarget,
    pub alias: String,
    /// Alias of the node this join hangs off.
    pub parent_alias: String,
    pub on: Option<Predicate>,
}

impl fmt::Display for JoinNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.join_type.as_str())?;
        match &self.target {
            JoinTarget::Association(path) => write!(f, "{path} {}", self.alias)?,
            JoinTarget::Entity(name) | JoinTarget::Cte(name) => write!(f, "{name} {}", self.alias)?,
            JoinTarget::Subquery(query) => write!(f, "LATERAL ({query}) {}", self.alias)?,
        }
        if let Some(on) = &self.on {
            write!(f, " ON {on}")?;
        }
        Ok(())
    }
}

/// A named window declared on a query.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedWindow {
    pub name: String,
    pub definition: WindowDefinition,
}

/// One SELECT block: the unit nested as subquery, CTE body or set operand.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QuerySpec {
    pub distinct: bool,
    pub select: Vec<SelectItem>,
    pub from: Vec<FromSource>,
    pub joins: Vec<JoinNode>,
    pub where_clause: Option<Predicate>,
    pub group_by: Vec<Expression>,
    pub having: Option<Predicate>,
    pub windows: Vec<NamedWindow>,
    pub order_by: Vec<OrderByExpression>,
    pub first_result: u64,
    pub max_results: Option<u64>,
}

impl QuerySpec {
    /// Appends a predicate to the WHERE clause with AND.
    pub fn add_where(&mut self, predicate: Predicate) {
        self.where_clause = Some(match self.where_clause.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
    }

    /// Appends a predicate to the HAVING clause with AND.
    pub fn add_having(&mut self, predicate: Predicate) {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
    }

    /// Finds a named window.
    #[must_use]
    pub fn window(&self, name: &str) -> Option<&WindowDefinition> {
        self.windows
            .iter()
            .find(|w| w.name == name)
            .map(|w| &w.definition)
    }

    /// Returns true when the query has no explicit paging.
    #[must_use]
    pub const fn is_unpaged(&self) -> bool {
        self.first_result == 0 && self.max_results.is_none()
    }
}

impl fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        if self.select.is_empty() {
            let roots: Vec<&str> = self.from.iter().map(FromSource::alias).collect();
            f.write_str(&roots.join(", "))?;
        } else {
            f.write_str(&join(&self.select))?;
        }
        if !self.from.is_empty() {
            write!(f, " FROM {}", join(&self.from))?;
        }
        for node in &self.joins {
            write!(f, " {node}")?;
        }
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {predicate}")?;
        }
        if !self.group_by.is_empty() {
            write!(f, " GROUP BY {}", join(&self.group_by))?;
        }
        if let Some(predicate) = &self.having {
            write!(f, " HAVING {predicate}")?;
        }
        if !self.windows.is_empty() {
            let windows = self
                .windows
                .iter()
                .map(|w| format!("{} AS ({})", w.name, w.definition))
                .collect::<Vec<_>>()
                .join(", ");
            write!(f, " WINDOW {windows}")?;
        }
        if !self.order_by.is_empty() {
            write!(f, " ORDER BY {}", join(&self.order_by))?;
        }
        Ok(())
    }
}

/// Set operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    UnionAll,
    Intersect,
    IntersectAll,
    Except,
    ExceptAll,
}

impl SetOperator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Union => "UNION",
            Self::UnionAll => "UNION ALL",
            Self::Intersect => "INTERSECT",
            Self::IntersectAll => "INTERSECT ALL",
            Self::Except => "EXCEPT",
            Self::ExceptAll => "EXCEPT ALL",
        }
    }

    /// Returns true for the `ALL` variants that keep duplicates.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::UnionAll | Self::IntersectAll | Self::ExceptAll)
    }
}

/// A set operation applied to the preceding result.
#[derive(Debug, Clone, PartialEq)]
pub struct SetOperation {
    pub operator: SetOperator,
    pub query: QuerySpec,
}

/// Body of a common table expression.
#[derive(Debug, Clone, PartialEq)]
pub enum CteBody {
    Query {
        base: QuerySpec,
        /// Recursive part with the operator joining it to the base.
        recursive: Option<(SetOperator, QuerySpec)>,
    },
    /// A data modifying statement whose RETURNING columns feed the CTE.
    Modification(Box<DmlStatement>),
}

/// `name(columns) AS (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct CteDefinition {
    pub name: String,
    pub columns: Vec<String>,
    pub recursive: bool,
    pub body: CteBody,
    /// `Some(true)` for MATERIALIZED, `Some(false)` for NOT MATERIALIZED.
    pub materialized: Option<bool>,
}

impl fmt::Display for CteDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}) AS (", self.name, self.columns.join(", "))?;
        match &self.body {
            CteBody::Query { base, recursive } => {
                write!(f, "{base}")?;
                if let Some((operator, query)) = recursive {
                    write!(f, " {} {query}", operator.as_str())?;
                }
            }
            CteBody::Modification(statement) => write!(f, "{statement}")?,
        }
        f.write_str(")")
    }
}

fn write_with(f: &mut fmt::Formatter<'_>, ctes: &[CteDefinition]) -> fmt::Result {
    if ctes.is_empty() {
        return Ok(());
    }
    let recursive = if ctes.iter().any(|c| c.recursive) {
        "RECURSIVE "
    } else {
        ""
    };
    write!(f, "WITH {recursive}{} ", join(ctes))
}

/// A complete select statement.
///
/// When set operations are present, the ORDER BY and paging of `query`
/// apply to the combined result.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub ctes: Vec<CteDefinition>,
    pub query: QuerySpec,
    pub set_operations: Vec<SetOperation>,
}

impl fmt::Display for SelectStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_with(f, &self.ctes)?;
        if self.set_operations.is_empty() {
            return write!(f, "{}", self.query);
        }
        let leading = QuerySpec {
            order_by: Vec::new(),
            ..self.query.clone()
        };
        write!(f, "{leading}")?;
        for operation in &self.set_operations {
            write!(f, " {} {}", operation.operator.as_str(), operation.query)?;
        }
        if !self.query.order_by.is_empty() {
            write!(f, " ORDER BY {}", join(&self.query.order_by))?;
        }
        Ok(())
    }
}

/// `attribute = value` in an UPDATE.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub attribute: String,
    pub value: Expression,
}

/// The statement-specific part of a modification query.
#[derive(Debug, Clone, PartialEq)]
pub enum DmlKind {
    Delete,
    Update { assignments: Vec<Assignment> },
    Insert { attributes: Vec<String>, query: QuerySpec },
}

/// DELETE, UPDATE or INSERT-SELECT on an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DmlStatement {
    pub ctes: Vec<CteDefinition>,
    pub entity: String,
    pub alias: String,
    pub kind: DmlKind,
    pub where_clause: Option<Predicate>,
    /// Attributes returned by the statement.
    pub returning: Vec<String>,
}

impl fmt::Display for DmlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_with(f, &self.ctes)?;
        match &self.kind {
            DmlKind::Delete => write!(f, "DELETE FROM {} {}", self.entity, self.alias)?,
            DmlKind::Update { assignments } => {
                let sets = assignments
                    .iter()
                    .map(|a| format!("{}.{} = {}", self.alias, a.attribute, a.value))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "UPDATE {} {} SET {sets}", self.entity, self.alias)?;
            }
            DmlKind::Insert { attributes, query } => write!(
                f,
                "INSERT INTO {}({}) {query}",
                self.entity,
                attributes.join(", ")
            )?,
        }
        if let Some(predicate) = &self.where_clause {
            write!(f, " WHERE {predicate}")?;
        }
        if !self.returning.is_empty() {
            write!(f, " RETURNING {}", self.returning.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::predicate::ComparisonOperator;

    fn cats() -> QuerySpec {
        QuerySpec {
            select: vec![SelectItem {
                expression: Expression::path("c.name"),
                alias: None,
            }],
            from: vec![FromSource::Entity {
                entity: String::from("Cat"),
                alias: String::from("c"),
            }],
            ..QuerySpec::default()
        }
    }

    #[test]
    fn query_spec_display() {
        let mut query = cats();
        query.joins.push(JoinNode {
            join_type: JoinType::Left,
            target: JoinTarget::Association(PathExpression::parse_simple("c.kittens")),
            alias: String::from("k"),
            parent_alias: String::from("c"),
            on: None,
        });
        query.add_where(Predicate::compare(
            Expression::path("c.age"),
            ComparisonOperator::Gt,
            Expression::parameter("minAge"),
        ));
        query.add_where(Predicate::is_not_null(Expression::path("k.name")));
        query
            .order_by
            .push(OrderByExpression::new(Expression::path("c.id"), true, false));
        assert_eq!(
            query.to_string(),
            "SELECT c.name FROM Cat c LEFT JOIN c.kittens k \
             WHERE c.age > :minAge AND k.name IS NOT NULL ORDER BY c.id ASC NULLS LAST"
        );
    }

    #[test]
    fn reversed_order_flips_nulls() {
        let item = OrderByExpression::new(Expression::path("c.age"), true, false);
        let reversed = item.reversed();
        assert!(!reversed.ascending);
        assert!(reversed.nulls_first);
        assert_eq!(reversed.reversed(), item);
    }

    #[test]
    fn set_operation_display() {
        let statement = SelectStatement {
            ctes: Vec::new(),
            query: cats(),
            set_operations: vec![SetOperation {
                operator: SetOperator::ExceptAll,
                query: cats(),
            }],
        };
        assert_eq!(
            statement.to_string(),
            "SELECT c.name FROM Cat c EXCEPT ALL SELECT c.name FROM Cat c"
        );
    }
}
