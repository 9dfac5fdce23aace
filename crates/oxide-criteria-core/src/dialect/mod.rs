//! Database dialects.
//!
//! Every database product differs in which SQL constructs it supports and how
//! it spells them. [`DbmsDialect`] describes those differences as capability
//! probes, style selectors and a few rendering hooks. The renderer asks the
//! dialect before emitting anything product specific and either uses the
//! native form, an emulation, or fails with
//! [`CriteriaError::UnsupportedCapability`].
//!
//! Every method except [`DbmsDialect::name`] and [`DbmsDialect::functions`]
//! has a default that matches [`DefaultDialect`], so a dialect only overrides
//! what differs.

mod db2;
mod default;
mod functions;
mod h2;
mod mssql;
mod mysql;
mod oracle;
mod postgres;
mod registry;
mod sqlite;

pub use db2::Db2Dialect;
pub use default::DefaultDialect;
pub use functions::{
    FunctionCall, FunctionKind, FunctionRegistry, FunctionStrategy, GroupConcatFunction,
    GroupConcatStyle, StandardFunction,
};
pub use h2::H2Dialect;
pub use mssql::MsSqlDialect;
pub use mysql::{MySql8Dialect, MySqlDialect};
pub use oracle::OracleDialect;
pub use postgres::{CockroachDialect, PostgreSqlDialect};
pub use registry::DialectRegistry;
pub use sqlite::SqliteDialect;

use tracing::debug;

use crate::ast::{OrderByExpression, SetOperator};
use crate::error::{CriteriaError, Result};

/// How a subquery in the FROM clause can reference preceding sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LateralStyle {
    None,
    /// `JOIN LATERAL (...) x ON 1 = 1`
    Lateral,
    /// `CROSS APPLY (...) x` and `OUTER APPLY (...) x`
    Apply,
}

/// How a DELETE whose restriction needs joins is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteJoinStyle {
    None,
    /// `DELETE FROM t x USING u y WHERE ...`
    Using,
    /// `DELETE x FROM t x JOIN u y ON ... WHERE ...`
    From,
    Merge,
}

/// How an UPDATE whose restriction needs joins is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateJoinStyle {
    None,
    /// `UPDATE t x SET ... FROM u y WHERE ...`
    From,
    /// `UPDATE t x JOIN u y ON ... SET ... WHERE ...`
    Reference,
    Merge,
}

/// How inline rows are rendered as a query root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValuesStrategy {
    /// `(VALUES (?, ?), (?, ?)) v(a, b)`
    Values,
    /// `(SELECT ? a, ? b UNION ALL SELECT ?, ?) v`
    SelectUnion,
    /// `(VALUES ROW(?, ?), ROW(?, ?)) v(a, b)`
    SelectValues,
}

/// How LIMIT and OFFSET are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitStyle {
    /// `LIMIT n OFFSET m`
    LimitOffset,
    /// `OFFSET m ROWS FETCH NEXT n ROWS ONLY`
    OffsetFetch,
    /// A `ROW_NUMBER()` wrapper around the query.
    RowNumber,
}

/// Placeholder syntax for bound parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterStyle {
    /// `?1`, `?2`, ...
    Numbered,
    /// `$1`, `$2`, ...
    Dollar,
    /// `?`
    Question,
}

impl ParameterStyle {
    /// Placeholder for the parameter at 1-based `position`.
    #[must_use]
    pub fn placeholder(&self, position: usize) -> String {
        match self {
            Self::Numbered => format!("?{position}"),
            Self::Dollar => format!("${position}"),
            Self::Question => String::from("?"),
        }
    }
}

/// Statement parts placed around a rendered statement body by
/// [`DbmsDialect::append_extended_sql`].
#[derive(Debug, Clone, Default)]
pub struct ExtendedSqlParts<'a> {
    /// Rendered `WITH ...` prefix, without trailing space.
    pub with_clause: Option<&'a str>,
    pub limit: Option<u64>,
    pub offset: u64,
    pub has_order_by: bool,
    /// Columns of a RETURNING clause.
    pub returning: &'a [String],
    /// The statement is nested in another one and must be parenthesized.
    pub is_subquery: bool,
}

/// Capabilities and spelling of one database product.
///
/// Implementations are immutable and shared as `Arc<dyn DbmsDialect>`.
pub trait DbmsDialect: Send + Sync {
    /// Short product name used in messages and the registry.
    fn name(&self) -> &'static str;

    /// Function strategies available on this dialect.
    fn functions(&self) -> &FunctionRegistry;

    fn supports_window_functions(&self) -> bool {
        true
    }

    fn supports_with_clause(&self) -> bool {
        true
    }

    fn supports_non_recursive_with_clause(&self) -> bool {
        self.supports_with_clause()
    }

    /// A WITH clause may precede DELETE, UPDATE and INSERT.
    fn supports_with_clause_in_modification_query(&self) -> bool {
        self.supports_with_clause()
    }

    /// A DML statement may be the body of a CTE.
    fn supports_modification_query_in_with_clause(&self) -> bool {
        false
    }

    /// `(a, b) > (1, 2)` compares lexicographically.
    fn supports_full_row_value_comparison(&self) -> bool {
        true
    }

    /// `NULLS FIRST` and `NULLS LAST` are understood.
    fn supports_null_precedence(&self) -> bool {
        true
    }

    /// NULL sorts before every other value in ascending order.
    fn is_null_smallest(&self) -> bool {
        false
    }

    fn supports_union(&self, _all: bool) -> bool {
        true
    }

    fn supports_intersect(&self, _all: bool) -> bool {
        true
    }

    fn supports_except(&self, _all: bool) -> bool {
        true
    }

    fn supports_returning_columns(&self) -> bool {
        false
    }

    fn supports_returning_all_generated_keys(&self) -> bool {
        true
    }

    /// `agg(...) FILTER (WHERE ...)`
    fn supports_filter_clause(&self) -> bool {
        false
    }

    fn supports_boolean_literals(&self) -> bool {
        true
    }

    /// `AS [NOT] MATERIALIZED` hints on CTEs.
    fn supports_cte_materialization(&self) -> bool {
        false
    }

    fn needs_unique_select_item_names_also_when_table_column_aliasing(&self) -> bool {
        false
    }

    /// OFFSET is only valid after an ORDER BY.
    fn requires_order_by_for_offset(&self) -> bool {
        false
    }

    fn lateral_style(&self) -> LateralStyle {
        LateralStyle::Lateral
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::None
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::None
    }

    fn values_strategy(&self) -> ValuesStrategy {
        ValuesStrategy::Values
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::LimitOffset
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Question
    }

    /// Table to select from when a SELECT has no FROM clause.
    fn dummy_table(&self) -> Option<&'static str> {
        None
    }

    /// The keywords that open a WITH clause.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::UnsupportedCapability`] when the dialect has
    /// no WITH clause.
    fn get_with_clause(&self, recursive: bool) -> Result<&'static str> {
        if !self.supports_with_clause() {
            return Err(CriteriaError::unsupported("WITH clause", self.name()));
        }
        Ok(if recursive { "WITH RECURSIVE" } else { "WITH" })
    }

    /// The keywords for a set operator.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::UnsupportedCapability`] when the operator has
    /// no native form.
    fn get_set_operator(&self, operator: SetOperator) -> Result<&'static str> {
        let all = operator.is_all();
        let supported = match operator {
            SetOperator::Union | SetOperator::UnionAll => self.supports_union(all),
            SetOperator::Intersect | SetOperator::IntersectAll => self.supports_intersect(all),
            SetOperator::Except | SetOperator::ExceptAll => self.supports_except(all),
        };
        if supported {
            Ok(operator.as_str())
        } else {
            Err(CriteriaError::unsupported(operator.as_str(), self.name()))
        }
    }

    /// Appends one ORDER BY element.
    ///
    /// Null precedence is written natively when the dialect supports it.
    /// Otherwise, when the requested precedence differs from the one implied
    /// by [`DbmsDialect::is_null_smallest`], a `CASE WHEN ... IS NULL` sort key
    /// is put in front of the element.
    fn append_order_by_element(
        &self,
        sql: &mut String,
        element: &OrderByExpression,
        rendered: &str,
    ) {
        let direction = if element.ascending { "ASC" } else { "DESC" };
        if !element.nullable {
            sql.push_str(&format!("{rendered} {direction}"));
            return;
        }
        if self.supports_null_precedence() {
            let nulls = if element.nulls_first { "FIRST" } else { "LAST" };
            sql.push_str(&format!("{rendered} {direction} NULLS {nulls}"));
            return;
        }
        let natural_nulls_first = self.is_null_smallest() == element.ascending;
        if element.nulls_first != natural_nulls_first {
            debug!(
                dialect = self.name(),
                expression = rendered,
                "emulating null precedence"
            );
            let (null_key, other_key) = if element.nulls_first { (0, 1) } else { (1, 0) };
            sql.push_str(&format!(
                "CASE WHEN {rendered} IS NULL THEN {null_key} ELSE {other_key} END, "
            ));
        }
        sql.push_str(&format!("{rendered} {direction}"));
    }

    /// Appends LIMIT and OFFSET in the dialect's position and syntax.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::UnsupportedCapability`] for
    /// [`LimitStyle::RowNumber`], which the renderer handles by wrapping the
    /// query instead.
    fn append_limit(
        &self,
        sql: &mut String,
        limit: Option<u64>,
        offset: u64,
        has_order_by: bool,
    ) -> Result<()> {
        match self.limit_style() {
            LimitStyle::LimitOffset => {
                if let Some(limit) = limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                if offset > 0 {
                    sql.push_str(&format!(" OFFSET {offset}"));
                }
                Ok(())
            }
            LimitStyle::OffsetFetch => {
                let needs_offset = offset > 0 || self.requires_order_by_for_offset();
                if needs_offset && !has_order_by && self.requires_order_by_for_offset() {
                    sql.push_str(" ORDER BY (SELECT 0)");
                }
                if needs_offset {
                    sql.push_str(&format!(" OFFSET {offset} ROWS"));
                }
                if let Some(limit) = limit {
                    sql.push_str(&format!(" FETCH NEXT {limit} ROWS ONLY"));
                }
                Ok(())
            }
            LimitStyle::RowNumber => Err(CriteriaError::unsupported("LIMIT clause", self.name())),
        }
    }

    /// Places the WITH clause, the limit and the RETURNING columns around a
    /// rendered statement body.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::IllegalArgument`] for RETURNING in a subquery
    /// when the dialect cannot return columns, and
    /// [`CriteriaError::UnsupportedCapability`] for RETURNING at top level.
    fn append_extended_sql(&self, sql: &mut String, parts: &ExtendedSqlParts<'_>) -> Result<()> {
        if let Some(with_clause) = parts.with_clause {
            sql.insert_str(0, &format!("{with_clause} "));
        }
        if parts.limit.is_some() || parts.offset > 0 {
            self.append_limit(sql, parts.limit, parts.offset, parts.has_order_by)?;
        }
        if !parts.returning.is_empty() {
            if !self.supports_returning_columns() {
                return Err(if parts.is_subquery {
                    CriteriaError::illegal_argument(
                        "Returning columns in a subquery is not possible for this dbms",
                    )
                } else {
                    CriteriaError::unsupported("RETURNING clause", self.name())
                });
            }
            sql.push_str(" RETURNING ");
            sql.push_str(&parts.returning.join(", "));
        }
        if parts.is_subquery {
            sql.insert(0, '(');
            sql.push(')');
        }
        Ok(())
    }
}

impl std::fmt::Debug for dyn DbmsDialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbmsDialect")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Expression;

    fn element(ascending: bool, nulls_first: bool) -> OrderByExpression {
        OrderByExpression::new(Expression::path("c.age"), ascending, nulls_first)
    }

    fn order_by(dialect: &dyn DbmsDialect, element: &OrderByExpression) -> String {
        let mut sql = String::new();
        dialect.append_order_by_element(&mut sql, element, "c.age");
        sql
    }

    #[test]
    fn native_null_precedence() {
        let dialect = PostgreSqlDialect::new();
        assert_eq!(order_by(&dialect, &element(true, false)), "c.age ASC NULLS LAST");
        assert_eq!(
            order_by(&dialect, &element(false, true)),
            "c.age DESC NULLS FIRST"
        );
        assert_eq!(order_by(&dialect, &element(true, true).non_null()), "c.age ASC");
    }

    #[test]
    fn emulated_null_precedence() {
        let dialect = MySqlDialect::new();
        // NULL is smallest on MySQL, so ascending already puts nulls first
        assert_eq!(order_by(&dialect, &element(true, true)), "c.age ASC");
        assert_eq!(
            order_by(&dialect, &element(true, false)),
            "CASE WHEN c.age IS NULL THEN 1 ELSE 0 END, c.age ASC"
        );
        assert_eq!(
            order_by(&dialect, &element(false, true)),
            "CASE WHEN c.age IS NULL THEN 0 ELSE 1 END, c.age DESC"
        );
        assert_eq!(order_by(&dialect, &element(false, false)), "c.age DESC");
    }

    #[test]
    fn limit_styles() {
        let mut sql = String::from("SELECT 1");
        PostgreSqlDialect::new()
            .append_limit(&mut sql, Some(10), 20, true)
            .unwrap();
        assert_eq!(sql, "SELECT 1 LIMIT 10 OFFSET 20");

        let mut sql = String::from("SELECT 1");
        MsSqlDialect::new()
            .append_limit(&mut sql, Some(10), 0, false)
            .unwrap();
        assert_eq!(
            sql,
            "SELECT 1 ORDER BY (SELECT 0) OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );

        let mut sql = String::from("SELECT 1");
        OracleDialect::new()
            .append_limit(&mut sql, Some(5), 0, true)
            .unwrap();
        assert_eq!(sql, "SELECT 1 FETCH NEXT 5 ROWS ONLY");

        let mut sql = String::new();
        assert!(Db2Dialect::new().append_limit(&mut sql, Some(5), 0, true).is_err());
    }

    #[test]
    fn returning_in_subquery_needs_support() {
        let returning = [String::from("id")];
        let parts = ExtendedSqlParts {
            returning: &returning,
            is_subquery: true,
            ..ExtendedSqlParts::default()
        };
        let mut sql = String::from("DELETE FROM cat c");
        let err = MySqlDialect::new()
            .append_extended_sql(&mut sql, &parts)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Returning columns in a subquery is not possible for this dbms"
        );

        let mut sql = String::from("DELETE FROM cat c");
        PostgreSqlDialect::new()
            .append_extended_sql(&mut sql, &parts)
            .unwrap();
        assert_eq!(sql, "(DELETE FROM cat c RETURNING id)");
    }

    #[test]
    fn with_clause_is_prefixed() {
        let parts = ExtendedSqlParts {
            with_clause: Some("WITH x(a) AS (SELECT 1)"),
            limit: Some(1),
            has_order_by: true,
            ..ExtendedSqlParts::default()
        };
        let mut sql = String::from("SELECT x.a FROM x x");
        DefaultDialect::new()
            .append_extended_sql(&mut sql, &parts)
            .unwrap();
        assert_eq!(sql, "WITH x(a) AS (SELECT 1) SELECT x.a FROM x x LIMIT 1");
    }

    #[test]
    fn placeholders() {
        assert_eq!(ParameterStyle::Dollar.placeholder(3), "$3");
        assert_eq!(ParameterStyle::Numbered.placeholder(1), "?1");
        assert_eq!(ParameterStyle::Question.placeholder(7), "?");
    }
}
