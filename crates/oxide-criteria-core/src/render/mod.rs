//! SQL rendering.
//!
//! [`SqlRenderer`] turns a [`SelectStatement`] or [`DmlStatement`] into the SQL
//! of one dialect. Entities become tables, attributes become columns and
//! association paths become joins. Every product specific construct is asked
//! of the [`DbmsDialect`] first and rendered natively, emulated, or rejected
//! with [`CriteriaError::UnsupportedCapability`].
//!
//! Bound values are written as markers while rendering and numbered in a
//! final pass, so parameters always bind in the order their placeholders
//! appear in the SQL text.

mod dml;
mod expression;
mod plan;
mod query;

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use tracing::debug;

use crate::ast::{ClauseType, DmlStatement, Parameter, SelectStatement};
use crate::config::CriteriaConfig;
use crate::dialect::DbmsDialect;
use crate::error::{CriteriaError, Result};
use crate::metamodel::EntityMetamodel;
use crate::value::SqlValue;

use plan::QueryPlan;
pub(crate) use query::output_columns;

/// Values bound to named and positional parameters.
pub type ParameterBindings = BTreeMap<Parameter, SqlValue>;

static NO_BINDINGS: ParameterBindings = BTreeMap::new();

const MARKER: char = '\u{1}';

/// Rendered SQL with its parameters in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlStatement {
    pub sql: String,
    pub parameters: Vec<SqlValue>,
    /// Number of columns in the result, zero for DML without RETURNING.
    pub column_count: usize,
}

impl fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

/// Renders statements for one dialect and metamodel.
#[derive(Clone, Copy)]
pub struct SqlRenderer<'a> {
    dialect: &'a dyn DbmsDialect,
    metamodel: &'a dyn EntityMetamodel,
    config: &'a CriteriaConfig,
    bindings: &'a ParameterBindings,
}

impl fmt::Debug for SqlRenderer<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlRenderer")
            .field("dialect", &self.dialect.name())
            .field("bindings", self.bindings)
            .finish_non_exhaustive()
    }
}

impl<'a> SqlRenderer<'a> {
    #[must_use]
    pub fn new(
        dialect: &'a dyn DbmsDialect,
        metamodel: &'a dyn EntityMetamodel,
        config: &'a CriteriaConfig,
    ) -> Self {
        Self {
            dialect,
            metamodel,
            config,
            bindings: &NO_BINDINGS,
        }
    }

    /// Values for the parameters referenced in expression text.
    #[must_use]
    pub const fn with_parameters(mut self, bindings: &'a ParameterBindings) -> Self {
        self.bindings = bindings;
        self
    }

    /// Renders a select statement.
    ///
    /// # Errors
    ///
    /// Fails on unresolvable paths, unbound parameters, constructs that are
    /// not allowed in their clause and features the dialect cannot express.
    pub fn render_select(&self, statement: &SelectStatement) -> Result<SqlStatement> {
        let mut renderer = Renderer::new(self);
        let (sql, column_count) = renderer.select_statement(statement)?;
        let rendered = renderer.finish(&sql, column_count)?;
        debug!(
            dialect = self.dialect.name(),
            sql = %rendered.sql,
            parameters = rendered.parameters.len(),
            "rendered select statement"
        );
        Ok(rendered)
    }

    /// Renders the number of rows a grouped query returns, counting its
    /// groups through a derived table. `None` when the query does not group.
    ///
    /// # Errors
    ///
    /// Same as [`SqlRenderer::render_select`].
    pub fn render_group_count(
        &self,
        statement: &SelectStatement,
    ) -> Result<Option<SqlStatement>> {
        let mut renderer = Renderer::new(self);
        let Some(sql) = renderer.grouped_count(statement)? else {
            return Ok(None);
        };
        let rendered = renderer.finish(&sql, 1)?;
        debug!(
            dialect = self.dialect.name(),
            sql = %rendered.sql,
            "rendered group count"
        );
        Ok(Some(rendered))
    }

    /// Renders a DELETE, UPDATE or INSERT statement.
    ///
    /// # Errors
    ///
    /// Same as [`SqlRenderer::render_select`], plus RETURNING and WITH
    /// clauses the dialect does not support.
    pub fn render_dml(&self, statement: &DmlStatement) -> Result<SqlStatement> {
        let mut renderer = Renderer::new(self);
        let sql = renderer.dml_statement(statement, false)?;
        let rendered = renderer.finish(&sql, statement.returning.len())?;
        debug!(
            dialect = self.dialect.name(),
            sql = %rendered.sql,
            parameters = rendered.parameters.len(),
            "rendered modification statement"
        );
        Ok(rendered)
    }
}

/// Per-statement rendering state.
struct Renderer<'a> {
    dialect: &'a dyn DbmsDialect,
    metamodel: &'a dyn EntityMetamodel,
    config: &'a CriteriaConfig,
    bindings: &'a ParameterBindings,
    values: Vec<SqlValue>,
    /// Columns of the CTEs declared so far.
    ctes: HashMap<String, Vec<String>>,
    scopes: Vec<QueryPlan<'a>>,
    clause: ClauseType,
    generated: usize,
}

impl<'a> Renderer<'a> {
    fn new(renderer: &SqlRenderer<'a>) -> Self {
        Self {
            dialect: renderer.dialect,
            metamodel: renderer.metamodel,
            config: renderer.config,
            bindings: renderer.bindings,
            values: Vec::new(),
            ctes: HashMap::new(),
            scopes: Vec::new(),
            clause: ClauseType::Select,
            generated: 0,
        }
    }

    /// Writes a marker for a bound value.
    fn bind(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("{MARKER}{}{MARKER}", self.values.len() - 1)
    }

    /// A fresh alias for generated subqueries and derived tables.
    fn generated_alias(&mut self, prefix: &str) -> String {
        self.generated += 1;
        format!("{prefix}_{}", self.generated)
    }

    /// Replaces value markers with the dialect's placeholders.
    fn finish(&self, sql: &str, column_count: usize) -> Result<SqlStatement> {
        let style = self.dialect.parameter_style();
        let mut text = String::with_capacity(sql.len());
        let mut parameters = Vec::new();
        for (i, piece) in sql.split(MARKER).enumerate() {
            if i % 2 == 0 {
                text.push_str(piece);
                continue;
            }
            let value = piece
                .parse::<usize>()
                .ok()
                .and_then(|index| self.values.get(index))
                .ok_or_else(|| CriteriaError::illegal_argument("malformed parameter marker"))?;
            parameters.push(value.clone());
            text.push_str(&style.placeholder(parameters.len()));
        }
        Ok(SqlStatement {
            sql: text,
            parameters,
            column_count,
        })
    }
}
