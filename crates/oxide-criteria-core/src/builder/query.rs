//! Clauses shared by top-level queries and subqueries.

use super::case_when::{CaseWhenBuilder, NoWhen, SelectCase, WhereCase};
use super::context::AliasScope;
use super::join::JoinOnBuilder;
use super::junction::JunctionBuilder;
use super::restriction::RestrictionBuilder;
use super::subquery::{LateralSubquery, LeftSubquery, PredicateSubquery, SelectSubquery, SubqueryBuilder};
use super::window::WindowBuilder;
use super::RestrictionTarget;
use crate::ast::{
    BooleanOperator, ClauseType, Expression, FromSource, JoinNode, JoinTarget, JoinType,
    OrderByExpression, PathExpression, Predicate, QuerySpec, SelectItem, ValueType, ValuesSource,
};
use crate::error::{CriteriaError, Result};
use crate::metamodel::AttributeKind;
use crate::value::SqlValue;

/// The query a builder assembles, with the aliases it declared.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryState {
    pub(crate) spec: QuerySpec,
    pub(crate) scope: AliasScope,
}

impl QueryState {
    #[must_use]
    pub const fn spec(&self) -> &QuerySpec {
        &self.spec
    }

    pub(crate) fn restrict(&mut self, clause: ClauseType, predicate: Predicate) {
        match clause {
            ClauseType::Having => self.spec.add_having(predicate),
            _ => self.spec.add_where(predicate),
        }
    }

    fn select_alias(&self, name: &str) -> Option<&SelectItem> {
        self.spec
            .select
            .iter()
            .find(|item| item.alias.as_deref() == Some(name))
    }
}

/// Operations of a SELECT block.
///
/// Implemented for `&mut CriteriaBuilder` and for [`SubqueryBuilder`], so
/// every method consumes the builder handle and returns it for chaining.
pub trait QueryBuilder: RestrictionTarget + Sized {
    #[doc(hidden)]
    fn query_state(&self) -> &QueryState;

    #[doc(hidden)]
    fn query_state_mut(&mut self) -> &mut QueryState;

    /// Adds an entity root.
    ///
    /// # Errors
    ///
    /// Unknown entities and aliases used twice.
    fn from(mut self, entity: &str, alias: &str) -> Result<Self> {
        if self.context().metamodel().entity(entity).is_none() {
            return Err(CriteriaError::path(entity, format!("unknown entity {entity}")));
        }
        let state = self.query_state_mut();
        state.scope.declare_root(alias, Some(entity), Vec::new())?;
        state.spec.from.push(FromSource::Entity {
            entity: String::from(entity),
            alias: String::from(alias),
        });
        Ok(self)
    }

    /// Adds a root ranging over a CTE declared with `with`.
    ///
    /// # Errors
    ///
    /// Undeclared CTEs and aliases used twice.
    fn from_cte(mut self, name: &str, alias: &str) -> Result<Self> {
        let columns = self
            .context()
            .cte_columns(name)
            .ok_or_else(|| CriteriaError::illegal_argument(format!("unknown CTE '{name}'")))?
            .to_vec();
        let state = self.query_state_mut();
        state.scope.declare_root(alias, None, columns)?;
        state.spec.from.push(FromSource::Cte {
            name: String::from(name),
            alias: String::from(alias),
        });
        Ok(self)
    }

    /// Adds a root over inline rows.
    ///
    /// When `name` is an entity, the columns must be basic attributes of it
    /// and every value must fit the attribute's type. Any other name only
    /// labels the rows.
    ///
    /// # Errors
    ///
    /// Rows whose width differs from `columns`, unknown attributes and
    /// mistyped values.
    fn from_values(
        mut self,
        name: &str,
        alias: &str,
        columns: &[&str],
        rows: Vec<Vec<SqlValue>>,
    ) -> Result<Self> {
        if columns.is_empty() {
            return Err(CriteriaError::illegal_argument(format!(
                "VALUES '{alias}' needs at least one column"
            )));
        }
        if let Some(row) = rows.iter().find(|row| row.len() != columns.len()) {
            return Err(CriteriaError::illegal_argument(format!(
                "VALUES '{alias}' declares {} columns but a row has {} values",
                columns.len(),
                row.len()
            )));
        }
        if let Some(entity) = self.context().metamodel().entity(name) {
            for (i, column) in columns.iter().enumerate() {
                let attribute = entity
                    .get(column)
                    .filter(|attribute| matches!(attribute.kind, AttributeKind::Basic))
                    .ok_or_else(|| {
                        CriteriaError::path(
                            format!("{name}.{column}"),
                            format!("'{column}' is not a basic attribute of entity {name}"),
                        )
                    })?;
                if let Some(value) = rows
                    .iter()
                    .map(|row| &row[i])
                    .find(|value| !attribute.value_type.accepts(value))
                {
                    return Err(CriteriaError::illegal_argument(format!(
                        "value {value} does not fit {name}.{column} of type {}",
                        attribute.value_type
                    )));
                }
            }
        }
        let columns: Vec<String> = columns.iter().map(|c| String::from(*c)).collect();
        let state = self.query_state_mut();
        state.scope.declare_root(alias, None, columns.clone())?;
        state.spec.from.push(FromSource::Values(ValuesSource {
            alias: String::from(alias),
            columns,
            rows,
        }));
        Ok(self)
    }

    /// Joins an association path such as `c.kittens`.
    ///
    /// # Errors
    ///
    /// Paths that do not end in an association and aliases used twice.
    fn join(mut self, path: &str, alias: &str, join_type: JoinType) -> Result<Self> {
        let (path, target) = self.association(path)?;
        let state = self.query_state_mut();
        state.scope.declare_entity(alias, &target)?;
        state.spec.joins.push(JoinNode {
            join_type,
            parent_alias: String::from(path.head()),
            target: JoinTarget::Association(path),
            alias: String::from(alias),
            on: None,
        });
        Ok(self)
    }

    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    fn inner_join(self, path: &str, alias: &str) -> Result<Self> {
        self.join(path, alias, JoinType::Inner)
    }

    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    fn left_join(self, path: &str, alias: &str) -> Result<Self> {
        self.join(path, alias, JoinType::Left)
    }

    /// # Errors
    ///
    /// See [`QueryBuilder::join`].
    fn right_join(self, path: &str, alias: &str) -> Result<Self> {
        self.join(path, alias, JoinType::Right)
    }

    /// Joins an entity, a CTE or an association with an explicit ON
    /// condition built by the returned builder.
    ///
    /// # Errors
    ///
    /// Unknown targets and aliases used twice.
    fn join_on(mut self, target: &str, alias: &str, join_type: JoinType) -> Result<JoinOnBuilder<Self>> {
        let parent_alias = self
            .query_state()
            .spec
            .from
            .first()
            .map(|source| String::from(source.alias()))
            .ok_or_else(|| CriteriaError::illegal_argument("a join needs a FROM item first"))?;
        let (target, parent_alias) = if self.context().metamodel().entity(target).is_some() {
            self.query_state_mut().scope.declare_entity(alias, target)?;
            (JoinTarget::Entity(String::from(target)), parent_alias)
        } else if let Some(columns) = self.context().cte_columns(target) {
            let columns = columns.to_vec();
            self.query_state_mut().scope.declare_columns(alias, columns)?;
            (JoinTarget::Cte(String::from(target)), parent_alias)
        } else {
            let (path, entity) = self.association(target)?;
            self.query_state_mut().scope.declare_entity(alias, &entity)?;
            let head = String::from(path.head());
            (JoinTarget::Association(path), head)
        };
        self.query_state_mut().spec.joins.push(JoinNode {
            join_type,
            target,
            alias: String::from(alias),
            parent_alias,
            on: None,
        });
        Ok(JoinOnBuilder::new(self, alias))
    }

    /// Starts a subquery that is joined laterally under `alias`.
    fn join_lateral_subquery(self, alias: &str, join_type: JoinType) -> SubqueryBuilder<LateralSubquery<Self>> {
        SubqueryBuilder::new(LateralSubquery::new(self, alias, join_type))
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn select(mut self, expression: &str) -> Result<Self> {
        let expression = self.parse_expression(expression)?;
        self.query_state_mut().spec.select.push(SelectItem {
            expression,
            alias: None,
        });
        Ok(self)
    }

    /// # Errors
    ///
    /// Syntax errors, unresolvable paths and aliases used twice.
    fn select_as(mut self, expression: &str, alias: &str) -> Result<Self> {
        if self.query_state().select_alias(alias).is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "select alias '{alias}' is used more than once"
            )));
        }
        let expression = self.parse_expression(expression)?;
        self.query_state_mut().spec.select.push(SelectItem {
            expression,
            alias: Some(String::from(alias)),
        });
        Ok(self)
    }

    /// Selects a CASE expression.
    fn select_case(self, alias: Option<&str>) -> CaseWhenBuilder<SelectCase<Self>, NoWhen> {
        CaseWhenBuilder::attached(SelectCase::new(self, alias))
    }

    /// Selects the value of a scalar subquery.
    fn select_subquery(self, alias: Option<&str>) -> SubqueryBuilder<SelectSubquery<Self>> {
        SubqueryBuilder::new(SelectSubquery::new(self, alias))
    }

    #[must_use]
    fn distinct(mut self) -> Self {
        self.query_state_mut().spec.distinct = true;
        self
    }

    /// Starts a restriction on `expression`.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn where_(self, expression: &str) -> Result<RestrictionBuilder<Self>> {
        let left = self.parse_expression(expression)?;
        Ok(RestrictionBuilder::new(self, left, ClauseType::Where))
    }

    /// Adds a complete predicate written as text.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn where_expression(mut self, predicate: &str) -> Result<Self> {
        let predicate = self.parse_predicate(predicate)?;
        self.add_restriction(ClauseType::Where, predicate);
        Ok(self)
    }

    fn where_or(self) -> JunctionBuilder<Self> {
        JunctionBuilder::new(self, BooleanOperator::Or, ClauseType::Where)
    }

    /// Starts a CASE expression used as the left side of a restriction.
    fn where_case(self) -> CaseWhenBuilder<WhereCase<Self>, NoWhen> {
        CaseWhenBuilder::attached(WhereCase::new(self, ClauseType::Where))
    }

    fn where_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        SubqueryBuilder::new(PredicateSubquery::exists(self, ClauseType::Where, false))
    }

    fn where_not_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        SubqueryBuilder::new(PredicateSubquery::exists(self, ClauseType::Where, true))
    }

    /// Starts a subquery used as the left side of a restriction.
    fn where_subquery(self) -> SubqueryBuilder<LeftSubquery<Self>> {
        SubqueryBuilder::new(LeftSubquery::new(self, ClauseType::Where))
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn group_by(mut self, expression: &str) -> Result<Self> {
        let expression = self.parse_expression(expression)?;
        self.query_state_mut().spec.group_by.push(expression);
        Ok(self)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn having(self, expression: &str) -> Result<RestrictionBuilder<Self>> {
        let left = self.parse_expression(expression)?;
        Ok(RestrictionBuilder::new(self, left, ClauseType::Having))
    }

    fn having_or(self) -> JunctionBuilder<Self> {
        JunctionBuilder::new(self, BooleanOperator::Or, ClauseType::Having)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn having_expression(mut self, predicate: &str) -> Result<Self> {
        let predicate = self.parse_predicate(predicate)?;
        self.add_restriction(ClauseType::Having, predicate);
        Ok(self)
    }

    /// Declares a named window.
    fn window(self, name: &str) -> WindowBuilder<Self> {
        WindowBuilder::new(self, name)
    }

    /// Adds an ORDER BY item. A bare identifier naming a select alias orders
    /// by that select item.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn order_by(mut self, expression: &str, ascending: bool, nulls_first: bool) -> Result<Self> {
        let item = self.order_item(expression, ascending, nulls_first)?;
        self.query_state_mut().spec.order_by.push(item);
        Ok(self)
    }

    /// Ascending with NULLS LAST.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::order_by`].
    fn order_by_asc(self, expression: &str) -> Result<Self> {
        self.order_by(expression, true, false)
    }

    /// Descending with NULLS LAST.
    ///
    /// # Errors
    ///
    /// See [`QueryBuilder::order_by`].
    fn order_by_desc(self, expression: &str) -> Result<Self> {
        self.order_by(expression, false, false)
    }

    #[must_use]
    fn set_first_result(mut self, first_result: u64) -> Self {
        self.query_state_mut().spec.first_result = first_result;
        self
    }

    #[must_use]
    fn set_max_results(mut self, max_results: u64) -> Self {
        self.query_state_mut().spec.max_results = Some(max_results);
        self
    }

    #[doc(hidden)]
    fn association(&self, path: &str) -> Result<(PathExpression, String)> {
        let (path, info) = self.parse_path(path)?;
        match info.value_type {
            ValueType::Entity(target) if !path.is_simple() => Ok((path, target)),
            _ => Err(CriteriaError::path(
                path.to_string(),
                "only associations can be joined",
            )),
        }
    }

    #[doc(hidden)]
    fn order_item(&self, expression: &str, ascending: bool, nulls_first: bool) -> Result<OrderByExpression> {
        let trimmed = expression.trim();
        if self.query_state().select_alias(trimmed).is_some() {
            return Ok(OrderByExpression::new(
                Expression::path(trimmed),
                ascending,
                nulls_first,
            ));
        }
        let parsed = self.parse_expression(expression)?;
        let mut item = OrderByExpression::new(parsed, ascending, nulls_first);
        if let Some(path) = item.expression.as_path() {
            let info = self.resolve(path)?;
            item.nullable = info.nullable;
            item.unique = info.unique;
            item.result_type = match info.value_type {
                ValueType::Entity(_) => ValueType::Long,
                other => other,
            };
        }
        Ok(item)
    }
}
