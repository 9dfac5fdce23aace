use tracing::debug;

use super::context::AliasScope;
use super::cte::CteOwner;
use super::paginated::PaginatedCriteriaBuilder;
use super::query::{QueryBuilder, QueryState};
use super::set_op::SetOperandBuilder;
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{
    ClauseType, CopyContext, CteDefinition, DeepCopy, Parameter, Predicate, SelectStatement,
    SetOperation, SetOperator,
};
use crate::error::Result;
use crate::execution::{Row, StatementExecutor};
use crate::keyset::KeysetPage;
use crate::render::{ParameterBindings, SqlRenderer, SqlStatement};
use crate::value::ToSqlValue;

/// Builds a select statement.
///
/// Query clauses come from [`QueryBuilder`], which is implemented for
/// `&mut CriteriaBuilder`, and CTEs from [`CteOwner`]; bring the traits into
/// scope to use them.
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    context: BuilderContext,
    state: QueryState,
    ctes: Vec<CteDefinition>,
    set_operations: Vec<SetOperation>,
}

impl CriteriaBuilder {
    pub(crate) fn new(context: BuilderContext) -> Self {
        Self {
            context,
            state: QueryState::default(),
            ctes: Vec::new(),
            set_operations: Vec::new(),
        }
    }

    pub fn union(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::Union)
    }

    pub fn union_all(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::UnionAll)
    }

    pub fn intersect(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::Intersect)
    }

    pub fn intersect_all(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::IntersectAll)
    }

    pub fn except(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::Except)
    }

    pub fn except_all(&mut self) -> SetOperandBuilder<'_> {
        SetOperandBuilder::new(self, SetOperator::ExceptAll)
    }

    pub(crate) fn add_set_operation(&mut self, operation: SetOperation) {
        self.set_operations.push(operation);
    }

    /// Binds a value to the named parameter `:name`.
    pub fn set_parameter(&mut self, name: &str, value: impl ToSqlValue) -> &mut Self {
        self.context.set_parameter(
            Parameter::Named(String::from(name)),
            value.to_sql_value(),
        );
        self
    }

    /// Binds a value to the positional parameter `?position`.
    pub fn set_positional_parameter(&mut self, position: u32, value: impl ToSqlValue) -> &mut Self {
        self.context
            .set_parameter(Parameter::Positional(position), value.to_sql_value());
        self
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterBindings {
        self.context.parameters()
    }

    #[must_use]
    pub const fn query(&self) -> &QueryState {
        &self.state
    }

    pub(crate) fn query_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }

    /// Fails when a sub-builder was opened and not ended.
    ///
    /// # Errors
    ///
    /// [`crate::error::CriteriaError::BuilderChaining`].
    pub fn verify_builder_ended(&self) -> Result<()> {
        self.context.verify_builder_ended()
    }

    /// The statement as built so far.
    #[must_use]
    pub fn statement(&self) -> SelectStatement {
        SelectStatement {
            ctes: self.ctes.clone(),
            query: self.state.spec.clone(),
            set_operations: self.set_operations.clone(),
        }
    }

    /// The statement in query language form, with parameters as
    /// placeholders.
    ///
    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn get_query_string(&self) -> Result<String> {
        self.verify_builder_ended()?;
        Ok(self.statement().to_string())
    }

    /// Renders the statement to SQL of the builder's dialect.
    ///
    /// # Errors
    ///
    /// When a sub-builder is still open, a parameter is unbound, or the
    /// dialect cannot express the statement.
    pub fn render(&self) -> Result<SqlStatement> {
        self.verify_builder_ended()?;
        self.render_statement(&self.statement())
    }

    fn renderer(&self) -> SqlRenderer<'_> {
        SqlRenderer::new(
            self.context.dialect(),
            self.context.metamodel(),
            self.context.config(),
        )
        .with_parameters(self.context.parameters())
    }

    pub(crate) fn render_statement(&self, statement: &SelectStatement) -> Result<SqlStatement> {
        self.renderer().render_select(statement)
    }

    pub(crate) fn render_group_count(
        &self,
        statement: &SelectStatement,
    ) -> Result<Option<SqlStatement>> {
        self.renderer().render_group_count(statement)
    }

    /// Renders the statement and runs it.
    ///
    /// # Errors
    ///
    /// Everything [`CriteriaBuilder::render`] fails on, and executor errors.
    pub fn get_result_list(&self, executor: &dyn StatementExecutor) -> Result<Vec<Row>> {
        let statement = self.render()?;
        debug!(sql = %statement.sql, parameters = statement.parameters.len(), "executing query");
        executor.query(&statement)
    }

    /// Pages the query by offset.
    ///
    /// # Errors
    ///
    /// When a sub-builder is still open or the ORDER BY does not end in a
    /// unique item.
    pub fn page(self, first_result: u64, max_results: u64) -> Result<PaginatedCriteriaBuilder> {
        PaginatedCriteriaBuilder::new(self, None, first_result, max_results)
    }

    /// Pages the query, using the keysets of a previously read page when the
    /// requested page is adjacent to it.
    ///
    /// # Errors
    ///
    /// See [`CriteriaBuilder::page`].
    pub fn page_keyset(
        self,
        keyset_page: Option<&KeysetPage>,
        first_result: u64,
        max_results: u64,
    ) -> Result<PaginatedCriteriaBuilder> {
        PaginatedCriteriaBuilder::new(self, keyset_page, first_result, max_results)
    }

    /// A deep copy whose named parameters are rebound through `copy`.
    ///
    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn copy(&self, copy: &mut CopyContext) -> Result<Self> {
        self.verify_builder_ended()?;
        let mut context = self.context.clone();
        let bindings = context.take_parameters();
        for (parameter, value) in bindings {
            let parameter = match parameter {
                Parameter::Named(name) => Parameter::Named(String::from(copy.renamed(&name))),
                positional => positional,
            };
            context.set_parameter(parameter, value);
        }
        let statement = self.statement().copy(copy);
        Ok(Self {
            context,
            state: QueryState {
                spec: statement.query,
                scope: self.state.scope.clone(),
            },
            ctes: statement.ctes,
            set_operations: statement.set_operations,
        })
    }
}

impl BuilderParent for CriteriaBuilder {
    fn context(&self) -> &BuilderContext {
        &self.context
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        &mut self.context
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        out.push(&self.state.scope);
    }
}

impl RestrictionTarget for CriteriaBuilder {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        self.state.restrict(clause, predicate);
    }
}

impl CteOwner for CriteriaBuilder {
    fn add_cte(&mut self, cte: CteDefinition) {
        self.ctes.push(cte);
    }
}

impl QueryBuilder for &mut CriteriaBuilder {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}
