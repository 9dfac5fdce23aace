//! DELETE, UPDATE and INSERT-SELECT builders.

use tracing::debug;

use super::case_when::{CaseWhenBuilder, NoWhen, WhereCase};
use super::context::AliasScope;
use super::cte::CteOwner;
use super::junction::JunctionBuilder;
use super::query::{QueryBuilder, QueryState};
use super::restriction::RestrictionBuilder;
use super::subquery::{LeftSubquery, PredicateSubquery, SubqueryBuilder};
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{
    Assignment, BooleanOperator, ClauseType, CteDefinition, DmlKind, DmlStatement, Expression,
    Predicate, SelectItem, ValueType,
};
use crate::error::{CriteriaError, Result};
use crate::execution::{Row, StatementExecutor};
use crate::metamodel::{AttributeMetadata, EntityMetadata};
use crate::render::{ParameterBindings, SqlRenderer, SqlStatement};
use crate::value::ToSqlValue;

/// A finished modification statement with the values bound to it, ready to
/// become the body of a CTE through [`CteOwner::with_modification`].
#[derive(Debug, Clone, PartialEq)]
pub struct ModificationQuery {
    pub(crate) statement: DmlStatement,
    pub(crate) parameters: ParameterBindings,
}

impl ModificationQuery {
    #[must_use]
    pub const fn statement(&self) -> &DmlStatement {
        &self.statement
    }
}

/// State shared by the modification builders.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub struct Modification {
    context: BuilderContext,
    scope: AliasScope,
    entity: String,
    alias: String,
    where_clause: Option<Predicate>,
    ctes: Vec<CteDefinition>,
    returning: Vec<String>,
}

impl Modification {
    fn new(context: BuilderContext, entity: &str, alias: &str) -> Result<Self> {
        if context.metamodel().entity(entity).is_none() {
            return Err(CriteriaError::path(entity, format!("unknown entity {entity}")));
        }
        let mut scope = AliasScope::default();
        scope.declare_root(alias, Some(entity), Vec::new())?;
        Ok(Self {
            context,
            scope,
            entity: String::from(entity),
            alias: String::from(alias),
            where_clause: None,
            ctes: Vec::new(),
            returning: Vec::new(),
        })
    }

    fn entity(&self) -> Result<&EntityMetadata> {
        self.context
            .metamodel()
            .entity(&self.entity)
            .ok_or_else(|| CriteriaError::path(&self.entity, "unknown entity"))
    }

    /// An attribute stored in a column of the entity's own table.
    fn column_attribute(&self, attribute: &str) -> Result<&AttributeMetadata> {
        let entity = self.entity()?;
        entity
            .get(attribute)
            .filter(|a| a.column_name().is_some())
            .ok_or_else(|| {
                CriteriaError::path(
                    format!("{}.{attribute}", self.entity),
                    format!("'{attribute}' is not a column attribute of entity {}", self.entity),
                )
            })
    }

    fn add_returning(&mut self, attribute: &str) -> Result<()> {
        self.column_attribute(attribute)?;
        if !self.context.dialect().supports_returning_columns() {
            return Err(CriteriaError::unsupported(
                "RETURNING",
                self.context.dialect().name(),
            ));
        }
        self.returning.push(String::from(attribute));
        Ok(())
    }

    fn statement(&self, kind: DmlKind) -> DmlStatement {
        DmlStatement {
            ctes: self.ctes.clone(),
            entity: self.entity.clone(),
            alias: self.alias.clone(),
            kind,
            where_clause: self.where_clause.clone(),
            returning: self.returning.clone(),
        }
    }

    fn render(&self, statement: &DmlStatement) -> Result<SqlStatement> {
        self.context.verify_builder_ended()?;
        SqlRenderer::new(
            self.context.dialect(),
            self.context.metamodel(),
            self.context.config(),
        )
        .with_parameters(self.context.parameters())
        .render_dml(statement)
    }

    fn execute(&self, statement: &DmlStatement, executor: &dyn StatementExecutor) -> Result<Vec<Row>> {
        let sql = self.render(statement)?;
        debug!(sql = %sql.sql, entity = %self.entity, "executing modification");
        executor.query(&sql)
    }

    fn into_query(self, statement: DmlStatement) -> Result<ModificationQuery> {
        self.context.verify_builder_ended()?;
        Ok(ModificationQuery {
            statement,
            parameters: self.context.parameters().clone(),
        })
    }
}

/// Restrictions and RETURNING of DELETE and UPDATE statements.
///
/// Implemented for `&mut DeleteCriteriaBuilder` and
/// `&mut UpdateCriteriaBuilder`.
pub trait ModificationBuilder: RestrictionTarget + Sized {
    #[doc(hidden)]
    fn modification_mut(&mut self) -> &mut Modification;

    /// Starts a restriction on `expression`.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn where_(self, expression: &str) -> Result<RestrictionBuilder<Self>> {
        let left = self.parse_expression(expression)?;
        Ok(RestrictionBuilder::new(self, left, ClauseType::Where))
    }

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

    fn where_case(self) -> CaseWhenBuilder<WhereCase<Self>, NoWhen> {
        CaseWhenBuilder::attached(WhereCase::new(self, ClauseType::Where))
    }

    fn where_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        SubqueryBuilder::new(PredicateSubquery::exists(self, ClauseType::Where, false))
    }

    fn where_not_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        SubqueryBuilder::new(PredicateSubquery::exists(self, ClauseType::Where, true))
    }

    fn where_subquery(self) -> SubqueryBuilder<LeftSubquery<Self>> {
        SubqueryBuilder::new(LeftSubquery::new(self, ClauseType::Where))
    }

    /// Returns `attribute` of every modified row.
    ///
    /// # Errors
    ///
    /// Attributes without a column and dialects without RETURNING.
    fn returning(mut self, attribute: &str) -> Result<Self> {
        self.modification_mut().add_returning(attribute)?;
        Ok(self)
    }
}

macro_rules! modification_parent {
    ($builder:ty) => {
        impl BuilderParent for $builder {
            fn context(&self) -> &BuilderContext {
                &self.modification.context
            }

            fn context_mut(&mut self) -> &mut BuilderContext {
                &mut self.modification.context
            }

            fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
                out.push(&self.modification.scope);
            }
        }

        impl RestrictionTarget for $builder {
            fn add_restriction(&mut self, _clause: ClauseType, predicate: Predicate) {
                let modification = &mut self.modification;
                modification.where_clause = Some(match modification.where_clause.take() {
                    Some(existing) => existing.and(predicate),
                    None => predicate,
                });
            }
        }

        impl CteOwner for $builder {
            fn add_cte(&mut self, cte: CteDefinition) {
                self.modification.ctes.push(cte);
            }
        }

        impl ModificationBuilder for &mut $builder {
            fn modification_mut(&mut self) -> &mut Modification {
                &mut self.modification
            }
        }
    };
}

/// Builds `DELETE FROM entity alias WHERE ...`.
#[derive(Debug, Clone)]
pub struct DeleteCriteriaBuilder {
    modification: Modification,
}

modification_parent!(DeleteCriteriaBuilder);

impl DeleteCriteriaBuilder {
    pub(crate) fn new(context: BuilderContext, entity: &str, alias: &str) -> Result<Self> {
        Ok(Self {
            modification: Modification::new(context, entity, alias)?,
        })
    }

    #[must_use]
    pub fn statement(&self) -> DmlStatement {
        self.modification.statement(DmlKind::Delete)
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn get_query_string(&self) -> Result<String> {
        self.modification.context.verify_builder_ended()?;
        Ok(self.statement().to_string())
    }

    /// # Errors
    ///
    /// Open sub-builders and rendering errors.
    pub fn render(&self) -> Result<SqlStatement> {
        self.modification.render(&self.statement())
    }

    /// Runs the statement and returns the RETURNING rows.
    ///
    /// # Errors
    ///
    /// Rendering and executor errors.
    pub fn execute(&self, executor: &dyn StatementExecutor) -> Result<Vec<Row>> {
        self.modification.execute(&self.statement(), executor)
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn into_query(self) -> Result<ModificationQuery> {
        let statement = self.statement();
        self.modification.into_query(statement)
    }
}

/// Builds `UPDATE entity alias SET ... WHERE ...`.
#[derive(Debug, Clone)]
pub struct UpdateCriteriaBuilder {
    modification: Modification,
    assignments: Vec<Assignment>,
}

modification_parent!(UpdateCriteriaBuilder);

impl UpdateCriteriaBuilder {
    pub(crate) fn new(context: BuilderContext, entity: &str, alias: &str) -> Result<Self> {
        Ok(Self {
            modification: Modification::new(context, entity, alias)?,
            assignments: Vec::new(),
        })
    }

    fn assign(&mut self, attribute: &str, value: Expression) -> Result<&mut Self> {
        if self.assignments.iter().any(|a| a.attribute == attribute) {
            return Err(CriteriaError::illegal_argument(format!(
                "attribute '{attribute}' is assigned twice"
            )));
        }
        self.assignments.push(Assignment {
            attribute: String::from(attribute),
            value,
        });
        Ok(self)
    }

    /// Assigns a bound value.
    ///
    /// # Errors
    ///
    /// Attributes without a column, values of the wrong type and attributes
    /// assigned twice.
    pub fn set(&mut self, attribute: &str, value: impl ToSqlValue) -> Result<&mut Self> {
        let value = value.to_sql_value();
        let value_type = match &self.modification.column_attribute(attribute)?.value_type {
            ValueType::Entity(_) => ValueType::Long,
            other => other.clone(),
        };
        if !value_type.accepts(&value) {
            return Err(CriteriaError::illegal_argument(format!(
                "value {value} does not fit {}.{attribute} of type {value_type}",
                self.modification.entity
            )));
        }
        let parameter = self.modification.context.bind_generated(value);
        self.assign(attribute, Expression::Parameter(parameter))
    }

    /// Assigns an expression such as `c.age + 1`.
    ///
    /// # Errors
    ///
    /// Attributes without a column, syntax errors, unresolvable paths and
    /// attributes assigned twice.
    pub fn set_expression(&mut self, attribute: &str, expression: &str) -> Result<&mut Self> {
        self.modification.column_attribute(attribute)?;
        let expression = self.parse_expression(expression)?;
        self.assign(attribute, expression)
    }

    #[must_use]
    pub fn statement(&self) -> DmlStatement {
        self.modification.statement(DmlKind::Update {
            assignments: self.assignments.clone(),
        })
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn get_query_string(&self) -> Result<String> {
        self.modification.context.verify_builder_ended()?;
        Ok(self.statement().to_string())
    }

    /// # Errors
    ///
    /// Open sub-builders, a missing SET and rendering errors.
    pub fn render(&self) -> Result<SqlStatement> {
        self.modification.render(&self.statement())
    }

    /// Runs the statement and returns the RETURNING rows.
    ///
    /// # Errors
    ///
    /// Rendering and executor errors.
    pub fn execute(&self, executor: &dyn StatementExecutor) -> Result<Vec<Row>> {
        self.modification.execute(&self.statement(), executor)
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn into_query(self) -> Result<ModificationQuery> {
        let statement = self.statement();
        self.modification.into_query(statement)
    }
}

/// Builds `INSERT INTO entity(attributes) SELECT ...`.
///
/// The selecting query is built through [`QueryBuilder`], implemented for
/// `&mut InsertCriteriaBuilder`; each [`InsertCriteriaBuilder::bind`] adds
/// one target attribute and the select item feeding it.
#[derive(Debug, Clone)]
pub struct InsertCriteriaBuilder {
    modification: Modification,
    attributes: Vec<String>,
    state: QueryState,
}

impl InsertCriteriaBuilder {
    pub(crate) fn new(context: BuilderContext, entity: &str) -> Result<Self> {
        Ok(Self {
            modification: Modification::new(context, entity, entity)?,
            attributes: Vec::new(),
            state: QueryState::default(),
        })
    }

    fn bind_item(&mut self, attribute: &str, expression: Expression) -> Result<&mut Self> {
        self.modification.column_attribute(attribute)?;
        if self.attributes.iter().any(|a| a == attribute) {
            return Err(CriteriaError::illegal_argument(format!(
                "attribute '{attribute}' is bound twice"
            )));
        }
        self.attributes.push(String::from(attribute));
        self.state.spec.select.push(SelectItem {
            expression,
            alias: None,
        });
        Ok(self)
    }

    /// Inserts the value of `expression`, evaluated against the selecting
    /// query, into `attribute`.
    ///
    /// # Errors
    ///
    /// Attributes without a column, attributes bound twice, syntax errors
    /// and unresolvable paths.
    pub fn bind(&mut self, attribute: &str, expression: &str) -> Result<&mut Self> {
        let expression = self.parse_expression(expression)?;
        self.bind_item(attribute, expression)
    }

    /// Inserts a constant into `attribute`.
    ///
    /// # Errors
    ///
    /// Attributes without a column and attributes bound twice.
    pub fn bind_value(&mut self, attribute: &str, value: impl ToSqlValue) -> Result<&mut Self> {
        let parameter = self.modification.context.bind_generated(value);
        self.bind_item(attribute, Expression::Parameter(parameter))
    }

    /// Returns `attribute` of every inserted row.
    ///
    /// # Errors
    ///
    /// Attributes without a column and dialects without RETURNING.
    pub fn returning(&mut self, attribute: &str) -> Result<&mut Self> {
        self.modification.add_returning(attribute)?;
        Ok(self)
    }

    #[must_use]
    pub fn statement(&self) -> DmlStatement {
        self.modification.statement(DmlKind::Insert {
            attributes: self.attributes.clone(),
            query: self.state.spec.clone(),
        })
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn get_query_string(&self) -> Result<String> {
        self.modification.context.verify_builder_ended()?;
        Ok(self.statement().to_string())
    }

    /// # Errors
    ///
    /// Open sub-builders, a select list that does not match the bound
    /// attributes and rendering errors.
    pub fn render(&self) -> Result<SqlStatement> {
        self.modification.render(&self.statement())
    }

    /// Runs the statement and returns the RETURNING rows.
    ///
    /// # Errors
    ///
    /// Rendering and executor errors.
    pub fn execute(&self, executor: &dyn StatementExecutor) -> Result<Vec<Row>> {
        self.modification.execute(&self.statement(), executor)
    }

    /// # Errors
    ///
    /// When a sub-builder is still open.
    pub fn into_query(self) -> Result<ModificationQuery> {
        let statement = self.statement();
        self.modification.into_query(statement)
    }
}

impl BuilderParent for InsertCriteriaBuilder {
    fn context(&self) -> &BuilderContext {
        &self.modification.context
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        &mut self.modification.context
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        out.push(&self.state.scope);
    }
}

impl RestrictionTarget for InsertCriteriaBuilder {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        self.state.restrict(clause, predicate);
    }
}

impl CteOwner for InsertCriteriaBuilder {
    fn add_cte(&mut self, cte: CteDefinition) {
        self.modification.ctes.push(cte);
    }
}

impl QueryBuilder for &mut InsertCriteriaBuilder {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::builder::CriteriaBuilderFactory;
    use crate::config::CriteriaConfig;
    use crate::metamodel::StaticMetamodel;

    fn factory(dialect: &str) -> CriteriaBuilderFactory {
        let metamodel = StaticMetamodel::new()
            .with_entity(
                EntityMetadata::new("Cat", "cat")
                    .attribute(AttributeMetadata::basic("name", ValueType::String))
                    .attribute(AttributeMetadata::basic("age", ValueType::Integer))
                    .attribute(AttributeMetadata::many_to_one("owner", "Person", "owner_id")),
            )
            .with_entity(
                EntityMetadata::new("Person", "person")
                    .attribute(AttributeMetadata::basic("name", ValueType::String)),
            );
        CriteriaBuilderFactory::new(CriteriaConfig::for_dialect(dialect), Arc::new(metamodel))
            .unwrap()
    }

    #[test]
    fn delete_with_restriction() {
        let mut delete = factory("postgresql").delete("Cat", "c").unwrap();
        delete.where_("c.age").unwrap().gt(10);
        assert_eq!(
            delete.get_query_string().unwrap(),
            "DELETE FROM Cat c WHERE c.age > :param_1"
        );
        let sql = delete.render().unwrap();
        assert_eq!(sql.sql, "DELETE FROM cat WHERE cat.age > $1");
    }

    #[test]
    fn update_assignments() {
        let mut update = factory("postgresql").update("Cat", "c").unwrap();
        update.set("name", "Tom").unwrap();
        update.set_expression("age", "c.age + 1").unwrap();
        update.where_("c.id").unwrap().eq(5);
        assert_eq!(
            update.get_query_string().unwrap(),
            "UPDATE Cat c SET c.name = :param_1, c.age = c.age + 1 WHERE c.id = :param_2"
        );
    }

    #[test]
    fn update_rejects_mistyped_value() {
        let mut update = factory("postgresql").update("Cat", "c").unwrap();
        assert!(matches!(
            update.set("age", "old"),
            Err(CriteriaError::IllegalArgument(_))
        ));
        assert!(update.set("age", 3).is_ok());
        assert!(update.set("age", 4).is_err());
    }

    #[test]
    fn insert_select() {
        let mut insert = factory("postgresql").insert("Cat").unwrap();
        insert.from("Person", "p").unwrap();
        insert.bind("name", "p.name").unwrap();
        insert.bind_value("age", 1).unwrap();
        assert_eq!(
            insert.get_query_string().unwrap(),
            "INSERT INTO Cat(name, age) SELECT p.name, :param_1 FROM Person p"
        );
    }

    #[test]
    fn returning_needs_dialect_support() {
        let mut delete = factory("mysql").delete("Cat", "c").unwrap();
        assert!(matches!(
            delete.returning("id"),
            Err(CriteriaError::UnsupportedCapability { .. })
        ));
    }

    #[test]
    fn unended_restriction_blocks_rendering() {
        let mut delete = factory("postgresql").delete("Cat", "c").unwrap();
        let restriction = delete.where_("c.age").unwrap();
        drop(restriction);
        assert!(matches!(
            delete.render(),
            Err(CriteriaError::BuilderChaining { .. })
        ));
    }
}
