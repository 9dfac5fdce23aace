//! DELETE, UPDATE and INSERT-SELECT.
//!
//! The target table is referenced by its name, not by the statement alias,
//! since not every product accepts an alias on the modified table. Paths that
//! navigate associations add joins, which are written with the dialect's
//! join syntax for modification queries or, failing that, moved into an
//! `id IN (subquery)` restriction.

use tracing::debug;

use super::Renderer;
use super::plan::{AliasSource, QueryPlan};
use super::query::append_implicit_joins;
use crate::ast::{
    Assignment, ClauseType, DmlKind, DmlStatement, Expression, FromSource, QuerySpec, SelectItem,
};
use crate::dialect::{DbmsDialect, DeleteJoinStyle, ExtendedSqlParts, UpdateJoinStyle};
use crate::error::{CriteriaError, Result};
use crate::metamodel::EntityMetadata;

fn attribute_column(entity: &EntityMetadata, name: &str) -> Result<String> {
    let path = format!("{}.{name}", entity.name);
    let attribute = entity.get(name).ok_or_else(|| {
        CriteriaError::path(
            &path,
            format!("unknown attribute '{name}' of entity {}", entity.name),
        )
    })?;
    attribute
        .column_name()
        .map(String::from)
        .ok_or_else(|| CriteriaError::path(&path, "a collection has no column of its own"))
}

fn where_sql(condition: Option<&str>) -> String {
    condition.map(|c| format!(" WHERE {c}")).unwrap_or_default()
}

/// Implicit joins as a comma separated table list plus their conditions.
fn comma_joins(plan: &QueryPlan<'_>) -> (String, Vec<String>) {
    let tables = plan
        .implicit
        .iter()
        .map(|edge| format!("{} {}", edge.table, edge.alias))
        .collect::<Vec<_>>()
        .join(", ");
    let conditions = plan
        .implicit
        .iter()
        .map(|edge| edge.condition.clone())
        .collect();
    (tables, conditions)
}

fn and_all(mut conditions: Vec<String>, condition: Option<&str>) -> String {
    if let Some(condition) = condition {
        conditions.push(format!("({condition})"));
    }
    conditions.join(" AND ")
}

impl<'a> Renderer<'a> {
    pub(super) fn dml_statement(
        &mut self,
        statement: &DmlStatement,
        is_subquery: bool,
    ) -> Result<String> {
        let dialect: &'a dyn DbmsDialect = self.dialect;
        let with_clause = if statement.ctes.is_empty() {
            None
        } else {
            if !dialect.supports_with_clause_in_modification_query() {
                return Err(CriteriaError::unsupported(
                    "WITH clause in modification query",
                    dialect.name(),
                ));
            }
            self.with_clause(&statement.ctes)?
        };
        let entity = self.entity_metadata(&statement.entity, &statement.entity)?;
        let returning = statement
            .returning
            .iter()
            .map(|attribute| attribute_column(entity, attribute))
            .collect::<Result<Vec<_>>>()?;

        let mut sql = match &statement.kind {
            DmlKind::Insert { attributes, query } => {
                self.insert(statement, entity, attributes, query)?
            }
            kind => {
                let mut scope = QueryPlan::default();
                scope.register(
                    &statement.alias,
                    &entity.table,
                    AliasSource::Entity {
                        entity,
                        collection: None,
                    },
                )?;
                scope.root = Some(statement.alias.clone());
                self.scopes.push(scope);
                let result = match kind {
                    DmlKind::Update { assignments } => self.update(statement, entity, assignments),
                    _ => self.delete(statement, entity),
                };
                self.scopes.pop();
                result?
            }
        };
        dialect.append_extended_sql(
            &mut sql,
            &ExtendedSqlParts {
                with_clause: with_clause.as_deref(),
                returning: &returning,
                is_subquery,
                ..ExtendedSqlParts::default()
            },
        )?;
        Ok(sql)
    }

    fn dml_condition(&mut self, statement: &DmlStatement) -> Result<Option<String>> {
        statement
            .where_clause
            .as_ref()
            .map(|predicate| {
                self.clause = ClauseType::Where;
                self.predicate(predicate)
            })
            .transpose()
    }

    /// `(SELECT alias.id FROM table alias ... WHERE ...)` selecting the rows
    /// a joined modification applies to.
    fn id_subquery(&mut self, statement: &DmlStatement) -> Result<String> {
        debug!(
            dialect = self.dialect.name(),
            entity = %statement.entity,
            "rewriting joined modification as an id subquery"
        );
        let query = QuerySpec {
            select: vec![SelectItem {
                expression: Expression::path(&statement.alias),
                alias: None,
            }],
            from: vec![FromSource::Entity {
                entity: statement.entity.clone(),
                alias: statement.alias.clone(),
            }],
            where_clause: statement.where_clause.clone(),
            ..QuerySpec::default()
        };
        self.subquery(&query)
    }

    fn delete(&mut self, statement: &DmlStatement, entity: &'a EntityMetadata) -> Result<String> {
        let table = &entity.table;
        let condition = self.dml_condition(statement)?;
        if self.scope()?.implicit.is_empty() {
            return Ok(format!("DELETE FROM {table}{}", where_sql(condition.as_deref())));
        }
        match self.dialect.delete_join_style() {
            DeleteJoinStyle::Using => {
                let (tables, conditions) = comma_joins(self.scope()?);
                Ok(format!(
                    "DELETE FROM {table} USING {tables} WHERE {}",
                    and_all(conditions, condition.as_deref())
                ))
            }
            DeleteJoinStyle::From => {
                let mut joins = String::new();
                append_implicit_joins(self.scope()?, &statement.alias, &mut joins);
                Ok(format!(
                    "DELETE {table} FROM {table}{joins}{}",
                    where_sql(condition.as_deref())
                ))
            }
            DeleteJoinStyle::Merge | DeleteJoinStyle::None => {
                let ids = self.id_subquery(statement)?;
                Ok(format!(
                    "DELETE FROM {table} WHERE {table}.{} IN {ids}",
                    entity.id_column()
                ))
            }
        }
    }

    fn update(
        &mut self,
        statement: &DmlStatement,
        entity: &'a EntityMetadata,
        assignments: &[Assignment],
    ) -> Result<String> {
        let table = &entity.table;
        if assignments.is_empty() {
            return Err(CriteriaError::illegal_argument(
                "an UPDATE needs at least one SET assignment",
            ));
        }
        self.clause = ClauseType::Set;
        let mut sets = Vec::with_capacity(assignments.len());
        for assignment in assignments {
            let column = attribute_column(entity, &assignment.attribute)?;
            let value = self.expression(&assignment.value)?;
            sets.push((column, value));
        }
        let joins_in_set = !self.scope()?.implicit.is_empty();
        let condition = self.dml_condition(statement)?;
        let set_list = |qualifier: Option<&str>| {
            sets.iter()
                .map(|(column, value)| match qualifier {
                    Some(qualifier) => format!("{qualifier}.{column} = {value}"),
                    None => format!("{column} = {value}"),
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        if self.scope()?.implicit.is_empty() {
            return Ok(format!(
                "UPDATE {table} SET {}{}",
                set_list(None),
                where_sql(condition.as_deref())
            ));
        }
        match self.dialect.update_join_style() {
            UpdateJoinStyle::From => {
                let (tables, conditions) = comma_joins(self.scope()?);
                Ok(format!(
                    "UPDATE {table} SET {} FROM {tables} WHERE {}",
                    set_list(None),
                    and_all(conditions, condition.as_deref())
                ))
            }
            UpdateJoinStyle::Reference => {
                let mut joins = String::new();
                append_implicit_joins(self.scope()?, &statement.alias, &mut joins);
                Ok(format!(
                    "UPDATE {table}{joins} SET {}{}",
                    set_list(Some(table)),
                    where_sql(condition.as_deref())
                ))
            }
            UpdateJoinStyle::Merge | UpdateJoinStyle::None => {
                if joins_in_set {
                    return Err(CriteriaError::unsupported(
                        "joined values in UPDATE SET",
                        self.dialect.name(),
                    ));
                }
                let ids = self.id_subquery(statement)?;
                Ok(format!(
                    "UPDATE {table} SET {} WHERE {table}.{} IN {ids}",
                    set_list(None),
                    entity.id_column()
                ))
            }
        }
    }

    fn insert(
        &mut self,
        statement: &DmlStatement,
        entity: &'a EntityMetadata,
        attributes: &[String],
        query: &QuerySpec,
    ) -> Result<String> {
        if statement.where_clause.is_some() {
            return Err(CriteriaError::illegal_argument(
                "an INSERT takes its restrictions from the selecting query",
            ));
        }
        let columns = attributes
            .iter()
            .map(|attribute| attribute_column(entity, attribute))
            .collect::<Result<Vec<_>>>()?;
        let selected = self.select_items(query)?.len();
        if selected != columns.len() {
            return Err(CriteriaError::illegal_argument(format!(
                "the INSERT binds {} attributes but its query selects {selected} values",
                columns.len()
            )));
        }
        let (select, _) = self.query(query, None)?;
        Ok(format!(
            "INSERT INTO {}({}) {select}",
            entity.table,
            columns.join(", ")
        ))
    }
}
