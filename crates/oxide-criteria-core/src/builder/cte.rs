use super::context::AliasScope;
use super::dml::ModificationQuery;
use super::query::{QueryBuilder, QueryState};
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{
    ClauseType, CteBody, CteDefinition, DeepCopy, Predicate, QuerySpec, SelectItem, SetOperator,
};
use crate::error::{CriteriaError, Result};
use crate::render::output_columns;

/// A top-level builder that carries a WITH clause.
pub trait CteOwner: BuilderParent {
    fn add_cte(&mut self, cte: CteDefinition);

    /// Starts a CTE. Without declared columns, the CTE takes the names of
    /// its select items.
    ///
    /// # Errors
    ///
    /// When a CTE of that name exists.
    fn with(&mut self, name: &str, columns: &[&str]) -> Result<CteBuilder<&mut Self>>
    where
        Self: Sized,
    {
        CteBuilder::new(self, name, columns, false)
    }

    /// Starts a recursive CTE, which must declare its columns.
    ///
    /// # Errors
    ///
    /// When a CTE of that name exists or no columns are given.
    fn with_recursive(&mut self, name: &str, columns: &[&str]) -> Result<CteBuilder<&mut Self>>
    where
        Self: Sized,
    {
        CteBuilder::new(self, name, columns, true)
    }

    /// Adds a CTE whose body is a modification query. Its RETURNING
    /// attributes feed the CTE's columns and its bound values move over to
    /// this builder.
    ///
    /// # Errors
    ///
    /// [`CriteriaError::UnsupportedCapability`] when the dialect does not
    /// allow modification queries in a WITH clause, and
    /// [`CriteriaError::IllegalArgument`] when the statement returns nothing
    /// or a different number of columns than declared.
    fn with_modification(&mut self, name: &str, columns: &[&str], query: ModificationQuery) -> Result<&mut Self> {
        let dialect = self.context().dialect();
        if !dialect.supports_modification_query_in_with_clause() {
            return Err(CriteriaError::unsupported(
                "modification query in WITH clause",
                dialect.name(),
            ));
        }
        let ModificationQuery {
            statement,
            parameters,
        } = query;
        if statement.returning.is_empty() {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {name} needs a modification query with RETURNING"
            )));
        }
        let columns: Vec<String> = if columns.is_empty() {
            statement.returning.clone()
        } else {
            columns.iter().map(|c| String::from(*c)).collect()
        };
        if columns.len() != statement.returning.len() {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {name} declares {} columns but its statement returns {}",
                columns.len(),
                statement.returning.len()
            )));
        }
        self.context_mut().declare_cte(name, columns.clone())?;
        let mut rebind = self.context_mut().adopt_parameters(parameters);
        let statement = statement.copy(&mut rebind);
        self.add_cte(CteDefinition {
            name: String::from(name),
            columns,
            recursive: false,
            body: CteBody::Modification(Box::new(statement)),
            materialized: None,
        });
        Ok(self)
    }
}

/// Builds the query of a common table expression.
///
/// The CTE body cannot see the aliases of the statement it belongs to. A
/// recursive CTE is built in two parts: the base query, then `union` or
/// `union_all`, then the recursive query, which may select from the CTE
/// itself through `from_cte`.
#[must_use = "the CTE is only added when the builder is ended"]
pub struct CteBuilder<P: CteOwner> {
    parent: P,
    name: String,
    columns: Vec<String>,
    recursive: bool,
    materialized: Option<bool>,
    base: Option<(QuerySpec, SetOperator)>,
    state: QueryState,
    id: usize,
}

impl<P: CteOwner> CteBuilder<P> {
    pub(crate) fn new(mut parent: P, name: &str, columns: &[&str], recursive: bool) -> Result<Self> {
        let columns: Vec<String> = columns.iter().map(|c| String::from(*c)).collect();
        if recursive {
            if columns.is_empty() {
                return Err(CriteriaError::illegal_argument(format!(
                    "recursive CTE {name} must declare its columns"
                )));
            }
            parent.context_mut().declare_cte(name, columns.clone())?;
        } else if parent.context().cte_columns(name).is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE '{name}' is declared more than once"
            )));
        }
        let id = parent.context_mut().open("CteBuilder");
        Ok(Self {
            parent,
            name: String::from(name),
            columns,
            recursive,
            materialized: None,
            base: None,
            state: QueryState::default(),
            id,
        })
    }

    /// Requests `AS MATERIALIZED` or `AS NOT MATERIALIZED` where the dialect
    /// supports it.
    pub fn materialized(mut self, materialized: bool) -> Self {
        self.materialized = Some(materialized);
        self
    }

    /// Selects `expression` into the declared `column`.
    ///
    /// # Errors
    ///
    /// Undeclared or already bound columns, syntax errors and unresolvable
    /// paths.
    pub fn bind(mut self, column: &str, expression: &str) -> Result<Self> {
        if !self.columns.iter().any(|c| c == column) {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {} has no column '{column}'",
                self.name
            )));
        }
        if self
            .state
            .spec
            .select
            .iter()
            .any(|item| item.alias.as_deref() == Some(column))
        {
            return Err(CriteriaError::illegal_argument(format!(
                "column '{column}' of CTE {} is bound twice",
                self.name
            )));
        }
        let expression = self.parse_expression(expression)?;
        self.state.spec.select.push(SelectItem {
            expression,
            alias: Some(String::from(column)),
        });
        Ok(self)
    }

    fn recursive_part(mut self, operator: SetOperator) -> Result<Self> {
        if !self.recursive || self.base.is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {} has no recursive part to start",
                self.name
            )));
        }
        let base = std::mem::take(&mut self.state);
        self.base = Some((self.order_bound(base.spec)?, operator));
        Ok(self)
    }

    /// Ends the base query of a recursive CTE and starts its recursive part.
    ///
    /// # Errors
    ///
    /// When the CTE is not recursive or the part was already started.
    pub fn union(self) -> Result<Self> {
        self.recursive_part(SetOperator::Union)
    }

    /// See [`CteBuilder::union`].
    ///
    /// # Errors
    ///
    /// When the CTE is not recursive or the part was already started.
    pub fn union_all(self) -> Result<Self> {
        self.recursive_part(SetOperator::UnionAll)
    }

    /// Puts bound select items into declared column order.
    fn order_bound(&self, mut spec: QuerySpec) -> Result<QuerySpec> {
        let bound = spec
            .select
            .iter()
            .filter(|item| {
                item.alias
                    .as_ref()
                    .is_some_and(|alias| self.columns.contains(alias))
            })
            .count();
        if bound == 0 {
            return Ok(spec);
        }
        if bound != self.columns.len() || spec.select.len() != bound {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {} binds {bound} of its {} columns",
                self.name,
                self.columns.len()
            )));
        }
        let mut ordered = Vec::with_capacity(bound);
        for column in &self.columns {
            if let Some(i) = spec
                .select
                .iter()
                .position(|item| item.alias.as_deref() == Some(column.as_str()))
            {
                ordered.push(spec.select.remove(i));
            }
        }
        spec.select = ordered;
        Ok(spec)
    }

    /// Adds the CTE to the statement.
    ///
    /// # Errors
    ///
    /// When columns are left unbound or a recursive CTE has no recursive
    /// part.
    pub fn end(mut self) -> Result<P> {
        self.parent.context_mut().close(self.id);
        let spec = std::mem::take(&mut self.state.spec);
        let spec = self.order_bound(spec)?;
        let body = match self.base.take() {
            Some((base, operator)) => CteBody::Query {
                base,
                recursive: Some((operator, spec)),
            },
            None if self.recursive => {
                return Err(CriteriaError::illegal_argument(format!(
                    "recursive CTE {} has no recursive part",
                    self.name
                )));
            }
            None => CteBody::Query {
                base: spec,
                recursive: None,
            },
        };
        if !self.recursive {
            let columns = match (&body, self.columns.is_empty()) {
                (CteBody::Query { base, .. }, true) => output_columns(&base.select),
                _ => self.columns.clone(),
            };
            self.parent.context_mut().declare_cte(&self.name, columns)?;
        }
        self.parent.add_cte(CteDefinition {
            name: self.name,
            columns: self.columns,
            recursive: self.recursive,
            body,
            materialized: self.materialized,
        });
        Ok(self.parent)
    }
}

impl<P: CteOwner> BuilderParent for CteBuilder<P> {
    fn context(&self) -> &BuilderContext {
        self.parent.context()
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        self.parent.context_mut()
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        out.push(&self.state.scope);
    }
}

impl<P: CteOwner> RestrictionTarget for CteBuilder<P> {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        self.state.restrict(clause, predicate);
    }
}

impl<P: CteOwner> QueryBuilder for CteBuilder<P> {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}
