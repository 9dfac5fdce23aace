//! Subqueries and the places they end up in.
//!
//! A [`SubqueryBuilder`] is a full [`QueryBuilder`] with its own alias scope
//! stacked on top of its parent's. Aliases of enclosing queries stay
//! resolvable inside it, which is how correlated subqueries are written:
//!
//! ```text
//! cb.from("Cat", "c")?
//!     .where_exists()
//!     .from("Cat", "k")?
//!     .where_("k.mother")?.eq_expression("c")?
//!     .end()?;
//! ```

use super::context::AliasScope;
use super::query::{QueryBuilder, QueryState};
use super::restriction::RestrictionBuilder;
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{
    ClauseType, ComparisonPredicate, ExistsPredicate, Expression, InPredicate, JoinNode,
    JoinTarget, JoinType, Predicate, SelectItem, SubqueryExpression,
};
use crate::error::{CriteriaError, Result};
use crate::render::output_columns;

/// Consumer of a finished subquery.
pub trait SubqueryTarget {
    type Parent: BuilderParent;
    type Output;

    fn parent(&self) -> &Self::Parent;

    fn parent_mut(&mut self) -> &mut Self::Parent;

    /// Attaches the subquery.
    ///
    /// # Errors
    ///
    /// When the subquery does not fit the place it is used in.
    fn finish(self, subquery: SubqueryExpression) -> Result<Self::Output>;
}

/// Builds a subquery and hands it to its target on [`SubqueryBuilder::end`].
#[must_use = "a subquery is only used once it is ended"]
pub struct SubqueryBuilder<T: SubqueryTarget> {
    target: T,
    state: QueryState,
    id: usize,
}

impl<T: SubqueryTarget> SubqueryBuilder<T> {
    pub(crate) fn new(mut target: T) -> Self {
        let id = target.parent_mut().context_mut().open("SubqueryBuilder");
        Self {
            target,
            state: QueryState::default(),
            id,
        }
    }

    /// Finishes the subquery.
    ///
    /// # Errors
    ///
    /// When the subquery has neither a FROM item nor a select list, or does
    /// not fit the place it is used in.
    pub fn end(mut self) -> Result<T::Output> {
        self.target.parent_mut().context_mut().close(self.id);
        let spec = self.state.spec;
        if spec.from.is_empty() && spec.select.is_empty() {
            return Err(CriteriaError::illegal_argument(
                "a subquery needs a FROM item or a select list",
            ));
        }
        self.target.finish(SubqueryExpression::new(spec))
    }
}

impl<T: SubqueryTarget> BuilderParent for SubqueryBuilder<T> {
    fn context(&self) -> &BuilderContext {
        self.target.parent().context()
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        self.target.parent_mut().context_mut()
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        self.target.parent().scopes(out);
        out.push(&self.state.scope);
    }
}

impl<T: SubqueryTarget> RestrictionTarget for SubqueryBuilder<T> {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        self.state.restrict(clause, predicate);
    }
}

impl<T: SubqueryTarget> QueryBuilder for SubqueryBuilder<T> {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}

enum Pending {
    Exists { negated: bool },
    Comparison(ComparisonPredicate),
    Membership(InPredicate),
}

/// A subquery used in EXISTS, IN or a comparison.
pub struct PredicateSubquery<P: RestrictionTarget> {
    parent: P,
    clause: ClauseType,
    pending: Pending,
}

impl<P: RestrictionTarget> PredicateSubquery<P> {
    pub(crate) const fn exists(parent: P, clause: ClauseType, negated: bool) -> Self {
        Self {
            parent,
            clause,
            pending: Pending::Exists { negated },
        }
    }

    pub(crate) const fn comparison(parent: P, clause: ClauseType, comparison: ComparisonPredicate) -> Self {
        Self {
            parent,
            clause,
            pending: Pending::Comparison(comparison),
        }
    }

    pub(crate) const fn membership(parent: P, clause: ClauseType, membership: InPredicate) -> Self {
        Self {
            parent,
            clause,
            pending: Pending::Membership(membership),
        }
    }
}

impl<P: RestrictionTarget> SubqueryTarget for PredicateSubquery<P> {
    type Parent = P;
    type Output = P;

    fn parent(&self) -> &P {
        &self.parent
    }

    fn parent_mut(&mut self) -> &mut P {
        &mut self.parent
    }

    fn finish(mut self, subquery: SubqueryExpression) -> Result<P> {
        let predicate = match self.pending {
            Pending::Exists { negated } => Predicate::Exists(ExistsPredicate {
                subquery: Expression::Subquery(subquery),
                negated,
            }),
            Pending::Comparison(mut comparison) => {
                if subquery.query.select.len() > 1 {
                    return Err(CriteriaError::illegal_argument(format!(
                        "a subquery compared with {} must select a single item",
                        comparison.left
                    )));
                }
                comparison.right = Expression::Subquery(subquery);
                Predicate::Comparison(comparison)
            }
            Pending::Membership(mut membership) => {
                membership.right = vec![Expression::Subquery(subquery)];
                Predicate::In(membership)
            }
        };
        self.parent.add_restriction(self.clause, predicate);
        Ok(self.parent)
    }
}

/// A subquery that becomes the left side of a restriction.
pub struct LeftSubquery<P: RestrictionTarget> {
    parent: P,
    clause: ClauseType,
}

impl<P: RestrictionTarget> LeftSubquery<P> {
    pub(crate) const fn new(parent: P, clause: ClauseType) -> Self {
        Self { parent, clause }
    }
}

impl<P: RestrictionTarget> SubqueryTarget for LeftSubquery<P> {
    type Parent = P;
    type Output = RestrictionBuilder<P>;

    fn parent(&self) -> &P {
        &self.parent
    }

    fn parent_mut(&mut self) -> &mut P {
        &mut self.parent
    }

    fn finish(self, subquery: SubqueryExpression) -> Result<RestrictionBuilder<P>> {
        Ok(RestrictionBuilder::new(
            self.parent,
            Expression::Subquery(subquery),
            self.clause,
        ))
    }
}

/// A scalar subquery in the select list.
pub struct SelectSubquery<P: QueryBuilder> {
    parent: P,
    alias: Option<String>,
}

impl<P: QueryBuilder> SelectSubquery<P> {
    pub(crate) fn new(parent: P, alias: Option<&str>) -> Self {
        Self {
            parent,
            alias: alias.map(String::from),
        }
    }
}

impl<P: QueryBuilder> SubqueryTarget for SelectSubquery<P> {
    type Parent = P;
    type Output = P;

    fn parent(&self) -> &P {
        &self.parent
    }

    fn parent_mut(&mut self) -> &mut P {
        &mut self.parent
    }

    fn finish(mut self, subquery: SubqueryExpression) -> Result<P> {
        if subquery.query.select.len() > 1 {
            return Err(CriteriaError::illegal_argument(
                "a subquery in the select list must select a single item",
            ));
        }
        self.parent.query_state_mut().spec.select.push(SelectItem {
            expression: Expression::Subquery(subquery),
            alias: self.alias,
        });
        Ok(self.parent)
    }
}

/// A subquery joined laterally.
pub struct LateralSubquery<P: QueryBuilder> {
    parent: P,
    alias: String,
    join_type: JoinType,
}

impl<P: QueryBuilder> LateralSubquery<P> {
    pub(crate) fn new(parent: P, alias: &str, join_type: JoinType) -> Self {
        Self {
            parent,
            alias: String::from(alias),
            join_type,
        }
    }
}

impl<P: QueryBuilder> SubqueryTarget for LateralSubquery<P> {
    type Parent = P;
    type Output = P;

    fn parent(&self) -> &P {
        &self.parent
    }

    fn parent_mut(&mut self) -> &mut P {
        &mut self.parent
    }

    fn finish(mut self, subquery: SubqueryExpression) -> Result<P> {
        if subquery.query.select.is_empty() {
            return Err(CriteriaError::illegal_argument(format!(
                "lateral subquery '{}' needs a select list",
                self.alias
            )));
        }
        let parent_alias = self
            .parent
            .query_state()
            .spec
            .from
            .first()
            .map(|source| String::from(source.alias()))
            .ok_or_else(|| CriteriaError::illegal_argument("a join needs a FROM item first"))?;
        let columns = output_columns(&subquery.query.select);
        let state = self.parent.query_state_mut();
        state.scope.declare_columns(&self.alias, columns)?;
        state.spec.joins.push(JoinNode {
            join_type: self.join_type,
            target: JoinTarget::Subquery(subquery.query),
            alias: self.alias,
            parent_alias,
            on: None,
        });
        Ok(self.parent)
    }
}

