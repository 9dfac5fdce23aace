use super::context::AliasScope;
use super::junction::JunctionBuilder;
use super::query::QueryBuilder;
use super::restriction::RestrictionBuilder;
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{BooleanOperator, ClauseType, CompoundPredicate, Predicate};
use crate::error::Result;

/// Builds the ON condition of an explicit join.
///
/// Restrictions are combined with AND. An association join keeps its key
/// condition and the ON condition is added to it; an entity or CTE join
/// without restrictions joins every row.
#[must_use = "the join condition is only set when the builder is ended"]
pub struct JoinOnBuilder<P: QueryBuilder> {
    parent: P,
    alias: String,
    condition: CompoundPredicate,
    id: usize,
}

impl<P: QueryBuilder> JoinOnBuilder<P> {
    pub(crate) fn new(mut parent: P, alias: &str) -> Self {
        let id = parent.context_mut().open("JoinOnBuilder");
        Self {
            parent,
            alias: String::from(alias),
            condition: CompoundPredicate::new(BooleanOperator::And),
            id,
        }
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn on(self, expression: &str) -> Result<RestrictionBuilder<Self>> {
        let left = self.parse_expression(expression)?;
        Ok(RestrictionBuilder::new(self, left, ClauseType::JoinOn))
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn on_expression(mut self, predicate: &str) -> Result<Self> {
        let predicate = self.parse_predicate(predicate)?;
        self.condition.push(predicate);
        Ok(self)
    }

    pub fn on_or(self) -> JunctionBuilder<Self> {
        JunctionBuilder::new(self, BooleanOperator::Or, ClauseType::JoinOn)
    }

    pub fn end(mut self) -> P {
        self.parent.context_mut().close(self.id);
        let on = (!self.condition.is_empty())
            .then(|| Predicate::Compound(self.condition).simplified());
        if let Some(node) = self
            .parent
            .query_state_mut()
            .spec
            .joins
            .iter_mut()
            .find(|node| node.alias == self.alias)
        {
            node.on = on;
        }
        self.parent
    }
}

impl<P: QueryBuilder> BuilderParent for JoinOnBuilder<P> {
    fn context(&self) -> &BuilderContext {
        self.parent.context()
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        self.parent.context_mut()
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        self.parent.scopes(out);
    }
}

impl<P: QueryBuilder> RestrictionTarget for JoinOnBuilder<P> {
    fn add_restriction(&mut self, _clause: ClauseType, predicate: Predicate) {
        self.condition.push(predicate);
    }
}
