use super::case_when::{CaseWhenBuilder, NoWhen, WhereCase};
use super::context::AliasScope;
use super::restriction::RestrictionBuilder;
use super::subquery::{PredicateSubquery, SubqueryBuilder};
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{BooleanOperator, ClauseType, CompoundPredicate, Predicate};
use crate::error::Result;

/// Collects restrictions into one OR or AND group.
///
/// Children keep the order they were added in. Groups nest without limit:
/// `where_and` inside an OR group, `where_or` inside an AND group. A group
/// that is ended without children adds nothing.
#[must_use = "a group is only added when it is ended"]
pub struct JunctionBuilder<P: RestrictionTarget> {
    parent: P,
    group: CompoundPredicate,
    clause: ClauseType,
    id: usize,
}

/// An OR group in a WHERE, HAVING or ON clause.
pub type WhereOrBuilder<P> = JunctionBuilder<P>;

/// An AND group, usually nested in an OR group.
pub type WhereAndBuilder<P> = JunctionBuilder<P>;

impl<P: RestrictionTarget> JunctionBuilder<P> {
    pub(crate) fn new(mut parent: P, operator: BooleanOperator, clause: ClauseType) -> Self {
        let name = match (clause, operator) {
            (ClauseType::Having, BooleanOperator::Or) => "HavingOrBuilder",
            (ClauseType::Having, BooleanOperator::And) => "HavingAndBuilder",
            (_, BooleanOperator::Or) => "WhereOrBuilder",
            (_, BooleanOperator::And) => "WhereAndBuilder",
        };
        let id = parent.context_mut().open(name);
        Self {
            parent,
            group: CompoundPredicate::new(operator),
            clause,
            id,
        }
    }

    #[must_use]
    pub const fn operator(&self) -> BooleanOperator {
        self.group.operator
    }

    /// Starts a restriction that becomes the next child of the group.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn where_(self, expression: &str) -> Result<RestrictionBuilder<Self>> {
        let left = self.parse_expression(expression)?;
        let clause = self.clause;
        Ok(RestrictionBuilder::new(self, left, clause))
    }

    /// Adds a complete predicate written as text.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn where_expression(mut self, predicate: &str) -> Result<Self> {
        let predicate = self.parse_predicate(predicate)?;
        self.group.push(predicate);
        Ok(self)
    }

    pub fn where_or(self) -> JunctionBuilder<Self> {
        let clause = self.clause;
        JunctionBuilder::new(self, BooleanOperator::Or, clause)
    }

    pub fn where_and(self) -> JunctionBuilder<Self> {
        let clause = self.clause;
        JunctionBuilder::new(self, BooleanOperator::And, clause)
    }

    pub fn where_case(self) -> CaseWhenBuilder<WhereCase<Self>, NoWhen> {
        let clause = self.clause;
        CaseWhenBuilder::attached(WhereCase::new(self, clause))
    }

    pub fn where_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        let clause = self.clause;
        SubqueryBuilder::new(PredicateSubquery::exists(self, clause, false))
    }

    pub fn where_not_exists(self) -> SubqueryBuilder<PredicateSubquery<Self>> {
        let clause = self.clause;
        SubqueryBuilder::new(PredicateSubquery::exists(self, clause, true))
    }

    /// Closes the group and hands it to the enclosing builder.
    pub fn end(mut self) -> P {
        self.parent.context_mut().close(self.id);
        if !self.group.is_empty() {
            let group = Predicate::Compound(self.group).simplified();
            self.parent.add_restriction(self.clause, group);
        }
        self.parent
    }
}

impl<P: RestrictionTarget> BuilderParent for JunctionBuilder<P> {
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

impl<P: RestrictionTarget> RestrictionTarget for JunctionBuilder<P> {
    fn add_restriction(&mut self, _clause: ClauseType, predicate: Predicate) {
        self.group.push(predicate);
    }
}
