use super::context::AliasScope;
use super::criteria::CriteriaBuilder;
use super::query::{QueryBuilder, QueryState};
use super::{BuilderContext, BuilderParent, RestrictionTarget};
use crate::ast::{ClauseType, Predicate, SetOperation, SetOperator};
use crate::error::{CriteriaError, Result};

/// Builds the right operand of a set operation.
///
/// The operand is a query block of its own; it does not see the aliases of
/// the preceding operands. ORDER BY and paging set on the
/// [`CriteriaBuilder`] apply to the combined result.
#[must_use = "the set operation is only added when the operand is ended"]
pub struct SetOperandBuilder<'a> {
    parent: &'a mut CriteriaBuilder,
    operator: SetOperator,
    state: QueryState,
    id: usize,
}

impl<'a> SetOperandBuilder<'a> {
    pub(crate) fn new(parent: &'a mut CriteriaBuilder, operator: SetOperator) -> Self {
        let id = parent.context_mut().open("SetOperandBuilder");
        Self {
            parent,
            operator,
            state: QueryState::default(),
            id,
        }
    }

    #[must_use]
    pub const fn operator(&self) -> SetOperator {
        self.operator
    }

    /// Adds the operand.
    ///
    /// # Errors
    ///
    /// When the operand has no FROM item and no select list.
    pub fn end(self) -> Result<&'a mut CriteriaBuilder> {
        self.parent.context_mut().close(self.id);
        let query = self.state.spec;
        if query.from.is_empty() && query.select.is_empty() {
            return Err(CriteriaError::illegal_argument(format!(
                "the {} operand needs a FROM item or a select list",
                self.operator.as_str()
            )));
        }
        self.parent.add_set_operation(SetOperation {
            operator: self.operator,
            query,
        });
        Ok(self.parent)
    }
}

impl BuilderParent for SetOperandBuilder<'_> {
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

impl RestrictionTarget for SetOperandBuilder<'_> {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        self.state.restrict(clause, predicate);
    }
}

impl QueryBuilder for SetOperandBuilder<'_> {
    fn query_state(&self) -> &QueryState {
        &self.state
    }

    fn query_state_mut(&mut self) -> &mut QueryState {
        &mut self.state
    }
}
