use super::subquery::{PredicateSubquery, SubqueryBuilder};
use super::RestrictionTarget;
use crate::ast::{
    BetweenPredicate, ClauseType, ComparisonOperator, ComparisonPredicate, Expression,
    InPredicate, IsEmptyPredicate, LikePredicate, MemberOfPredicate, PathExpression, Predicate,
    PredicateQuantifier,
};
use crate::error::{CriteriaError, Result};
use crate::value::ToSqlValue;

/// A restriction whose left side is known and whose operator is pending.
///
/// Values passed to the terminal methods are bound as generated named
/// parameters. The `_expression` forms take the right side as expression
/// text.
#[must_use = "a restriction is only added by one of its terminal methods"]
pub struct RestrictionBuilder<P: RestrictionTarget> {
    parent: P,
    left: Expression,
    clause: ClauseType,
    id: usize,
}

impl<P: RestrictionTarget> RestrictionBuilder<P> {
    pub(crate) fn new(mut parent: P, left: Expression, clause: ClauseType) -> Self {
        let id = parent.context_mut().open("RestrictionBuilder");
        Self {
            parent,
            left,
            clause,
            id,
        }
    }

    /// The left side of the pending restriction.
    #[must_use]
    pub const fn left(&self) -> &Expression {
        &self.left
    }

    fn finish(mut self, predicate: Predicate) -> P {
        self.parent.context_mut().close(self.id);
        self.parent.add_restriction(self.clause, predicate);
        self.parent
    }

    fn bind(&mut self, value: impl ToSqlValue) -> Expression {
        Expression::Parameter(self.parent.context_mut().bind_generated(value))
    }

    fn parse(&mut self, text: &str) -> Result<Expression> {
        let parsed = self.parent.parse_expression(text);
        if parsed.is_err() {
            self.parent.context_mut().close(self.id);
        }
        parsed
    }

    fn compare(mut self, operator: ComparisonOperator, value: impl ToSqlValue) -> P {
        let right = self.bind(value);
        let left = self.left.clone();
        self.finish(Predicate::compare(left, operator, right))
    }

    fn compare_expression(mut self, operator: ComparisonOperator, text: &str) -> Result<P> {
        let right = self.parse(text)?;
        let left = self.left.clone();
        Ok(self.finish(Predicate::compare(left, operator, right)))
    }

    pub fn eq(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::Eq, value)
    }

    pub fn not_eq(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::NotEq, value)
    }

    pub fn lt(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::Lt, value)
    }

    pub fn le(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::Le, value)
    }

    pub fn gt(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::Gt, value)
    }

    pub fn ge(self, value: impl ToSqlValue) -> P {
        self.compare(ComparisonOperator::Ge, value)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn eq_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::Eq, text)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn not_eq_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::NotEq, text)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn lt_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::Lt, text)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn le_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::Le, text)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn gt_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::Gt, text)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in `text`.
    pub fn ge_expression(self, text: &str) -> Result<P> {
        self.compare_expression(ComparisonOperator::Ge, text)
    }

    fn range(self, start: Expression, end: Expression, negated: bool) -> P {
        let expression = self.left.clone();
        self.finish(Predicate::Between(BetweenPredicate {
            expression,
            start,
            end,
            negated,
        }))
    }

    pub fn between(mut self, start: impl ToSqlValue, end: impl ToSqlValue) -> P {
        let (start, end) = (self.bind(start), self.bind(end));
        self.range(start, end, false)
    }

    pub fn not_between(mut self, start: impl ToSqlValue, end: impl ToSqlValue) -> P {
        let (start, end) = (self.bind(start), self.bind(end));
        self.range(start, end, true)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in the bounds.
    pub fn between_expression(mut self, start: &str, end: &str) -> Result<P> {
        let start = self.parse(start)?;
        let end = self.parse(end)?;
        Ok(self.range(start, end, false))
    }

    fn pattern(mut self, pattern: &str, escape: Option<char>, case_sensitive: bool, negated: bool) -> P {
        let expression = self.left.clone();
        let pattern = self.bind(pattern);
        self.finish(Predicate::Like(LikePredicate {
            expression,
            pattern,
            escape,
            case_sensitive,
            negated,
        }))
    }

    pub fn like(self, pattern: &str) -> P {
        self.pattern(pattern, None, true, false)
    }

    pub fn not_like(self, pattern: &str) -> P {
        self.pattern(pattern, None, true, true)
    }

    /// Compares both sides in upper case.
    pub fn like_case_insensitive(self, pattern: &str) -> P {
        self.pattern(pattern, None, false, false)
    }

    pub fn like_escaped(self, pattern: &str, escape: char) -> P {
        self.pattern(pattern, Some(escape), true, false)
    }

    pub fn is_null(self) -> P {
        let left = self.left.clone();
        self.finish(Predicate::is_null(left))
    }

    pub fn is_not_null(self) -> P {
        let left = self.left.clone();
        self.finish(Predicate::is_not_null(left))
    }

    fn collection_path(&mut self, path: &PathExpression) -> Result<()> {
        let collection = self.parent.resolve(path).and_then(|info| {
            if info.collection {
                Ok(())
            } else {
                Err(CriteriaError::path(path.to_string(), "is not a collection"))
            }
        });
        if collection.is_err() {
            self.parent.context_mut().close(self.id);
        }
        collection
    }

    fn emptiness(mut self, negated: bool) -> Result<P> {
        let Some(collection) = self.left.as_path().cloned() else {
            self.parent.context_mut().close(self.id);
            return Err(CriteriaError::illegal_argument(format!(
                "IS EMPTY needs a collection path, not {}",
                self.left
            )));
        };
        self.collection_path(&collection)?;
        Ok(self.finish(Predicate::IsEmpty(IsEmptyPredicate {
            collection,
            negated,
        })))
    }

    /// # Errors
    ///
    /// When the left side is not a collection path.
    pub fn is_empty(self) -> Result<P> {
        self.emptiness(false)
    }

    /// # Errors
    ///
    /// When the left side is not a collection path.
    pub fn is_not_empty(self) -> Result<P> {
        self.emptiness(true)
    }

    /// # Errors
    ///
    /// When `collection` is not a collection path.
    pub fn is_member_of(mut self, collection: &str) -> Result<P> {
        let parsed = self.parent.parse_path(collection);
        let collection = match parsed {
            Ok((path, _)) => path,
            Err(error) => {
                self.parent.context_mut().close(self.id);
                return Err(error);
            }
        };
        self.collection_path(&collection)?;
        let element = self.left.clone();
        Ok(self.finish(Predicate::MemberOf(MemberOfPredicate {
            element,
            collection,
            negated: false,
        })))
    }

    fn membership(self, right: Vec<Expression>, negated: bool) -> P {
        let left = self.left.clone();
        let predicate = if right.is_empty() {
            // IN over no values matches nothing
            if negated {
                Predicate::never().negated()
            } else {
                Predicate::never()
            }
        } else {
            Predicate::In(InPredicate {
                left,
                right,
                negated,
            })
        };
        self.finish(predicate)
    }

    pub fn in_values<V: ToSqlValue>(mut self, values: impl IntoIterator<Item = V>) -> P {
        let right = values.into_iter().map(|value| self.bind(value)).collect();
        self.membership(right, false)
    }

    pub fn not_in_values<V: ToSqlValue>(mut self, values: impl IntoIterator<Item = V>) -> P {
        let right = values.into_iter().map(|value| self.bind(value)).collect();
        self.membership(right, true)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths in an element.
    pub fn in_expressions(mut self, elements: &[&str]) -> Result<P> {
        let mut right = Vec::with_capacity(elements.len());
        for element in elements {
            right.push(self.parse(element)?);
        }
        Ok(self.membership(right, false))
    }

    fn compare_subquery(
        mut self,
        operator: ComparisonOperator,
        quantifier: PredicateQuantifier,
    ) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.parent.context_mut().close(self.id);
        let comparison = ComparisonPredicate {
            left: self.left,
            operator,
            right: Expression::Tuple(Vec::new()),
            quantifier,
            negated: false,
        };
        SubqueryBuilder::new(PredicateSubquery::comparison(
            self.parent,
            self.clause,
            comparison,
        ))
    }

    pub fn eq_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::Eq, quantifier)
    }

    pub fn not_eq_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::NotEq, quantifier)
    }

    pub fn lt_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::Lt, quantifier)
    }

    pub fn le_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::Le, quantifier)
    }

    pub fn gt_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::Gt, quantifier)
    }

    pub fn ge_subquery(self, quantifier: PredicateQuantifier) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.compare_subquery(ComparisonOperator::Ge, quantifier)
    }

    fn membership_subquery(mut self, negated: bool) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.parent.context_mut().close(self.id);
        let membership = InPredicate {
            left: self.left,
            right: Vec::new(),
            negated,
        };
        SubqueryBuilder::new(PredicateSubquery::membership(
            self.parent,
            self.clause,
            membership,
        ))
    }

    pub fn in_subquery(self) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.membership_subquery(false)
    }

    pub fn not_in_subquery(self) -> SubqueryBuilder<PredicateSubquery<P>> {
        self.membership_subquery(true)
    }
}
