//! CASE expressions built with the typestate pattern.
//!
//! `then` is only available right after `when`, and `end`/`otherwise` only
//! after at least one complete branch, so a malformed CASE does not compile:
//!
//! ```rust
//! use oxide_criteria_core::builder::CaseWhenBuilder;
//!
//! let case = CaseWhenBuilder::new()
//!     .when("age < 2").unwrap()
//!     .then("'kitten'").unwrap()
//!     .otherwise("'cat'")
//!     .unwrap();
//! assert_eq!(case.to_string(), "CASE WHEN age < 2 THEN 'kitten' ELSE 'cat' END");
//! ```

use std::marker::PhantomData;

use super::restriction::RestrictionBuilder;
use super::{QueryBuilder, RestrictionTarget};
use crate::ast::{CaseWhenExpression, ClauseType, Expression, Predicate, SelectItem, WhenClause};
use crate::error::Result;
use crate::parser::ExpressionFactory;
use crate::value::ToSqlValue;

/// Marker: no branch yet.
pub struct NoWhen;
/// Marker: a condition waits for its result.
pub struct AwaitingThen;
/// Marker: at least one complete branch.
pub struct HasWhen;

/// States in which another `when` may follow.
pub trait AcceptsWhen {}
impl AcceptsWhen for NoWhen {}
impl AcceptsWhen for HasWhen {}

/// Receives the finished CASE expression.
pub trait CaseWhenTarget {
    type Output;

    /// Parses a scalar expression in the target's scope.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn parse_expression(&self, text: &str) -> Result<Expression>;

    /// Parses a predicate in the target's scope.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn parse_predicate(&self, text: &str) -> Result<Predicate>;

    /// Turns a value into an expression the target can render.
    fn bind(&mut self, value: impl ToSqlValue) -> Expression;

    /// Called once the expression is complete.
    ///
    /// # Errors
    ///
    /// When the target rejects the expression.
    fn finish(self, expression: Expression) -> Result<Self::Output>;

    /// Called when a step fails, before the error is returned.
    fn abandon(&mut self) {}
}

/// A CASE expression that is not attached to a query.
///
/// Paths are only checked for syntax and values are inlined as bound values.
#[derive(Debug, Default)]
pub struct Detached;

impl CaseWhenTarget for Detached {
    type Output = Expression;

    fn parse_expression(&self, text: &str) -> Result<Expression> {
        ExpressionFactory::new().create_simple_expression(text, false)
    }

    fn parse_predicate(&self, text: &str) -> Result<Predicate> {
        ExpressionFactory::new().create_boolean_expression(text, false)
    }

    fn bind(&mut self, value: impl ToSqlValue) -> Expression {
        Expression::value(value)
    }

    fn finish(self, expression: Expression) -> Result<Expression> {
        Ok(expression)
    }
}

/// A CASE expression that becomes the left side of a restriction.
pub struct WhereCase<P: RestrictionTarget> {
    parent: P,
    clause: ClauseType,
    id: usize,
}

impl<P: RestrictionTarget> WhereCase<P> {
    pub(crate) fn new(mut parent: P, clause: ClauseType) -> Self {
        let id = parent.context_mut().open("CaseWhenBuilder");
        Self { parent, clause, id }
    }
}

impl<P: RestrictionTarget> CaseWhenTarget for WhereCase<P> {
    type Output = RestrictionBuilder<P>;

    fn parse_expression(&self, text: &str) -> Result<Expression> {
        self.parent.parse_expression(text)
    }

    fn parse_predicate(&self, text: &str) -> Result<Predicate> {
        self.parent.parse_predicate(text)
    }

    fn bind(&mut self, value: impl ToSqlValue) -> Expression {
        Expression::Parameter(self.parent.context_mut().bind_generated(value))
    }

    fn finish(mut self, expression: Expression) -> Result<RestrictionBuilder<P>> {
        self.parent.context_mut().close(self.id);
        Ok(RestrictionBuilder::new(self.parent, expression, self.clause))
    }

    fn abandon(&mut self) {
        self.parent.context_mut().close(self.id);
    }
}

/// A CASE expression added to the select list.
pub struct SelectCase<P: QueryBuilder> {
    parent: P,
    alias: Option<String>,
    id: usize,
}

impl<P: QueryBuilder> SelectCase<P> {
    pub(crate) fn new(mut parent: P, alias: Option<&str>) -> Self {
        let id = parent.context_mut().open("CaseWhenBuilder");
        Self {
            parent,
            alias: alias.map(String::from),
            id,
        }
    }
}

impl<P: QueryBuilder> CaseWhenTarget for SelectCase<P> {
    type Output = P;

    fn parse_expression(&self, text: &str) -> Result<Expression> {
        self.parent.parse_expression(text)
    }

    fn parse_predicate(&self, text: &str) -> Result<Predicate> {
        self.parent.parse_predicate(text)
    }

    fn bind(&mut self, value: impl ToSqlValue) -> Expression {
        Expression::Parameter(self.parent.context_mut().bind_generated(value))
    }

    fn finish(mut self, expression: Expression) -> Result<P> {
        self.parent.context_mut().close(self.id);
        self.parent.query_state_mut().spec.select.push(SelectItem {
            expression,
            alias: self.alias,
        });
        Ok(self.parent)
    }

    fn abandon(&mut self) {
        self.parent.context_mut().close(self.id);
    }
}

/// Builds a searched `CASE WHEN p THEN r ... END` or, when started with an
/// operand, a simple `CASE x WHEN v THEN r ... END`.
#[must_use = "a CASE expression is only used once it is ended"]
pub struct CaseWhenBuilder<T: CaseWhenTarget, S> {
    target: T,
    case: CaseWhenExpression,
    condition: Option<Expression>,
    _state: PhantomData<S>,
}

impl CaseWhenBuilder<Detached, NoWhen> {
    /// Starts a detached searched CASE.
    pub fn new() -> Self {
        Self::attached(Detached)
    }

    /// Starts a detached simple CASE over `operand`.
    pub fn simple(operand: Expression) -> Self {
        let mut builder = Self::attached(Detached);
        builder.case.operand = Some(Box::new(operand));
        builder
    }
}

impl Default for CaseWhenBuilder<Detached, NoWhen> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: CaseWhenTarget, S> CaseWhenBuilder<T, S> {
    fn transition<N>(self) -> CaseWhenBuilder<T, N> {
        CaseWhenBuilder {
            target: self.target,
            case: self.case,
            condition: self.condition,
            _state: PhantomData,
        }
    }

    fn checked<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() {
            self.target.abandon();
        }
        result
    }
}

impl<T: CaseWhenTarget> CaseWhenBuilder<T, NoWhen> {
    pub(crate) fn attached(target: T) -> Self {
        Self {
            target,
            case: CaseWhenExpression {
                operand: None,
                when_clauses: Vec::new(),
                else_result: None,
            },
            condition: None,
            _state: PhantomData,
        }
    }
}

impl<T: CaseWhenTarget, S: AcceptsWhen> CaseWhenBuilder<T, S> {
    /// Adds a condition, or a comparand for a simple CASE.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn when(mut self, text: &str) -> Result<CaseWhenBuilder<T, AwaitingThen>> {
        let condition = if self.case.operand.is_some() {
            self.target.parse_expression(text)
        } else {
            self.target.parse_predicate(text).map(Expression::from)
        };
        self.condition = Some(self.checked(condition)?);
        Ok(self.transition())
    }

    /// Adds a condition built elsewhere.
    pub fn when_predicate(mut self, predicate: Predicate) -> CaseWhenBuilder<T, AwaitingThen> {
        self.condition = Some(Expression::from(predicate));
        self.transition()
    }
}

impl<T: CaseWhenTarget> CaseWhenBuilder<T, AwaitingThen> {
    fn branch(mut self, result: Expression) -> CaseWhenBuilder<T, HasWhen> {
        if let Some(condition) = self.condition.take() {
            self.case.when_clauses.push(WhenClause { condition, result });
        }
        self.transition()
    }

    /// Sets the result of the pending condition.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn then(mut self, text: &str) -> Result<CaseWhenBuilder<T, HasWhen>> {
        let parsed = self.target.parse_expression(text);
        let result = self.checked(parsed)?;
        Ok(self.branch(result))
    }

    /// Sets a bound value as the result of the pending condition.
    pub fn then_value(mut self, value: impl ToSqlValue) -> CaseWhenBuilder<T, HasWhen> {
        let result = self.target.bind(value);
        self.branch(result)
    }
}

impl<T: CaseWhenTarget> CaseWhenBuilder<T, HasWhen> {
    /// Ends the expression with an ELSE result.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn otherwise(mut self, text: &str) -> Result<T::Output> {
        let parsed = self.target.parse_expression(text);
        let result = self.checked(parsed)?;
        self.case.else_result = Some(Box::new(result));
        self.end()
    }

    /// Ends the expression with a bound ELSE value.
    ///
    /// # Errors
    ///
    /// When the target rejects the expression.
    pub fn otherwise_value(mut self, value: impl ToSqlValue) -> Result<T::Output> {
        let result = self.target.bind(value);
        self.case.else_result = Some(Box::new(result));
        self.end()
    }

    /// Ends the expression without ELSE, which yields NULL when no branch
    /// matches.
    ///
    /// # Errors
    ///
    /// When the target rejects the expression.
    pub fn end(self) -> Result<T::Output> {
        self.target.finish(Expression::CaseWhen(self.case))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::SqlValue;

    #[test]
    fn searched_case() {
        let case = CaseWhenBuilder::new()
            .when("age < 2")
            .unwrap()
            .then("'kitten'")
            .unwrap()
            .when("age > 15")
            .unwrap()
            .then_value("senior")
            .end()
            .unwrap();
        let Expression::CaseWhen(case) = case else {
            panic!("expected a CASE expression");
        };
        assert!(case.operand.is_none());
        assert_eq!(case.when_clauses.len(), 2);
        assert_eq!(
            case.when_clauses[1].result,
            Expression::Value(SqlValue::Text(String::from("senior")))
        );
        assert!(case.else_result.is_none());
    }

    #[test]
    fn simple_case_compares_operand() {
        let case = CaseWhenBuilder::simple(Expression::path("c.kind"))
            .when("1")
            .unwrap()
            .then("'one'")
            .unwrap()
            .otherwise("'many'")
            .unwrap();
        assert_eq!(
            case.to_string(),
            "CASE c.kind WHEN 1 THEN 'one' ELSE 'many' END"
        );
    }

    #[test]
    fn malformed_condition_is_rejected() {
        assert!(CaseWhenBuilder::new().when("age <").is_err());
    }
}
