//! JPQL-like expression parser implementation.

use super::error::ParseError;
use super::pratt::{
    infix_binding_power, prefix_binding_power, token_to_arithmetic_op, token_to_comparison_op,
};
use crate::ast::{
    BetweenPredicate, BooleanPredicate, CaseWhenExpression, CollectionOperator,
    ComparisonPredicate, ExistsPredicate, Expression, FrameBound, FrameMode, FunctionExpression,
    InPredicate, IsEmptyPredicate, IsNullPredicate, LikePredicate, Literal, MemberOfPredicate,
    OrderByExpression, Parameter, PathExpression, Predicate, PredicateQuantifier,
    WhenClause, WindowDefinition, WindowExpression, WindowFrame, WindowReference,
};
use crate::lexer::{Keyword, Lexer, Span, Token, TokenKind};

const SUBQUERY_TEXT: &str =
    "subqueries cannot be written as text, create them with a subquery builder";

/// Converts a parsed expression into a predicate.
///
/// Boolean-valued expressions that are not predicates, such as a boolean
/// attribute, are wrapped.
#[must_use]
pub fn into_predicate(expression: Expression) -> Predicate {
    match expression {
        Expression::Predicate(predicate) => *predicate,
        other => Predicate::Boolean(BooleanPredicate {
            expression: other,
            negated: false,
        }),
    }
}

/// Expression parser.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
    /// Whether `OUTER(path)` is accepted.
    allow_outer: bool,
    /// Whether subquery placeholders are accepted.
    allow_subqueries: bool,
    /// Identifiers that stand for a subquery supplied by a builder.
    subquery_names: &'a [String],
}

impl<'a> Parser<'a> {
    /// Creates a new parser for the given input.
    #[must_use]
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::new(TokenKind::Eof, Span::new(0, 0)),
            allow_outer: false,
            allow_subqueries: false,
            subquery_names: &[],
        }
    }

    /// Accepts `OUTER(path)` references to an enclosing query.
    #[must_use]
    pub fn allow_outer(mut self, allow: bool) -> Self {
        self.allow_outer = allow;
        self
    }

    /// Accepts subquery placeholders: `EXISTS name`, `IN name`,
    /// `ANY name`, `ALL name` and the given bare names.
    #[must_use]
    pub fn allow_subqueries(mut self, allow: bool, names: &'a [String]) -> Self {
        self.allow_subqueries = allow;
        self.subquery_names = names;
        self
    }

    /// Parses the whole input as a scalar expression.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid expression.
    pub fn parse_expression_text(&mut self) -> Result<Expression, ParseError> {
        let expression = self.parse_expression(0)?;
        self.expect_eof()?;
        Ok(expression)
    }

    /// Parses the whole input as a predicate.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a valid expression.
    pub fn parse_predicate_text(&mut self) -> Result<Predicate, ParseError> {
        let expression = self.parse_expression(0)?;
        self.expect_eof()?;
        Ok(into_predicate(expression))
    }

    /// Parses the whole input as a dotted path.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if the input is not a path.
    pub fn parse_path_text(&mut self) -> Result<PathExpression, ParseError> {
        let path = self.parse_path()?;
        self.expect_eof()?;
        Ok(path)
    }

    /// Parses a comma separated ORDER BY list.
    ///
    /// # Errors
    ///
    /// Returns a `ParseError` if an item is malformed.
    pub fn parse_order_by_text(&mut self) -> Result<Vec<OrderByExpression>, ParseError> {
        let items = self.parse_order_by_list()?;
        self.expect_eof()?;
        Ok(items)
    }

    /// Parses an expression using Pratt parsing.
    fn parse_expression(&mut self, min_bp: u8) -> Result<Expression, ParseError> {
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((l_bp, r_bp)) = infix_binding_power(&self.current.kind) else {
                break;
            };
            if l_bp < min_bp {
                break;
            }

            lhs = match &self.current.kind {
                TokenKind::Keyword(Keyword::And) => {
                    self.advance();
                    let rhs = self.parse_expression(r_bp)?;
                    into_predicate(lhs).and(into_predicate(rhs)).into()
                }
                TokenKind::Keyword(Keyword::Or) => {
                    self.advance();
                    let rhs = self.parse_expression(r_bp)?;
                    into_predicate(lhs).or(into_predicate(rhs)).into()
                }
                TokenKind::Keyword(Keyword::Is) => self.parse_is(lhs)?.into(),
                TokenKind::Keyword(Keyword::Not) => {
                    self.advance();
                    self.parse_negatable_infix(lhs, r_bp)?.negated().into()
                }
                TokenKind::Keyword(_) => self.parse_negatable_infix(lhs, r_bp)?.into(),
                kind => {
                    if let Some(operator) = token_to_comparison_op(kind) {
                        self.advance();
                        self.parse_comparison(lhs, operator, r_bp)?.into()
                    } else if let Some(op) = token_to_arithmetic_op(kind) {
                        self.advance();
                        let rhs = self.parse_expression(r_bp)?;
                        Expression::arithmetic(op, lhs, rhs)
                    } else {
                        break;
                    }
                }
            };
        }

        Ok(lhs)
    }

    fn parse_comparison(
        &mut self,
        left: Expression,
        operator: crate::ast::ComparisonOperator,
        r_bp: u8,
    ) -> Result<Predicate, ParseError> {
        let quantifier = match self.current.as_keyword() {
            Some(Keyword::Any | Keyword::Some) => PredicateQuantifier::Any,
            Some(Keyword::All) => PredicateQuantifier::All,
            _ => PredicateQuantifier::One,
        };
        let right = if quantifier == PredicateQuantifier::One {
            self.parse_expression(r_bp)?
        } else {
            self.advance();
            self.parse_subquery_reference()?
        };
        Ok(Predicate::Comparison(ComparisonPredicate {
            left,
            operator,
            right,
            quantifier,
            negated: false,
        }))
    }

    /// Parses `IS [NOT] NULL` and `IS [NOT] EMPTY`.
    fn parse_is(&mut self, lhs: Expression) -> Result<Predicate, ParseError> {
        self.expect_keyword(Keyword::Is)?;
        let negated = self.consume_keyword(Keyword::Not);
        if self.consume_keyword(Keyword::Null) {
            return Ok(Predicate::IsNull(IsNullPredicate {
                expression: lhs,
                negated,
            }));
        }
        if self.check_keyword(Keyword::Empty) {
            let span = self.current.span;
            self.advance();
            let Expression::Path(collection) = lhs else {
                return Err(ParseError::new("IS EMPTY requires a collection path", span));
            };
            return Ok(Predicate::IsEmpty(IsEmptyPredicate {
                collection,
                negated,
            }));
        }
        Err(ParseError::unexpected(
            "NULL or EMPTY",
            self.current.kind.clone(),
            self.current.span,
        ))
    }

    /// Parses `IN`, `BETWEEN`, `LIKE` and `MEMBER OF`; a preceding `NOT` has
    /// already been consumed.
    fn parse_negatable_infix(&mut self, lhs: Expression, r_bp: u8) -> Result<Predicate, ParseError> {
        match self.current.as_keyword() {
            Some(Keyword::In) => {
                self.advance();
                let right = if self.check(&TokenKind::LeftParen) {
                    self.advance();
                    if self.check_keyword(Keyword::Select) {
                        return Err(ParseError::new(SUBQUERY_TEXT, self.current.span));
                    }
                    let list = self.parse_expression_list()?;
                    self.expect(&TokenKind::RightParen)?;
                    list
                } else if matches!(self.current.kind, TokenKind::NamedParameter(_)) {
                    vec![self.parse_primary()?]
                } else {
                    vec![self.parse_subquery_reference()?]
                };
                Ok(Predicate::In(InPredicate {
                    left: lhs,
                    right,
                    negated: false,
                }))
            }
            Some(Keyword::Between) => {
                self.advance();
                let start = self.parse_expression(r_bp)?;
                self.expect_keyword(Keyword::And)?;
                let end = self.parse_expression(r_bp)?;
                Ok(Predicate::Between(BetweenPredicate {
                    expression: lhs,
                    start,
                    end,
                    negated: false,
                }))
            }
            Some(Keyword::Like) => {
                self.advance();
                let pattern = self.parse_expression(r_bp)?;
                let escape = if self.consume_keyword(Keyword::Escape) {
                    Some(self.parse_escape_character()?)
                } else {
                    None
                };
                Ok(Predicate::Like(LikePredicate {
                    expression: lhs,
                    pattern,
                    escape,
                    case_sensitive: true,
                    negated: false,
                }))
            }
            Some(Keyword::Member) => {
                self.advance();
                self.consume_keyword(Keyword::Of);
                let collection = self.parse_path()?;
                Ok(Predicate::MemberOf(MemberOfPredicate {
                    element: lhs,
                    collection,
                    negated: false,
                }))
            }
            _ => Err(ParseError::unexpected(
                "IN, BETWEEN, LIKE or MEMBER",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    fn parse_escape_character(&mut self) -> Result<char, ParseError> {
        if let TokenKind::String(s) = &self.current.kind {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                self.advance();
                return Ok(c);
            }
        }
        Err(ParseError::unexpected(
            "single character string",
            self.current.kind.clone(),
            self.current.span,
        ))
    }

    /// Parses a prefix expression.
    fn parse_prefix(&mut self) -> Result<Expression, ParseError> {
        match &self.current.kind {
            TokenKind::Keyword(Keyword::Not) => {
                let bp = prefix_binding_power(&self.current.kind).unwrap_or(5);
                self.advance();
                let operand = self.parse_expression(bp)?;
                Ok(into_predicate(operand).negated().into())
            }
            TokenKind::Minus => {
                let bp = prefix_binding_power(&self.current.kind).unwrap_or(13);
                self.advance();
                let operand = self.parse_expression(bp)?;
                Ok(match operand {
                    Expression::Literal(Literal::Integer(n)) => {
                        Expression::Literal(Literal::Integer(-n))
                    }
                    Expression::Literal(Literal::Decimal(d)) => {
                        Expression::Literal(Literal::Decimal(-d))
                    }
                    other => Expression::Negation(Box::new(other)),
                })
            }
            TokenKind::Keyword(Keyword::Exists) => {
                self.advance();
                let subquery = self.parse_subquery_reference()?;
                Ok(Predicate::Exists(ExistsPredicate {
                    subquery,
                    negated: false,
                })
                .into())
            }
            _ => self.parse_primary(),
        }
    }

    /// Parses a primary expression.
    fn parse_primary(&mut self) -> Result<Expression, ParseError> {
        let token = self.current.clone();

        match token.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Ok(Expression::Literal(Literal::Integer(n)))
            }
            TokenKind::Decimal(d) => {
                self.advance();
                Ok(Expression::Literal(Literal::Decimal(d)))
            }
            TokenKind::String(s) => {
                self.advance();
                Ok(Expression::Literal(Literal::String(s)))
            }
            TokenKind::Keyword(keyword) => {
                let literal = match keyword {
                    Keyword::True => Literal::Boolean(true),
                    Keyword::False => Literal::Boolean(false),
                    Keyword::Null => Literal::Null,
                    Keyword::CurrentDate => Literal::CurrentDate,
                    Keyword::CurrentTime => Literal::CurrentTime,
                    Keyword::CurrentTimestamp => Literal::CurrentTimestamp,
                    Keyword::Case => return self.parse_case_expression(),
                    Keyword::Select => return Err(ParseError::new(SUBQUERY_TEXT, token.span)),
                    _ => {
                        return Err(ParseError::unexpected(
                            "expression",
                            TokenKind::Keyword(keyword),
                            token.span,
                        ));
                    }
                };
                self.advance();
                Ok(Expression::Literal(literal))
            }
            TokenKind::NamedParameter(name) => {
                self.advance();
                Ok(Expression::Parameter(Parameter::Named(name)))
            }
            TokenKind::PositionalParameter(position) => {
                self.advance();
                Ok(Expression::Parameter(Parameter::Positional(position)))
            }

            // Parenthesized expression or row value
            TokenKind::LeftParen => {
                self.advance();
                if self.check_keyword(Keyword::Select) {
                    return Err(ParseError::new(SUBQUERY_TEXT, self.current.span));
                }
                let first = self.parse_expression(0)?;
                if self.check(&TokenKind::Comma) {
                    let mut items = vec![first];
                    while self.check(&TokenKind::Comma) {
                        self.advance();
                        items.push(self.parse_expression(0)?);
                    }
                    self.expect(&TokenKind::RightParen)?;
                    return Ok(Expression::Tuple(items));
                }
                self.expect(&TokenKind::RightParen)?;
                Ok(first)
            }

            // Function call, subquery placeholder or path
            TokenKind::Identifier(name) => {
                self.advance();
                if self.check(&TokenKind::LeftParen) {
                    return self.parse_function_like(name, token.span);
                }
                if self.allow_subqueries
                    && !self.check(&TokenKind::Dot)
                    && self.subquery_names.contains(&name)
                {
                    return Ok(Expression::SubqueryRef(name));
                }
                let mut segments = vec![name];
                while self.check(&TokenKind::Dot) {
                    self.advance();
                    segments.push(self.expect_identifier()?);
                }
                Ok(Expression::Path(PathExpression { segments }))
            }

            TokenKind::Error(message) => Err(ParseError::new(message, token.span)),

            kind => Err(ParseError::unexpected("expression", kind, token.span)),
        }
    }

    /// Parses the parenthesized part of `OUTER`, `SIZE`, `INDEX`, `KEY`,
    /// `VALUE` or a regular function call.
    fn parse_function_like(&mut self, name: String, span: Span) -> Result<Expression, ParseError> {
        let collection = match name.to_ascii_uppercase().as_str() {
            "OUTER" => {
                if !self.allow_outer {
                    return Err(ParseError::new(
                        "OUTER is only allowed inside a subquery",
                        span,
                    ));
                }
                self.expect(&TokenKind::LeftParen)?;
                let path = self.parse_path()?;
                self.expect(&TokenKind::RightParen)?;
                return Ok(Expression::Outer(path));
            }
            "SIZE" => Some(CollectionOperator::Size),
            "INDEX" => Some(CollectionOperator::Index),
            "KEY" => Some(CollectionOperator::Key),
            "VALUE" => Some(CollectionOperator::Value),
            _ => None,
        };
        if let Some(op) = collection {
            self.expect(&TokenKind::LeftParen)?;
            let path = self.parse_path()?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(Expression::Collection { op, path });
        }
        self.parse_function_call(&name)
    }

    /// Parses a function call with optional FILTER and OVER clauses.
    fn parse_function_call(&mut self, name: &str) -> Result<Expression, ParseError> {
        self.expect(&TokenKind::LeftParen)?;

        let distinct = self.consume_keyword(Keyword::Distinct);

        let args = if self.check(&TokenKind::RightParen) {
            vec![]
        } else if self.check(&TokenKind::Star) {
            // COUNT(*)
            self.advance();
            vec![]
        } else {
            self.parse_expression_list()?
        };

        self.expect(&TokenKind::RightParen)?;

        let mut function = FunctionExpression::new(name, args);
        function.distinct = distinct;

        if self.consume_keyword(Keyword::Filter) {
            self.expect(&TokenKind::LeftParen)?;
            self.expect_keyword(Keyword::Where)?;
            let condition = self.parse_expression(0)?;
            self.expect(&TokenKind::RightParen)?;
            function.filter = Some(Box::new(into_predicate(condition)));
        }

        if !self.consume_keyword(Keyword::Over) {
            return Ok(Expression::Function(function));
        }

        let window = if let TokenKind::Identifier(window_name) = &self.current.kind {
            let window_name = window_name.clone();
            self.advance();
            WindowReference::Named(window_name)
        } else {
            self.expect(&TokenKind::LeftParen)?;
            let definition = self.parse_window_definition()?;
            self.expect(&TokenKind::RightParen)?;
            WindowReference::Inline(definition)
        };
        Ok(Expression::Window(Box::new(WindowExpression { function, window })))
    }

    /// Parses the inside of `OVER (...)`.
    fn parse_window_definition(&mut self) -> Result<WindowDefinition, ParseError> {
        let mut definition = WindowDefinition::default();

        if let TokenKind::Identifier(base) = &self.current.kind {
            if Self::frame_mode(&self.current).is_none() {
                definition.base = Some(base.clone());
                self.advance();
            }
        }

        if self.consume_keyword(Keyword::Partition) {
            self.expect_keyword(Keyword::By)?;
            definition.partition_by = self.parse_expression_list()?;
        }

        if self.consume_keyword(Keyword::Order) {
            self.expect_keyword(Keyword::By)?;
            definition.order_by = self.parse_order_by_list()?;
        }

        if let Some(mode) = Self::frame_mode(&self.current) {
            self.advance();
            let frame = if self.consume_keyword(Keyword::Between) {
                let start = self.parse_frame_bound()?;
                self.expect_keyword(Keyword::And)?;
                let end = self.parse_frame_bound()?;
                WindowFrame {
                    mode,
                    start,
                    end: Some(end),
                }
            } else {
                WindowFrame {
                    mode,
                    start: self.parse_frame_bound()?,
                    end: None,
                }
            };
            definition.frame = Some(frame);
        }

        Ok(definition)
    }

    fn frame_mode(token: &Token) -> Option<FrameMode> {
        if token.is_word("ROWS") {
            Some(FrameMode::Rows)
        } else if token.is_word("RANGE") {
            Some(FrameMode::Range)
        } else if token.is_word("GROUPS") {
            Some(FrameMode::Groups)
        } else {
            None
        }
    }

    fn parse_frame_bound(&mut self) -> Result<FrameBound, ParseError> {
        if self.current.is_word("UNBOUNDED") {
            self.advance();
            if self.consume_word("PRECEDING") {
                return Ok(FrameBound::UnboundedPreceding);
            }
            self.expect_word("FOLLOWING")?;
            return Ok(FrameBound::UnboundedFollowing);
        }
        if self.current.is_word("CURRENT") {
            self.advance();
            self.expect_word("ROW")?;
            return Ok(FrameBound::CurrentRow);
        }
        if let TokenKind::Integer(n) = self.current.kind {
            let span = self.current.span;
            let offset =
                u64::try_from(n).map_err(|_| ParseError::new("Frame offset is negative", span))?;
            self.advance();
            if self.consume_word("PRECEDING") {
                return Ok(FrameBound::Preceding(offset));
            }
            self.expect_word("FOLLOWING")?;
            return Ok(FrameBound::Following(offset));
        }
        Err(ParseError::unexpected(
            "frame bound",
            self.current.kind.clone(),
            self.current.span,
        ))
    }

    /// Parses `expr [ASC|DESC] [NULLS FIRST|LAST], ...`.
    ///
    /// Null precedence defaults to NULLS LAST.
    fn parse_order_by_list(&mut self) -> Result<Vec<OrderByExpression>, ParseError> {
        let mut items = vec![];
        loop {
            let expression = self.parse_expression(0)?;
            let ascending = if self.consume_keyword(Keyword::Desc) {
                false
            } else {
                self.consume_keyword(Keyword::Asc);
                true
            };
            let nulls_first = if self.consume_keyword(Keyword::Nulls) {
                if self.consume_word("FIRST") {
                    true
                } else {
                    self.expect_word("LAST")?;
                    false
                }
            } else {
                false
            };
            items.push(OrderByExpression::new(expression, ascending, nulls_first));

            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(items)
    }

    /// Parses a CASE expression.
    fn parse_case_expression(&mut self) -> Result<Expression, ParseError> {
        self.expect_keyword(Keyword::Case)?;

        // Simple CASE (CASE expr WHEN ...)
        let operand = if self.check_keyword(Keyword::When) {
            None
        } else {
            Some(Box::new(self.parse_expression(0)?))
        };

        let mut when_clauses = vec![];
        while self.consume_keyword(Keyword::When) {
            let condition = self.parse_expression(0)?;
            self.expect_keyword(Keyword::Then)?;
            let result = self.parse_expression(0)?;
            when_clauses.push(WhenClause { condition, result });
        }
        if when_clauses.is_empty() {
            return Err(ParseError::unexpected(
                "WHEN",
                self.current.kind.clone(),
                self.current.span,
            ));
        }

        let else_result = if self.consume_keyword(Keyword::Else) {
            Some(Box::new(self.parse_expression(0)?))
        } else {
            None
        };

        self.expect_keyword(Keyword::End)?;

        Ok(Expression::CaseWhen(CaseWhenExpression {
            operand,
            when_clauses,
            else_result,
        }))
    }

    /// Parses `name` or `(name)` standing for a builder-supplied subquery.
    fn parse_subquery_reference(&mut self) -> Result<Expression, ParseError> {
        if !self.allow_subqueries {
            return Err(ParseError::new(
                "subqueries are not allowed in this expression",
                self.current.span,
            ));
        }
        if self.check(&TokenKind::LeftParen) {
            self.advance();
            if self.check_keyword(Keyword::Select) {
                return Err(ParseError::new(SUBQUERY_TEXT, self.current.span));
            }
            let name = self.expect_identifier()?;
            self.expect(&TokenKind::RightParen)?;
            return Ok(Expression::SubqueryRef(name));
        }
        Ok(Expression::SubqueryRef(self.expect_identifier()?))
    }

    fn parse_path(&mut self) -> Result<PathExpression, ParseError> {
        let mut segments = vec![self.expect_identifier()?];
        while self.check(&TokenKind::Dot) {
            self.advance();
            segments.push(self.expect_identifier()?);
        }
        Ok(PathExpression { segments })
    }

    /// Parses a comma-separated list of expressions.
    fn parse_expression_list(&mut self) -> Result<Vec<Expression>, ParseError> {
        let mut exprs = vec![];
        loop {
            exprs.push(self.parse_expression(0)?);
            if !self.check(&TokenKind::Comma) {
                break;
            }
            self.advance();
        }
        Ok(exprs)
    }

    // --- Helper methods ---

    /// Advances to the next token.
    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    /// Checks if the current token matches the given kind.
    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Checks if the current token is the given keyword.
    fn check_keyword(&self, keyword: Keyword) -> bool {
        matches!(&self.current.kind, TokenKind::Keyword(kw) if *kw == keyword)
    }

    /// Consumes the keyword if it is the current token.
    fn consume_keyword(&mut self, keyword: Keyword) -> bool {
        let found = self.check_keyword(keyword);
        if found {
            self.advance();
        }
        found
    }

    /// Consumes an unreserved word such as `PRECEDING` if it is the current token.
    fn consume_word(&mut self, word: &str) -> bool {
        let found = self.current.is_word(word);
        if found {
            self.advance();
        }
        found
    }

    fn expect_word(&mut self, word: &str) -> Result<(), ParseError> {
        if self.consume_word(word) {
            Ok(())
        } else {
            Err(ParseError::unexpected(
                word,
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects the current token to be the given kind.
    fn expect(&mut self, kind: &TokenKind) -> Result<(), ParseError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(ParseError::unexpected(
                format!("{kind:?}"),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects the current token to be the given keyword.
    fn expect_keyword(&mut self, keyword: Keyword) -> Result<(), ParseError> {
        if self.consume_keyword(keyword) {
            Ok(())
        } else {
            Err(ParseError::unexpected(
                keyword.as_str(),
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }

    /// Expects and returns an identifier.
    fn expect_identifier(&mut self) -> Result<String, ParseError> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(ParseError::unexpected(
                "identifier",
                self.current.kind.clone(),
                self.current.span,
            )),
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.current.is_eof() {
            Ok(())
        } else {
            Err(ParseError::unexpected(
                "end of expression",
                self.current.kind.clone(),
                self.current.span,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ArithmeticOperator, BooleanOperator, ComparisonOperator};

    fn expr(text: &str) -> Expression {
        Parser::new(text).parse_expression_text().unwrap()
    }

    fn predicate(text: &str) -> Predicate {
        Parser::new(text).parse_predicate_text().unwrap()
    }

    #[test]
    fn test_expression_precedence() {
        // 1 + 2 * 3 should be parsed as 1 + (2 * 3)
        let Expression::Arithmetic { op, right, .. } = expr("1 + 2 * 3") else {
            panic!("Expected arithmetic expression");
        };
        assert_eq!(op, ArithmeticOperator::Add);
        assert!(matches!(
            right.as_ref(),
            Expression::Arithmetic {
                op: ArithmeticOperator::Mul,
                ..
            }
        ));
    }

    #[test]
    fn test_boolean_precedence() {
        let p = predicate("c.age > 30 OR c.age = 30 AND c.id > 5");
        let Predicate::Compound(or) = &p else {
            panic!("Expected compound predicate");
        };
        assert_eq!(or.operator, BooleanOperator::Or);
        assert_eq!(p.to_string(), "c.age > 30 OR (c.age = 30 AND c.id > 5)");
    }

    #[test]
    fn test_not_is_a_flag() {
        let p = predicate("NOT c.name LIKE 'A%' ESCAPE '!'");
        let Predicate::Like(like) = &p else {
            panic!("Expected LIKE predicate");
        };
        assert!(like.negated);
        assert_eq!(like.escape, Some('!'));

        let p = predicate("c.age NOT BETWEEN 1 AND 5 AND c.name IS NOT NULL");
        assert_eq!(p.to_string(), "c.age NOT BETWEEN 1 AND 5 AND c.name IS NOT NULL");
    }

    #[test]
    fn test_parameters() {
        let p = predicate("c.age = :age AND c.name = ?1");
        assert_eq!(p.to_string(), "c.age = :age AND c.name = ?1");
    }

    #[test]
    fn test_collection_operators() {
        assert_eq!(
            expr("SIZE(c.kittens) + INDEX(k)").to_string(),
            "SIZE(c.kittens) + INDEX(k)"
        );
        let p = predicate("c.kittens IS NOT EMPTY AND :cat MEMBER OF c.kittens");
        assert_eq!(p.to_string(), "c.kittens IS NOT EMPTY AND :cat MEMBER OF c.kittens");
    }

    #[test]
    fn test_case_expression() {
        let e = expr("CASE WHEN c.age < 2 THEN 'kitten' ELSE 'cat' END");
        assert!(matches!(e, Expression::CaseWhen(ref case) if case.operand.is_none()));
        let e = expr("CASE c.age WHEN 1 THEN 'one' END");
        assert!(matches!(e, Expression::CaseWhen(ref case) if case.operand.is_some()));
    }

    #[test]
    fn test_window_function() {
        let e = expr(
            "SUM(c.age) FILTER (WHERE c.age > 1) OVER (PARTITION BY c.owner ORDER BY c.id DESC NULLS FIRST ROWS BETWEEN UNBOUNDED PRECEDING AND CURRENT ROW)",
        );
        let Expression::Window(window) = &e else {
            panic!("Expected window expression");
        };
        assert!(window.function.filter.is_some());
        let WindowReference::Inline(definition) = &window.window else {
            panic!("Expected inline window");
        };
        assert!(!definition.order_by[0].ascending);
        assert!(definition.order_by[0].nulls_first);
        assert_eq!(
            definition.frame.map(|f| f.start),
            Some(FrameBound::UnboundedPreceding)
        );
        assert!(matches!(
            expr("RANK() OVER w"),
            Expression::Window(ref w) if w.window == WindowReference::Named(String::from("w"))
        ));
    }

    #[test]
    fn test_count_star() {
        let Expression::Function(count) = expr("count(*)") else {
            panic!("Expected function");
        };
        assert_eq!(count.name, "COUNT");
        assert!(count.args.is_empty());
    }

    #[test]
    fn test_subquery_placeholders() {
        let names = [String::from("maxAge")];
        let p = Parser::new("c.age < ALL ages AND EXISTS (kittens) AND c.age = maxAge")
            .allow_subqueries(true, &names)
            .parse_predicate_text()
            .unwrap();
        let Predicate::Compound(and) = &p else {
            panic!("Expected compound predicate");
        };
        let Predicate::Comparison(all) = &and.children[0] else {
            panic!("Expected comparison");
        };
        assert_eq!(all.quantifier, PredicateQuantifier::All);
        assert_eq!(all.operator, ComparisonOperator::Lt);
        assert!(matches!(&and.children[2], Predicate::Comparison(c)
            if c.right == Expression::SubqueryRef(String::from("maxAge"))));
    }

    #[test]
    fn test_subqueries_rejected_without_flag() {
        assert!(Parser::new("EXISTS kittens").parse_predicate_text().is_err());
        let err = Parser::new("c.age IN (SELECT k.age FROM Cat k)")
            .allow_subqueries(true, &[])
            .parse_predicate_text()
            .unwrap_err();
        assert!(err.message.contains("subquery builder"));
    }

    #[test]
    fn test_outer_requires_flag() {
        assert!(Parser::new("OUTER(c.age)").parse_expression_text().is_err());
        let e = Parser::new("OUTER(c.age)")
            .allow_outer(true)
            .parse_expression_text()
            .unwrap();
        assert_eq!(e, Expression::Outer(PathExpression::parse_simple("c.age")));
    }

    #[test]
    fn test_trailing_tokens_are_rejected() {
        let err = Parser::new("c.age c.name").parse_expression_text().unwrap_err();
        assert_eq!(err.span, Span::new(6, 7));
        assert!(Parser::new("c.age +").parse_expression_text().is_err());
        assert!(Parser::new("'open").parse_expression_text().is_err());
    }

    #[test]
    fn test_deterministic() {
        let text = "COALESCE(c.name, 'x') IN ('a', 'b') OR -c.age * 2 >= 10";
        assert_eq!(predicate(text), predicate(text));
    }

    #[test]
    fn test_row_value() {
        assert_eq!(expr("(c.age, c.id)").to_string(), "(c.age, c.id)");
        assert_eq!(expr("-3"), Expression::Literal(Literal::Integer(-3)));
    }
}
