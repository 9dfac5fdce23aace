//! Pratt expression parser for operator precedence.

use crate::ast::{ArithmeticOperator, ComparisonOperator};
use crate::lexer::{Keyword, TokenKind};

/// Returns the prefix binding power for a token.
///
/// Returns `None` if the token is not a prefix operator.
#[must_use]
pub const fn prefix_binding_power(kind: &TokenKind) -> Option<u8> {
    match kind {
        // Unary minus
        TokenKind::Minus => Some(13),
        // NOT binds looser than comparisons but tighter than AND
        TokenKind::Keyword(Keyword::Not) => Some(5),
        _ => None,
    }
}

/// Returns the infix binding power for a token.
///
/// Returns `(left_bp, right_bp)` where:
/// - Higher binding power = binds tighter
/// - Left associative: left_bp < right_bp
///
/// Returns `None` if the token is not an infix operator.
#[must_use]
pub const fn infix_binding_power(kind: &TokenKind) -> Option<(u8, u8)> {
    match kind {
        // Logical OR (lowest precedence)
        TokenKind::Keyword(Keyword::Or) => Some((1, 2)),

        // Logical AND
        TokenKind::Keyword(Keyword::And) => Some((3, 4)),

        // Comparison operators
        TokenKind::Eq
        | TokenKind::NotEq
        | TokenKind::Lt
        | TokenKind::LtEq
        | TokenKind::Gt
        | TokenKind::GtEq => Some((7, 8)),

        // IS, IN, BETWEEN, LIKE, MEMBER and their NOT forms
        TokenKind::Keyword(
            Keyword::Is
            | Keyword::In
            | Keyword::Between
            | Keyword::Like
            | Keyword::Member
            | Keyword::Not,
        ) => Some((7, 8)),

        // Additive
        TokenKind::Plus | TokenKind::Minus => Some((9, 10)),

        // Multiplicative
        TokenKind::Star | TokenKind::Slash => Some((11, 12)),

        _ => None,
    }
}

/// Converts a token to an arithmetic operator.
#[must_use]
pub const fn token_to_arithmetic_op(kind: &TokenKind) -> Option<ArithmeticOperator> {
    match kind {
        TokenKind::Plus => Some(ArithmeticOperator::Add),
        TokenKind::Minus => Some(ArithmeticOperator::Sub),
        TokenKind::Star => Some(ArithmeticOperator::Mul),
        TokenKind::Slash => Some(ArithmeticOperator::Div),
        _ => None,
    }
}

/// Converts a token to a comparison operator.
#[must_use]
pub const fn token_to_comparison_op(kind: &TokenKind) -> Option<ComparisonOperator> {
    match kind {
        TokenKind::Eq => Some(ComparisonOperator::Eq),
        TokenKind::NotEq => Some(ComparisonOperator::NotEq),
        TokenKind::Lt => Some(ComparisonOperator::Lt),
        TokenKind::LtEq => Some(ComparisonOperator::Le),
        TokenKind::Gt => Some(ComparisonOperator::Gt),
        TokenKind::GtEq => Some(ComparisonOperator::Ge),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        // Multiplication should bind tighter than addition
        let add_bp = infix_binding_power(&TokenKind::Plus).unwrap();
        let mul_bp = infix_binding_power(&TokenKind::Star).unwrap();
        assert!(mul_bp.0 > add_bp.0);

        // AND should bind tighter than OR
        let and_bp = infix_binding_power(&TokenKind::Keyword(Keyword::And)).unwrap();
        let or_bp = infix_binding_power(&TokenKind::Keyword(Keyword::Or)).unwrap();
        assert!(and_bp.0 > or_bp.0);

        // Comparison should bind tighter than logical operators
        let eq_bp = infix_binding_power(&TokenKind::Eq).unwrap();
        assert!(eq_bp.0 > and_bp.0);

        // NOT sits between AND and comparisons
        let not_bp = prefix_binding_power(&TokenKind::Keyword(Keyword::Not)).unwrap();
        assert!(not_bp > and_bp.1 && not_bp < eq_bp.0);
    }

    #[test]
    fn test_left_associativity() {
        let (left, right) = infix_binding_power(&TokenKind::Minus).unwrap();
        assert!(left < right);
    }

    #[test]
    fn test_token_conversions() {
        assert_eq!(
            token_to_arithmetic_op(&TokenKind::Slash),
            Some(ArithmeticOperator::Div)
        );
        assert_eq!(
            token_to_comparison_op(&TokenKind::LtEq),
            Some(ComparisonOperator::Le)
        );
        assert_eq!(token_to_comparison_op(&TokenKind::LeftParen), None);
    }
}
