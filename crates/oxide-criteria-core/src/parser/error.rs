//! Errors raised while parsing expression text.

use std::fmt;

use crate::lexer::{Span, TokenKind};

/// What went wrong.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// A token other than the one the grammar allows here.
    UnexpectedToken { expected: String, found: TokenKind },
    /// The text ended while more was expected.
    UnexpectedEnd { expected: String },
    /// The text is well formed but not accepted, e.g. subquery text.
    Rejected,
}

/// A parse error located in the expression text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub span: Span,
}

impl ParseError {
    #[must_use]
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::Rejected,
            message: message.into(),
            span,
        }
    }

    /// `found` where `expected` was required. Running into the end of the
    /// text is reported as [`ParseErrorKind::UnexpectedEnd`].
    #[must_use]
    pub fn unexpected(expected: impl Into<String>, found: TokenKind, span: Span) -> Self {
        let expected = expected.into();
        if found == TokenKind::Eof {
            return Self::unexpected_eof(expected, span);
        }
        Self {
            message: format!("expected {expected}, found {found:?}"),
            kind: ParseErrorKind::UnexpectedToken { expected, found },
            span,
        }
    }

    #[must_use]
    pub fn unexpected_eof(expected: impl Into<String>, span: Span) -> Self {
        let expected = expected.into();
        Self {
            message: format!("expected {expected} before the end of the expression"),
            kind: ParseErrorKind::UnexpectedEnd { expected },
            span,
        }
    }

    /// The expected construct, unless the text was rejected outright.
    #[must_use]
    pub fn expected(&self) -> Option<&str> {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, .. }
            | ParseErrorKind::UnexpectedEnd { expected } => Some(expected),
            ParseErrorKind::Rejected => None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}", self.message, self.span)
    }
}

impl std::error::Error for ParseError {}
