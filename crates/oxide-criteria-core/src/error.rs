//! Error types for query building, rendering and pagination.

use thiserror::Error;

use crate::ast::ClauseType;
use crate::lexer::Span;
use crate::parser::ParseError;

/// Errors raised while building, rendering or paginating a query.
#[derive(Debug, Error)]
pub enum CriteriaError {
    /// The expression text does not match the grammar.
    #[error("syntax error: {message} at position {}..{}", span.start, span.end)]
    Syntax {
        /// Description of the problem.
        message: String,
        /// Location in the expression text.
        span: Span,
    },

    /// A path could not be resolved against the entity metamodel.
    #[error("cannot resolve path '{path}': {reason}")]
    PathResolution {
        /// The offending path as written.
        path: String,
        /// Why resolution failed.
        reason: String,
    },

    /// A terminal operation was invoked while sub-builders were still open.
    #[error("a builder was not ended properly, still open: {}", open.join(" > "))]
    BuilderChaining {
        /// Names of the open builders, outermost first.
        open: Vec<&'static str>,
    },

    /// The dialect neither supports nor can emulate a construct.
    #[error("{feature} is not supported by the {dialect} dialect")]
    UnsupportedCapability {
        /// The construct that was required.
        feature: String,
        /// Name of the active dialect.
        dialect: &'static str,
    },

    /// A keyset does not line up with the ORDER BY list.
    #[error("keyset has {found} values but the query orders by {expected} expressions")]
    KeysetArityMismatch {
        /// Number of ORDER BY items.
        expected: usize,
        /// Number of keyset values.
        found: usize,
    },

    /// An argument is invalid in the current state.
    #[error("{0}")]
    IllegalArgument(String),

    /// A construct is used in a clause that does not allow it.
    #[error("{construct} is not allowed in the {clause} clause")]
    InvalidClause {
        /// The clause the expression was attached to.
        clause: ClauseType,
        /// The construct that is not allowed there.
        construct: String,
    },

    /// Invalid configuration property or unknown dialect.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Failure reported by a statement executor.
    #[error("statement execution failed: {0}")]
    Execution(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CriteriaError {
    /// Creates an [`CriteriaError::IllegalArgument`] error.
    #[must_use]
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::IllegalArgument(message.into())
    }

    /// Creates an [`CriteriaError::UnsupportedCapability`] error.
    #[must_use]
    pub fn unsupported(feature: impl Into<String>, dialect: &'static str) -> Self {
        Self::UnsupportedCapability {
            feature: feature.into(),
            dialect,
        }
    }

    /// Creates a [`CriteriaError::PathResolution`] error.
    #[must_use]
    pub fn path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::PathResolution {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Wraps an executor failure.
    pub fn execution(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Execution(Box::new(error))
    }
}

impl From<ParseError> for CriteriaError {
    fn from(error: ParseError) -> Self {
        Self::Syntax {
            message: error.message,
            span: error.span,
        }
    }
}

/// Result type alias for criteria operations.
pub type Result<T> = std::result::Result<T, CriteriaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_chaining_lists_open_builders() {
        let err = CriteriaError::BuilderChaining {
            open: vec!["subquery", "case when"],
        };
        assert_eq!(
            err.to_string(),
            "a builder was not ended properly, still open: subquery > case when"
        );
    }

    #[test]
    fn unsupported_names_feature_and_dialect() {
        let err = CriteriaError::unsupported("WITH clause", "mysql");
        assert_eq!(
            err.to_string(),
            "WITH clause is not supported by the mysql dialect"
        );
    }

    #[test]
    fn parse_error_becomes_syntax_error() {
        let err: CriteriaError = ParseError::new("boom", Span::new(2, 4)).into();
        assert!(matches!(err, CriteriaError::Syntax { .. }));
        assert_eq!(err.to_string(), "syntax error: boom at position 2..4");
    }
}
