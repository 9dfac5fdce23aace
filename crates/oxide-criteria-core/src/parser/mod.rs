//! Expression parser.
//!
//! A hand-written recursive descent parser with Pratt expression parsing for
//! the JPQL-like expression language used by the criteria builders.

mod error;
mod factory;
mod parser;
mod pratt;

pub use error::{ParseError, ParseErrorKind};
pub use factory::{ExpressionFactory, PathResolver};
pub use parser::{Parser, into_predicate};
