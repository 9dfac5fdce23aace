//! Expression lexer.
//!
//! A hand-written lexer for the JPQL-like expression language accepted by the
//! builders. It produces a stream of tokens with source spans.

mod span;
mod token;
mod tokenizer;

pub use span::Span;
pub use token::{Keyword, Token, TokenKind};
pub use tokenizer::Lexer;
