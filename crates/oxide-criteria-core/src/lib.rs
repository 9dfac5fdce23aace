//! # oxide-criteria-core
//!
//! A criteria query builder that assembles queries over an entity model,
//! written in an object query language, and renders them to the SQL of a
//! concrete database.
//!
//! This crate provides:
//! - A lexer and Pratt parser for query language expressions
//! - Fluent builders for select, delete, update and insert statements
//! - Dialects that describe what each database supports and emulate the rest
//! - Keyset pagination that reads pages by their boundary rows instead of
//!   OFFSET
//!
//! ## Building and rendering
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_criteria_core::ast::ValueType;
//! use oxide_criteria_core::builder::{CriteriaBuilderFactory, QueryBuilder};
//! use oxide_criteria_core::config::CriteriaConfig;
//! use oxide_criteria_core::metamodel::{AttributeMetadata, EntityMetadata, StaticMetamodel};
//!
//! let metamodel = StaticMetamodel::new().with_entity(
//!     EntityMetadata::new("Cat", "cat").attribute(AttributeMetadata::basic("age", ValueType::Integer)),
//! );
//! let factory = CriteriaBuilderFactory::new(
//!     CriteriaConfig::for_dialect("postgresql"),
//!     Arc::new(metamodel),
//! )
//! .unwrap();
//!
//! let mut cb = factory.create();
//! cb.from("Cat", "c").unwrap();
//! cb.where_("c.age").unwrap().gt(3);
//!
//! let statement = cb.render().unwrap();
//! assert_eq!(statement.sql, "SELECT c.id FROM cat c WHERE c.age > $1");
//! ```
//!
//! ## SQL Injection Prevention
//!
//! Values given to builders are never spliced into the SQL text. They are
//! bound as parameters and returned alongside the statement in placeholder
//! order.

pub mod ast;
pub mod builder;
pub mod config;
pub mod dialect;
pub mod error;
pub mod execution;
pub mod keyset;
pub mod lexer;
pub mod metamodel;
pub mod parser;
pub mod render;
pub mod value;

pub use builder::{CriteriaBuilder, CriteriaBuilderFactory, PagedList, QueryBuilder};
pub use config::CriteriaConfig;
pub use dialect::{DbmsDialect, DialectRegistry};
pub use error::{CriteriaError, Result};
pub use execution::{Row, StatementExecutor};
pub use keyset::{Keyset, KeysetPage};
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::{ExpressionFactory, ParseError, Parser};
pub use render::{SqlRenderer, SqlStatement};
pub use value::{SqlValue, ToSqlValue};
