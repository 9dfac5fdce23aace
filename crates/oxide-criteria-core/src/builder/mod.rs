//! Fluent criteria builders.
//!
//! A [`CriteriaBuilder`] is created by a [`CriteriaBuilderFactory`] and
//! assembles a query through chained calls. Clauses that need more than one
//! call (a restriction, an OR group, a subquery, a CASE expression) open a
//! sub-builder that borrows its parent and hands control back from its
//! terminal method:
//!
//! ```rust
//! use std::sync::Arc;
//! use oxide_criteria_core::builder::{CriteriaBuilderFactory, QueryBuilder};
//! use oxide_criteria_core::ast::ValueType;
//! use oxide_criteria_core::config::CriteriaConfig;
//! use oxide_criteria_core::metamodel::{AttributeMetadata, EntityMetadata, StaticMetamodel};
//!
//! let metamodel = StaticMetamodel::new().with_entity(
//!     EntityMetadata::new("Cat", "cat")
//!         .attribute(AttributeMetadata::basic("name", ValueType::String))
//!         .attribute(AttributeMetadata::basic("age", ValueType::Integer)),
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
//! cb.where_or()
//!     .where_("c.name").unwrap().eq("Tom")
//!     .where_("c.name").unwrap().eq("Felix")
//!     .end();
//! cb.order_by_asc("c.id").unwrap();
//!
//! assert_eq!(
//!     cb.get_query_string().unwrap(),
//!     "SELECT c FROM Cat c WHERE c.age > :param_1 AND (c.name = :param_2 OR c.name = :param_3) ORDER BY c.id ASC NULLS LAST"
//! );
//! ```
//!
//! A sub-builder that is dropped without reaching its terminal method stays
//! registered as open, and the terminal operations of the top-level builder
//! fail with [`crate::error::CriteriaError::BuilderChaining`].

mod case_when;
mod context;
mod criteria;
mod cte;
mod dml;
mod factory;
mod join;
mod junction;
mod paginated;
mod query;
mod restriction;
mod set_op;
mod subquery;
mod window;

pub use case_when::{
    AcceptsWhen, AwaitingThen, CaseWhenBuilder, CaseWhenTarget, Detached, HasWhen, NoWhen,
    SelectCase, WhereCase,
};
pub use context::{AliasScope, BuilderContext};
pub use criteria::CriteriaBuilder;
pub use cte::{CteBuilder, CteOwner};
pub use dml::{
    DeleteCriteriaBuilder, InsertCriteriaBuilder, ModificationBuilder, ModificationQuery,
    UpdateCriteriaBuilder,
};
pub use factory::CriteriaBuilderFactory;
pub use join::JoinOnBuilder;
pub use junction::{JunctionBuilder, WhereAndBuilder, WhereOrBuilder};
pub use paginated::{PagedList, PaginatedCriteriaBuilder};
pub use query::{QueryBuilder, QueryState};
pub use restriction::RestrictionBuilder;
pub use set_op::SetOperandBuilder;
pub use subquery::{
    LateralSubquery, LeftSubquery, PredicateSubquery, SelectSubquery, SubqueryBuilder,
    SubqueryTarget,
};
pub use window::WindowBuilder;

use context::ScopedResolver;

use crate::ast::{ClauseType, CteDefinition, Expression, PathExpression, Predicate};
use crate::error::Result;
use crate::metamodel::PathInfo;
use crate::parser::{ExpressionFactory, PathResolver};

/// A builder that nested builders reach the shared state through.
pub trait BuilderParent {
    fn context(&self) -> &BuilderContext;

    fn context_mut(&mut self) -> &mut BuilderContext;

    /// Pushes the alias scopes visible from this builder, outermost first.
    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>);

    /// Parses a scalar expression against the visible aliases.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn parse_expression(&self, text: &str) -> Result<Expression> {
        let mut scopes = Vec::new();
        self.scopes(&mut scopes);
        let nested = scopes.len() > 1;
        let resolver = ScopedResolver {
            metamodel: self.context().metamodel(),
            scopes,
        };
        ExpressionFactory::with_resolver(&resolver).create_simple_expression(text, nested)
    }

    /// Parses a predicate against the visible aliases.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn parse_predicate(&self, text: &str) -> Result<Predicate> {
        let mut scopes = Vec::new();
        self.scopes(&mut scopes);
        let resolver = ScopedResolver {
            metamodel: self.context().metamodel(),
            scopes,
        };
        ExpressionFactory::with_resolver(&resolver).create_boolean_expression(text, false)
    }

    /// Parses and resolves a dotted path.
    ///
    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    fn parse_path(&self, text: &str) -> Result<(PathExpression, PathInfo)> {
        let mut scopes = Vec::new();
        self.scopes(&mut scopes);
        let resolver = ScopedResolver {
            metamodel: self.context().metamodel(),
            scopes,
        };
        let path = ExpressionFactory::with_resolver(&resolver).create_path_expression(text)?;
        let info = resolver.resolve_path(&path)?;
        Ok((path, info))
    }

    /// Resolves a path that was already parsed.
    ///
    /// # Errors
    ///
    /// Unresolvable paths.
    fn resolve(&self, path: &PathExpression) -> Result<PathInfo> {
        let mut scopes = Vec::new();
        self.scopes(&mut scopes);
        ScopedResolver {
            metamodel: self.context().metamodel(),
            scopes,
        }
        .resolve_path(path)
    }
}

/// A builder that accepts finished restrictions.
pub trait RestrictionTarget: BuilderParent {
    /// Receives a predicate for `clause`.
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate);
}

impl<T: BuilderParent + ?Sized> BuilderParent for &mut T {
    fn context(&self) -> &BuilderContext {
        (**self).context()
    }

    fn context_mut(&mut self) -> &mut BuilderContext {
        (**self).context_mut()
    }

    fn scopes<'s>(&'s self, out: &mut Vec<&'s AliasScope>) {
        (**self).scopes(out);
    }
}

impl<T: RestrictionTarget + ?Sized> RestrictionTarget for &mut T {
    fn add_restriction(&mut self, clause: ClauseType, predicate: Predicate) {
        (**self).add_restriction(clause, predicate);
    }
}

impl<T: CteOwner + ?Sized> CteOwner for &mut T {
    fn add_cte(&mut self, cte: CteDefinition) {
        (**self).add_cte(cte);
    }
}
