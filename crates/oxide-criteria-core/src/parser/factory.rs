//! Expression factory: parses expression text and validates its paths.

use crate::ast::{
    CollectionOperator, Expression, OrderByExpression, PathExpression, Predicate, Visitor,
};
use crate::error::{CriteriaError, Result};
use crate::metamodel::PathInfo;

use super::parser::Parser;

/// Resolves paths against the aliases that are in scope.
///
/// Builders implement this so that paths in expression text are checked
/// against the metamodel when the text is parsed, not when it is rendered.
pub trait PathResolver {
    /// Resolves a path whose head is an alias, or an attribute of the single
    /// query root.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::PathResolution`] when the path is unknown.
    fn resolve_path(&self, path: &PathExpression) -> Result<PathInfo>;

    /// Resolves the path of an `OUTER(...)` reference.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::PathResolution`] when there is no enclosing
    /// query or the path is unknown there.
    fn resolve_outer_path(&self, path: &PathExpression) -> Result<PathInfo> {
        Err(CriteriaError::path(
            path.to_string(),
            "OUTER can only be used inside a subquery",
        ))
    }
}

/// Creates AST nodes from expression text.
///
/// Without a resolver the factory only checks syntax. Parsing is
/// deterministic: equal text always gives equal trees.
#[derive(Default)]
pub struct ExpressionFactory<'a> {
    resolver: Option<&'a dyn PathResolver>,
    subquery_names: Vec<String>,
}

impl<'a> ExpressionFactory<'a> {
    /// A factory that only checks syntax.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory that also resolves every path.
    #[must_use]
    pub fn with_resolver(resolver: &'a dyn PathResolver) -> Self {
        Self {
            resolver: Some(resolver),
            subquery_names: Vec::new(),
        }
    }

    /// Names that stand for builder-supplied subqueries when subqueries are
    /// allowed.
    #[must_use]
    pub fn with_subquery_names(mut self, names: Vec<String>) -> Self {
        self.subquery_names = names;
        self
    }

    /// Parses a scalar expression.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Syntax`] for malformed text and
    /// [`CriteriaError::PathResolution`] for unresolvable paths.
    pub fn create_simple_expression(&self, text: &str, allow_outer: bool) -> Result<Expression> {
        let expression = Parser::new(text)
            .allow_outer(allow_outer)
            .parse_expression_text()?;
        self.validate(|v| expression.accept(v))?;
        Ok(expression)
    }

    /// Parses a predicate.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Syntax`] for malformed text, including
    /// subquery placeholders when `allow_subqueries` is false, and
    /// [`CriteriaError::PathResolution`] for unresolvable paths.
    pub fn create_boolean_expression(&self, text: &str, allow_subqueries: bool) -> Result<Predicate> {
        let predicate = Parser::new(text)
            .allow_outer(true)
            .allow_subqueries(allow_subqueries, &self.subquery_names)
            .parse_predicate_text()?;
        self.validate(|v| predicate.accept(v))?;
        Ok(predicate)
    }

    /// Parses a dotted path.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Syntax`] when the text is not a path and
    /// [`CriteriaError::PathResolution`] when it cannot be resolved.
    pub fn create_path_expression(&self, text: &str) -> Result<PathExpression> {
        let path = Parser::new(text).parse_path_text()?;
        if let Some(resolver) = self.resolver {
            resolver.resolve_path(&path)?;
        }
        Ok(path)
    }

    /// Parses an ORDER BY list, filling in nullability from the metamodel.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Syntax`] or [`CriteriaError::PathResolution`].
    pub fn create_order_by_items(&self, text: &str) -> Result<Vec<OrderByExpression>> {
        let mut items = Parser::new(text).parse_order_by_text()?;
        for item in &mut items {
            self.validate(|v| item.expression.accept(v))?;
            if let (Some(resolver), Expression::Path(path)) = (self.resolver, &item.expression) {
                let info = resolver.resolve_path(path)?;
                item.nullable = info.nullable;
                item.unique = info.unique;
                item.result_type = info.value_type;
            }
        }
        Ok(items)
    }

    fn validate(&self, walk: impl FnOnce(&mut PathValidator<'_>)) -> Result<()> {
        let Some(resolver) = self.resolver else {
            return Ok(());
        };
        let mut validator = PathValidator {
            resolver,
            error: None,
        };
        walk(&mut validator);
        validator.error.map_or(Ok(()), Err)
    }
}

/// Resolves every path of a tree and keeps the first failure.
struct PathValidator<'a> {
    resolver: &'a dyn PathResolver,
    error: Option<CriteriaError>,
}

impl PathValidator<'_> {
    fn record(&mut self, result: Result<PathInfo>) -> Option<PathInfo> {
        match result {
            Ok(info) => Some(info),
            Err(error) => {
                self.error.get_or_insert(error);
                None
            }
        }
    }
}

impl Visitor for PathValidator<'_> {
    fn visit_path(&mut self, path: &PathExpression) {
        let info = self.record(self.resolver.resolve_path(path));
        if info.is_some_and(|info| info.collection) {
            self.record(Err(CriteriaError::path(
                path.to_string(),
                "a collection can only be used in SIZE, IS EMPTY, MEMBER OF or a join",
            )));
        }
    }

    fn visit_outer_path(&mut self, path: &PathExpression) {
        self.record(self.resolver.resolve_outer_path(path));
    }

    fn visit_collection_path(&mut self, operator: CollectionOperator, path: &PathExpression) {
        let info = self.record(self.resolver.resolve_path(path));
        if operator == CollectionOperator::Size && info.is_some_and(|info| !info.collection) {
            self.record(Err(CriteriaError::path(
                path.to_string(),
                "is not a collection",
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ValueType;

    /// Knows `c` as a Cat with `name`, `age` and `kittens`.
    struct Cats;

    impl PathResolver for Cats {
        fn resolve_path(&self, path: &PathExpression) -> Result<PathInfo> {
            let info = |value_type, collection| PathInfo {
                value_type,
                nullable: true,
                collection,
                unique: false,
            };
            match path.to_string().as_str() {
                "c" => Ok(info(ValueType::Entity(String::from("Cat")), false)),
                "c.name" => Ok(info(ValueType::String, false)),
                "c.age" => Ok(info(ValueType::Integer, false)),
                "c.kittens" => Ok(info(ValueType::Entity(String::from("Cat")), true)),
                other => Err(CriteriaError::path(other, "unknown")),
            }
        }
    }

    #[test]
    fn syntax_only_without_resolver() {
        let factory = ExpressionFactory::new();
        assert!(factory.create_simple_expression("x.y.z + 1", false).is_ok());
        let err = factory.create_simple_expression("x +", false).unwrap_err();
        assert!(matches!(err, CriteriaError::Syntax { .. }));
    }

    #[test]
    fn unknown_paths_are_rejected() {
        let factory = ExpressionFactory::with_resolver(&Cats);
        assert!(factory.create_boolean_expression("c.age > 1 AND c.name IS NULL", false).is_ok());
        let err = factory
            .create_boolean_expression("c.age > 1 AND c.color = 'red'", false)
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot resolve path 'c.color': unknown");
    }

    #[test]
    fn collections_only_where_allowed() {
        let factory = ExpressionFactory::with_resolver(&Cats);
        assert!(factory.create_simple_expression("SIZE(c.kittens)", false).is_ok());
        assert!(factory.create_boolean_expression("c.kittens IS EMPTY", false).is_ok());
        assert!(factory.create_simple_expression("c.kittens", false).is_err());
        assert!(factory.create_simple_expression("SIZE(c.name)", false).is_err());
    }

    #[test]
    fn subquery_flag_is_enforced() {
        let factory = ExpressionFactory::new().with_subquery_names(vec![String::from("sq")]);
        assert!(factory.create_boolean_expression("c.age > sq", true).is_ok());
        assert!(factory.create_boolean_expression("EXISTS sq", false).is_err());
    }

    #[test]
    fn parsing_is_deterministic() {
        let factory = ExpressionFactory::with_resolver(&Cats);
        let text = "CASE WHEN c.age > 2 THEN c.name ELSE 'kitten' END";
        assert_eq!(
            factory.create_simple_expression(text, false).unwrap(),
            factory.create_simple_expression(text, false).unwrap()
        );
    }
}
