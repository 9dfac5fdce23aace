//! State shared by a builder and all of its sub-builders.

use std::fmt;
use std::sync::Arc;

use crate::ast::{CopyContext, Parameter, PathExpression, ValueType};
use crate::config::CriteriaConfig;
use crate::dialect::DbmsDialect;
use crate::error::{CriteriaError, Result};
use crate::metamodel::{EntityMetamodel, PathInfo};
use crate::parser::PathResolver;
use crate::render::ParameterBindings;
use crate::value::{SqlValue, ToSqlValue};

/// Tracks open sub-builders and parameter values of one top-level builder.
///
/// Every sub-builder registers itself when it is opened and deregisters when
/// it is ended. One that is dropped without being ended stays registered, and
/// the terminal operations refuse to run.
#[derive(Clone)]
pub struct BuilderContext {
    dialect: Arc<dyn DbmsDialect>,
    metamodel: Arc<dyn EntityMetamodel>,
    config: Arc<CriteriaConfig>,
    open: Vec<(usize, &'static str)>,
    next_id: usize,
    parameters: ParameterBindings,
    generated: usize,
    ctes: Vec<(String, Vec<String>)>,
}

impl fmt::Debug for BuilderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuilderContext")
            .field("dialect", &self.dialect.name())
            .field("open", &self.open_builders())
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl BuilderContext {
    pub(crate) fn new(
        dialect: Arc<dyn DbmsDialect>,
        metamodel: Arc<dyn EntityMetamodel>,
        config: Arc<CriteriaConfig>,
    ) -> Self {
        Self {
            dialect,
            metamodel,
            config,
            open: Vec::new(),
            next_id: 0,
            parameters: ParameterBindings::new(),
            generated: 0,
            ctes: Vec::new(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn DbmsDialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub fn metamodel(&self) -> &dyn EntityMetamodel {
        self.metamodel.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &CriteriaConfig {
        &self.config
    }

    pub(crate) fn open(&mut self, name: &'static str) -> usize {
        self.next_id += 1;
        self.open.push((self.next_id, name));
        self.next_id
    }

    pub(crate) fn close(&mut self, id: usize) {
        self.open.retain(|(open, _)| *open != id);
    }

    /// Names of the sub-builders that were opened and not ended, innermost
    /// last.
    #[must_use]
    pub fn open_builders(&self) -> Vec<&'static str> {
        self.open.iter().map(|(_, name)| *name).collect()
    }

    /// Fails when a sub-builder is still open.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::BuilderChaining`] listing the open builders.
    pub fn verify_builder_ended(&self) -> Result<()> {
        if self.open.is_empty() {
            Ok(())
        } else {
            Err(CriteriaError::BuilderChaining {
                open: self.open_builders(),
            })
        }
    }

    pub(crate) fn set_parameter(&mut self, parameter: Parameter, value: SqlValue) {
        self.parameters.insert(parameter, value);
    }

    /// Binds a value under a fresh name and returns the parameter.
    pub(crate) fn bind_generated(&mut self, value: impl ToSqlValue) -> Parameter {
        self.generated += 1;
        let parameter = Parameter::Named(format!(
            "{}{}",
            self.config.parameter_prefix, self.generated
        ));
        self.parameters
            .insert(parameter.clone(), value.to_sql_value());
        parameter
    }

    #[must_use]
    pub fn parameters(&self) -> &ParameterBindings {
        &self.parameters
    }

    /// Takes over the bindings of another builder. Its generated parameters
    /// get fresh names; the returned context renames them in copied nodes.
    pub(crate) fn adopt_parameters(&mut self, parameters: ParameterBindings) -> CopyContext {
        let mut copy = CopyContext::new();
        for (parameter, value) in parameters {
            match parameter {
                Parameter::Named(name) if name.starts_with(&self.config.parameter_prefix) => {
                    self.generated += 1;
                    let fresh = format!("{}{}", self.config.parameter_prefix, self.generated);
                    copy = copy.rename_parameter(&name, &fresh);
                    self.parameters.insert(Parameter::Named(fresh), value);
                }
                other => {
                    self.parameters.insert(other, value);
                }
            }
        }
        copy
    }

    pub(crate) fn take_parameters(&mut self) -> ParameterBindings {
        std::mem::take(&mut self.parameters)
    }

    pub(crate) fn declare_cte(&mut self, name: &str, columns: Vec<String>) -> Result<()> {
        if self.cte_columns(name).is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE '{name}' is declared more than once"
            )));
        }
        self.ctes.push((String::from(name), columns));
        Ok(())
    }

    /// Columns of a CTE declared on this builder.
    #[must_use]
    pub fn cte_columns(&self, name: &str) -> Option<&[String]> {
        self.ctes
            .iter()
            .find(|(cte, _)| cte == name)
            .map(|(_, columns)| columns.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AliasKind {
    Entity(String),
    Columns(Vec<String>),
}

/// Aliases declared by one query level of a builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AliasScope {
    aliases: Vec<(String, AliasKind)>,
    roots: usize,
    root: Option<String>,
}

impl AliasScope {
    fn declare(&mut self, alias: &str, kind: AliasKind) -> Result<()> {
        if self.aliases.iter().any(|(name, _)| name == alias) {
            return Err(CriteriaError::illegal_argument(format!(
                "alias '{alias}' is used more than once"
            )));
        }
        self.aliases.push((String::from(alias), kind));
        Ok(())
    }

    /// Declares a FROM item; a single FROM item is the implicit root of
    /// unqualified paths.
    pub(crate) fn declare_root(&mut self, alias: &str, entity: Option<&str>, columns: Vec<String>) -> Result<()> {
        let kind = match entity {
            Some(entity) => AliasKind::Entity(String::from(entity)),
            None => AliasKind::Columns(columns),
        };
        self.declare(alias, kind)?;
        self.roots += 1;
        self.root = (self.roots == 1).then(|| String::from(alias));
        Ok(())
    }

    pub(crate) fn declare_entity(&mut self, alias: &str, entity: &str) -> Result<()> {
        self.declare(alias, AliasKind::Entity(String::from(entity)))
    }

    pub(crate) fn declare_columns(&mut self, alias: &str, columns: Vec<String>) -> Result<()> {
        self.declare(alias, AliasKind::Columns(columns))
    }

    pub(crate) fn contains(&self, alias: &str) -> bool {
        self.aliases.iter().any(|(name, _)| name == alias)
    }

    /// The entity an alias ranges over.
    pub(crate) fn entity_of(&self, alias: &str) -> Option<&str> {
        self.aliases.iter().find_map(|(name, kind)| match kind {
            AliasKind::Entity(entity) if name == alias => Some(entity.as_str()),
            _ => None,
        })
    }

    fn resolve_alias(
        &self,
        metamodel: &dyn EntityMetamodel,
        alias: &str,
        attributes: &[String],
        text: &str,
    ) -> Option<Result<PathInfo>> {
        let (_, kind) = self.aliases.iter().find(|(name, _)| name == alias)?;
        Some(match kind {
            AliasKind::Entity(entity) => metamodel.resolve(entity, attributes),
            AliasKind::Columns(columns) => match attributes {
                [column] if columns.contains(column) => Ok(PathInfo {
                    value_type: ValueType::Unknown,
                    nullable: true,
                    collection: false,
                    unique: false,
                }),
                _ => Err(CriteriaError::path(
                    text,
                    format!("'{alias}' has no column '{}'", attributes.join(".")),
                )),
            },
        })
    }
}

/// Resolves paths against a stack of scopes, innermost last.
pub(crate) struct ScopedResolver<'s> {
    pub metamodel: &'s dyn EntityMetamodel,
    pub scopes: Vec<&'s AliasScope>,
}

impl ScopedResolver<'_> {
    fn resolve_in(&self, scopes: &[&AliasScope], path: &PathExpression) -> Result<PathInfo> {
        let text = path.to_string();
        for scope in scopes.iter().rev() {
            if let Some(info) = scope.resolve_alias(self.metamodel, path.head(), path.tail(), &text) {
                return info;
            }
        }
        let innermost = scopes
            .last()
            .ok_or_else(|| CriteriaError::path(&text, "no query is in scope"))?;
        let root = innermost.root.as_deref().ok_or_else(|| {
            CriteriaError::path(&text, format!("unknown alias '{}'", path.head()))
        })?;
        innermost
            .resolve_alias(self.metamodel, root, &path.segments, &text)
            .unwrap_or_else(|| Err(CriteriaError::path(&text, "unknown root")))
    }
}

impl PathResolver for ScopedResolver<'_> {
    fn resolve_path(&self, path: &PathExpression) -> Result<PathInfo> {
        self.resolve_in(&self.scopes, path)
    }

    fn resolve_outer_path(&self, path: &PathExpression) -> Result<PathInfo> {
        match self.scopes.split_last() {
            Some((_, outer)) if !outer.is_empty() => self.resolve_in(outer, path),
            _ => Err(CriteriaError::path(
                path.to_string(),
                "OUTER can only be used inside a subquery",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metamodel::{AttributeMetadata, EntityMetadata, StaticMetamodel};

    fn metamodel() -> StaticMetamodel {
        StaticMetamodel::new().with_entity(
            EntityMetadata::new("Cat", "cat")
                .attribute(AttributeMetadata::basic("name", ValueType::String)),
        )
    }

    #[test]
    fn open_builders_are_reported_innermost_last() {
        let mut context = BuilderContext::new(
            Arc::new(crate::dialect::DefaultDialect::new()),
            Arc::new(metamodel()),
            Arc::new(CriteriaConfig::default()),
        );
        let outer = context.open("WhereOrBuilder");
        let inner = context.open("RestrictionBuilder");
        assert_eq!(
            context.verify_builder_ended().unwrap_err().to_string(),
            "a builder was not ended properly, still open: WhereOrBuilder > RestrictionBuilder"
        );
        context.close(inner);
        context.close(outer);
        assert!(context.verify_builder_ended().is_ok());
    }

    #[test]
    fn single_root_resolves_unqualified_paths() {
        let metamodel = metamodel();
        let mut outer = AliasScope::default();
        outer.declare_root("c", Some("Cat"), Vec::new()).unwrap();
        let mut inner = AliasScope::default();
        inner.declare_root("v", None, vec![String::from("n")]).unwrap();

        let resolver = ScopedResolver {
            metamodel: &metamodel,
            scopes: vec![&outer],
        };
        assert!(resolver.resolve_path(&PathExpression::parse_simple("name")).is_ok());
        assert!(resolver.resolve_path(&PathExpression::parse_simple("c.name")).is_ok());

        let nested = ScopedResolver {
            metamodel: &metamodel,
            scopes: vec![&outer, &inner],
        };
        assert!(nested.resolve_path(&PathExpression::parse_simple("c.name")).is_ok());
        assert!(nested.resolve_path(&PathExpression::parse_simple("v.n")).is_ok());
        assert!(nested.resolve_path(&PathExpression::parse_simple("v.x")).is_err());
        assert!(nested.resolve_outer_path(&PathExpression::parse_simple("name")).is_ok());
        assert!(resolver.resolve_outer_path(&PathExpression::parse_simple("name")).is_err());
    }

    #[test]
    fn duplicate_alias_is_rejected() {
        let mut scope = AliasScope::default();
        scope.declare_root("c", Some("Cat"), Vec::new()).unwrap();
        let err = scope.declare_entity("c", "Cat").unwrap_err();
        assert_eq!(err.to_string(), "alias 'c' is used more than once");
    }
}
