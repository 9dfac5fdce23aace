//! Alias scopes and path resolution.
//!
//! Every query block being rendered owns a [`QueryPlan`] on the renderer's
//! scope stack. Paths are resolved against the innermost scope that knows
//! their first segment; unqualified paths fall back to the single root of the
//! innermost scope. Navigating a single-valued association adds an implicit
//! LEFT JOIN to the scope that owns the alias, so joins requested from a
//! correlated subquery end up in the outer query's FROM clause.

use std::collections::HashMap;

use super::Renderer;
use crate::ast::{NamedWindow, PathExpression};
use crate::error::{CriteriaError, Result};
use crate::metamodel::{AttributeKind, AttributeMetadata, EntityMetadata, EntityMetamodel};

/// What an alias ranges over.
pub(super) enum AliasSource<'a> {
    Entity {
        entity: &'a EntityMetadata,
        /// The collection attribute an explicit join went through.
        collection: Option<&'a AttributeMetadata>,
    },
    /// A CTE, VALUES list or lateral subquery with named columns.
    Columns(Vec<String>),
}

pub(super) struct AliasEntry<'a> {
    name: String,
    /// Name used in SQL. Differs from `name` for DML targets, which are
    /// referenced by table name.
    qualifier: String,
    source: AliasSource<'a>,
}

/// An implicit LEFT JOIN added by path navigation.
pub(super) struct JoinEdge {
    pub parent: String,
    pub alias: String,
    pub table: String,
    pub condition: String,
}

/// Planning state of one query block.
#[derive(Default)]
pub(super) struct QueryPlan<'a> {
    aliases: Vec<AliasEntry<'a>>,
    pub root: Option<String>,
    associations: HashMap<(String, String), String>,
    pub implicit: Vec<JoinEdge>,
    pub windows: Vec<NamedWindow>,
    /// The select list contains an aggregate.
    pub has_aggregate: bool,
    /// A join-based SIZE was rendered and the query must be grouped.
    pub needs_group_by: bool,
}

impl<'a> QueryPlan<'a> {
    pub fn new(windows: Vec<NamedWindow>) -> Self {
        Self {
            windows,
            ..Self::default()
        }
    }

    /// Brings an alias into scope.
    pub fn register(&mut self, name: &str, qualifier: &str, source: AliasSource<'a>) -> Result<()> {
        if self.alias(name).is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "alias '{name}' is used more than once"
            )));
        }
        self.aliases.push(AliasEntry {
            name: String::from(name),
            qualifier: String::from(qualifier),
            source,
        });
        Ok(())
    }

    fn alias(&self, name: &str) -> Option<&AliasEntry<'a>> {
        self.aliases.iter().find(|entry| entry.name == name)
    }

    /// Returns `base`, or `base` with a numeric suffix when it is taken.
    pub fn unique_alias(&self, base: String) -> String {
        let mut candidate = base.clone();
        let mut n = 1;
        while self.alias(&candidate).is_some() {
            n += 1;
            candidate = format!("{base}_{n}");
        }
        candidate
    }

    /// Implicit joins hanging off `parent`, in the order they were added.
    pub fn edges_from<'p>(&'p self, parent: &'p str) -> impl Iterator<Item = &'p JoinEdge> {
        self.implicit.iter().filter(move |edge| edge.parent == parent)
    }

    /// Adds a join edge and registers its alias.
    pub fn add_edge(&mut self, edge: JoinEdge, entity: &'a EntityMetadata) {
        self.aliases.push(AliasEntry {
            name: edge.alias.clone(),
            qualifier: edge.alias.clone(),
            source: AliasSource::Entity {
                entity,
                collection: None,
            },
        });
        self.implicit.push(edge);
    }
}

/// A collection attribute reached by a path.
pub(super) struct CollectionRef<'a> {
    pub scope: usize,
    pub owner_alias: String,
    pub owner_qualifier: String,
    pub owner: &'a EntityMetadata,
    pub target: &'a EntityMetadata,
    /// Foreign key column on the target table pointing at the owner.
    pub mapped_column: &'a str,
}

/// Result of resolving a path.
pub(super) enum Resolved<'a> {
    Column(String),
    Collection(CollectionRef<'a>),
}

fn attribute_of<'e>(
    entity: &'e EntityMetadata,
    name: &str,
    path: &str,
) -> Result<&'e AttributeMetadata> {
    entity.get(name).ok_or_else(|| {
        CriteriaError::path(
            path,
            format!("unknown attribute '{name}' of entity {}", entity.name),
        )
    })
}

fn basic_column(attribute: &AttributeMetadata) -> &str {
    attribute.column.as_deref().unwrap_or(&attribute.name)
}

fn mapped_column<'e>(target: &'e EntityMetadata, mapped_by: &str, path: &str) -> Result<&'e str> {
    match target.get(mapped_by).map(|attribute| &attribute.kind) {
        Some(AttributeKind::ManyToOne { join_column, .. }) => Ok(join_column),
        _ => Err(CriteriaError::path(
            path,
            format!(
                "'{mapped_by}' of entity {} is not a many-to-one association",
                target.name
            ),
        )),
    }
}

impl<'a> Renderer<'a> {
    pub(super) fn scope_index(&self) -> Result<usize> {
        self.scopes
            .len()
            .checked_sub(1)
            .ok_or_else(|| CriteriaError::illegal_argument("expression used outside of a query"))
    }

    pub(super) fn scope(&self) -> Result<&QueryPlan<'a>> {
        let index = self.scope_index()?;
        Ok(&self.scopes[index])
    }

    pub(super) fn scope_mut(&mut self) -> Result<&mut QueryPlan<'a>> {
        let index = self.scope_index()?;
        Ok(&mut self.scopes[index])
    }

    pub(super) fn entity_metadata(&self, name: &str, path: &str) -> Result<&'a EntityMetadata> {
        let metamodel: &'a dyn EntityMetamodel = self.metamodel;
        metamodel
            .entity(name)
            .ok_or_else(|| CriteriaError::path(path, format!("unknown entity {name}")))
    }

    /// Resolves a path, or an `OUTER(...)` path when `outer` is set.
    pub(super) fn resolve(&mut self, path: &PathExpression, outer: bool) -> Result<Resolved<'a>> {
        let text = path.to_string();
        let innermost = if outer {
            self.scopes.len().checked_sub(2).ok_or_else(|| {
                CriteriaError::path(&text, "OUTER can only be used inside a subquery")
            })?
        } else {
            self.scope_index()?
        };
        let found = (0..=innermost)
            .rev()
            .find(|&i| self.scopes[i].alias(path.head()).is_some());
        match found {
            Some(scope) => {
                let alias = String::from(path.head());
                self.resolve_from(scope, &alias, path.tail(), &text)
            }
            None => {
                let root = self.scopes[innermost].root.clone().ok_or_else(|| {
                    CriteriaError::path(&text, format!("unknown alias '{}'", path.head()))
                })?;
                self.resolve_from(innermost, &root, &path.segments, &text)
            }
        }
    }

    /// Resolves a path that must end in a column.
    pub(super) fn resolve_column(&mut self, path: &PathExpression, outer: bool) -> Result<String> {
        match self.resolve(path, outer)? {
            Resolved::Column(column) => Ok(column),
            Resolved::Collection(_) => Err(CriteriaError::path(
                path.to_string(),
                "a collection can only be used in SIZE, IS EMPTY, MEMBER OF or a join",
            )),
        }
    }

    /// Resolves a path that must end in a collection.
    pub(super) fn resolve_collection(&mut self, path: &PathExpression) -> Result<CollectionRef<'a>> {
        match self.resolve(path, false)? {
            Resolved::Collection(collection) => Ok(collection),
            Resolved::Column(_) => Err(CriteriaError::path(
                path.to_string(),
                "is not a collection",
            )),
        }
    }

    fn resolve_from(
        &mut self,
        scope: usize,
        alias: &str,
        attributes: &[String],
        text: &str,
    ) -> Result<Resolved<'a>> {
        let entry = self.scopes[scope]
            .alias(alias)
            .ok_or_else(|| CriteriaError::path(text, format!("unknown alias '{alias}'")))?;
        let mut qualifier = entry.qualifier.clone();
        let mut entity = match &entry.source {
            AliasSource::Entity { entity, .. } => *entity,
            AliasSource::Columns(columns) => {
                return match attributes {
                    [column] if columns.contains(column) => {
                        Ok(Resolved::Column(format!("{qualifier}.{column}")))
                    }
                    [] => Err(CriteriaError::path(
                        text,
                        "a derived table can only be used through its columns",
                    )),
                    _ => Err(CriteriaError::path(
                        text,
                        format!("'{alias}' has no column '{}'", attributes.join(".")),
                    )),
                };
            }
        };
        let mut current = String::from(alias);
        for (i, name) in attributes.iter().enumerate() {
            let attribute = attribute_of(entity, name, text)?;
            let remaining = &attributes[i + 1..];
            match &attribute.kind {
                AttributeKind::Basic => {
                    if !remaining.is_empty() {
                        return Err(CriteriaError::path(
                            text,
                            format!("basic attribute '{name}' cannot be dereferenced"),
                        ));
                    }
                    return Ok(Resolved::Column(format!(
                        "{qualifier}.{}",
                        basic_column(attribute)
                    )));
                }
                AttributeKind::ManyToOne {
                    target,
                    join_column,
                } => {
                    let target = self.entity_metadata(target, text)?;
                    match remaining {
                        [] => return Ok(Resolved::Column(format!("{qualifier}.{join_column}"))),
                        [id] if *id == target.id_attribute => {
                            return Ok(Resolved::Column(format!("{qualifier}.{join_column}")));
                        }
                        _ => {}
                    }
                    let joined =
                        self.implicit_join(scope, &current, &qualifier, name, join_column, target);
                    qualifier.clone_from(&joined);
                    current = joined;
                    entity = target;
                }
                AttributeKind::OneToMany {
                    target, mapped_by, ..
                } => {
                    if !remaining.is_empty() {
                        return Err(CriteriaError::path(
                            text,
                            format!(
                                "collection attribute '{name}' must be joined before it is dereferenced"
                            ),
                        ));
                    }
                    let target = self.entity_metadata(target, text)?;
                    let mapped_column = mapped_column(target, mapped_by, text)?;
                    return Ok(Resolved::Collection(CollectionRef {
                        scope,
                        owner_alias: current,
                        owner_qualifier: qualifier,
                        owner: entity,
                        target,
                        mapped_column,
                    }));
                }
            }
        }
        Ok(Resolved::Column(format!("{qualifier}.{}", entity.id_column())))
    }

    fn implicit_join(
        &mut self,
        scope: usize,
        parent: &str,
        parent_qualifier: &str,
        attribute: &str,
        join_column: &str,
        target: &'a EntityMetadata,
    ) -> String {
        let plan = &mut self.scopes[scope];
        let key = (String::from(parent), String::from(attribute));
        if let Some(alias) = plan.associations.get(&key) {
            return alias.clone();
        }
        let alias = plan.unique_alias(format!("{parent}_{attribute}"));
        let condition = format!(
            "{alias}.{} = {parent_qualifier}.{join_column}",
            target.id_column()
        );
        plan.add_edge(
            JoinEdge {
                parent: String::from(parent),
                alias: alias.clone(),
                table: target.table.clone(),
                condition,
            },
            target,
        );
        plan.associations.insert(key, alias.clone());
        alias
    }

    /// Registers an explicit association join and returns the joined table
    /// with its join condition.
    pub(super) fn association_join(
        &mut self,
        path: &PathExpression,
        alias: &str,
    ) -> Result<(String, String)> {
        let text = path.to_string();
        let scope = self.scope_index()?;
        let Some((last, prefix)) = path.tail().split_last() else {
            return Err(CriteriaError::path(text, "a join path needs an association"));
        };
        let entry = self.scopes[scope]
            .alias(path.head())
            .ok_or_else(|| CriteriaError::path(&text, format!("unknown alias '{}'", path.head())))?;
        let AliasSource::Entity { entity, .. } = &entry.source else {
            return Err(CriteriaError::path(&text, "cannot join through a derived table"));
        };
        let mut entity: &'a EntityMetadata = *entity;
        let mut qualifier = entry.qualifier.clone();
        let mut current = String::from(path.head());
        for name in prefix {
            let attribute = attribute_of(entity, name, &text)?;
            let AttributeKind::ManyToOne {
                target,
                join_column,
            } = &attribute.kind
            else {
                return Err(CriteriaError::path(
                    &text,
                    format!("'{name}' is not a single-valued association"),
                ));
            };
            let target = self.entity_metadata(target, &text)?;
            let joined = self.implicit_join(scope, &current, &qualifier, name, join_column, target);
            qualifier.clone_from(&joined);
            current = joined;
            entity = target;
        }
        let attribute = attribute_of(entity, last, &text)?;
        let (target, condition) = match &attribute.kind {
            AttributeKind::ManyToOne {
                target,
                join_column,
            } => {
                let target = self.entity_metadata(target, &text)?;
                let condition = format!(
                    "{alias}.{} = {qualifier}.{join_column}",
                    target.id_column()
                );
                (target, condition)
            }
            AttributeKind::OneToMany {
                target, mapped_by, ..
            } => {
                let target = self.entity_metadata(target, &text)?;
                let column = mapped_column(target, mapped_by, &text)?;
                let condition = format!("{alias}.{column} = {qualifier}.{}", entity.id_column());
                (target, condition)
            }
            AttributeKind::Basic => {
                return Err(CriteriaError::path(
                    &text,
                    format!("basic attribute '{last}' cannot be joined"),
                ));
            }
        };
        let collection = attribute.is_collection().then_some(attribute);
        let plan = &mut self.scopes[scope];
        plan.register(
            alias,
            alias,
            AliasSource::Entity {
                entity: target,
                collection,
            },
        )?;
        plan.associations
            .insert((current, last.clone()), String::from(alias));
        Ok((target.table.clone(), condition))
    }

    /// Joins the elements of a collection for a grouped `COUNT(DISTINCT ...)`
    /// and returns the alias of the joined table. Repeated calls for the same
    /// collection share one join.
    pub(super) fn size_join(&mut self, collection: &CollectionRef<'a>, attribute: &str) -> String {
        let plan = &mut self.scopes[collection.scope];
        let key = (collection.owner_alias.clone(), format!("SIZE({attribute})"));
        if let Some(alias) = plan.associations.get(&key) {
            return alias.clone();
        }
        let alias = plan.unique_alias(format!("{}_{attribute}_size", collection.owner_alias));
        let condition = format!(
            "{alias}.{} = {}.{}",
            collection.mapped_column,
            collection.owner_qualifier,
            collection.owner.id_column()
        );
        plan.add_edge(
            JoinEdge {
                parent: collection.owner_alias.clone(),
                alias: alias.clone(),
                table: collection.target.table.clone(),
                condition,
            },
            collection.target,
        );
        plan.associations.insert(key, alias.clone());
        plan.needs_group_by = true;
        alias
    }

    /// Finds the collection an alias was joined through, for INDEX and KEY.
    pub(super) fn joined_collection(
        &self,
        alias: &str,
    ) -> Option<(String, &'a AttributeMetadata, &'a EntityMetadata)> {
        self.scopes.iter().rev().find_map(|plan| {
            let entry = plan.alias(alias)?;
            match &entry.source {
                AliasSource::Entity {
                    entity,
                    collection: Some(attribute),
                } => Some((entry.qualifier.clone(), *attribute, *entity)),
                _ => None,
            }
        })
    }

    /// Qualifier and entity of an alias in the innermost scope, if it is an
    /// entity alias.
    pub(super) fn entity_alias(&self, alias: &str) -> Option<(String, &'a EntityMetadata)> {
        let entry = self.scopes.last()?.alias(alias)?;
        match &entry.source {
            AliasSource::Entity { entity, .. } => Some((entry.qualifier.clone(), *entity)),
            AliasSource::Columns(_) => None,
        }
    }
}
