//! Entity metamodel: the seam to the persistence runtime's mapping metadata.
//!
//! The renderer and the path resolver only see entities through
//! [`EntityMetamodel`]. [`StaticMetamodel`] is an in-memory implementation that
//! can be assembled in code or deserialized from JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ast::ValueType;
use crate::error::{CriteriaError, Result};

/// How an attribute is mapped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttributeKind {
    /// A column of the entity's table.
    #[default]
    Basic,
    /// Single-valued association stored as a foreign key column.
    ManyToOne { target: String, join_column: String },
    /// Collection association owned by the target's `mapped_by` attribute.
    OneToMany {
        target: String,
        mapped_by: String,
        /// List index column on the target table.
        index_column: Option<String>,
        /// Map key column on the target table.
        key_column: Option<String>,
    },
}

/// One attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAttribute", into = "RawAttribute")]
pub struct AttributeMetadata {
    pub name: String,
    /// Column name; defaults to the attribute name for basic attributes.
    pub column: Option<String>,
    pub kind: AttributeKind,
    pub value_type: ValueType,
    pub nullable: bool,
    pub unique: bool,
}

/// JSON form of an attribute, with the association fields inlined.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAttribute {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    column: Option<String>,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default, rename = "type")]
    value_type: Option<ValueType>,
    #[serde(default = "default_nullable")]
    nullable: bool,
    #[serde(default)]
    unique: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    join_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mapped_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key_column: Option<String>,
}

fn default_kind() -> String {
    String::from("basic")
}

const fn default_nullable() -> bool {
    true
}

impl TryFrom<RawAttribute> for AttributeMetadata {
    type Error = String;

    fn try_from(raw: RawAttribute) -> std::result::Result<Self, Self::Error> {
        let missing = |field: &str| format!("attribute '{}' needs '{field}'", raw.name);
        let kind = match raw.kind.as_str() {
            "basic" => AttributeKind::Basic,
            "manyToOne" => AttributeKind::ManyToOne {
                target: raw.target.clone().ok_or_else(|| missing("target"))?,
                join_column: raw.join_column.clone().ok_or_else(|| missing("joinColumn"))?,
            },
            "oneToMany" => AttributeKind::OneToMany {
                target: raw.target.clone().ok_or_else(|| missing("target"))?,
                mapped_by: raw.mapped_by.clone().ok_or_else(|| missing("mappedBy"))?,
                index_column: raw.index_column.clone(),
                key_column: raw.key_column.clone(),
            },
            other => return Err(format!("unknown attribute kind '{other}'")),
        };
        let value_type = match (&kind, raw.value_type) {
            (_, Some(value_type)) => value_type,
            (AttributeKind::Basic, None) => ValueType::Unknown,
            (
                AttributeKind::ManyToOne { target, .. } | AttributeKind::OneToMany { target, .. },
                None,
            ) => ValueType::Entity(target.clone()),
        };
        Ok(Self {
            name: raw.name,
            column: raw.column,
            kind,
            value_type,
            nullable: raw.nullable,
            unique: raw.unique,
        })
    }
}

impl From<AttributeMetadata> for RawAttribute {
    fn from(attribute: AttributeMetadata) -> Self {
        let mut raw = Self {
            name: attribute.name,
            column: attribute.column,
            kind: default_kind(),
            value_type: Some(attribute.value_type),
            nullable: attribute.nullable,
            unique: attribute.unique,
            target: None,
            join_column: None,
            mapped_by: None,
            index_column: None,
            key_column: None,
        };
        match attribute.kind {
            AttributeKind::Basic => {}
            AttributeKind::ManyToOne {
                target,
                join_column,
            } => {
                raw.kind = String::from("manyToOne");
                raw.target = Some(target);
                raw.join_column = Some(join_column);
            }
            AttributeKind::OneToMany {
                target,
                mapped_by,
                index_column,
                key_column,
            } => {
                raw.kind = String::from("oneToMany");
                raw.target = Some(target);
                raw.mapped_by = Some(mapped_by);
                raw.index_column = index_column;
                raw.key_column = key_column;
            }
        }
        raw
    }
}

impl AttributeMetadata {
    /// A nullable, non-unique basic attribute.
    #[must_use]
    pub fn basic(name: &str, value_type: ValueType) -> Self {
        Self {
            name: String::from(name),
            column: None,
            kind: AttributeKind::Basic,
            value_type,
            nullable: true,
            unique: false,
        }
    }

    /// A nullable many-to-one association.
    #[must_use]
    pub fn many_to_one(name: &str, target: &str, join_column: &str) -> Self {
        Self {
            name: String::from(name),
            column: None,
            kind: AttributeKind::ManyToOne {
                target: String::from(target),
                join_column: String::from(join_column),
            },
            value_type: ValueType::Entity(String::from(target)),
            nullable: true,
            unique: false,
        }
    }

    /// A one-to-many collection mapped by `mapped_by` on the target.
    #[must_use]
    pub fn one_to_many(name: &str, target: &str, mapped_by: &str) -> Self {
        Self {
            name: String::from(name),
            column: None,
            kind: AttributeKind::OneToMany {
                target: String::from(target),
                mapped_by: String::from(mapped_by),
                index_column: None,
                key_column: None,
            },
            value_type: ValueType::Entity(String::from(target)),
            nullable: true,
            unique: false,
        }
    }

    #[must_use]
    pub fn column(mut self, column: &str) -> Self {
        self.column = Some(String::from(column));
        self
    }

    #[must_use]
    pub const fn non_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    #[must_use]
    pub const fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Sets the list index column of a one-to-many collection.
    #[must_use]
    pub fn index_column(mut self, column: &str) -> Self {
        if let AttributeKind::OneToMany { index_column, .. } = &mut self.kind {
            *index_column = Some(String::from(column));
        }
        self
    }

    /// Sets the map key column of a one-to-many collection.
    #[must_use]
    pub fn key_column(mut self, column: &str) -> Self {
        if let AttributeKind::OneToMany { key_column, .. } = &mut self.kind {
            *key_column = Some(String::from(column));
        }
        self
    }

    /// The column holding the attribute's value on the owner's table, if any.
    #[must_use]
    pub fn column_name(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Basic => Some(self.column.as_deref().unwrap_or(&self.name)),
            AttributeKind::ManyToOne { join_column, .. } => Some(join_column),
            AttributeKind::OneToMany { .. } => None,
        }
    }

    /// The associated entity, for associations.
    #[must_use]
    pub fn target(&self) -> Option<&str> {
        match &self.kind {
            AttributeKind::Basic => None,
            AttributeKind::ManyToOne { target, .. } | AttributeKind::OneToMany { target, .. } => {
                Some(target)
            }
        }
    }

    #[must_use]
    pub const fn is_collection(&self) -> bool {
        matches!(self.kind, AttributeKind::OneToMany { .. })
    }
}

/// Mapping of one entity to its table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    pub name: String,
    pub table: String,
    #[serde(default = "default_id")]
    pub id_attribute: String,
    #[serde(default)]
    pub attributes: Vec<AttributeMetadata>,
}

fn default_id() -> String {
    String::from("id")
}

impl EntityMetadata {
    /// Creates an entity whose id is a non-null `Long` attribute named `id`.
    #[must_use]
    pub fn new(name: &str, table: &str) -> Self {
        Self {
            name: String::from(name),
            table: String::from(table),
            id_attribute: default_id(),
            attributes: vec![AttributeMetadata::basic("id", ValueType::Long).non_null().unique()],
        }
    }

    #[must_use]
    pub fn attribute(mut self, attribute: AttributeMetadata) -> Self {
        self.attributes.retain(|a| a.name != attribute.name);
        self.attributes.push(attribute);
        self
    }

    /// Looks up an attribute by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AttributeMetadata> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// The id column, falling back to the id attribute's name.
    #[must_use]
    pub fn id_column(&self) -> &str {
        self.get(&self.id_attribute)
            .and_then(AttributeMetadata::column_name)
            .unwrap_or(&self.id_attribute)
    }
}

/// Resolved facts about an attribute path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathInfo {
    pub value_type: ValueType,
    /// The path may evaluate to NULL, either because an attribute is
    /// nullable or because an optional association is traversed.
    pub nullable: bool,
    /// The path ends in a collection attribute.
    pub collection: bool,
    /// The path identifies a row of the root uniquely.
    pub unique: bool,
}

/// Metamodel lookups used by path resolution and rendering.
pub trait EntityMetamodel: Send + Sync {
    /// Returns the metadata of an entity.
    fn entity(&self, name: &str) -> Option<&EntityMetadata>;

    /// Lists the known entity names.
    fn entity_names(&self) -> Vec<String>;

    /// Resolves `attributes` starting at `root_entity`.
    ///
    /// Single-valued associations can be navigated. A collection attribute
    /// may only be the last segment and a basic attribute cannot be
    /// dereferenced.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::PathResolution`] for unknown entities or
    /// attributes and for illegal dereferences.
    fn resolve(&self, root_entity: &str, attributes: &[String]) -> Result<PathInfo> {
        let describe = || {
            let mut path = String::from(root_entity);
            for attribute in attributes {
                path.push('.');
                path.push_str(attribute);
            }
            path
        };
        let mut entity = self
            .entity(root_entity)
            .ok_or_else(|| CriteriaError::path(describe(), format!("unknown entity {root_entity}")))?;
        let mut info = PathInfo {
            value_type: ValueType::Entity(entity.name.clone()),
            nullable: false,
            collection: false,
            unique: true,
        };
        for (i, name) in attributes.iter().enumerate() {
            let last = i + 1 == attributes.len();
            let attribute = entity.get(name).ok_or_else(|| {
                CriteriaError::path(
                    describe(),
                    format!("unknown attribute '{name}' of entity {}", entity.name),
                )
            })?;
            info.nullable |= attribute.nullable && name != &entity.id_attribute;
            info.unique = i == 0 && (attribute.unique || name == &entity.id_attribute);
            info.value_type = attribute.value_type.clone();
            match &attribute.kind {
                AttributeKind::Basic if !last => {
                    return Err(CriteriaError::path(
                        describe(),
                        format!("basic attribute '{name}' cannot be dereferenced"),
                    ));
                }
                AttributeKind::Basic => {}
                AttributeKind::ManyToOne { target, .. } => {
                    entity = self.entity(target).ok_or_else(|| {
                        CriteriaError::path(describe(), format!("unknown entity {target}"))
                    })?;
                }
                AttributeKind::OneToMany { .. } if !last => {
                    return Err(CriteriaError::path(
                        describe(),
                        format!("collection attribute '{name}' must be joined before it is dereferenced"),
                    ));
                }
                AttributeKind::OneToMany { .. } => {
                    info.collection = true;
                    info.unique = false;
                }
            }
        }
        Ok(info)
    }
}

/// An in-memory metamodel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMetamodel {
    entities: BTreeMap<String, EntityMetadata>,
}

#[derive(Deserialize)]
struct MetamodelDocument {
    entities: Vec<EntityMetadata>,
}

impl StaticMetamodel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an entity.
    #[must_use]
    pub fn with_entity(mut self, entity: EntityMetadata) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Parses a `{"entities": [...]}` document.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Configuration`] when the JSON is malformed or
    /// an association names an unknown entity.
    pub fn from_json(json: &str) -> Result<Self> {
        let document: MetamodelDocument = serde_json::from_str(json)
            .map_err(|e| CriteriaError::Configuration(format!("invalid metamodel: {e}")))?;
        let metamodel = document
            .entities
            .into_iter()
            .map(|entity| {
                if entity.get(&entity.id_attribute).is_some() {
                    entity
                } else {
                    let id = AttributeMetadata::basic(&entity.id_attribute, ValueType::Long);
                    entity.attribute(id.non_null().unique())
                }
            })
            .fold(Self::new(), Self::with_entity);
        metamodel.validate()?;
        Ok(metamodel)
    }

    /// Checks that every association points at a known entity.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Configuration`] naming the dangling association.
    pub fn validate(&self) -> Result<()> {
        for entity in self.entities.values() {
            for attribute in &entity.attributes {
                if let Some(target) = attribute.target() {
                    if !self.entities.contains_key(target) {
                        return Err(CriteriaError::Configuration(format!(
                            "{}.{} targets unknown entity {target}",
                            entity.name, attribute.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

impl EntityMetamodel for StaticMetamodel {
    fn entity(&self, name: &str) -> Option<&EntityMetadata> {
        self.entities.get(name)
    }

    fn entity_names(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cats() -> StaticMetamodel {
        StaticMetamodel::new()
            .with_entity(
                EntityMetadata::new("Person", "person")
                    .attribute(AttributeMetadata::basic("name", ValueType::String).non_null()),
            )
            .with_entity(
                EntityMetadata::new("Cat", "cat")
                    .attribute(AttributeMetadata::basic("name", ValueType::String))
                    .attribute(AttributeMetadata::basic("age", ValueType::Integer).non_null())
                    .attribute(AttributeMetadata::many_to_one("owner", "Person", "owner_id"))
                    .attribute(AttributeMetadata::one_to_many("kittens", "Cat", "mother")),
            )
    }

    fn attrs(path: &str) -> Vec<String> {
        path.split('.').map(String::from).collect()
    }

    #[test]
    fn resolves_through_associations() {
        let metamodel = cats();
        let info = metamodel.resolve("Cat", &attrs("owner.name")).unwrap();
        assert_eq!(info.value_type, ValueType::String);
        // the association is optional, so the path is nullable
        assert!(info.nullable);
        assert!(!info.unique);

        let id = metamodel.resolve("Cat", &attrs("id")).unwrap();
        assert!(id.unique);
        assert!(!id.nullable);
    }

    #[test]
    fn collections_only_at_the_end() {
        let metamodel = cats();
        assert!(metamodel.resolve("Cat", &attrs("kittens")).unwrap().collection);
        let err = metamodel.resolve("Cat", &attrs("kittens.name")).unwrap_err();
        assert!(matches!(err, CriteriaError::PathResolution { .. }));
    }

    #[test]
    fn unknown_attribute_is_named() {
        let err = cats().resolve("Cat", &attrs("color")).unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot resolve path 'Cat.color': unknown attribute 'color' of entity Cat"
        );
        let err = cats().resolve("Cat", &attrs("age.value")).unwrap_err();
        assert!(err.to_string().contains("cannot be dereferenced"));
    }

    #[test]
    fn loads_json_document() {
        let json = r#"{
            "entities": [
                {"name": "Person", "table": "person", "attributes": [
                    {"name": "id", "type": "long", "nullable": false, "unique": true}
                ]},
                {"name": "Cat", "table": "cat", "attributes": [
                    {"name": "id", "type": "long", "nullable": false, "unique": true},
                    {"name": "owner", "kind": "manyToOne", "target": "Person", "joinColumn": "owner_id"}
                ]}
            ]
        }"#;
        let metamodel = StaticMetamodel::from_json(json).unwrap();
        let cat = metamodel.entity("Cat").unwrap();
        assert_eq!(cat.get("owner").unwrap().column_name(), Some("owner_id"));
        assert_eq!(cat.id_column(), "id");
    }

    #[test]
    fn rejects_dangling_association() {
        let json = r#"{"entities": [{"name": "Cat", "table": "cat", "attributes": [
            {"name": "owner", "kind": "manyToOne", "target": "Person", "joinColumn": "owner_id"}
        ]}]}"#;
        assert!(matches!(
            StaticMetamodel::from_json(json),
            Err(CriteriaError::Configuration(_))
        ));
    }
}
