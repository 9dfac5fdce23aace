//! Configuration properties.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CriteriaError, Result};

/// Settings shared by every builder created from one factory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CriteriaConfig {
    /// Product name looked up in the dialect registry.
    pub dialect: String,
    /// Allows the row-value form of keyset predicates when the dialect
    /// supports it.
    pub optimized_keyset_predicate_rendering: bool,
    /// Renders `SIZE(collection)` as a correlated COUNT subquery instead of
    /// a join with grouping.
    pub size_to_count_transformation: bool,
    /// Adds the non-aggregate select items to GROUP BY when the select list
    /// mixes them with aggregates.
    pub implicit_group_by_from_select: bool,
    /// Rows between the page boundary and the row whose keyset is extracted.
    pub keyset_extraction_offset: usize,
    /// Prefix of parameter names generated for bound values.
    pub parameter_prefix: String,
}

impl Default for CriteriaConfig {
    fn default() -> Self {
        Self {
            dialect: String::from("generic"),
            optimized_keyset_predicate_rendering: true,
            size_to_count_transformation: true,
            implicit_group_by_from_select: true,
            keyset_extraction_offset: 0,
            parameter_prefix: String::from("param_"),
        }
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        CriteriaError::Configuration(format!("invalid value '{value}' for property {key}"))
    })
}

impl CriteriaConfig {
    /// Creates the default configuration for a dialect.
    #[must_use]
    pub fn for_dialect(dialect: &str) -> Self {
        Self {
            dialect: String::from(dialect),
            ..Self::default()
        }
    }

    /// Builds a configuration from string properties.
    ///
    /// Keys are accepted in camelCase or snake_case. Missing keys keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Configuration`] for unknown keys and values
    /// that do not parse.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        let mut keys: Vec<&String> = properties.keys().collect();
        keys.sort();
        for key in keys {
            let value = &properties[key];
            match key.as_str() {
                "dialect" => config.dialect.clone_from(value),
                "optimizedKeysetPredicateRendering" | "optimized_keyset_predicate_rendering" => {
                    config.optimized_keyset_predicate_rendering = parse(key, value)?;
                }
                "sizeToCountTransformation" | "size_to_count_transformation" => {
                    config.size_to_count_transformation = parse(key, value)?;
                }
                "implicitGroupByFromSelect" | "implicit_group_by_from_select" => {
                    config.implicit_group_by_from_select = parse(key, value)?;
                }
                "keysetExtractionOffset" | "keyset_extraction_offset" => {
                    config.keyset_extraction_offset = parse(key, value)?;
                }
                "parameterPrefix" | "parameter_prefix" => config.parameter_prefix.clone_from(value),
                other => {
                    return Err(CriteriaError::Configuration(format!(
                        "unknown property {other}"
                    )));
                }
            }
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (String::from(*k), String::from(*v)))
            .collect()
    }

    #[test]
    fn defaults() {
        let config = CriteriaConfig::default();
        assert_eq!(config.dialect, "generic");
        assert!(config.optimized_keyset_predicate_rendering);
        assert_eq!(config.parameter_prefix, "param_");
    }

    #[test]
    fn from_properties_accepts_both_spellings() {
        let config = CriteriaConfig::from_properties(&properties(&[
            ("dialect", "postgresql"),
            ("optimizedKeysetPredicateRendering", "false"),
            ("keyset_extraction_offset", "2"),
        ]))
        .unwrap();
        assert_eq!(config.dialect, "postgresql");
        assert!(!config.optimized_keyset_predicate_rendering);
        assert_eq!(config.keyset_extraction_offset, 2);
    }

    #[test]
    fn bad_properties_are_rejected() {
        let err = CriteriaConfig::from_properties(&properties(&[("colour", "red")])).unwrap_err();
        assert_eq!(err.to_string(), "configuration error: unknown property colour");
        let err = CriteriaConfig::from_properties(&properties(&[(
            "sizeToCountTransformation",
            "maybe",
        )]))
        .unwrap_err();
        assert!(matches!(err, CriteriaError::Configuration(_)));
    }

    #[test]
    fn deserializes_camel_case() {
        let config: CriteriaConfig =
            serde_json::from_str(r#"{"dialect": "mysql", "implicitGroupByFromSelect": false}"#)
                .unwrap();
        assert_eq!(config.dialect, "mysql");
        assert!(!config.implicit_group_by_from_select);
        assert!(config.size_to_count_transformation);
        assert!(serde_json::from_str::<CriteriaConfig>(r#"{"colour": 1}"#).is_err());
    }
}
