//! JSON description of a criteria query.
//!
//! ```json
//! {
//!   "from": [{"entity": "Cat", "alias": "c"}],
//!   "joins": [{"path": "c.owner", "alias": "o", "type": "left"}],
//!   "select": ["c.name", {"expression": "o.name", "alias": "owner"}],
//!   "where": ["c.age > :minAge"],
//!   "orderBy": [{"expression": "c.age", "nullsFirst": true}, {"expression": "c.id"}],
//!   "parameters": {"minAge": 3},
//!   "page": {"firstResult": 0, "maxResults": 10}
//! }
//! ```

use std::collections::BTreeMap;

use serde::Deserialize;

use oxide_criteria_core::ast::JoinType;
use oxide_criteria_core::{
    CriteriaBuilder, CriteriaBuilderFactory, KeysetPage, QueryBuilder, Result, SqlStatement,
    SqlValue,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueryDescription {
    pub from: Vec<Root>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub select: Vec<Selection>,
    #[serde(default)]
    pub joins: Vec<Join>,
    #[serde(default, rename = "where")]
    pub restrictions: Vec<String>,
    #[serde(default)]
    pub group_by: Vec<String>,
    #[serde(default)]
    pub having: Vec<String>,
    #[serde(default)]
    pub order_by: Vec<Ordering>,
    #[serde(default)]
    pub parameters: BTreeMap<String, SqlValue>,
    #[serde(default)]
    pub positional_parameters: Vec<SqlValue>,
    pub first_result: Option<u64>,
    pub max_results: Option<u64>,
    pub page: Option<Page>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Root {
    pub entity: String,
    pub alias: String,
}

/// A select item, either bare or aliased.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Selection {
    Plain(String),
    Aliased { expression: String, alias: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Join {
    pub path: String,
    pub alias: String,
    #[serde(default, rename = "type")]
    pub kind: JoinKind,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinKind {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => Self::Inner,
            JoinKind::Left => Self::Left,
            JoinKind::Right => Self::Right,
            JoinKind::Full => Self::Full,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Ordering {
    pub expression: String,
    #[serde(default = "ascending")]
    pub ascending: bool,
    #[serde(default)]
    pub nulls_first: bool,
}

const fn ascending() -> bool {
    true
}

/// Paging through the paginated builder, with a count query and keysets.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Page {
    #[serde(default)]
    pub first_result: u64,
    pub max_results: u64,
    /// Keysets of a previously read page.
    pub keyset_page: Option<KeysetPage>,
    #[serde(default = "count_query")]
    pub count_query: bool,
}

const fn count_query() -> bool {
    true
}

/// The statements a description renders to.
#[derive(Debug)]
pub struct RenderedQuery {
    pub statement: SqlStatement,
    pub count: Option<SqlStatement>,
}

impl QueryDescription {
    /// # Errors
    ///
    /// Malformed JSON and unknown fields.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Replays the description on a fresh builder.
    ///
    /// # Errors
    ///
    /// Unknown entities or paths and expressions that do not parse.
    pub fn build(&self, factory: &CriteriaBuilderFactory) -> Result<CriteriaBuilder> {
        let mut cb = factory.create();
        for root in &self.from {
            cb.from(&root.entity, &root.alias)?;
        }
        for join in &self.joins {
            cb.join(&join.path, &join.alias, join.kind.into())?;
        }
        if self.distinct {
            let _ = (&mut cb).distinct();
        }
        for selection in &self.select {
            match selection {
                Selection::Plain(expression) => cb.select(expression)?,
                Selection::Aliased { expression, alias } => cb.select_as(expression, alias)?,
            };
        }
        for predicate in &self.restrictions {
            cb.where_expression(predicate)?;
        }
        for expression in &self.group_by {
            cb.group_by(expression)?;
        }
        for predicate in &self.having {
            cb.having_expression(predicate)?;
        }
        for item in &self.order_by {
            cb.order_by(&item.expression, item.ascending, item.nulls_first)?;
        }
        for (name, value) in &self.parameters {
            cb.set_parameter(name, value.clone());
        }
        for (position, value) in (1..).zip(&self.positional_parameters) {
            cb.set_positional_parameter(position, value.clone());
        }
        if let Some(first_result) = self.first_result {
            let _ = (&mut cb).set_first_result(first_result);
        }
        if let Some(max_results) = self.max_results {
            let _ = (&mut cb).set_max_results(max_results);
        }
        Ok(cb)
    }

    /// Builds and renders the query, paging it when a page is described.
    ///
    /// # Errors
    ///
    /// See [`QueryDescription::build`], plus every rendering error.
    pub fn render(&self, factory: &CriteriaBuilderFactory) -> Result<RenderedQuery> {
        let cb = self.build(factory)?;
        let Some(page) = &self.page else {
            return Ok(RenderedQuery {
                statement: cb.render()?,
                count: None,
            });
        };
        let paginated = cb
            .page_keyset(page.keyset_page.as_ref(), page.first_result, page.max_results)?
            .with_count_query(page.count_query);
        let count = if page.count_query {
            Some(paginated.render_count()?)
        } else {
            None
        };
        Ok(RenderedQuery {
            statement: paginated.render()?,
            count,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use oxide_criteria_core::metamodel::StaticMetamodel;
    use oxide_criteria_core::{CriteriaConfig, CriteriaError};

    use super::*;

    const METAMODEL: &str = r#"{
        "entities": [
            {"name": "Person", "table": "person", "attributes": [
                {"name": "name", "type": "string", "nullable": false}
            ]},
            {"name": "Cat", "table": "cat", "attributes": [
                {"name": "name", "type": "string", "nullable": false},
                {"name": "age", "type": "integer"},
                {"name": "owner", "kind": "manyToOne", "target": "Person", "joinColumn": "owner_id"}
            ]}
        ]
    }"#;

    fn factory(dialect: &str) -> CriteriaBuilderFactory {
        let metamodel = StaticMetamodel::from_json(METAMODEL).unwrap();
        CriteriaBuilderFactory::new(CriteriaConfig::for_dialect(dialect), Arc::new(metamodel))
            .unwrap()
    }

    fn render(dialect: &str, json: &str) -> Result<RenderedQuery> {
        QueryDescription::from_json(json).unwrap().render(&factory(dialect))
    }

    #[test]
    fn named_parameters() {
        let rendered = render(
            "postgresql",
            r#"{
                "from": [{"entity": "Cat", "alias": "c"}],
                "select": ["c.name"],
                "where": ["c.age > :minAge"],
                "orderBy": [{"expression": "c.id"}],
                "parameters": {"minAge": 3}
            }"#,
        )
        .unwrap();
        assert_eq!(
            rendered.statement.sql,
            "SELECT c.name FROM cat c WHERE c.age > $1 ORDER BY c.id ASC"
        );
        assert_eq!(rendered.statement.parameters, vec![SqlValue::Int(3)]);
        assert!(rendered.count.is_none());
    }

    #[test]
    fn positional_parameters_on_mysql() {
        let rendered = render(
            "mysql",
            r#"{
                "from": [{"entity": "Cat", "alias": "c"}],
                "select": ["c.id"],
                "where": ["c.age = ?1 AND c.name <> ?2"],
                "positionalParameters": [4, "cat 1"]
            }"#,
        )
        .unwrap();
        assert_eq!(
            rendered.statement.sql,
            "SELECT c.id FROM cat c WHERE c.age = ? AND c.name <> ?"
        );
        assert_eq!(
            rendered.statement.parameters,
            vec![SqlValue::Int(4), SqlValue::Text(String::from("cat 1"))]
        );
    }

    #[test]
    fn joins_follow_associations() {
        let rendered = render(
            "postgresql",
            r#"{
                "from": [{"entity": "Cat", "alias": "c"}],
                "joins": [{"path": "c.owner", "alias": "o", "type": "left"}],
                "select": [{"expression": "o.name", "alias": "owner"}]
            }"#,
        )
        .unwrap();
        assert!(
            rendered.statement.sql.contains("LEFT JOIN person o ON"),
            "{}",
            rendered.statement.sql
        );
    }

    #[test]
    fn page_adds_count_query() {
        let rendered = render(
            "postgresql",
            r#"{
                "from": [{"entity": "Cat", "alias": "c"}],
                "select": ["c.id"],
                "orderBy": [{"expression": "c.id"}],
                "page": {"firstResult": 20, "maxResults": 10}
            }"#,
        )
        .unwrap();
        assert!(rendered.statement.sql.ends_with(" LIMIT 10 OFFSET 20"));
        let count = rendered.count.unwrap().sql;
        assert!(count.starts_with("SELECT COUNT("), "{count}");
    }

    #[test]
    fn page_needs_unique_order() {
        let error = render(
            "postgresql",
            r#"{
                "from": [{"entity": "Cat", "alias": "c"}],
                "orderBy": [{"expression": "c.age"}],
                "page": {"maxResults": 10, "countQuery": false}
            }"#,
        )
        .unwrap_err();
        assert!(matches!(error, CriteriaError::IllegalArgument(_)));
    }

    #[test]
    fn unknown_paths_are_rejected() {
        let error = render(
            "postgresql",
            r#"{"from": [{"entity": "Cat", "alias": "c"}], "select": ["c.colour"]}"#,
        )
        .unwrap_err();
        assert!(matches!(error, CriteriaError::PathResolution { .. }));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(QueryDescription::from_json(r#"{"from": [], "limit": 3}"#).is_err());
    }
}
