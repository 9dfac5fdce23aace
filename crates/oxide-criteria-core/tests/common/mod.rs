#![allow(dead_code)]

use std::sync::Arc;

use duckdb::types::Value;
use duckdb::Connection;
use oxide_criteria_core::ast::ValueType;
use oxide_criteria_core::builder::CriteriaBuilderFactory;
use oxide_criteria_core::dialect::DbmsDialect;
use oxide_criteria_core::metamodel::{AttributeMetadata, EntityMetadata, StaticMetamodel};
use oxide_criteria_core::{CriteriaConfig, CriteriaError, Row, SqlStatement, SqlValue, StatementExecutor};

/// Cats owned by people.
pub fn metamodel() -> StaticMetamodel {
    StaticMetamodel::new()
        .with_entity(
            EntityMetadata::new("Cat", "cat")
                .attribute(AttributeMetadata::basic("name", ValueType::String).non_null())
                .attribute(AttributeMetadata::basic("age", ValueType::Integer))
                .attribute(AttributeMetadata::basic("weight", ValueType::Double))
                .attribute(AttributeMetadata::many_to_one("owner", "Person", "owner_id")),
        )
        .with_entity(
            EntityMetadata::new("Person", "person")
                .attribute(AttributeMetadata::basic("name", ValueType::String).non_null())
                .attribute(AttributeMetadata::one_to_many("cats", "Cat", "owner")),
        )
}

pub fn factory(dialect: &str) -> CriteriaBuilderFactory {
    CriteriaBuilderFactory::new(CriteriaConfig::for_dialect(dialect), Arc::new(metamodel()))
        .unwrap_or_else(|e| panic!("Failed to create factory for {dialect}: {e}"))
}

pub fn factory_with(config: CriteriaConfig) -> CriteriaBuilderFactory {
    CriteriaBuilderFactory::new(config, Arc::new(metamodel())).unwrap()
}

pub fn factory_for(dialect: impl DbmsDialect + 'static) -> CriteriaBuilderFactory {
    factory("generic").with_dialect(Arc::new(dialect))
}

const SCHEMA: &str = "
CREATE TABLE person (id BIGINT PRIMARY KEY, name VARCHAR NOT NULL);
CREATE TABLE cat (
    id BIGINT PRIMARY KEY,
    name VARCHAR NOT NULL,
    age INTEGER,
    weight DOUBLE,
    owner_id BIGINT
);
";

/// An in-memory DuckDB database with the cat schema.
pub struct DuckDb {
    connection: Connection,
}

impl DuckDb {
    pub fn new() -> Self {
        let connection = Connection::open_in_memory().unwrap();
        connection.execute_batch(SCHEMA).unwrap();
        Self { connection }
    }

    pub fn execute_batch(&self, sql: &str) {
        self.connection
            .execute_batch(sql)
            .unwrap_or_else(|e| panic!("Failed to execute: {sql}\nError: {e}"));
    }

    /// Inserts `count` cats. Ages repeat so ORDER BY age needs the id as a
    /// tie breaker, and every seventh cat has no age.
    pub fn with_cats(self, count: i64) -> Self {
        let mut sql = String::from("INSERT INTO person VALUES (1, 'Ann'), (2, 'Bob');");
        for id in 1..=count {
            let age = if id % 7 == 0 {
                String::from("NULL")
            } else {
                (id % 5).to_string()
            };
            sql.push_str(&format!(
                "INSERT INTO cat VALUES ({id}, 'cat {id}', {age}, {}.5, {});",
                id % 3,
                id % 2 + 1
            ));
        }
        self.execute_batch(&sql);
        self
    }
}

fn to_duckdb(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Bool(b) => Value::Boolean(*b),
        SqlValue::Int(i) => Value::BigInt(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

fn from_duckdb(value: Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Boolean(b) => SqlValue::Bool(b),
        Value::TinyInt(i) => SqlValue::Int(i64::from(i)),
        Value::SmallInt(i) => SqlValue::Int(i64::from(i)),
        Value::Int(i) => SqlValue::Int(i64::from(i)),
        Value::BigInt(i) => SqlValue::Int(i),
        Value::UTinyInt(i) => SqlValue::Int(i64::from(i)),
        Value::USmallInt(i) => SqlValue::Int(i64::from(i)),
        Value::UInt(i) => SqlValue::Int(i64::from(i)),
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(f) => SqlValue::Float(f),
        Value::Text(s) => SqlValue::Text(s),
        Value::Blob(b) => SqlValue::Blob(b),
        other => SqlValue::Text(format!("{other:?}")),
    }
}

impl StatementExecutor for DuckDb {
    fn query(&self, statement: &SqlStatement) -> oxide_criteria_core::Result<Vec<Row>> {
        let mut prepared = self
            .connection
            .prepare(&statement.sql)
            .map_err(CriteriaError::execution)?;
        let parameters: Vec<Value> = statement.parameters.iter().map(to_duckdb).collect();
        let mut rows = prepared
            .query(duckdb::params_from_iter(parameters))
            .map_err(CriteriaError::execution)?;
        let mut result = Vec::new();
        while let Some(row) = rows.next().map_err(CriteriaError::execution)? {
            let mut values = Vec::with_capacity(statement.column_count);
            for i in 0..statement.column_count {
                let value: Value = row.get(i).map_err(CriteriaError::execution)?;
                values.push(from_duckdb(value));
            }
            result.push(values);
        }
        Ok(result)
    }
}

/// The integer in column `index` of every row.
pub fn ints(rows: &[Row], index: usize) -> Vec<Option<i64>> {
    rows.iter()
        .map(|row| match &row[index] {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Null => None,
            other => panic!("Expected an integer, got {other:?}"),
        })
        .collect()
}
