//! Lookup of dialects by product name.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use super::{
    CockroachDialect, Db2Dialect, DbmsDialect, DefaultDialect, H2Dialect, MsSqlDialect,
    MySql8Dialect, MySqlDialect, OracleDialect, PostgreSqlDialect, SqliteDialect,
};
use crate::error::{CriteriaError, Result};

/// Maps case-insensitive product identifiers to shared dialects.
#[derive(Clone, Default)]
pub struct DialectRegistry {
    dialects: BTreeMap<String, Arc<dyn DbmsDialect>>,
}

impl DialectRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All built-in dialects under their names and common aliases.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        let postgres: Arc<dyn DbmsDialect> = Arc::new(PostgreSqlDialect::new());
        let cockroach: Arc<dyn DbmsDialect> = Arc::new(CockroachDialect::new());
        let mysql: Arc<dyn DbmsDialect> = Arc::new(MySqlDialect::new());
        let mssql: Arc<dyn DbmsDialect> = Arc::new(MsSqlDialect::new());
        let generic: Arc<dyn DbmsDialect> = Arc::new(DefaultDialect::new());
        registry.register_shared(&["postgres", "postgresql"], &postgres);
        registry.register_shared(&["cockroach", "cockroachdb"], &cockroach);
        registry.register_shared(&["mysql", "mariadb"], &mysql);
        registry.register("mysql8", MySql8Dialect::new());
        registry.register("h2", H2Dialect::new());
        registry.register("oracle", OracleDialect::new());
        registry.register("db2", Db2Dialect::new());
        registry.register_shared(&["mssql", "sqlserver"], &mssql);
        registry.register("sqlite", SqliteDialect::new());
        registry.register_shared(&["generic", "default"], &generic);
        registry
    }

    /// Registers a dialect under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, dialect: impl DbmsDialect + 'static) {
        self.dialects
            .insert(name.to_ascii_lowercase(), Arc::new(dialect));
    }

    /// Registers one dialect instance under several names.
    pub fn register_shared(&mut self, names: &[&str], dialect: &Arc<dyn DbmsDialect>) {
        for name in names {
            self.dialects
                .insert(name.to_ascii_lowercase(), Arc::clone(dialect));
        }
    }

    /// Looks up a dialect.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::Configuration`] for an unknown name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DbmsDialect>> {
        let dialect = self
            .dialects
            .get(&name.trim().to_ascii_lowercase())
            .ok_or_else(|| {
                CriteriaError::Configuration(format!(
                    "unknown dialect '{name}', expected one of: {}",
                    self.names().collect::<Vec<_>>().join(", ")
                ))
            })?;
        debug!(requested = name, dialect = dialect.name(), "dialect selected");
        Ok(Arc::clone(dialect))
    }

    /// Registered names, including aliases, in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.dialects.keys().map(String::as_str)
    }

    /// Distinct dialects with the names they are registered under.
    #[must_use]
    pub fn dialects(&self) -> Vec<(Vec<&str>, Arc<dyn DbmsDialect>)> {
        let mut grouped: Vec<(Vec<&str>, Arc<dyn DbmsDialect>)> = Vec::new();
        for (name, dialect) in &self.dialects {
            match grouped.iter_mut().find(|(_, d)| Arc::ptr_eq(d, dialect)) {
                Some((names, _)) => names.push(name.as_str()),
                None => grouped.push((vec![name.as_str()], Arc::clone(dialect))),
            }
        }
        grouped
    }
}

impl std::fmt::Debug for DialectRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.dialects.keys()).finish()
    }
}
