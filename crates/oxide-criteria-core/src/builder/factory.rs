use std::sync::Arc;

use tracing::info;

use super::context::BuilderContext;
use super::criteria::CriteriaBuilder;
use super::dml::{DeleteCriteriaBuilder, InsertCriteriaBuilder, UpdateCriteriaBuilder};
use crate::config::CriteriaConfig;
use crate::dialect::{DbmsDialect, DialectRegistry};
use crate::error::Result;
use crate::metamodel::EntityMetamodel;

/// Creates builders that share a configuration, a metamodel and a dialect.
#[derive(Clone)]
pub struct CriteriaBuilderFactory {
    config: Arc<CriteriaConfig>,
    metamodel: Arc<dyn EntityMetamodel>,
    dialect: Arc<dyn DbmsDialect>,
}

impl std::fmt::Debug for CriteriaBuilderFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CriteriaBuilderFactory")
            .field("config", &self.config)
            .field("dialect", &self.dialect.name())
            .finish_non_exhaustive()
    }
}

impl CriteriaBuilderFactory {
    /// Looks up the configured dialect in the standard registry.
    ///
    /// # Errors
    ///
    /// [`crate::error::CriteriaError::Configuration`] for unknown dialects.
    pub fn new(config: CriteriaConfig, metamodel: Arc<dyn EntityMetamodel>) -> Result<Self> {
        let dialect = DialectRegistry::standard().get(&config.dialect)?;
        info!(dialect = dialect.name(), "criteria builder factory created");
        Ok(Self {
            config: Arc::new(config),
            metamodel,
            dialect,
        })
    }

    /// Replaces the dialect, for dialects that are not registered.
    #[must_use]
    pub fn with_dialect(mut self, dialect: Arc<dyn DbmsDialect>) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn dialect(&self) -> &dyn DbmsDialect {
        self.dialect.as_ref()
    }

    #[must_use]
    pub fn config(&self) -> &CriteriaConfig {
        &self.config
    }

    fn context(&self) -> BuilderContext {
        BuilderContext::new(
            Arc::clone(&self.dialect),
            Arc::clone(&self.metamodel),
            Arc::clone(&self.config),
        )
    }

    /// Starts a select statement.
    #[must_use]
    pub fn create(&self) -> CriteriaBuilder {
        CriteriaBuilder::new(self.context())
    }

    /// Starts a DELETE of `entity`.
    ///
    /// # Errors
    ///
    /// Unknown entities.
    pub fn delete(&self, entity: &str, alias: &str) -> Result<DeleteCriteriaBuilder> {
        DeleteCriteriaBuilder::new(self.context(), entity, alias)
    }

    /// Starts an UPDATE of `entity`.
    ///
    /// # Errors
    ///
    /// Unknown entities.
    pub fn update(&self, entity: &str, alias: &str) -> Result<UpdateCriteriaBuilder> {
        UpdateCriteriaBuilder::new(self.context(), entity, alias)
    }

    /// Starts an INSERT into `entity` from a select.
    ///
    /// # Errors
    ///
    /// Unknown entities.
    pub fn insert(&self, entity: &str) -> Result<InsertCriteriaBuilder> {
        InsertCriteriaBuilder::new(self.context(), entity)
    }
}
