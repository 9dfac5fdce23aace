//! PostgreSQL and CockroachDB dialects.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, ParameterStyle,
    UpdateJoinStyle,
};

/// PostgreSQL.
///
/// Numbered `$n` parameters, RETURNING, data modifying CTEs, LATERAL, FILTER
/// and CTE materialization hints.
#[derive(Debug, Clone)]
pub struct PostgreSqlDialect {
    functions: FunctionRegistry,
}

impl PostgreSqlDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::StringAgg),
        }
    }
}

impl Default for PostgreSqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for PostgreSqlDialect {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_modification_query_in_with_clause(&self) -> bool {
        true
    }

    fn supports_returning_columns(&self) -> bool {
        true
    }

    fn supports_filter_clause(&self) -> bool {
        true
    }

    fn supports_cte_materialization(&self) -> bool {
        true
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::Using
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::From
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Dollar
    }
}

/// CockroachDB, which speaks the PostgreSQL wire dialect with fewer
/// extensions.
#[derive(Debug, Clone)]
pub struct CockroachDialect {
    functions: FunctionRegistry,
}

impl CockroachDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::StringAgg),
        }
    }
}

impl Default for CockroachDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for CockroachDialect {
    fn name(&self) -> &'static str {
        "cockroach"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_modification_query_in_with_clause(&self) -> bool {
        true
    }

    fn supports_returning_columns(&self) -> bool {
        true
    }

    fn supports_filter_clause(&self) -> bool {
        true
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::Using
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::From
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Dollar
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postgres_capabilities() {
        let dialect = PostgreSqlDialect::new();
        assert_eq!(dialect.name(), "postgresql");
        assert!(dialect.supports_returning_columns());
        assert!(dialect.supports_cte_materialization());
        assert!(dialect.supports_null_precedence());
        assert!(!dialect.is_null_smallest());
        assert_eq!(dialect.parameter_style().placeholder(2), "$2");
    }

    #[test]
    fn cockroach_has_no_materialization_hints() {
        let dialect = CockroachDialect::new();
        assert!(!dialect.supports_cte_materialization());
        assert_eq!(dialect.delete_join_style(), DeleteJoinStyle::Using);
    }
}
