//! Microsoft SQL Server dialect.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, LateralStyle, LimitStyle,
    StandardFunction, UpdateJoinStyle,
};
use crate::ast::ValueType;
use crate::error::Result;

/// SQL Server 2017 and later.
///
/// OFFSET/FETCH needs an ORDER BY, lateral joins use APPLY, recursive CTEs
/// have no RECURSIVE keyword and NULL sorts first without `NULLS` syntax.
#[derive(Debug, Clone)]
pub struct MsSqlDialect {
    functions: FunctionRegistry,
}

impl MsSqlDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::StringAggWithinGroup)
                .with(StandardFunction::scalar("LENGTH", |_| ValueType::Integer).renamed("LEN"))
                .with(
                    StandardFunction::scalar("MOD", |types| {
                        types.first().cloned().unwrap_or_default()
                    })
                    .arity(2, Some(2))
                    .infix("%"),
                ),
        }
    }
}

impl Default for MsSqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for MsSqlDialect {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_full_row_value_comparison(&self) -> bool {
        false
    }

    fn supports_null_precedence(&self) -> bool {
        false
    }

    fn is_null_smallest(&self) -> bool {
        true
    }

    fn supports_intersect(&self, all: bool) -> bool {
        !all
    }

    fn supports_except(&self, all: bool) -> bool {
        !all
    }

    fn supports_boolean_literals(&self) -> bool {
        false
    }

    fn requires_order_by_for_offset(&self) -> bool {
        true
    }

    fn lateral_style(&self) -> LateralStyle {
        LateralStyle::Apply
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::From
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Merge
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch
    }

    fn get_with_clause(&self, _recursive: bool) -> Result<&'static str> {
        Ok("WITH")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mssql_capabilities() {
        let dialect = MsSqlDialect::new();
        assert!(!dialect.supports_full_row_value_comparison());
        assert!(dialect.requires_order_by_for_offset());
        assert_eq!(dialect.lateral_style(), LateralStyle::Apply);
        assert_eq!(dialect.get_with_clause(true).unwrap(), "WITH");
        assert!(dialect.functions().get("LENGTH").is_some());
    }
}
