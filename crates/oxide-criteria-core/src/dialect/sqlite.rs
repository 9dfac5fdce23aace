//! SQLite dialect.

use super::{
    DbmsDialect, FunctionRegistry, GroupConcatStyle, LateralStyle, ParameterStyle,
    StandardFunction, UpdateJoinStyle, ValuesStrategy,
};
use crate::ast::ValueType;
use crate::error::Result;

/// SQLite 3.35 and later.
#[derive(Debug, Clone)]
pub struct SqliteDialect {
    functions: FunctionRegistry,
}

impl SqliteDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::GroupConcatSeparatorArgument)
                .with(
                    StandardFunction::scalar("SUBSTRING", |_| ValueType::String)
                        .arity(2, Some(3))
                        .renamed("SUBSTR"),
                )
                .with(
                    StandardFunction::scalar("CONCAT", |_| ValueType::String)
                        .arity(1, None)
                        .infix("||"),
                )
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

impl Default for SqliteDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
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

    fn supports_returning_columns(&self) -> bool {
        true
    }

    fn supports_filter_clause(&self) -> bool {
        true
    }

    fn lateral_style(&self) -> LateralStyle {
        LateralStyle::None
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::From
    }

    fn values_strategy(&self) -> ValuesStrategy {
        ValuesStrategy::SelectUnion
    }

    fn parameter_style(&self) -> ParameterStyle {
        ParameterStyle::Numbered
    }

    fn append_limit(
        &self,
        sql: &mut String,
        limit: Option<u64>,
        offset: u64,
        _has_order_by: bool,
    ) -> Result<()> {
        match limit {
            Some(limit) => sql.push_str(&format!(" LIMIT {limit}")),
            None if offset > 0 => sql.push_str(" LIMIT -1"),
            None => {}
        }
        if offset > 0 {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_needs_limit() {
        let mut sql = String::from("SELECT 1");
        SqliteDialect::new()
            .append_limit(&mut sql, None, 10, false)
            .unwrap();
        assert_eq!(sql, "SELECT 1 LIMIT -1 OFFSET 10");
    }

    #[test]
    fn numbered_parameters() {
        assert_eq!(SqliteDialect::new().parameter_style().placeholder(4), "?4");
    }
}
