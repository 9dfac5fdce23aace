//! MySQL dialects.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, LateralStyle,
    UpdateJoinStyle, ValuesStrategy,
};
use crate::error::Result;

/// MySQL offsets need a row count; this is the largest one it accepts.
const MAX_ROWS: u64 = u64::MAX;

fn append_limit(sql: &mut String, limit: Option<u64>, offset: u64) {
    match (limit, offset) {
        (Some(limit), 0) => sql.push_str(&format!(" LIMIT {limit}")),
        (Some(limit), offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        (None, 0) => {}
        (None, offset) => sql.push_str(&format!(" LIMIT {MAX_ROWS} OFFSET {offset}")),
    }
}

/// MySQL 5.7.
///
/// No WITH clause and no window functions. Only UNION is native, so distinct
/// INTERSECT and EXCEPT are emulated by the renderer. NULL sorts first and
/// there is no `NULLS FIRST/LAST` syntax.
#[derive(Debug, Clone)]
pub struct MySqlDialect {
    functions: FunctionRegistry,
}

impl MySqlDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::GroupConcat),
        }
    }
}

impl Default for MySqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_with_clause(&self) -> bool {
        false
    }

    fn supports_window_functions(&self) -> bool {
        false
    }

    fn supports_null_precedence(&self) -> bool {
        false
    }

    fn is_null_smallest(&self) -> bool {
        true
    }

    fn supports_intersect(&self, _all: bool) -> bool {
        false
    }

    fn supports_except(&self, _all: bool) -> bool {
        false
    }

    fn supports_returning_all_generated_keys(&self) -> bool {
        false
    }

    fn needs_unique_select_item_names_also_when_table_column_aliasing(&self) -> bool {
        true
    }

    fn lateral_style(&self) -> LateralStyle {
        LateralStyle::None
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::From
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Reference
    }

    fn values_strategy(&self) -> ValuesStrategy {
        ValuesStrategy::SelectUnion
    }

    fn append_limit(
        &self,
        sql: &mut String,
        limit: Option<u64>,
        offset: u64,
        _has_order_by: bool,
    ) -> Result<()> {
        append_limit(sql, limit, offset);
        Ok(())
    }
}

/// MySQL 8 adds WITH, window functions, LATERAL and `VALUES ROW(...)`.
#[derive(Debug, Clone)]
pub struct MySql8Dialect {
    functions: FunctionRegistry,
}

impl MySql8Dialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::GroupConcat),
        }
    }
}

impl Default for MySql8Dialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for MySql8Dialect {
    fn name(&self) -> &'static str {
        "mysql8"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_null_precedence(&self) -> bool {
        false
    }

    fn is_null_smallest(&self) -> bool {
        true
    }

    fn supports_intersect(&self, _all: bool) -> bool {
        false
    }

    fn supports_except(&self, _all: bool) -> bool {
        false
    }

    fn supports_returning_all_generated_keys(&self) -> bool {
        false
    }

    fn needs_unique_select_item_names_also_when_table_column_aliasing(&self) -> bool {
        true
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::From
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Reference
    }

    fn values_strategy(&self) -> ValuesStrategy {
        ValuesStrategy::SelectValues
    }

    fn append_limit(
        &self,
        sql: &mut String,
        limit: Option<u64>,
        offset: u64,
        _has_order_by: bool,
    ) -> Result<()> {
        append_limit(sql, limit, offset);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SetOperator;
    use crate::error::CriteriaError;

    #[test]
    fn mysql_has_no_with_clause() {
        let dialect = MySqlDialect::new();
        for recursive in [true, false] {
            let err = dialect.get_with_clause(recursive).unwrap_err();
            assert!(matches!(
                err,
                CriteriaError::UnsupportedCapability { dialect: "mysql", .. }
            ));
        }
        assert_eq!(MySql8Dialect::new().get_with_clause(true).unwrap(), "WITH RECURSIVE");
    }

    #[test]
    fn only_union_is_native() {
        let dialect = MySqlDialect::new();
        assert_eq!(dialect.get_set_operator(SetOperator::UnionAll).unwrap(), "UNION ALL");
        assert!(dialect.get_set_operator(SetOperator::Intersect).is_err());
        assert!(dialect.get_set_operator(SetOperator::ExceptAll).is_err());
    }

    #[test]
    fn offset_without_limit() {
        let mut sql = String::from("SELECT 1");
        MySqlDialect::new()
            .append_limit(&mut sql, None, 5, true)
            .unwrap();
        assert_eq!(sql, "SELECT 1 LIMIT 18446744073709551615 OFFSET 5");
    }

    #[test]
    fn mysql8_capabilities() {
        let dialect = MySql8Dialect::new();
        assert!(dialect.supports_window_functions());
        assert_eq!(dialect.values_strategy(), ValuesStrategy::SelectValues);
        assert!(!MySqlDialect::new().supports_window_functions());
    }
}
