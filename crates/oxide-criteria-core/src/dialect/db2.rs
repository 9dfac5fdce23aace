//! DB2 dialect.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, LimitStyle,
    StandardFunction, UpdateJoinStyle,
};
use crate::ast::ValueType;
use crate::error::Result;

/// DB2 for Linux, Unix and Windows.
///
/// Paging is emulated with a `ROW_NUMBER()` wrapper.
#[derive(Debug, Clone)]
pub struct Db2Dialect {
    functions: FunctionRegistry,
}

impl Db2Dialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::ListAgg).with(
                StandardFunction::scalar("CONCAT", |_| ValueType::String)
                    .arity(1, None)
                    .infix("||"),
            ),
        }
    }
}

impl Default for Db2Dialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for Db2Dialect {
    fn name(&self) -> &'static str {
        "db2"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_with_clause_in_modification_query(&self) -> bool {
        false
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::Merge
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Merge
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::RowNumber
    }

    fn dummy_table(&self) -> Option<&'static str> {
        Some("SYSIBM.SYSDUMMY1")
    }

    fn get_with_clause(&self, _recursive: bool) -> Result<&'static str> {
        Ok("WITH")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db2_pages_with_row_number() {
        let dialect = Db2Dialect::new();
        assert_eq!(dialect.limit_style(), LimitStyle::RowNumber);
        assert_eq!(dialect.get_with_clause(true).unwrap(), "WITH");
        assert!(dialect.supports_intersect(true));
    }
}
