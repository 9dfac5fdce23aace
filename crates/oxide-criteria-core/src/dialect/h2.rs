//! H2 dialect.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, LateralStyle,
    UpdateJoinStyle,
};

/// H2 in its native mode.
#[derive(Debug, Clone)]
pub struct H2Dialect {
    functions: FunctionRegistry,
}

impl H2Dialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::GroupConcat),
        }
    }
}

impl Default for H2Dialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for H2Dialect {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_with_clause_in_modification_query(&self) -> bool {
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

    fn supports_filter_clause(&self) -> bool {
        true
    }

    fn lateral_style(&self) -> LateralStyle {
        LateralStyle::None
    }

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::Merge
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Merge
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::SetOperator;

    #[test]
    fn h2_capabilities() {
        let dialect = H2Dialect::new();
        assert!(dialect.is_null_smallest());
        assert!(dialect.supports_null_precedence());
        assert_eq!(dialect.get_set_operator(SetOperator::Except).unwrap(), "EXCEPT");
        assert!(dialect.get_set_operator(SetOperator::ExceptAll).is_err());
    }
}
