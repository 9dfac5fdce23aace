//! Oracle dialect.

use super::{
    DbmsDialect, DeleteJoinStyle, FunctionRegistry, GroupConcatStyle, LimitStyle,
    StandardFunction, UpdateJoinStyle, ValuesStrategy,
};
use crate::ast::{SetOperator, ValueType};
use crate::error::{CriteriaError, Result};

/// Oracle 12c and later.
///
/// Recursive CTEs are written without the RECURSIVE keyword, EXCEPT is
/// spelled MINUS and there are no boolean literals. Inline rows select from
/// DUAL.
#[derive(Debug, Clone)]
pub struct OracleDialect {
    functions: FunctionRegistry,
}

impl OracleDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::ListAgg)
                .with(
                    StandardFunction::scalar("SUBSTRING", |_| ValueType::String)
                        .arity(2, Some(3))
                        .renamed("SUBSTR"),
                )
                .with(
                    StandardFunction::scalar("CONCAT", |_| ValueType::String)
                        .arity(1, None)
                        .infix("||"),
                ),
        }
    }
}

impl Default for OracleDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_with_clause_in_modification_query(&self) -> bool {
        false
    }

    fn supports_full_row_value_comparison(&self) -> bool {
        false
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

    fn delete_join_style(&self) -> DeleteJoinStyle {
        DeleteJoinStyle::Merge
    }

    fn update_join_style(&self) -> UpdateJoinStyle {
        UpdateJoinStyle::Merge
    }

    fn values_strategy(&self) -> ValuesStrategy {
        ValuesStrategy::SelectUnion
    }

    fn limit_style(&self) -> LimitStyle {
        LimitStyle::OffsetFetch
    }

    fn dummy_table(&self) -> Option<&'static str> {
        Some("DUAL")
    }

    fn get_with_clause(&self, _recursive: bool) -> Result<&'static str> {
        Ok("WITH")
    }

    fn get_set_operator(&self, operator: SetOperator) -> Result<&'static str> {
        match operator {
            SetOperator::Except => Ok("MINUS"),
            SetOperator::Union => Ok("UNION"),
            SetOperator::UnionAll => Ok("UNION ALL"),
            SetOperator::Intersect => Ok("INTERSECT"),
            SetOperator::IntersectAll | SetOperator::ExceptAll => {
                Err(CriteriaError::unsupported(operator.as_str(), self.name()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oracle_spelling() {
        let dialect = OracleDialect::new();
        assert_eq!(dialect.get_with_clause(true).unwrap(), "WITH");
        assert_eq!(dialect.get_set_operator(SetOperator::Except).unwrap(), "MINUS");
        assert!(dialect.get_set_operator(SetOperator::IntersectAll).is_err());
        assert_eq!(dialect.dummy_table(), Some("DUAL"));
        assert!(!dialect.supports_boolean_literals());
    }
}
