//! Generic SQL dialect.

use super::{DbmsDialect, FunctionRegistry, GroupConcatStyle};

/// A dialect following standard SQL, with every capability that has a
/// standard spelling.
#[derive(Debug, Clone)]
pub struct DefaultDialect {
    functions: FunctionRegistry,
}

impl DefaultDialect {
    #[must_use]
    pub fn new() -> Self {
        Self {
            functions: FunctionRegistry::standard(GroupConcatStyle::ListAgg),
        }
    }
}

impl Default for DefaultDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl DbmsDialect for DefaultDialect {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{LimitStyle, ParameterStyle};

    #[test]
    fn test_generic_dialect() {
        let dialect = DefaultDialect::new();
        assert_eq!(dialect.name(), "generic");
        assert_eq!(dialect.parameter_style(), ParameterStyle::Question);
        assert_eq!(dialect.limit_style(), LimitStyle::LimitOffset);
        assert_eq!(dialect.get_with_clause(true).unwrap(), "WITH RECURSIVE");
        assert!(!dialect.supports_returning_columns());
        assert!(dialect.supports_full_row_value_comparison());
    }
}
