//! Clause tags describing where an expression is attached.

use std::fmt;

/// The logical role of an expression's attachment point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClauseType {
    Select,
    Where,
    Having,
    OrderBy,
    GroupBy,
    Window,
    JoinOn,
    /// Binding of a CTE column.
    CteBinding,
    /// Assignment in an UPDATE statement.
    Set,
}

impl ClauseType {
    /// Returns the clause keyword.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "SELECT",
            Self::Where => "WHERE",
            Self::Having => "HAVING",
            Self::OrderBy => "ORDER BY",
            Self::GroupBy => "GROUP BY",
            Self::Window => "WINDOW",
            Self::JoinOn => "ON",
            Self::CteBinding => "CTE binding",
            Self::Set => "SET",
        }
    }

    /// Aggregate functions are evaluated after grouping, so they are rejected
    /// in clauses evaluated before it.
    #[must_use]
    pub const fn allows_aggregates(&self) -> bool {
        !matches!(self, Self::Where | Self::GroupBy | Self::JoinOn | Self::Set)
    }

    /// Window functions are only valid in the select list and ORDER BY.
    #[must_use]
    pub const fn allows_window_functions(&self) -> bool {
        matches!(self, Self::Select | Self::OrderBy | Self::CteBinding)
    }
}

impl fmt::Display for ClauseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregates_only_after_grouping() {
        assert!(!ClauseType::Where.allows_aggregates());
        assert!(!ClauseType::JoinOn.allows_aggregates());
        assert!(ClauseType::Having.allows_aggregates());
        assert!(ClauseType::Select.allows_aggregates());
    }

    #[test]
    fn window_functions_in_select_and_order_by() {
        assert!(ClauseType::Select.allows_window_functions());
        assert!(ClauseType::OrderBy.allows_window_functions());
        assert!(!ClauseType::Having.allows_window_functions());
        assert!(!ClauseType::Window.allows_window_functions());
    }
}
