//! Keyset pagination.
//!
//! A keyset is the tuple of ORDER BY values of a boundary row. Paging by
//! keyset replaces OFFSET with a predicate selecting the rows after (or
//! before) that tuple, which stays stable under concurrent inserts and does
//! not scan skipped rows.

mod manager;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ast::OrderByExpression;
use crate::error::{CriteriaError, Result};
use crate::value::SqlValue;

pub use manager::KeysetManager;

/// The ORDER BY values of one row.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Keyset(Vec<SqlValue>);

impl Keyset {
    #[must_use]
    pub const fn new(values: Vec<SqlValue>) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn values(&self) -> &[SqlValue] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_values(self) -> Vec<SqlValue> {
        self.0
    }
}

impl From<Vec<SqlValue>> for Keyset {
    fn from(values: Vec<SqlValue>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Keyset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values = self
            .0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({values})")
    }
}

/// Direction of a keyset request relative to its keyset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeysetMode {
    /// Rows strictly after the keyset.
    Next,
    /// Rows strictly before the keyset.
    Previous,
    /// Rows starting at the keyset, inclusive.
    Same,
}

/// A keyset bound to the direction it is used in.
#[derive(Debug, Clone, PartialEq)]
pub struct KeysetLink {
    keyset: Keyset,
    mode: KeysetMode,
}

impl KeysetLink {
    #[must_use]
    pub const fn new(keyset: Keyset, mode: KeysetMode) -> Self {
        Self { keyset, mode }
    }

    #[must_use]
    pub const fn keyset(&self) -> &Keyset {
        &self.keyset
    }

    #[must_use]
    pub const fn mode(&self) -> KeysetMode {
        self.mode
    }

    /// Checks the keyset against the ORDER BY it will be compared with.
    ///
    /// # Errors
    ///
    /// [`CriteriaError::KeysetArityMismatch`] when the number of values
    /// differs from the number of ORDER BY items, and
    /// [`CriteriaError::IllegalArgument`] when a value cannot be compared
    /// with its item's type.
    pub fn validate(&self, order_by: &[OrderByExpression]) -> Result<()> {
        if self.keyset.len() != order_by.len() {
            return Err(CriteriaError::KeysetArityMismatch {
                expected: order_by.len(),
                found: self.keyset.len(),
            });
        }
        for (value, item) in self.keyset.values().iter().zip(order_by) {
            if !item.result_type.accepts(value) {
                return Err(CriteriaError::illegal_argument(format!(
                    "keyset value {value} of type {} does not match the type {} of order by item {}",
                    value.type_name(),
                    item.result_type,
                    item.expression
                )));
            }
        }
        Ok(())
    }
}

/// Identity of an ORDER BY, used to tell whether a keyset page still applies
/// to a query.
#[must_use]
pub fn order_by_identity(order_by: &[OrderByExpression]) -> Vec<String> {
    order_by.iter().map(ToString::to_string).collect()
}

/// Position and boundary keysets of a page that was read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeysetPage {
    pub first_result: u64,
    pub max_results: u64,
    pub lowest: Keyset,
    pub highest: Keyset,
    /// The ORDER BY the keysets were extracted under.
    pub order_by: Vec<String>,
}

impl KeysetPage {
    /// Derives the link for reading the page at `first_result` from this one.
    ///
    /// Adjacent pages of the same size and the page itself can be read by
    /// keyset. Anything else, including a changed ORDER BY, has no link and
    /// falls back to OFFSET paging.
    #[must_use]
    pub fn link(
        &self,
        first_result: u64,
        max_results: u64,
        order_by: &[OrderByExpression],
    ) -> Option<KeysetLink> {
        if self.order_by != order_by_identity(order_by) || self.lowest.is_empty() {
            return None;
        }
        if first_result == self.first_result {
            Some(KeysetLink::new(self.lowest.clone(), KeysetMode::Same))
        } else if first_result == self.first_result.saturating_add(self.max_results) {
            Some(KeysetLink::new(self.highest.clone(), KeysetMode::Next))
        } else if first_result.checked_add(max_results) == Some(self.first_result) {
            Some(KeysetLink::new(self.lowest.clone(), KeysetMode::Previous))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Expression, ValueType};

    fn order_by() -> Vec<OrderByExpression> {
        vec![
            OrderByExpression::new(Expression::path("c.age"), true, false),
            OrderByExpression::new(Expression::path("c.id"), true, false)
                .non_null()
                .unique(),
        ]
    }

    fn page() -> KeysetPage {
        KeysetPage {
            first_result: 10,
            max_results: 10,
            lowest: Keyset::new(vec![SqlValue::Int(3), SqlValue::Int(11)]),
            highest: Keyset::new(vec![SqlValue::Int(7), SqlValue::Int(20)]),
            order_by: order_by_identity(&order_by()),
        }
    }

    #[test]
    fn link_follows_requested_position() {
        let order_by = order_by();
        let next = page().link(20, 10, &order_by).unwrap();
        assert_eq!(next.mode(), KeysetMode::Next);
        assert_eq!(next.keyset(), &page().highest);

        let previous = page().link(0, 10, &order_by).unwrap();
        assert_eq!(previous.mode(), KeysetMode::Previous);
        assert_eq!(previous.keyset(), &page().lowest);

        assert_eq!(page().link(10, 10, &order_by).unwrap().mode(), KeysetMode::Same);
        assert!(page().link(40, 10, &order_by).is_none());
    }

    #[test]
    fn changed_order_by_has_no_link() {
        let mut order_by = order_by();
        order_by[0] = order_by[0].reversed();
        assert!(page().link(20, 10, &order_by).is_none());
    }

    #[test]
    fn validate_checks_arity_and_types() {
        let mut order_by = order_by();
        let link = KeysetLink::new(Keyset::new(vec![SqlValue::Int(1)]), KeysetMode::Next);
        assert!(matches!(
            link.validate(&order_by),
            Err(CriteriaError::KeysetArityMismatch {
                expected: 2,
                found: 1
            })
        ));

        order_by[1].result_type = ValueType::Long;
        let link = KeysetLink::new(
            Keyset::new(vec![SqlValue::Null, SqlValue::Text(String::from("x"))]),
            KeysetMode::Next,
        );
        assert!(matches!(
            link.validate(&order_by),
            Err(CriteriaError::IllegalArgument(_))
        ));
    }

    #[test]
    fn keyset_page_serializes_as_cursor() {
        let json = serde_json::to_string(&page()).unwrap();
        assert!(json.contains(r#""firstResult":10"#));
        assert!(json.contains(r#""lowest":[3,11]"#));
        let back: KeysetPage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, page());
    }
}
