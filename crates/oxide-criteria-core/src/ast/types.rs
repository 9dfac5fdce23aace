//! Value types used for path resolution and function return type inference.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::SqlValue;

/// The declared type of an attribute or expression result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// 32-bit integer.
    Integer,
    /// 64-bit integer.
    Long,
    /// Double precision floating point.
    Double,
    /// Exact decimal.
    Decimal,
    /// Character data.
    String,
    /// Boolean.
    Boolean,
    /// Calendar date.
    Date,
    /// Time of day.
    Time,
    /// Date and time.
    Timestamp,
    /// Binary data.
    Binary,
    /// Reference to an entity, by entity name.
    Entity(String),
    /// Type could not be inferred.
    #[default]
    Unknown,
}

impl ValueType {
    /// Returns true for integral and fractional numeric types.
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Integer | Self::Long | Self::Double | Self::Decimal
        )
    }

    /// Returns true when `value` can be bound against an expression of this type.
    ///
    /// NULL is accepted everywhere. Temporal types accept text and integer
    /// representations because values are passed through to the driver.
    #[must_use]
    pub fn accepts(&self, value: &SqlValue) -> bool {
        match (self, value) {
            (_, SqlValue::Null) | (Self::Unknown, _) => true,
            (Self::Integer | Self::Long, SqlValue::Int(_)) => true,
            (Self::Double | Self::Decimal, SqlValue::Int(_) | SqlValue::Float(_)) => true,
            (Self::String, SqlValue::Text(_)) => true,
            (Self::Boolean, SqlValue::Bool(_)) => true,
            (Self::Date | Self::Time | Self::Timestamp, SqlValue::Text(_) | SqlValue::Int(_)) => {
                true
            }
            (Self::Binary, SqlValue::Blob(_)) => true,
            // Entity references are compared through their id.
            (Self::Entity(_), SqlValue::Int(_) | SqlValue::Text(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => f.write_str("Integer"),
            Self::Long => f.write_str("Long"),
            Self::Double => f.write_str("Double"),
            Self::Decimal => f.write_str("Decimal"),
            Self::String => f.write_str("String"),
            Self::Boolean => f.write_str("Boolean"),
            Self::Date => f.write_str("Date"),
            Self::Time => f.write_str("Time"),
            Self::Timestamp => f.write_str("Timestamp"),
            Self::Binary => f.write_str("Binary"),
            Self::Entity(name) => f.write_str(name),
            Self::Unknown => f.write_str("Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts() {
        assert!(ValueType::Long.accepts(&SqlValue::Int(3)));
        assert!(ValueType::Double.accepts(&SqlValue::Int(3)));
        assert!(ValueType::String.accepts(&SqlValue::Null));
        assert!(!ValueType::Long.accepts(&SqlValue::Text(String::from("3"))));
        assert!(!ValueType::Boolean.accepts(&SqlValue::Int(1)));
    }

    #[test]
    fn test_serde_names() {
        let ty: ValueType = serde_json::from_str(r#""long""#).unwrap();
        assert_eq!(ty, ValueType::Long);
        let entity: ValueType = serde_json::from_str(r#"{"entity":"Person"}"#).unwrap();
        assert_eq!(entity, ValueType::Entity(String::from("Person")));
    }
}
