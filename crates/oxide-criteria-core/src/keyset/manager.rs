use tracing::debug;

use super::{KeysetLink, KeysetMode};
use crate::ast::{
    BooleanOperator, ComparisonOperator, CompoundPredicate, Expression, OrderByExpression,
    Predicate,
};
use crate::dialect::DbmsDialect;
use crate::error::Result;
use crate::value::SqlValue;

/// Outcome of comparing one column against its keyset value.
enum Bound {
    /// Every row passes.
    Always,
    /// No row passes.
    Never,
    When(Predicate),
}

/// Builds keyset restrictions.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeysetManager;

impl KeysetManager {
    /// The predicate selecting the rows on the requested side of the keyset.
    ///
    /// `order_by` is the query's ORDER BY as declared; for
    /// [`KeysetMode::Previous`] the caller also renders it reversed. The
    /// row-value form `(a, b) > (?, ?)` is used when `optimized` is set, the
    /// dialect supports it, all items share one direction and neither the
    /// items nor the values can be NULL. Otherwise the predicate is the
    /// expanded `a > ? OR (a = ? AND b > ?)` form.
    ///
    /// # Errors
    ///
    /// Fails when the keyset does not match `order_by`, before anything is
    /// rendered.
    pub fn keyset_predicate(
        order_by: &[OrderByExpression],
        link: &KeysetLink,
        dialect: &dyn DbmsDialect,
        optimized: bool,
    ) -> Result<Predicate> {
        link.validate(order_by)?;
        let effective: Vec<OrderByExpression> = match link.mode() {
            KeysetMode::Previous => order_by.iter().map(OrderByExpression::reversed).collect(),
            KeysetMode::Next | KeysetMode::Same => order_by.to_vec(),
        };
        let inclusive = link.mode() == KeysetMode::Same;
        let values = link.keyset().values();

        let uniform = effective
            .windows(2)
            .all(|pair| pair[0].ascending == pair[1].ascending);
        let has_nulls = effective.iter().any(|item| item.nullable)
            || values.iter().any(SqlValue::is_null);
        if optimized && dialect.supports_full_row_value_comparison() && uniform && !has_nulls {
            return Ok(Self::row_value(&effective, values, inclusive));
        }
        if optimized && dialect.supports_full_row_value_comparison() {
            debug!(
                dialect = dialect.name(),
                "expanding keyset predicate, row values do not apply"
            );
        }
        Ok(Self::expanded(&effective, values, inclusive))
    }

    fn row_value(order_by: &[OrderByExpression], values: &[SqlValue], inclusive: bool) -> Predicate {
        let ascending = order_by.iter().all(|item| item.ascending);
        let operator = comparison(ascending, inclusive);
        let left = order_by.iter().map(|item| item.expression.clone()).collect();
        let right = values.iter().cloned().map(Expression::Value).collect();
        Predicate::compare(Expression::Tuple(left), operator, Expression::Tuple(right))
    }

    fn expanded(order_by: &[OrderByExpression], values: &[SqlValue], inclusive: bool) -> Predicate {
        let mut branches = Vec::with_capacity(order_by.len());
        let mut prefix: Vec<Predicate> = Vec::with_capacity(order_by.len());
        for (i, (item, value)) in order_by.iter().zip(values).enumerate() {
            let last = i + 1 == order_by.len();
            let mut branch = prefix.clone();
            match after(item, value, inclusive && last) {
                Bound::Never => {}
                Bound::Always => branches.push(conjunction(branch)),
                Bound::When(predicate) => {
                    branch.push(predicate);
                    branches.push(conjunction(branch));
                }
            }
            prefix.push(if value.is_null() {
                Predicate::is_null(item.expression.clone())
            } else {
                Predicate::eq(item.expression.clone(), Expression::Value(value.clone()))
            });
        }
        match branches.len() {
            0 => Predicate::never(),
            1 => branches.remove(0),
            _ => Predicate::Compound(CompoundPredicate::with_children(
                BooleanOperator::Or,
                branches,
            )),
        }
    }
}

const fn comparison(ascending: bool, inclusive: bool) -> ComparisonOperator {
    match (ascending, inclusive) {
        (true, false) => ComparisonOperator::Gt,
        (true, true) => ComparisonOperator::Ge,
        (false, false) => ComparisonOperator::Lt,
        (false, true) => ComparisonOperator::Le,
    }
}

fn conjunction(mut predicates: Vec<Predicate>) -> Predicate {
    if predicates.len() == 1 {
        return predicates.remove(0);
    }
    Predicate::Compound(CompoundPredicate::with_children(
        BooleanOperator::And,
        predicates,
    ))
}

/// Rows sorting after `value` in the item's order, or at it when inclusive.
fn after(item: &OrderByExpression, value: &SqlValue, inclusive: bool) -> Bound {
    let expression = item.expression.clone();
    if value.is_null() {
        return match (item.nulls_first, inclusive) {
            (true, false) => Bound::When(Predicate::is_not_null(expression)),
            (true, true) => Bound::Always,
            (false, false) => Bound::Never,
            (false, true) => Bound::When(Predicate::is_null(expression)),
        };
    }
    let compared = Predicate::compare(
        expression.clone(),
        comparison(item.ascending, inclusive),
        Expression::Value(value.clone()),
    );
    if item.nullable && !item.nulls_first {
        Bound::When(compared.or(Predicate::is_null(expression)))
    } else {
        Bound::When(compared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MsSqlDialect, PostgreSqlDialect};
    use crate::error::CriteriaError;
    use crate::keyset::Keyset;

    fn item(path: &str, ascending: bool) -> OrderByExpression {
        OrderByExpression::new(Expression::path(path), ascending, false).non_null()
    }

    fn link(values: Vec<SqlValue>, mode: KeysetMode) -> KeysetLink {
        KeysetLink::new(Keyset::new(values), mode)
    }

    #[test]
    fn expanded_next() {
        let order_by = [item("age", true), item("id", true).unique()];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Int(30), SqlValue::Int(5)], KeysetMode::Next),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(predicate.to_string(), "age > 30 OR (age = 30 AND id > 5)");
    }

    #[test]
    fn row_value_when_supported() {
        let order_by = [item("age", true), item("id", true).unique()];
        let keyset = link(vec![SqlValue::Int(30), SqlValue::Int(5)], KeysetMode::Next);
        let dialect = PostgreSqlDialect::new();
        let predicate = KeysetManager::keyset_predicate(&order_by, &keyset, &dialect, true).unwrap();
        assert_eq!(predicate.to_string(), "(age, id) > (30, 5)");

        let predicate = KeysetManager::keyset_predicate(&order_by, &keyset, &dialect, false).unwrap();
        assert_eq!(predicate.to_string(), "age > 30 OR (age = 30 AND id > 5)");
    }

    #[test]
    fn mixed_directions_expand() {
        let order_by = [item("age", false), item("id", true).unique()];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Int(30), SqlValue::Int(5)], KeysetMode::Next),
            &PostgreSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(predicate.to_string(), "age < 30 OR (age = 30 AND id > 5)");
    }

    #[test]
    fn previous_flips_comparisons() {
        let order_by = [item("age", true), item("id", true).unique()];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Int(30), SqlValue::Int(5)], KeysetMode::Previous),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(predicate.to_string(), "age < 30 OR (age = 30 AND id < 5)");
    }

    #[test]
    fn same_is_inclusive_on_last_item() {
        let order_by = [item("age", true), item("id", true).unique()];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Int(30), SqlValue::Int(5)], KeysetMode::Same),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(predicate.to_string(), "age > 30 OR (age = 30 AND id >= 5)");
    }

    #[test]
    fn nullable_items() {
        let nullable = OrderByExpression::new(Expression::path("name"), true, false);
        let order_by = [nullable.clone(), item("id", true).unique()];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Text(String::from("b")), SqlValue::Int(5)], KeysetMode::Next),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(
            predicate.to_string(),
            "name > 'b' OR name IS NULL OR (name = 'b' AND id > 5)"
        );

        // nulls last: nothing sorts after NULL except larger ids among NULLs
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Null, SqlValue::Int(5)], KeysetMode::Next),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(predicate.to_string(), "name IS NULL AND id > 5");

        let order_by = [
            OrderByExpression::new(Expression::path("name"), true, true),
            item("id", true).unique(),
        ];
        let predicate = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Null, SqlValue::Int(5)], KeysetMode::Next),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap();
        assert_eq!(
            predicate.to_string(),
            "name IS NOT NULL OR (name IS NULL AND id > 5)"
        );
    }

    #[test]
    fn arity_is_checked_first() {
        let order_by = [item("age", true), item("id", true).unique()];
        let err = KeysetManager::keyset_predicate(
            &order_by,
            &link(vec![SqlValue::Int(30)], KeysetMode::Next),
            &MsSqlDialect::new(),
            true,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            CriteriaError::KeysetArityMismatch {
                expected: 2,
                found: 1
            }
        ));
    }
}
