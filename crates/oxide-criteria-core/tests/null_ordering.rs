mod common;

use common::{factory, factory_for, ints, DuckDb};
use oxide_criteria_core::builder::{CriteriaBuilderFactory, QueryBuilder};
use oxide_criteria_core::dialect::{DbmsDialect, FunctionRegistry, GroupConcatStyle};

/// A dialect that cannot write NULLS FIRST or NULLS LAST.
struct NoNullPrecedence {
    null_smallest: bool,
    functions: FunctionRegistry,
}

impl NoNullPrecedence {
    fn new(null_smallest: bool) -> Self {
        Self {
            null_smallest,
            functions: FunctionRegistry::standard(GroupConcatStyle::StringAgg),
        }
    }
}

impl DbmsDialect for NoNullPrecedence {
    fn name(&self) -> &'static str {
        "no-null-precedence"
    }

    fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    fn supports_null_precedence(&self) -> bool {
        false
    }

    fn is_null_smallest(&self) -> bool {
        self.null_smallest
    }
}

/// DuckDB configured to sort NULLs the way the dialect claims.
fn database(null_smallest: bool) -> DuckDb {
    let db = DuckDb::new().with_cats(30);
    db.execute_batch(if null_smallest {
        "SET default_null_order = 'nulls_first_on_asc_last_on_desc';"
    } else {
        "SET default_null_order = 'nulls_last_on_asc_first_on_desc';"
    });
    db
}

fn sql_and_ids(
    factory: &CriteriaBuilderFactory,
    db: &DuckDb,
    ascending: bool,
    nulls_first: bool,
) -> (String, Vec<Option<i64>>) {
    let mut cb = factory.create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.id").unwrap();
    cb.order_by("c.age", ascending, nulls_first).unwrap();
    cb.order_by_asc("c.id").unwrap();
    let sql = cb.render().unwrap().sql;
    (sql, ints(&cb.get_result_list(db).unwrap(), 0))
}

const ORDERS: [(bool, bool); 4] = [(true, false), (true, true), (false, false), (false, true)];

fn assert_same_order(null_smallest: bool) {
    let db = database(null_smallest);
    let native = factory("postgresql");
    let emulated = factory_for(NoNullPrecedence::new(null_smallest));
    for (ascending, nulls_first) in ORDERS {
        let (native_sql, expected) = sql_and_ids(&native, &db, ascending, nulls_first);
        let (sql, ids) = sql_and_ids(&emulated, &db, ascending, nulls_first);

        assert!(native_sql.contains(" NULLS "), "{native_sql}");
        assert!(!sql.contains(" NULLS "), "{sql}");
        let natural = null_smallest == ascending;
        assert_eq!(
            sql.contains("CASE WHEN c.age IS NULL"),
            nulls_first != natural,
            "Unexpected sort key in {sql}"
        );
        assert_eq!(
            ids, expected,
            "ascending={ascending} nulls_first={nulls_first} null_smallest={null_smallest}"
        );

        let nulls = ids.iter().take(4).all(|id| id.is_some_and(|id| id % 7 == 0));
        assert_eq!(nulls, nulls_first, "NULL ages are not where requested: {ids:?}");
    }
}

#[test]
fn emulated_when_nulls_are_smallest() {
    assert_same_order(true);
}

#[test]
fn emulated_when_nulls_are_largest() {
    assert_same_order(false);
}

#[test]
fn non_nullable_items_have_no_null_clause() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.order_by("c.name", true, true).unwrap();
    cb.order_by("c.id", false, true).unwrap();
    assert_eq!(
        cb.render().unwrap().sql,
        "SELECT c.id FROM cat c ORDER BY c.name ASC, c.id DESC"
    );
}

#[test]
fn mysql_emulates_nulls_last_ascending() {
    let mut cb = factory("mysql").create();
    cb.from("Cat", "c").unwrap();
    cb.order_by_asc("c.age").unwrap();
    assert_eq!(
        cb.render().unwrap().sql,
        "SELECT c.id FROM cat c ORDER BY CASE WHEN c.age IS NULL THEN 1 ELSE 0 END, c.age ASC"
    );
}
