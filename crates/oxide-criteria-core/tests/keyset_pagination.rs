mod common;

use common::{factory, factory_with, ints, DuckDb};
use oxide_criteria_core::builder::{CriteriaBuilderFactory, QueryBuilder};
use oxide_criteria_core::{CriteriaConfig, CriteriaError, KeysetPage, PagedList};

const CATS: i64 = 40;
const PAGE: u64 = 6;

/// `SELECT c.id FROM Cat c` in the given order.
fn query(factory: &CriteriaBuilderFactory, order: &[(&str, bool, bool)]) -> oxide_criteria_core::CriteriaBuilder {
    let mut cb = factory.create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.id").unwrap();
    for (expression, ascending, nulls_first) in order {
        cb.order_by(expression, *ascending, *nulls_first).unwrap();
    }
    cb
}

fn read_page(
    db: &DuckDb,
    factory: &CriteriaBuilderFactory,
    order: &[(&str, bool, bool)],
    previous: Option<&KeysetPage>,
    first_result: u64,
) -> PagedList {
    let paginated = query(factory, order)
        .page_keyset(previous, first_result, PAGE)
        .unwrap()
        .with_keyset_extraction(true);
    if previous.is_some() {
        let sql = paginated.render().unwrap().sql;
        assert!(!sql.contains(" OFFSET "), "Keyset page used OFFSET: {sql}");
    }
    paginated.get_result_list(db).unwrap()
}

/// Reads every page forward, then walks back to the start, and compares
/// both walks with the unpaged result.
fn assert_round_trip(factory: &CriteriaBuilderFactory, order: &[(&str, bool, bool)]) {
    let db = DuckDb::new().with_cats(CATS);
    let expected = ints(&query(factory, order).get_result_list(&db).unwrap(), 0);
    assert_eq!(expected.len(), 40);

    let mut pages = Vec::new();
    let mut previous: Option<KeysetPage> = None;
    let mut first_result = 0;
    loop {
        let page = read_page(&db, factory, order, previous.as_ref(), first_result);
        assert_eq!(page.total_size, Some(40));
        if page.is_empty() {
            break;
        }
        assert!(page.rows.iter().all(|row| row.len() == 1));
        previous = page.keyset_page.clone();
        first_result += PAGE;
        pages.push(page);
    }
    let forward: Vec<Option<i64>> = pages.iter().flat_map(|page| ints(&page.rows, 0)).collect();
    assert_eq!(forward, expected, "Forward pages differ from the unpaged order");

    let mut backward = Vec::new();
    let mut current = pages.pop().unwrap();
    while current.first_result > 0 {
        let first_result = current.first_result - PAGE;
        let page = read_page(&db, factory, order, current.keyset_page.as_ref(), first_result);
        assert_eq!(page.len(), 6);
        backward.push(page.clone());
        current = page;
    }
    backward.reverse();
    let walked: Vec<Option<i64>> = backward.iter().flat_map(|page| ints(&page.rows, 0)).collect();
    assert_eq!(walked, expected[..36].to_vec(), "Backward pages differ from the unpaged order");
}

#[test]
fn nullable_column_ascending() {
    assert_round_trip(&factory("postgresql"), &[("c.age", true, false), ("c.id", true, false)]);
}

#[test]
fn nullable_column_nulls_first() {
    assert_round_trip(&factory("postgresql"), &[("c.age", true, true), ("c.id", true, false)]);
}

#[test]
fn emulated_null_order_on_mysql() {
    assert_round_trip(&factory("mysql"), &[("c.age", true, false), ("c.id", true, false)]);
}

#[test]
fn emulated_nulls_first_on_mysql() {
    assert_round_trip(&factory("mysql"), &[("c.age", false, true), ("c.id", false, false)]);
}

#[test]
fn mixed_directions() {
    assert_round_trip(
        &factory("postgresql"),
        &[("c.weight", false, true), ("c.age", true, false), ("c.id", false, false)],
    );
}

#[test]
fn expanded_predicate_on_non_null_columns() {
    let config = CriteriaConfig {
        optimized_keyset_predicate_rendering: false,
        ..CriteriaConfig::for_dialect("postgresql")
    };
    assert_round_trip(&factory_with(config), &[("c.name", true, false), ("c.id", true, false)]);
}

#[test]
fn row_value_predicate_on_non_null_columns() {
    let factory = factory("postgresql");
    let order = [("c.name", true, false), ("c.id", true, false)];
    let db = DuckDb::new().with_cats(CATS);
    let first = read_page(&db, &factory, &order, None, 0);
    let sql = query(&factory, &order)
        .page_keyset(first.keyset_page.as_ref(), PAGE, PAGE)
        .unwrap()
        .render()
        .unwrap();
    assert!(
        sql.sql.contains("(c.name, c.id) > ($1, $2)"),
        "Expected a row value comparison: {}",
        sql.sql
    );
    assert!(sql.sql.ends_with(" LIMIT 6"), "{}", sql.sql);
}

#[test]
fn expanded_when_nullable() {
    let factory = factory("postgresql");
    let order = [("c.age", true, false), ("c.id", true, false)];
    let db = DuckDb::new().with_cats(CATS);
    let first = read_page(&db, &factory, &order, None, 0);
    let sql = query(&factory, &order)
        .page_keyset(first.keyset_page.as_ref(), PAGE, PAGE)
        .unwrap()
        .render()
        .unwrap()
        .sql;
    assert!(!sql.contains("(c.age, c.id)"), "{sql}");
    assert!(sql.contains("c.age IS NULL"), "{sql}");
}

#[test]
fn offset_paging_without_keyset() {
    let factory = factory("postgresql");
    let order = [("c.age", true, false), ("c.id", true, false)];
    let db = DuckDb::new().with_cats(CATS);
    let expected = ints(&query(&factory, &order).get_result_list(&db).unwrap(), 0);

    let paginated = query(&factory, &order).page(12, PAGE).unwrap();
    assert!(paginated.render().unwrap().sql.ends_with(" LIMIT 6 OFFSET 12"));
    let page = paginated.get_result_list(&db).unwrap();
    assert_eq!(ints(&page.rows, 0), expected[12..18].to_vec());
    assert!(page.keyset_page.is_none());
    assert_eq!(page.total_pages(), Some(7));
}

#[test]
fn distant_page_falls_back_to_offset() {
    let factory = factory("postgresql");
    let order = [("c.age", true, false), ("c.id", true, false)];
    let db = DuckDb::new().with_cats(CATS);
    let first = read_page(&db, &factory, &order, None, 0);
    let sql = query(&factory, &order)
        .page_keyset(first.keyset_page.as_ref(), 24, PAGE)
        .unwrap()
        .render()
        .unwrap()
        .sql;
    assert!(sql.ends_with(" OFFSET 24"), "{sql}");
}

#[test]
fn changed_order_invalidates_keyset() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let first = read_page(&db, &factory, &[("c.age", true, false), ("c.id", true, false)], None, 0);
    let sql = query(&factory, &[("c.age", false, false), ("c.id", true, false)])
        .page_keyset(first.keyset_page.as_ref(), PAGE, PAGE)
        .unwrap()
        .render()
        .unwrap()
        .sql;
    assert!(sql.ends_with(" OFFSET 6"), "{sql}");
}

#[test]
fn same_page_is_read_again() {
    let factory = factory("postgresql");
    let order = [("c.age", true, false), ("c.id", true, false)];
    let db = DuckDb::new().with_cats(CATS);
    let first = read_page(&db, &factory, &order, None, 0);
    let second = read_page(&db, &factory, &order, first.keyset_page.as_ref(), PAGE);
    let again = read_page(&db, &factory, &order, second.keyset_page.as_ref(), PAGE);
    assert_eq!(again.rows, second.rows);
}

#[test]
fn order_by_must_end_unique() {
    let factory = factory("postgresql");
    let error = query(&factory, &[("c.id", true, false), ("c.age", true, false)])
        .page(0, PAGE)
        .unwrap_err();
    assert_eq!(
        error.to_string(),
        "The order by items of the query builder are not guaranteed to produce unique tuples!"
    );

    let error = query(&factory, &[]).page(0, PAGE).unwrap_err();
    assert!(matches!(error, CriteriaError::IllegalArgument(_)));
}

#[test]
fn count_query_follows_joins() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let mut cb = factory.create();
    cb.from("Person", "p").unwrap();
    cb.inner_join("p.cats", "k").unwrap();
    cb.where_("k.age").unwrap().gt(2);
    cb.order_by_asc("p.id").unwrap();
    let paginated = cb.page(0, 10).unwrap();
    let count = paginated.render_count().unwrap().sql;
    assert!(count.starts_with("SELECT COUNT(DISTINCT p.id) FROM person p"), "{count}");
    assert_eq!(paginated.get_result_list(&db).unwrap().total_size, Some(2));
}

/// Cats per owner, grouped by the owner.
fn cats_per_owner(factory: &CriteriaBuilderFactory, group_by: bool) -> oxide_criteria_core::CriteriaBuilder {
    let mut cb = factory.create();
    cb.from("Person", "p").unwrap();
    cb.inner_join("p.cats", "k").unwrap();
    cb.select("p.id").unwrap();
    cb.select_as("COUNT(k.id)", "cats").unwrap();
    if group_by {
        cb.group_by("p.id").unwrap();
    }
    cb.order_by_asc("p.id").unwrap();
    cb
}

#[test]
fn count_query_counts_groups() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let paginated = cats_per_owner(&factory, true).page(0, 10).unwrap();
    let count = paginated.render_count().unwrap().sql;
    assert!(count.starts_with("SELECT COUNT(*) FROM (SELECT p.id AS id"), "{count}");
    assert!(count.contains(" GROUP BY p.id) grouped_"), "{count}");
    let page = paginated.get_result_list(&db).unwrap();
    assert_eq!(page.rows.len(), 2);
    assert_eq!(ints(&page.rows, 1), vec![Some(20), Some(20)]);
    assert_eq!(page.total_size, Some(2));
}

#[test]
fn count_query_counts_implicit_groups() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let paginated = cats_per_owner(&factory, false).page(0, 1).unwrap();
    let count = paginated.render_count().unwrap().sql;
    assert!(count.contains(" GROUP BY p.id) grouped_"), "{count}");
    let page = paginated.get_result_list(&db).unwrap();
    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.total_size, Some(2));
}

#[test]
fn count_query_keeps_having() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let mut cb = cats_per_owner(&factory, true);
    cb.having("p.id").unwrap().eq(2);
    let page = cb.page(0, 10).unwrap().get_result_list(&db).unwrap();
    assert_eq!(ints(&page.rows, 0), vec![Some(2)]);
    assert_eq!(page.total_size, Some(1));
}

#[test]
fn empty_page_has_no_keysets() {
    let factory = factory("postgresql");
    let db = DuckDb::new().with_cats(CATS);
    let page = query(&factory, &[("c.id", true, false)])
        .page(100, PAGE)
        .unwrap()
        .with_keyset_extraction(true)
        .with_count_query(false)
        .get_result_list(&db)
        .unwrap();
    assert!(page.is_empty());
    assert!(page.keyset_page.is_none());
    assert!(page.total_size.is_none());
}
