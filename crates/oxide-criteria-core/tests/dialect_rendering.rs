mod common;

use common::{factory, ints, DuckDb};
use oxide_criteria_core::builder::QueryBuilder;
use oxide_criteria_core::{CriteriaBuilder, CriteriaError, DialectRegistry, SqlValue};

fn restricted(dialect: &str) -> CriteriaBuilder {
    let mut cb = factory(dialect).create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.id").unwrap();
    cb.where_("c.age").unwrap().gt(3);
    cb.where_("c.name").unwrap().not_eq("cat 9");
    cb
}

fn paged(dialect: &str) -> CriteriaBuilder {
    let mut cb = factory(dialect).create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.id").unwrap();
    cb.order_by_asc("c.id").unwrap();
    let _ = (&mut cb).set_first_result(10).set_max_results(5);
    cb
}

#[test]
fn placeholders() {
    let cases = [
        ("postgresql", "SELECT c.id FROM cat c WHERE c.age > $1 AND c.name <> $2"),
        ("mysql", "SELECT c.id FROM cat c WHERE c.age > ? AND c.name <> ?"),
        ("sqlite", "SELECT c.id FROM cat c WHERE c.age > ?1 AND c.name <> ?2"),
    ];
    for (dialect, expected) in cases {
        let statement = restricted(dialect).render().unwrap();
        assert_eq!(statement.sql, expected, "{dialect}");
        assert_eq!(
            statement.parameters,
            vec![SqlValue::Int(3), SqlValue::Text(String::from("cat 9"))]
        );
    }
}

#[test]
fn same_rows_on_every_placeholder_style() {
    let db = DuckDb::new().with_cats(40);
    let mut expected = ints(&restricted("postgresql").get_result_list(&db).unwrap(), 0);
    expected.sort_unstable();
    assert_eq!(expected, vec![Some(4), Some(19), Some(24), Some(29), Some(34), Some(39)]);
    for dialect in ["mysql", "generic"] {
        let mut ids = ints(&restricted(dialect).get_result_list(&db).unwrap(), 0);
        ids.sort_unstable();
        assert_eq!(ids, expected, "{dialect}");
    }
}

#[test]
fn limit_styles() {
    let cases = [
        ("postgresql", "SELECT c.id FROM cat c ORDER BY c.id ASC LIMIT 5 OFFSET 10"),
        ("mysql", "SELECT c.id FROM cat c ORDER BY c.id ASC LIMIT 5 OFFSET 10"),
        (
            "mssql",
            "SELECT c.id FROM cat c ORDER BY c.id ASC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY",
        ),
        (
            "oracle",
            "SELECT c.id FROM cat c ORDER BY c.id ASC OFFSET 10 ROWS FETCH NEXT 5 ROWS ONLY",
        ),
    ];
    for (dialect, expected) in cases {
        assert_eq!(paged(dialect).render().unwrap().sql, expected, "{dialect}");
    }
}

#[test]
fn row_number_paging() {
    let sql = paged("db2").render().unwrap().sql;
    assert!(
        sql.starts_with(
            "SELECT paged.id FROM (SELECT numbered.*, ROW_NUMBER() OVER (ORDER BY numbered.ord_0 ASC) AS rn"
        ),
        "{sql}"
    );
    assert!(
        sql.ends_with("WHERE paged.rn > 10 AND paged.rn <= 15 ORDER BY paged.rn"),
        "{sql}"
    );

    let db = DuckDb::new().with_cats(40);
    let native = ints(&paged("postgresql").get_result_list(&db).unwrap(), 0);
    let emulated = ints(&paged("db2").get_result_list(&db).unwrap(), 0);
    assert_eq!(native, vec![Some(11), Some(12), Some(13), Some(14), Some(15)]);
    assert_eq!(emulated, native);
}

#[test]
fn dummy_table_without_from() {
    let mut cb = factory("oracle").create();
    cb.select("1").unwrap();
    assert_eq!(cb.render().unwrap().sql, "SELECT 1 FROM DUAL");

    let mut cb = factory("postgresql").create();
    cb.select("1").unwrap();
    assert_eq!(cb.render().unwrap().sql, "SELECT 1");
}

#[test]
fn renamed_functions() {
    let mut cb = factory("mssql").create();
    cb.from("Cat", "c").unwrap();
    cb.select("LENGTH(c.name)").unwrap();
    assert_eq!(cb.render().unwrap().sql, "SELECT LEN(c.name) FROM cat c");
}

#[test]
fn oracle_spells_except_as_minus() {
    let mut cb = factory("oracle").create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.name").unwrap();
    cb.except()
        .from("Person", "p")
        .unwrap()
        .select("p.name")
        .unwrap()
        .end()
        .unwrap();
    assert_eq!(
        cb.render().unwrap().sql,
        "SELECT c.name AS name FROM cat c MINUS SELECT p.name AS name FROM person p"
    );
}

#[test]
fn registry_aliases() {
    let registry = DialectRegistry::standard();
    for (alias, name) in [
        ("postgres", "postgresql"),
        ("PostgreSQL", "postgresql"),
        ("sqlserver", "mssql"),
        ("mariadb", "mysql"),
        ("default", "generic"),
    ] {
        assert_eq!(registry.get(alias).unwrap().name(), name);
    }
    assert!(matches!(
        registry.get("informix"),
        Err(CriteriaError::Configuration(_))
    ));
}
