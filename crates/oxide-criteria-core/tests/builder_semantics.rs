mod common;

use common::{factory, ints, DuckDb};
use oxide_criteria_core::ast::{CopyContext, DeepCopy, Expression, Parameter, Predicate, PredicateQuantifier};
use oxide_criteria_core::builder::{CteOwner, ModificationBuilder, QueryBuilder};
use oxide_criteria_core::dialect::{DbmsDialect, MySqlDialect};
use oxide_criteria_core::{CriteriaError, Row, SqlStatement, SqlValue};

fn never_executed(statement: &SqlStatement) -> oxide_criteria_core::Result<Vec<Row>> {
    panic!("Statement reached the database: {}", statement.sql)
}

#[test]
fn unended_case_blocks_execution() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    drop(cb.where_case().when("c.age > 1").unwrap());

    let error = cb.get_result_list(&never_executed).unwrap_err();
    match error {
        CriteriaError::BuilderChaining { open } => assert_eq!(open, vec!["CaseWhenBuilder"]),
        other => panic!("Expected a chaining error, got {other:?}"),
    }
    assert!(cb.get_query_string().is_err());
    assert!(cb.render().is_err());
}

#[test]
fn unended_subquery_blocks_paging() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.order_by_asc("c.id").unwrap();
    drop(cb.where_exists().from("Cat", "k").unwrap());
    assert!(matches!(
        cb.page(0, 10),
        Err(CriteriaError::BuilderChaining { .. })
    ));
}

#[test]
fn copy_is_equal_and_independent() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.where_("c.age").unwrap().gt(3);
    cb.order_by_asc("c.id").unwrap();

    let mut copy = cb.copy(&mut CopyContext::new()).unwrap();
    assert_eq!(copy.get_query_string().unwrap(), cb.get_query_string().unwrap());
    assert_eq!(copy.render().unwrap(), cb.render().unwrap());

    copy.where_("c.name").unwrap().eq("Tom");
    assert_eq!(
        cb.get_query_string().unwrap(),
        "SELECT c FROM Cat c WHERE c.age > :param_1 ORDER BY c.id ASC NULLS LAST"
    );
    assert_eq!(
        copy.get_query_string().unwrap(),
        "SELECT c FROM Cat c WHERE c.age > :param_1 AND c.name = :param_2 ORDER BY c.id ASC NULLS LAST"
    );
    assert_eq!(cb.render().unwrap().parameters, vec![SqlValue::Int(3)]);
}

#[test]
fn copy_renames_named_parameters() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.where_expression("c.age >= :minAge").unwrap();
    cb.set_parameter("minAge", 2);

    let copy = cb
        .copy(&mut CopyContext::new().rename_parameter("minAge", "lowest"))
        .unwrap();
    assert_eq!(
        copy.get_query_string().unwrap(),
        "SELECT c FROM Cat c WHERE c.age >= :lowest"
    );
    assert_eq!(
        copy.parameters().get(&Parameter::Named(String::from("lowest"))),
        Some(&SqlValue::Int(2))
    );
    assert_eq!(copy.render().unwrap().parameters, vec![SqlValue::Int(2)]);
}

#[test]
fn copy_keeps_negation_and_quantifier() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.where_("c.age")
        .unwrap()
        .eq_subquery(PredicateQuantifier::All)
        .from("Cat", "k")
        .unwrap()
        .select("k.age")
        .unwrap()
        .end()
        .unwrap();
    let negated = cb.statement().query.where_clause.unwrap().negated();

    let copy = negated.copy(&mut CopyContext::new());
    assert_eq!(copy, negated);
    let Predicate::Comparison(comparison) = copy else {
        panic!("Expected a comparison, got {copy}");
    };
    assert!(comparison.negated);
    assert_eq!(comparison.quantifier, PredicateQuantifier::All);
    assert!(matches!(comparison.right, Expression::Subquery(_)));
}

#[test]
fn mysql_has_no_with_clause() {
    let dialect = MySqlDialect::new();
    for recursive in [true, false] {
        assert!(matches!(
            dialect.get_with_clause(recursive),
            Err(CriteriaError::UnsupportedCapability { .. })
        ));
    }

    let mut cb = factory("mysql").create();
    cb.with("young", &["id"])
        .unwrap()
        .from("Cat", "k")
        .unwrap()
        .bind("id", "k.id")
        .unwrap()
        .end()
        .unwrap();
    cb.from_cte("young", "y").unwrap();
    assert!(matches!(
        cb.render(),
        Err(CriteriaError::UnsupportedCapability { .. })
    ));
}

#[test]
fn cte_is_rendered_and_executed() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("postgresql").create();
    cb.with("young", &["id", "name"])
        .unwrap()
        .from("Cat", "k")
        .unwrap()
        .bind("name", "k.name")
        .unwrap()
        .bind("id", "k.id")
        .unwrap()
        .where_("k.age")
        .unwrap()
        .lt(2)
        .end()
        .unwrap();
    cb.from_cte("young", "y").unwrap();
    cb.select("y.name").unwrap();
    assert_eq!(
        cb.get_query_string().unwrap(),
        "WITH young(id, name) AS (SELECT k.id AS id, k.name AS name FROM Cat k WHERE k.age < :param_1) \
         SELECT y.name FROM young y"
    );
    assert_eq!(cb.get_result_list(&db).unwrap().len(), 14);
}

#[test]
fn recursive_cte() {
    let db = DuckDb::new();
    let mut cb = factory("postgresql").create();
    cb.with_recursive("numbers", &["n"])
        .unwrap()
        .bind("n", "1")
        .unwrap()
        .union_all()
        .unwrap()
        .from_cte("numbers", "x")
        .unwrap()
        .bind("n", "x.n + 1")
        .unwrap()
        .where_("x.n")
        .unwrap()
        .lt(5)
        .end()
        .unwrap();
    cb.from_cte("numbers", "m").unwrap();
    cb.order_by_asc("m.n").unwrap();
    let sql = cb.render().unwrap().sql;
    assert!(sql.starts_with("WITH RECURSIVE numbers(n) AS ("), "{sql}");
    let rows = cb.get_result_list(&db).unwrap();
    assert_eq!(ints(&rows, 0), vec![Some(1), Some(2), Some(3), Some(4), Some(5)]);
}

#[test]
fn recursive_cte_needs_columns() {
    let mut cb = factory("postgresql").create();
    assert!(matches!(
        cb.with_recursive("numbers", &[]),
        Err(CriteriaError::IllegalArgument(_))
    ));
}

#[test]
fn modification_cte_adopts_parameters() {
    let factory = factory("postgresql");
    let mut delete = factory.delete("Cat", "d").unwrap();
    delete.where_("d.age").unwrap().gt(3);
    delete.returning("id").unwrap();
    let removed = delete.into_query().unwrap();

    let mut cb = factory.create();
    cb.from("Person", "p").unwrap();
    cb.where_("p.id").unwrap().eq(1);
    cb.with_modification("removed", &[], removed).unwrap();
    cb.from_cte("removed", "r").unwrap();

    let query = cb.get_query_string().unwrap();
    assert!(query.contains("DELETE FROM Cat d WHERE d.age > :param_2"), "{query}");
    assert!(query.contains("WHERE p.id = :param_1"), "{query}");
    let sql = cb.render().unwrap();
    assert!(sql.sql.starts_with("WITH removed(id) AS (DELETE FROM cat"), "{}", sql.sql);
    assert_eq!(sql.parameters, vec![SqlValue::Int(3), SqlValue::Int(1)]);
}

#[test]
fn modification_cte_needs_dialect_support() {
    for dialect in ["mysql8", "generic"] {
        let factory = factory(dialect);
        let mut delete = factory.delete("Cat", "d").unwrap();
        delete.where_("d.age").unwrap().gt(3);
        let removed = delete.into_query().unwrap();
        let mut cb = factory.create();
        assert!(matches!(
            cb.with_modification("removed", &[], removed),
            Err(CriteriaError::UnsupportedCapability { .. })
        ));
    }
}

#[test]
fn modification_cte_needs_returning() {
    let factory = factory("postgresql");
    let delete = factory.delete("Cat", "d").unwrap();
    let removed = delete.into_query().unwrap();
    let mut cb = factory.create();
    assert!(matches!(
        cb.with_modification("removed", &[], removed),
        Err(CriteriaError::IllegalArgument(_))
    ));
}

#[test]
fn correlated_exists() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("postgresql").create();
    cb.from("Person", "p").unwrap();
    cb.where_not_exists()
        .from("Cat", "k")
        .unwrap()
        .where_("k.owner")
        .unwrap()
        .eq_expression("p")
        .unwrap()
        .where_("k.age")
        .unwrap()
        .gt(3)
        .end()
        .unwrap();
    assert_eq!(
        cb.get_query_string().unwrap(),
        "SELECT p FROM Person p WHERE NOT EXISTS (SELECT k FROM Cat k WHERE k.owner = p AND k.age > :param_1)"
    );
    assert!(cb.get_result_list(&db).unwrap().is_empty());
}

#[test]
fn select_subquery_counts_per_row() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("postgresql").create();
    cb.from("Person", "p").unwrap();
    cb.select("p.id").unwrap();
    cb.select_subquery(Some("cats"))
        .from("Cat", "k")
        .unwrap()
        .select("COUNT(k.id)")
        .unwrap()
        .where_("k.owner")
        .unwrap()
        .eq_expression("p")
        .unwrap()
        .end()
        .unwrap();
    cb.order_by_asc("p.id").unwrap();
    let rows = cb.get_result_list(&db).unwrap();
    assert_eq!(ints(&rows, 0), vec![Some(1), Some(2)]);
    assert_eq!(ints(&rows, 1), vec![Some(20), Some(20)]);
}

#[test]
fn union_of_names() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.name").unwrap();
    cb.union()
        .from("Person", "p")
        .unwrap()
        .select("p.name")
        .unwrap()
        .end()
        .unwrap();
    assert_eq!(
        cb.get_query_string().unwrap(),
        "SELECT c.name FROM Cat c UNION SELECT p.name FROM Person p"
    );
    assert_eq!(cb.get_result_list(&db).unwrap().len(), 42);
}

#[test]
fn intersect_is_emulated_without_native_support() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("mysql").create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.name").unwrap();
    cb.intersect()
        .from("Cat", "k")
        .unwrap()
        .select("k.name")
        .unwrap()
        .where_("k.age")
        .unwrap()
        .gt(2)
        .end()
        .unwrap();
    let sql = cb.render().unwrap().sql;
    assert!(!sql.contains("INTERSECT"), "{sql}");
    assert!(sql.contains("WHERE EXISTS"), "{sql}");
    assert_eq!(cb.get_result_list(&db).unwrap().len(), 14);
}

/// `(cats 1, 2) UNION (people) INTERSECT (Ann)`, applied left to right.
fn union_then_intersect(dialect: &str) -> oxide_criteria_core::CriteriaBuilder {
    let mut cb = factory(dialect).create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.name").unwrap();
    cb.where_("c.id").unwrap().le(2);
    cb.union()
        .from("Person", "p")
        .unwrap()
        .select("p.name")
        .unwrap()
        .end()
        .unwrap();
    cb.intersect()
        .from("Person", "q")
        .unwrap()
        .select("q.name")
        .unwrap()
        .where_("q.id")
        .unwrap()
        .eq(1)
        .end()
        .unwrap();
    cb
}

#[test]
fn mixed_set_operations_apply_in_order() {
    let db = DuckDb::new().with_cats(40);
    let ann = vec![vec![SqlValue::Text(String::from("Ann"))]];

    let native = union_then_intersect("postgresql");
    let sql = native.render().unwrap().sql;
    assert!(sql.contains(" INTERSECT "), "{sql}");
    assert!(
        sql.contains("UNION SELECT p.name AS name FROM person p) set_"),
        "UNION was not folded before INTERSECT: {sql}"
    );
    assert_eq!(native.get_result_list(&db).unwrap(), ann);

    let emulated = union_then_intersect("mysql");
    assert!(!emulated.render().unwrap().sql.contains("INTERSECT"));
    assert_eq!(emulated.get_result_list(&db).unwrap(), ann);
}

#[test]
fn set_operands_must_match() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.name").unwrap();
    cb.union_all()
        .from("Person", "p")
        .unwrap()
        .select("p.name")
        .unwrap()
        .select("p.id")
        .unwrap()
        .end()
        .unwrap();
    assert!(matches!(cb.render(), Err(CriteriaError::IllegalArgument(_))));
}

#[test]
fn positional_parameters() {
    let db = DuckDb::new().with_cats(40);
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    cb.select("c.id").unwrap();
    cb.where_expression("c.age = ?1 AND c.id < ?2").unwrap();
    cb.set_positional_parameter(2, 20).set_positional_parameter(1, 4);
    let sql = cb.render().unwrap();
    assert_eq!(sql.sql, "SELECT c.id FROM cat c WHERE c.age = $1 AND c.id < $2");
    assert_eq!(sql.parameters, vec![SqlValue::Int(4), SqlValue::Int(20)]);
    let mut ids = ints(&cb.get_result_list(&db).unwrap(), 0);
    ids.sort_unstable();
    assert_eq!(ids, vec![Some(4), Some(9), Some(19)]);
}

#[test]
fn unknown_paths_are_rejected() {
    let mut cb = factory("postgresql").create();
    cb.from("Cat", "c").unwrap();
    assert!(matches!(
        cb.where_("c.colour"),
        Err(CriteriaError::PathResolution { .. })
    ));
    assert!(matches!(
        cb.where_("x.age"),
        Err(CriteriaError::PathResolution { .. })
    ));
    assert!(matches!(
        cb.where_expression("c.age >"),
        Err(CriteriaError::Syntax { .. })
    ));
    assert!(cb.verify_builder_ended().is_ok());
}
