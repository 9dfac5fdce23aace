//! Visitors over expressions, predicates and query specifications.
//!
//! Every `visit_*` method has a default that walks the node's children, so an
//! implementation only overrides the nodes it cares about. Walking is done by
//! the free `walk_*` functions, which an override can call to continue into
//! children after handling a node.

use super::expression::{
    CollectionOperator, Expression, FunctionExpression, Parameter, PathExpression,
    WindowDefinition, WindowExpression, WindowReference,
};
use super::predicate::Predicate;
use super::statement::{JoinTarget, QuerySpec};

/// Read-only visitor.
pub trait Visitor {
    fn visit_expression(&mut self, expression: &Expression) {
        walk_expression(self, expression);
    }

    fn visit_predicate(&mut self, predicate: &Predicate) {
        walk_predicate(self, predicate);
    }

    fn visit_path(&mut self, _path: &PathExpression) {}

    /// A path wrapped in `OUTER(...)`.
    fn visit_outer_path(&mut self, _path: &PathExpression) {}

    /// A path used as a collection: `SIZE`, `IS EMPTY`, `MEMBER OF` and the
    /// map/list operators.
    fn visit_collection_path(&mut self, _operator: CollectionOperator, _path: &PathExpression) {}

    fn visit_parameter(&mut self, _parameter: &Parameter) {}

    fn visit_function(&mut self, function: &FunctionExpression) {
        walk_function(self, function);
    }

    fn visit_window(&mut self, window: &WindowExpression) {
        walk_window(self, window);
    }

    /// A nested query. The default descends into it.
    fn visit_subquery(&mut self, query: &QuerySpec) {
        walk_query_spec(self, query);
    }
}

pub fn walk_expression<V: Visitor + ?Sized>(visitor: &mut V, expression: &Expression) {
    match expression {
        Expression::Path(path) => visitor.visit_path(path),
        Expression::Outer(path) => visitor.visit_outer_path(path),
        Expression::Parameter(parameter) => visitor.visit_parameter(parameter),
        Expression::Literal(_) | Expression::Value(_) | Expression::SubqueryRef(_) => {}
        Expression::Function(function) => visitor.visit_function(function),
        Expression::Window(window) => visitor.visit_window(window),
        Expression::Arithmetic { left, right, .. } => {
            visitor.visit_expression(left);
            visitor.visit_expression(right);
        }
        Expression::Negation(inner) => visitor.visit_expression(inner),
        Expression::CaseWhen(case) => {
            if let Some(operand) = &case.operand {
                visitor.visit_expression(operand);
            }
            for clause in &case.when_clauses {
                visitor.visit_expression(&clause.condition);
                visitor.visit_expression(&clause.result);
            }
            if let Some(otherwise) = &case.else_result {
                visitor.visit_expression(otherwise);
            }
        }
        Expression::Collection { op, path } => visitor.visit_collection_path(*op, path),
        Expression::Subquery(subquery) => visitor.visit_subquery(&subquery.query),
        Expression::Tuple(items) => {
            for item in items {
                visitor.visit_expression(item);
            }
        }
        Expression::Predicate(predicate) => visitor.visit_predicate(predicate),
    }
}

pub fn walk_function<V: Visitor + ?Sized>(visitor: &mut V, function: &FunctionExpression) {
    for arg in &function.args {
        visitor.visit_expression(arg);
    }
    if let Some(filter) = &function.filter {
        visitor.visit_predicate(filter);
    }
}

pub fn walk_window<V: Visitor + ?Sized>(visitor: &mut V, window: &WindowExpression) {
    visitor.visit_function(&window.function);
    if let WindowReference::Inline(definition) = &window.window {
        walk_window_definition(visitor, definition);
    }
}

pub fn walk_window_definition<V: Visitor + ?Sized>(visitor: &mut V, definition: &WindowDefinition) {
    for expression in &definition.partition_by {
        visitor.visit_expression(expression);
    }
    for item in &definition.order_by {
        visitor.visit_expression(&item.expression);
    }
}

pub fn walk_predicate<V: Visitor + ?Sized>(visitor: &mut V, predicate: &Predicate) {
    match predicate {
        Predicate::Compound(compound) => {
            for child in &compound.children {
                visitor.visit_predicate(child);
            }
        }
        Predicate::Comparison(p) => {
            visitor.visit_expression(&p.left);
            visitor.visit_expression(&p.right);
        }
        Predicate::Between(p) => {
            visitor.visit_expression(&p.expression);
            visitor.visit_expression(&p.start);
            visitor.visit_expression(&p.end);
        }
        Predicate::Like(p) => {
            visitor.visit_expression(&p.expression);
            visitor.visit_expression(&p.pattern);
        }
        Predicate::In(p) => {
            visitor.visit_expression(&p.left);
            for item in &p.right {
                visitor.visit_expression(item);
            }
        }
        Predicate::Exists(p) => visitor.visit_expression(&p.subquery),
        Predicate::IsNull(p) => visitor.visit_expression(&p.expression),
        Predicate::IsEmpty(p) => visitor.visit_collection_path(CollectionOperator::Size, &p.collection),
        Predicate::MemberOf(p) => {
            visitor.visit_expression(&p.element);
            visitor.visit_collection_path(CollectionOperator::Size, &p.collection);
        }
        Predicate::Boolean(p) => visitor.visit_expression(&p.expression),
    }
}

/// Walks every clause of a query, in clause order.
pub fn walk_query_spec<V: Visitor + ?Sized>(visitor: &mut V, query: &QuerySpec) {
    for item in &query.select {
        visitor.visit_expression(&item.expression);
    }
    for node in &query.joins {
        match &node.target {
            JoinTarget::Association(path) => visitor.visit_path(path),
            JoinTarget::Subquery(subquery) => visitor.visit_subquery(subquery),
            JoinTarget::Entity(_) | JoinTarget::Cte(_) => {}
        }
        if let Some(on) = &node.on {
            visitor.visit_predicate(on);
        }
    }
    if let Some(predicate) = &query.where_clause {
        visitor.visit_predicate(predicate);
    }
    for expression in &query.group_by {
        visitor.visit_expression(expression);
    }
    if let Some(predicate) = &query.having {
        visitor.visit_predicate(predicate);
    }
    for window in &query.windows {
        walk_window_definition(visitor, &window.definition);
    }
    for item in &query.order_by {
        visitor.visit_expression(&item.expression);
    }
}

/// Mutating visitor used for tree rewriting.
pub trait VisitorMut {
    fn visit_expression_mut(&mut self, expression: &mut Expression) {
        walk_expression_mut(self, expression);
    }

    fn visit_predicate_mut(&mut self, predicate: &mut Predicate) {
        walk_predicate_mut(self, predicate);
    }

    fn visit_subquery_mut(&mut self, query: &mut QuerySpec) {
        walk_query_spec_mut(self, query);
    }
}

pub fn walk_expression_mut<V: VisitorMut + ?Sized>(visitor: &mut V, expression: &mut Expression) {
    match expression {
        Expression::Path(_)
        | Expression::Outer(_)
        | Expression::Parameter(_)
        | Expression::Literal(_)
        | Expression::Value(_)
        | Expression::SubqueryRef(_)
        | Expression::Collection { .. } => {}
        Expression::Function(function) => walk_function_mut(visitor, function),
        Expression::Window(window) => {
            walk_function_mut(visitor, &mut window.function);
            if let WindowReference::Inline(definition) = &mut window.window {
                walk_window_definition_mut(visitor, definition);
            }
        }
        Expression::Arithmetic { left, right, .. } => {
            visitor.visit_expression_mut(left);
            visitor.visit_expression_mut(right);
        }
        Expression::Negation(inner) => visitor.visit_expression_mut(inner),
        Expression::CaseWhen(case) => {
            if let Some(operand) = &mut case.operand {
                visitor.visit_expression_mut(operand);
            }
            for clause in &mut case.when_clauses {
                visitor.visit_expression_mut(&mut clause.condition);
                visitor.visit_expression_mut(&mut clause.result);
            }
            if let Some(otherwise) = &mut case.else_result {
                visitor.visit_expression_mut(otherwise);
            }
        }
        Expression::Subquery(subquery) => visitor.visit_subquery_mut(&mut subquery.query),
        Expression::Tuple(items) => {
            for item in items {
                visitor.visit_expression_mut(item);
            }
        }
        Expression::Predicate(predicate) => visitor.visit_predicate_mut(predicate),
    }
}

fn walk_function_mut<V: VisitorMut + ?Sized>(visitor: &mut V, function: &mut FunctionExpression) {
    for arg in &mut function.args {
        visitor.visit_expression_mut(arg);
    }
    if let Some(filter) = &mut function.filter {
        visitor.visit_predicate_mut(filter);
    }
}

fn walk_window_definition_mut<V: VisitorMut + ?Sized>(
    visitor: &mut V,
    definition: &mut WindowDefinition,
) {
    for expression in &mut definition.partition_by {
        visitor.visit_expression_mut(expression);
    }
    for item in &mut definition.order_by {
        visitor.visit_expression_mut(&mut item.expression);
    }
}

pub fn walk_predicate_mut<V: VisitorMut + ?Sized>(visitor: &mut V, predicate: &mut Predicate) {
    match predicate {
        Predicate::Compound(compound) => {
            for child in &mut compound.children {
                visitor.visit_predicate_mut(child);
            }
        }
        Predicate::Comparison(p) => {
            visitor.visit_expression_mut(&mut p.left);
            visitor.visit_expression_mut(&mut p.right);
        }
        Predicate::Between(p) => {
            visitor.visit_expression_mut(&mut p.expression);
            visitor.visit_expression_mut(&mut p.start);
            visitor.visit_expression_mut(&mut p.end);
        }
        Predicate::Like(p) => {
            visitor.visit_expression_mut(&mut p.expression);
            visitor.visit_expression_mut(&mut p.pattern);
        }
        Predicate::In(p) => {
            visitor.visit_expression_mut(&mut p.left);
            for item in &mut p.right {
                visitor.visit_expression_mut(item);
            }
        }
        Predicate::Exists(p) => visitor.visit_expression_mut(&mut p.subquery),
        Predicate::IsNull(p) => visitor.visit_expression_mut(&mut p.expression),
        Predicate::MemberOf(p) => visitor.visit_expression_mut(&mut p.element),
        Predicate::IsEmpty(_) => {}
        Predicate::Boolean(p) => visitor.visit_expression_mut(&mut p.expression),
    }
}

pub fn walk_query_spec_mut<V: VisitorMut + ?Sized>(visitor: &mut V, query: &mut QuerySpec) {
    for item in &mut query.select {
        visitor.visit_expression_mut(&mut item.expression);
    }
    for node in &mut query.joins {
        if let JoinTarget::Subquery(subquery) = &mut node.target {
            visitor.visit_subquery_mut(subquery);
        }
        if let Some(on) = &mut node.on {
            visitor.visit_predicate_mut(on);
        }
    }
    if let Some(predicate) = &mut query.where_clause {
        visitor.visit_predicate_mut(predicate);
    }
    for expression in &mut query.group_by {
        visitor.visit_expression_mut(expression);
    }
    if let Some(predicate) = &mut query.having {
        visitor.visit_predicate_mut(predicate);
    }
    for window in &mut query.windows {
        walk_window_definition_mut(visitor, &mut window.definition);
    }
    for item in &mut query.order_by {
        visitor.visit_expression_mut(&mut item.expression);
    }
}

impl Expression {
    /// Dispatches to the visitor.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_expression(self);
    }

    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_expression_mut(self);
    }
}

impl Predicate {
    /// Dispatches to the visitor.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        visitor.visit_predicate(self);
    }

    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) {
        visitor.visit_predicate_mut(self);
    }
}

impl QuerySpec {
    /// Walks the query itself, not as a nested subquery.
    pub fn accept<V: Visitor + ?Sized>(&self, visitor: &mut V) {
        walk_query_spec(visitor, self);
    }

    pub fn accept_mut<V: VisitorMut + ?Sized>(&mut self, visitor: &mut V) {
        walk_query_spec_mut(visitor, self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::SubqueryExpression;
    use crate::ast::predicate::ComparisonOperator;
    use crate::ast::statement::{FromSource, SelectItem};

    #[derive(Default)]
    struct PathCollector {
        paths: Vec<String>,
        parameters: usize,
        subqueries: usize,
    }

    impl Visitor for PathCollector {
        fn visit_path(&mut self, path: &PathExpression) {
            self.paths.push(path.to_string());
        }

        fn visit_parameter(&mut self, _parameter: &Parameter) {
            self.parameters += 1;
        }

        fn visit_subquery(&mut self, query: &QuerySpec) {
            self.subqueries += 1;
            walk_query_spec(self, query);
        }
    }

    fn subquery() -> QuerySpec {
        QuerySpec {
            select: vec![SelectItem {
                expression: Expression::path("k.age"),
                alias: None,
            }],
            from: vec![FromSource::Entity {
                entity: String::from("Cat"),
                alias: String::from("k"),
            }],
            where_clause: Some(Predicate::eq(
                Expression::path("k.name"),
                Expression::parameter("name"),
            )),
            ..QuerySpec::default()
        }
    }

    #[test]
    fn visitor_descends_into_subqueries() {
        let predicate = Predicate::compare(
            Expression::path("c.age"),
            ComparisonOperator::Gt,
            Expression::Subquery(SubqueryExpression::new(subquery())),
        )
        .and(Predicate::is_null(Expression::path("c.owner.name")));

        let mut collector = PathCollector::default();
        predicate.accept(&mut collector);
        assert_eq!(collector.paths, ["c.age", "k.age", "k.name", "c.owner.name"]);
        assert_eq!(collector.parameters, 1);
        assert_eq!(collector.subqueries, 1);
    }

    struct SubqueryFiller(Option<QuerySpec>);

    impl VisitorMut for SubqueryFiller {
        fn visit_expression_mut(&mut self, expression: &mut Expression) {
            if matches!(expression, Expression::SubqueryRef(name) if name == "ages") {
                if let Some(query) = self.0.take() {
                    *expression = Expression::Subquery(SubqueryExpression::new(query));
                }
                return;
            }
            walk_expression_mut(self, expression);
        }
    }

    #[test]
    fn mutable_visitor_replaces_placeholders() {
        let mut predicate = Predicate::compare(
            Expression::path("c.age"),
            ComparisonOperator::Lt,
            Expression::SubqueryRef(String::from("ages")),
        )
        .negated();
        predicate.accept_mut(&mut SubqueryFiller(Some(subquery())));
        assert_eq!(
            predicate.to_string(),
            "NOT c.age < (SELECT k.age FROM Cat k WHERE k.name = :name)"
        );
    }
}
