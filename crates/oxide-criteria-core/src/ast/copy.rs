//! Deep copies with parameter rebinding.

use std::collections::{BTreeSet, HashMap};

use super::expression::{Expression, Parameter};
use super::predicate::Predicate;
use super::statement::{CteBody, CteDefinition, DmlKind, DmlStatement, QuerySpec, SelectStatement};
use super::visitor::{VisitorMut, walk_expression_mut};

/// Controls how named parameters are rebound while copying.
#[derive(Debug, Clone, Default)]
pub struct CopyContext {
    renames: HashMap<String, String>,
    seen: BTreeSet<String>,
}

impl CopyContext {
    /// A context that keeps every parameter name.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebinds `from` to `to` in every copied node.
    #[must_use]
    pub fn rename_parameter(mut self, from: &str, to: &str) -> Self {
        self.renames.insert(String::from(from), String::from(to));
        self
    }

    /// Names of the named parameters found in copied nodes, after renaming.
    pub fn parameters(&self) -> impl Iterator<Item = &str> {
        self.seen.iter().map(String::as_str)
    }

    /// The name `name` is rebound to, or `name` itself.
    #[must_use]
    pub fn renamed<'n>(&'n self, name: &'n str) -> &'n str {
        self.renames.get(name).map_or(name, String::as_str)
    }

    fn rebind(&mut self, name: &mut String) {
        if let Some(renamed) = self.renames.get(name.as_str()) {
            name.clone_from(renamed);
        }
        self.seen.insert(name.clone());
    }
}

impl VisitorMut for CopyContext {
    fn visit_expression_mut(&mut self, expression: &mut Expression) {
        if let Expression::Parameter(Parameter::Named(name)) = expression {
            self.rebind(name);
            return;
        }
        walk_expression_mut(self, expression);
    }
}

/// Structural duplication of an AST node.
///
/// The copy shares nothing with the original, so either can be rewritten
/// without affecting the other.
pub trait DeepCopy {
    #[must_use]
    fn copy(&self, context: &mut CopyContext) -> Self;
}

impl DeepCopy for Expression {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let mut copy = self.clone();
        copy.accept_mut(context);
        copy
    }
}

impl DeepCopy for Predicate {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let mut copy = self.clone();
        copy.accept_mut(context);
        copy
    }
}

impl DeepCopy for QuerySpec {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let mut copy = self.clone();
        copy.accept_mut(context);
        copy
    }
}

impl DeepCopy for CteDefinition {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let body = match &self.body {
            CteBody::Query { base, recursive } => CteBody::Query {
                base: base.copy(context),
                recursive: recursive
                    .as_ref()
                    .map(|(operator, query)| (*operator, query.copy(context))),
            },
            CteBody::Modification(statement) => {
                CteBody::Modification(Box::new(statement.copy(context)))
            }
        };
        Self {
            name: self.name.clone(),
            columns: self.columns.clone(),
            recursive: self.recursive,
            body,
            materialized: self.materialized,
        }
    }
}

impl DeepCopy for SelectStatement {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let mut set_operations = self.set_operations.clone();
        for operation in &mut set_operations {
            operation.query = operation.query.copy(context);
        }
        Self {
            ctes: self.ctes.iter().map(|cte| cte.copy(context)).collect(),
            query: self.query.copy(context),
            set_operations,
        }
    }
}

impl DeepCopy for DmlStatement {
    fn copy(&self, context: &mut CopyContext) -> Self {
        let kind = match &self.kind {
            DmlKind::Delete => DmlKind::Delete,
            DmlKind::Update { assignments } => {
                let mut assignments = assignments.clone();
                for assignment in &mut assignments {
                    assignment.value = assignment.value.copy(context);
                }
                DmlKind::Update { assignments }
            }
            DmlKind::Insert { attributes, query } => DmlKind::Insert {
                attributes: attributes.clone(),
                query: query.copy(context),
            },
        };
        Self {
            ctes: self.ctes.iter().map(|cte| cte.copy(context)).collect(),
            entity: self.entity.clone(),
            alias: self.alias.clone(),
            kind,
            where_clause: self.where_clause.as_ref().map(|p| p.copy(context)),
            returning: self.returning.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::predicate::{
        ComparisonOperator, ComparisonPredicate, Negatable, PredicateQuantifier,
    };

    fn negated_all() -> Predicate {
        Predicate::Comparison(ComparisonPredicate {
            left: Expression::path("c.age"),
            operator: ComparisonOperator::Eq,
            right: Expression::SubqueryRef(String::from("ages")),
            quantifier: PredicateQuantifier::All,
            negated: true,
        })
    }

    #[test]
    fn copy_preserves_negation_and_quantifier() {
        let original = negated_all();
        let copy = original.copy(&mut CopyContext::new());
        assert_eq!(copy, original);
        let Predicate::Comparison(comparison) = &copy else {
            panic!("expected comparison");
        };
        assert!(comparison.negated);
        assert_eq!(comparison.quantifier, PredicateQuantifier::All);
    }

    #[test]
    fn copy_is_independent() {
        let original = negated_all().and(Predicate::is_null(Expression::path("c.name")));
        let mut copy = original.copy(&mut CopyContext::new());
        if let Predicate::Compound(compound) = &mut copy {
            compound.children[1].negate();
        }
        assert_ne!(copy, original);
        assert_eq!(original.to_string(), "NOT c.age = ALL ages AND c.name IS NULL");
    }

    #[test]
    fn copy_rebinds_parameters() {
        let original = Predicate::eq(Expression::path("c.name"), Expression::parameter("name"))
            .or(Predicate::eq(Expression::path("c.age"), Expression::parameter("age")));
        let mut context = CopyContext::new().rename_parameter("name", "name_1");
        let copy = original.copy(&mut context);
        assert_eq!(copy.to_string(), "c.name = :name_1 OR c.age = :age");
        assert_eq!(context.parameters().collect::<Vec<_>>(), ["age", "name_1"]);
    }
}
