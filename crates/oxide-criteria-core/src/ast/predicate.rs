//! Predicate AST types.
//!
//! Every predicate carries a `negated` flag. Negation never rewrites the
//! tree: `NOT (a = b)` stays an equality predicate with the flag set, so
//! copying and visiting behave the same for negated and plain predicates.

use std::fmt;

use super::expression::{Expression, PathExpression, join};

/// Boolean connective of a compound predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOperator {
    And,
    Or,
}

impl BooleanOperator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ComparisonOperator {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }

    /// The operator that yields the same result with swapped direction,
    /// e.g. `>` becomes `<`.
    #[must_use]
    pub const fn reversed(&self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => *other,
        }
    }
}

/// Quantifier of a comparison against a subquery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PredicateQuantifier {
    /// The subquery yields a single value.
    #[default]
    One,
    Any,
    All,
}

impl PredicateQuantifier {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::One => "",
            Self::Any => "ANY",
            Self::All => "ALL",
        }
    }
}

/// Access to the negation flag every predicate carries.
pub trait Negatable {
    fn is_negated(&self) -> bool;

    fn set_negated(&mut self, negated: bool);

    /// Flips the negation flag.
    fn negate(&mut self) {
        let negated = !self.is_negated();
        self.set_negated(negated);
    }
}

/// AND/OR over an ordered list of children.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundPredicate {
    pub operator: BooleanOperator,
    pub children: Vec<Predicate>,
    pub negated: bool,
}

impl CompoundPredicate {
    /// Creates an empty compound.
    #[must_use]
    pub const fn new(operator: BooleanOperator) -> Self {
        Self {
            operator,
            children: Vec::new(),
            negated: false,
        }
    }

    /// Creates a compound from children, flattening nested compounds with the
    /// same operator.
    #[must_use]
    pub fn with_children(operator: BooleanOperator, children: Vec<Predicate>) -> Self {
        let mut compound = Self::new(operator);
        for child in children {
            compound.push(child);
        }
        compound
    }

    /// Appends a child, keeping insertion order.
    ///
    /// A non-negated child with the same operator is merged: its children are
    /// appended instead of the child itself.
    pub fn push(&mut self, child: Predicate) {
        match child {
            Predicate::Compound(inner) if inner.operator == self.operator && !inner.negated => {
                for grandchild in inner.children {
                    self.push(grandchild);
                }
            }
            other => self.children.push(other),
        }
    }

    /// Flattens the whole subtree in place. Idempotent.
    pub fn flatten(&mut self) {
        let children = std::mem::take(&mut self.children);
        for mut child in children {
            child.flatten();
            self.push(child);
        }
    }

    /// Returns true when there are no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// A comparison, optionally quantified when the right side is a subquery.
#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonPredicate {
    pub left: Expression,
    pub operator: ComparisonOperator,
    pub right: Expression,
    pub quantifier: PredicateQuantifier,
    pub negated: bool,
}

/// `expr [NOT] BETWEEN start AND end`
#[derive(Debug, Clone, PartialEq)]
pub struct BetweenPredicate {
    pub expression: Expression,
    pub start: Expression,
    pub end: Expression,
    pub negated: bool,
}

/// `expr [NOT] LIKE pattern [ESCAPE c]`
#[derive(Debug, Clone, PartialEq)]
pub struct LikePredicate {
    pub expression: Expression,
    pub pattern: Expression,
    pub escape: Option<char>,
    pub case_sensitive: bool,
    pub negated: bool,
}

/// `expr [NOT] IN (...)`. A single subquery element renders as `IN (subquery)`.
#[derive(Debug, Clone, PartialEq)]
pub struct InPredicate {
    pub left: Expression,
    pub right: Vec<Expression>,
    pub negated: bool,
}

/// `[NOT] EXISTS subquery`
#[derive(Debug, Clone, PartialEq)]
pub struct ExistsPredicate {
    pub subquery: Expression,
    pub negated: bool,
}

/// `expr IS [NOT] NULL`
#[derive(Debug, Clone, PartialEq)]
pub struct IsNullPredicate {
    pub expression: Expression,
    pub negated: bool,
}

/// `collection IS [NOT] EMPTY`
#[derive(Debug, Clone, PartialEq)]
pub struct IsEmptyPredicate {
    pub collection: PathExpression,
    pub negated: bool,
}

/// `element [NOT] MEMBER OF collection`
#[derive(Debug, Clone, PartialEq)]
pub struct MemberOfPredicate {
    pub element: Expression,
    pub collection: PathExpression,
    pub negated: bool,
}

/// A boolean-valued expression used as a predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct BooleanPredicate {
    pub expression: Expression,
    pub negated: bool,
}

/// A predicate node.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compound(CompoundPredicate),
    Comparison(ComparisonPredicate),
    Between(BetweenPredicate),
    Like(LikePredicate),
    In(InPredicate),
    Exists(ExistsPredicate),
    IsNull(IsNullPredicate),
    IsEmpty(IsEmptyPredicate),
    MemberOf(MemberOfPredicate),
    Boolean(BooleanPredicate),
}

impl Predicate {
    /// Creates an unquantified comparison.
    #[must_use]
    pub const fn compare(left: Expression, operator: ComparisonOperator, right: Expression) -> Self {
        Self::Comparison(ComparisonPredicate {
            left,
            operator,
            right,
            quantifier: PredicateQuantifier::One,
            negated: false,
        })
    }

    /// `left = right`
    #[must_use]
    pub const fn eq(left: Expression, right: Expression) -> Self {
        Self::compare(left, ComparisonOperator::Eq, right)
    }

    /// `expression IS NULL`
    #[must_use]
    pub const fn is_null(expression: Expression) -> Self {
        Self::IsNull(IsNullPredicate {
            expression,
            negated: false,
        })
    }

    /// `expression IS NOT NULL`
    #[must_use]
    pub const fn is_not_null(expression: Expression) -> Self {
        Self::IsNull(IsNullPredicate {
            expression,
            negated: true,
        })
    }

    /// A predicate that is never true.
    #[must_use]
    pub fn never() -> Self {
        Self::Compound(CompoundPredicate::new(BooleanOperator::Or))
    }

    /// Combines two predicates with AND, flattening nested conjunctions.
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        Self::Compound(CompoundPredicate::with_children(
            BooleanOperator::And,
            vec![self, other],
        ))
    }

    /// Combines two predicates with OR, flattening nested disjunctions.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        Self::Compound(CompoundPredicate::with_children(
            BooleanOperator::Or,
            vec![self, other],
        ))
    }

    /// Returns the predicate with its negation flag flipped.
    #[must_use]
    pub fn negated(mut self) -> Self {
        self.negate();
        self
    }

    /// Flattens nested compounds throughout the tree. Idempotent.
    pub fn flatten(&mut self) {
        if let Self::Compound(compound) = self {
            compound.flatten();
        }
    }

    /// Collapses a compound with a single non-negated child into that child.
    #[must_use]
    pub fn simplified(self) -> Self {
        match self {
            Self::Compound(mut compound) if !compound.negated && compound.children.len() == 1 => {
                compound.children.remove(0)
            }
            other => other,
        }
    }
}

impl Negatable for Predicate {
    fn is_negated(&self) -> bool {
        match self {
            Self::Compound(p) => p.negated,
            Self::Comparison(p) => p.negated,
            Self::Between(p) => p.negated,
            Self::Like(p) => p.negated,
            Self::In(p) => p.negated,
            Self::Exists(p) => p.negated,
            Self::IsNull(p) => p.negated,
            Self::IsEmpty(p) => p.negated,
            Self::MemberOf(p) => p.negated,
            Self::Boolean(p) => p.negated,
        }
    }

    fn set_negated(&mut self, negated: bool) {
        match self {
            Self::Compound(p) => p.negated = negated,
            Self::Comparison(p) => p.negated = negated,
            Self::Between(p) => p.negated = negated,
            Self::Like(p) => p.negated = negated,
            Self::In(p) => p.negated = negated,
            Self::Exists(p) => p.negated = negated,
            Self::IsNull(p) => p.negated = negated,
            Self::IsEmpty(p) => p.negated = negated,
            Self::MemberOf(p) => p.negated = negated,
            Self::Boolean(p) => p.negated = negated,
        }
    }
}

const fn not(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

impl fmt::Display for CompoundPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.children.is_empty() {
            let body = match self.operator {
                BooleanOperator::And => "1 = 1",
                BooleanOperator::Or => "1 = 0",
            };
            return if self.negated {
                write!(f, "NOT ({body})")
            } else {
                f.write_str(body)
            };
        }
        let separator = format!(" {} ", self.operator.as_str());
        let body = self
            .children
            .iter()
            .map(|child| match child {
                Predicate::Compound(inner) if !inner.negated && inner.children.len() > 1 => {
                    format!("({child})")
                }
                _ => child.to_string(),
            })
            .collect::<Vec<_>>()
            .join(&separator);
        if self.negated {
            write!(f, "NOT ({body})")
        } else {
            f.write_str(&body)
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compound(compound) => write!(f, "{compound}"),
            Self::Comparison(p) => {
                let quantifier = match p.quantifier {
                    PredicateQuantifier::One => String::new(),
                    q => format!("{} ", q.as_str()),
                };
                write!(
                    f,
                    "{}{} {} {quantifier}{}",
                    not(p.negated),
                    p.left,
                    p.operator.as_str(),
                    p.right
                )
            }
            Self::Between(p) => write!(
                f,
                "{} {}BETWEEN {} AND {}",
                p.expression,
                not(p.negated),
                p.start,
                p.end
            ),
            Self::Like(p) => {
                if p.case_sensitive {
                    write!(f, "{} {}LIKE {}", p.expression, not(p.negated), p.pattern)?;
                } else {
                    write!(
                        f,
                        "UPPER({}) {}LIKE UPPER({})",
                        p.expression,
                        not(p.negated),
                        p.pattern
                    )?;
                }
                if let Some(escape) = p.escape {
                    write!(f, " ESCAPE '{escape}'")?;
                }
                Ok(())
            }
            Self::In(p) => match p.right.as_slice() {
                [subquery @ (Expression::Subquery(_) | Expression::SubqueryRef(_))] => {
                    write!(f, "{} {}IN {subquery}", p.left, not(p.negated))
                }
                list => write!(f, "{} {}IN ({})", p.left, not(p.negated), join(list)),
            },
            Self::Exists(p) => write!(f, "{}EXISTS {}", not(p.negated), p.subquery),
            Self::IsNull(p) => write!(f, "{} IS {}NULL", p.expression, not(p.negated)),
            Self::IsEmpty(p) => write!(f, "{} IS {}EMPTY", p.collection, not(p.negated)),
            Self::MemberOf(p) => write!(
                f,
                "{} {}MEMBER OF {}",
                p.element,
                not(p.negated),
                p.collection
            ),
            Self::Boolean(p) => write!(f, "{}{}", not(p.negated), p.expression),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expression::Literal;

    fn cmp(path: &str, op: ComparisonOperator, value: i64) -> Predicate {
        Predicate::compare(Expression::path(path), op, Expression::value(value))
    }

    #[test]
    fn nested_and_is_flattened() {
        let a = cmp("a", ComparisonOperator::Eq, 1);
        let b = cmp("b", ComparisonOperator::Eq, 2);
        let c = cmp("c", ComparisonOperator::Eq, 3);
        let combined = a.clone().and(b.clone()).and(c.clone());
        let Predicate::Compound(compound) = &combined else {
            panic!("expected compound");
        };
        assert_eq!(compound.children, vec![a, b, c]);
        assert_eq!(combined.to_string(), "a = 1 AND b = 2 AND c = 3");
    }

    #[test]
    fn negated_children_are_not_merged() {
        let inner = cmp("a", ComparisonOperator::Eq, 1)
            .and(cmp("b", ComparisonOperator::Eq, 2))
            .negated();
        let combined = inner.and(cmp("c", ComparisonOperator::Eq, 3));
        let Predicate::Compound(compound) = &combined else {
            panic!("expected compound");
        };
        assert_eq!(compound.children.len(), 2);
        assert_eq!(combined.to_string(), "NOT (a = 1 AND b = 2) AND c = 3");
    }

    #[test]
    fn flatten_is_idempotent() {
        let mut tree = Predicate::Compound(CompoundPredicate {
            operator: BooleanOperator::And,
            children: vec![
                Predicate::Compound(CompoundPredicate {
                    operator: BooleanOperator::And,
                    children: vec![
                        cmp("a", ComparisonOperator::Lt, 1),
                        Predicate::Compound(CompoundPredicate {
                            operator: BooleanOperator::And,
                            children: vec![cmp("b", ComparisonOperator::Gt, 2)],
                            negated: false,
                        }),
                    ],
                    negated: false,
                }),
                cmp("c", ComparisonOperator::Le, 3),
            ],
            negated: false,
        });
        tree.flatten();
        let once = tree.clone();
        tree.flatten();
        assert_eq!(tree, once);
        assert_eq!(tree.to_string(), "a < 1 AND b > 2 AND c <= 3");
    }

    #[test]
    fn mixed_operators_are_parenthesized() {
        let p = cmp("age", ComparisonOperator::Gt, 30).or(cmp("age", ComparisonOperator::Eq, 30)
            .and(cmp("id", ComparisonOperator::Gt, 5)));
        assert_eq!(p.to_string(), "age > 30 OR (age = 30 AND id > 5)");
    }

    #[test]
    fn negation_is_a_flag() {
        let mut p = Predicate::is_null(Expression::path("c.name"));
        p.negate();
        assert!(matches!(&p, Predicate::IsNull(inner) if inner.negated));
        assert_eq!(p.to_string(), "c.name IS NOT NULL");
        p.negate();
        assert!(!p.is_negated());
    }

    #[test]
    fn quantified_comparison_display() {
        let p = Predicate::Comparison(ComparisonPredicate {
            left: Expression::path("c.age"),
            operator: ComparisonOperator::Lt,
            right: Expression::SubqueryRef(String::from("ages")),
            quantifier: PredicateQuantifier::All,
            negated: true,
        });
        assert_eq!(p.to_string(), "NOT c.age < ALL ages");
    }

    #[test]
    fn empty_compounds_have_constant_truth() {
        assert_eq!(Predicate::never().to_string(), "1 = 0");
        let always = Predicate::Compound(CompoundPredicate::new(BooleanOperator::And));
        assert_eq!(always.to_string(), "1 = 1");
        let lit = Predicate::Boolean(BooleanPredicate {
            expression: Expression::Literal(Literal::Boolean(true)),
            negated: true,
        });
        assert_eq!(lit.to_string(), "NOT TRUE");
    }
}
