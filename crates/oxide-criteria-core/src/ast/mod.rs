//! Abstract Syntax Tree (AST) types for criteria queries.

mod clause;
mod copy;
mod expression;
mod predicate;
mod statement;
mod types;
mod visitor;

pub use clause::ClauseType;
pub use copy::{CopyContext, DeepCopy};
pub use expression::{
    ArithmeticOperator, CaseWhenExpression, CollectionOperator, Expression, FrameBound, FrameMode,
    FunctionExpression, Literal, Parameter, PathExpression, SubqueryExpression, WhenClause,
    WindowDefinition, WindowExpression, WindowFrame, WindowReference,
};
pub use predicate::{
    BetweenPredicate, BooleanOperator, BooleanPredicate, ComparisonOperator, ComparisonPredicate,
    CompoundPredicate, ExistsPredicate, InPredicate, IsEmptyPredicate, IsNullPredicate,
    LikePredicate, MemberOfPredicate, Negatable, Predicate, PredicateQuantifier,
};
pub use statement::{
    Assignment, CteBody, CteDefinition, DmlKind, DmlStatement, FromSource, JoinNode, JoinTarget,
    JoinType, NamedWindow, OrderByExpression, QuerySpec, SelectItem, SelectStatement,
    SetOperation, SetOperator, ValuesSource,
};
pub use types::ValueType;
pub use visitor::{
    Visitor, VisitorMut, walk_expression, walk_expression_mut, walk_function, walk_predicate,
    walk_predicate_mut, walk_query_spec, walk_query_spec_mut, walk_window_definition,
};
