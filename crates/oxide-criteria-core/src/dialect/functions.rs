//! Function strategies.
//!
//! Every function the renderer emits goes through a [`FunctionStrategy`]
//! looked up in the dialect's [`FunctionRegistry`]. A strategy knows whether
//! the function is a scalar, an aggregate or a window-only function, infers
//! its result type and writes the product specific call.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::ast::{Expression, FunctionExpression, Literal, ValueType};
use crate::error::{CriteriaError, Result};

/// Where a function may be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar,
    /// Usable plain or with OVER.
    Aggregate,
    /// Only valid with OVER.
    Window,
}

/// A function call whose arguments are already rendered.
#[derive(Debug)]
pub struct FunctionCall<'a> {
    pub function: &'a FunctionExpression,
    /// Rendered SQL of each argument, in order.
    pub args: Vec<String>,
}

impl FunctionCall<'_> {
    fn distinct(&self) -> &'static str {
        if self.function.distinct {
            "DISTINCT "
        } else {
            ""
        }
    }
}

/// Renders one function for one dialect.
pub trait FunctionStrategy: Send + Sync {
    /// Upper-cased name used in expression text.
    fn name(&self) -> &'static str;

    fn kind(&self) -> FunctionKind;

    /// The function is only valid with an OVER clause.
    fn requires_over(&self) -> bool {
        self.kind() == FunctionKind::Window
    }

    /// Result type for the given argument types.
    fn return_type(&self, argument_types: &[ValueType]) -> ValueType;

    /// Writes the call without FILTER and OVER.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::IllegalArgument`] for a wrong number or form
    /// of arguments.
    fn render(&self, call: &FunctionCall<'_>) -> Result<String>;
}

/// A function rendered as `NAME(args)` or as an infix operator chain.
#[derive(Debug, Clone)]
pub struct StandardFunction {
    name: &'static str,
    sql_name: &'static str,
    kind: FunctionKind,
    return_type: fn(&[ValueType]) -> ValueType,
    infix: Option<&'static str>,
    min_args: usize,
    max_args: Option<usize>,
}

impl StandardFunction {
    const fn new(
        name: &'static str,
        kind: FunctionKind,
        return_type: fn(&[ValueType]) -> ValueType,
    ) -> Self {
        Self {
            name,
            sql_name: name,
            kind,
            return_type,
            infix: None,
            min_args: 1,
            max_args: Some(1),
        }
    }

    #[must_use]
    pub const fn scalar(name: &'static str, return_type: fn(&[ValueType]) -> ValueType) -> Self {
        Self::new(name, FunctionKind::Scalar, return_type)
    }

    #[must_use]
    pub const fn aggregate(name: &'static str, return_type: fn(&[ValueType]) -> ValueType) -> Self {
        Self::new(name, FunctionKind::Aggregate, return_type)
    }

    #[must_use]
    pub const fn window(name: &'static str, return_type: fn(&[ValueType]) -> ValueType) -> Self {
        Self::new(name, FunctionKind::Window, return_type)
    }

    /// Emits a different function name in SQL.
    #[must_use]
    pub const fn renamed(mut self, sql_name: &'static str) -> Self {
        self.sql_name = sql_name;
        self
    }

    /// Emits `(a op b op c)` instead of a call.
    #[must_use]
    pub const fn infix(mut self, operator: &'static str) -> Self {
        self.infix = Some(operator);
        self
    }

    /// Accepted argument count; `None` means unbounded.
    #[must_use]
    pub const fn arity(mut self, min: usize, max: Option<usize>) -> Self {
        self.min_args = min;
        self.max_args = max;
        self
    }
}

impl FunctionStrategy for StandardFunction {
    fn name(&self) -> &'static str {
        self.name
    }

    fn kind(&self) -> FunctionKind {
        self.kind
    }

    fn return_type(&self, argument_types: &[ValueType]) -> ValueType {
        (self.return_type)(argument_types)
    }

    fn render(&self, call: &FunctionCall<'_>) -> Result<String> {
        let count = call.args.len();
        if count < self.min_args || self.max_args.is_some_and(|max| count > max) {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => format!("{max}"),
                Some(max) => format!("{} to {max}", self.min_args),
                None => format!("at least {}", self.min_args),
            };
            return Err(CriteriaError::illegal_argument(format!(
                "{} expects {expected} arguments but got {count}",
                self.name
            )));
        }
        if call.function.distinct && self.kind != FunctionKind::Aggregate {
            return Err(CriteriaError::illegal_argument(format!(
                "DISTINCT is only allowed in aggregate functions, not in {}",
                self.name
            )));
        }
        if let Some(operator) = self.infix {
            return Ok(format!("({})", call.args.join(&format!(" {operator} "))));
        }
        if count == 0 && self.kind == FunctionKind::Aggregate {
            return Ok(format!("{}(*)", self.sql_name));
        }
        Ok(format!(
            "{}({}{})",
            self.sql_name,
            call.distinct(),
            call.args.join(", ")
        ))
    }
}

/// Product spelling of string aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupConcatStyle {
    /// `GROUP_CONCAT(x ORDER BY o SEPARATOR s)`
    GroupConcat,
    /// `GROUP_CONCAT(x, s ORDER BY o)`
    GroupConcatSeparatorArgument,
    /// `STRING_AGG(x, s ORDER BY o)`
    StringAgg,
    /// `STRING_AGG(x, s) WITHIN GROUP (ORDER BY o)`
    StringAggWithinGroup,
    /// `LISTAGG(x, s) WITHIN GROUP (ORDER BY o)`
    ListAgg,
}

/// `GROUP_CONCAT(value [, separator] [, 'ORDER BY', expr [, 'ASC'|'DESC'] ...])`
#[derive(Debug, Clone, Copy)]
pub struct GroupConcatFunction {
    style: GroupConcatStyle,
}

impl GroupConcatFunction {
    #[must_use]
    pub const fn new(style: GroupConcatStyle) -> Self {
        Self { style }
    }
}

fn string_literal(expression: Option<&Expression>) -> Option<&str> {
    match expression {
        Some(Expression::Literal(Literal::String(text))) => Some(text),
        _ => None,
    }
}

impl FunctionStrategy for GroupConcatFunction {
    fn name(&self) -> &'static str {
        "GROUP_CONCAT"
    }

    fn kind(&self) -> FunctionKind {
        FunctionKind::Aggregate
    }

    fn return_type(&self, _argument_types: &[ValueType]) -> ValueType {
        ValueType::String
    }

    fn render(&self, call: &FunctionCall<'_>) -> Result<String> {
        let raw = &call.function.args;
        let Some(value) = call.args.first() else {
            return Err(CriteriaError::illegal_argument(
                "GROUP_CONCAT expects the expression to concatenate",
            ));
        };
        let is_marker =
            |i: usize| string_literal(raw.get(i)).is_some_and(|s| s.eq_ignore_ascii_case("ORDER BY"));

        let mut index = 1;
        let mut separator = String::from("','");
        if index < raw.len() && !is_marker(index) {
            separator.clone_from(&call.args[index]);
            index += 1;
        }
        let mut order_by = Vec::new();
        if index < raw.len() {
            if !is_marker(index) {
                return Err(CriteriaError::illegal_argument(
                    "GROUP_CONCAT expects 'ORDER BY' after the separator",
                ));
            }
            index += 1;
            while index < raw.len() {
                let expression = &call.args[index];
                index += 1;
                let direction = match string_literal(raw.get(index)) {
                    Some(d) if d.eq_ignore_ascii_case("ASC") || d.eq_ignore_ascii_case("DESC") => {
                        index += 1;
                        d.to_ascii_uppercase()
                    }
                    _ => String::from("ASC"),
                };
                order_by.push(format!("{expression} {direction}"));
            }
        }

        let distinct = call.distinct();
        let ordering = if order_by.is_empty() {
            String::new()
        } else {
            format!(" ORDER BY {}", order_by.join(", "))
        };
        Ok(match self.style {
            GroupConcatStyle::GroupConcat => {
                format!("GROUP_CONCAT({distinct}{value}{ordering} SEPARATOR {separator})")
            }
            GroupConcatStyle::GroupConcatSeparatorArgument => {
                format!("GROUP_CONCAT({distinct}{value}, {separator}{ordering})")
            }
            GroupConcatStyle::StringAgg => {
                format!("STRING_AGG({distinct}{value}, {separator}{ordering})")
            }
            GroupConcatStyle::StringAggWithinGroup => {
                if call.function.distinct {
                    return Err(CriteriaError::illegal_argument(
                        "GROUP_CONCAT cannot be DISTINCT on this dbms",
                    ));
                }
                let within = if order_by.is_empty() {
                    String::new()
                } else {
                    format!(" WITHIN GROUP ({})", ordering.trim_start())
                };
                format!("STRING_AGG({value}, {separator}){within}")
            }
            GroupConcatStyle::ListAgg => {
                let within = if order_by.is_empty() {
                    format!("ORDER BY {value}")
                } else {
                    String::from(ordering.trim_start())
                };
                format!("LISTAGG({distinct}{value}, {separator}) WITHIN GROUP ({within})")
            }
        })
    }
}

fn first_argument(types: &[ValueType]) -> ValueType {
    types.first().cloned().unwrap_or_default()
}

fn first_known(types: &[ValueType]) -> ValueType {
    types
        .iter()
        .find(|t| **t != ValueType::Unknown)
        .cloned()
        .unwrap_or_default()
}

fn sum_type(types: &[ValueType]) -> ValueType {
    match types.first() {
        Some(ValueType::Integer | ValueType::Long) => ValueType::Long,
        Some(ValueType::Decimal) => ValueType::Decimal,
        Some(ValueType::Unknown) | None => ValueType::Unknown,
        Some(_) => ValueType::Double,
    }
}

/// Function strategies by name.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: BTreeMap<&'static str, Arc<dyn FunctionStrategy>>,
}

impl FunctionRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ranking, navigation, aggregate and common scalar functions with their
    /// standard SQL spelling.
    #[must_use]
    pub fn standard(group_concat: GroupConcatStyle) -> Self {
        let integer = |_: &[ValueType]| ValueType::Integer;
        let long = |_: &[ValueType]| ValueType::Long;
        let double = |_: &[ValueType]| ValueType::Double;
        let string = |_: &[ValueType]| ValueType::String;
        Self::new()
            .with(StandardFunction::window("ROW_NUMBER", integer).arity(0, Some(0)))
            .with(StandardFunction::window("RANK", integer).arity(0, Some(0)))
            .with(StandardFunction::window("DENSE_RANK", integer).arity(0, Some(0)))
            .with(StandardFunction::window("PERCENT_RANK", double).arity(0, Some(0)))
            .with(StandardFunction::window("CUME_DIST", double).arity(0, Some(0)))
            .with(StandardFunction::window("NTILE", integer))
            .with(StandardFunction::window("LAG", first_argument).arity(1, Some(3)))
            .with(StandardFunction::window("LEAD", first_argument).arity(1, Some(3)))
            .with(StandardFunction::window("FIRST_VALUE", first_argument))
            .with(StandardFunction::window("LAST_VALUE", first_argument))
            .with(StandardFunction::window("NTH_VALUE", first_argument).arity(2, Some(2)))
            .with(StandardFunction::aggregate("COUNT", long).arity(0, Some(1)))
            .with(StandardFunction::aggregate("SUM", sum_type))
            .with(StandardFunction::aggregate("AVG", double))
            .with(StandardFunction::aggregate("MIN", first_argument))
            .with(StandardFunction::aggregate("MAX", first_argument))
            .with(GroupConcatFunction::new(group_concat))
            .with(StandardFunction::scalar("UPPER", string))
            .with(StandardFunction::scalar("LOWER", string))
            .with(StandardFunction::scalar("LENGTH", integer))
            .with(StandardFunction::scalar("CONCAT", string).arity(1, None))
            .with(StandardFunction::scalar("SUBSTRING", string).arity(2, Some(3)))
            .with(StandardFunction::scalar("TRIM", string))
            .with(StandardFunction::scalar("ABS", first_argument))
            .with(StandardFunction::scalar("SQRT", double))
            .with(StandardFunction::scalar("MOD", first_argument).arity(2, Some(2)))
            .with(StandardFunction::scalar("COALESCE", first_known).arity(1, None))
            .with(StandardFunction::scalar("NULLIF", first_argument).arity(2, Some(2)))
    }

    /// Adds or replaces a strategy.
    #[must_use]
    pub fn with(mut self, strategy: impl FunctionStrategy + 'static) -> Self {
        self.register(Arc::new(strategy));
        self
    }

    /// Adds or replaces a strategy.
    pub fn register(&mut self, strategy: Arc<dyn FunctionStrategy>) {
        self.functions.insert(strategy.name(), strategy);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&dyn FunctionStrategy> {
        self.functions.get(name).map(AsRef::as_ref)
    }

    /// Looks up a strategy, failing for unknown functions.
    ///
    /// # Errors
    ///
    /// Returns [`CriteriaError::IllegalArgument`] naming the function.
    pub fn resolve(&self, name: &str) -> Result<&dyn FunctionStrategy> {
        self.get(name)
            .ok_or_else(|| CriteriaError::illegal_argument(format!("unknown function {name}")))
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.functions.keys().copied()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.functions.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(registry: &FunctionRegistry, function: &FunctionExpression) -> Result<String> {
        let call = FunctionCall {
            function,
            args: function.args.iter().map(ToString::to_string).collect(),
        };
        registry.resolve(&function.name)?.render(&call)
    }

    fn group_concat(args: Vec<Expression>) -> FunctionExpression {
        FunctionExpression::new("GROUP_CONCAT", args)
    }

    fn text(s: &str) -> Expression {
        Expression::Literal(Literal::String(String::from(s)))
    }

    #[test]
    fn group_concat_styles() {
        let function = group_concat(vec![
            Expression::path("c.name"),
            text(", "),
            text("ORDER BY"),
            Expression::path("c.age"),
            text("DESC"),
        ]);
        let expected = [
            (
                GroupConcatStyle::GroupConcat,
                "GROUP_CONCAT(c.name ORDER BY c.age DESC SEPARATOR ', ')",
            ),
            (
                GroupConcatStyle::GroupConcatSeparatorArgument,
                "GROUP_CONCAT(c.name, ', ' ORDER BY c.age DESC)",
            ),
            (
                GroupConcatStyle::StringAgg,
                "STRING_AGG(c.name, ', ' ORDER BY c.age DESC)",
            ),
            (
                GroupConcatStyle::StringAggWithinGroup,
                "STRING_AGG(c.name, ', ') WITHIN GROUP (ORDER BY c.age DESC)",
            ),
            (
                GroupConcatStyle::ListAgg,
                "LISTAGG(c.name, ', ') WITHIN GROUP (ORDER BY c.age DESC)",
            ),
        ];
        for (style, sql) in expected {
            let registry = FunctionRegistry::standard(style);
            assert_eq!(render(&registry, &function).unwrap(), sql);
        }
    }

    #[test]
    fn group_concat_defaults() {
        let registry = FunctionRegistry::standard(GroupConcatStyle::ListAgg);
        let function = group_concat(vec![Expression::path("c.name")]);
        assert_eq!(
            render(&registry, &function).unwrap(),
            "LISTAGG(c.name, ',') WITHIN GROUP (ORDER BY c.name)"
        );
    }

    #[test]
    fn arity_is_checked() {
        let registry = FunctionRegistry::standard(GroupConcatStyle::StringAgg);
        let err = render(&registry, &FunctionExpression::new("NULLIF", vec![Expression::value(1)]))
            .unwrap_err();
        assert_eq!(err.to_string(), "NULLIF expects 2 arguments but got 1");
        assert_eq!(
            render(&registry, &FunctionExpression::new("COUNT", vec![])).unwrap(),
            "COUNT(*)"
        );
    }

    #[test]
    fn overrides_replace_spelling() {
        let registry = FunctionRegistry::standard(GroupConcatStyle::ListAgg)
            .with(StandardFunction::scalar("CONCAT", |_| ValueType::String).arity(1, None).infix("||"));
        let function = FunctionExpression::new(
            "CONCAT",
            vec![Expression::path("c.name"), text("-"), Expression::path("c.id")],
        );
        assert_eq!(render(&registry, &function).unwrap(), "(c.name || '-' || c.id)");
    }

    #[test]
    fn return_types() {
        let registry = FunctionRegistry::standard(GroupConcatStyle::ListAgg);
        let ty = |name: &str, args: &[ValueType]| registry.get(name).unwrap().return_type(args);
        assert_eq!(ty("COUNT", &[]), ValueType::Long);
        assert_eq!(ty("SUM", &[ValueType::Integer]), ValueType::Long);
        assert_eq!(ty("AVG", &[ValueType::Integer]), ValueType::Double);
        assert_eq!(ty("ROW_NUMBER", &[]), ValueType::Integer);
        assert_eq!(ty("CUME_DIST", &[]), ValueType::Double);
        assert_eq!(
            ty("COALESCE", &[ValueType::Unknown, ValueType::String]),
            ValueType::String
        );
        assert!(registry.get("RANK").unwrap().requires_over());
        assert!(!registry.get("SUM").unwrap().requires_over());
        assert!(registry.resolve("FOO").is_err());
    }
}
