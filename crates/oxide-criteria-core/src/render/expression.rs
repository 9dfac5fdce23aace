//! Expression and predicate rendering.

use tracing::debug;

use super::{MARKER, Renderer};
use crate::ast::{
    ArithmeticOperator, BooleanOperator, ClauseType, CollectionOperator, CompoundPredicate,
    Expression, FunctionExpression, Literal, OrderByExpression, PathExpression, Predicate,
    PredicateQuantifier, QuerySpec, Visitor, WindowDefinition, WindowExpression, WindowReference,
    walk_function,
};
use crate::dialect::{DbmsDialect, FunctionCall, FunctionKind, FunctionRegistry};
use crate::error::{CriteriaError, Result};
use crate::metamodel::AttributeKind;

fn negate(negated: bool, body: String) -> String {
    if negated { format!("NOT ({body})") } else { body }
}

const fn not(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

/// Finds aggregates outside of windows and subqueries.
struct AggregateFinder<'r> {
    functions: &'r FunctionRegistry,
    size_is_aggregate: bool,
    found: bool,
}

impl Visitor for AggregateFinder<'_> {
    fn visit_function(&mut self, function: &FunctionExpression) {
        let aggregate = self
            .functions
            .get(&function.name)
            .is_some_and(|strategy| strategy.kind() == FunctionKind::Aggregate);
        if aggregate {
            self.found = true;
        } else {
            walk_function(self, function);
        }
    }

    fn visit_window(&mut self, _window: &WindowExpression) {}

    fn visit_subquery(&mut self, _query: &QuerySpec) {}

    fn visit_collection_path(&mut self, operator: CollectionOperator, _path: &PathExpression) {
        if operator == CollectionOperator::Size && self.size_is_aggregate {
            self.found = true;
        }
    }
}

impl<'a> Renderer<'a> {
    /// Returns true when the expression aggregates rows of its own query.
    pub(super) fn contains_aggregate(&self, expression: &Expression) -> bool {
        let mut finder = AggregateFinder {
            functions: self.dialect.functions(),
            size_is_aggregate: !self.config.size_to_count_transformation,
            found: false,
        };
        expression.accept(&mut finder);
        finder.found
    }

    pub(super) fn expression(&mut self, expression: &Expression) -> Result<String> {
        match expression {
            Expression::Path(path) => self.resolve_column(path, false),
            Expression::Outer(path) => self.resolve_column(path, true),
            Expression::Literal(literal) => self.literal(literal),
            Expression::Parameter(parameter) => {
                let value = self.bindings.get(parameter).cloned().ok_or_else(|| {
                    CriteriaError::illegal_argument(format!(
                        "no value bound for parameter {parameter}"
                    ))
                })?;
                Ok(self.bind(value))
            }
            Expression::Value(value) => Ok(self.bind(value.clone())),
            Expression::Function(function) => self.function(function, false),
            Expression::Window(window) => self.window(window),
            Expression::Arithmetic { op, left, right } => {
                let left = self.operand(left, *op, false)?;
                let right = self.operand(right, *op, true)?;
                Ok(format!("{left} {} {right}", op.as_str()))
            }
            Expression::Negation(inner) => {
                let rendered = self.expression(inner)?;
                Ok(if matches!(inner.as_ref(), Expression::Arithmetic { .. }) {
                    format!("-({rendered})")
                } else {
                    format!("-{rendered}")
                })
            }
            Expression::CaseWhen(case) => {
                let mut sql = String::from("CASE");
                if let Some(operand) = &case.operand {
                    sql.push(' ');
                    sql.push_str(&self.expression(operand)?);
                }
                for clause in &case.when_clauses {
                    let condition = match &clause.condition {
                        Expression::Predicate(predicate) => self.predicate(predicate)?,
                        other => self.expression(other)?,
                    };
                    let result = self.expression(&clause.result)?;
                    sql.push_str(&format!(" WHEN {condition} THEN {result}"));
                }
                if let Some(otherwise) = &case.else_result {
                    sql.push_str(" ELSE ");
                    sql.push_str(&self.expression(otherwise)?);
                }
                sql.push_str(" END");
                Ok(sql)
            }
            Expression::Collection { op, path } => self.collection(*op, path),
            Expression::Subquery(subquery) => self.subquery(&subquery.query),
            Expression::SubqueryRef(name) => Err(CriteriaError::illegal_argument(format!(
                "subquery '{name}' was never provided"
            ))),
            Expression::Tuple(items) => {
                let mut rendered = Vec::with_capacity(items.len());
                for item in items {
                    rendered.push(self.expression(item)?);
                }
                Ok(format!("({})", rendered.join(", ")))
            }
            Expression::Predicate(predicate) => {
                let rendered = self.predicate(predicate)?;
                Ok(match predicate.as_ref() {
                    Predicate::Compound(compound) if compound.children.len() > 1 => {
                        format!("({rendered})")
                    }
                    _ => rendered,
                })
            }
        }
    }

    fn operand(
        &mut self,
        operand: &Expression,
        parent: ArithmeticOperator,
        right_side: bool,
    ) -> Result<String> {
        let rendered = self.expression(operand)?;
        if let Expression::Arithmetic { op, .. } = operand {
            let precedence = op.precedence();
            if precedence < parent.precedence()
                || (right_side && precedence == parent.precedence())
            {
                return Ok(format!("({rendered})"));
            }
        }
        Ok(rendered)
    }

    fn literal(&self, literal: &Literal) -> Result<String> {
        Ok(match literal {
            Literal::Integer(n) => n.to_string(),
            Literal::Decimal(d) => format!("{d:?}"),
            Literal::String(s) => {
                if s.contains(MARKER) {
                    return Err(CriteriaError::illegal_argument(
                        "string literals cannot contain control characters",
                    ));
                }
                format!("'{}'", s.replace('\'', "''"))
            }
            Literal::Boolean(b) => match (self.dialect.supports_boolean_literals(), b) {
                (true, true) => String::from("TRUE"),
                (true, false) => String::from("FALSE"),
                (false, true) => String::from("1"),
                (false, false) => String::from("0"),
            },
            Literal::Null => String::from("NULL"),
            Literal::CurrentDate => String::from("CURRENT_DATE"),
            Literal::CurrentTime => String::from("CURRENT_TIME"),
            Literal::CurrentTimestamp => String::from("CURRENT_TIMESTAMP"),
        })
    }

    pub(super) fn arguments(&mut self, args: &[Expression]) -> Result<Vec<String>> {
        let mut rendered = Vec::with_capacity(args.len());
        for arg in args {
            rendered.push(self.expression(arg)?);
        }
        Ok(rendered)
    }

    fn function(&mut self, function: &FunctionExpression, windowed: bool) -> Result<String> {
        let dialect: &'a dyn DbmsDialect = self.dialect;
        let strategy = dialect.functions().resolve(&function.name)?;
        if strategy.requires_over() && !windowed {
            return Err(CriteriaError::illegal_argument(format!(
                "{} requires an OVER clause",
                function.name
            )));
        }
        let aggregate = strategy.kind() == FunctionKind::Aggregate;
        if aggregate && !windowed {
            if !self.clause.allows_aggregates() {
                return Err(CriteriaError::InvalidClause {
                    clause: self.clause,
                    construct: format!("aggregate function {}", function.name),
                });
            }
            if self.clause == ClauseType::Select {
                self.scope_mut()?.has_aggregate = true;
            }
        }
        let Some(filter) = &function.filter else {
            let args = self.arguments(&function.args)?;
            return strategy.render(&FunctionCall { function, args });
        };
        if !aggregate {
            return Err(CriteriaError::illegal_argument(format!(
                "FILTER requires an aggregate function, {} is not one",
                function.name
            )));
        }
        let condition = self.predicate(filter)?;
        if dialect.supports_filter_clause() {
            let args = self.arguments(&function.args)?;
            let call = strategy.render(&FunctionCall { function, args })?;
            return Ok(format!("{call} FILTER (WHERE {condition})"));
        }
        debug!(
            dialect = dialect.name(),
            function = %function.name,
            "emulating FILTER clause"
        );
        let mut emulated = FunctionExpression {
            filter: None,
            ..function.clone()
        };
        let mut args = self.arguments(&function.args)?;
        match args.first_mut() {
            Some(first) => *first = format!("CASE WHEN {condition} THEN {first} END"),
            None => {
                emulated.args = vec![Expression::Literal(Literal::Integer(1))];
                args.push(format!("CASE WHEN {condition} THEN 1 END"));
            }
        }
        strategy.render(&FunctionCall {
            function: &emulated,
            args,
        })
    }

    fn window(&mut self, window: &WindowExpression) -> Result<String> {
        if !self.dialect.supports_window_functions() {
            return Err(CriteriaError::unsupported(
                "window functions",
                self.dialect.name(),
            ));
        }
        if !self.clause.allows_window_functions() {
            return Err(CriteriaError::InvalidClause {
                clause: self.clause,
                construct: format!("window function {}", window.function.name),
            });
        }
        let call = self.function(&window.function, true)?;
        let definition = match &window.window {
            WindowReference::Named(name) => {
                let named = self.named_window(name)?;
                self.merged_window(&named, 0)?
            }
            WindowReference::Inline(definition) => self.merged_window(definition, 0)?,
        };
        let previous = std::mem::replace(&mut self.clause, ClauseType::Window);
        let body = self.window_definition(&definition);
        self.clause = previous;
        Ok(format!("{call} OVER ({})", body?))
    }

    fn named_window(&self, name: &str) -> Result<WindowDefinition> {
        self.scope()?
            .windows
            .iter()
            .find(|window| window.name == name)
            .map(|window| window.definition.clone())
            .ok_or_else(|| CriteriaError::illegal_argument(format!("unknown window '{name}'")))
    }

    /// Inlines the chain of base windows a definition extends.
    fn merged_window(&self, definition: &WindowDefinition, depth: usize) -> Result<WindowDefinition> {
        let Some(base) = &definition.base else {
            return Ok(definition.clone());
        };
        if depth > self.scope()?.windows.len() {
            return Err(CriteriaError::illegal_argument(format!(
                "window '{base}' extends itself"
            )));
        }
        let base = self.merged_window(&self.named_window(base)?, depth + 1)?;
        let mut partition_by = base.partition_by;
        partition_by.extend(definition.partition_by.iter().cloned());
        Ok(WindowDefinition {
            base: None,
            partition_by,
            order_by: if definition.order_by.is_empty() {
                base.order_by
            } else {
                definition.order_by.clone()
            },
            frame: definition.frame.or(base.frame),
        })
    }

    fn window_definition(&mut self, definition: &WindowDefinition) -> Result<String> {
        let mut parts = Vec::new();
        if !definition.partition_by.is_empty() {
            parts.push(format!(
                "PARTITION BY {}",
                self.arguments(&definition.partition_by)?.join(", ")
            ));
        }
        if !definition.order_by.is_empty() {
            parts.push(format!("ORDER BY {}", self.order_by_list(&definition.order_by)?));
        }
        if let Some(frame) = &definition.frame {
            parts.push(frame.to_string());
        }
        Ok(parts.join(" "))
    }

    /// Renders ORDER BY elements through the dialect's null precedence hook.
    pub(super) fn order_by_list(&mut self, items: &[OrderByExpression]) -> Result<String> {
        let mut sql = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let rendered = self.expression(&item.expression)?;
            self.dialect.append_order_by_element(&mut sql, item, &rendered);
        }
        Ok(sql)
    }

    fn collection(&mut self, op: CollectionOperator, path: &PathExpression) -> Result<String> {
        match op {
            CollectionOperator::Size => self.size(path),
            CollectionOperator::Value => self.resolve_column(path, false),
            CollectionOperator::Index | CollectionOperator::Key => {
                let joined = if path.is_simple() {
                    self.joined_collection(path.head())
                } else {
                    None
                };
                let (qualifier, attribute, _) = joined.ok_or_else(|| {
                    CriteriaError::path(
                        path.to_string(),
                        format!("{} requires the alias of a joined collection", op.as_str()),
                    )
                })?;
                let column = match (&attribute.kind, op) {
                    (AttributeKind::OneToMany { index_column, .. }, CollectionOperator::Index) => {
                        index_column.as_deref()
                    }
                    (AttributeKind::OneToMany { key_column, .. }, _) => key_column.as_deref(),
                    _ => None,
                };
                column
                    .map(|column| format!("{qualifier}.{column}"))
                    .ok_or_else(|| {
                        CriteriaError::path(
                            path.to_string(),
                            format!(
                                "collection '{}' has no {} column",
                                attribute.name,
                                if op == CollectionOperator::Index { "index" } else { "key" }
                            ),
                        )
                    })
            }
        }
    }

    fn size(&mut self, path: &PathExpression) -> Result<String> {
        let collection = self.resolve_collection(path)?;
        let join_form = !self.config.size_to_count_transformation
            && collection.scope == self.scope_index()?
            && matches!(
                self.clause,
                ClauseType::Select | ClauseType::Having | ClauseType::OrderBy
            );
        if join_form {
            debug!(path = %path, "rendering SIZE as a grouped join");
            let alias = self.size_join(&collection, path.last());
            if self.clause == ClauseType::Select {
                self.scope_mut()?.has_aggregate = true;
            }
            return Ok(format!(
                "COUNT(DISTINCT {alias}.{})",
                collection.target.id_column()
            ));
        }
        let alias = self.generated_alias("size");
        Ok(format!(
            "(SELECT COUNT(*) FROM {} {alias} WHERE {alias}.{} = {}.{})",
            collection.target.table,
            collection.mapped_column,
            collection.owner_qualifier,
            collection.owner.id_column()
        ))
    }

    /// `EXISTS` over the elements of a collection, with an extra condition on
    /// the element alias.
    fn collection_exists(
        &mut self,
        path: &PathExpression,
        negated: bool,
        element: Option<&Expression>,
    ) -> Result<String> {
        let collection = self.resolve_collection(path)?;
        let alias = self.generated_alias("elements");
        let mut sql = format!(
            "{}EXISTS (SELECT 1 FROM {} {alias} WHERE {alias}.{} = {}.{}",
            not(negated),
            collection.target.table,
            collection.mapped_column,
            collection.owner_qualifier,
            collection.owner.id_column()
        );
        if let Some(element) = element {
            let element = self.expression(element)?;
            sql.push_str(&format!(
                " AND {alias}.{} = {element}",
                collection.target.id_column()
            ));
        }
        sql.push(')');
        Ok(sql)
    }

    pub(super) fn predicate(&mut self, predicate: &Predicate) -> Result<String> {
        match predicate {
            Predicate::Compound(compound) => self.compound(compound),
            Predicate::Comparison(p) => {
                if p.quantifier != PredicateQuantifier::One
                    && !matches!(p.right, Expression::Subquery(_))
                {
                    return Err(CriteriaError::illegal_argument(format!(
                        "{} needs a subquery on the right side",
                        p.quantifier.as_str()
                    )));
                }
                let left = self.expression(&p.left)?;
                let right = self.expression(&p.right)?;
                let quantifier = match p.quantifier {
                    PredicateQuantifier::One => String::new(),
                    quantifier => format!("{} ", quantifier.as_str()),
                };
                Ok(negate(
                    p.negated,
                    format!("{left} {} {quantifier}{right}", p.operator.as_str()),
                ))
            }
            Predicate::Between(p) => {
                let expression = self.expression(&p.expression)?;
                let start = self.expression(&p.start)?;
                let end = self.expression(&p.end)?;
                Ok(format!(
                    "{expression} {}BETWEEN {start} AND {end}",
                    not(p.negated)
                ))
            }
            Predicate::Like(p) => {
                let mut expression = self.expression(&p.expression)?;
                let mut pattern = self.expression(&p.pattern)?;
                if !p.case_sensitive {
                    expression = format!("UPPER({expression})");
                    pattern = format!("UPPER({pattern})");
                }
                let mut sql = format!("{expression} {}LIKE {pattern}", not(p.negated));
                if let Some(escape) = p.escape {
                    let escape = if escape == '\'' {
                        String::from("''")
                    } else {
                        escape.to_string()
                    };
                    sql.push_str(&format!(" ESCAPE '{escape}'"));
                }
                Ok(sql)
            }
            Predicate::In(p) => {
                if p.right.is_empty() {
                    return Ok(String::from(if p.negated { "1 = 1" } else { "1 = 0" }));
                }
                let left = self.expression(&p.left)?;
                if let [subquery @ Expression::Subquery(_)] = p.right.as_slice() {
                    let subquery = self.expression(subquery)?;
                    return Ok(format!("{left} {}IN {subquery}", not(p.negated)));
                }
                let items = self.arguments(&p.right)?;
                Ok(format!("{left} {}IN ({})", not(p.negated), items.join(", ")))
            }
            Predicate::Exists(p) => match &p.subquery {
                Expression::Subquery(subquery) => {
                    let rendered = self.subquery(&subquery.query)?;
                    Ok(format!("{}EXISTS {rendered}", not(p.negated)))
                }
                _ => Err(CriteriaError::illegal_argument("EXISTS needs a subquery")),
            },
            Predicate::IsNull(p) => {
                let expression = self.expression(&p.expression)?;
                Ok(format!("{expression} IS {}NULL", not(p.negated)))
            }
            // IS EMPTY holds when no element exists
            Predicate::IsEmpty(p) => self.collection_exists(&p.collection, !p.negated, None),
            Predicate::MemberOf(p) => {
                self.collection_exists(&p.collection, p.negated, Some(&p.element))
            }
            Predicate::Boolean(p) => {
                if self.dialect.supports_boolean_literals() {
                    let expression = self.expression(&p.expression)?;
                    return Ok(format!("{}{expression}", not(p.negated)));
                }
                let body = match &p.expression {
                    Expression::Literal(Literal::Boolean(true)) => String::from("1 = 1"),
                    Expression::Literal(Literal::Boolean(false)) => String::from("1 = 0"),
                    other => format!("{} = 1", self.expression(other)?),
                };
                Ok(negate(p.negated, body))
            }
        }
    }

    fn compound(&mut self, compound: &CompoundPredicate) -> Result<String> {
        if compound.children.is_empty() {
            let body = match compound.operator {
                BooleanOperator::And => "1 = 1",
                BooleanOperator::Or => "1 = 0",
            };
            return Ok(negate(compound.negated, String::from(body)));
        }
        let mut parts = Vec::with_capacity(compound.children.len());
        for child in &compound.children {
            let rendered = self.predicate(child)?;
            parts.push(match child {
                Predicate::Compound(inner) if !inner.negated && inner.children.len() > 1 => {
                    format!("({rendered})")
                }
                _ => rendered,
            });
        }
        let separator = format!(" {} ", compound.operator.as_str());
        Ok(negate(compound.negated, parts.join(&separator)))
    }
}
