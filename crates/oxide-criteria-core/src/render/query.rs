//! Query blocks, set operations, CTEs and paging.

use tracing::{debug, warn};

use super::Renderer;
use super::plan::{AliasSource, QueryPlan};
use crate::ast::{
    ClauseType, CteBody, CteDefinition, Expression, FromSource, JoinNode, JoinTarget, JoinType,
    OrderByExpression, Predicate, QuerySpec, SelectItem, SelectStatement, SetOperation,
    SetOperator, ValuesSource,
};
use crate::dialect::{DbmsDialect, ExtendedSqlParts, LateralStyle, LimitStyle, ValuesStrategy};
use crate::error::{CriteriaError, Result};

/// A rendered FROM item with the alias implicit joins hang off.
type FromItem = (String, String);

/// Names of the result columns: the alias, the last path segment, or a
/// positional name when neither is available or unique.
pub(crate) fn output_columns(items: &[SelectItem]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let candidate = item.alias.clone().or_else(|| {
            item.expression
                .as_path()
                .filter(|path| !path.is_simple())
                .map(|path| String::from(path.last()))
        });
        let name = match candidate {
            Some(name) if !names.contains(&name) => name,
            _ => format!("col_{i}"),
        };
        names.push(name);
    }
    names
}

/// ORDER BY items with references to select aliases replaced by the aliased
/// expression.
fn order_items(query: &QuerySpec) -> Vec<OrderByExpression> {
    query
        .order_by
        .iter()
        .map(|item| {
            let aliased = item
                .expression
                .as_path()
                .filter(|path| path.is_simple())
                .and_then(|path| {
                    query
                        .select
                        .iter()
                        .find(|select| select.alias.as_deref() == Some(path.head()))
                });
            match aliased {
                Some(select) => OrderByExpression {
                    expression: select.expression.clone(),
                    ..item.clone()
                },
                None => item.clone(),
            }
        })
        .collect()
}

const fn is_constant(expression: &Expression) -> bool {
    matches!(
        expression,
        Expression::Literal(_)
            | Expression::Value(_)
            | Expression::Parameter(_)
            | Expression::Subquery(_)
    )
}

pub(super) fn append_implicit_joins(plan: &QueryPlan<'_>, parent: &str, sql: &mut String) {
    for edge in plan.edges_from(parent) {
        sql.push_str(&format!(
            " LEFT JOIN {} {} ON {}",
            edge.table, edge.alias, edge.condition
        ));
        append_implicit_joins(plan, &edge.alias, sql);
    }
}

/// `SELECT ... FROM (inner) numbered` with a ROW_NUMBER filter, for dialects
/// without a LIMIT clause.
fn row_number_wrap(
    dialect: &dyn DbmsDialect,
    inner: &str,
    columns: &[String],
    order: &[(OrderByExpression, String)],
    first: u64,
    max: Option<u64>,
) -> String {
    let mut over = String::new();
    for (i, (item, column)) in order.iter().enumerate() {
        if i > 0 {
            over.push_str(", ");
        }
        dialect.append_order_by_element(&mut over, item, &format!("numbered.{column}"));
    }
    if !over.is_empty() {
        over.insert_str(0, "ORDER BY ");
    }
    let selected = columns
        .iter()
        .map(|column| format!("paged.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "SELECT {selected} FROM (SELECT numbered.*, ROW_NUMBER() OVER ({over}) AS rn \
         FROM ({inner}) numbered) paged WHERE paged.rn > {first}"
    );
    if let Some(max) = max {
        sql.push_str(&format!(" AND paged.rn <= {}", first.saturating_add(max)));
    }
    sql.push_str(" ORDER BY paged.rn");
    sql
}

impl<'a> Renderer<'a> {
    pub(super) fn select_statement(
        &mut self,
        statement: &SelectStatement,
    ) -> Result<(String, usize)> {
        let with_clause = self.with_clause(&statement.ctes)?;
        let (mut sql, columns) = if statement.set_operations.is_empty() {
            self.query(&statement.query, None)?
        } else {
            self.set_operations(&statement.query, &statement.set_operations)?
        };
        self.dialect.append_extended_sql(
            &mut sql,
            &ExtendedSqlParts {
                with_clause: with_clause.as_deref(),
                ..ExtendedSqlParts::default()
            },
        )?;
        Ok((sql, columns))
    }

    /// `SELECT COUNT(*)` over the groups of an unpaged query, or `None` when
    /// the query neither groups nor aggregates.
    pub(super) fn grouped_count(&mut self, statement: &SelectStatement) -> Result<Option<String>> {
        let with_clause = self.with_clause(&statement.ctes)?;
        let query = &statement.query;
        let names = output_columns(&self.select_items(query)?);
        self.scopes.push(QueryPlan::new(query.windows.clone()));
        let result = self.query_block(query, Some(&names));
        let plan = self.scopes.pop();
        let (inner, _) = result?;
        let grouped = !query.group_by.is_empty()
            || query.having.is_some()
            || plan.is_some_and(|plan| plan.has_aggregate || plan.needs_group_by);
        if !grouped {
            return Ok(None);
        }
        let alias = self.generated_alias("grouped");
        let mut sql = format!("SELECT COUNT(*) FROM ({inner}) {alias}");
        self.dialect.append_extended_sql(
            &mut sql,
            &ExtendedSqlParts {
                with_clause: with_clause.as_deref(),
                ..ExtendedSqlParts::default()
            },
        )?;
        Ok(Some(sql))
    }

    /// Renders a nested query in parentheses.
    pub(super) fn subquery(&mut self, query: &QuerySpec) -> Result<String> {
        self.subquery_named(query, None)
    }

    fn subquery_named(&mut self, query: &QuerySpec, names: Option<&[String]>) -> Result<String> {
        let previous = self.clause;
        let result = self.query(query, names);
        self.clause = previous;
        Ok(format!("({})", result?.0))
    }

    /// Renders one query block with its ORDER BY and paging. `names` forces
    /// the aliases of the select items.
    pub(super) fn query(
        &mut self,
        query: &QuerySpec,
        names: Option<&[String]>,
    ) -> Result<(String, usize)> {
        if !query.is_unpaged() && self.dialect.limit_style() == LimitStyle::RowNumber {
            return self.row_number_query(query, names);
        }
        self.scopes.push(QueryPlan::new(query.windows.clone()));
        let result = self.query_block(query, names);
        self.scopes.pop();
        let (mut sql, columns) = result?;
        if !query.is_unpaged() {
            self.dialect.append_limit(
                &mut sql,
                query.max_results,
                query.first_result,
                !query.order_by.is_empty(),
            )?;
        }
        Ok((sql, columns))
    }

    fn query_block(
        &mut self,
        query: &QuerySpec,
        names: Option<&[String]>,
    ) -> Result<(String, usize)> {
        let roots = self.roots(query)?;
        let joins = self.joins(query)?;

        self.clause = ClauseType::Select;
        let items = self.select_items(query)?;
        let mut select = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let rendered = self.expression(&item.expression)?;
            let alias = names.and_then(|names| names.get(i)).or(item.alias.as_ref());
            select.push(match alias {
                Some(alias) => format!("{rendered} AS {alias}"),
                None => rendered,
            });
        }

        let where_clause = match &query.where_clause {
            Some(predicate) => {
                self.clause = ClauseType::Where;
                Some(self.predicate(predicate)?)
            }
            None => None,
        };
        self.clause = ClauseType::GroupBy;
        let mut group_by = self.arguments(&query.group_by)?;
        let having = match &query.having {
            Some(predicate) => {
                self.clause = ClauseType::Having;
                Some(self.predicate(predicate)?)
            }
            None => None,
        };
        self.clause = ClauseType::OrderBy;
        let order = order_items(query);
        let order_by = self.order_by_list(&order)?;

        let plan = self.scope()?;
        let grouped = plan.has_aggregate || plan.needs_group_by;
        if grouped && self.config.implicit_group_by_from_select {
            self.clause = ClauseType::GroupBy;
            let candidates = items
                .iter()
                .map(|item| &item.expression)
                .chain(order.iter().map(|item| &item.expression));
            for expression in candidates {
                if is_constant(expression) || self.contains_aggregate(expression) {
                    continue;
                }
                let rendered = self.expression(expression)?;
                if !group_by.contains(&rendered) {
                    group_by.push(rendered);
                }
            }
        }

        let mut sql = String::from("SELECT ");
        if query.distinct {
            sql.push_str("DISTINCT ");
        }
        sql.push_str(&select.join(", "));
        let from = self.from_clause(&roots, &joins)?;
        if !from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&from);
        } else if let Some(dummy) = self.dialect.dummy_table() {
            sql.push_str(" FROM ");
            sql.push_str(dummy);
        }
        if let Some(where_clause) = where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(&where_clause);
        }
        if !group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&group_by.join(", "));
        }
        if let Some(having) = having {
            sql.push_str(" HAVING ");
            sql.push_str(&having);
        }
        if !order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&order_by);
        }
        Ok((sql, items.len()))
    }

    /// The select list, or the roots' identifiers and columns when none was
    /// given.
    pub(super) fn select_items(&self, query: &QuerySpec) -> Result<Vec<SelectItem>> {
        if !query.select.is_empty() {
            return Ok(query.select.clone());
        }
        let mut items = Vec::new();
        for source in &query.from {
            let (alias, columns) = match source {
                FromSource::Entity { alias, .. } => {
                    items.push(SelectItem {
                        expression: Expression::path(alias),
                        alias: None,
                    });
                    continue;
                }
                FromSource::Cte { name, alias } => (alias, self.cte_columns(name)?),
                FromSource::Values(values) => (&values.alias, values.columns.clone()),
            };
            for column in columns {
                items.push(SelectItem {
                    expression: Expression::path(&format!("{alias}.{column}")),
                    alias: None,
                });
            }
        }
        if items.is_empty() {
            return Err(CriteriaError::illegal_argument(
                "a query needs a select list or a FROM clause",
            ));
        }
        Ok(items)
    }

    fn cte_columns(&self, name: &str) -> Result<Vec<String>> {
        self.ctes
            .get(name)
            .cloned()
            .ok_or_else(|| CriteriaError::illegal_argument(format!("unknown CTE {name}")))
    }

    fn roots(&mut self, query: &QuerySpec) -> Result<Vec<FromItem>> {
        let mut roots = Vec::with_capacity(query.from.len());
        for source in &query.from {
            let sql = match source {
                FromSource::Entity { entity, alias } => {
                    let metadata = self.entity_metadata(entity, entity)?;
                    self.scope_mut()?.register(
                        alias,
                        alias,
                        AliasSource::Entity {
                            entity: metadata,
                            collection: None,
                        },
                    )?;
                    format!("{} {alias}", metadata.table)
                }
                FromSource::Cte { name, alias } => {
                    let columns = self.cte_columns(name)?;
                    self.scope_mut()?
                        .register(alias, alias, AliasSource::Columns(columns))?;
                    format!("{name} {alias}")
                }
                FromSource::Values(values) => {
                    let sql = self.values_source(values)?;
                    self.scope_mut()?.register(
                        &values.alias,
                        &values.alias,
                        AliasSource::Columns(values.columns.clone()),
                    )?;
                    sql
                }
            };
            roots.push((String::from(source.alias()), sql));
        }
        if let [single] = query.from.as_slice() {
            self.scope_mut()?.root = Some(String::from(single.alias()));
        }
        Ok(roots)
    }

    fn dummy_from(&self) -> String {
        self.dialect
            .dummy_table()
            .map(|table| format!(" FROM {table}"))
            .unwrap_or_default()
    }

    fn values_source(&mut self, values: &ValuesSource) -> Result<String> {
        let alias = &values.alias;
        if let Some(row) = values.rows.iter().find(|row| row.len() != values.columns.len()) {
            return Err(CriteriaError::illegal_argument(format!(
                "a VALUES row has {} values but {alias} declares {} columns",
                row.len(),
                values.columns.len()
            )));
        }
        if values.rows.is_empty() {
            let nulls = values
                .columns
                .iter()
                .map(|column| format!("NULL AS {column}"))
                .collect::<Vec<_>>()
                .join(", ");
            return Ok(format!("(SELECT {nulls}{} WHERE 1 = 0) {alias}", self.dummy_from()));
        }
        let strategy = self.dialect.values_strategy();
        if strategy == ValuesStrategy::SelectUnion {
            debug!(
                dialect = self.dialect.name(),
                alias = %alias,
                "emulating VALUES with SELECT UNION ALL"
            );
            let dummy = self.dummy_from();
            let mut selects = Vec::with_capacity(values.rows.len());
            for row in &values.rows {
                let mut columns = Vec::with_capacity(row.len());
                for (value, column) in row.iter().zip(&values.columns) {
                    columns.push(format!("{} AS {column}", self.bind(value.clone())));
                }
                selects.push(format!("SELECT {}{dummy}", columns.join(", ")));
            }
            return Ok(format!("({}) {alias}", selects.join(" UNION ALL ")));
        }
        let prefix = if strategy == ValuesStrategy::SelectValues {
            "ROW"
        } else {
            ""
        };
        let mut rows = Vec::with_capacity(values.rows.len());
        for row in &values.rows {
            let mut markers = Vec::with_capacity(row.len());
            for value in row {
                markers.push(self.bind(value.clone()));
            }
            rows.push(format!("{prefix}({})", markers.join(", ")));
        }
        Ok(format!(
            "(VALUES {}) {alias}({})",
            rows.join(", "),
            values.columns.join(", ")
        ))
    }

    fn join_condition(&mut self, on: Option<&Predicate>) -> Result<Option<String>> {
        on.map(|predicate| {
            self.clause = ClauseType::JoinOn;
            self.predicate(predicate)
        })
        .transpose()
    }

    fn joins(&mut self, query: &QuerySpec) -> Result<Vec<FromItem>> {
        let mut joins = Vec::with_capacity(query.joins.len());
        for node in &query.joins {
            let keyword = node.join_type.as_str();
            let alias = &node.alias;
            let sql = match &node.target {
                JoinTarget::Association(path) => {
                    let (table, condition) = self.association_join(path, alias)?;
                    match self.join_condition(node.on.as_ref())? {
                        Some(on) => format!("{keyword} {table} {alias} ON {condition} AND ({on})"),
                        None => format!("{keyword} {table} {alias} ON {condition}"),
                    }
                }
                JoinTarget::Entity(entity) => {
                    let metadata = self.entity_metadata(entity, entity)?;
                    self.scope_mut()?.register(
                        alias,
                        alias,
                        AliasSource::Entity {
                            entity: metadata,
                            collection: None,
                        },
                    )?;
                    let on = self.join_condition(node.on.as_ref())?;
                    format!(
                        "{keyword} {} {alias} ON {}",
                        metadata.table,
                        on.as_deref().unwrap_or("1 = 1")
                    )
                }
                JoinTarget::Cte(name) => {
                    let columns = self.cte_columns(name)?;
                    self.scope_mut()?
                        .register(alias, alias, AliasSource::Columns(columns))?;
                    let on = self.join_condition(node.on.as_ref())?;
                    format!(
                        "{keyword} {name} {alias} ON {}",
                        on.as_deref().unwrap_or("1 = 1")
                    )
                }
                JoinTarget::Subquery(subquery) => self.lateral_join(node, subquery)?,
            };
            joins.push((alias.clone(), sql));
        }
        Ok(joins)
    }

    fn lateral_join(&mut self, node: &JoinNode, subquery: &QuerySpec) -> Result<String> {
        let dialect: &'a dyn DbmsDialect = self.dialect;
        let style = dialect.lateral_style();
        if style == LateralStyle::None {
            return Err(CriteriaError::unsupported("LATERAL join", dialect.name()));
        }
        let alias = &node.alias;
        let columns = output_columns(&self.select_items(subquery)?);
        let rendered = self.subquery_named(subquery, Some(&columns))?;
        self.scope_mut()?
            .register(alias, alias, AliasSource::Columns(columns))?;
        let on = self.join_condition(node.on.as_ref())?;
        if style == LateralStyle::Lateral {
            return Ok(format!(
                "{} LATERAL {rendered} {alias} ON {}",
                node.join_type.as_str(),
                on.as_deref().unwrap_or("1 = 1")
            ));
        }
        if on.is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "a lateral join cannot have an ON condition on {}",
                dialect.name()
            )));
        }
        let keyword = match node.join_type {
            JoinType::Inner => "CROSS APPLY",
            JoinType::Left => "OUTER APPLY",
            other => {
                return Err(CriteriaError::unsupported(
                    format!("lateral {}", other.as_str()),
                    dialect.name(),
                ));
            }
        };
        Ok(format!("{keyword} {rendered} {alias}"))
    }

    fn from_clause(&self, roots: &[FromItem], joins: &[FromItem]) -> Result<String> {
        let plan = self.scope()?;
        let mut sql = String::new();
        for (i, (alias, root)) in roots.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(root);
            append_implicit_joins(plan, alias, &mut sql);
        }
        for (alias, join) in joins {
            sql.push(' ');
            sql.push_str(join);
            append_implicit_joins(plan, alias, &mut sql);
        }
        Ok(sql)
    }

    fn row_number_query(
        &mut self,
        query: &QuerySpec,
        names: Option<&[String]>,
    ) -> Result<(String, usize)> {
        debug!(
            dialect = self.dialect.name(),
            "emulating LIMIT with ROW_NUMBER"
        );
        let items = self.select_items(query)?;
        let columns = names.map_or_else(|| output_columns(&items), <[String]>::to_vec);
        let order = order_items(query);
        let mut inner = QuerySpec {
            select: items,
            order_by: Vec::new(),
            first_result: 0,
            max_results: None,
            ..query.clone()
        };
        let mut inner_names = columns.clone();
        let mut numbered = Vec::with_capacity(order.len());
        for (i, item) in order.into_iter().enumerate() {
            let name = format!("ord_{i}");
            inner.select.push(SelectItem {
                expression: item.expression.clone(),
                alias: Some(name.clone()),
            });
            inner_names.push(name.clone());
            numbered.push((item, name));
        }
        let (inner_sql, _) = self.query(&inner, Some(&inner_names))?;
        let sql = row_number_wrap(
            self.dialect,
            &inner_sql,
            &columns,
            &numbered,
            query.first_result,
            query.max_results,
        );
        Ok((sql, columns.len()))
    }

    fn set_operand(&mut self, query: &QuerySpec, names: &[String]) -> Result<String> {
        let count = self.select_items(query)?.len();
        if count != names.len() {
            return Err(CriteriaError::illegal_argument(format!(
                "set operands must select the same number of columns, got {} and {count}",
                names.len()
            )));
        }
        let (sql, _) = self.query(query, Some(names))?;
        Ok(if query.order_by.is_empty() && query.is_unpaged() {
            sql
        } else {
            format!("({sql})")
        })
    }

    fn emulate_set_operation(
        &mut self,
        operator: SetOperator,
        left: &str,
        right: &str,
        names: &[String],
    ) -> String {
        debug!(
            dialect = self.dialect.name(),
            operator = operator.as_str(),
            "emulating set operation with EXISTS"
        );
        let l = self.generated_alias("set_left");
        let r = self.generated_alias("set_right");
        let condition = names
            .iter()
            .map(|n| format!("({l}.{n} = {r}.{n} OR ({l}.{n} IS NULL AND {r}.{n} IS NULL))"))
            .collect::<Vec<_>>()
            .join(" AND ");
        let exists = if operator == SetOperator::Intersect {
            "EXISTS"
        } else {
            "NOT EXISTS"
        };
        format!(
            "SELECT DISTINCT {l}.* FROM ({left}) {l} WHERE {exists} \
             (SELECT 1 FROM ({right}) {r} WHERE {condition})"
        )
    }

    fn fold_set_operations(&mut self, sql: &str, names: &[String]) -> String {
        let alias = self.generated_alias("set");
        let selected = names
            .iter()
            .map(|name| format!("{alias}.{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        format!("SELECT {selected} FROM ({sql}) {alias}")
    }

    fn set_operations(
        &mut self,
        leading: &QuerySpec,
        operations: &[SetOperation],
    ) -> Result<(String, usize)> {
        let items = self.select_items(leading)?;
        let names = output_columns(&items);
        let first = QuerySpec {
            select: items.clone(),
            order_by: Vec::new(),
            first_result: 0,
            max_results: None,
            ..leading.clone()
        };
        let mut sql = self.set_operand(&first, &names)?;
        // Whether the last native operator was a UNION or EXCEPT
        let mut loose = false;
        for operation in operations {
            let right = self.set_operand(&operation.query, &names)?;
            let intersect = matches!(
                operation.operator,
                SetOperator::Intersect | SetOperator::IntersectAll
            );
            sql = match self.dialect.get_set_operator(operation.operator) {
                Ok(keyword) if intersect && loose => {
                    // INTERSECT binds tighter than UNION and EXCEPT
                    let folded = self.fold_set_operations(&sql, &names);
                    format!("{folded} {keyword} {right}")
                }
                Ok(keyword) => format!("{sql} {keyword} {right}"),
                Err(_) if matches!(operation.operator, SetOperator::Intersect | SetOperator::Except) => {
                    self.emulate_set_operation(operation.operator, &sql, &right, &names)
                }
                Err(error) => return Err(error),
            };
            loose = !intersect;
        }
        if leading.order_by.is_empty() && leading.is_unpaged() {
            return Ok((sql, names.len()));
        }

        let mut order = Vec::with_capacity(leading.order_by.len());
        for item in &leading.order_by {
            let position = items.iter().position(|select| {
                select.expression == item.expression
                    || item.expression.as_path().is_some_and(|path| {
                        path.is_simple() && select.alias.as_deref() == Some(path.head())
                    })
            });
            let position = position.ok_or_else(|| {
                CriteriaError::illegal_argument(format!(
                    "ORDER BY item {} of a set operation must be a select item",
                    item.expression
                ))
            })?;
            order.push((item.clone(), names[position].clone()));
        }
        if self.dialect.limit_style() == LimitStyle::RowNumber && !leading.is_unpaged() {
            debug!(
                dialect = self.dialect.name(),
                "emulating LIMIT with ROW_NUMBER"
            );
            let wrapped = row_number_wrap(
                self.dialect,
                &sql,
                &names,
                &order,
                leading.first_result,
                leading.max_results,
            );
            return Ok((wrapped, names.len()));
        }
        let selected = names
            .iter()
            .map(|name| format!("set_result.{name}"))
            .collect::<Vec<_>>()
            .join(", ");
        let mut wrapped = format!("SELECT {selected} FROM ({sql}) set_result");
        if !order.is_empty() {
            wrapped.push_str(" ORDER BY ");
            for (i, (item, column)) in order.iter().enumerate() {
                if i > 0 {
                    wrapped.push_str(", ");
                }
                self.dialect.append_order_by_element(
                    &mut wrapped,
                    item,
                    &format!("set_result.{column}"),
                );
            }
        }
        if !leading.is_unpaged() {
            self.dialect.append_limit(
                &mut wrapped,
                leading.max_results,
                leading.first_result,
                !order.is_empty(),
            )?;
        }
        Ok((wrapped, names.len()))
    }

    /// Renders the `WITH ...` prefix, or nothing without CTEs.
    pub(super) fn with_clause(&mut self, ctes: &[CteDefinition]) -> Result<Option<String>> {
        if ctes.is_empty() {
            return Ok(None);
        }
        let dialect: &'a dyn DbmsDialect = self.dialect;
        let recursive = ctes.iter().any(|cte| cte.recursive);
        if !recursive && dialect.supports_with_clause() && !dialect.supports_non_recursive_with_clause()
        {
            return Err(CriteriaError::unsupported(
                "non-recursive WITH clause",
                dialect.name(),
            ));
        }
        let keyword = dialect.get_with_clause(recursive)?;
        let mut parts = Vec::with_capacity(ctes.len());
        for cte in ctes {
            parts.push(self.cte(cte)?);
        }
        Ok(Some(format!("{keyword} {}", parts.join(", "))))
    }

    fn check_cte_arity(cte: &CteDefinition, query: &QuerySpec) -> Result<()> {
        if !cte.columns.is_empty() && !query.select.is_empty() && query.select.len() != cte.columns.len()
        {
            return Err(CriteriaError::illegal_argument(format!(
                "CTE {} declares {} columns but its query selects {}",
                cte.name,
                cte.columns.len(),
                query.select.len()
            )));
        }
        Ok(())
    }

    fn cte(&mut self, cte: &CteDefinition) -> Result<String> {
        let dialect: &'a dyn DbmsDialect = self.dialect;
        let derived = match (&cte.body, cte.columns.is_empty()) {
            (_, false) => None,
            (CteBody::Query { base, .. }, true) => Some(output_columns(&self.select_items(base)?)),
            (CteBody::Modification(statement), true) => Some(statement.returning.clone()),
        };
        self.ctes.insert(
            cte.name.clone(),
            derived.clone().unwrap_or_else(|| cte.columns.clone()),
        );
        let materialization = match cte.materialized {
            Some(true) if dialect.supports_cte_materialization() => "MATERIALIZED ",
            Some(false) if dialect.supports_cte_materialization() => "NOT MATERIALIZED ",
            Some(_) => {
                warn!(
                    dialect = dialect.name(),
                    cte = %cte.name,
                    "dropping CTE materialization hint"
                );
                ""
            }
            None => "",
        };
        let names = match &derived {
            Some(derived) => Some(derived.as_slice()),
            None => dialect
                .needs_unique_select_item_names_also_when_table_column_aliasing()
                .then_some(cte.columns.as_slice()),
        };
        let body = match &cte.body {
            CteBody::Query { base, recursive } => {
                Self::check_cte_arity(cte, base)?;
                let (mut sql, _) = self.query(base, names)?;
                if let Some((operator, part)) = recursive {
                    Self::check_cte_arity(cte, part)?;
                    let keyword = dialect.get_set_operator(*operator)?;
                    let (part_sql, _) = self.query(part, names)?;
                    sql = format!("{sql} {keyword} {part_sql}");
                }
                format!("({sql})")
            }
            CteBody::Modification(statement) => {
                if !dialect.supports_modification_query_in_with_clause() {
                    return Err(CriteriaError::unsupported(
                        "modification query in WITH clause",
                        dialect.name(),
                    ));
                }
                self.dml_statement(statement, true)?
            }
        };
        let columns = if cte.columns.is_empty() {
            String::new()
        } else {
            format!("({})", cte.columns.join(", "))
        };
        Ok(format!("{}{columns} AS {materialization}{body}", cte.name))
    }
}
