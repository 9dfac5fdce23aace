use serde::Serialize;
use tracing::{debug, warn};

use super::criteria::CriteriaBuilder;
use super::BuilderParent;
use crate::ast::{
    Expression, FromSource, FunctionExpression, OrderByExpression, QuerySpec, SelectItem,
    SelectStatement,
};
use crate::error::{CriteriaError, Result};
use crate::execution::{Row, StatementExecutor};
use crate::keyset::{order_by_identity, Keyset, KeysetLink, KeysetManager, KeysetMode, KeysetPage};
use crate::render::SqlStatement;
use crate::value::SqlValue;

const NOT_UNIQUE: &str =
    "The order by items of the query builder are not guaranteed to produce unique tuples!";

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PagedList {
    pub rows: Vec<Row>,
    /// Number of rows of the unpaged query, when a count was requested.
    pub total_size: Option<u64>,
    /// Boundary keysets of this page, when keysets were extracted and the
    /// page is not empty.
    pub keyset_page: Option<KeysetPage>,
    pub first_result: u64,
    pub max_results: u64,
}

impl PagedList {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of pages of `max_results` rows, when the total is known.
    #[must_use]
    pub fn total_pages(&self) -> Option<u64> {
        let total = self.total_size?;
        if self.max_results == 0 {
            return Some(0);
        }
        Some(total.div_ceil(self.max_results))
    }
}

/// A query paged by offset or by keyset.
///
/// The ORDER BY of the wrapped query must end in a unique item so that pages
/// neither overlap nor skip rows.
#[derive(Debug, Clone)]
pub struct PaginatedCriteriaBuilder {
    criteria: CriteriaBuilder,
    first_result: u64,
    max_results: u64,
    keyset_page: Option<KeysetPage>,
    keyset_extraction: bool,
    count_query: bool,
}

impl PaginatedCriteriaBuilder {
    pub(crate) fn new(
        criteria: CriteriaBuilder,
        keyset_page: Option<&KeysetPage>,
        first_result: u64,
        max_results: u64,
    ) -> Result<Self> {
        criteria.verify_builder_ended()?;
        let unique = criteria
            .query()
            .spec()
            .order_by
            .last()
            .is_some_and(|item| item.unique);
        if !unique {
            return Err(CriteriaError::illegal_argument(NOT_UNIQUE));
        }
        Ok(Self {
            criteria,
            first_result,
            max_results,
            keyset_extraction: keyset_page.is_some(),
            keyset_page: keyset_page.cloned(),
            count_query: true,
        })
    }

    /// Selects the ORDER BY values along with each row so the page can
    /// report its boundary keysets.
    #[must_use]
    pub const fn with_keyset_extraction(mut self, extraction: bool) -> Self {
        self.keyset_extraction = extraction;
        self
    }

    /// Counts the rows of the unpaged query along with the page.
    #[must_use]
    pub const fn with_count_query(mut self, count: bool) -> Self {
        self.count_query = count;
        self
    }

    #[must_use]
    pub const fn first_result(&self) -> u64 {
        self.first_result
    }

    #[must_use]
    pub const fn max_results(&self) -> u64 {
        self.max_results
    }

    #[must_use]
    pub const fn criteria(&self) -> &CriteriaBuilder {
        &self.criteria
    }

    /// ORDER BY items with select aliases replaced by their expressions.
    fn order_by(&self) -> Vec<OrderByExpression> {
        let spec = self.criteria.query().spec();
        spec.order_by
            .iter()
            .map(|item| {
                let aliased = item
                    .expression
                    .as_path()
                    .filter(|path| path.is_simple())
                    .and_then(|path| {
                        spec.select
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

    /// The keyset link for the requested page, if the previous page allows
    /// one.
    fn link(&self, order_by: &[OrderByExpression]) -> Option<KeysetLink> {
        let page = self.keyset_page.as_ref()?;
        if !self.criteria.statement().set_operations.is_empty() {
            debug!("set operations are paged by offset");
            return None;
        }
        let link = page.link(self.first_result, self.max_results, order_by);
        if link.is_none() {
            debug!(
                first_result = self.first_result,
                previous = page.first_result,
                "keyset page does not apply, paging by offset"
            );
        }
        link
    }

    /// The select list the caller sees, spelled out so hidden items can be
    /// appended behind it.
    fn visible_items(&self, spec: &QuerySpec) -> Result<Vec<SelectItem>> {
        if !spec.select.is_empty() {
            return Ok(spec.select.clone());
        }
        let mut items = Vec::new();
        for source in &spec.from {
            let (alias, columns) = match source {
                FromSource::Entity { alias, .. } => {
                    items.push(SelectItem {
                        expression: Expression::path(alias),
                        alias: None,
                    });
                    continue;
                }
                FromSource::Cte { name, alias } => (
                    alias,
                    self.criteria
                        .context()
                        .cte_columns(name)
                        .map(<[String]>::to_vec)
                        .ok_or_else(|| {
                            CriteriaError::illegal_argument(format!("unknown CTE {name}"))
                        })?,
                ),
                FromSource::Values(values) => (&values.alias, values.columns.clone()),
            };
            for column in columns {
                items.push(SelectItem {
                    expression: Expression::path(&format!("{alias}.{column}")),
                    alias: None,
                });
            }
        }
        Ok(items)
    }

    /// The statement of the page and the number of caller visible columns.
    fn page_statement(&self) -> Result<(SelectStatement, usize, Option<KeysetMode>)> {
        let mut statement = self.criteria.statement();
        let order_by = self.order_by();
        let link = self.link(&order_by);
        let visible = if self.keyset_extraction {
            let mut items = self.visible_items(&statement.query)?;
            let visible = items.len();
            items.extend(order_by.iter().map(|item| SelectItem {
                expression: item.expression.clone(),
                alias: None,
            }));
            statement.query.select = items;
            visible
        } else {
            0
        };

        let spec = &mut statement.query;
        spec.max_results = Some(self.max_results);
        match &link {
            Some(link) => {
                let context = self.criteria.context();
                let predicate = KeysetManager::keyset_predicate(
                    &order_by,
                    link,
                    context.dialect(),
                    context.config().optimized_keyset_predicate_rendering,
                )?;
                spec.add_where(predicate);
                spec.first_result = 0;
                if link.mode() == KeysetMode::Previous {
                    spec.order_by = spec.order_by.iter().map(OrderByExpression::reversed).collect();
                }
            }
            None => spec.first_result = self.first_result,
        }
        Ok((statement, visible, link.map(|link| link.mode())))
    }

    /// The query without ORDER BY and paging.
    fn unpaged_statement(&self) -> Result<SelectStatement> {
        let mut statement = self.criteria.statement();
        if !statement.set_operations.is_empty() {
            return Err(CriteriaError::illegal_argument(
                "the total size of a query with set operations cannot be counted",
            ));
        }
        let spec = &mut statement.query;
        spec.order_by.clear();
        spec.first_result = 0;
        spec.max_results = None;
        Ok(statement)
    }

    /// The COUNT over an unpaged query that does not group.
    fn count_statement(mut statement: SelectStatement) -> SelectStatement {
        let spec = &mut statement.query;
        let root = spec.from.iter().find_map(|source| match source {
            FromSource::Entity { alias, .. } => Some(alias.clone()),
            _ => None,
        });
        let mut count = FunctionExpression::new("COUNT", Vec::new());
        if let Some(root) = root.filter(|_| spec.distinct || !spec.joins.is_empty()) {
            count.args.push(Expression::path(&root));
            count.distinct = true;
        }
        spec.select = vec![SelectItem {
            expression: Expression::Function(count),
            alias: None,
        }];
        spec.distinct = false;
        statement
    }

    /// The page query in query language form.
    ///
    /// # Errors
    ///
    /// When the keyset does not match the ORDER BY.
    pub fn get_query_string(&self) -> Result<String> {
        let (statement, _, _) = self.page_statement()?;
        Ok(statement.to_string())
    }

    /// Renders the page query.
    ///
    /// # Errors
    ///
    /// Rendering errors and keysets that do not match the ORDER BY.
    pub fn render(&self) -> Result<SqlStatement> {
        let (statement, _, _) = self.page_statement()?;
        self.criteria.render_statement(&statement)
    }

    /// Renders the count query.
    ///
    /// # Errors
    ///
    /// Rendering errors, and queries with set operations.
    pub fn render_count(&self) -> Result<SqlStatement> {
        let statement = self.unpaged_statement()?;
        if let Some(count) = self.criteria.render_group_count(&statement)? {
            return Ok(count);
        }
        self.criteria.render_statement(&Self::count_statement(statement))
    }

    /// Reads the page, and the total size when counting.
    ///
    /// # Errors
    ///
    /// Rendering and executor errors, and a count query that returns no
    /// number.
    pub fn get_result_list(&self, executor: &dyn StatementExecutor) -> Result<PagedList> {
        let (statement, visible, mode) = self.page_statement()?;
        let sql = self.criteria.render_statement(&statement)?;
        debug!(sql = %sql.sql, first_result = self.first_result, "executing page query");
        let mut rows = executor.query(&sql)?;
        if mode == Some(KeysetMode::Previous) {
            rows.reverse();
        }

        let keyset_page = if self.keyset_extraction && !rows.is_empty() {
            Some(self.extract_keysets(&rows, visible))
        } else {
            None
        };
        if self.keyset_extraction {
            for row in &mut rows {
                row.truncate(visible);
            }
        }

        let total_size = if self.count_query {
            Some(self.count(executor)?)
        } else {
            None
        };
        Ok(PagedList {
            rows,
            total_size,
            keyset_page,
            first_result: self.first_result,
            max_results: self.max_results,
        })
    }

    fn extract_keysets(&self, rows: &[Row], visible: usize) -> KeysetPage {
        let offset = self
            .criteria
            .context()
            .config()
            .keyset_extraction_offset
            .min(rows.len() - 1);
        let keyset = |row: &Row| Keyset::new(row.get(visible..).unwrap_or_default().to_vec());
        KeysetPage {
            first_result: self.first_result,
            max_results: self.max_results,
            lowest: keyset(&rows[offset]),
            highest: keyset(&rows[rows.len() - 1 - offset]),
            order_by: order_by_identity(&self.order_by()),
        }
    }

    fn count(&self, executor: &dyn StatementExecutor) -> Result<u64> {
        let sql = self.render_count()?;
        debug!(sql = %sql.sql, "executing count query");
        let rows = executor.query(&sql)?;
        match rows.first().and_then(|row| row.first()) {
            Some(SqlValue::Int(count)) => u64::try_from(*count).map_err(|_| {
                CriteriaError::illegal_argument(format!("count query returned {count}"))
            }),
            other => {
                warn!(value = ?other, "count query did not return a number");
                Err(CriteriaError::illegal_argument(
                    "count query did not return a number",
                ))
            }
        }
    }
}
