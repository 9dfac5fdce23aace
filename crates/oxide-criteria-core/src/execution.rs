//! The seam to a database connection.
//!
//! Rendering does no I/O. Terminal operations that need rows hand the
//! rendered statement to a [`StatementExecutor`] supplied by the caller.

use crate::error::Result;
use crate::render::SqlStatement;
use crate::value::SqlValue;

/// One result row, in select list order.
pub type Row = Vec<SqlValue>;

/// Runs rendered statements.
pub trait StatementExecutor {
    /// Executes a query and returns all of its rows.
    ///
    /// # Errors
    ///
    /// Implementations wrap driver failures with
    /// [`crate::error::CriteriaError::execution`].
    fn query(&self, statement: &SqlStatement) -> Result<Vec<Row>>;
}

impl<F> StatementExecutor for F
where
    F: Fn(&SqlStatement) -> Result<Vec<Row>>,
{
    fn query(&self, statement: &SqlStatement) -> Result<Vec<Row>> {
        self(statement)
    }
}
