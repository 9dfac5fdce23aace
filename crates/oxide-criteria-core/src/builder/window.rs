use super::query::QueryBuilder;
use crate::ast::{FrameBound, FrameMode, NamedWindow, WindowDefinition, WindowFrame};
use crate::error::{CriteriaError, Result};

/// Declares a named window that window functions reference with
/// `OVER name`.
#[must_use = "the window is only declared when the builder is ended"]
pub struct WindowBuilder<P: QueryBuilder> {
    parent: P,
    name: String,
    definition: WindowDefinition,
    id: usize,
}

impl<P: QueryBuilder> WindowBuilder<P> {
    pub(crate) fn new(mut parent: P, name: &str) -> Self {
        let id = parent.context_mut().open("WindowBuilder");
        Self {
            parent,
            name: String::from(name),
            definition: WindowDefinition::default(),
            id,
        }
    }

    fn checked<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() {
            self.parent.context_mut().close(self.id);
        }
        result
    }

    /// Extends a window declared earlier on the same query.
    ///
    /// # Errors
    ///
    /// When no window of that name exists.
    pub fn base(mut self, name: &str) -> Result<Self> {
        let found = if self.parent.query_state().spec.window(name).is_some() {
            Ok(())
        } else {
            Err(CriteriaError::illegal_argument(format!("unknown window '{name}'")))
        };
        self.checked(found)?;
        self.definition.base = Some(String::from(name));
        Ok(self)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn partition_by(mut self, expression: &str) -> Result<Self> {
        let parsed = self.parent.parse_expression(expression);
        let expression = self.checked(parsed)?;
        self.definition.partition_by.push(expression);
        Ok(self)
    }

    /// # Errors
    ///
    /// Syntax errors and unresolvable paths.
    pub fn order_by(mut self, expression: &str, ascending: bool, nulls_first: bool) -> Result<Self> {
        let item = self.parent.order_item(expression, ascending, nulls_first);
        let item = self.checked(item)?;
        self.definition.order_by.push(item);
        Ok(self)
    }

    pub fn rows(self, start: FrameBound, end: Option<FrameBound>) -> Self {
        self.frame(FrameMode::Rows, start, end)
    }

    pub fn range(self, start: FrameBound, end: Option<FrameBound>) -> Self {
        self.frame(FrameMode::Range, start, end)
    }

    pub fn groups(self, start: FrameBound, end: Option<FrameBound>) -> Self {
        self.frame(FrameMode::Groups, start, end)
    }

    fn frame(mut self, mode: FrameMode, start: FrameBound, end: Option<FrameBound>) -> Self {
        self.definition.frame = Some(WindowFrame { mode, start, end });
        self
    }

    /// Declares the window on the query.
    ///
    /// # Errors
    ///
    /// When the query already has a window of that name.
    pub fn end(mut self) -> Result<P> {
        self.parent.context_mut().close(self.id);
        let spec = &mut self.parent.query_state_mut().spec;
        if spec.window(&self.name).is_some() {
            return Err(CriteriaError::illegal_argument(format!(
                "window '{}' is declared more than once",
                self.name
            )));
        }
        spec.windows.push(NamedWindow {
            name: self.name,
            definition: self.definition,
        });
        Ok(self.parent)
    }
}
