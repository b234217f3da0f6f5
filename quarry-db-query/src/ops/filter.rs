//! Filter operator
//!
//! Passes rows whose condition evaluates to an effective-true boolean.
//! The recoverable error class (type mismatch, unbound variable,
//! division by zero) counts as false and drops the row; only
//! `EvalError::Fatal` propagates and aborts the query.

use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::expr::Expr;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::var::VarId;

/// Filter operator
pub struct FilterOperator {
    child: BoxedOperator,
    condition: Expr,
    schema: Vec<VarId>,
    state: OperatorState,
}

impl FilterOperator {
    /// Create a filter over a child operator.
    pub fn new(child: BoxedOperator, condition: Expr) -> Self {
        let schema = child.schema().to_vec();
        Self {
            child,
            condition,
            schema,
            state: OperatorState::Created,
        }
    }
}

impl Operator for FilterOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        while let Some(row) = self.child.next(ctx)? {
            match self.condition.eval_bool(&row) {
                Ok(true) => return Ok(Some(row)),
                Ok(false) => {}
                Err(e) if e.is_recoverable() => {}
                Err(e) => return Err(QueryError::Eval(e)),
            }
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        // Assume half the child's rows survive.
        self.child.estimated_rows().map(|r| r / 2)
    }
}
