//! Extend (BIND) operator
//!
//! Evaluates expressions per row and binds the results to fresh
//! variables. A recoverable evaluation error leaves that variable
//! unbound for the row instead of failing it; a fatal error aborts.

use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::expr::Expr;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::{Binding, Row};
use crate::var::VarId;

/// Extend operator
pub struct ExtendOperator {
    child: BoxedOperator,
    bindings: Vec<(VarId, Expr)>,
    schema: Vec<VarId>,
    state: OperatorState,
}

impl ExtendOperator {
    /// Create an extend over a child operator.
    pub fn new(child: BoxedOperator, bindings: Vec<(VarId, Expr)>) -> Self {
        let mut schema = child.schema().to_vec();
        for (v, _) in &bindings {
            if !schema.contains(v) {
                schema.push(*v);
            }
        }
        Self {
            child,
            bindings,
            schema,
            state: OperatorState::Created,
        }
    }
}

impl Operator for ExtendOperator {
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
        match self.child.next(ctx)? {
            Some(mut row) => {
                for (var, expr) in &self.bindings {
                    match expr.eval(&row) {
                        Ok(term) => row[var.index()] = Binding::Bound(term),
                        Err(e) if e.is_recoverable() => row[var.index()] = Binding::Unbound,
                        Err(e) => return Err(QueryError::Eval(e)),
                    }
                }
                Ok(Some(row))
            }
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.child.estimated_rows()
    }
}
