//! Projection operator
//!
//! Hides the child subtree's variables that are not projected, so
//! downstream Distinct/Reduced compare only the visible ones. Variables
//! bound outside the subtree (the seed of a correlated evaluation) are
//! left untouched - projection scopes the subtree, not the outer row.

use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::{Binding, Row};
use crate::var::VarId;

/// Projection operator
pub struct ProjectOperator {
    child: BoxedOperator,
    vars: Vec<VarId>,
    /// Child-bound variables to clear (child schema minus projection).
    hide: Vec<VarId>,
    state: OperatorState,
}

impl ProjectOperator {
    /// Create a projection over a child operator.
    pub fn new(child: BoxedOperator, vars: Vec<VarId>) -> Self {
        let hide: Vec<VarId> = child
            .schema()
            .iter()
            .filter(|v| !vars.contains(v))
            .copied()
            .collect();
        Self {
            child,
            vars,
            hide,
            state: OperatorState::Created,
        }
    }
}

impl Operator for ProjectOperator {
    fn schema(&self) -> &[VarId] {
        &self.vars
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
                for v in &self.hide {
                    row[v.index()] = Binding::Unbound;
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
