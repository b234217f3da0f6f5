//! Union operator - left arm first, then the right, no interleaving
//!
//! Rows are full-width, so variables one arm does not bind are simply
//! unbound in its rows; no schema normalization step is needed. The
//! right arm is opened lazily when the left is exhausted, keeping at
//! most one arm's scans live.

use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::var::VarId;

/// Union operator
pub struct UnionOperator {
    left: BoxedOperator,
    right: BoxedOperator,
    schema: Vec<VarId>,
    state: OperatorState,
    on_right: bool,
}

impl UnionOperator {
    /// Create a union of two compiled arms (both seeded identically).
    pub fn new(left: BoxedOperator, right: BoxedOperator) -> Self {
        let mut schema: Vec<VarId> = left.schema().to_vec();
        for v in right.schema() {
            if !schema.contains(v) {
                schema.push(*v);
            }
        }
        Self {
            left,
            right,
            schema,
            state: OperatorState::Created,
            on_right: false,
        }
    }
}

impl Operator for UnionOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.left.open(ctx)?;
        self.state = OperatorState::Open;
        self.on_right = false;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        if !self.on_right {
            if let Some(row) = self.left.next(ctx)? {
                return Ok(Some(row));
            }
            self.left.close();
            self.on_right = true;
            self.right.open(ctx)?;
        }
        match self.right.next(ctx)? {
            Some(row) => Ok(Some(row)),
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.left.close();
        self.right.close();
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        match (self.left.estimated_rows(), self.right.estimated_rows()) {
            (Some(l), Some(r)) => Some(l.saturating_add(r)),
            _ => None,
        }
    }
}
