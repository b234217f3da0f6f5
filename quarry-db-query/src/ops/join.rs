//! Join operator - correlated nested loop
//!
//! For each left row, the right subtree is compiled seeded with that
//! row and drained. Seeding fixes every shared variable in right-side
//! scans, so shared variables agree by construction and the output is
//! the natural join of the two arms.

use crate::algebra::Algebra;
use crate::context::EvalContext;
use crate::error::Result;
use crate::exec::compile;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::var::VarId;
use std::sync::Arc;

/// Nested-loop join operator
pub struct JoinOperator {
    left: BoxedOperator,
    right_plan: Arc<Algebra>,
    width: usize,
    schema: Vec<VarId>,
    state: OperatorState,
    current_right: Option<BoxedOperator>,
}

impl JoinOperator {
    /// Create a join of an already-compiled left side and a right plan
    /// instantiated per left row.
    pub fn new(left: BoxedOperator, right_plan: Arc<Algebra>, width: usize) -> Self {
        let mut schema: Vec<VarId> = left.schema().to_vec();
        for v in right_plan.binds() {
            if !schema.contains(&v) {
                schema.push(v);
            }
        }
        Self {
            left,
            right_plan,
            width,
            schema,
            state: OperatorState::Created,
            current_right: None,
        }
    }
}

impl Operator for JoinOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.left.open(ctx)?;
        self.state = OperatorState::Open;
        self.current_right = None;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        loop {
            if let Some(right) = self.current_right.as_mut() {
                if let Some(row) = right.next(ctx)? {
                    return Ok(Some(row));
                }
                if let Some(mut right) = self.current_right.take() {
                    right.close();
                }
            }
            match self.left.next(ctx)? {
                Some(left_row) => {
                    let mut right = compile(&self.right_plan, left_row, self.width);
                    right.open(ctx)?;
                    self.current_right = Some(right);
                }
                None => {
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        self.left.close();
        if let Some(mut right) = self.current_right.take() {
            right.close();
        }
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.left.estimated_rows()
    }
}
