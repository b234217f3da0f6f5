//! Left join (OPTIONAL) operator
//!
//! For each left row the right plan is instantiated seeded with it; the
//! join condition filters the combined rows. When no combined row
//! passes, the left row is emitted unchanged with the right-side
//! variables unbound. A recoverable condition error counts as false; a
//! fatal one aborts the query.

use crate::algebra::Algebra;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::exec::compile;
use crate::expr::Expr;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::var::VarId;
use std::sync::Arc;

/// Left-join operator
pub struct LeftJoinOperator {
    left: BoxedOperator,
    right_plan: Arc<Algebra>,
    condition: Option<Expr>,
    width: usize,
    schema: Vec<VarId>,
    state: OperatorState,
    current: Option<RightState>,
}

struct RightState {
    op: BoxedOperator,
    left_row: Row,
    matched: bool,
}

fn condition_passes(condition: &Option<Expr>, row: &Row) -> Result<bool> {
    match condition {
        None => Ok(true),
        Some(expr) => match expr.eval_bool(row) {
            Ok(pass) => Ok(pass),
            Err(e) if e.is_recoverable() => Ok(false),
            Err(e) => Err(QueryError::Eval(e)),
        },
    }
}

impl LeftJoinOperator {
    /// Create a left join.
    pub fn new(
        left: BoxedOperator,
        right_plan: Arc<Algebra>,
        condition: Option<Expr>,
        width: usize,
    ) -> Self {
        let mut schema: Vec<VarId> = left.schema().to_vec();
        for v in right_plan.binds() {
            if !schema.contains(&v) {
                schema.push(v);
            }
        }
        Self {
            left,
            right_plan,
            condition,
            width,
            schema,
            state: OperatorState::Created,
            current: None,
        }
    }
}

impl Operator for LeftJoinOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.left.open(ctx)?;
        self.state = OperatorState::Open;
        self.current = None;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        loop {
            if let Some(current) = self.current.as_mut() {
                while let Some(row) = current.op.next(ctx)? {
                    if condition_passes(&self.condition, &row)? {
                        current.matched = true;
                        return Ok(Some(row));
                    }
                }
                let mut finished = self.current.take().expect("current right state");
                finished.op.close();
                if !finished.matched {
                    return Ok(Some(finished.left_row));
                }
            }
            match self.left.next(ctx)? {
                Some(left_row) => {
                    let mut op = compile(&self.right_plan, left_row.clone(), self.width);
                    op.open(ctx)?;
                    self.current = Some(RightState {
                        op,
                        left_row,
                        matched: false,
                    });
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
        if let Some(mut current) = self.current.take() {
            current.op.close();
        }
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.left.estimated_rows()
    }
}
