//! Slice operator - OFFSET/LIMIT
//!
//! Closes the child as soon as the limit is reached so index scans are
//! released without waiting for the consumer to drain.

use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::var::VarId;

/// Slice operator
pub struct SliceOperator {
    child: BoxedOperator,
    offset: u64,
    limit: Option<u64>,
    skipped: u64,
    emitted: u64,
    schema: Vec<VarId>,
    state: OperatorState,
}

impl SliceOperator {
    /// Create a slice over a child operator.
    pub fn new(child: BoxedOperator, offset: u64, limit: Option<u64>) -> Self {
        let schema = child.schema().to_vec();
        Self {
            child,
            offset,
            limit,
            skipped: 0,
            emitted: 0,
            schema,
            state: OperatorState::Created,
        }
    }
}

impl Operator for SliceOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        self.skipped = 0;
        self.emitted = 0;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        if let Some(limit) = self.limit {
            if self.emitted >= limit {
                self.state = OperatorState::Exhausted;
                self.child.close();
                return Ok(None);
            }
        }
        while self.skipped < self.offset {
            if self.child.next(ctx)?.is_none() {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            self.skipped += 1;
        }
        match self.child.next(ctx)? {
            Some(row) => {
                self.emitted += 1;
                if self.limit == Some(self.emitted) {
                    // Limit reached: release the child's scans now.
                    self.child.close();
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
        let base = self.child.estimated_rows()?;
        let after_offset = base.saturating_sub(self.offset);
        Some(match self.limit {
            Some(limit) => after_offset.min(limit),
            None => after_offset,
        })
    }
}
