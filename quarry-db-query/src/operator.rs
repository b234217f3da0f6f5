//! Operator trait and lifecycle types
//!
//! Operators form a tree that produces solution rows through the
//! `open/next/close` lifecycle pattern. Evaluation is pull-based and
//! single-threaded: an operator touches its children only from inside
//! its own `next`.

use crate::context::EvalContext;
use crate::error::Result;
use crate::solution::Row;
use crate::var::VarId;

/// Query execution operator
///
/// Lifecycle:
/// 1. `open()` - initialize state, open children
/// 2. `next()` - pull rows until exhausted (returns None)
/// 3. `close()` - release resources; must propagate to children and be
///    idempotent (cancellation calls it on the root at any time)
///
/// # Schema Contract
///
/// `schema()` lists the variables this operator may bind, fixed at
/// construction. Rows are full-width (indexed by `VarId`), so the
/// schema is advisory: consumers use it for scope analysis, not for
/// row layout.
pub trait Operator: Send {
    /// Output schema - which variables this operator may bind
    fn schema(&self) -> &[VarId];

    /// Initialize operator state
    fn open(&mut self, ctx: &EvalContext) -> Result<()>;

    /// Pull the next row, or None when exhausted
    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>>;

    /// Release resources; idempotent, propagates to children
    fn close(&mut self);

    /// Estimated row count (for planning/diagnostics)
    fn estimated_rows(&self) -> Option<u64> {
        None
    }
}

/// Boxed operator for dynamic dispatch
pub type BoxedOperator = Box<dyn Operator>;

/// Operator state for lifecycle tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// Not yet opened
    Created,
    /// Opened and ready to produce rows
    Open,
    /// Exhausted (next returned None)
    Exhausted,
    /// Closed
    Closed,
}

impl OperatorState {
    /// Check if the operator can produce rows
    pub fn can_next(&self) -> bool {
        matches!(self, OperatorState::Open)
    }

    /// Check if the operator is closed
    pub fn is_closed(&self) -> bool {
        matches!(self, OperatorState::Closed)
    }
}
