//! Values operator - externally supplied binding rows
//!
//! Each supplied row is merged with the seed: a supplied value for a
//! variable the seed already binds must agree, otherwise the row is
//! dropped (natural-join semantics with the surrounding group).

use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{Operator, OperatorState};
use crate::solution::{bound, Binding, Row};
use crate::var::VarId;
use quarry_db_core::Term;

/// Values operator
pub struct ValuesOperator {
    vars: Vec<VarId>,
    rows: Vec<Vec<Option<Term>>>,
    seed: Row,
    pos: usize,
    state: OperatorState,
}

impl ValuesOperator {
    /// Create a values source seeded by the current outer row.
    pub fn new(vars: Vec<VarId>, rows: Vec<Vec<Option<Term>>>, seed: Row) -> Self {
        Self {
            vars,
            rows,
            seed,
            pos: 0,
            state: OperatorState::Created,
        }
    }
}

impl Operator for ValuesOperator {
    fn schema(&self) -> &[VarId] {
        &self.vars
    }

    fn open(&mut self, _ctx: &EvalContext) -> Result<()> {
        self.state = OperatorState::Open;
        self.pos = 0;
        Ok(())
    }

    fn next(&mut self, _ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        'rows: while self.pos < self.rows.len() {
            let values = &self.rows[self.pos];
            self.pos += 1;

            let mut row = self.seed.clone();
            for (var, value) in self.vars.iter().zip(values) {
                let Some(term) = value else { continue };
                match bound(&self.seed, *var) {
                    Some(existing) if existing != term => continue 'rows,
                    _ => row[var.index()] = Binding::Bound(term.clone()),
                }
            }
            return Ok(Some(row));
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        Some(self.rows.len() as u64)
    }
}
