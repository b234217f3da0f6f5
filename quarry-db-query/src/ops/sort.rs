//! Sort operator and binding comparison
//!
//! `OrderBy` is a blocking operator: it buffers its input, sorts by the
//! key expressions, then emits in order. Buffering honors the
//! materialization budget and spills sorted runs to temp files beyond
//! it (see `spill`).
//!
//! Key expressions are evaluated once per row when the row is buffered;
//! a recoverable evaluation error yields an unbound key, which sorts
//! first.

use crate::algebra::OrderKey;
use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::{Binding, Row};
use crate::spill::{ExternalSorter, SortedRows};
use crate::var::VarId;
use std::cmp::Ordering;

/// Compare two bindings for ordering purposes.
///
/// Ordering rules:
/// 1. Unbound sorts before any bound value
/// 2. Type class ordering: BlankNode < Iri < numeric Literal < other
///    Literal < Triple
/// 3. Numeric literals compare by value (f64 total order), distinct
///    equal-valued terms refined by structural order
/// 4. Everything else uses the term's structural order
///
/// This is a strict total order consistent with term equality, which
/// the external merge and adjacent-duplicate elimination rely on.
pub fn compare_bindings(a: &Binding, b: &Binding) -> Ordering {
    fn class_rank(t: &quarry_db_core::Term) -> u8 {
        use quarry_db_core::Term;
        match t {
            Term::BlankNode(_) => 0,
            Term::Iri(_) => 1,
            Term::Literal(_) if t.is_numeric() => 2,
            Term::Literal(_) => 3,
            Term::Triple(_) => 4,
        }
    }

    match (a, b) {
        (Binding::Unbound, Binding::Unbound) => Ordering::Equal,
        (Binding::Unbound, _) => Ordering::Less,
        (_, Binding::Unbound) => Ordering::Greater,
        (Binding::Bound(x), Binding::Bound(y)) => {
            let (rx, ry) = (class_rank(x), class_rank(y));
            if rx != ry {
                return rx.cmp(&ry);
            }
            if rx == 2 {
                let (vx, vy) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
                let by_value = vx.total_cmp(&vy);
                if by_value != Ordering::Equal {
                    return by_value;
                }
            }
            x.cmp(y)
        }
    }
}

/// Compare two key vectors under per-key directions.
pub(crate) fn compare_keys(a: &[Binding], b: &[Binding], descending: &[bool]) -> Ordering {
    for (i, (ka, kb)) in a.iter().zip(b.iter()).enumerate() {
        let mut ordering = compare_bindings(ka, kb);
        if descending.get(i).copied().unwrap_or(false) {
            ordering = ordering.reverse();
        }
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Sort operator
pub struct SortOperator {
    child: BoxedOperator,
    keys: Vec<OrderKey>,
    schema: Vec<VarId>,
    state: OperatorState,
    sorted: Option<SortedRows>,
}

impl SortOperator {
    /// Create a sort over a child operator.
    pub fn new(child: BoxedOperator, keys: Vec<OrderKey>) -> Self {
        let schema = child.schema().to_vec();
        Self {
            child,
            keys,
            schema,
            state: OperatorState::Created,
            sorted: None,
        }
    }

    fn materialize(&mut self, ctx: &EvalContext) -> Result<()> {
        let descending: Vec<bool> = self.keys.iter().map(|k| k.descending).collect();
        let mut sorter = ExternalSorter::new(ctx.config.materialize_budget, descending);
        while let Some(row) = self.child.next(ctx)? {
            let mut keys = Vec::with_capacity(self.keys.len());
            for k in &self.keys {
                keys.push(match k.expr.eval(&row) {
                    Ok(term) => Binding::Bound(term),
                    Err(e) if e.is_recoverable() => Binding::Unbound,
                    Err(e) => return Err(crate::error::QueryError::Eval(e)),
                });
            }
            sorter.push((keys, row))?;
        }
        self.child.close();
        self.sorted = Some(sorter.finish()?);
        Ok(())
    }
}

impl Operator for SortOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        self.sorted = None;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        if self.sorted.is_none() {
            self.materialize(ctx)?;
        }
        let sorted = self.sorted.as_mut().expect("materialized");
        match sorted.next_entry()? {
            Some((_, row)) => Ok(Some(row)),
            None => {
                self.state = OperatorState::Exhausted;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.sorted = None;
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.child.estimated_rows()
    }
}
