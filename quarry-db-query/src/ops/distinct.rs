//! Distinct and Reduced operators
//!
//! `Distinct` streams through a seen-set while it fits the
//! materialization budget. Past the budget it degrades to sort-based
//! deduplication: everything (the seen rows included) goes through the
//! external sorter keyed by the whole row, and the merged stream is
//! emitted with adjacent duplicates dropped - skipping rows already
//! emitted during the streaming phase.
//!
//! `Reduced` only drops *adjacent* duplicates and never materializes.

use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::Row;
use crate::spill::{ExternalSorter, SortedRows};
use crate::var::VarId;
use rustc_hash::FxHashSet;

enum Phase {
    Streaming { seen: FxHashSet<Row> },
    Spilled {
        stream: SortedRows,
        already_emitted: FxHashSet<Row>,
        last: Option<Row>,
    },
}

/// Distinct operator
pub struct DistinctOperator {
    child: BoxedOperator,
    schema: Vec<VarId>,
    state: OperatorState,
    phase: Phase,
}

impl DistinctOperator {
    /// Create a distinct over a child operator.
    pub fn new(child: BoxedOperator) -> Self {
        let schema = child.schema().to_vec();
        Self {
            child,
            schema,
            state: OperatorState::Created,
            phase: Phase::Streaming {
                seen: FxHashSet::default(),
            },
        }
    }

    /// Switch to sort-based dedup: spill the seen rows and the rest of
    /// the child's output, remembering what was already emitted.
    fn spill(&mut self, ctx: &EvalContext, pending: Row) -> Result<()> {
        let seen = match std::mem::replace(
            &mut self.phase,
            Phase::Streaming {
                seen: FxHashSet::default(),
            },
        ) {
            Phase::Streaming { seen } => seen,
            Phase::Spilled { .. } => unreachable!("spill is entered from streaming only"),
        };

        let mut sorter = ExternalSorter::new(ctx.config.materialize_budget, Vec::new());
        for row in seen.iter().cloned() {
            sorter.push((row.clone(), row))?;
        }
        sorter.push((pending.clone(), pending))?;
        while let Some(row) = self.child.next(ctx)? {
            sorter.push((row.clone(), row))?;
        }
        self.child.close();

        self.phase = Phase::Spilled {
            stream: sorter.finish()?,
            already_emitted: seen,
            last: None,
        };
        Ok(())
    }
}

impl Operator for DistinctOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        self.phase = Phase::Streaming {
            seen: FxHashSet::default(),
        };
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        loop {
            if matches!(self.phase, Phase::Streaming { .. }) {
                let Some(row) = self.child.next(ctx)? else {
                    self.state = OperatorState::Exhausted;
                    return Ok(None);
                };
                let (duplicate, at_budget) = match &self.phase {
                    Phase::Streaming { seen } => (
                        seen.contains(&row),
                        seen.len() >= ctx.config.materialize_budget,
                    ),
                    Phase::Spilled { .. } => unreachable!("checked above"),
                };
                if duplicate {
                    continue;
                }
                if at_budget {
                    self.spill(ctx, row)?;
                    continue;
                }
                if let Phase::Streaming { seen } = &mut self.phase {
                    seen.insert(row.clone());
                }
                return Ok(Some(row));
            }

            let Phase::Spilled {
                stream,
                already_emitted,
                last,
            } = &mut self.phase
            else {
                unreachable!("checked above");
            };
            let Some((_, row)) = stream.next_entry()? else {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            };
            if last.as_ref() == Some(&row) || already_emitted.contains(&row) {
                continue;
            }
            *last = Some(row.clone());
            return Ok(Some(row));
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.phase = Phase::Streaming {
            seen: FxHashSet::default(),
        };
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.child.estimated_rows()
    }
}

/// Reduced operator - drops adjacent duplicates, stays lazy
pub struct ReducedOperator {
    child: BoxedOperator,
    schema: Vec<VarId>,
    state: OperatorState,
    last: Option<Row>,
}

impl ReducedOperator {
    /// Create a reduced over a child operator.
    pub fn new(child: BoxedOperator) -> Self {
        let schema = child.schema().to_vec();
        Self {
            child,
            schema,
            state: OperatorState::Created,
            last: None,
        }
    }
}

impl Operator for ReducedOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        self.last = None;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        while let Some(row) = self.child.next(ctx)? {
            if self.last.as_ref() == Some(&row) {
                continue;
            }
            self.last = Some(row.clone());
            return Ok(Some(row));
        }
        self.state = OperatorState::Exhausted;
        Ok(None)
    }

    fn close(&mut self) {
        self.child.close();
        self.last = None;
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.child.estimated_rows()
    }
}
