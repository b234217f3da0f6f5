//! Group operator with aggregates
//!
//! Sort-based grouping: rows are keyed by the group variables and run
//! through the external sorter (honoring the materialization budget),
//! then aggregated per adjacent equal-key run. One output row per
//! group carries the group keys plus the finalized aggregate values.
//!
//! Aggregate semantics:
//! - `Count` without an expression counts rows; with one, counts
//!   non-error evaluations
//! - an evaluation error inside any other aggregate leaves its result
//!   variable unbound for that group (the per-row recoverable class
//!   never aborts the query)
//! - `Sum`/`Avg` over an empty group yield 0

use crate::algebra::{Aggregate, AggregateKind};
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator, OperatorState};
use crate::solution::{empty_row, Binding, Row};
use crate::spill::{ExternalSorter, SortedRows};
use crate::var::VarId;
use quarry_db_core::Term;
use rustc_hash::FxHashSet;

/// Group operator
pub struct GroupOperator {
    child: BoxedOperator,
    by: Vec<VarId>,
    aggregates: Vec<(VarId, Aggregate)>,
    width: usize,
    schema: Vec<VarId>,
    state: OperatorState,
    stream: Option<GroupStream>,
}

struct GroupStream {
    sorted: SortedRows,
    /// Key of the run currently being aggregated, with its states.
    current: Option<(Vec<Binding>, Vec<AggState>)>,
    /// Whether any input row was seen (for the empty global group).
    saw_rows: bool,
    done: bool,
}

impl GroupOperator {
    /// Create a group over a child operator. `width` is the full row
    /// width (registry size).
    pub fn new(
        child: BoxedOperator,
        by: Vec<VarId>,
        aggregates: Vec<(VarId, Aggregate)>,
        width: usize,
    ) -> Self {
        let mut schema = by.clone();
        for (v, _) in &aggregates {
            if !schema.contains(v) {
                schema.push(*v);
            }
        }
        Self {
            child,
            by,
            aggregates,
            width,
            schema,
            state: OperatorState::Created,
            stream: None,
        }
    }

    fn materialize(&mut self, ctx: &EvalContext) -> Result<()> {
        let mut sorter =
            ExternalSorter::new(ctx.config.materialize_budget, vec![false; self.by.len()]);
        let mut saw_rows = false;
        while let Some(row) = self.child.next(ctx)? {
            saw_rows = true;
            let key: Vec<Binding> = self.by.iter().map(|v| row[v.index()].clone()).collect();
            sorter.push((key, row))?;
        }
        self.child.close();
        self.stream = Some(GroupStream {
            sorted: sorter.finish()?,
            current: None,
            saw_rows,
            done: false,
        });
        Ok(())
    }

    fn emit(&self, key: Vec<Binding>, states: Vec<AggState>) -> Row {
        let mut row = empty_row(self.width);
        for (var, binding) in self.by.iter().zip(key) {
            row[var.index()] = binding;
        }
        for ((var, _), state) in self.aggregates.iter().zip(states) {
            if let Some(term) = state.finalize() {
                row[var.index()] = Binding::Bound(term);
            }
        }
        row
    }

    fn fresh_states(&self) -> Vec<AggState> {
        self.aggregates
            .iter()
            .map(|(_, agg)| AggState::new(agg.clone()))
            .collect()
    }
}

impl Operator for GroupOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.child.open(ctx)?;
        self.state = OperatorState::Open;
        self.stream = None;
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        if self.stream.is_none() {
            self.materialize(ctx)?;
        }

        loop {
            let stream = self.stream.as_mut().expect("materialized");
            if stream.done {
                self.state = OperatorState::Exhausted;
                return Ok(None);
            }
            match stream.sorted.next_entry()? {
                Some((key, row)) => {
                    let same_run = stream
                        .current
                        .as_ref()
                        .map_or(false, |(current_key, _)| *current_key == key);
                    if same_run {
                        if let Some((_, states)) = stream.current.as_mut() {
                            for state in states.iter_mut() {
                                state.update(&row)?;
                            }
                        }
                        continue;
                    }
                    // New run: finish the previous one (if any), then
                    // start aggregating this key.
                    let finished = stream.current.take();
                    let mut states = self.fresh_states();
                    for state in states.iter_mut() {
                        state.update(&row)?;
                    }
                    let stream = self.stream.as_mut().expect("materialized");
                    stream.current = Some((key, states));
                    if let Some((key, states)) = finished {
                        return Ok(Some(self.emit(key, states)));
                    }
                }
                None => {
                    let (finished, saw_rows) = {
                        let stream = self.stream.as_mut().expect("materialized");
                        stream.done = true;
                        (stream.current.take(), stream.saw_rows)
                    };
                    self.state = OperatorState::Exhausted;
                    if let Some((key, states)) = finished {
                        return Ok(Some(self.emit(key, states)));
                    }
                    // No input rows and no group keys: one global
                    // group over the empty sequence.
                    if !saw_rows && self.by.is_empty() {
                        return Ok(Some(self.emit(Vec::new(), self.fresh_states())));
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn close(&mut self) {
        self.child.close();
        self.stream = None;
        self.state = OperatorState::Closed;
    }
}

// === Aggregate accumulation ===

enum Acc {
    Count(u64),
    Sum { int: i64, float: f64, is_float: bool },
    MinMax(Option<Term>),
    Avg { sum: f64, n: u64 },
    Sample(Option<Term>),
    Concat(Option<String>),
}

struct AggState {
    agg: Aggregate,
    acc: Acc,
    /// Distinct-value filter, when requested.
    seen: Option<FxHashSet<Term>>,
    /// A non-count aggregate that hit an evaluation error finalizes to
    /// unbound.
    errored: bool,
}

impl AggState {
    fn new(agg: Aggregate) -> Self {
        let acc = match agg.kind {
            AggregateKind::Count => Acc::Count(0),
            AggregateKind::Sum => Acc::Sum {
                int: 0,
                float: 0.0,
                is_float: false,
            },
            AggregateKind::Min | AggregateKind::Max => Acc::MinMax(None),
            AggregateKind::Avg => Acc::Avg { sum: 0.0, n: 0 },
            AggregateKind::Sample => Acc::Sample(None),
            AggregateKind::GroupConcat { .. } => Acc::Concat(None),
        };
        let seen = agg.distinct.then(FxHashSet::default);
        Self {
            agg,
            acc,
            seen,
            errored: false,
        }
    }

    fn update(&mut self, row: &Row) -> Result<()> {
        if self.errored {
            return Ok(());
        }
        let value = match &self.agg.expr {
            None => None,
            Some(expr) => match expr.eval(row) {
                Ok(term) => Some(term),
                Err(e) if e.is_recoverable() => {
                    // COUNT skips error rows; other aggregates poison.
                    if !matches!(self.acc, Acc::Count(_)) {
                        self.errored = true;
                    }
                    return Ok(());
                }
                Err(e) => return Err(QueryError::Eval(e)),
            },
        };
        if let (Some(seen), Some(term)) = (self.seen.as_mut(), value.as_ref()) {
            if !seen.insert(term.clone()) {
                return Ok(());
            }
        }

        match &mut self.acc {
            Acc::Count(n) => *n += 1,
            Acc::Sum {
                int,
                float,
                is_float,
            } => {
                let term = value.expect("sum requires an expression");
                match (term.as_i64(), term.as_f64()) {
                    (Some(i), _) if !*is_float => *int = int.wrapping_add(i),
                    (_, Some(f)) => {
                        if !*is_float {
                            *float = *int as f64;
                            *is_float = true;
                        }
                        *float += f;
                    }
                    _ => self.errored = true,
                }
            }
            Acc::MinMax(best) => {
                let term = value.expect("min/max requires an expression");
                let keep_new = match best.as_ref() {
                    None => true,
                    Some(current) => {
                        let ordering = super::sort::compare_bindings(
                            &Binding::Bound(term.clone()),
                            &Binding::Bound(current.clone()),
                        );
                        match self.agg.kind {
                            AggregateKind::Min => ordering == std::cmp::Ordering::Less,
                            _ => ordering == std::cmp::Ordering::Greater,
                        }
                    }
                };
                if keep_new {
                    *best = Some(term);
                }
            }
            Acc::Avg { sum, n } => {
                let term = value.expect("avg requires an expression");
                match term.as_f64() {
                    Some(f) => {
                        *sum += f;
                        *n += 1;
                    }
                    None => self.errored = true,
                }
            }
            Acc::Sample(slot) => {
                if slot.is_none() {
                    *slot = value;
                }
            }
            Acc::Concat(acc) => {
                let term = value.expect("group_concat requires an expression");
                let piece = match &term {
                    Term::Literal(lit) => lit.lexical().to_owned(),
                    Term::Iri(iri) => iri.to_string(),
                    _ => {
                        self.errored = true;
                        return Ok(());
                    }
                };
                let separator = match &self.agg.kind {
                    AggregateKind::GroupConcat { separator } => separator.clone(),
                    _ => unreachable!("concat acc implies group_concat kind"),
                };
                match acc {
                    None => *acc = Some(piece),
                    Some(s) => {
                        s.push_str(&separator);
                        s.push_str(&piece);
                    }
                }
            }
        }
        Ok(())
    }

    fn finalize(self) -> Option<Term> {
        if self.errored {
            return None;
        }
        match self.acc {
            Acc::Count(n) => Some(Term::integer(n as i64)),
            Acc::Sum {
                int,
                float,
                is_float,
            } => Some(if is_float {
                Term::double(float)
            } else {
                Term::integer(int)
            }),
            Acc::MinMax(best) => best,
            Acc::Avg { sum, n } => {
                if n == 0 {
                    Some(Term::integer(0))
                } else {
                    Some(Term::double(sum / n as f64))
                }
            }
            Acc::Sample(slot) => slot,
            Acc::Concat(acc) => Some(Term::literal(acc.unwrap_or_default())),
        }
    }
}
