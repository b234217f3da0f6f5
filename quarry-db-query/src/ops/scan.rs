//! Scan operator - the statement pattern evaluator
//!
//! Fixes each quad position from pattern constants and from the seed
//! row's bindings, range-scans the chosen index permutation, and emits
//! one extended row per matching record.
//!
//! A seed binding or constant that violates a positional kind
//! constraint (literal as subject, non-IRI predicate, literal as graph)
//! yields an empty sequence, never an error: such a pattern simply
//! cannot match anything.

use crate::algebra::{GraphSpec, PatternTerm, StatementPattern};
use crate::context::EvalContext;
use crate::error::Result;
use crate::operator::{Operator, OperatorState};
use crate::solution::{bound, Binding, Row};
use crate::var::VarId;
use quarry_db_core::{RecordPattern, Term, TermId};
use quarry_db_index::RecordIter;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QuadPos {
    S,
    P,
    O,
    G,
}

/// Scan operator - reads records matching a pattern
pub struct ScanOperator {
    pattern: StatementPattern,
    schema: Vec<VarId>,
    seed: Row,
    state: OperatorState,
    iter: Option<Box<dyn RecordIter>>,
    /// Variable positions not fixed by constants or the seed.
    fill: Vec<(QuadPos, VarId)>,
    /// Graph variable must skip default-graph records.
    named_graph_var: bool,
    estimate: Option<u64>,
}

impl ScanOperator {
    /// Create a scan over a pattern, seeded by the current outer row.
    pub fn new(pattern: StatementPattern, seed: Row) -> Self {
        let schema = pattern.vars();
        Self {
            pattern,
            schema,
            seed,
            state: OperatorState::Created,
            iter: None,
            fill: Vec::new(),
            named_graph_var: false,
            estimate: None,
        }
    }

    /// Resolve one position to a fixed id, a fill variable, or a
    /// cannot-match verdict.
    ///
    /// `kind_ok` is the positional constraint; `None` from the
    /// dictionary lookup also means no record can match.
    fn resolve_position(
        &self,
        ctx: &EvalContext,
        term: &PatternTerm,
        pos: QuadPos,
        kind_ok: fn(&Term) -> bool,
    ) -> PositionPlan {
        let fixed_term = match term {
            PatternTerm::Const(t) => Some(t.clone()),
            PatternTerm::Var(v) => bound(&self.seed, *v).cloned(),
        };
        match fixed_term {
            Some(t) => {
                if !kind_ok(&t) {
                    return PositionPlan::CannotMatch;
                }
                match ctx.dict.lookup(&t) {
                    Some(id) => PositionPlan::Fixed(id),
                    None => PositionPlan::CannotMatch,
                }
            }
            None => match term {
                PatternTerm::Var(v) => PositionPlan::Fill(pos, *v),
                // Unreachable: a Const always yields a fixed term.
                PatternTerm::Const(_) => PositionPlan::CannotMatch,
            },
        }
    }
}

enum PositionPlan {
    Fixed(TermId),
    Fill(QuadPos, VarId),
    CannotMatch,
}

fn record_id(record: &quarry_db_core::Record, pos: QuadPos) -> TermId {
    match pos {
        QuadPos::S => record.s,
        QuadPos::P => record.p,
        QuadPos::O => record.o,
        QuadPos::G => record.g,
    }
}

impl Operator for ScanOperator {
    fn schema(&self) -> &[VarId] {
        &self.schema
    }

    fn open(&mut self, ctx: &EvalContext) -> Result<()> {
        self.state = OperatorState::Open;
        self.fill.clear();
        self.named_graph_var = false;

        let mut record_pattern = RecordPattern::any();
        if !ctx.include_inferred {
            record_pattern.inferred = Some(false);
        }

        let positions = [
            (
                QuadPos::S,
                self.pattern.subject.clone(),
                Term::is_resource as fn(&Term) -> bool,
            ),
            (QuadPos::P, self.pattern.predicate.clone(), Term::is_iri),
            (QuadPos::O, self.pattern.object.clone(), |_: &Term| true),
        ];
        for (pos, term, kind_ok) in positions {
            match self.resolve_position(ctx, &term, pos, kind_ok) {
                PositionPlan::Fixed(id) => match pos {
                    QuadPos::S => record_pattern.s = Some(id),
                    QuadPos::P => record_pattern.p = Some(id),
                    QuadPos::O => record_pattern.o = Some(id),
                    QuadPos::G => unreachable!("graph handled below"),
                },
                PositionPlan::Fill(pos, var) => self.fill.push((pos, var)),
                PositionPlan::CannotMatch => {
                    self.state = OperatorState::Exhausted;
                    return Ok(());
                }
            }
        }

        match self.pattern.graph.clone() {
            GraphSpec::Any => {}
            GraphSpec::Default => record_pattern.g = Some(TermId::DEFAULT_GRAPH),
            GraphSpec::Named(term) => {
                match self.resolve_position(ctx, &term, QuadPos::G, Term::is_resource) {
                    PositionPlan::Fixed(id) => record_pattern.g = Some(id),
                    PositionPlan::Fill(pos, var) => {
                        // Graph variables range over named graphs only.
                        self.fill.push((pos, var));
                        self.named_graph_var = true;
                    }
                    PositionPlan::CannotMatch => {
                        self.state = OperatorState::Exhausted;
                        return Ok(());
                    }
                }
            }
        }

        self.estimate = Some(ctx.source.estimated_cardinality(&record_pattern));
        self.iter = Some(
            ctx.source
                .scan(record_pattern, self.pattern.hints.object_resource),
        );
        Ok(())
    }

    fn next(&mut self, ctx: &EvalContext) -> Result<Option<Row>> {
        if !self.state.can_next() {
            return Ok(None);
        }
        let Some(iter) = self.iter.as_mut() else {
            self.state = OperatorState::Exhausted;
            return Ok(None);
        };

        'records: while let Some(record) = iter.next() {
            if self.named_graph_var && record.g.is_default_graph() {
                continue;
            }
            // A variable used in several positions must see one id.
            for (i, (pos_a, var_a)) in self.fill.iter().enumerate() {
                for (pos_b, var_b) in &self.fill[i + 1..] {
                    if var_a == var_b && record_id(&record, *pos_a) != record_id(&record, *pos_b) {
                        continue 'records;
                    }
                }
            }

            let mut row = self.seed.clone();
            for (pos, var) in &self.fill {
                let term = ctx.dict.resolve(record_id(&record, *pos))?;
                row[var.index()] = Binding::Bound(term);
            }
            return Ok(Some(row));
        }

        self.state = OperatorState::Exhausted;
        if let Some(mut iter) = self.iter.take() {
            iter.close();
        }
        Ok(None)
    }

    fn close(&mut self) {
        if let Some(mut iter) = self.iter.take() {
            iter.close();
        }
        self.state = OperatorState::Closed;
    }

    fn estimated_rows(&self) -> Option<u64> {
        self.estimate
    }
}
