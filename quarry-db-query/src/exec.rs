//! Compilation and the query-results surface
//!
//! `evaluate` optimizes an algebra tree, compiles it to an operator
//! tree and wraps it in `QueryResults`: the ordered binding names plus
//! a lazy solution sequence with an explicit, idempotent `close` that
//! propagates to every operator and index scan.
//!
//! After a terminal error the already-delivered solutions stay valid
//! and the sequence is exhausted; no further rows are produced.

use crate::algebra::Algebra;
use crate::context::EvalContext;
use crate::error::{QueryError, Result};
use crate::operator::{BoxedOperator, Operator};
use crate::ops::bind::ExtendOperator;
use crate::ops::distinct::{DistinctOperator, ReducedOperator};
use crate::ops::filter::FilterOperator;
use crate::ops::group::GroupOperator;
use crate::ops::join::JoinOperator;
use crate::ops::optional::LeftJoinOperator;
use crate::ops::project::ProjectOperator;
use crate::ops::scan::ScanOperator;
use crate::ops::slice::SliceOperator;
use crate::ops::sort::SortOperator;
use crate::ops::union::UnionOperator;
use crate::ops::values::ValuesOperator;
use crate::optimizer;
use crate::solution::{empty_row, Binding, Row, Solution};
use crate::var::{VarId, VarRegistry};
use quarry_db_core::Term;
use std::sync::Arc;
use tracing::warn;

/// Compile an algebra subtree into an operator, seeded with the current
/// outer row. Called once for the root and again per outer row for the
/// correlated right sides of joins.
pub(crate) fn compile(algebra: &Algebra, seed: Row, width: usize) -> BoxedOperator {
    match algebra {
        Algebra::Pattern(p) => Box::new(ScanOperator::new(p.clone(), seed)),
        Algebra::Join(left, right) => {
            let left_op = compile(left, seed, width);
            Box::new(JoinOperator::new(
                left_op,
                Arc::new((**right).clone()),
                width,
            ))
        }
        Algebra::LeftJoin {
            left,
            right,
            condition,
        } => {
            let left_op = compile(left, seed, width);
            Box::new(LeftJoinOperator::new(
                left_op,
                Arc::new((**right).clone()),
                condition.clone(),
                width,
            ))
        }
        Algebra::Union(left, right) => {
            let left_op = compile(left, seed.clone(), width);
            let right_op = compile(right, seed, width);
            Box::new(UnionOperator::new(left_op, right_op))
        }
        Algebra::Filter { condition, arg } => {
            Box::new(FilterOperator::new(compile(arg, seed, width), condition.clone()))
        }
        Algebra::Extend { arg, bindings } => {
            Box::new(ExtendOperator::new(compile(arg, seed, width), bindings.clone()))
        }
        Algebra::Project { arg, vars } => {
            Box::new(ProjectOperator::new(compile(arg, seed, width), vars.clone()))
        }
        Algebra::Distinct(arg) => Box::new(DistinctOperator::new(compile(arg, seed, width))),
        Algebra::Reduced(arg) => Box::new(ReducedOperator::new(compile(arg, seed, width))),
        Algebra::OrderBy { arg, keys } => {
            Box::new(SortOperator::new(compile(arg, seed, width), keys.clone()))
        }
        Algebra::Slice { arg, offset, limit } => Box::new(SliceOperator::new(
            compile(arg, seed, width),
            *offset,
            *limit,
        )),
        Algebra::Group {
            arg,
            by,
            aggregates,
        } => Box::new(GroupOperator::new(
            compile(arg, seed, width),
            by.clone(),
            aggregates.clone(),
            width,
        )),
        Algebra::Values { vars, rows } => {
            Box::new(ValuesOperator::new(vars.clone(), rows.clone(), seed))
        }
    }
}

/// The declared output variables: a root projection's list when
/// present, otherwise every variable in first-mention order.
fn output_vars(algebra: &Algebra) -> Vec<VarId> {
    match algebra {
        Algebra::Project { vars, .. } => vars.clone(),
        Algebra::Slice { arg, .. }
        | Algebra::OrderBy { arg, .. }
        | Algebra::Filter { arg, .. } => output_vars(arg),
        Algebra::Distinct(arg) | Algebra::Reduced(arg) => output_vars(arg),
        other => other.vars_in_order(),
    }
}

/// Evaluate an algebra tree (optimizer applied first).
pub fn evaluate(
    algebra: &Algebra,
    registry: &VarRegistry,
    initial: &[(VarId, Term)],
    ctx: EvalContext,
) -> Result<QueryResults> {
    let optimized = optimizer::optimize(algebra.clone(), ctx.source.as_ref(), &ctx.dict);
    run(algebra, &optimized, registry, initial, ctx)
}

/// Evaluate without the optimizer passes (plan exactly as given).
pub fn evaluate_raw(
    algebra: &Algebra,
    registry: &VarRegistry,
    initial: &[(VarId, Term)],
    ctx: EvalContext,
) -> Result<QueryResults> {
    run(algebra, algebra, registry, initial, ctx)
}

fn run(
    original: &Algebra,
    plan: &Algebra,
    registry: &VarRegistry,
    initial: &[(VarId, Term)],
    ctx: EvalContext,
) -> Result<QueryResults> {
    let width = registry.len();
    let mut seed = empty_row(width);
    for (var, term) in initial {
        if var.index() >= width {
            return Err(QueryError::invalid(format!(
                "initial binding for unregistered variable {:?}",
                var
            )));
        }
        seed[var.index()] = Binding::Bound(term.clone());
    }

    let name_vars = output_vars(original);
    let mut names: Vec<Arc<str>> = Vec::with_capacity(name_vars.len());
    for v in &name_vars {
        match registry.name(*v) {
            Some(name) => names.push(name.clone()),
            None => {
                return Err(QueryError::invalid(format!(
                    "algebra references unregistered variable {:?}",
                    v
                )))
            }
        }
    }

    let mut root = compile(plan, seed, width);
    root.open(&ctx)?;
    Ok(QueryResults {
        names: names.into(),
        name_vars,
        root,
        ctx,
        state: ResultsState::Open,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ResultsState {
    Open,
    Exhausted,
    Closed,
}

/// Lazy sequence of query solutions.
///
/// The binding names are declared before the first solution is
/// produced. `close` is idempotent, releases every operator and index
/// scan, and is also invoked by drop (with a logged warning - correct
/// callers close explicitly or drain the sequence).
pub struct QueryResults {
    names: Arc<[Arc<str>]>,
    name_vars: Vec<VarId>,
    root: BoxedOperator,
    ctx: EvalContext,
    state: ResultsState,
}

impl QueryResults {
    /// The declared binding names, in order.
    pub fn binding_names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Pull the next solution. After an error or exhaustion, always
    /// `None`.
    pub fn next_solution(&mut self) -> Option<Result<Solution>> {
        if self.state != ResultsState::Open {
            return None;
        }
        match self.root.next(&self.ctx) {
            Ok(Some(row)) => {
                let values: Vec<Option<Term>> = self
                    .name_vars
                    .iter()
                    .map(|v| row[v.index()].term().cloned())
                    .collect();
                Some(Ok(Solution::new(self.names.clone(), values)))
            }
            Ok(None) => {
                self.state = ResultsState::Exhausted;
                self.root.close();
                None
            }
            Err(e) => {
                self.state = ResultsState::Closed;
                self.root.close();
                Some(Err(e))
            }
        }
    }

    /// Release all operators and scans. Idempotent.
    pub fn close(&mut self) {
        if self.state != ResultsState::Closed {
            self.root.close();
            self.state = ResultsState::Closed;
        }
    }

    /// Configured background-producer queue capacity.
    pub(crate) fn queue_capacity(&self) -> usize {
        self.ctx.config.producer_queue_capacity
    }

    /// Drain into a vector (closing on completion or error).
    pub fn collect_solutions(&mut self) -> Result<Vec<Solution>> {
        let mut out = Vec::new();
        while let Some(solution) = self.next_solution() {
            out.push(solution?);
        }
        Ok(out)
    }
}

impl Iterator for QueryResults {
    type Item = Result<Solution>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_solution()
    }
}

impl Drop for QueryResults {
    fn drop(&mut self) {
        if self.state == ResultsState::Open {
            warn!("query results dropped while open; closing (callers should close explicitly)");
            self.close();
        }
    }
}
