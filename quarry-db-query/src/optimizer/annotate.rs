//! Pattern annotation pass
//!
//! Walks the tree once and marks pattern positions whose variable is
//! provably a resource: the variable also occurs in a subject, graph or
//! predicate position of a pattern in the same conjunctive scope, so
//! any solution binds it to a resource. The marks are advisory hints
//! for scan-order selection (an object known to be a resource makes the
//! object-first permutation attractive); correctness never depends on
//! them.
//!
//! Facts flow with evaluation order: both join arms see the whole
//! join's facts, a left join's right side sees the left's facts, union
//! arms see only their own.

use crate::algebra::{Algebra, GraphSpec, PatternTerm, StatementPattern};
use crate::var::VarId;
use rustc_hash::FxHashSet;

/// Annotate every statement pattern in the tree.
pub fn annotate(algebra: &mut Algebra) {
    let inherited = FxHashSet::default();
    pass(algebra, &inherited);
}

/// Variables provably bound to resources whenever this subtree matches.
fn resource_facts(algebra: &Algebra, out: &mut FxHashSet<VarId>) {
    match algebra {
        Algebra::Pattern(p) => {
            if let PatternTerm::Var(v) = &p.subject {
                out.insert(*v);
            }
            if let PatternTerm::Var(v) = &p.predicate {
                out.insert(*v);
            }
            if let GraphSpec::Named(PatternTerm::Var(v)) = &p.graph {
                out.insert(*v);
            }
        }
        Algebra::Join(l, r) => {
            resource_facts(l, out);
            resource_facts(r, out);
        }
        // Only the left side's bindings are guaranteed present.
        Algebra::LeftJoin { left, .. } => resource_facts(left, out),
        Algebra::Union(l, r) => {
            let mut left = FxHashSet::default();
            let mut right = FxHashSet::default();
            resource_facts(l, &mut left);
            resource_facts(r, &mut right);
            out.extend(left.intersection(&right).copied());
        }
        Algebra::Values { vars, rows } => {
            // A values variable is a resource fact only when every row
            // binds it to a resource.
            for (i, v) in vars.iter().enumerate() {
                let all_resources = !rows.is_empty()
                    && rows.iter().all(|row| {
                        row.get(i)
                            .and_then(|t| t.as_ref())
                            .is_some_and(|t| t.is_resource())
                    });
                if all_resources {
                    out.insert(*v);
                }
            }
        }
        Algebra::Filter { arg, .. }
        | Algebra::Extend { arg, .. }
        | Algebra::Project { arg, .. }
        | Algebra::Distinct(arg)
        | Algebra::Reduced(arg)
        | Algebra::OrderBy { arg, .. }
        | Algebra::Slice { arg, .. }
        | Algebra::Group { arg, .. } => resource_facts(arg, out),
    }
}

fn apply(pattern: &mut StatementPattern, facts: &FxHashSet<VarId>) {
    if let PatternTerm::Var(v) = &pattern.subject {
        pattern.hints.subject_resource = facts.contains(v);
    }
    if let PatternTerm::Var(v) = &pattern.object {
        pattern.hints.object_resource = facts.contains(v);
    }
    if let GraphSpec::Named(PatternTerm::Var(v)) = &pattern.graph {
        pattern.hints.graph_resource = facts.contains(v);
    }
}

fn pass(algebra: &mut Algebra, inherited: &FxHashSet<VarId>) {
    match algebra {
        Algebra::Pattern(p) => {
            let mut facts = inherited.clone();
            resource_facts(&Algebra::Pattern(p.clone()), &mut facts);
            apply(p, &facts);
        }
        Algebra::Join(l, r) => {
            let mut facts = inherited.clone();
            resource_facts(l, &mut facts);
            resource_facts(r, &mut facts);
            pass(l, &facts);
            pass(r, &facts);
        }
        Algebra::LeftJoin { left, right, .. } => {
            let mut left_facts = inherited.clone();
            resource_facts(left, &mut left_facts);
            pass(left, &left_facts);
            // Right side evaluates with the left's bindings in scope.
            let mut right_facts = left_facts.clone();
            resource_facts(right, &mut right_facts);
            pass(right, &right_facts);
        }
        Algebra::Union(l, r) => {
            pass(l, inherited);
            pass(r, inherited);
        }
        Algebra::Filter { arg, .. }
        | Algebra::Extend { arg, .. }
        | Algebra::Project { arg, .. }
        | Algebra::Distinct(arg)
        | Algebra::Reduced(arg)
        | Algebra::OrderBy { arg, .. }
        | Algebra::Slice { arg, .. }
        | Algebra::Group { arg, .. } => pass(arg, inherited),
        Algebra::Values { .. } => {}
    }
}
