//! Join reordering pass
//!
//! Flattens each chain of inner joins into its arms and greedily
//! reorders them by ascending estimated cardinality, recomputing the
//! estimate as variables become bound by already-placed arms: a
//! position whose variable is bound narrows the estimate by the
//! store's distinct-value count for that position. Ties keep the
//! original left-to-right order, so plans are deterministic.
//!
//! Only inner-join chains are reordered; left joins, unions and the
//! rest of the tree keep their shape (their order is semantic).

use crate::algebra::{Algebra, GraphSpec, PatternTerm, StatementPattern};
use crate::var::VarId;
use quarry_db_core::{RecordPattern, Term, TermDict, TermId};
use quarry_db_index::RecordSource;
use rustc_hash::FxHashSet;

/// Run the reordering pass over a whole tree.
pub fn reorder_joins<S: RecordSource + ?Sized>(
    algebra: Algebra,
    source: &S,
    dict: &TermDict,
) -> Algebra {
    match algebra {
        Algebra::Join(_, _) => {
            let mut arms = Vec::new();
            flatten(algebra, &mut arms);
            let arms: Vec<Algebra> = arms
                .into_iter()
                .map(|arm| reorder_joins(arm, source, dict))
                .collect();
            rebuild(order_arms(arms, source, dict))
        }
        Algebra::LeftJoin {
            left,
            right,
            condition,
        } => Algebra::LeftJoin {
            left: Box::new(reorder_joins(*left, source, dict)),
            right: Box::new(reorder_joins(*right, source, dict)),
            condition,
        },
        Algebra::Union(l, r) => Algebra::Union(
            Box::new(reorder_joins(*l, source, dict)),
            Box::new(reorder_joins(*r, source, dict)),
        ),
        Algebra::Filter { condition, arg } => Algebra::Filter {
            condition,
            arg: Box::new(reorder_joins(*arg, source, dict)),
        },
        Algebra::Extend { arg, bindings } => Algebra::Extend {
            arg: Box::new(reorder_joins(*arg, source, dict)),
            bindings,
        },
        Algebra::Project { arg, vars } => Algebra::Project {
            arg: Box::new(reorder_joins(*arg, source, dict)),
            vars,
        },
        Algebra::Distinct(arg) => Algebra::Distinct(Box::new(reorder_joins(*arg, source, dict))),
        Algebra::Reduced(arg) => Algebra::Reduced(Box::new(reorder_joins(*arg, source, dict))),
        Algebra::OrderBy { arg, keys } => Algebra::OrderBy {
            arg: Box::new(reorder_joins(*arg, source, dict)),
            keys,
        },
        Algebra::Slice { arg, offset, limit } => Algebra::Slice {
            arg: Box::new(reorder_joins(*arg, source, dict)),
            offset,
            limit,
        },
        Algebra::Group {
            arg,
            by,
            aggregates,
        } => Algebra::Group {
            arg: Box::new(reorder_joins(*arg, source, dict)),
            by,
            aggregates,
        },
        leaf @ (Algebra::Pattern(_) | Algebra::Values { .. }) => leaf,
    }
}

fn flatten(node: Algebra, arms: &mut Vec<Algebra>) {
    match node {
        Algebra::Join(l, r) => {
            flatten(*l, arms);
            flatten(*r, arms);
        }
        other => arms.push(other),
    }
}

fn rebuild(arms: Vec<Algebra>) -> Algebra {
    let mut iter = arms.into_iter();
    let first = iter.next().expect("a join chain has at least two arms");
    iter.fold(first, |acc, arm| Algebra::Join(Box::new(acc), Box::new(arm)))
}

fn order_arms<S: RecordSource + ?Sized>(
    mut arms: Vec<Algebra>,
    source: &S,
    dict: &TermDict,
) -> Vec<Algebra> {
    let mut ordered = Vec::with_capacity(arms.len());
    let mut bound: FxHashSet<VarId> = FxHashSet::default();

    while !arms.is_empty() {
        let mut best = 0usize;
        let mut best_cost = estimate(&arms[0], &bound, source, dict);
        for (i, arm) in arms.iter().enumerate().skip(1) {
            let cost = estimate(arm, &bound, source, dict);
            // Strictly-less keeps ties in original order.
            if cost < best_cost {
                best = i;
                best_cost = cost;
            }
        }
        let arm = arms.remove(best);
        bound.extend(arm.binds());
        ordered.push(arm);
    }
    ordered
}

/// Estimated result cardinality of one arm given already-bound vars.
fn estimate<S: RecordSource + ?Sized>(
    arm: &Algebra,
    bound: &FxHashSet<VarId>,
    source: &S,
    dict: &TermDict,
) -> f64 {
    match arm {
        Algebra::Pattern(p) => estimate_pattern(p, bound, source, dict),
        Algebra::Values { rows, .. } => rows.len() as f64,
        Algebra::Join(l, r) => {
            // Upper bound; nested chains are already reordered.
            estimate(l, bound, source, dict) * estimate(r, bound, source, dict).max(1.0)
        }
        Algebra::LeftJoin { left, .. } => estimate(left, bound, source, dict),
        Algebra::Union(l, r) => estimate(l, bound, source, dict) + estimate(r, bound, source, dict),
        Algebra::Filter { arg, .. } => estimate(arg, bound, source, dict) / 2.0,
        Algebra::Extend { arg, .. }
        | Algebra::Project { arg, .. }
        | Algebra::Distinct(arg)
        | Algebra::Reduced(arg)
        | Algebra::OrderBy { arg, .. }
        | Algebra::Group { arg, .. } => estimate(arg, bound, source, dict),
        Algebra::Slice { arg, limit, .. } => {
            let inner = estimate(arg, bound, source, dict);
            match limit {
                Some(l) => inner.min(*l as f64),
                None => inner,
            }
        }
    }
}

fn estimate_pattern<S: RecordSource + ?Sized>(
    pattern: &StatementPattern,
    bound: &FxHashSet<VarId>,
    source: &S,
    dict: &TermDict,
) -> f64 {
    let mut record_pattern = RecordPattern::any();
    // A constant term missing from the dictionary matches nothing.
    let mut impossible = false;
    let mut fill = |term: &PatternTerm, slot: &mut Option<TermId>| -> bool {
        match term {
            PatternTerm::Const(t) => match dict.lookup(t) {
                Some(id) => {
                    *slot = Some(id);
                    false
                }
                None => true,
            },
            PatternTerm::Var(_) => false,
        }
    };
    impossible |= fill(&pattern.subject, &mut record_pattern.s);
    impossible |= fill(&pattern.predicate, &mut record_pattern.p);
    impossible |= fill(&pattern.object, &mut record_pattern.o);
    match &pattern.graph {
        GraphSpec::Any => {}
        GraphSpec::Default => record_pattern.g = Some(TermId::DEFAULT_GRAPH),
        GraphSpec::Named(term) => impossible |= fill(term, &mut record_pattern.g),
    }
    if impossible {
        return 0.0;
    }

    let mut cost = source.estimated_cardinality(&record_pattern) as f64;
    let stats = source.stats();

    // Positions bound through earlier arms narrow the estimate by the
    // store's distinct-value count for that position.
    let mut narrow = |term: &PatternTerm, distinct: u64| {
        if let PatternTerm::Var(v) = term {
            if bound.contains(v) {
                cost /= distinct.max(1) as f64;
            }
        }
    };
    narrow(&pattern.subject, stats.distinct_subjects);
    narrow(&pattern.predicate, stats.distinct_predicates);
    narrow(&pattern.object, stats.distinct_objects);
    if let GraphSpec::Named(term) = &pattern.graph {
        narrow(term, stats.distinct_graphs);
    }
    if cost == 0.0 {
        0.0
    } else {
        cost.max(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_db_core::Record;
    use quarry_db_index::Snapshot;

    fn pattern(s: PatternTerm, p: PatternTerm, o: PatternTerm) -> Algebra {
        Algebra::Pattern(StatementPattern::new(s, p, o))
    }

    fn var(n: u16) -> PatternTerm {
        PatternTerm::Var(VarId(n))
    }

    fn setup() -> (Snapshot, TermDict) {
        let dict = TermDict::new();
        let p_common = dict.internalize(&Term::iri("http://ex/common"));
        let p_rare = dict.internalize(&Term::iri("http://ex/rare"));
        let mut records = Vec::new();
        for i in 0..100 {
            let s = dict.internalize(&Term::iri(format!("http://ex/s{}", i)));
            let o = dict.internalize(&Term::integer(i));
            records.push(Record::new(s, p_common, o, TermId::DEFAULT_GRAPH));
        }
        let s0 = dict.internalize(&Term::iri("http://ex/s0"));
        let o0 = dict.internalize(&Term::literal("rare"));
        records.push(Record::new(s0, p_rare, o0, TermId::DEFAULT_GRAPH));
        (Snapshot::empty().apply(&records, &[]), dict)
    }

    #[test]
    fn test_selective_pattern_moves_first() {
        let (snap, dict) = setup();
        let common = pattern(var(0), PatternTerm::Const(Term::iri("http://ex/common")), var(1));
        let rare = pattern(var(0), PatternTerm::Const(Term::iri("http://ex/rare")), var(2));

        let tree = Algebra::Join(Box::new(common.clone()), Box::new(rare.clone()));
        let out = reorder_joins(tree, &snap, &dict);

        let Algebra::Join(l, r) = out else { panic!("join expected") };
        assert_eq!(*l, rare, "rare pattern (1 record) should run first");
        assert_eq!(*r, common);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let (snap, dict) = setup();
        let a = pattern(var(0), var(3), var(1));
        let b = pattern(var(0), var(4), var(2));

        let tree = Algebra::Join(Box::new(a.clone()), Box::new(b.clone()));
        let out = reorder_joins(tree, &snap, &dict);

        let Algebra::Join(l, r) = out else { panic!("join expected") };
        assert_eq!(*l, a);
        assert_eq!(*r, b);
    }

    #[test]
    fn test_unknown_constant_estimates_zero() {
        let (snap, dict) = setup();
        let bound = FxHashSet::default();
        let missing = StatementPattern::new(
            var(0),
            PatternTerm::Const(Term::iri("http://ex/never-seen")),
            var(1),
        );
        assert_eq!(estimate_pattern(&missing, &bound, &snap, &dict), 0.0);
    }
}
