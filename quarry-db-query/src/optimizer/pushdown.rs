//! Filter pushdown pass
//!
//! Relocates each filter to the smallest subtree whose bound variable
//! set covers the filter's free variables:
//! - into the join arm that covers them (either side of an inner join,
//!   only the left side of a left join)
//! - duplicated into *both* arms of a union when each covers them, so
//!   selectivity helps every branch; otherwise the filter stays above
//!   the union
//! - never past a `Values` node binding any of the filter's variables -
//!   that interaction is left untouched rather than risked

use crate::algebra::Algebra;
use crate::expr::Expr;
use crate::var::VarId;
use rustc_hash::FxHashSet;

/// Run the pushdown pass over a whole tree.
pub fn push_filters(algebra: Algebra) -> Algebra {
    match algebra {
        Algebra::Filter { condition, arg } => {
            let arg = push_filters(*arg);
            place(arg, condition)
        }
        Algebra::Join(l, r) => Algebra::Join(
            Box::new(push_filters(*l)),
            Box::new(push_filters(*r)),
        ),
        Algebra::LeftJoin {
            left,
            right,
            condition,
        } => Algebra::LeftJoin {
            left: Box::new(push_filters(*left)),
            right: Box::new(push_filters(*right)),
            condition,
        },
        Algebra::Union(l, r) => Algebra::Union(
            Box::new(push_filters(*l)),
            Box::new(push_filters(*r)),
        ),
        Algebra::Extend { arg, bindings } => Algebra::Extend {
            arg: Box::new(push_filters(*arg)),
            bindings,
        },
        Algebra::Project { arg, vars } => Algebra::Project {
            arg: Box::new(push_filters(*arg)),
            vars,
        },
        Algebra::Distinct(arg) => Algebra::Distinct(Box::new(push_filters(*arg))),
        Algebra::Reduced(arg) => Algebra::Reduced(Box::new(push_filters(*arg))),
        Algebra::OrderBy { arg, keys } => Algebra::OrderBy {
            arg: Box::new(push_filters(*arg)),
            keys,
        },
        Algebra::Slice { arg, offset, limit } => Algebra::Slice {
            arg: Box::new(push_filters(*arg)),
            offset,
            limit,
        },
        Algebra::Group {
            arg,
            by,
            aggregates,
        } => Algebra::Group {
            arg: Box::new(push_filters(*arg)),
            by,
            aggregates,
        },
        leaf @ (Algebra::Pattern(_) | Algebra::Values { .. }) => leaf,
    }
}

fn covered(node: &Algebra, vars: &FxHashSet<VarId>) -> bool {
    let binds = node.binds();
    vars.iter().all(|v| binds.contains(v))
}

/// True when pushing a filter over `vars` into `node` is provably safe.
fn safe(node: &Algebra, vars: &FxHashSet<VarId>) -> bool {
    !node.has_values_binding(vars)
}

/// Place a filter at its minimal scope within `node`.
fn place(node: Algebra, condition: Expr) -> Algebra {
    let vars: FxHashSet<VarId> = condition.vars().into_iter().collect();
    match node {
        Algebra::Join(l, r) => {
            if covered(&l, &vars) && safe(&l, &vars) {
                Algebra::Join(Box::new(place(*l, condition)), r)
            } else if covered(&r, &vars) && safe(&r, &vars) {
                Algebra::Join(l, Box::new(place(*r, condition)))
            } else {
                Algebra::Filter {
                    condition,
                    arg: Box::new(Algebra::Join(l, r)),
                }
            }
        }
        Algebra::Union(l, r) => {
            if covered(&l, &vars) && covered(&r, &vars) && safe(&l, &vars) && safe(&r, &vars) {
                Algebra::Union(
                    Box::new(place(*l, condition.clone())),
                    Box::new(place(*r, condition)),
                )
            } else {
                Algebra::Filter {
                    condition,
                    arg: Box::new(Algebra::Union(l, r)),
                }
            }
        }
        Algebra::LeftJoin {
            left,
            right,
            condition: join_condition,
        } => {
            if covered(&left, &vars) && safe(&left, &vars) {
                Algebra::LeftJoin {
                    left: Box::new(place(*left, condition)),
                    right,
                    condition: join_condition,
                }
            } else {
                Algebra::Filter {
                    condition,
                    arg: Box::new(Algebra::LeftJoin {
                        left,
                        right,
                        condition: join_condition,
                    }),
                }
            }
        }
        // Stack under an existing filter so both end up minimal.
        Algebra::Filter {
            condition: existing,
            arg,
        } => Algebra::Filter {
            condition: existing,
            arg: Box::new(place(*arg, condition)),
        },
        other => Algebra::Filter {
            condition,
            arg: Box::new(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::{PatternTerm, StatementPattern};
    use crate::expr::{CompareOp, Expr};
    use quarry_db_core::Term;

    fn var(n: u16) -> PatternTerm {
        PatternTerm::Var(VarId(n))
    }

    fn pattern(s: u16, p: &str, o: u16) -> Algebra {
        Algebra::Pattern(StatementPattern::new(
            var(s),
            PatternTerm::Const(Term::iri(p)),
            var(o),
        ))
    }

    fn cond_on(v: u16) -> Expr {
        Expr::Compare(
            CompareOp::Gt,
            Box::new(Expr::Var(VarId(v))),
            Box::new(Expr::Const(Term::integer(0))),
        )
    }

    #[test]
    fn test_filter_moves_into_covering_join_arm() {
        // FILTER(?o1 > 0) over Join(p1 binding ?s ?o1, p2 binding ?s ?o2)
        let tree = Algebra::Filter {
            condition: cond_on(1),
            arg: Box::new(Algebra::Join(
                Box::new(pattern(0, "http://ex/p1", 1)),
                Box::new(pattern(0, "http://ex/p2", 2)),
            )),
        };
        let out = push_filters(tree);

        let Algebra::Join(l, _) = out else { panic!("filter should dissolve into join") };
        assert!(matches!(*l, Algebra::Filter { .. }), "filter lands on the left arm");
    }

    #[test]
    fn test_filter_duplicated_into_union_arms() {
        let tree = Algebra::Filter {
            condition: cond_on(1),
            arg: Box::new(Algebra::Union(
                Box::new(pattern(0, "http://ex/p1", 1)),
                Box::new(pattern(0, "http://ex/p2", 1)),
            )),
        };
        let out = push_filters(tree);

        let Algebra::Union(l, r) = out else { panic!("union expected at root") };
        assert!(matches!(*l, Algebra::Filter { .. }));
        assert!(matches!(*r, Algebra::Filter { .. }));
    }

    #[test]
    fn test_filter_stays_above_union_when_one_arm_lacks_var() {
        // Right arm binds ?o2, not ?o1: the filter must stay above.
        let tree = Algebra::Filter {
            condition: cond_on(1),
            arg: Box::new(Algebra::Union(
                Box::new(pattern(0, "http://ex/p1", 1)),
                Box::new(pattern(0, "http://ex/p2", 2)),
            )),
        };
        let out = push_filters(tree);
        assert!(matches!(out, Algebra::Filter { .. }));
    }

    #[test]
    fn test_filter_not_pushed_into_left_join_right_arm() {
        // Condition only over the right arm's variable: unsafe to push,
        // stays above the left join.
        let tree = Algebra::Filter {
            condition: cond_on(2),
            arg: Box::new(Algebra::LeftJoin {
                left: Box::new(pattern(0, "http://ex/p1", 1)),
                right: Box::new(pattern(0, "http://ex/p2", 2)),
                condition: None,
            }),
        };
        let out = push_filters(tree);
        assert!(matches!(out, Algebra::Filter { .. }));
    }

    #[test]
    fn test_values_blocks_pushdown() {
        // Join arm contains VALUES binding the filter var; leave the
        // filter where it is.
        let tree = Algebra::Filter {
            condition: cond_on(1),
            arg: Box::new(Algebra::Join(
                Box::new(Algebra::Join(
                    Box::new(pattern(0, "http://ex/p1", 1)),
                    Box::new(Algebra::Values {
                        vars: vec![VarId(1)],
                        rows: vec![vec![Some(Term::integer(5))]],
                    }),
                )),
                Box::new(pattern(0, "http://ex/p2", 2)),
            )),
        };
        let out = push_filters(tree);
        assert!(matches!(out, Algebra::Filter { .. }));
    }
}
