//! End-to-end evaluation tests over an in-memory snapshot source

use quarry_db_core::{Record, Term, TermDict, TermId};
use quarry_db_index::Snapshot;
use quarry_db_query::{
    evaluate, evaluate_raw, Aggregate, AggregateKind, Algebra, BackgroundResults, CompareOp,
    EvalConfig, EvalContext, Expr, GraphSpec, OrderKey, PatternTerm, Solution, StatementPattern,
    VarId, VarRegistry,
};
use std::collections::BTreeSet;
use std::sync::Arc;

const EX_P: &str = "http://ex/p";
const EX_Q: &str = "http://ex/q";

struct Fixture {
    dict: Arc<TermDict>,
    snapshot: Arc<Snapshot>,
    registry: VarRegistry,
}

impl Fixture {
    /// Statements as (subject local name, predicate IRI, object term,
    /// optional graph IRI).
    fn new(statements: &[(&str, &str, Term, Option<&str>)]) -> Self {
        let dict = TermDict::new();
        let records: Vec<Record> = statements
            .iter()
            .map(|(s, p, o, g)| {
                let s = dict.internalize(&Term::iri(format!("http://ex/{}", s)));
                let p = dict.internalize(&Term::iri(*p));
                let o = dict.internalize(o);
                let g = g
                    .map(|g| dict.internalize(&Term::iri(g)))
                    .unwrap_or(TermId::DEFAULT_GRAPH);
                Record::new(s, p, o, g)
            })
            .collect();
        Self {
            dict: Arc::new(dict),
            snapshot: Arc::new(Snapshot::empty().apply(&records, &[])),
            registry: VarRegistry::new(),
        }
    }

    fn ctx(&self) -> EvalContext {
        EvalContext::new(self.snapshot.clone(), self.dict.clone())
    }

    fn ctx_with_budget(&self, budget: usize) -> EvalContext {
        self.ctx().with_config(EvalConfig {
            materialize_budget: budget,
            ..EvalConfig::default()
        })
    }

    fn var(&mut self, name: &str) -> VarId {
        self.registry.var(name)
    }

    fn solutions(&self, algebra: &Algebra, ctx: EvalContext) -> Vec<Solution> {
        evaluate(algebra, &self.registry, &[], ctx)
            .expect("evaluation starts")
            .collect_solutions()
            .expect("evaluation completes")
    }

    fn solutions_raw(&self, algebra: &Algebra, ctx: EvalContext) -> Vec<Solution> {
        evaluate_raw(algebra, &self.registry, &[], ctx)
            .expect("evaluation starts")
            .collect_solutions()
            .expect("evaluation completes")
    }
}

fn pattern(s: PatternTerm, p: &str, o: PatternTerm) -> Algebra {
    Algebra::Pattern(StatementPattern::new(
        s,
        PatternTerm::Const(Term::iri(p)),
        o,
    ))
}

fn subject(name: &str) -> PatternTerm {
    PatternTerm::Const(Term::iri(format!("http://ex/{}", name)))
}

/// Render solutions as a set of sorted (name=term) strings for
/// order-insensitive comparison.
fn as_set(solutions: &[Solution]) -> BTreeSet<String> {
    solutions
        .iter()
        .map(|s| {
            let mut parts: Vec<String> =
                s.iter().map(|(n, t)| format!("{}={}", n, t)).collect();
            parts.sort();
            parts.join(",")
        })
        .collect()
}

// === Statement pattern evaluation (spec example scenarios) ===

#[test]
fn pattern_with_bound_object_yields_matching_subjects() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::literal("1"), None),
        ("a", EX_P, Term::literal("2"), None),
        ("b", EX_P, Term::literal("1"), None),
    ]);
    let s = fx.var("s");

    let algebra = pattern(
        PatternTerm::Var(s),
        EX_P,
        PatternTerm::Const(Term::literal("1")),
    );
    let solutions = fx.solutions(&algebra, fx.ctx());

    assert_eq!(
        as_set(&solutions),
        BTreeSet::from([
            "s=<http://ex/a>".to_owned(),
            "s=<http://ex/b>".to_owned()
        ])
    );
}

#[test]
fn pattern_with_two_vars_yields_all_statements() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::literal("1"), None),
        ("a", EX_P, Term::literal("2"), None),
        ("b", EX_P, Term::literal("1"), None),
    ]);
    let s = fx.var("s");
    let o = fx.var("o");

    let algebra = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(o));
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 3);
}

#[test]
fn unknown_constant_yields_empty() {
    let mut fx = Fixture::new(&[("a", EX_P, Term::literal("1"), None)]);
    let s = fx.var("s");

    let algebra = pattern(
        PatternTerm::Var(s),
        "http://ex/never-used",
        PatternTerm::Const(Term::literal("1")),
    );
    assert!(fx.solutions(&algebra, fx.ctx()).is_empty());
}

#[test]
fn incompatible_initial_binding_yields_empty_not_error() {
    let mut fx = Fixture::new(&[("a", EX_P, Term::literal("1"), None)]);
    let s = fx.var("s");
    let o = fx.var("o");

    // ?s is pre-bound to a literal but used in subject position.
    let algebra = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(o));
    let mut results = evaluate(
        &algebra,
        &fx.registry,
        &[(s, Term::literal("not a resource"))],
        fx.ctx(),
    )
    .expect("evaluation starts");
    assert_eq!(results.collect_solutions().expect("no error").len(), 0);
}

#[test]
fn initial_binding_restricts_pattern() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::literal("1"), None),
        ("b", EX_P, Term::literal("2"), None),
    ]);
    let s = fx.var("s");
    let o = fx.var("o");

    let algebra = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(o));
    let solutions = evaluate(
        &algebra,
        &fx.registry,
        &[(s, Term::iri("http://ex/b"))],
        fx.ctx(),
    )
    .expect("evaluation starts")
    .collect_solutions()
    .expect("evaluation completes");

    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("o"), Some(&Term::literal("2")));
}

#[test]
fn shared_variable_within_pattern_requires_equal_ids() {
    // (?x ex:p ?x) matches only self-referencing statements.
    let mut fx = Fixture::new(&[("a", EX_P, Term::iri("http://ex/a"), None)]);
    let x = fx.var("x");

    let algebra = pattern(PatternTerm::Var(x), EX_P, PatternTerm::Var(x));
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("x"), Some(&Term::iri("http://ex/a")));
}

// === Join semantics ===

fn join_fixture() -> (Fixture, VarId, VarId, VarId) {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(2), None),
        ("a", EX_Q, Term::literal("x"), None),
        ("c", EX_Q, Term::literal("y"), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    let l = fx.var("l");
    (fx, s, n, l)
}

#[test]
fn join_is_natural_join_on_shared_vars() {
    let (fx, s, n, l) = join_fixture();
    let algebra = Algebra::Join(
        Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
    );
    let solutions = fx.solutions(&algebra, fx.ctx());

    // Only ex:a appears in both patterns.
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("s"), Some(&Term::iri("http://ex/a")));
    assert_eq!(solutions[0].get("n"), Some(&Term::integer(1)));
    assert_eq!(solutions[0].get("l"), Some(&Term::literal("x")));
}

#[test]
fn join_result_is_independent_of_argument_order() {
    let (fx, s, n, l) = join_fixture();
    let left_first = Algebra::Join(
        Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
    );
    let right_first = Algebra::Join(
        Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
        Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
    );

    // Both raw (plan exactly as given) and optimized evaluation must
    // produce the same solution set.
    let a = as_set(&fx.solutions_raw(&left_first, fx.ctx()));
    let b = as_set(&fx.solutions_raw(&right_first, fx.ctx()));
    let c = as_set(&fx.solutions(&left_first, fx.ctx()));
    let d = as_set(&fx.solutions(&right_first, fx.ctx()));
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a, d);
}

#[test]
fn left_join_keeps_unmatched_left_rows() {
    let (fx, s, n, l) = join_fixture();
    let algebra = Algebra::LeftJoin {
        left: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        right: Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
        condition: None,
    };
    let solutions = fx.solutions(&algebra, fx.ctx());

    // Every left row survives: a extended, b alone.
    assert_eq!(solutions.len(), 2);
    let b_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/b")))
        .expect("b survives");
    assert_eq!(b_row.get("l"), None);
    let a_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/a")))
        .expect("a survives");
    assert_eq!(a_row.get("l"), Some(&Term::literal("x")));
}

#[test]
fn left_join_condition_failure_reverts_to_left_row() {
    let (fx, s, n, l) = join_fixture();
    // Condition can never hold; all left rows come through bare.
    let algebra = Algebra::LeftJoin {
        left: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        right: Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
        condition: Some(Expr::Const(Term::boolean(false))),
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 2);
    assert!(solutions.iter().all(|sol| sol.get("l").is_none()));
}

#[test]
fn union_concatenates_left_arm_first() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_Q, Term::integer(2), None),
    ]);
    let s = fx.var("s");
    let v = fx.var("v");

    let algebra = Algebra::Union(
        Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(v))),
        Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(v))),
    );
    // Raw evaluation preserves arm order deterministically.
    let solutions = fx.solutions_raw(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 2);
    assert_eq!(solutions[0].get("s"), Some(&Term::iri("http://ex/a")));
    assert_eq!(solutions[1].get("s"), Some(&Term::iri("http://ex/b")));
}

// === Filter and extend semantics ===

#[test]
fn filter_passes_effective_true_only() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(5), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = Algebra::Filter {
        condition: Expr::Compare(
            CompareOp::Gt,
            Box::new(Expr::Var(n)),
            Box::new(Expr::Const(Term::integer(3))),
        ),
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("s"), Some(&Term::iri("http://ex/b")));
}

#[test]
fn filter_treats_evaluation_errors_as_false() {
    // One numeric and one string object: comparing the string raises a
    // recoverable type error, which must drop the row, not the query.
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(7), None),
        ("b", EX_P, Term::literal("nan"), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = Algebra::Filter {
        condition: Expr::Compare(
            CompareOp::Gt,
            Box::new(Expr::Var(n)),
            Box::new(Expr::Const(Term::integer(0))),
        ),
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("s"), Some(&Term::iri("http://ex/a")));
}

#[test]
fn extend_error_leaves_variable_unbound() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(4), None),
        ("b", EX_P, Term::literal("oops"), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    let doubled = fx.var("doubled");

    let algebra = Algebra::Extend {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        bindings: vec![(
            doubled,
            Expr::Arith(
                quarry_db_query::ArithOp::Mul,
                Box::new(Expr::Var(n)),
                Box::new(Expr::Const(Term::integer(2))),
            ),
        )],
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 2, "error row survives with var unbound");

    let a_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/a")))
        .expect("a present");
    assert_eq!(a_row.get("doubled"), Some(&Term::integer(8)));
    let b_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/b")))
        .expect("b present");
    assert_eq!(b_row.get("doubled"), None);
}

// === Projection, distinct, ordering, slicing ===

fn dataset_for_solution_modifiers() -> (Fixture, VarId, VarId) {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(2), None),
        ("b", EX_P, Term::integer(1), None),
        ("c", EX_P, Term::integer(2), None),
        ("d", EX_P, Term::integer(3), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    (fx, s, n)
}

#[test]
fn project_and_distinct_collapse_hidden_vars() {
    let (fx, s, n) = dataset_for_solution_modifiers();
    let algebra = Algebra::Distinct(Box::new(Algebra::Project {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        vars: vec![n],
    }));
    let solutions = fx.solutions(&algebra, fx.ctx());
    // Values 1, 2, 3 - the duplicate 2 collapses once ?s is projected
    // away.
    assert_eq!(solutions.len(), 3);
    assert!(solutions.iter().all(|sol| sol.get("s").is_none()));
}

#[test]
fn distinct_spills_past_budget_with_same_result() {
    let (fx, s, n) = dataset_for_solution_modifiers();
    let algebra = Algebra::Distinct(Box::new(Algebra::Project {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        vars: vec![n],
    }));
    let solutions = fx.solutions(&algebra, fx.ctx_with_budget(1));
    assert_eq!(solutions.len(), 3);
}

#[test]
fn order_by_ascending_and_descending() {
    let (fx, s, n) = dataset_for_solution_modifiers();
    let base = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n));

    let asc = Algebra::OrderBy {
        arg: Box::new(base.clone()),
        keys: vec![OrderKey::asc(Expr::Var(n))],
    };
    let ns: Vec<i64> = fx
        .solutions(&asc, fx.ctx())
        .iter()
        .map(|sol| sol.get("n").and_then(Term::as_i64).expect("bound n"))
        .collect();
    assert_eq!(ns, vec![1, 2, 2, 3]);

    let desc = Algebra::OrderBy {
        arg: Box::new(base),
        keys: vec![OrderKey::desc(Expr::Var(n))],
    };
    let ns: Vec<i64> = fx
        .solutions(&desc, fx.ctx_with_budget(2)) // exercise the spill path
        .iter()
        .map(|sol| sol.get("n").and_then(Term::as_i64).expect("bound n"))
        .collect();
    assert_eq!(ns, vec![3, 2, 2, 1]);
}

#[test]
fn slice_applies_offset_and_limit() {
    let (fx, s, n) = dataset_for_solution_modifiers();
    let algebra = Algebra::Slice {
        arg: Box::new(Algebra::OrderBy {
            arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
            keys: vec![OrderKey::asc(Expr::Var(n))],
        }),
        offset: 1,
        limit: Some(2),
    };
    let ns: Vec<i64> = fx
        .solutions(&algebra, fx.ctx())
        .iter()
        .map(|sol| sol.get("n").and_then(Term::as_i64).expect("bound n"))
        .collect();
    assert_eq!(ns, vec![2, 2]);
}

// === Grouping and aggregates ===

#[test]
fn group_by_with_aggregates() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("a", EX_P, Term::integer(3), None),
        ("b", EX_P, Term::integer(10), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    let count = fx.var("count");
    let total = fx.var("total");

    let algebra = Algebra::Group {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        by: vec![s],
        aggregates: vec![
            (count, Aggregate::count_all()),
            (total, Aggregate::of(AggregateKind::Sum, Expr::Var(n))),
        ],
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 2);

    let a_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/a")))
        .expect("group a");
    assert_eq!(a_row.get("count"), Some(&Term::integer(2)));
    assert_eq!(a_row.get("total"), Some(&Term::integer(4)));

    let b_row = solutions
        .iter()
        .find(|sol| sol.get("s") == Some(&Term::iri("http://ex/b")))
        .expect("group b");
    assert_eq!(b_row.get("count"), Some(&Term::integer(1)));
    assert_eq!(b_row.get("total"), Some(&Term::integer(10)));
}

#[test]
fn global_group_over_empty_input_yields_one_row() {
    let mut fx = Fixture::new(&[]);
    let s = fx.var("s");
    let n = fx.var("n");
    let count = fx.var("count");

    let algebra = Algebra::Group {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        by: vec![],
        aggregates: vec![(count, Aggregate::count_all())],
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("count"), Some(&Term::integer(0)));
}

#[test]
fn min_max_avg_group_concat() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(2), None),
        ("a", EX_P, Term::integer(6), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    let min = fx.var("min");
    let max = fx.var("max");
    let avg = fx.var("avg");
    let all = fx.var("all");

    let algebra = Algebra::Group {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        by: vec![s],
        aggregates: vec![
            (min, Aggregate::of(AggregateKind::Min, Expr::Var(n))),
            (max, Aggregate::of(AggregateKind::Max, Expr::Var(n))),
            (avg, Aggregate::of(AggregateKind::Avg, Expr::Var(n))),
            (
                all,
                Aggregate::of(
                    AggregateKind::GroupConcat {
                        separator: Arc::from(","),
                    },
                    Expr::Var(n),
                ),
            ),
        ],
    };
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    let row = &solutions[0];
    assert_eq!(row.get("min"), Some(&Term::integer(2)));
    assert_eq!(row.get("max"), Some(&Term::integer(6)));
    assert_eq!(row.get("avg"), Some(&Term::double(4.0)));
    assert_eq!(row.get("all"), Some(&Term::literal("2,6")));
}

// === Values ===

#[test]
fn values_joins_with_patterns() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(2), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = Algebra::Join(
        Box::new(Algebra::Values {
            vars: vec![s],
            rows: vec![vec![Some(Term::iri("http://ex/b"))]],
        }),
        Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
    );
    let solutions = fx.solutions(&algebra, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("n"), Some(&Term::integer(2)));
}

// === Named graphs ===

#[test]
fn graph_selectors() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("a", EX_P, Term::integer(2), Some("http://ex/g1")),
        ("a", EX_P, Term::integer(3), Some("http://ex/g2")),
    ]);
    let n = fx.var("n");
    let g = fx.var("g");

    let any = Algebra::Pattern(StatementPattern::new(
        subject("a"),
        PatternTerm::Const(Term::iri(EX_P)),
        PatternTerm::Var(n),
    ));
    assert_eq!(fx.solutions(&any, fx.ctx()).len(), 3);

    let default_only = Algebra::Pattern(
        StatementPattern::new(
            subject("a"),
            PatternTerm::Const(Term::iri(EX_P)),
            PatternTerm::Var(n),
        )
        .with_graph(GraphSpec::Default),
    );
    let solutions = fx.solutions(&default_only, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("n"), Some(&Term::integer(1)));

    let named = Algebra::Pattern(
        StatementPattern::new(
            subject("a"),
            PatternTerm::Const(Term::iri(EX_P)),
            PatternTerm::Var(n),
        )
        .with_graph(GraphSpec::Named(PatternTerm::Const(Term::iri(
            "http://ex/g2",
        )))),
    );
    let solutions = fx.solutions(&named, fx.ctx());
    assert_eq!(solutions.len(), 1);
    assert_eq!(solutions[0].get("n"), Some(&Term::integer(3)));

    // A graph variable ranges over named graphs only.
    let graph_var = Algebra::Pattern(
        StatementPattern::new(
            subject("a"),
            PatternTerm::Const(Term::iri(EX_P)),
            PatternTerm::Var(n),
        )
        .with_graph(GraphSpec::Named(PatternTerm::Var(g))),
    );
    let solutions = fx.solutions(&graph_var, fx.ctx());
    assert_eq!(solutions.len(), 2);
    assert!(solutions.iter().all(|sol| sol.get("g").is_some()));
}

// === Results surface ===

#[test]
fn binding_names_follow_projection() {
    let mut fx = Fixture::new(&[("a", EX_P, Term::integer(1), None)]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = Algebra::Project {
        arg: Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        vars: vec![n, s],
    };
    let mut results = evaluate(&algebra, &fx.registry, &[], fx.ctx()).expect("evaluation starts");
    let names: Vec<&str> = results.binding_names().iter().map(|n| n.as_ref()).collect();
    assert_eq!(names, vec!["n", "s"]);
    results.close();
}

#[test]
fn close_before_exhaustion_is_idempotent() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(2), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n));
    let mut results = evaluate(&algebra, &fx.registry, &[], fx.ctx()).expect("evaluation starts");
    assert!(results.next_solution().is_some());
    results.close();
    results.close();
    assert!(results.next_solution().is_none());
}

#[test]
fn background_results_stream_all_solutions() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(2), None),
        ("c", EX_P, Term::integer(3), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");

    let algebra = pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n));
    let results = evaluate(&algebra, &fx.registry, &[], fx.ctx()).expect("evaluation starts");
    let mut background = BackgroundResults::spawn(results);

    assert_eq!(background.binding_names().len(), 2);
    let mut count = 0;
    for item in background.by_ref() {
        item.expect("no evaluation error");
        count += 1;
    }
    assert_eq!(count, 3);
    background.close();
}

// === Optimizer equivalence on a composite query ===

#[test]
fn optimized_and_raw_plans_agree() {
    let mut fx = Fixture::new(&[
        ("a", EX_P, Term::integer(1), None),
        ("b", EX_P, Term::integer(2), None),
        ("a", EX_Q, Term::literal("x"), None),
        ("b", EX_Q, Term::literal("y"), None),
        ("c", EX_Q, Term::literal("z"), None),
    ]);
    let s = fx.var("s");
    let n = fx.var("n");
    let l = fx.var("l");

    let algebra = Algebra::Filter {
        condition: Expr::Compare(
            CompareOp::Lt,
            Box::new(Expr::Var(n)),
            Box::new(Expr::Const(Term::integer(10))),
        ),
        arg: Box::new(Algebra::Join(
            Box::new(pattern(PatternTerm::Var(s), EX_Q, PatternTerm::Var(l))),
            Box::new(pattern(PatternTerm::Var(s), EX_P, PatternTerm::Var(n))),
        )),
    };
    assert_eq!(
        as_set(&fx.solutions(&algebra, fx.ctx())),
        as_set(&fx.solutions_raw(&algebra, fx.ctx()))
    );
}
