//! The query algebra tree
//!
//! A closed enum of operator variants - the evaluation engine pattern
//! matches over it, so adding a variant is a compile-time checked change
//! everywhere. The tree is built by an external parser/translator layer;
//! this crate optimizes and evaluates it.
//!
//! Variables are `VarId`s from a `VarRegistry` owned by the caller.

use crate::expr::Expr;
use crate::var::VarId;
use quarry_db_core::Term;
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// A pattern position: constant term or variable.
#[derive(Clone, Debug, PartialEq)]
pub enum PatternTerm {
    Var(VarId),
    Const(Term),
}

impl PatternTerm {
    /// The variable, if this position is one.
    pub fn as_var(&self) -> Option<VarId> {
        match self {
            PatternTerm::Var(v) => Some(*v),
            PatternTerm::Const(_) => None,
        }
    }

    /// The constant term, if this position is one.
    pub fn as_const(&self) -> Option<&Term> {
        match self {
            PatternTerm::Var(_) => None,
            PatternTerm::Const(t) => Some(t),
        }
    }
}

/// Graph selector of a statement pattern.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum GraphSpec {
    /// Match records in every graph (default and named).
    #[default]
    Any,
    /// Match only the default graph.
    Default,
    /// Match one named graph, or bind a variable over named graphs.
    Named(PatternTerm),
}

/// Advisory position annotations written by the optimizer's annotation
/// pass. Consumed for scan-order selection and cardinality estimates;
/// never required for correctness.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PatternHints {
    /// Subject variable is provably a resource.
    pub subject_resource: bool,
    /// Object variable is provably a resource.
    pub object_resource: bool,
    /// Graph variable is provably a resource.
    pub graph_resource: bool,
}

/// A statement pattern leaf.
#[derive(Clone, Debug, PartialEq)]
pub struct StatementPattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
    pub graph: GraphSpec,
    pub hints: PatternHints,
}

impl StatementPattern {
    /// Pattern over every graph.
    pub fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
            graph: GraphSpec::Any,
            hints: PatternHints::default(),
        }
    }

    /// Pattern with an explicit graph selector.
    pub fn with_graph(mut self, graph: GraphSpec) -> Self {
        self.graph = graph;
        self
    }

    /// Variables appearing in this pattern, in s, p, o, g order.
    pub fn vars(&self) -> Vec<VarId> {
        let mut out = Vec::new();
        for term in [&self.subject, &self.predicate, &self.object] {
            if let Some(v) = term.as_var() {
                out.push(v);
            }
        }
        if let GraphSpec::Named(PatternTerm::Var(v)) = &self.graph {
            out.push(*v);
        }
        out
    }
}

/// An ordering key for `OrderBy`.
#[derive(Clone, Debug, PartialEq)]
pub struct OrderKey {
    pub expr: Expr,
    pub descending: bool,
}

impl OrderKey {
    /// Ascending key.
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            descending: false,
        }
    }

    /// Descending key.
    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            descending: true,
        }
    }
}

/// Aggregate function kind.
#[derive(Clone, Debug, PartialEq)]
pub enum AggregateKind {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    Sample,
    GroupConcat { separator: Arc<str> },
}

/// One aggregate computation: kind over an optional per-row expression.
/// `Count` with no expression counts rows.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub expr: Option<Expr>,
    pub distinct: bool,
}

impl Aggregate {
    /// COUNT(*) - counts group rows.
    pub fn count_all() -> Self {
        Self {
            kind: AggregateKind::Count,
            expr: None,
            distinct: false,
        }
    }

    /// An aggregate over an expression.
    pub fn of(kind: AggregateKind, expr: Expr) -> Self {
        Self {
            kind,
            expr: Some(expr),
            distinct: false,
        }
    }
}

/// The algebra tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Algebra {
    /// Index scan leaf.
    Pattern(StatementPattern),
    /// Nested-loop join; the right side is evaluated seeded by each
    /// left row.
    Join(Box<Algebra>, Box<Algebra>),
    /// Optional join: left rows survive even without a matching right
    /// row; `condition` filters the joined rows.
    LeftJoin {
        left: Box<Algebra>,
        right: Box<Algebra>,
        condition: Option<Expr>,
    },
    /// Concatenation, left arm first.
    Union(Box<Algebra>, Box<Algebra>),
    /// Row filter.
    Filter { condition: Expr, arg: Box<Algebra> },
    /// Bind computed values to fresh variables.
    Extend {
        arg: Box<Algebra>,
        bindings: Vec<(VarId, Expr)>,
    },
    /// Restrict visible variables.
    Project { arg: Box<Algebra>, vars: Vec<VarId> },
    /// Duplicate elimination (materializing).
    Distinct(Box<Algebra>),
    /// Adjacent-duplicate elimination (streaming).
    Reduced(Box<Algebra>),
    /// Sort (materializing).
    OrderBy { arg: Box<Algebra>, keys: Vec<OrderKey> },
    /// Offset/limit.
    Slice {
        arg: Box<Algebra>,
        offset: u64,
        limit: Option<u64>,
    },
    /// Grouping with aggregates (materializing).
    Group {
        arg: Box<Algebra>,
        by: Vec<VarId>,
        aggregates: Vec<(VarId, Aggregate)>,
    },
    /// Externally supplied binding rows (pre-bound variable sets).
    Values {
        vars: Vec<VarId>,
        rows: Vec<Vec<Option<Term>>>,
    },
}

impl Algebra {
    /// Variables this subtree may bind in its solutions.
    pub fn binds(&self) -> FxHashSet<VarId> {
        let mut out = FxHashSet::default();
        self.collect_binds(&mut out);
        out
    }

    fn collect_binds(&self, out: &mut FxHashSet<VarId>) {
        match self {
            Algebra::Pattern(p) => out.extend(p.vars()),
            Algebra::Join(l, r) | Algebra::Union(l, r) => {
                l.collect_binds(out);
                r.collect_binds(out);
            }
            Algebra::LeftJoin { left, right, .. } => {
                left.collect_binds(out);
                right.collect_binds(out);
            }
            Algebra::Filter { arg, .. }
            | Algebra::Distinct(arg)
            | Algebra::Reduced(arg)
            | Algebra::OrderBy { arg, .. }
            | Algebra::Slice { arg, .. } => arg.collect_binds(out),
            Algebra::Extend { arg, bindings } => {
                arg.collect_binds(out);
                out.extend(bindings.iter().map(|(v, _)| *v));
            }
            Algebra::Project { vars, .. } => out.extend(vars.iter().copied()),
            Algebra::Group { by, aggregates, .. } => {
                out.extend(by.iter().copied());
                out.extend(aggregates.iter().map(|(v, _)| *v));
            }
            Algebra::Values { vars, .. } => out.extend(vars.iter().copied()),
        }
    }

    /// Variables in first-mention order over the whole tree (used for
    /// the declared binding names when there is no root projection).
    pub fn vars_in_order(&self) -> Vec<VarId> {
        let mut seen = FxHashSet::default();
        let mut out = Vec::new();
        self.collect_vars_in_order(&mut seen, &mut out);
        out
    }

    fn collect_vars_in_order(&self, seen: &mut FxHashSet<VarId>, out: &mut Vec<VarId>) {
        let mut push = |v: VarId, seen: &mut FxHashSet<VarId>, out: &mut Vec<VarId>| {
            if seen.insert(v) {
                out.push(v);
            }
        };
        match self {
            Algebra::Pattern(p) => {
                for v in p.vars() {
                    push(v, seen, out);
                }
            }
            Algebra::Join(l, r) | Algebra::Union(l, r) => {
                l.collect_vars_in_order(seen, out);
                r.collect_vars_in_order(seen, out);
            }
            Algebra::LeftJoin { left, right, .. } => {
                left.collect_vars_in_order(seen, out);
                right.collect_vars_in_order(seen, out);
            }
            Algebra::Filter { arg, .. }
            | Algebra::Distinct(arg)
            | Algebra::Reduced(arg)
            | Algebra::OrderBy { arg, .. }
            | Algebra::Slice { arg, .. } => arg.collect_vars_in_order(seen, out),
            Algebra::Extend { arg, bindings } => {
                arg.collect_vars_in_order(seen, out);
                for (v, _) in bindings {
                    push(*v, seen, out);
                }
            }
            Algebra::Project { vars, .. } => {
                for v in vars {
                    push(*v, seen, out);
                }
            }
            Algebra::Group { arg, by, aggregates } => {
                arg.collect_vars_in_order(seen, out);
                for v in by {
                    push(*v, seen, out);
                }
                for (v, _) in aggregates {
                    push(*v, seen, out);
                }
            }
            Algebra::Values { vars, .. } => {
                for v in vars {
                    push(*v, seen, out);
                }
            }
        }
    }

    /// True when this subtree contains a `Values` node binding any of
    /// the given variables (the optimizer's pushdown guard).
    pub fn has_values_binding(&self, vars: &FxHashSet<VarId>) -> bool {
        match self {
            Algebra::Values { vars: own, .. } => own.iter().any(|v| vars.contains(v)),
            Algebra::Pattern(_) => false,
            Algebra::Join(l, r) | Algebra::Union(l, r) => {
                l.has_values_binding(vars) || r.has_values_binding(vars)
            }
            Algebra::LeftJoin { left, right, .. } => {
                left.has_values_binding(vars) || right.has_values_binding(vars)
            }
            Algebra::Filter { arg, .. }
            | Algebra::Extend { arg, .. }
            | Algebra::Project { arg, .. }
            | Algebra::Distinct(arg)
            | Algebra::Reduced(arg)
            | Algebra::OrderBy { arg, .. }
            | Algebra::Slice { arg, .. }
            | Algebra::Group { arg, .. } => arg.has_values_binding(vars),
        }
    }
}
