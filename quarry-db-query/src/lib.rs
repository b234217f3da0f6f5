//! # quarry-db Query Engine
//!
//! Pull-based evaluation of an algebra tree over a record source:
//! - `Algebra`/`Expr`: the closed operator and expression trees the
//!   engine consumes (built by an external translator layer)
//! - `VarRegistry`: variable name <-> compact id mapping
//! - operators in `ops`: one nested lazy sequence per algebra variant
//! - `optimizer`: filter pushdown, join reordering, pattern annotation
//! - `evaluate`/`QueryResults`: binding names + lazy solution sequence
//!   with an explicit close contract
//! - `producer`: the bounded background queue (the only cross-thread
//!   point in the engine)
//!
//! Evaluation is single-threaded and cooperative: each operator pulls
//! from its children only inside its own `next`.

pub mod algebra;
pub mod context;
pub mod error;
pub mod exec;
pub mod expr;
pub mod operator;
pub mod ops;
pub mod optimizer;
pub mod producer;
pub mod solution;
mod spill;
pub mod var;

pub use algebra::{
    Aggregate, AggregateKind, Algebra, GraphSpec, OrderKey, PatternHints, PatternTerm,
    StatementPattern,
};
pub use context::{EvalConfig, EvalContext};
pub use error::{EvalError, QueryError, Result};
pub use exec::{evaluate, evaluate_raw, QueryResults};
pub use expr::{ArithOp, CompareOp, Expr};
pub use operator::{BoxedOperator, Operator, OperatorState};
pub use producer::{spawn_producer, BackgroundResults, ProducerIter};
pub use solution::{Binding, Row, Solution};
pub use var::{VarId, VarRegistry};
