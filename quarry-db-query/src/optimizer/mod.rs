//! Algebra rewrites applied before evaluation
//!
//! Three passes, none of which may change result semantics:
//! 1. filter pushdown - relocate filters to their minimal scope
//! 2. join reordering - ascending estimated cardinality
//! 3. pattern annotation - advisory resource hints for scan selection
//!
//! A rewrite that cannot be proven safe (a `Values` node binding a
//! filter's variables inside the target scope) leaves the subtree
//! untouched.

mod annotate;
mod pushdown;
mod reorder;

pub use annotate::annotate;
pub use pushdown::push_filters;
pub use reorder::reorder_joins;

use crate::algebra::Algebra;
use quarry_db_core::TermDict;
use quarry_db_index::RecordSource;

/// Run all optimizer passes.
pub fn optimize<S: RecordSource + ?Sized>(
    algebra: Algebra,
    source: &S,
    dict: &TermDict,
) -> Algebra {
    let algebra = push_filters(algebra);
    let mut algebra = reorder_joins(algebra, source, dict);
    annotate(&mut algebra);
    algebra
}
