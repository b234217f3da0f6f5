//! Bindings, rows and public solutions
//!
//! Internally a solution row is full-width: one `Binding` slot per
//! registered variable, indexed by `VarId`. Rows are extended by copy;
//! a row handed downstream is never mutated again.
//!
//! `Solution` is the public view handed to result consumers: lookup by
//! variable name over the declared binding names.

use crate::var::VarId;
use quarry_db_core::Term;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One variable slot in a row.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Binding {
    /// Variable has no value in this solution
    Unbound,
    /// Variable is bound to a term
    Bound(Term),
}

impl Binding {
    /// The bound term, if any.
    pub fn term(&self) -> Option<&Term> {
        match self {
            Binding::Unbound => None,
            Binding::Bound(t) => Some(t),
        }
    }

    /// True when bound.
    pub fn is_bound(&self) -> bool {
        matches!(self, Binding::Bound(_))
    }
}

/// A full-width solution row.
pub type Row = Vec<Binding>;

/// An all-unbound row of the given width.
pub fn empty_row(width: usize) -> Row {
    vec![Binding::Unbound; width]
}

/// The term bound to `var` in `row`, if any.
pub fn bound(row: &Row, var: VarId) -> Option<&Term> {
    row.get(var.index()).and_then(Binding::term)
}

/// One query solution as seen by result consumers.
///
/// Immutable; `get` looks a variable up by name among the declared
/// binding names.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Solution {
    names: Arc<[Arc<str>]>,
    values: Arc<[Option<Term>]>,
}

impl Solution {
    pub(crate) fn new(names: Arc<[Arc<str>]>, values: Vec<Option<Term>>) -> Self {
        debug_assert_eq!(names.len(), values.len());
        Self {
            names,
            values: values.into(),
        }
    }

    /// The declared binding names, in order.
    pub fn names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// The term bound to a variable name, if any.
    pub fn get(&self, name: &str) -> Option<&Term> {
        let idx = self.names.iter().position(|n| n.as_ref() == name)?;
        self.values[idx].as_ref()
    }

    /// Iterate (name, term) pairs for the bound variables.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Term)> {
        self.names
            .iter()
            .zip(self.values.iter())
            .filter_map(|(n, v)| v.as_ref().map(|t| (n, t)))
    }

    /// Number of bound variables.
    pub fn bound_len(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}
