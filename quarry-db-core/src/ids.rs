//! Compact id types
//!
//! `TermId` is the dense store-local surrogate assigned to a term by the
//! dictionary. Id 0 is reserved as the default-graph sentinel; real ids
//! start at 1 and are never reused for the lifetime of a store.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-local surrogate id for a term.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
pub struct TermId(pub u64);

impl TermId {
    /// Sentinel context id for the default (unnamed) graph. Never
    /// present in the dictionary.
    pub const DEFAULT_GRAPH: TermId = TermId(0);

    /// True for the default-graph sentinel.
    pub fn is_default_graph(self) -> bool {
        self == Self::DEFAULT_GRAPH
    }

    /// Underlying raw value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
