//! Store change listeners
//!
//! Listeners observe committed changes. Re-adding an existing statement
//! is a no-op for store contents but still reported as an add event;
//! `clear` reports one removal per retracted statement.
//!
//! Decoration by inheritance in the original design is replaced by an
//! explicit listener list on the store.

use quarry_db_core::Statement;

/// Observer of committed store changes.
pub trait StoreListener: Send + Sync {
    /// A statement add was committed (possibly a no-op re-add).
    fn statement_added(&self, statement: &Statement);

    /// A statement removal was committed.
    fn statement_removed(&self, statement: &Statement);
}

/// One staged change, carried term-level so listeners never need the
/// dictionary.
#[derive(Clone, Debug)]
pub(crate) enum ChangeEvent {
    Added(Statement),
    Removed(Statement),
}
