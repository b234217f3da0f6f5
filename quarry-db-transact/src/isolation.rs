//! Transaction isolation levels

use std::fmt;

/// Isolation level, ascending in strength.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IsolationLevel {
    /// Own staged writes are visible immediately; reads track the
    /// latest committed state with no repeatability guarantee.
    None,
    /// Never observes another transaction's uncommitted writes; the
    /// read snapshot may advance as others commit.
    ReadCommitted,
    /// One fixed snapshot for the whole transaction.
    #[default]
    Snapshot,
    /// Snapshot, plus commit-time validation that no concurrently
    /// committed transaction wrote to data this transaction read.
    Serializable,
}

impl IsolationLevel {
    /// True for levels that pin one snapshot at begin.
    pub fn uses_fixed_snapshot(self) -> bool {
        matches!(self, IsolationLevel::Snapshot | IsolationLevel::Serializable)
    }

    /// True when commit must run conflict validation.
    pub fn validates_serializability(self) -> bool {
        self == IsolationLevel::Serializable
    }
}

impl fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IsolationLevel::None => "NONE",
            IsolationLevel::ReadCommitted => "READ_COMMITTED",
            IsolationLevel::Snapshot => "SNAPSHOT",
            IsolationLevel::Serializable => "SERIALIZABLE",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strength_ordering() {
        assert!(IsolationLevel::None < IsolationLevel::ReadCommitted);
        assert!(IsolationLevel::ReadCommitted < IsolationLevel::Snapshot);
        assert!(IsolationLevel::Snapshot < IsolationLevel::Serializable);
    }

    #[test]
    fn test_snapshot_levels() {
        assert!(!IsolationLevel::None.uses_fixed_snapshot());
        assert!(!IsolationLevel::ReadCommitted.uses_fixed_snapshot());
        assert!(IsolationLevel::Snapshot.uses_fixed_snapshot());
        assert!(IsolationLevel::Serializable.uses_fixed_snapshot());
        assert!(IsolationLevel::Serializable.validates_serializability());
    }
}
