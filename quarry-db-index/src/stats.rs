//! Position statistics for snapshots
//!
//! Record count plus distinct-value counts per quad position, computed
//! once per snapshot and exported to the optimizer (join reordering
//! scales cardinality estimates by these) and to external monitoring.

use quarry_db_core::{Record, TermId};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Distinct-value statistics for one snapshot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionStats {
    /// Total records (asserted + inferred).
    pub records: u64,
    /// Distinct subject ids.
    pub distinct_subjects: u64,
    /// Distinct predicate ids.
    pub distinct_predicates: u64,
    /// Distinct object ids.
    pub distinct_objects: u64,
    /// Distinct context ids (the default graph counts as one).
    pub distinct_graphs: u64,
}

impl PositionStats {
    /// Compute statistics over a record collection.
    pub fn compute(records: &[Record]) -> Self {
        let mut subjects: FxHashSet<TermId> = FxHashSet::default();
        let mut predicates: FxHashSet<TermId> = FxHashSet::default();
        let mut objects: FxHashSet<TermId> = FxHashSet::default();
        let mut graphs: FxHashSet<TermId> = FxHashSet::default();
        for r in records {
            subjects.insert(r.s);
            predicates.insert(r.p);
            objects.insert(r.o);
            graphs.insert(r.g);
        }
        Self {
            records: records.len() as u64,
            distinct_subjects: subjects.len() as u64,
            distinct_predicates: predicates.len() as u64,
            distinct_objects: objects.len() as u64,
            distinct_graphs: graphs.len() as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: u64, p: u64, o: u64) -> Record {
        Record::new(TermId(s), TermId(p), TermId(o), TermId::DEFAULT_GRAPH)
    }

    #[test]
    fn test_compute() {
        let stats = PositionStats::compute(&[record(1, 7, 1), record(1, 7, 2), record(2, 7, 1)]);
        assert_eq!(stats.records, 3);
        assert_eq!(stats.distinct_subjects, 2);
        assert_eq!(stats.distinct_predicates, 1);
        assert_eq!(stats.distinct_objects, 2);
        assert_eq!(stats.distinct_graphs, 1);
    }

    #[test]
    fn test_empty() {
        assert_eq!(PositionStats::compute(&[]), PositionStats::default());
    }
}
