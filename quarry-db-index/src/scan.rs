//! Range scans over snapshots
//!
//! A `RecordScan` is a lazy cursor over one ordering's sorted vector:
//! a single range seek for the pattern's bound prefix, then residual
//! filtering per record for positions outside the prefix. The scan pins
//! the vector it reads (Arc), so the snapshot's data stays live for as
//! long as the scan is open.
//!
//! ## Resource discipline
//!
//! Every scan registers with a `ScanTracker` and deregisters exactly
//! once, on whichever comes first: exhaustion, explicit `close()`, or
//! drop. `close()` is idempotent. The tracker's open count is the hook
//! leak tests assert on.

use crate::snapshot::Snapshot;
use crate::stats::PositionStats;
use quarry_db_core::{IndexOrder, Record, RecordPattern};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;

/// Counter of currently-open scans, shared store-wide.
#[derive(Debug, Default)]
pub struct ScanTracker {
    open: AtomicUsize,
}

impl ScanTracker {
    /// Create a tracker with no open scans.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of scans currently open.
    pub fn open_count(&self) -> usize {
        self.open.load(AtomicOrdering::Acquire)
    }

    fn register(&self) {
        self.open.fetch_add(1, AtomicOrdering::AcqRel);
    }

    fn release(&self) {
        self.open.fetch_sub(1, AtomicOrdering::AcqRel);
    }
}

/// A lazy record iterator with an explicit close contract.
///
/// `Send` so a whole evaluation (scans included) can be handed to a
/// background producer thread.
pub trait RecordIter: Iterator<Item = Record> + Send {
    /// Release underlying resources. Idempotent; also invoked by drop.
    fn close(&mut self);
}

/// Read-only record access, the seam between the index layer and the
/// transaction layer's views.
pub trait RecordSource {
    /// Lazy scan of records matching the pattern, ordered by the chosen
    /// index permutation. `object_resource` is an advisory hint from the
    /// optimizer's pattern annotations (never required for correctness).
    fn scan(&self, pattern: RecordPattern, object_resource: bool) -> Box<dyn RecordIter>;

    /// Approximate match count; monotone in pattern tightness.
    fn estimated_cardinality(&self, pattern: &RecordPattern) -> u64;

    /// Snapshot-level position statistics.
    fn stats(&self) -> PositionStats;
}

/// Cursor over one ordering's range of a snapshot.
pub struct RecordScan {
    data: Arc<Vec<Record>>,
    pos: usize,
    end: usize,
    pattern: RecordPattern,
    tracker: Option<Arc<ScanTracker>>,
}

impl RecordScan {
    /// Open a scan on a snapshot. The permutation is chosen by bound
    /// prefix length (longest wins), `object_resource` breaking the
    /// nothing-bound tie.
    pub fn open(
        snapshot: &Snapshot,
        pattern: RecordPattern,
        object_resource: bool,
        tracker: Option<Arc<ScanTracker>>,
    ) -> Self {
        let order = IndexOrder::for_pattern(&pattern, object_resource);
        let (pos, end) = snapshot.prefix_range(order, &pattern);
        if let Some(t) = &tracker {
            t.register();
        }
        Self {
            data: snapshot.records(order).clone(),
            pos,
            end,
            pattern,
            tracker,
        }
    }

    fn finish(&mut self) {
        self.pos = self.end;
        if let Some(t) = self.tracker.take() {
            t.release();
        }
        // Drop the pin on the snapshot's data.
        self.data = Arc::new(Vec::new());
        self.end = 0;
        self.pos = 0;
    }
}

impl Iterator for RecordScan {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        while self.pos < self.end {
            let record = self.data[self.pos];
            self.pos += 1;
            if self.pattern.matches(&record) {
                return Some(record);
            }
        }
        if self.tracker.is_some() {
            self.finish();
        }
        None
    }
}

impl RecordIter for RecordScan {
    fn close(&mut self) {
        if self.tracker.is_some() || self.end != 0 {
            self.finish();
        }
    }
}

impl Drop for RecordScan {
    fn drop(&mut self) {
        self.close();
    }
}

impl RecordSource for Snapshot {
    fn scan(&self, pattern: RecordPattern, object_resource: bool) -> Box<dyn RecordIter> {
        Box::new(RecordScan::open(self, pattern, object_resource, None))
    }

    fn estimated_cardinality(&self, pattern: &RecordPattern) -> u64 {
        Snapshot::estimated_cardinality(self, pattern)
    }

    fn stats(&self) -> PositionStats {
        *Snapshot::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_db_core::TermId;

    fn record(s: u64, p: u64, o: u64) -> Record {
        Record::new(TermId(s), TermId(p), TermId(o), TermId::DEFAULT_GRAPH)
    }

    fn snapshot() -> Snapshot {
        Snapshot::empty().apply(
            &[
                record(1, 7, 10),
                record(1, 7, 11),
                record(1, 8, 10),
                record(2, 7, 10),
                record(3, 9, 12),
            ],
            &[],
        )
    }

    #[test]
    fn test_scan_prefix_seek() {
        let snap = snapshot();
        let hits: Vec<Record> = RecordScan::open(
            &snap,
            RecordPattern::any().with_s(TermId(1)),
            false,
            None,
        )
        .collect();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|r| r.s == TermId(1)));
    }

    #[test]
    fn test_scan_bound_suffix_uses_longer_prefix_order() {
        let snap = snapshot();
        // s + o bound: OSPG's (o, s) prefix covers both positions.
        let hits: Vec<Record> = RecordScan::open(
            &snap,
            RecordPattern::any().with_s(TermId(1)).with_o(TermId(10)),
            false,
            None,
        )
        .collect();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|r| r.o == TermId(10)));
    }

    #[test]
    fn test_scan_residual_filter() {
        // p + g bound ties POSG and GSPO at prefix length 1; POSG wins
        // by priority and the graph is filtered per record.
        let snap = Snapshot::empty().apply(
            &[
                record(1, 7, 10),
                record(2, 7, 10),
                Record::new(TermId(2), TermId(7), TermId(10), TermId(5)),
            ],
            &[],
        );
        let hits: Vec<Record> = RecordScan::open(
            &snap,
            RecordPattern::any().with_p(TermId(7)).with_g(TermId(5)),
            false,
            None,
        )
        .collect();
        assert_eq!(hits, vec![Record::new(TermId(2), TermId(7), TermId(10), TermId(5))]);
    }

    #[test]
    fn test_scan_order_is_index_order() {
        let snap = snapshot();
        let hits: Vec<Record> =
            RecordScan::open(&snap, RecordPattern::any().with_p(TermId(7)), false, None).collect();
        // POSG ordering: sorted by (p, o, s, g).
        let keys: Vec<[u64; 4]> = hits.iter().map(|r| IndexOrder::Posg.key(r)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(hits.len(), 3);
    }

    #[test]
    fn test_scan_empty_result() {
        let snap = snapshot();
        let hits: Vec<Record> =
            RecordScan::open(&snap, RecordPattern::any().with_s(TermId(42)), false, None).collect();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_tracker_released_on_exhaustion() {
        let snap = snapshot();
        let tracker = Arc::new(ScanTracker::new());
        let mut scan = RecordScan::open(
            &snap,
            RecordPattern::any(),
            false,
            Some(tracker.clone()),
        );
        assert_eq!(tracker.open_count(), 1);
        while scan.next().is_some() {}
        assert_eq!(tracker.open_count(), 0);
    }

    #[test]
    fn test_tracker_released_on_early_close() {
        let snap = snapshot();
        let tracker = Arc::new(ScanTracker::new());
        let mut scan = RecordScan::open(
            &snap,
            RecordPattern::any(),
            false,
            Some(tracker.clone()),
        );
        assert!(scan.next().is_some());
        scan.close();
        scan.close(); // idempotent
        assert_eq!(tracker.open_count(), 0);
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_tracker_released_on_drop() {
        let snap = snapshot();
        let tracker = Arc::new(ScanTracker::new());
        {
            let mut scan = RecordScan::open(
                &snap,
                RecordPattern::any(),
                false,
                Some(tracker.clone()),
            );
            assert!(scan.next().is_some());
            assert_eq!(tracker.open_count(), 1);
        }
        assert_eq!(tracker.open_count(), 0);
    }

    #[test]
    fn test_scan_outlives_snapshot_handle() {
        let tracker = Arc::new(ScanTracker::new());
        let mut scan = {
            let snap = snapshot();
            RecordScan::open(&snap, RecordPattern::any(), false, Some(tracker.clone()))
        };
        // Snapshot handle dropped; the scan still reads pinned data.
        assert_eq!(scan.by_ref().count(), 5);
        assert_eq!(tracker.open_count(), 0);
    }
}
