//! Store views - the snapshot "source" a transaction reads through
//!
//! A `StoreView` merges a base snapshot with the transaction's staged
//! writes: a range scan over the base, minus staged removes, merged in
//! index order with the staged adds that match the pattern. Views are
//! cheap value objects built per read, so every read sees the staging
//! state at its own start.
//!
//! Under SERIALIZABLE the view records every scanned pattern into the
//! transaction's read set for commit-time validation.

use parking_lot::Mutex;
use quarry_db_core::{IndexOrder, Record, RecordPattern};
use quarry_db_index::{
    PositionStats, RecordIter, RecordScan, RecordSource, ScanTracker, Snapshot,
};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::sync::Arc;

/// A read view: base snapshot plus staged overlay.
#[derive(Clone)]
pub struct StoreView {
    base: Arc<Snapshot>,
    adds: Arc<Vec<Record>>,
    removes: Arc<FxHashSet<Record>>,
    tracker: Arc<ScanTracker>,
    /// Read-pattern log for serializable validation.
    reads: Option<Arc<Mutex<Vec<RecordPattern>>>>,
}

impl StoreView {
    pub(crate) fn new(
        base: Arc<Snapshot>,
        adds: Arc<Vec<Record>>,
        removes: Arc<FxHashSet<Record>>,
        tracker: Arc<ScanTracker>,
        reads: Option<Arc<Mutex<Vec<RecordPattern>>>>,
    ) -> Self {
        Self {
            base,
            adds,
            removes,
            tracker,
            reads,
        }
    }

    /// View of a bare snapshot with no staged writes.
    pub fn of_snapshot(base: Arc<Snapshot>, tracker: Arc<ScanTracker>) -> Self {
        Self {
            base,
            adds: Arc::new(Vec::new()),
            removes: Arc::new(FxHashSet::default()),
            tracker,
            reads: None,
        }
    }

    /// The base snapshot's commit generation.
    pub fn generation(&self) -> u64 {
        self.base.generation()
    }
}

impl RecordSource for StoreView {
    fn scan(&self, pattern: RecordPattern, object_resource: bool) -> Box<dyn RecordIter> {
        if let Some(reads) = &self.reads {
            reads.lock().push(pattern);
        }

        let base = RecordScan::open(
            &self.base,
            pattern,
            object_resource,
            Some(self.tracker.clone()),
        );
        if self.adds.is_empty() && self.removes.is_empty() {
            return Box::new(base);
        }

        // Overlay must come out in the same permutation order the base
        // scan uses so the merge preserves index order.
        let order = IndexOrder::for_pattern(&pattern, object_resource);
        let mut overlay: Vec<Record> = self
            .adds
            .iter()
            .filter(|r| pattern.matches(r) && !self.removes.contains(r))
            .copied()
            .collect();
        overlay.sort_by(|a, b| order.compare(a, b));

        Box::new(MergedScan {
            base: Some(base),
            base_head: None,
            overlay: overlay.into_iter(),
            overlay_head: None,
            removes: self.removes.clone(),
            order,
        })
    }

    fn estimated_cardinality(&self, pattern: &RecordPattern) -> u64 {
        let staged_adds = self.adds.iter().filter(|r| pattern.matches(r)).count() as u64;
        let staged_removes = self.removes.iter().filter(|r| pattern.matches(r)).count() as u64;
        self.base
            .estimated_cardinality(pattern)
            .saturating_add(staged_adds)
            .saturating_sub(staged_removes)
    }

    fn stats(&self) -> PositionStats {
        let mut stats = *self.base.stats();
        stats.records = stats
            .records
            .saturating_add(self.adds.len() as u64)
            .saturating_sub(self.removes.len() as u64);
        stats
    }
}

/// Two-way merge of the base scan and the staged overlay, in index
/// order, skipping staged removes and collapsing duplicates.
struct MergedScan {
    base: Option<RecordScan>,
    base_head: Option<Record>,
    overlay: std::vec::IntoIter<Record>,
    overlay_head: Option<Record>,
    removes: Arc<FxHashSet<Record>>,
    order: IndexOrder,
}

impl MergedScan {
    fn fill_heads(&mut self) {
        if self.base_head.is_none() {
            if let Some(base) = self.base.as_mut() {
                self.base_head = base.find(|r| !self.removes.contains(r));
            }
        }
        if self.overlay_head.is_none() {
            self.overlay_head = self.overlay.next();
        }
    }
}

impl Iterator for MergedScan {
    type Item = Record;

    fn next(&mut self) -> Option<Record> {
        self.fill_heads();
        match (self.base_head, self.overlay_head) {
            (None, None) => None,
            (Some(b), None) => {
                self.base_head = None;
                Some(b)
            }
            (None, Some(o)) => {
                self.overlay_head = None;
                Some(o)
            }
            (Some(b), Some(o)) => match self.order.compare(&b, &o) {
                Ordering::Less => {
                    self.base_head = None;
                    Some(b)
                }
                Ordering::Greater => {
                    self.overlay_head = None;
                    Some(o)
                }
                // Staged re-add of an existing record: emit once.
                Ordering::Equal => {
                    self.base_head = None;
                    self.overlay_head = None;
                    Some(b)
                }
            },
        }
    }
}

impl RecordIter for MergedScan {
    fn close(&mut self) {
        if let Some(mut base) = self.base.take() {
            base.close();
        }
        self.base_head = None;
        self.overlay_head = None;
        self.overlay = Vec::new().into_iter();
    }
}

impl Drop for MergedScan {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarry_db_core::TermId;

    fn record(s: u64, p: u64, o: u64) -> Record {
        Record::new(TermId(s), TermId(p), TermId(o), TermId::DEFAULT_GRAPH)
    }

    fn view(
        base: Vec<Record>,
        adds: Vec<Record>,
        removes: Vec<Record>,
    ) -> (StoreView, Arc<ScanTracker>) {
        let tracker = Arc::new(ScanTracker::new());
        let snapshot = Arc::new(Snapshot::empty().apply(&base, &[]));
        let view = StoreView::new(
            snapshot,
            Arc::new(adds),
            Arc::new(removes.into_iter().collect()),
            tracker.clone(),
            None,
        );
        (view, tracker)
    }

    #[test]
    fn test_overlay_adds_visible() {
        let (view, _) = view(vec![record(1, 7, 1)], vec![record(2, 7, 1)], vec![]);
        let hits: Vec<Record> = view.scan(RecordPattern::any(), false).collect();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_staged_removes_hidden() {
        let (view, _) = view(
            vec![record(1, 7, 1), record(2, 7, 1)],
            vec![],
            vec![record(1, 7, 1)],
        );
        let hits: Vec<Record> = view.scan(RecordPattern::any(), false).collect();
        assert_eq!(hits, vec![record(2, 7, 1)]);
    }

    #[test]
    fn test_merge_preserves_index_order() {
        let (view, _) = view(
            vec![record(1, 7, 1), record(3, 7, 1)],
            vec![record(2, 7, 1), record(4, 7, 1)],
            vec![],
        );
        let hits: Vec<Record> = view.scan(RecordPattern::any(), false).collect();
        let keys: Vec<[u64; 4]> = hits.iter().map(|r| IndexOrder::Spog.key(r)).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(hits.len(), 4);
    }

    #[test]
    fn test_readd_of_existing_collapses() {
        let (view, _) = view(vec![record(1, 7, 1)], vec![record(1, 7, 1)], vec![]);
        let hits: Vec<Record> = view.scan(RecordPattern::any(), false).collect();
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_scan_releases_tracker() {
        let (view, tracker) = view(vec![record(1, 7, 1)], vec![record(2, 7, 1)], vec![]);
        let mut scan = view.scan(RecordPattern::any(), false);
        assert_eq!(tracker.open_count(), 1);
        scan.close();
        assert_eq!(tracker.open_count(), 0);
    }

    #[test]
    fn test_read_patterns_recorded() {
        let tracker = Arc::new(ScanTracker::new());
        let reads = Arc::new(Mutex::new(Vec::new()));
        let snapshot = Arc::new(Snapshot::empty().apply(&[record(1, 7, 1)], &[]));
        let view = StoreView::new(
            snapshot,
            Arc::new(Vec::new()),
            Arc::new(FxHashSet::default()),
            tracker,
            Some(reads.clone()),
        );

        let pattern = RecordPattern::any().with_s(TermId(1));
        view.scan(pattern, false).close();
        assert_eq!(*reads.lock(), vec![pattern]);
    }
}
