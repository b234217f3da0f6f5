//! Immutable point-in-time snapshots of the record set
//!
//! A `Snapshot` holds one sorted, duplicate-free vector of records per
//! index ordering, all describing the same set. Each vector is behind
//! its own `Arc` so an open scan pins the data it reads without pinning
//! writers: committing produces a *new* snapshot (sort the batch by each
//! ordering's comparator, then a single linear merge with the old
//! vector), never mutating an existing one.

use crate::stats::PositionStats;
use quarry_db_core::{IndexOrder, Record, RecordPattern};
use rustc_hash::FxHashSet;
use std::cmp::Ordering;
use std::sync::Arc;

/// An immutable view of the stored records.
#[derive(Clone)]
pub struct Snapshot {
    /// One sorted vector per ordering, indexed by position in
    /// `IndexOrder::all()`.
    orders: [Arc<Vec<Record>>; 4],
    generation: u64,
    stats: PositionStats,
}

impl Snapshot {
    /// The empty snapshot (generation 0).
    pub fn empty() -> Self {
        let empty = Arc::new(Vec::new());
        Self {
            orders: [empty.clone(), empty.clone(), empty.clone(), empty],
            generation: 0,
            stats: PositionStats::default(),
        }
    }

    /// Build a snapshot from an arbitrary record collection
    /// (deduplicated), tagging it with the given generation.
    pub fn from_records(records: Vec<Record>, generation: u64) -> Self {
        let mut orders: Vec<Arc<Vec<Record>>> = Vec::with_capacity(4);
        for order in IndexOrder::all() {
            let mut sorted = records.clone();
            sorted.sort_by(|a, b| order.compare(a, b));
            sorted.dedup();
            orders.push(Arc::new(sorted));
        }
        let orders: [Arc<Vec<Record>>; 4] = orders.try_into().unwrap_or_else(|_| unreachable!());
        let stats = PositionStats::compute(&orders[0]);
        Self {
            orders,
            generation,
            stats,
        }
    }

    /// Produce the successor snapshot with `adds` inserted and `removes`
    /// deleted. Adding a present record and removing an absent one are
    /// both no-ops, so the result is duplicate-free by construction.
    pub fn apply(&self, adds: &[Record], removes: &[Record]) -> Snapshot {
        let removed: FxHashSet<Record> = removes.iter().copied().collect();

        let mut orders: Vec<Arc<Vec<Record>>> = Vec::with_capacity(4);
        for (i, order) in IndexOrder::all().iter().enumerate() {
            let base = &self.orders[i];

            let mut batch: Vec<Record> = adds
                .iter()
                .filter(|r| !removed.contains(r))
                .copied()
                .collect();
            batch.sort_by(|a, b| order.compare(a, b));
            batch.dedup();

            let mut merged = Vec::with_capacity(base.len() + batch.len());
            let mut bi = 0usize;
            for record in base.iter() {
                if removed.contains(record) {
                    continue;
                }
                while bi < batch.len() {
                    match order.compare(&batch[bi], record) {
                        Ordering::Less => {
                            merged.push(batch[bi]);
                            bi += 1;
                        }
                        Ordering::Equal => {
                            // Already present: idempotent add.
                            bi += 1;
                        }
                        Ordering::Greater => break,
                    }
                }
                merged.push(*record);
            }
            merged.extend_from_slice(&batch[bi..]);
            orders.push(Arc::new(merged));
        }

        let orders: [Arc<Vec<Record>>; 4] = orders.try_into().unwrap_or_else(|_| unreachable!());
        let stats = PositionStats::compute(&orders[0]);
        Snapshot {
            orders,
            generation: self.generation + 1,
            stats,
        }
    }

    /// The sorted record vector for an ordering.
    pub fn records(&self, order: IndexOrder) -> &Arc<Vec<Record>> {
        let idx = IndexOrder::all()
            .iter()
            .position(|o| *o == order)
            .unwrap_or(0);
        &self.orders[idx]
    }

    /// Total record count.
    pub fn len(&self) -> usize {
        self.orders[0].len()
    }

    /// True when no records are stored.
    pub fn is_empty(&self) -> bool {
        self.orders[0].is_empty()
    }

    /// Commit generation this snapshot belongs to.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Position statistics (record + distinct counts).
    pub fn stats(&self) -> &PositionStats {
        &self.stats
    }

    /// Membership test for an exact record (binary search).
    pub fn contains(&self, record: &Record) -> bool {
        let order = IndexOrder::Spog;
        self.records(order)
            .binary_search_by(|probe| order.compare(probe, record))
            .is_ok()
    }

    /// Index range of records matching the pattern's bound prefix under
    /// the given ordering.
    pub fn prefix_range(&self, order: IndexOrder, pattern: &RecordPattern) -> (usize, usize) {
        let data = self.records(order);
        let (lo, hi) = order.prefix_bounds(pattern);
        let start = data.partition_point(|r| order.key(r) < lo);
        let end = data.partition_point(|r| order.key(r) <= hi);
        (start, end)
    }

    /// Approximate number of records matching a pattern.
    ///
    /// The width of the bound-prefix range on the best ordering: exact
    /// when the pattern is a pure prefix, an upper bound otherwise.
    /// Monotone: a pattern binding a superset of positions never
    /// estimates higher than the looser pattern.
    pub fn estimated_cardinality(&self, pattern: &RecordPattern) -> u64 {
        let order = IndexOrder::for_pattern(pattern, false);
        let (start, end) = self.prefix_range(order, pattern);
        (end - start) as u64
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("generation", &self.generation)
            .field("records", &self.len())
            .finish()
    }
}
