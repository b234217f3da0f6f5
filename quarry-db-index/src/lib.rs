//! # quarry-db Index Store
//!
//! Permutation-sorted storage of statement records:
//! - `Snapshot`: immutable, Arc-shared record set, one sorted vector per
//!   index ordering, built copy-on-write by `apply`
//! - `RecordScan`/`RecordIter`: lazy range scans with an explicit close
//!   contract and an open-scan tracker for leak detection
//! - `RecordSource`: the read seam consumed by the transaction layer's
//!   views and by the query engine
//! - `disk`: generation-based copy-on-write persistence with atomic
//!   header commit and crash recovery
//! - `PositionStats`: statistics exported to the optimizer

pub mod disk;
pub mod scan;
pub mod snapshot;
pub mod stats;

pub use disk::{load, save, LoadedStore};
pub use scan::{RecordIter, RecordScan, RecordSource, ScanTracker};
pub use snapshot::Snapshot;
pub use stats::PositionStats;
