//! The store facade
//!
//! Owns the dictionary, the current committed snapshot, the commit
//! mutex (one committer at a time), listeners, namespaces and the
//! open-scan tracker. Connections borrow all of it through an `Arc`'d
//! inner, so a `Store` clone is a handle, not a copy.
//!
//! Commit path: serialize behind the mutex, validate (serializable
//! only), build the successor snapshot, persist it (disk-backed
//! stores), publish it, then notify listeners. A persistence failure
//! surfaces before anything is published, so a failed commit leaves the
//! store exactly as it was.

use crate::listener::{ChangeEvent, StoreListener};
use crate::transaction::Connection;
use parking_lot::{Mutex, RwLock};
use quarry_db_core::{isomorphic, Error, Record, RecordPattern, Result, Statement, TermDict};
use quarry_db_index::{disk, RecordScan, ScanTracker, Snapshot};
use rustc_hash::FxHashSet;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Directory for persisted state; `None` keeps the store in memory.
    pub directory: Option<PathBuf>,
    /// Fsync data and header files on commit.
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: None,
            sync_writes: true,
        }
    }
}

pub(crate) struct StoreInner {
    pub(crate) config: StoreConfig,
    pub(crate) dict: Arc<TermDict>,
    pub(crate) current: RwLock<Arc<Snapshot>>,
    /// Serializes committers; never held while notifying listeners.
    commit_lock: Mutex<()>,
    listeners: RwLock<Vec<Arc<dyn StoreListener>>>,
    pub(crate) namespaces: RwLock<BTreeMap<String, String>>,
    pub(crate) tracker: Arc<ScanTracker>,
}

/// A quad store handle.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    /// Open a store; loads the last committed generation when a
    /// directory is configured and it holds one.
    pub fn open(config: StoreConfig) -> Result<Store> {
        let (snapshot, dict, namespaces) = match &config.directory {
            Some(dir) => match disk::load(dir)? {
                Some(loaded) => (loaded.snapshot, loaded.dict, loaded.namespaces),
                None => {
                    info!(directory = %dir.display(), "starting empty store");
                    (Snapshot::empty(), TermDict::new(), BTreeMap::new())
                }
            },
            None => (Snapshot::empty(), TermDict::new(), BTreeMap::new()),
        };
        Ok(Store {
            inner: Arc::new(StoreInner {
                config,
                dict: Arc::new(dict),
                current: RwLock::new(Arc::new(snapshot)),
                commit_lock: Mutex::new(()),
                listeners: RwLock::new(Vec::new()),
                namespaces: RwLock::new(namespaces),
                tracker: Arc::new(ScanTracker::new()),
            }),
        })
    }

    /// An in-memory store.
    pub fn in_memory() -> Store {
        Self::open(StoreConfig {
            directory: None,
            sync_writes: false,
        })
        .expect("in-memory store cannot fail to open")
    }

    /// Open a new connection (its transaction state machine starts
    /// INACTIVE).
    pub fn connection(&self) -> Connection {
        Connection::new(self.clone())
    }

    /// The current committed snapshot.
    pub(crate) fn head(&self) -> Arc<Snapshot> {
        self.inner.current.read().clone()
    }

    /// Number of committed statements (asserted and inferred).
    pub fn len(&self) -> usize {
        self.head().len()
    }

    /// True when no statements are committed.
    pub fn is_empty(&self) -> bool {
        self.head().is_empty()
    }

    /// Number of scans currently open against this store (leak probe).
    pub fn open_scans(&self) -> usize {
        self.inner.tracker.open_count()
    }

    /// Committed-snapshot statistics (record and distinct-value
    /// counts), the same numbers the optimizer consumes.
    pub fn stats(&self) -> quarry_db_index::PositionStats {
        *self.head().stats()
    }

    /// Register a change listener.
    pub fn add_listener(&self, listener: Arc<dyn StoreListener>) {
        self.inner.listeners.write().push(listener);
    }

    // === Namespace management ===

    /// Bind a prefix to a namespace IRI (durable with the next commit).
    pub fn set_namespace(&self, prefix: impl Into<String>, iri: impl Into<String>) {
        self.inner.namespaces.write().insert(prefix.into(), iri.into());
    }

    /// The namespace IRI bound to a prefix.
    pub fn namespace(&self, prefix: &str) -> Option<String> {
        self.inner.namespaces.read().get(prefix).cloned()
    }

    /// Remove a prefix binding.
    pub fn remove_namespace(&self, prefix: &str) {
        self.inner.namespaces.write().remove(prefix);
    }

    /// All prefix bindings, sorted by prefix.
    pub fn namespaces(&self) -> Vec<(String, String)> {
        self.inner
            .namespaces
            .read()
            .iter()
            .map(|(p, n)| (p.clone(), n.clone()))
            .collect()
    }

    /// Model-level equivalence with another store: graph isomorphism
    /// over the asserted statements (blank-node renaming allowed).
    pub fn equivalent(&self, other: &Store) -> Result<bool> {
        let mine = self.export_statements()?;
        let theirs = other.export_statements()?;
        Ok(isomorphic(&mine, &theirs))
    }

    fn export_statements(&self) -> Result<Vec<Statement>> {
        let conn = self.connection();
        let mut out = Vec::new();
        let mut iter = conn.statements(None, None, None, crate::GraphFilter::Any, true)?;
        for statement in iter.by_ref() {
            out.push(statement?);
        }
        Ok(out)
    }

    /// Apply a transaction's staged writes. Called by `Connection`.
    pub(crate) fn apply_commit(
        &self,
        level: crate::IsolationLevel,
        begin: &Snapshot,
        add_set: &FxHashSet<Record>,
        adds_ordered: &[Record],
        removes: &FxHashSet<Record>,
        reads: &[RecordPattern],
        events: Vec<ChangeEvent>,
    ) -> Result<()> {
        // A transaction with no net writes serializes trivially and
        // leaves the committed state untouched.
        let write_free = add_set.is_empty() && removes.is_empty();
        if !write_free {
            let _guard = self.inner.commit_lock.lock();
            let head = self.head();

            if level.validates_serializability() && head.generation() != begin.generation() {
                validate_serializable(begin, &head, add_set, removes, reads)?;
            }

            let adds: Vec<Record> = adds_ordered
                .iter()
                .filter(|r| add_set.contains(r) && !removes.contains(r))
                .copied()
                .collect();
            let removes_vec: Vec<Record> = removes.iter().copied().collect();

            // Reference counting covers records that actually change
            // presence, not idempotent re-adds or misses.
            let effective_adds: Vec<&Record> =
                adds.iter().filter(|r| !head.contains(r)).collect();
            let effective_removes: Vec<&Record> =
                removes_vec.iter().filter(|r| head.contains(r)).collect();

            let next = head.apply(&adds, &removes_vec);
            if let Some(dir) = &self.inner.config.directory {
                disk::save(
                    dir,
                    &next,
                    &self.inner.dict,
                    &self.inner.namespaces.read(),
                    self.inner.config.sync_writes,
                )?;
            }

            for record in effective_adds {
                self.retain_record(record);
            }
            for record in effective_removes {
                self.release_record(record);
            }

            debug!(
                generation = next.generation(),
                records = next.len(),
                "commit applied"
            );
            *self.inner.current.write() = Arc::new(next);
        }

        // Outside the commit lock: listener callbacks may take time.
        let listeners = self.inner.listeners.read().clone();
        for event in &events {
            for listener in &listeners {
                match event {
                    ChangeEvent::Added(st) => listener.statement_added(st),
                    ChangeEvent::Removed(st) => listener.statement_removed(st),
                }
            }
        }
        Ok(())
    }

    fn retain_record(&self, record: &Record) {
        self.inner.dict.retain(record.s);
        self.inner.dict.retain(record.p);
        self.inner.dict.retain(record.o);
        if !record.g.is_default_graph() {
            self.inner.dict.retain(record.g);
        }
    }

    fn release_record(&self, record: &Record) {
        self.inner.dict.release(record.s);
        self.inner.dict.release(record.p);
        self.inner.dict.release(record.o);
        if !record.g.is_default_graph() {
            self.inner.dict.release(record.g);
        }
    }
}

/// Serializable validation: every read pattern must observe the same
/// records in the commit-time head as in the begin snapshot, and no
/// staged write may race a presence change.
fn validate_serializable(
    begin: &Snapshot,
    head: &Snapshot,
    add_set: &FxHashSet<Record>,
    removes: &FxHashSet<Record>,
    reads: &[RecordPattern],
) -> Result<()> {
    for pattern in reads {
        let then: Vec<Record> = RecordScan::open(begin, *pattern, false, None).collect();
        let now: Vec<Record> = RecordScan::open(head, *pattern, false, None).collect();
        if then != now {
            return Err(Error::conflict(format!(
                "concurrent commit changed data read by this transaction (pattern {})",
                pattern
            )));
        }
    }
    for record in add_set.iter().chain(removes.iter()) {
        if begin.contains(record) != head.contains(record) {
            return Err(Error::conflict(format!(
                "concurrent commit changed statement {} written by this transaction",
                record
            )));
        }
    }
    Ok(())
}
