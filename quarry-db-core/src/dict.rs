//! Value dictionary - bidirectional term <-> id mapping
//!
//! The dictionary assigns each distinct term a dense `TermId` and
//! resolves ids back to terms. Ids are stable for the lifetime of the
//! store and never reused, even after every referencing record is gone.
//!
//! ## Concurrency
//!
//! All operations are safe under concurrent calls; assignment is
//! serialized behind an internal `RwLock`. Lookups on the hot path use
//! hashbrown's raw-entry API so a hit never allocates.
//!
//! ## Reclamation
//!
//! `retain`/`release` maintain per-entry reference counts driven by the
//! index store. Entries at zero are skipped when the dictionary is
//! persisted; in-memory reclamation is deferred (entries stay resolvable
//! until the store is dropped).

use crate::error::{Error, Result};
use crate::ids::TermId;
use crate::term::Term;
use hashbrown::HashMap;
use parking_lot::RwLock;
use std::hash::{BuildHasher, Hash, Hasher};

struct DictEntry {
    term: Term,
    refs: u64,
}

#[derive(Default)]
struct DictInner {
    /// Entries indexed by `id - 1` (id 0 is the default-graph sentinel).
    entries: Vec<DictEntry>,
    by_term: HashMap<Term, TermId>,
}

/// Bidirectional term dictionary.
#[derive(Default)]
pub struct TermDict {
    inner: RwLock<DictInner>,
}

impl TermDict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    fn hash_term(map: &HashMap<Term, TermId>, term: &Term) -> u64 {
        let mut hasher = map.hasher().build_hasher();
        term.hash(&mut hasher);
        hasher.finish()
    }

    /// Assign an id to a term, or return the existing one.
    pub fn internalize(&self, term: &Term) -> TermId {
        // Fast path: read lock, no allocation.
        if let Some(id) = self.lookup(term) {
            return id;
        }

        let mut inner = self.inner.write();
        let hash = Self::hash_term(&inner.by_term, term);
        // Re-check under the write lock; another thread may have won.
        let existing = inner
            .by_term
            .raw_entry()
            .from_hash(hash, |k| k == term)
            .map(|(_, &id)| id);
        if let Some(id) = existing {
            return id;
        }

        let id = TermId(inner.entries.len() as u64 + 1);
        inner.entries.push(DictEntry {
            term: term.clone(),
            refs: 0,
        });
        inner.by_term.insert(term.clone(), id);
        id
    }

    /// Look up a term's id without assigning one.
    pub fn lookup(&self, term: &Term) -> Option<TermId> {
        let inner = self.inner.read();
        let hash = Self::hash_term(&inner.by_term, term);
        inner
            .by_term
            .raw_entry()
            .from_hash(hash, |k| k == term)
            .map(|(_, &id)| id)
    }

    /// Resolve an id back to its term.
    ///
    /// Fails with `NotFound` for the default-graph sentinel and for ids
    /// never assigned by this dictionary; both indicate an internal
    /// inconsistency in the caller.
    pub fn resolve(&self, id: TermId) -> Result<Term> {
        if id.is_default_graph() {
            return Err(Error::not_found("term id 0 is the default-graph sentinel"));
        }
        let inner = self.inner.read();
        inner
            .entries
            .get(id.0 as usize - 1)
            .map(|e| e.term.clone())
            .ok_or_else(|| Error::not_found(format!("unknown term id {}", id)))
    }

    /// Increment the reference count for an id (index record now points
    /// at it). Unknown ids are ignored; the sentinel is never counted.
    pub fn retain(&self, id: TermId) {
        if id.is_default_graph() {
            return;
        }
        let mut inner = self.inner.write();
        if let Some(e) = inner.entries.get_mut(id.0 as usize - 1) {
            e.refs += 1;
        }
    }

    /// Decrement the reference count for an id (a referencing record was
    /// removed). Reclamation is deferred; the entry stays resolvable.
    pub fn release(&self, id: TermId) {
        if id.is_default_graph() {
            return;
        }
        let mut inner = self.inner.write();
        if let Some(e) = inner.entries.get_mut(id.0 as usize - 1) {
            e.refs = e.refs.saturating_sub(1);
        }
    }

    /// Current reference count for an id (0 for unknown ids).
    pub fn ref_count(&self, id: TermId) -> u64 {
        if id.is_default_graph() {
            return 0;
        }
        let inner = self.inner.read();
        inner
            .entries
            .get(id.0 as usize - 1)
            .map(|e| e.refs)
            .unwrap_or(0)
    }

    /// Number of assigned ids (including unreferenced ones).
    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    /// True when no ids have been assigned.
    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// Snapshot of all entries as (id, term, refs), in id order.
    ///
    /// Used by the persistence layer; entries with zero refs may be
    /// skipped there but must keep their id slot (ids are never reused),
    /// so the full list is returned here.
    pub fn entries(&self) -> Vec<(TermId, Term, u64)> {
        let inner = self.inner.read();
        inner
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (TermId(i as u64 + 1), e.term.clone(), e.refs))
            .collect()
    }

    /// Rebuild a dictionary from persisted (id, term, refs) entries.
    ///
    /// Entries must be dense and in id order starting at 1; anything
    /// else is a corrupt dictionary file.
    pub fn from_entries(entries: Vec<(TermId, Term, u64)>) -> Result<Self> {
        let mut inner = DictInner::default();
        for (expected, (id, term, refs)) in entries.into_iter().enumerate() {
            if id.0 != expected as u64 + 1 {
                return Err(Error::corrupt(format!(
                    "dictionary ids not dense: expected {}, found {}",
                    expected + 1,
                    id.0
                )));
            }
            inner.by_term.insert(term.clone(), id);
            inner.entries.push(DictEntry { term, refs });
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internalize_is_idempotent() {
        let dict = TermDict::new();
        let a = dict.internalize(&Term::iri("http://ex/a"));
        let b = dict.internalize(&Term::iri("http://ex/b"));
        let a2 = dict.internalize(&Term::iri("http://ex/a"));

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(dict.len(), 2);
    }

    #[test]
    fn test_resolve_roundtrip() {
        let dict = TermDict::new();
        let term = Term::lang_literal("bonjour", "fr");
        let id = dict.internalize(&term);
        assert_eq!(dict.resolve(id).unwrap(), term);
    }

    #[test]
    fn test_resolve_unknown_fails() {
        let dict = TermDict::new();
        assert!(dict.resolve(TermId(99)).is_err());
        assert!(dict.resolve(TermId::DEFAULT_GRAPH).is_err());
    }

    #[test]
    fn test_lookup_does_not_assign() {
        let dict = TermDict::new();
        assert!(dict.lookup(&Term::iri("http://ex/a")).is_none());
        assert_eq!(dict.len(), 0);

        let id = dict.internalize(&Term::iri("http://ex/a"));
        assert_eq!(dict.lookup(&Term::iri("http://ex/a")), Some(id));
    }

    #[test]
    fn test_ref_counting() {
        let dict = TermDict::new();
        let id = dict.internalize(&Term::iri("http://ex/a"));

        assert_eq!(dict.ref_count(id), 0);
        dict.retain(id);
        dict.retain(id);
        assert_eq!(dict.ref_count(id), 2);
        dict.release(id);
        assert_eq!(dict.ref_count(id), 1);
        dict.release(id);
        dict.release(id); // extra release saturates at zero
        assert_eq!(dict.ref_count(id), 0);

        // Entry stays resolvable after refs hit zero.
        assert!(dict.resolve(id).is_ok());
    }

    #[test]
    fn test_from_entries_roundtrip() {
        let dict = TermDict::new();
        let a = dict.internalize(&Term::iri("http://ex/a"));
        dict.internalize(&Term::literal("x"));
        dict.retain(a);

        let rebuilt = TermDict::from_entries(dict.entries()).unwrap();
        assert_eq!(rebuilt.len(), 2);
        assert_eq!(rebuilt.lookup(&Term::iri("http://ex/a")), Some(a));
        assert_eq!(rebuilt.ref_count(a), 1);
    }

    #[test]
    fn test_from_entries_rejects_gaps() {
        let entries = vec![
            (TermId(1), Term::iri("http://ex/a"), 0),
            (TermId(3), Term::iri("http://ex/b"), 0),
        ];
        assert!(TermDict::from_entries(entries).is_err());
    }
}
