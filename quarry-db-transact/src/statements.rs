//! Term-level statement iteration
//!
//! `StatementIter` wraps a record scan and resolves ids back to terms.
//! It carries the close contract outward: close explicitly (idempotent)
//! or drain fully; an iterator dropped while still open is force-closed
//! by the drop safety net with a logged warning. The safety net exists
//! for leak mitigation only - correct callers never rely on it.

use quarry_db_core::{Record, Result, Statement, TermDict};
use quarry_db_index::RecordIter;
use std::sync::Arc;
use tracing::warn;

/// Lazy sequence of statements with an explicit close contract.
pub struct StatementIter {
    /// `None` once released (explicitly, by exhaustion, or terminally
    /// by a resolution error).
    inner: Option<Box<dyn RecordIter>>,
    dict: Arc<TermDict>,
}

impl StatementIter {
    pub(crate) fn new(inner: Box<dyn RecordIter>, dict: Arc<TermDict>) -> Self {
        Self {
            inner: Some(inner),
            dict,
        }
    }

    /// An iterator over nothing (used when a pattern term is unknown to
    /// the dictionary and thus cannot match).
    pub(crate) fn empty(dict: Arc<TermDict>) -> Self {
        Self { inner: None, dict }
    }

    /// Release the underlying scan. Idempotent.
    pub fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.close();
        }
    }

    fn resolve(&self, record: &Record) -> Result<Statement> {
        let context = if record.g.is_default_graph() {
            None
        } else {
            Some(self.dict.resolve(record.g)?)
        };
        Ok(Statement {
            subject: self.dict.resolve(record.s)?,
            predicate: self.dict.resolve(record.p)?,
            object: self.dict.resolve(record.o)?,
            context,
        })
    }
}

impl Iterator for StatementIter {
    type Item = Result<Statement>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.inner.as_mut()?.next() {
            Some(record) => record,
            None => {
                self.close();
                return None;
            }
        };
        match self.resolve(&record) {
            Ok(statement) => Some(Ok(statement)),
            Err(e) => {
                // Unknown id inside a stored record: internal
                // inconsistency, terminal for this sequence.
                self.close();
                Some(Err(e))
            }
        }
    }
}

impl Drop for StatementIter {
    fn drop(&mut self) {
        if self.inner.is_some() {
            warn!("statement iterator dropped without close; forcing close");
            self.close();
        }
    }
}
