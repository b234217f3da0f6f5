//! Connections and the transaction state machine
//!
//! A `Connection` is INACTIVE until `begin(level)` and returns to
//! INACTIVE through `commit` or `rollback`; any other use of the state
//! machine is an `IllegalState` error (programmer error, fails fast).
//!
//! Mutations stage id-level records in the connection; nothing touches
//! the shared store until commit, which applies the staging atomically
//! behind the store's commit mutex. Reads are valid in any state and go
//! through a `StoreView` chosen by the isolation level:
//! - NONE / READ_COMMITTED: the latest committed snapshot at each read
//! - SNAPSHOT / SERIALIZABLE: the snapshot pinned at begin
//! All views overlay the connection's own staged writes.

use crate::listener::ChangeEvent;
use crate::statements::StatementIter;
use crate::store::Store;
use crate::view::StoreView;
use crate::IsolationLevel;
use parking_lot::Mutex;
use quarry_db_core::{
    Error, Record, RecordPattern, Result, Statement, Term, TermId,
};
use quarry_db_index::{RecordSource, Snapshot};
use quarry_db_query::{Algebra, EvalContext, QueryResults, VarId, VarRegistry};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Graph selector for statement-level reads and removals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GraphFilter<'a> {
    /// Match every graph (default and named).
    Any,
    /// Match only the default graph.
    Default,
    /// Match one named graph.
    Named(&'a Term),
}

struct ActiveTxn {
    level: IsolationLevel,
    begin: Arc<Snapshot>,
    /// Staged adds in operation order (events preserve it too).
    adds_ordered: Vec<Record>,
    add_set: FxHashSet<Record>,
    removes: FxHashSet<Record>,
    events: Vec<ChangeEvent>,
    /// Read patterns recorded under SERIALIZABLE.
    reads: Arc<Mutex<Vec<RecordPattern>>>,
}

enum TxnState {
    Inactive,
    Active(ActiveTxn),
}

/// A store connection with an embedded transaction state machine.
pub struct Connection {
    store: Store,
    state: TxnState,
}

impl Connection {
    pub(crate) fn new(store: Store) -> Self {
        Self {
            store,
            state: TxnState::Inactive,
        }
    }

    /// True while a transaction is active.
    pub fn is_active(&self) -> bool {
        matches!(self.state, TxnState::Active(_))
    }

    // === State machine ===

    /// Start a transaction at the given isolation level.
    pub fn begin(&mut self, level: IsolationLevel) -> Result<()> {
        if self.is_active() {
            return Err(Error::illegal_state("transaction already active"));
        }
        self.state = TxnState::Active(ActiveTxn {
            level,
            begin: self.store.head(),
            adds_ordered: Vec::new(),
            add_set: FxHashSet::default(),
            removes: FxHashSet::default(),
            events: Vec::new(),
            reads: Arc::new(Mutex::new(Vec::new())),
        });
        Ok(())
    }

    /// Commit the active transaction atomically. On any failure
    /// (including a serialization conflict) the staged writes are
    /// discarded and the store is left exactly as before.
    pub fn commit(&mut self) -> Result<()> {
        let txn = match std::mem::replace(&mut self.state, TxnState::Inactive) {
            TxnState::Active(txn) => txn,
            TxnState::Inactive => {
                return Err(Error::illegal_state("commit without active transaction"))
            }
        };
        let reads = txn.reads.lock().clone();
        self.store.apply_commit(
            txn.level,
            &txn.begin,
            &txn.add_set,
            &txn.adds_ordered,
            &txn.removes,
            &reads,
            txn.events,
        )
    }

    /// Discard the active transaction's staged writes.
    pub fn rollback(&mut self) -> Result<()> {
        match std::mem::replace(&mut self.state, TxnState::Inactive) {
            TxnState::Active(_) => Ok(()),
            TxnState::Inactive => Err(Error::illegal_state("rollback without active transaction")),
        }
    }

    // === Mutations (ACTIVE only) ===

    /// Stage an asserted statement. Returns false when the statement
    /// is already present in this transaction's view (the add is a
    /// no-op for contents, though listeners still observe it).
    pub fn add_statement(&mut self, statement: &Statement) -> Result<bool> {
        self.stage_add(statement, false)
    }

    /// Stage an inferred (derived) statement.
    pub fn add_inferred_statement(&mut self, statement: &Statement) -> Result<bool> {
        self.stage_add(statement, true)
    }

    fn stage_add(&mut self, statement: &Statement, inferred: bool) -> Result<bool> {
        if !self.is_active() {
            return Err(Error::illegal_state("mutation without active transaction"));
        }
        validate_statement(statement)?;
        let record = self.internalize(statement, inferred);
        let base = match &self.state {
            TxnState::Active(txn) if txn.level.uses_fixed_snapshot() => txn.begin.clone(),
            _ => self.store.head(),
        };
        let txn = self.active_mut()?;
        let was_present =
            (base.contains(&record) || txn.add_set.contains(&record)) && !txn.removes.contains(&record);
        txn.removes.remove(&record);
        if txn.add_set.insert(record) {
            txn.adds_ordered.push(record);
        }
        // Re-adds are no-ops for contents but still observable events.
        txn.events.push(ChangeEvent::Added(statement.clone()));
        Ok(!was_present)
    }

    /// Stage removal of every statement matching the pattern, resolved
    /// against this transaction's current view. Returns the count.
    pub fn remove_statements(
        &mut self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph: GraphFilter<'_>,
        inferred: Option<bool>,
    ) -> Result<usize> {
        if !self.is_active() {
            return Err(Error::illegal_state("mutation without active transaction"));
        }
        let matches = self.collect_matching(subject, predicate, object, graph, inferred)?;

        let dict = self.store.inner.dict.clone();
        let txn = self.active_mut()?;
        let mut removed = 0usize;
        for record in matches {
            txn.add_set.remove(&record);
            txn.adds_ordered.retain(|r| *r != record);
            if txn.removes.insert(record) {
                removed += 1;
            }
            let statement = resolve_statement(&dict, &record)?;
            txn.events.push(ChangeEvent::Removed(statement));
        }
        Ok(removed)
    }

    /// Stage removal of every statement in the selected graph(s)
    /// (asserted and inferred). Returns the count.
    pub fn clear(&mut self, graph: GraphFilter<'_>) -> Result<usize> {
        self.remove_statements(None, None, None, graph, None)
    }

    // === Reads (any state) ===

    /// Lazy statement sequence for a pattern. Bound terms unknown to
    /// the dictionary yield an empty sequence.
    pub fn statements(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph: GraphFilter<'_>,
        include_inferred: bool,
    ) -> Result<StatementIter> {
        let dict = self.store.inner.dict.clone();
        let Some(mut pattern) = self.term_pattern(subject, predicate, object, graph)? else {
            return Ok(StatementIter::empty(dict));
        };
        if !include_inferred {
            pattern.inferred = Some(false);
        }
        let view = self.view();
        Ok(StatementIter::new(view.scan(pattern, false), dict))
    }

    /// Count of asserted statements in the selected graph(s).
    pub fn size(&self, graph: GraphFilter<'_>) -> Result<u64> {
        let Some(mut pattern) = self.term_pattern(None, None, None, graph)? else {
            return Ok(0);
        };
        pattern.inferred = Some(false);
        let view = self.view();
        let mut scan = view.scan(pattern, false);
        let mut count = 0u64;
        for _ in scan.by_ref() {
            count += 1;
        }
        Ok(count)
    }

    /// Distinct named-graph terms present in this connection's view.
    pub fn context_ids(&self) -> Result<Vec<Term>> {
        let view = self.view();
        let mut ids: FxHashSet<TermId> = FxHashSet::default();
        let mut scan = view.scan(RecordPattern::any(), false);
        for record in scan.by_ref() {
            if !record.g.is_default_graph() {
                ids.insert(record.g);
            }
        }
        let mut contexts = Vec::with_capacity(ids.len());
        for id in ids {
            contexts.push(self.store.inner.dict.resolve(id)?);
        }
        contexts.sort();
        Ok(contexts)
    }

    /// Evaluate an algebra tree against this connection's view.
    ///
    /// The optimizer runs first; under SERIALIZABLE every index scan
    /// the query performs is recorded for commit-time validation.
    pub fn evaluate(
        &self,
        algebra: &Algebra,
        registry: &VarRegistry,
        initial: &[(VarId, Term)],
        include_inferred: bool,
    ) -> quarry_db_query::Result<QueryResults> {
        let ctx = EvalContext::new(Arc::new(self.view()), self.store.inner.dict.clone())
            .with_inferred(include_inferred);
        quarry_db_query::evaluate(algebra, registry, initial, ctx)
    }

    // === Internals ===

    fn active_mut(&mut self) -> Result<&mut ActiveTxn> {
        match &mut self.state {
            TxnState::Active(txn) => Ok(txn),
            TxnState::Inactive => Err(Error::illegal_state("mutation without active transaction")),
        }
    }

    /// The view the current state reads through.
    fn view(&self) -> StoreView {
        match &self.state {
            TxnState::Inactive => {
                StoreView::of_snapshot(self.store.head(), self.store.inner.tracker.clone())
            }
            TxnState::Active(txn) => {
                let base = if txn.level.uses_fixed_snapshot() {
                    txn.begin.clone()
                } else {
                    self.store.head()
                };
                let reads = txn
                    .level
                    .validates_serializability()
                    .then(|| txn.reads.clone());
                StoreView::new(
                    base,
                    Arc::new(txn.adds_ordered.clone()),
                    Arc::new(txn.removes.clone()),
                    self.store.inner.tracker.clone(),
                    reads,
                )
            }
        }
    }

    fn internalize(&self, statement: &Statement, inferred: bool) -> Record {
        let dict = &self.store.inner.dict;
        Record {
            s: dict.internalize(&statement.subject),
            p: dict.internalize(&statement.predicate),
            o: dict.internalize(&statement.object),
            g: statement
                .context
                .as_ref()
                .map(|c| dict.internalize(c))
                .unwrap_or(TermId::DEFAULT_GRAPH),
            inferred,
        }
    }

    /// Translate a term-level pattern to ids; `None` when a bound term
    /// is unknown to the dictionary (nothing can match).
    fn term_pattern(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph: GraphFilter<'_>,
    ) -> Result<Option<RecordPattern>> {
        let dict = &self.store.inner.dict;
        let mut pattern = RecordPattern::any();
        for (term, slot) in [
            (subject, &mut pattern.s),
            (predicate, &mut pattern.p),
            (object, &mut pattern.o),
        ] {
            if let Some(term) = term {
                match dict.lookup(term) {
                    Some(id) => *slot = Some(id),
                    None => return Ok(None),
                }
            }
        }
        match graph {
            GraphFilter::Any => {}
            GraphFilter::Default => pattern.g = Some(TermId::DEFAULT_GRAPH),
            GraphFilter::Named(term) => match dict.lookup(term) {
                Some(id) => pattern.g = Some(id),
                None => return Ok(None),
            },
        }
        Ok(Some(pattern))
    }

    fn collect_matching(
        &self,
        subject: Option<&Term>,
        predicate: Option<&Term>,
        object: Option<&Term>,
        graph: GraphFilter<'_>,
        inferred: Option<bool>,
    ) -> Result<Vec<Record>> {
        let Some(mut pattern) = self.term_pattern(subject, predicate, object, graph)? else {
            return Ok(Vec::new());
        };
        pattern.inferred = inferred;
        let view = self.view();
        let mut scan = view.scan(pattern, false);
        let mut out = Vec::new();
        for record in scan.by_ref() {
            out.push(record);
        }
        Ok(out)
    }
}

fn validate_statement(statement: &Statement) -> Result<()> {
    if !statement.subject.is_resource() {
        return Err(Error::invalid_statement(format!(
            "subject must be a resource, got {}",
            statement.subject
        )));
    }
    if !statement.predicate.is_iri() {
        return Err(Error::invalid_statement(format!(
            "predicate must be an IRI, got {}",
            statement.predicate
        )));
    }
    if let Some(context) = &statement.context {
        if !context.is_resource() {
            return Err(Error::invalid_statement(format!(
                "context must be a resource, got {}",
                context
            )));
        }
    }
    Ok(())
}

fn resolve_statement(dict: &quarry_db_core::TermDict, record: &Record) -> Result<Statement> {
    let context = if record.g.is_default_graph() {
        None
    } else {
        Some(dict.resolve(record.g)?)
    };
    Ok(Statement {
        subject: dict.resolve(record.s)?,
        predicate: dict.resolve(record.p)?,
        object: dict.resolve(record.o)?,
        context,
    })
}
