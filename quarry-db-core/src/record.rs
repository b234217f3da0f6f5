//! Statement records and patterns
//!
//! Two levels of representation:
//! - `Statement`: term-level quad, the unit exchanged with parsers and
//!   result consumers
//! - `Record`: id-level quad plus the inferred bit, the unit stored in
//!   the indexes
//!
//! `RecordPattern` is an id-level match template with an optional id per
//! position; `None` matches anything in that position.

use crate::ids::TermId;
use crate::term::Term;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A term-level statement: subject, predicate, object, optional context.
///
/// `context: None` means the default graph.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
    pub context: Option<Term>,
}

impl Statement {
    /// Create a statement in the default graph.
    pub fn new(subject: Term, predicate: Term, object: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: None,
        }
    }

    /// Create a statement in a named graph.
    pub fn with_context(subject: Term, predicate: Term, object: Term, context: Term) -> Self {
        Self {
            subject,
            predicate,
            object,
            context: Some(context),
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(ctx) = &self.context {
            write!(f, " {}", ctx)?;
        }
        write!(f, ")")
    }
}

/// An id-level index record.
///
/// `g` is `TermId::DEFAULT_GRAPH` for default-graph statements. The
/// `inferred` bit separates derived data from asserted data; the two
/// coexist as distinct records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Record {
    pub s: TermId,
    pub p: TermId,
    pub o: TermId,
    pub g: TermId,
    pub inferred: bool,
}

impl Record {
    /// Create an asserted record.
    pub fn new(s: TermId, p: TermId, o: TermId, g: TermId) -> Self {
        Self {
            s,
            p,
            o,
            g,
            inferred: false,
        }
    }

    /// Create an inferred record.
    pub fn inferred(s: TermId, p: TermId, o: TermId, g: TermId) -> Self {
        Self {
            s,
            p,
            o,
            g,
            inferred: true,
        }
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = if self.inferred { "~" } else { "" };
        write!(f, "[{}{} {} {} {}]", tag, self.s, self.p, self.o, self.g)
    }
}

/// Id-level match template. `None` positions match any id; `inferred:
/// None` matches both asserted and inferred records.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordPattern {
    pub s: Option<TermId>,
    pub p: Option<TermId>,
    pub o: Option<TermId>,
    pub g: Option<TermId>,
    pub inferred: Option<bool>,
}

impl RecordPattern {
    /// Pattern matching every record.
    pub fn any() -> Self {
        Self::default()
    }

    /// Builder-style subject bound.
    pub fn with_s(mut self, s: TermId) -> Self {
        self.s = Some(s);
        self
    }

    /// Builder-style predicate bound.
    pub fn with_p(mut self, p: TermId) -> Self {
        self.p = Some(p);
        self
    }

    /// Builder-style object bound.
    pub fn with_o(mut self, o: TermId) -> Self {
        self.o = Some(o);
        self
    }

    /// Builder-style context bound.
    pub fn with_g(mut self, g: TermId) -> Self {
        self.g = Some(g);
        self
    }

    /// Builder-style inferred filter.
    pub fn with_inferred(mut self, inferred: bool) -> Self {
        self.inferred = Some(inferred);
        self
    }

    /// Pattern exactly matching one record (including its inferred bit).
    pub fn exact(record: &Record) -> Self {
        Self {
            s: Some(record.s),
            p: Some(record.p),
            o: Some(record.o),
            g: Some(record.g),
            inferred: Some(record.inferred),
        }
    }

    /// True if the record matches every bound position.
    pub fn matches(&self, record: &Record) -> bool {
        self.s.map_or(true, |s| s == record.s)
            && self.p.map_or(true, |p| p == record.p)
            && self.o.map_or(true, |o| o == record.o)
            && self.g.map_or(true, |g| g == record.g)
            && self.inferred.map_or(true, |i| i == record.inferred)
    }

    /// Number of bound id positions (not counting the inferred filter).
    pub fn bound_count(&self) -> usize {
        [
            self.s.is_some(),
            self.p.is_some(),
            self.o.is_some(),
            self.g.is_some(),
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }

    /// True when all four id positions are bound.
    pub fn is_fully_bound(&self) -> bool {
        self.bound_count() == 4
    }

    /// True when a pattern `tighter` binds at least every position this
    /// pattern binds, to the same values.
    pub fn subsumes(&self, tighter: &RecordPattern) -> bool {
        fn pos(loose: Option<TermId>, tight: Option<TermId>) -> bool {
            match (loose, tight) {
                (None, _) => true,
                (Some(a), Some(b)) => a == b,
                (Some(_), None) => false,
            }
        }
        pos(self.s, tighter.s)
            && pos(self.p, tighter.p)
            && pos(self.o, tighter.o)
            && pos(self.g, tighter.g)
    }
}

impl fmt::Display for RecordPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn pos(f: &mut fmt::Formatter<'_>, v: Option<TermId>) -> fmt::Result {
            match v {
                Some(id) => write!(f, " {}", id),
                None => write!(f, " ?"),
            }
        }
        write!(f, "(")?;
        pos(f, self.s)?;
        pos(f, self.p)?;
        pos(f, self.o)?;
        pos(f, self.g)?;
        write!(f, " )")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(s: u64, p: u64, o: u64, g: u64) -> Record {
        Record::new(TermId(s), TermId(p), TermId(o), TermId(g))
    }

    #[test]
    fn test_pattern_matches() {
        let r = record(1, 2, 3, 0);

        assert!(RecordPattern::any().matches(&r));
        assert!(RecordPattern::any().with_s(TermId(1)).matches(&r));
        assert!(!RecordPattern::any().with_s(TermId(9)).matches(&r));
        assert!(RecordPattern::any()
            .with_p(TermId(2))
            .with_o(TermId(3))
            .matches(&r));
        assert!(RecordPattern::exact(&r).matches(&r));
    }

    #[test]
    fn test_inferred_filter() {
        let asserted = record(1, 2, 3, 0);
        let derived = Record::inferred(TermId(1), TermId(2), TermId(3), TermId(0));

        let both = RecordPattern::any();
        assert!(both.matches(&asserted));
        assert!(both.matches(&derived));

        let only_asserted = RecordPattern::any().with_inferred(false);
        assert!(only_asserted.matches(&asserted));
        assert!(!only_asserted.matches(&derived));
    }

    #[test]
    fn test_bound_count() {
        assert_eq!(RecordPattern::any().bound_count(), 0);
        assert_eq!(RecordPattern::any().with_s(TermId(1)).bound_count(), 1);
        assert!(RecordPattern::exact(&record(1, 2, 3, 4)).is_fully_bound());
    }

    #[test]
    fn test_subsumes() {
        let loose = RecordPattern::any().with_p(TermId(2));
        let tight = RecordPattern::any().with_p(TermId(2)).with_s(TermId(1));

        assert!(loose.subsumes(&tight));
        assert!(loose.subsumes(&loose));
        assert!(!tight.subsumes(&loose));
        assert!(!loose.subsumes(&RecordPattern::any().with_p(TermId(3))));
    }
}
