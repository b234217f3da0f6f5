//! Index orderings for records
//!
//! quarry-db keeps 4 permutation orderings so any bound prefix of a
//! pattern becomes a single range seek:
//!
//! | Order | Permutation | Use case |
//! |-------|-------------|----------|
//! | SPOG  | s, p, o, g  | Subject lookups |
//! | POSG  | p, o, s, g  | Predicate and predicate-value lookups |
//! | OSPG  | o, s, p, g  | Reverse (object) traversal |
//! | GSPO  | g, s, p, o  | Per-graph scans |
//!
//! ## Strict Total Ordering
//!
//! Comparators compare the four id positions in permutation order, then
//! the inferred bit. No wildcard handling here; range bounds are built
//! with explicit min/max fill.

use crate::record::{Record, RecordPattern};
use std::cmp::Ordering;
use std::fmt;

/// A quad position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Position {
    Subject,
    Predicate,
    Object,
    Graph,
}

/// Index ordering enumeration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexOrder {
    /// Subject-Predicate-Object-Graph
    Spog,
    /// Predicate-Object-Subject-Graph
    Posg,
    /// Object-Subject-Predicate-Graph
    Ospg,
    /// Graph-Subject-Predicate-Object
    Gspo,
}

impl IndexOrder {
    /// All orderings, in fixed priority order (ties in index selection
    /// resolve to the earliest).
    pub fn all() -> &'static [IndexOrder] {
        &[
            IndexOrder::Spog,
            IndexOrder::Posg,
            IndexOrder::Ospg,
            IndexOrder::Gspo,
        ]
    }

    /// The position permutation of this ordering.
    pub fn positions(&self) -> [Position; 4] {
        use Position::*;
        match self {
            IndexOrder::Spog => [Subject, Predicate, Object, Graph],
            IndexOrder::Posg => [Predicate, Object, Subject, Graph],
            IndexOrder::Ospg => [Object, Subject, Predicate, Graph],
            IndexOrder::Gspo => [Graph, Subject, Predicate, Object],
        }
    }

    /// The record's ids in this ordering's permutation.
    pub fn key(&self, record: &Record) -> [u64; 4] {
        let mut key = [0u64; 4];
        for (slot, pos) in key.iter_mut().zip(self.positions()) {
            *slot = position_id(record, pos);
        }
        key
    }

    /// Compare two records under this ordering (ids in permutation
    /// order, then the inferred bit).
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        self.key(a)
            .cmp(&self.key(b))
            .then_with(|| a.inferred.cmp(&b.inferred))
    }

    /// Length of the pattern's bound prefix under this ordering.
    pub fn bound_prefix_len(&self, pattern: &RecordPattern) -> usize {
        self.positions()
            .iter()
            .take_while(|pos| pattern_id(pattern, **pos).is_some())
            .count()
    }

    /// Inclusive lower / exclusive-upper key bounds for the pattern's
    /// bound prefix under this ordering. Records whose permuted key is
    /// in `[lo, hi]` share the bound prefix (hi is inclusive, built with
    /// max fill).
    pub fn prefix_bounds(&self, pattern: &RecordPattern) -> ([u64; 4], [u64; 4]) {
        let mut lo = [u64::MIN; 4];
        let mut hi = [u64::MAX; 4];
        for (i, pos) in self.positions().iter().enumerate() {
            match pattern_id(pattern, *pos) {
                Some(id) => {
                    lo[i] = id.raw();
                    hi[i] = id.raw();
                }
                None => break,
            }
        }
        (lo, hi)
    }

    /// Select the ordering with the longest bound prefix for a pattern.
    ///
    /// Ties resolve by the fixed priority of [`IndexOrder::all`], which
    /// keeps index selection deterministic. `object_resource` is an
    /// advisory optimizer hint: when the object position is a variable
    /// known to bind only resources, OSPG wins the nothing-bound tie so
    /// reverse traversal lands on the object-first index.
    pub fn for_pattern(pattern: &RecordPattern, object_resource: bool) -> IndexOrder {
        let mut best = IndexOrder::Spog;
        let mut best_len = best.bound_prefix_len(pattern);
        for order in Self::all().iter().skip(1) {
            let len = order.bound_prefix_len(pattern);
            if len > best_len {
                best = *order;
                best_len = len;
            }
        }
        // Hint: object bound alone already selects OSPG via prefix
        // length; the hint only matters when nothing is bound yet but
        // the scan will be re-seeded with a resource object.
        if best_len == 0 && object_resource {
            return IndexOrder::Ospg;
        }
        best
    }

    /// Short name of this ordering (used for index file names).
    pub fn name(&self) -> &'static str {
        match self {
            IndexOrder::Spog => "spog",
            IndexOrder::Posg => "posg",
            IndexOrder::Ospg => "ospg",
            IndexOrder::Gspo => "gspo",
        }
    }
}

impl fmt::Display for IndexOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for IndexOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spog" => Ok(IndexOrder::Spog),
            "posg" => Ok(IndexOrder::Posg),
            "ospg" => Ok(IndexOrder::Ospg),
            "gspo" => Ok(IndexOrder::Gspo),
            _ => Err(format!("Unknown index order: {}", s)),
        }
    }
}

fn position_id(record: &Record, pos: Position) -> u64 {
    match pos {
        Position::Subject => record.s.raw(),
        Position::Predicate => record.p.raw(),
        Position::Object => record.o.raw(),
        Position::Graph => record.g.raw(),
    }
}

fn pattern_id(pattern: &RecordPattern, pos: Position) -> Option<crate::ids::TermId> {
    match pos {
        Position::Subject => pattern.s,
        Position::Predicate => pattern.p,
        Position::Object => pattern.o,
        Position::Graph => pattern.g,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::TermId;

    fn record(s: u64, p: u64, o: u64, g: u64) -> Record {
        Record::new(TermId(s), TermId(p), TermId(o), TermId(g))
    }

    #[test]
    fn test_spog_ordering() {
        let order = IndexOrder::Spog;
        assert_eq!(order.compare(&record(1, 1, 1, 0), &record(2, 1, 1, 0)), Ordering::Less);
        assert_eq!(order.compare(&record(1, 1, 1, 0), &record(1, 2, 1, 0)), Ordering::Less);
        assert_eq!(order.compare(&record(1, 1, 1, 0), &record(1, 1, 2, 0)), Ordering::Less);
        assert_eq!(order.compare(&record(1, 1, 1, 0), &record(1, 1, 1, 1)), Ordering::Less);
        assert_eq!(order.compare(&record(1, 1, 1, 0), &record(1, 1, 1, 0)), Ordering::Equal);
    }

    #[test]
    fn test_posg_key_permutes() {
        let r = record(1, 2, 3, 4);
        assert_eq!(IndexOrder::Spog.key(&r), [1, 2, 3, 4]);
        assert_eq!(IndexOrder::Posg.key(&r), [2, 3, 1, 4]);
        assert_eq!(IndexOrder::Ospg.key(&r), [3, 1, 2, 4]);
        assert_eq!(IndexOrder::Gspo.key(&r), [4, 1, 2, 3]);
    }

    #[test]
    fn test_inferred_breaks_ties() {
        let asserted = record(1, 1, 1, 0);
        let derived = Record::inferred(TermId(1), TermId(1), TermId(1), TermId(0));
        assert_eq!(IndexOrder::Spog.compare(&asserted, &derived), Ordering::Less);
    }

    #[test]
    fn test_bound_prefix_len() {
        let p = RecordPattern::any().with_p(TermId(2)).with_o(TermId(3));
        assert_eq!(IndexOrder::Spog.bound_prefix_len(&p), 0);
        assert_eq!(IndexOrder::Posg.bound_prefix_len(&p), 2);
        assert_eq!(IndexOrder::Ospg.bound_prefix_len(&p), 1);
    }

    #[test]
    fn test_for_pattern_longest_prefix_wins() {
        // Subject bound -> SPOG
        let p = RecordPattern::any().with_s(TermId(1));
        assert_eq!(IndexOrder::for_pattern(&p, false), IndexOrder::Spog);

        // Predicate + object -> POSG (prefix 2 beats SPOG's 0)
        let p = RecordPattern::any().with_p(TermId(2)).with_o(TermId(3));
        assert_eq!(IndexOrder::for_pattern(&p, false), IndexOrder::Posg);

        // Object only -> OSPG
        let p = RecordPattern::any().with_o(TermId(3));
        assert_eq!(IndexOrder::for_pattern(&p, false), IndexOrder::Ospg);

        // Graph only -> GSPO
        let p = RecordPattern::any().with_g(TermId(7));
        assert_eq!(IndexOrder::for_pattern(&p, false), IndexOrder::Gspo);

        // Nothing bound -> SPOG by priority
        assert_eq!(
            IndexOrder::for_pattern(&RecordPattern::any(), false),
            IndexOrder::Spog
        );

        // Nothing bound but object known to be a resource -> OSPG hint
        assert_eq!(
            IndexOrder::for_pattern(&RecordPattern::any(), true),
            IndexOrder::Ospg
        );
    }

    #[test]
    fn test_prefix_bounds() {
        let p = RecordPattern::any().with_p(TermId(2));
        let (lo, hi) = IndexOrder::Posg.prefix_bounds(&p);
        assert_eq!(lo, [2, u64::MIN, u64::MIN, u64::MIN]);
        assert_eq!(hi, [2, u64::MAX, u64::MAX, u64::MAX]);
    }

    #[test]
    fn test_from_str() {
        assert_eq!("spog".parse::<IndexOrder>().unwrap(), IndexOrder::Spog);
        assert_eq!("GSPO".parse::<IndexOrder>().unwrap(), IndexOrder::Gspo);
        assert!("xyz".parse::<IndexOrder>().is_err());
    }
}
