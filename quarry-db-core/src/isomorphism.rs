//! Model-level graph isomorphism
//!
//! Two statement sets are isomorphic when a bijection between their
//! blank nodes makes them equal as sets. Ground statements (no blank
//! nodes) must match exactly; the rest are matched by backtracking over
//! candidate pairings, extending a partial blank-node mapping.
//!
//! Statements are treated as sets: duplicates are collapsed before
//! comparison.

use crate::record::Statement;
use crate::term::Term;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Check whether two statement collections are graph-isomorphic.
pub fn isomorphic(a: &[Statement], b: &[Statement]) -> bool {
    let a: FxHashSet<&Statement> = a.iter().collect();
    let b: FxHashSet<&Statement> = b.iter().collect();
    if a.len() != b.len() {
        return false;
    }

    let (ground_a, open_a): (Vec<_>, Vec<_>) = a.into_iter().partition(|s| is_ground(s));
    let (ground_b, open_b): (Vec<_>, Vec<_>) = b.into_iter().partition(|s| is_ground(s));

    if ground_a.len() != ground_b.len() || open_a.len() != open_b.len() {
        return false;
    }

    let ground_b: FxHashSet<&&Statement> = ground_b.iter().collect();
    if !ground_a.iter().all(|s| ground_b.contains(&s)) {
        return false;
    }

    let mut mapping = FxHashMap::default();
    let mut used: FxHashSet<usize> = FxHashSet::default();
    match_remaining(&open_a, &open_b, 0, &mut mapping, &mut used)
}

fn is_ground(statement: &Statement) -> bool {
    term_is_ground(&statement.subject)
        && term_is_ground(&statement.predicate)
        && term_is_ground(&statement.object)
        && statement.context.as_ref().map_or(true, term_is_ground)
}

fn term_is_ground(term: &Term) -> bool {
    match term {
        Term::BlankNode(_) => false,
        Term::Iri(_) | Term::Literal(_) => true,
        Term::Triple(t) => {
            term_is_ground(&t.subject) && term_is_ground(&t.predicate) && term_is_ground(&t.object)
        }
    }
}

fn match_remaining(
    open_a: &[&Statement],
    open_b: &[&Statement],
    next: usize,
    mapping: &mut FxHashMap<Arc<str>, Arc<str>>,
    used: &mut FxHashSet<usize>,
) -> bool {
    let Some(candidate) = open_a.get(next) else {
        return true;
    };

    for (i, target) in open_b.iter().enumerate() {
        if used.contains(&i) {
            continue;
        }
        let mut added: Vec<(Arc<str>, Arc<str>)> = Vec::new();
        if statements_match(candidate, target, mapping, &mut added) {
            used.insert(i);
            if match_remaining(open_a, open_b, next + 1, mapping, used) {
                return true;
            }
            used.remove(&i);
        }
        // Undo tentative mapping extensions from this candidate.
        for (key, _) in added {
            mapping.remove(&key);
        }
    }
    false
}

fn statements_match(
    a: &Statement,
    b: &Statement,
    mapping: &mut FxHashMap<Arc<str>, Arc<str>>,
    added: &mut Vec<(Arc<str>, Arc<str>)>,
) -> bool {
    terms_match(&a.subject, &b.subject, mapping, added)
        && terms_match(&a.predicate, &b.predicate, mapping, added)
        && terms_match(&a.object, &b.object, mapping, added)
        && match (&a.context, &b.context) {
            (None, None) => true,
            (Some(x), Some(y)) => terms_match(x, y, mapping, added),
            _ => false,
        }
}

fn terms_match(
    a: &Term,
    b: &Term,
    mapping: &mut FxHashMap<Arc<str>, Arc<str>>,
    added: &mut Vec<(Arc<str>, Arc<str>)>,
) -> bool {
    match (a, b) {
        (Term::BlankNode(x), Term::BlankNode(y)) => {
            if let Some(mapped) = mapping.get(x) {
                return mapped == y;
            }
            // Mapping must stay injective.
            if mapping.values().any(|v| v == y) {
                return false;
            }
            mapping.insert(x.clone(), y.clone());
            added.push((x.clone(), y.clone()));
            true
        }
        (Term::Triple(x), Term::Triple(y)) => {
            terms_match(&x.subject, &y.subject, mapping, added)
                && terms_match(&x.predicate, &y.predicate, mapping, added)
                && terms_match(&x.object, &y.object, mapping, added)
        }
        _ => a == b,
    }
}
