//! RDF terms - the values stored in a quarry-db store
//!
//! A `Term` is one of:
//! - `Iri`: an absolute IRI
//! - `BlankNode`: a store-scoped anonymous node
//! - `Literal`: a lexical value with datatype and optional language tag
//! - `Triple`: a quoted (subject, predicate, object) triple (RDF-star)
//!
//! ## Ordering
//!
//! Terms use strict total ordering: kind rank first (BlankNode < Iri <
//! Literal < Triple), then content. This keeps sorted collections of
//! terms deterministic; it is not a semantic value ordering (the
//! expression layer does its own numeric comparison).
//!
//! ## Cheap clones
//!
//! All string content is `Arc<str>`, so cloning a term never copies
//! text. Two terms with identical content are interchangeable.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// The xsd:string datatype IRI, the default for plain literals.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
/// The rdf:langString datatype IRI, implied by a language tag.
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
/// The xsd:boolean datatype IRI.
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
/// The xsd:integer datatype IRI.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
/// The xsd:double datatype IRI.
pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";

/// Datatype IRIs treated as integer-valued by the expression layer.
const INTEGER_DATATYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#integer",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#short",
    "http://www.w3.org/2001/XMLSchema#byte",
    "http://www.w3.org/2001/XMLSchema#nonNegativeInteger",
    "http://www.w3.org/2001/XMLSchema#positiveInteger",
    "http://www.w3.org/2001/XMLSchema#nonPositiveInteger",
    "http://www.w3.org/2001/XMLSchema#negativeInteger",
    "http://www.w3.org/2001/XMLSchema#unsignedLong",
    "http://www.w3.org/2001/XMLSchema#unsignedInt",
    "http://www.w3.org/2001/XMLSchema#unsignedShort",
    "http://www.w3.org/2001/XMLSchema#unsignedByte",
];

/// Datatype IRIs treated as floating-point-valued by the expression layer.
const DECIMAL_DATATYPES: &[&str] = &[
    "http://www.w3.org/2001/XMLSchema#double",
    "http://www.w3.org/2001/XMLSchema#float",
    "http://www.w3.org/2001/XMLSchema#decimal",
];

/// A literal value: lexical form, datatype IRI, optional language tag.
///
/// A language-tagged literal always has datatype rdf:langString; a plain
/// literal has datatype xsd:string. Constructors enforce this.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    lexical: Arc<str>,
    datatype: Arc<str>,
    lang: Option<Arc<str>>,
}

impl Literal {
    /// The lexical form.
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// The datatype IRI.
    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    /// The language tag, if any.
    pub fn lang(&self) -> Option<&str> {
        self.lang.as_deref()
    }
}

/// A quoted triple (RDF-star). Subject/predicate/object are full terms;
/// the transaction layer enforces positional kind constraints when a
/// quoted triple is asserted.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TripleTerm {
    pub subject: Term,
    pub predicate: Term,
    pub object: Term,
}

/// An RDF term.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// Blank node with a store-scoped identifier.
    BlankNode(Arc<str>),
    /// Absolute IRI.
    Iri(Arc<str>),
    /// Literal value.
    Literal(Literal),
    /// Quoted triple (RDF-star).
    Triple(Arc<TripleTerm>),
}

impl Term {
    /// Create an IRI term.
    pub fn iri(value: impl AsRef<str>) -> Self {
        Term::Iri(Arc::from(value.as_ref()))
    }

    /// Create a blank node term.
    pub fn bnode(id: impl AsRef<str>) -> Self {
        Term::BlankNode(Arc::from(id.as_ref()))
    }

    /// Create a plain string literal (datatype xsd:string).
    pub fn literal(lexical: impl AsRef<str>) -> Self {
        Term::Literal(Literal {
            lexical: Arc::from(lexical.as_ref()),
            datatype: Arc::from(XSD_STRING),
            lang: None,
        })
    }

    /// Create a typed literal.
    pub fn typed_literal(lexical: impl AsRef<str>, datatype: impl AsRef<str>) -> Self {
        Term::Literal(Literal {
            lexical: Arc::from(lexical.as_ref()),
            datatype: Arc::from(datatype.as_ref()),
            lang: None,
        })
    }

    /// Create a language-tagged literal (datatype rdf:langString).
    pub fn lang_literal(lexical: impl AsRef<str>, lang: impl AsRef<str>) -> Self {
        Term::Literal(Literal {
            lexical: Arc::from(lexical.as_ref()),
            datatype: Arc::from(RDF_LANG_STRING),
            lang: Some(Arc::from(lang.as_ref())),
        })
    }

    /// Create an integer literal (datatype xsd:integer).
    pub fn integer(value: i64) -> Self {
        Term::typed_literal(value.to_string(), XSD_INTEGER)
    }

    /// Create a double literal (datatype xsd:double).
    pub fn double(value: f64) -> Self {
        Term::typed_literal(value.to_string(), XSD_DOUBLE)
    }

    /// Create a boolean literal (datatype xsd:boolean).
    pub fn boolean(value: bool) -> Self {
        Term::typed_literal(if value { "true" } else { "false" }, XSD_BOOLEAN)
    }

    /// Create a quoted-triple term.
    pub fn triple(subject: Term, predicate: Term, object: Term) -> Self {
        Term::Triple(Arc::new(TripleTerm {
            subject,
            predicate,
            object,
        }))
    }

    /// True for IRI terms.
    pub fn is_iri(&self) -> bool {
        matches!(self, Term::Iri(_))
    }

    /// True for blank node terms.
    pub fn is_bnode(&self) -> bool {
        matches!(self, Term::BlankNode(_))
    }

    /// True for literal terms.
    pub fn is_literal(&self) -> bool {
        matches!(self, Term::Literal(_))
    }

    /// True for resources: anything that may appear in subject or
    /// context position (IRI, blank node, or quoted triple).
    pub fn is_resource(&self) -> bool {
        matches!(self, Term::Iri(_) | Term::BlankNode(_) | Term::Triple(_))
    }

    /// The IRI string, for IRI terms.
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Term::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The literal, for literal terms.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Term::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Integer value, for literals with an integer datatype.
    pub fn as_i64(&self) -> Option<i64> {
        let lit = self.as_literal()?;
        if INTEGER_DATATYPES.contains(&lit.datatype()) {
            lit.lexical().parse().ok()
        } else {
            None
        }
    }

    /// Floating-point value, for literals with any numeric datatype.
    pub fn as_f64(&self) -> Option<f64> {
        let lit = self.as_literal()?;
        if INTEGER_DATATYPES.contains(&lit.datatype()) || DECIMAL_DATATYPES.contains(&lit.datatype())
        {
            lit.lexical().parse().ok()
        } else {
            None
        }
    }

    /// True if this is a literal with a numeric datatype.
    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    /// Boolean value, for xsd:boolean literals.
    pub fn as_bool(&self) -> Option<bool> {
        let lit = self.as_literal()?;
        if lit.datatype() != XSD_BOOLEAN {
            return None;
        }
        match lit.lexical() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Kind rank for cross-kind ordering.
    fn rank(&self) -> u8 {
        match self {
            Term::BlankNode(_) => 0,
            Term::Iri(_) => 1,
            Term::Literal(_) => 2,
            Term::Triple(_) => 3,
        }
    }
}

impl Ord for Term {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Term::BlankNode(a), Term::BlankNode(b)) => a.cmp(b),
            (Term::Iri(a), Term::Iri(b)) => a.cmp(b),
            (Term::Literal(a), Term::Literal(b)) => a.cmp(b),
            (Term::Triple(a), Term::Triple(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Term {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::BlankNode(id) => write!(f, "_:{}", id),
            Term::Iri(iri) => write!(f, "<{}>", iri),
            Term::Literal(lit) => {
                write!(f, "\"{}\"", lit.lexical())?;
                if let Some(lang) = lit.lang() {
                    write!(f, "@{}", lang)
                } else if lit.datatype() != XSD_STRING {
                    write!(f, "^^<{}>", lit.datatype())
                } else {
                    Ok(())
                }
            }
            Term::Triple(t) => write!(f, "<< {} {} {} >>", t.subject, t.predicate, t.object),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structural_equality() {
        assert_eq!(Term::iri("http://ex/a"), Term::iri("http://ex/a"));
        assert_ne!(Term::iri("http://ex/a"), Term::iri("http://ex/b"));
        assert_ne!(Term::iri("http://ex/a"), Term::literal("http://ex/a"));
        assert_eq!(Term::literal("x"), Term::literal("x"));
        assert_ne!(Term::literal("x"), Term::lang_literal("x", "en"));
    }

    #[test]
    fn test_kind_ordering() {
        let b = Term::bnode("b1");
        let i = Term::iri("http://ex/a");
        let l = Term::literal("a");
        let t = Term::triple(b.clone(), i.clone(), l.clone());

        assert!(b < i);
        assert!(i < l);
        assert!(l < t);
    }

    #[test]
    fn test_numeric_accessors() {
        assert_eq!(Term::integer(42).as_i64(), Some(42));
        assert_eq!(Term::integer(42).as_f64(), Some(42.0));
        assert_eq!(Term::double(1.5).as_f64(), Some(1.5));
        assert_eq!(Term::double(1.5).as_i64(), None);
        assert_eq!(Term::literal("42").as_i64(), None); // xsd:string
        assert!(Term::integer(7).is_numeric());
        assert!(!Term::literal("7").is_numeric());
    }

    #[test]
    fn test_bool_accessor() {
        assert_eq!(Term::boolean(true).as_bool(), Some(true));
        assert_eq!(Term::boolean(false).as_bool(), Some(false));
        assert_eq!(Term::literal("true").as_bool(), None);
    }

    #[test]
    fn test_resource_predicate() {
        assert!(Term::iri("http://ex/a").is_resource());
        assert!(Term::bnode("b").is_resource());
        assert!(!Term::literal("x").is_resource());
        assert!(Term::triple(
            Term::iri("http://ex/s"),
            Term::iri("http://ex/p"),
            Term::literal("o")
        )
        .is_resource());
    }

    #[test]
    fn test_lang_literal_datatype() {
        let lit = Term::lang_literal("chat", "fr");
        let l = lit.as_literal().unwrap();
        assert_eq!(l.datatype(), RDF_LANG_STRING);
        assert_eq!(l.lang(), Some("fr"));
    }

    #[test]
    fn test_display() {
        assert_eq!(Term::iri("http://ex/a").to_string(), "<http://ex/a>");
        assert_eq!(Term::bnode("b1").to_string(), "_:b1");
        assert_eq!(Term::literal("hi").to_string(), "\"hi\"");
        assert_eq!(Term::lang_literal("hi", "en").to_string(), "\"hi\"@en");
    }

    #[test]
    fn test_serde_roundtrip() {
        let terms = vec![
            Term::iri("http://ex/a"),
            Term::bnode("b"),
            Term::lang_literal("x", "en"),
            Term::integer(5),
            Term::triple(Term::bnode("s"), Term::iri("http://ex/p"), Term::literal("o")),
        ];
        for term in terms {
            let json = serde_json::to_string(&term).unwrap();
            let back: Term = serde_json::from_str(&json).unwrap();
            assert_eq!(back, term);
        }
    }
}
