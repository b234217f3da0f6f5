//! # quarry-db Core
//!
//! Data-model leaf crate for quarry-db.
//!
//! This crate provides:
//! - Core types: `Term`, `TermId`, `Statement`, `Record`
//! - The value dictionary (`TermDict`)
//! - Index comparators for all 4 orderings (SPOG, POSG, OSPG, GSPO)
//! - Record patterns and the model-isomorphism check
//!
//! ## Design Principles
//!
//! 1. **Synchronous**: no runtime dependency; the store above decides
//!    its own threading
//! 2. **Strict total ordering**: no nil-as-wildcard in comparators; use
//!    explicit min/max bounds
//! 3. **Cheap clones**: all term content is `Arc<str>`

pub mod dict;
pub mod error;
pub mod ids;
pub mod isomorphism;
pub mod order;
pub mod record;
pub mod term;

pub use dict::TermDict;
pub use error::{Error, Result};
pub use ids::TermId;
pub use isomorphism::isomorphic;
pub use order::{IndexOrder, Position};
pub use record::{Record, RecordPattern, Statement};
pub use term::{Literal, Term, TripleTerm, RDF_LANG_STRING, XSD_BOOLEAN, XSD_DOUBLE, XSD_INTEGER, XSD_STRING};
