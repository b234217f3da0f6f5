//! Physical operators, one module per algebra variant

pub mod bind;
pub mod distinct;
pub mod filter;
pub mod group;
pub mod join;
pub mod optional;
pub mod project;
pub mod scan;
pub mod slice;
pub mod sort;
pub mod union;
pub mod values;
