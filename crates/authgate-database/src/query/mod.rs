//! Statement composition: named-parameter binding, predicate building and
//! sparse field patches.

pub mod binder;
pub mod filter;
pub mod patch;

pub use binder::{BoundQuery, NamedParams, bind_named, number_placeholders};
pub use filter::Predicates;
pub use patch::{Patch, apply_update};
