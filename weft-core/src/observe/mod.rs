//! Observable Value Graphs
//!
//! This module makes arbitrary nested object/array graphs observable
//! without schema declaration. [`observable`] wraps a [`Value`] in place;
//! from then on property and element reads register dependencies, writes
//! are equality-checked, and every mutation bumps a per-composite version
//! counter that propagates to the nearest wrapped ancestor.
//!
//! The wrapper is built entirely on the primitives in [`crate::reactive`]:
//! each accessed property is backed by a lazily created [`Signal`], and the
//! version counters are signals too.
//!
//! [`Signal`]: crate::reactive::Signal

mod array;
mod equality;
mod object;
mod value;

pub use array::Array;
pub use equality::equivalent;
pub use object::Object;
pub use value::{
    is_wrapped, observable, observable_with, version, Equality, OnChange, Value,
};
