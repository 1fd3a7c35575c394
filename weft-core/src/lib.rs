//! Weft Core
//!
//! This crate provides a fine-grained reactive state engine. It implements:
//!
//! - Reactive primitives (signals, watchers, computeds)
//! - Automatic dependency tracking with dynamic dependency sets
//! - Ownership scopes with cascading disposal
//! - A re-entrant batching scope that coalesces notifications
//! - An observable wrapper turning plain object/array graphs into tracked
//!   state without schema declaration
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `reactive`: signals, the tracking context, computations, batching
//! - `observe`: the dynamic [`Value`] model and the object/array wrappers
//!
//! # Example
//!
//! ```rust,ignore
//! use weft_core::{observable, version, watch, Value};
//!
//! let state = observable(Value::from(serde_json::json!({
//!     "count": 0,
//!     "nested": {"label": "hello"}
//! })));
//! let root = state.as_object().unwrap().clone();
//!
//! // re-runs whenever anything in the subtree changes
//! watch(
//!     move || version(&state),
//!     |_| println!("state changed"),
//! );
//!
//! root.set("count", 1);                       // one reaction
//! root.get("nested").as_object().unwrap()
//!     .set("label", "world");                 // deep writes propagate
//! root.set("count", 1);                       // equal write: no reaction
//! ```

pub mod error;
pub mod observe;
pub mod reactive;

pub use error::Error;
pub use observe::{
    equivalent, is_wrapped, observable, observable_with, version, Array, Equality, Object,
    OnChange, Value,
};
pub use reactive::{
    batch, computed, computed_with, in_batch, root, untracked, watch, watch_with, Computed,
    ComputationId, Runtime, Scope, Signal, SignalId, Watcher,
};
