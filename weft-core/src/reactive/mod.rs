//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, watchers,
//! computeds, the tracking context, ownership scopes, and the batching
//! scope. These primitives form the foundation of weft's fine-grained
//! reactivity; the observable wrapper in [`crate::observe`] is built
//! entirely on top of them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state with an equality policy. When
//! a signal is read within a tracking frame, the frame's computation
//! becomes a dependent; when the signal's value changes, dependents are
//! notified.
//!
//! ## Watchers
//!
//! A Watcher is a side-effecting computation. It re-runs eagerly when a
//! dependency changes and hands the fresh result to its reaction.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. Invalidation only
//! marks it dirty; it re-evaluates on the next read.
//!
//! ## Batching
//!
//! [`batch`] defers notification delivery (not value mutation) until the
//! outermost scope exits, coalescing repeated writes to the same signal
//! into a single notification.
//!
//! # Implementation Notes
//!
//! Dependency detection uses a thread-local stack of tracking frames; the
//! dependency graph itself (subscriber sets and their reverse index) is
//! process-wide and keyed by integer ids, so no reference cycles exist
//! between signals and computations.

mod batch;
mod computed;
mod context;
mod owner;
mod runtime;
mod signal;
mod watcher;

pub use batch::{batch, in_batch};
pub use computed::{computed, computed_with, Computed};
pub use context::untracked;
pub use owner::{root, Scope};
pub use runtime::{ComputationId, Runtime};
pub use signal::{Signal, SignalId};
pub use watcher::{watch, watch_with, Watcher};
