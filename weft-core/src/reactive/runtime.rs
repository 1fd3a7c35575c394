//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals to the
//! computations depending on them. It holds the dependency graph:
//!
//! - a registry of live computations (weak, so a dropped computation cannot
//!   be kept alive by the graph),
//! - `signal → computations` subscriber sets, kept in registration order,
//! - `computation → signals` dependency sets, the reverse index that makes
//!   edge removal proportional to a computation's own dependencies.
//!
//! # Update propagation
//!
//! When a signal changes outside a batching scope, [`Runtime::deliver`]
//! collects the subscriber list, upgrades the weak registrations, releases
//! every lock, and then invalidates each live computation in registration
//! order. Reactions therefore run with no graph lock held and may freely
//! read, write, and dispose.
//!
//! # Dependency maintenance
//!
//! After every successful computation run, [`Runtime::commit_dependencies`]
//! diffs the fresh read set against the previous one: stale edges are
//! unsubscribed, new ones subscribed. A computation's dependency set is thus
//! always exactly what its most recent run read.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use indexmap::IndexSet;
use parking_lot::RwLock;
use tracing::trace;

use super::batch;
use super::signal::SignalId;

/// Unique identifier for a computation (watcher or computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComputationId(u64);

impl ComputationId {
    /// Generate a new unique computation ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComputationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A computation that can be invalidated when one of its signals changes.
pub(crate) trait Reactive: Send + Sync {
    /// The computation's id in the dependency graph.
    fn computation_id(&self) -> ComputationId;

    /// React to a dependency change. Watchers re-run eagerly; computeds mark
    /// themselves dirty and recompute on the next read.
    fn invalidate(&self);

    /// Whether the computation has been disposed.
    fn is_disposed(&self) -> bool;
}

static REGISTRY: OnceLock<DashMap<ComputationId, Weak<dyn Reactive>>> = OnceLock::new();
static SUBSCRIBERS: OnceLock<RwLock<HashMap<SignalId, IndexSet<ComputationId>>>> = OnceLock::new();
static DEPENDENCIES: OnceLock<RwLock<HashMap<ComputationId, HashSet<SignalId>>>> = OnceLock::new();

fn registry() -> &'static DashMap<ComputationId, Weak<dyn Reactive>> {
    REGISTRY.get_or_init(DashMap::new)
}

fn subscribers() -> &'static RwLock<HashMap<SignalId, IndexSet<ComputationId>>> {
    SUBSCRIBERS.get_or_init(|| RwLock::new(HashMap::new()))
}

fn dependencies() -> &'static RwLock<HashMap<ComputationId, HashSet<SignalId>>> {
    DEPENDENCIES.get_or_init(|| RwLock::new(HashMap::new()))
}

/// The global reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Register a computation with the runtime.
    pub(crate) fn register(reactive: Arc<dyn Reactive>) {
        registry().insert(reactive.computation_id(), Arc::downgrade(&reactive));
    }

    /// Unregister a computation and remove every edge it still holds.
    pub(crate) fn unregister(id: ComputationId) {
        registry().remove(&id);
        let removed = dependencies().write().remove(&id);
        if let Some(signals) = removed {
            let mut subs = subscribers().write();
            for signal in signals {
                if let Some(set) = subs.get_mut(&signal) {
                    set.shift_remove(&id);
                }
            }
        }
    }

    /// Replace a computation's dependency set with the reads of its latest
    /// run, unsubscribing stale edges and subscribing fresh ones.
    pub(crate) fn commit_dependencies(id: ComputationId, reads: &IndexSet<SignalId>) {
        let mut deps = dependencies().write();
        let mut subs = subscribers().write();

        let previous = deps
            .insert(id, reads.iter().copied().collect())
            .unwrap_or_default();

        for stale in &previous {
            if !reads.contains(stale) {
                if let Some(set) = subs.get_mut(stale) {
                    set.shift_remove(&id);
                }
            }
        }
        for fresh in reads {
            if !previous.contains(fresh) {
                subs.entry(*fresh).or_default().insert(id);
            }
        }
    }

    /// Forget a signal whose last handle was dropped.
    pub(crate) fn release_signal(id: SignalId) {
        if let Some(lock) = SUBSCRIBERS.get() {
            lock.write().remove(&id);
        }
    }

    /// Notify the subscribers of a changed signal, or park the notification
    /// in the active batching scope.
    pub(crate) fn notify(signal: SignalId) {
        if batch::defer(signal) {
            return;
        }
        Self::deliver(signal);
    }

    /// Deliver a signal's notification to every live subscriber, in
    /// registration order.
    pub(crate) fn deliver(signal: SignalId) {
        let ids: Vec<ComputationId> = subscribers()
            .read()
            .get(&signal)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default();
        if ids.is_empty() {
            return;
        }
        trace!(
            signal = signal.raw(),
            subscribers = ids.len(),
            "delivering signal change"
        );

        // upgrade everything first: reactions may rewire the graph mid-sweep
        let live: Vec<Arc<dyn Reactive>> = ids
            .iter()
            .filter_map(|id| registry().get(id).and_then(|entry| entry.value().upgrade()))
            .collect();

        for computation in live {
            if !computation.is_disposed() {
                computation.invalidate();
            }
        }
    }

    /// Number of computations currently subscribed to a signal.
    pub fn subscriber_count(signal: SignalId) -> usize {
        subscribers()
            .read()
            .get(&signal)
            .map(|set| set.len())
            .unwrap_or(0)
    }

    /// Whether the computation's latest run read the given signal.
    pub fn depends_on(id: ComputationId, signal: SignalId) -> bool {
        dependencies()
            .read()
            .get(&id)
            .map(|set| set.contains(&signal))
            .unwrap_or(false)
    }
}
