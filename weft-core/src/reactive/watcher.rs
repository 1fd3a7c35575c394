//! Watcher Implementation
//!
//! A Watcher is a side-effecting computation. Its `track` function runs
//! inside a tracking frame to establish dependencies; whenever one of them
//! changes, the watcher re-runs `track`, stores the fresh result, and
//! invokes its `reaction` with it.
//!
//! # Lifecycle
//!
//! Idle → Running → (Idle | Disposed). A watcher created while another
//! computation is executing becomes a child of that computation and is torn
//! down with it. Re-running a watcher first disposes the children its
//! previous run created.
//!
//! # Re-entrancy
//!
//! A watcher invalidated while it is already running (its reaction wrote to
//! one of its own dependencies) logs a warning and skips the re-entrant
//! run; the in-flight run always completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use super::context;
use super::owner::{self, Children, DisposeNode};
use super::runtime::{ComputationId, Reactive, Runtime};

/// A side-effecting computation that re-runs when its dependencies change.
///
/// The handle is cheap to clone. Dropping it does not stop the watcher: the
/// owning scope (or the process-wide registry) keeps it alive until
/// [`Watcher::dispose`] or the owner's teardown.
pub struct Watcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<WatcherInner<T>>,
}

struct WatcherInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: ComputationId,
    track: Box<dyn Fn() -> T + Send + Sync>,
    reaction: Box<dyn Fn(&T) + Send + Sync>,
    last: RwLock<Option<T>>,
    children: Arc<Children>,
    running: AtomicBool,
    disposed: AtomicBool,
}

impl<T> WatcherInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Re-execute `track` and refresh the dependency set. When `commit` is
    /// set, also store the result and fire the reaction.
    fn rerun(&self, commit: bool) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.running.swap(true, Ordering::SeqCst) {
            warn!(
                computation = %self.id,
                "dependency cycle: watcher invalidated while running, skipping re-entrant run"
            );
            return;
        }
        struct RunGuard<'a>(&'a AtomicBool);
        impl Drop for RunGuard<'_> {
            fn drop(&mut self) {
                self.0.store(false, Ordering::SeqCst);
            }
        }
        let _guard = RunGuard(&self.running);

        // children from the previous run die before re-tracking
        self.children.dispose_all();

        let (result, reads) = context::with_frame(self.id, || {
            owner::with_owner(&self.children, || (self.track)())
        });
        Runtime::commit_dependencies(self.id, &reads);

        if commit {
            *self.last.write() = Some(result.clone());
            (self.reaction)(&result);
        }
    }
}

impl<T> Reactive for WatcherInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn computation_id(&self) -> ComputationId {
        self.id
    }

    fn invalidate(&self) {
        self.rerun(true);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T> DisposeNode for WatcherInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(computation = %self.id, "disposing watcher");
        self.children.dispose_all();
        Runtime::unregister(self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T> Watcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// The watcher's id in the dependency graph.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// The result of the most recent committed run, or the seed.
    pub fn last(&self) -> Option<T> {
        self.inner.last.read().clone()
    }

    /// Tear the watcher down. Idempotent; future invalidations are ignored.
    pub fn dispose(&self) {
        DisposeNode::dispose(&*self.inner);
    }

    /// Whether the watcher has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl<T> Clone for Watcher<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Register a watcher that runs `track` immediately and fires `reaction`
/// with the initial result.
pub fn watch<T, F, G>(track: F, reaction: G) -> Watcher<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    G: Fn(&T) + Send + Sync + 'static,
{
    watch_with(track, reaction, None, true)
}

/// Register a watcher with an explicit seed and initial-run policy.
///
/// `track` always runs once at creation to establish dependencies. With
/// `run_immediately` unset, the initial result is discarded: `last` keeps
/// the seed and the reaction stays quiet until the first invalidation.
pub fn watch_with<T, F, G>(track: F, reaction: G, seed: Option<T>, run_immediately: bool) -> Watcher<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    G: Fn(&T) + Send + Sync + 'static,
{
    let inner = Arc::new(WatcherInner {
        id: ComputationId::next(),
        track: Box::new(track),
        reaction: Box::new(reaction),
        last: RwLock::new(seed),
        children: Children::new(),
        running: AtomicBool::new(false),
        disposed: AtomicBool::new(false),
    });
    let reactive: Arc<dyn Reactive> = inner.clone();
    Runtime::register(reactive);
    owner::adopt(inner.clone());
    inner.rerun(run_immediately);
    Watcher { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Signal;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn watcher_runs_on_creation() {
        let runs = Arc::new(AtomicUsize::new(0));
        let runs_clone = runs.clone();

        let _watcher = watch(|| (), move |_| {
            runs_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watcher_reacts_to_dependency_changes() {
        let signal = Signal::new(10);
        let seen = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let seen_clone = seen.clone();
        let watcher = watch(
            move || signal_clone.get() * 2,
            move |value| {
                seen_clone.store(*value as usize, Ordering::SeqCst);
            },
        );
        assert_eq!(seen.load(Ordering::SeqCst), 20);

        signal.set(25);
        assert_eq!(seen.load(Ordering::SeqCst), 50);
        assert_eq!(watcher.last(), Some(50));
    }

    #[test]
    fn quiet_watcher_keeps_seed_until_first_invalidation() {
        let signal = Signal::new(1);
        let runs = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let watcher = watch_with(
            move || signal_clone.get(),
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
            Some(99),
            false,
        );

        // track ran (dependencies exist) but the reaction did not fire
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert_eq!(watcher.last(), Some(99));

        signal.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(watcher.last(), Some(2));
    }

    #[test]
    fn stale_dependencies_are_dropped_after_rerun() {
        let flag = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(10);
        let runs = Arc::new(AtomicUsize::new(0));

        let (flag_c, a_c, b_c) = (flag.clone(), a.clone(), b.clone());
        let runs_clone = runs.clone();
        let _watcher = watch(
            move || {
                if flag_c.get() {
                    a_c.get()
                } else {
                    b_c.get()
                }
            },
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        // switch the read path from a to b
        flag.set(false);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        // a is no longer a dependency: writing it must not re-run anything
        a.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);

        b.set(11);
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn disposed_watcher_ignores_invalidations() {
        let signal = Signal::new(0);
        let runs = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let runs_clone = runs.clone();
        let watcher = watch(
            move || signal_clone.get(),
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        watcher.dispose();
        watcher.dispose(); // idempotent

        signal.set(1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(Runtime::subscriber_count(signal.id()), 0);
    }

    #[test]
    fn self_write_does_not_loop() {
        let signal = Signal::new(0);

        let signal_read = signal.clone();
        let signal_write = signal.clone();
        let _watcher = watch(
            move || signal_read.get(),
            move |value| {
                // writing our own dependency: the re-entrant run is skipped
                if *value < 100 {
                    signal_write.set(value + 1);
                }
            },
        );

        // one increment per completed run, no unbounded recursion
        assert!(signal.get_untracked() >= 1);

        signal.set(50);
        assert_eq!(signal.get_untracked(), 51);
    }

    #[test]
    fn rerun_disposes_children_of_previous_run() {
        let outer_dep = Signal::new(0);
        let inner_dep = Signal::new(0);
        let inner_runs = Arc::new(AtomicUsize::new(0));

        let (outer_c, inner_c) = (outer_dep.clone(), inner_dep.clone());
        let inner_runs_clone = inner_runs.clone();
        let _watcher = watch(
            move || {
                outer_c.get();
                let inner_c = inner_c.clone();
                let inner_runs = inner_runs_clone.clone();
                watch(
                    move || inner_c.get(),
                    move |_| {
                        inner_runs.fetch_add(1, Ordering::SeqCst);
                    },
                );
            },
            |_| {},
        );
        assert_eq!(inner_runs.load(Ordering::SeqCst), 1);

        inner_dep.set(1);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 2);

        // outer rerun replaces the inner watcher; exactly one fresh inner
        // runs afterwards
        outer_dep.set(1);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 3);

        inner_dep.set(2);
        assert_eq!(inner_runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn panicking_track_keeps_previous_dependencies() {
        let signal = Signal::new(0);
        let explode = Arc::new(AtomicBool::new(false));
        let runs = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let explode_clone = explode.clone();
        let runs_clone = runs.clone();
        let watcher = watch(
            move || {
                let value = signal_clone.get();
                if explode_clone.load(Ordering::SeqCst) {
                    panic!("tracked function failed");
                }
                value
            },
            move |_| {
                runs_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        explode.store(true, Ordering::SeqCst);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| signal.set(1)));
        assert!(result.is_err());

        // the failed run did not destroy the edge: a retry still reaches us
        assert!(Runtime::depends_on(watcher.id(), signal.id()));
        explode.store(false, Ordering::SeqCst);
        signal.set(2);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }
}
