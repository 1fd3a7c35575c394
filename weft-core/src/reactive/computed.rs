//! Computed Implementation
//!
//! A Computed is a cached derived value. Its `track` function runs inside a
//! tracking frame; the `compute` function turns the tracked result into the
//! cached value. Invalidation only marks the computed dirty; the re-run is
//! deferred to the next read, so computeds that are never read again cost
//! nothing.
//!
//! The cached value sits in an output signal, so reading a computed inside
//! another computation registers a dependency like any signal read. A
//! recompute that produces an equal value writes nothing through that
//! signal, which keeps downstream computations quiet.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::Error;

use super::context;
use super::owner::{self, Children, DisposeNode};
use super::runtime::{ComputationId, Reactive, Runtime};
use super::signal::Signal;

/// A cached derived value that recomputes lazily when dependencies change.
pub struct Computed<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T, U>>,
}

struct ComputedInner<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    id: ComputationId,
    track: Box<dyn Fn() -> T + Send + Sync>,
    compute: Box<dyn Fn(&T) -> U + Send + Sync>,
    out: Signal<Option<U>>,
    dirty: AtomicBool,
    children: Arc<Children>,
    disposed: AtomicBool,
}

impl<T, U> ComputedInner<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    /// Re-run `track` and `compute` if the computed is dirty.
    ///
    /// A panic in `track` re-arms the dirty flag and keeps the previous
    /// dependency set, so a later read retries.
    fn refresh_if_dirty(&self) {
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return;
        }
        struct RedirtyGuard<'a> {
            dirty: &'a AtomicBool,
            armed: bool,
        }
        impl Drop for RedirtyGuard<'_> {
            fn drop(&mut self) {
                if self.armed {
                    self.dirty.store(true, Ordering::SeqCst);
                }
            }
        }
        let mut guard = RedirtyGuard {
            dirty: &self.dirty,
            armed: true,
        };

        self.children.dispose_all();
        let (tracked, reads) = context::with_frame(self.id, || {
            owner::with_owner(&self.children, || (self.track)())
        });
        Runtime::commit_dependencies(self.id, &reads);

        let value = (self.compute)(&tracked);
        // equal recomputes write nothing: downstream stays quiet
        self.out.set(Some(value));
        guard.armed = false;
    }
}

impl<T, U> Reactive for ComputedInner<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    fn computation_id(&self) -> ComputationId {
        self.id
    }

    fn invalidate(&self) {
        // lazy: the next read recomputes
        self.dirty.store(true, Ordering::SeqCst);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T, U> DisposeNode for ComputedInner<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!(computation = %self.id, "disposing computed");
        self.children.dispose_all();
        Runtime::unregister(self.id);
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl<T, U> Computed<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    /// The computed's id in the dependency graph.
    pub fn id(&self) -> ComputationId {
        self.inner.id
    }

    /// Get the current value, recomputing if dirty.
    ///
    /// Panics on a dependency cycle; use [`Computed::try_get`] to handle it.
    pub fn get(&self) -> U {
        self.try_get().expect("computed read failed")
    }

    /// Get the current value, recomputing if dirty.
    ///
    /// Returns [`Error::Cycle`] when this computed's own frame is still on
    /// the tracking stack, and [`Error::Disposed`] when the computed was
    /// disposed while dirty.
    pub fn try_get(&self) -> Result<U, Error> {
        if context::is_running(self.inner.id) {
            return Err(Error::Cycle(self.inner.id));
        }
        if self.inner.disposed.load(Ordering::SeqCst) {
            if self.inner.dirty.load(Ordering::SeqCst) {
                return Err(Error::Disposed(self.inner.id));
            }
            return Ok(self
                .inner
                .out
                .get()
                .expect("clean computed holds a value"));
        }
        self.inner.refresh_if_dirty();
        Ok(self
            .inner
            .out
            .get()
            .expect("refreshed computed holds a value"))
    }

    /// The cached value, without recomputing or registering a dependency.
    pub fn peek(&self) -> Option<U> {
        self.inner.out.get_untracked()
    }

    /// Tear the computed down. Idempotent.
    pub fn dispose(&self) {
        DisposeNode::dispose(&*self.inner);
    }

    /// Whether the computed has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl<T, U> Clone for Computed<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Register a computed that evaluates eagerly at creation.
pub fn computed<T, U, F, G>(track: F, compute: G) -> Computed<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    G: Fn(&T) -> U + Send + Sync + 'static,
{
    computed_with(track, compute, None, true)
}

/// Register a computed with an explicit seed and initial-run policy.
///
/// With `run_immediately` unset, the first evaluation is deferred to the
/// first read; until then [`Computed::peek`] reports the seed.
pub fn computed_with<T, U, F, G>(
    track: F,
    compute: G,
    seed: Option<U>,
    run_immediately: bool,
) -> Computed<T, U>
where
    T: Send + Sync + 'static,
    U: Clone + PartialEq + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
    G: Fn(&T) -> U + Send + Sync + 'static,
{
    let inner = Arc::new(ComputedInner {
        id: ComputationId::next(),
        track: Box::new(track),
        compute: Box::new(compute),
        out: Signal::new(seed),
        dirty: AtomicBool::new(true),
        children: Children::new(),
        disposed: AtomicBool::new(false),
    });
    let reactive: Arc<dyn Reactive> = inner.clone();
    Runtime::register(reactive);
    owner::adopt(inner.clone());
    if run_immediately {
        // prime without a tracked read so the creator gains no dependency
        inner.refresh_if_dirty();
    }
    Computed { inner }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{watch, Signal};
    use std::sync::atomic::AtomicUsize;
    use std::sync::OnceLock;

    #[test]
    fn computed_caches_its_value() {
        let computes = Arc::new(AtomicUsize::new(0));
        let computes_clone = computes.clone();

        let c = computed(
            move || {
                computes_clone.fetch_add(1, Ordering::SeqCst);
                21
            },
            |v| v * 2,
        );
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        assert_eq!(c.get(), 42);
        assert_eq!(c.get(), 42);
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_recomputes_lazily_after_invalidation() {
        let signal = Signal::new(2);
        let computes = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let computes_clone = computes.clone();
        let c = computed(
            move || {
                computes_clone.fetch_add(1, Ordering::SeqCst);
                signal_clone.get()
            },
            |v| v * 10,
        );
        assert_eq!(c.get(), 20);
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        // invalidation alone does not recompute
        signal.set(3);
        assert_eq!(computes.load(Ordering::SeqCst), 1);

        // the next read does, exactly once
        assert_eq!(c.get(), 30);
        assert_eq!(computes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn deferred_computed_keeps_seed_until_first_read() {
        let computes = Arc::new(AtomicUsize::new(0));
        let computes_clone = computes.clone();

        let c = computed_with(
            move || {
                computes_clone.fetch_add(1, Ordering::SeqCst);
                1
            },
            |v| *v,
            Some(7),
            false,
        );
        assert_eq!(computes.load(Ordering::SeqCst), 0);
        assert_eq!(c.peek(), Some(7));

        assert_eq!(c.get(), 1);
        assert_eq!(computes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn equal_recompute_keeps_downstream_quiet() {
        let signal = Signal::new(1);
        let downstream_runs = Arc::new(AtomicUsize::new(0));

        let signal_clone = signal.clone();
        let parity = computed(move || signal_clone.get() % 2, |v| *v);

        let parity_clone = parity.clone();
        let downstream_clone = downstream_runs.clone();
        let _watcher = watch(
            move || parity_clone.get(),
            move |_| {
                downstream_clone.fetch_add(1, Ordering::SeqCst);
            },
        );
        assert_eq!(downstream_runs.load(Ordering::SeqCst), 1);

        // 1 -> 3: parity unchanged, the watcher re-reads but its own rerun
        // is driven by the parity value, which did not change
        signal.set(3);
        parity.get();
        assert_eq!(downstream_runs.load(Ordering::SeqCst), 1);

        // 3 -> 4 flips parity: the pull below pushes the change downstream
        signal.set(4);
        assert_eq!(parity.get(), 0);
        assert_eq!(downstream_runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cycle_is_detected() {
        let slot: Arc<OnceLock<Computed<i64, i64>>> = Arc::new(OnceLock::new());

        let slot_clone = slot.clone();
        let c = computed(
            move || match slot_clone.get() {
                // reading our own output mid-run must fail, not recurse
                Some(c) => match c.try_get() {
                    Err(Error::Cycle(_)) => -1,
                    other => other.unwrap_or(0),
                },
                None => 0,
            },
            |v| *v,
        );
        slot.set(c.clone()).ok().expect("slot set once");

        // force a recompute now that the slot is filled
        c.inner.invalidate();
        assert_eq!(c.get(), -1);
    }

    #[test]
    fn disposed_computed_serves_cache_but_refuses_to_rerun() {
        let signal = Signal::new(5);

        let signal_clone = signal.clone();
        let c = computed(move || signal_clone.get(), |v| *v);
        assert_eq!(c.get(), 5);

        c.dispose();
        c.dispose(); // idempotent
        assert_eq!(Runtime::subscriber_count(signal.id()), 0);

        // clean: the cached value is still readable
        assert_eq!(c.try_get(), Ok(5));

        // dirty + disposed: reading is an error
        c.inner.invalidate();
        assert_eq!(c.try_get(), Err(Error::Disposed(c.id())));
    }
}
