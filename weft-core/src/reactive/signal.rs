//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and an
//! equality policy; the set of computations depending on it lives in the
//! global dependency graph (see `runtime`), keyed by the signal's id.
//!
//! # How Signals Work
//!
//! 1. When a signal is read within a tracking frame (a watcher or computed
//!    execution), the read is recorded against that frame.
//!
//! 2. When a signal's value changes, all subscribed computations are
//!    notified: immediately, or at batch exit when a batching scope is
//!    active.
//!
//! 3. A write whose new value the equality closure accepts as equal to the
//!    current one is a complete no-op: the value is not replaced and no
//!    subscriber is notified.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use super::context;
use super::runtime::Runtime;

/// Unique identifier for a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(u64);

impl SignalId {
    /// Generate a new unique signal ID.
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

type EqualsFn<T> = Arc<dyn Fn(&T, &T) -> bool + Send + Sync>;

/// A reactive signal holding a value of type `T`.
///
/// Cloning a signal clones the handle; both handles refer to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let count = Signal::new(0);
///
/// let value = count.get();   // registers a dependency when tracked
/// count.set(5);              // notifies subscribers
/// count.set(5);              // equal write: no notification
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

struct SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    id: SignalId,
    value: RwLock<T>,
    equals: EqualsFn<T>,
}

impl<T> Drop for SignalInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // last handle gone: drop the subscriber entry from the graph
        Runtime::release_signal(self.id);
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal with the given initial value, using `PartialEq`
    /// as the equality policy.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::with_equals(value, |a: &T, b: &T| a == b)
    }

    /// Create a new signal with a caller-supplied equality policy.
    ///
    /// The policy decides whether a write is a no-op; the observable wrapper
    /// uses this to suppress redundant notifications for structurally
    /// equivalent values.
    pub fn with_equals(value: T, equals: impl Fn(&T, &T) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SignalId::next(),
                value: RwLock::new(value),
                equals: Arc::new(equals),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SignalId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a tracking frame, registers the active computation
    /// as a subscriber of this signal.
    pub fn get(&self) -> T {
        context::record_read(self.inner.id);
        self.inner.value.read().clone()
    }

    /// Get the current value without registering a dependency.
    pub fn get_untracked(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Set a new value and notify subscribers.
    ///
    /// A value the equality policy accepts as equal to the current one is
    /// ignored entirely. Inside a batching scope the value is replaced
    /// immediately but notification is deferred to the outermost exit.
    pub fn set(&self, value: T) {
        {
            let current = self.inner.value.read();
            if (self.inner.equals)(&current, &value) {
                return;
            }
        }
        *self.inner.value.write() = value;
        trace!(signal = self.inner.id.raw(), "signal changed");
        Runtime::notify(self.inner.id);
    }

    /// Update the value using a function of the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = {
            let current = self.inner.value.read();
            f(&current)
        };
        self.set(next);
    }

    /// Replace the value without any notification or equality check.
    ///
    /// Used by the array adapter to re-seed index signals after a structural
    /// mutation whose single notification travels through the version signal.
    pub(crate) fn replace_silent(&self, value: T) {
        *self.inner.value.write() = value;
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.get_untracked())
            .finish()
    }
}
