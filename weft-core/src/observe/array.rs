//! Observable Array Adapter
//!
//! An [`Array`] is a shared sequence of [`Value`]s. Element reads behave
//! like object property reads (lazy child wrapping, dependency registration
//! through an index-keyed signal cache); in addition every element read and
//! `len()` register the array's version signal, so length-changing
//! operations reach every reader through a single notification.
//!
//! # Structural mutations
//!
//! The in-place mutating operations (`push`, `pop`, `insert`, `remove`,
//! `splice`, `move_item`, `clear`, and the bulk `set`) perform their
//! mutation once, silently re-seed the index-signal cache, and bump the
//! version exactly once, never one notification per shifted element.
//! The bulk `set` is a complete no-op when the new contents are
//! element-wise equivalent to the old.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::reactive::Signal;

use super::value::{default_equality, wrap_child, Equality, OnChange, Value};

/// A shared, optionally observable, sequence of values.
#[derive(Clone)]
pub struct Array {
    inner: Arc<ArrayInner>,
}

struct ArrayInner {
    state: RwLock<ArrayState>,
}

struct ArrayState {
    /// Authoritative element storage.
    items: Vec<Value>,
    /// Index-keyed signals, created on first read of an element.
    signals: HashMap<usize, Signal<Value>>,
    /// Version counter, created at wrap time.
    version: Option<Signal<u64>>,
    /// Fired after every mutation in this subtree; bumps the parent.
    hook: Option<OnChange>,
    equals: Equality,
    wrapped: bool,
}

impl Array {
    /// Create an empty plain array.
    pub fn new() -> Self {
        Self::from_values(Vec::new())
    }

    /// Create a plain array from the given elements.
    pub fn from_values(items: Vec<Value>) -> Self {
        Self {
            inner: Arc::new(ArrayInner {
                state: RwLock::new(ArrayState {
                    items,
                    signals: HashMap::new(),
                    version: None,
                    hook: None,
                    equals: default_equality(),
                    wrapped: false,
                }),
            }),
        }
    }

    /// Whether two handles refer to the same array.
    pub fn ptr_eq(&self, other: &Array) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the array has been wrapped for tracking.
    pub fn is_wrapped(&self) -> bool {
        self.inner.state.read().wrapped
    }

    /// Wrap the array in place. Idempotent.
    pub(crate) fn ensure_wrapped(&self, hook: Option<OnChange>, equals: Option<Equality>) {
        let mut st = self.inner.state.write();
        if st.wrapped {
            return;
        }
        st.wrapped = true;
        st.hook = hook;
        if let Some(equals) = equals {
            st.equals = equals;
        }
        st.version = Some(Signal::new(0u64));
    }

    /// Number of elements. Tracked through the version signal, so length
    /// changes re-run any computation that read it.
    pub fn len(&self) -> usize {
        self.track_version();
        self.inner.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get an element; out-of-range reads as `Null`.
    ///
    /// Registers both the element's index signal and the version signal, so
    /// the reader re-runs whether the element is overwritten in place or
    /// shifted by a structural mutation.
    pub fn get(&self, index: usize) -> Value {
        let (wrapped, current) = {
            let st = self.inner.state.read();
            (st.wrapped, st.items.get(index).cloned())
        };
        let current = current.unwrap_or(Value::Null);
        if !wrapped {
            return current;
        }
        self.track_version();

        let (hook, equals) = self.child_context();
        wrap_child(&current, hook, equals.clone());

        let signal = {
            let mut st = self.inner.state.write();
            st.signals
                .entry(index)
                .or_insert_with(|| {
                    let eq = equals.clone();
                    Signal::with_equals(current.clone(), move |a: &Value, b: &Value| eq(a, b))
                })
                .clone()
        };
        signal.get()
    }

    /// Overwrite a single element. Writing past the end pads with `Null`.
    ///
    /// Equality-checked like an object property write; a real write notifies
    /// the index signal and bumps the version once.
    pub fn set_at(&self, index: usize, value: impl Into<Value>) {
        let value = value.into();
        let (wrapped, old, equals) = {
            let st = self.inner.state.read();
            (st.wrapped, st.items.get(index).cloned(), st.equals.clone())
        };
        if !wrapped {
            let mut st = self.inner.state.write();
            if index >= st.items.len() {
                st.items.resize(index + 1, Value::Null);
            }
            st.items[index] = value;
            return;
        }

        let old = old.unwrap_or(Value::Null);
        if (equals)(&old, &value) {
            trace!(index, "skipping equivalent element write");
            return;
        }

        let (hook, child_equals) = self.child_context();
        wrap_child(&value, hook, child_equals);

        let signal = {
            let mut st = self.inner.state.write();
            if index >= st.items.len() {
                st.items.resize(index + 1, Value::Null);
            }
            st.items[index] = value.clone();
            st.signals.get(&index).cloned()
        };
        if let Some(signal) = signal {
            signal.set(value);
        }
        self.bump_version();
    }

    /// Append an element.
    pub fn push(&self, value: impl Into<Value>) {
        let value = self.prepare(value.into());
        self.mutate(move |items| items.push(value));
    }

    /// Remove and return the last element; `Null` on an empty array (and no
    /// notification).
    pub fn pop(&self) -> Value {
        if self.inner.state.read().items.is_empty() {
            return Value::Null;
        }
        self.mutate(|items| items.pop().unwrap_or(Value::Null))
    }

    /// Insert an element, shifting the tail. The index is clamped to the
    /// length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) {
        let value = self.prepare(value.into());
        self.mutate(move |items| {
            let index = index.min(items.len());
            items.insert(index, value);
        });
    }

    /// Remove and return the element at `index`, shifting the tail.
    /// Out-of-range is a no-op returning `Null`.
    pub fn remove(&self, index: usize) -> Value {
        if index >= self.inner.state.read().items.len() {
            return Value::Null;
        }
        self.mutate(move |items| items.remove(index))
    }

    /// Replace `delete_count` elements starting at `start` with `new_items`,
    /// returning the removed elements. Ranges are clamped to the length.
    pub fn splice(&self, start: usize, delete_count: usize, new_items: Vec<Value>) -> Vec<Value> {
        let new_items: Vec<Value> = new_items.into_iter().map(|v| self.prepare(v)).collect();
        self.mutate(move |items| {
            let start = start.min(items.len());
            let end = (start + delete_count).min(items.len());
            items.splice(start..end, new_items).collect()
        })
    }

    /// Move the element at `from` to position `to`. Out-of-range or
    /// same-position moves are no-ops.
    pub fn move_item(&self, from: usize, to: usize) {
        {
            let st = self.inner.state.read();
            if from == to || from >= st.items.len() || to >= st.items.len() {
                return;
            }
        }
        self.mutate(move |items| {
            let value = items.remove(from);
            items.insert(to, value);
        });
    }

    /// Remove every element. A no-op on an empty array.
    pub fn clear(&self) {
        if self.inner.state.read().items.is_empty() {
            return;
        }
        self.mutate(|items| items.clear());
    }

    /// Replace the entire contents.
    ///
    /// A complete no-op (no notification) when the new contents are
    /// element-wise equivalent to the old; otherwise a single version bump
    /// regardless of how many elements differ.
    pub fn set(&self, new_items: Vec<Value>) {
        let (wrapped, old, equals) = {
            let st = self.inner.state.read();
            (st.wrapped, st.items.clone(), st.equals.clone())
        };
        if wrapped
            && old.len() == new_items.len()
            && old.iter().zip(new_items.iter()).all(|(a, b)| (equals)(a, b))
        {
            trace!("skipping equivalent bulk replace");
            return;
        }
        let new_items: Vec<Value> = new_items.into_iter().map(|v| self.prepare(v)).collect();
        self.mutate(move |items| {
            *items = new_items;
        });
    }

    /// Snapshot of the elements. Tracked through the version signal.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track_version();
        self.inner.state.read().items.clone()
    }

    /// Current version counter; a tracked read. Unwrapped arrays report 0.
    pub fn version(&self) -> u64 {
        let version = self.inner.state.read().version.clone();
        version.map(|v| v.get()).unwrap_or(0)
    }

    /// Untracked snapshot, used by the equality policy.
    pub(crate) fn raw_items(&self) -> Vec<Value> {
        self.inner.state.read().items.clone()
    }

    fn track_version(&self) {
        let version = self.inner.state.read().version.clone();
        if let Some(version) = version {
            let _ = version.get();
        }
    }

    /// Run a structural mutation: mutate once, re-seed index signals
    /// silently, bump the version exactly once.
    fn mutate<R>(&self, op: impl FnOnce(&mut Vec<Value>) -> R) -> R {
        let wrapped = self.inner.state.read().wrapped;
        if !wrapped {
            return op(&mut self.inner.state.write().items);
        }
        let out = {
            let mut st = self.inner.state.write();
            let out = op(&mut st.items);
            Self::resync_signals(&mut st);
            out
        };
        self.bump_version();
        out
    }

    /// Align the index-signal cache with the shifted storage, without
    /// notifying: the structural op's single notification is the version
    /// bump, which element readers also subscribe to.
    fn resync_signals(st: &mut ArrayState) {
        let len = st.items.len();
        st.signals.retain(|index, _| *index < len);
        let items = &st.items;
        for (index, signal) in &st.signals {
            signal.replace_silent(items[*index].clone());
        }
    }

    /// Wrap a value about to enter a wrapped array.
    fn prepare(&self, value: Value) -> Value {
        if self.is_wrapped() {
            let (hook, equals) = self.child_context();
            wrap_child(&value, hook, equals);
        }
        value
    }

    fn bump_version(&self) {
        let (version, hook) = {
            let st = self.inner.state.read();
            (st.version.clone(), st.hook.clone())
        };
        if let Some(version) = version {
            version.update(|n| n + 1);
        }
        if let Some(hook) = hook {
            hook();
        }
    }

    fn child_context(&self) -> (OnChange, Equality) {
        let weak = Arc::downgrade(&self.inner);
        let hook: OnChange = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Array { inner }.bump_version();
            }
        });
        let equals = self.inner.state.read().equals.clone();
        (hook, equals)
    }
}

impl Default for Array {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.raw_items()).finish()
    }
}
