//! Observable Object Wrapper
//!
//! An [`Object`] is a shared string-keyed map of [`Value`]s. Unwrapped it
//! behaves like plain storage; once wrapped (see
//! [`observable`](super::observable)) every property gets a lazily created
//! signal and the object gets a version signal.
//!
//! # Tracking
//!
//! A property read goes through the property's signal, registering the
//! active computation, and wraps composite children in place before handing
//! them out; nested graphs become observable on first access, not at wrap
//! time. A property write is equality-checked against the stored value;
//! a redundant write is a complete no-op. A real write updates storage,
//! notifies the property signal, bumps this object's version, and then runs
//! the change hook, which bumps the nearest wrapped ancestor in turn.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::trace;

use crate::reactive::Signal;

use super::value::{default_equality, wrap_child, Equality, OnChange, Value};

/// A shared, optionally observable, string-keyed map of values.
#[derive(Clone)]
pub struct Object {
    inner: Arc<ObjectInner>,
}

struct ObjectInner {
    state: RwLock<ObjectState>,
}

struct ObjectState {
    /// Authoritative property storage, in insertion order.
    entries: IndexMap<String, Value>,
    /// Per-property signals, created on first read.
    signals: HashMap<String, Signal<Value>>,
    /// Version counter, created at wrap time.
    version: Option<Signal<u64>>,
    /// Fired after every mutation in this subtree; bumps the parent.
    hook: Option<OnChange>,
    equals: Equality,
    wrapped: bool,
}

impl Object {
    /// Create an empty plain object.
    pub fn new() -> Self {
        Self::from_entries(std::iter::empty())
    }

    /// Create a plain object from key/value pairs.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            inner: Arc::new(ObjectInner {
                state: RwLock::new(ObjectState {
                    entries: entries.into_iter().collect(),
                    signals: HashMap::new(),
                    version: None,
                    hook: None,
                    equals: default_equality(),
                    wrapped: false,
                }),
            }),
        }
    }

    /// Whether two handles refer to the same object.
    pub fn ptr_eq(&self, other: &Object) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Whether the object has been wrapped for tracking.
    pub fn is_wrapped(&self) -> bool {
        self.inner.state.read().wrapped
    }

    /// Wrap the object in place. Idempotent: a wrapped object keeps its
    /// original hook and equality.
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

    /// Get a property value; missing properties read as `Null`.
    ///
    /// On a wrapped object this registers the active computation on the
    /// property's signal and wraps composite children before returning them.
    pub fn get(&self, key: &str) -> Value {
        let (wrapped, current) = {
            let st = self.inner.state.read();
            (st.wrapped, st.entries.get(key).cloned())
        };
        let current = current.unwrap_or(Value::Null);
        if !wrapped {
            return current;
        }

        let (hook, equals) = self.child_context();
        wrap_child(&current, hook, equals.clone());

        let signal = {
            let mut st = self.inner.state.write();
            st.signals
                .entry(key.to_string())
                .or_insert_with(|| {
                    let eq = equals.clone();
                    Signal::with_equals(current.clone(), move |a: &Value, b: &Value| eq(a, b))
                })
                .clone()
        };
        signal.get()
    }

    /// Set a property value.
    ///
    /// On a wrapped object a write the equality policy accepts as equal to
    /// the stored value is a complete no-op. A real write notifies the
    /// property's signal (if any reader created it) and bumps the version.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        let (wrapped, old, equals) = {
            let st = self.inner.state.read();
            (st.wrapped, st.entries.get(key).cloned(), st.equals.clone())
        };
        if !wrapped {
            self.inner
                .state
                .write()
                .entries
                .insert(key.to_string(), value);
            return;
        }

        let old = old.unwrap_or(Value::Null);
        if (equals)(&old, &value) {
            trace!(key, "skipping equivalent property write");
            return;
        }

        let (hook, child_equals) = self.child_context();
        wrap_child(&value, hook, child_equals);

        let signal = {
            let mut st = self.inner.state.write();
            st.entries.insert(key.to_string(), value.clone());
            st.signals.get(key).cloned()
        };
        if let Some(signal) = signal {
            signal.set(value);
        }
        self.bump_version();
    }

    /// Remove a property, returning its old value. Removing a missing
    /// property is a no-op.
    pub fn remove(&self, key: &str) -> Value {
        let (wrapped, old) = {
            let st = self.inner.state.read();
            (st.wrapped, st.entries.get(key).cloned())
        };
        if !wrapped {
            return self
                .inner
                .state
                .write()
                .entries
                .shift_remove(key)
                .unwrap_or(Value::Null);
        }
        let Some(old) = old else {
            return Value::Null;
        };

        let signal = {
            let mut st = self.inner.state.write();
            st.entries.shift_remove(key);
            st.signals.get(key).cloned()
        };
        if let Some(signal) = signal {
            signal.set(Value::Null);
        }
        self.bump_version();
        old
    }

    /// The property names, in insertion order. Tracked through the version
    /// signal, so computations re-run when the key set changes.
    pub fn keys(&self) -> Vec<String> {
        self.track_version();
        self.inner.state.read().entries.keys().cloned().collect()
    }

    /// Number of properties. Tracked through the version signal.
    pub fn len(&self) -> usize {
        self.track_version();
        self.inner.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current version counter; a tracked read. Unwrapped objects report 0.
    pub fn version(&self) -> u64 {
        let version = self.inner.state.read().version.clone();
        version.map(|v| v.get()).unwrap_or(0)
    }

    /// Untracked property read, used by the equality policy.
    pub(crate) fn raw_get(&self, key: &str) -> Option<Value> {
        self.inner.state.read().entries.get(key).cloned()
    }

    /// Untracked snapshot of all entries.
    pub(crate) fn raw_entries(&self) -> Vec<(String, Value)> {
        self.inner
            .state
            .read()
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn track_version(&self) {
        let version = self.inner.state.read().version.clone();
        if let Some(version) = version {
            let _ = version.get();
        }
    }

    /// Increment the version signal and run the change hook.
    ///
    /// Called with no lock held: the version notification and the ancestor
    /// bump may re-enter this object from a reaction.
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

    /// The hook and equality handed to children of this object.
    fn child_context(&self) -> (OnChange, Equality) {
        let weak = Arc::downgrade(&self.inner);
        let hook: OnChange = Arc::new(move || {
            if let Some(inner) = weak.upgrade() {
                Object { inner }.bump_version();
            }
        });
        let equals = self.inner.state.read().equals.clone();
        (hook, equals)
    }
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.raw_entries().iter().map(|(k, v)| (k, v)))
            .finish()
    }
}
