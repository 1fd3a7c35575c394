//! Batching Scope
//!
//! A re-entrant transaction boundary that defers notification delivery, not
//! value mutation. Writes inside [`batch`] replace signal values immediately
//! (reads-after-write observe the new values) while the notification is
//! parked in a deduplicated pending set. The outermost exit drains the set
//! once, delivering each signal's notification exactly once, in the order
//! the signals were first touched.
//!
//! Writes issued from inside a reaction while the flush is running happen at
//! depth zero and notify immediately (nested, synchronous); the drain is a
//! single pass and never re-queues.

use std::cell::RefCell;

use indexmap::IndexSet;

use super::runtime::Runtime;
use super::signal::SignalId;

#[derive(Default)]
struct BatchState {
    depth: u32,
    pending: IndexSet<SignalId>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
}

/// Run `f` with deferred notification delivery.
///
/// Nested calls only flush at the outermost exit. If `f` unwinds, applied
/// values stay applied but the queued notifications are dropped.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    BATCH.with(|b| b.borrow_mut().depth += 1);
    let guard = BatchGuard;
    let out = f();
    std::mem::forget(guard);
    exit_and_flush();
    out
}

/// Whether a batching scope is currently active on this thread.
pub fn in_batch() -> bool {
    BATCH.with(|b| b.borrow().depth > 0)
}

/// Park a signal's notification in the active scope.
///
/// Returns `false` when no scope is active and the caller must deliver
/// immediately.
pub(crate) fn defer(signal: SignalId) -> bool {
    BATCH.with(|b| {
        let mut state = b.borrow_mut();
        if state.depth == 0 {
            false
        } else {
            state.pending.insert(signal);
            true
        }
    })
}

fn exit_and_flush() {
    let pending: Vec<SignalId> = BATCH.with(|b| {
        let mut state = b.borrow_mut();
        state.depth -= 1;
        if state.depth == 0 {
            state.pending.drain(..).collect()
        } else {
            Vec::new()
        }
    });
    for signal in pending {
        Runtime::deliver(signal);
    }
}

struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        BATCH.with(|b| {
            let mut state = b.borrow_mut();
            state.depth -= 1;
            if state.depth == 0 {
                state.pending.clear();
            }
        });
    }
}
