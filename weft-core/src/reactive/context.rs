//! Tracking Context
//!
//! The tracking context records which computation is currently executing.
//! This enables automatic dependency tracking: when a signal is read, the
//! read lands in the frame of the innermost running computation.
//!
//! # Implementation
//!
//! A thread-local stack of frames. Entering a computation pushes a frame;
//! reads accumulate into the top frame; leaving pops it. The collected read
//! set is handed back to the computation only when its function returns
//! normally; an unwinding execution discards the partial read set, so the
//! computation keeps the dependency edges of its previous successful run.
//!
//! [`untracked`] pushes a frame with no computation attached; reads inside
//! it are recorded nowhere, while any computation entered deeper still
//! tracks normally.

use std::cell::RefCell;

use indexmap::IndexSet;
use smallvec::SmallVec;

use super::runtime::ComputationId;
use super::signal::SignalId;

/// A frame on the tracking stack.
///
/// `id` is `None` for the non-tracking frame pushed by [`untracked`].
struct Frame {
    id: Option<ComputationId>,
    reads: IndexSet<SignalId>,
}

thread_local! {
    static FRAMES: RefCell<SmallVec<[Frame; 4]>> = RefCell::new(SmallVec::new());
}

/// Record that the current computation (if any) read the given signal.
pub(crate) fn record_read(signal: SignalId) {
    FRAMES.with(|frames| {
        if let Some(frame) = frames.borrow_mut().last_mut() {
            if frame.id.is_some() {
                frame.reads.insert(signal);
            }
        }
    });
}

/// Whether the given computation has a frame anywhere on the stack.
///
/// Used for cycle detection: a computed whose own frame is still active must
/// not be read.
pub(crate) fn is_running(id: ComputationId) -> bool {
    FRAMES.with(|frames| frames.borrow().iter().any(|frame| frame.id == Some(id)))
}

/// Run `f` inside a tracking frame for `id` and return its result together
/// with the set of signals it read, in read order.
///
/// If `f` unwinds, the frame is popped and its partial read set discarded.
pub(crate) fn with_frame<R>(id: ComputationId, f: impl FnOnce() -> R) -> (R, IndexSet<SignalId>) {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame {
            id: Some(id),
            reads: IndexSet::new(),
        })
    });
    let guard = FrameGuard { committed: false };
    let out = f();
    let reads = guard.commit();
    (out, reads)
}

/// Run `f` with dependency tracking suspended.
///
/// Reads inside `f` register nothing; computations created and executed
/// inside `f` still track their own reads.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    FRAMES.with(|frames| {
        frames.borrow_mut().push(Frame {
            id: None,
            reads: IndexSet::new(),
        })
    });
    let _guard = FrameGuard { committed: false };
    f()
}

struct FrameGuard {
    committed: bool,
}

impl FrameGuard {
    fn commit(mut self) -> IndexSet<SignalId> {
        self.committed = true;
        FRAMES
            .with(|frames| frames.borrow_mut().pop())
            .map(|frame| frame.reads)
            .unwrap_or_default()
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if !self.committed {
            FRAMES.with(|frames| {
                frames.borrow_mut().pop();
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_land_in_the_active_frame() {
        let id = ComputationId::next();
        let s1 = SignalId::next();
        let s2 = SignalId::next();

        let ((), reads) = with_frame(id, || {
            record_read(s1);
            record_read(s2);
            record_read(s1); // duplicate reads collapse
        });

        assert_eq!(reads.len(), 2);
        assert!(reads.contains(&s1));
        assert!(reads.contains(&s2));
    }

    #[test]
    fn nested_frames_track_independently() {
        let outer = ComputationId::next();
        let inner = ComputationId::next();
        let s1 = SignalId::next();
        let s2 = SignalId::next();

        let ((), outer_reads) = with_frame(outer, || {
            record_read(s1);

            let ((), inner_reads) = with_frame(inner, || {
                record_read(s2);
            });
            assert_eq!(inner_reads.len(), 1);
            assert!(inner_reads.contains(&s2));
        });

        // the inner frame's reads never leak into the outer frame
        assert_eq!(outer_reads.len(), 1);
        assert!(outer_reads.contains(&s1));
    }

    #[test]
    fn untracked_suppresses_reads() {
        let id = ComputationId::next();
        let s1 = SignalId::next();
        let s2 = SignalId::next();

        let ((), reads) = with_frame(id, || {
            record_read(s1);
            untracked(|| record_read(s2));
        });

        assert!(reads.contains(&s1));
        assert!(!reads.contains(&s2));
    }

    #[test]
    fn computations_inside_untracked_still_track() {
        let outer = ComputationId::next();
        let inner = ComputationId::next();
        let s = SignalId::next();

        let ((), outer_reads) = with_frame(outer, || {
            untracked(|| {
                let ((), inner_reads) = with_frame(inner, || record_read(s));
                assert!(inner_reads.contains(&s));
            });
        });

        assert!(outer_reads.is_empty());
    }

    #[test]
    fn is_running_sees_the_whole_stack() {
        let outer = ComputationId::next();
        let inner = ComputationId::next();

        with_frame(outer, || {
            with_frame(inner, || {
                assert!(is_running(outer));
                assert!(is_running(inner));
            });
            assert!(!is_running(inner));
        });

        assert!(!is_running(outer));
    }

    #[test]
    fn unwinding_discards_the_frame() {
        let id = ComputationId::next();

        let result = std::panic::catch_unwind(|| {
            with_frame(id, || {
                record_read(SignalId::next());
                panic!("boom");
            })
        });
        assert!(result.is_err());

        // the stack is clean again
        assert!(!is_running(id));
        let ((), reads) = with_frame(ComputationId::next(), || {});
        assert!(reads.is_empty());
    }
}
