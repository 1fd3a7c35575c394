//! Ownership scopes.
//!
//! Every computation belongs to an owner: the computation or [`root`] scope
//! that was executing when it was created. Disposing an owner tears down its
//! whole subtree depth-first, which is how scoped consumers release their
//! reactions when they go away.
//!
//! The owner stack is distinct from the tracking stack: tracking decides
//! which reads become dependencies, ownership decides who dies with whom.
//! Computations created with no active owner are parked in a process-wide
//! registry and live until explicitly disposed.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::debug;

/// A node in the ownership tree.
pub(crate) trait DisposeNode: Send + Sync {
    /// Tear the node down. Idempotent.
    fn dispose(&self);

    /// Whether the node has been disposed.
    fn is_disposed(&self) -> bool;
}

/// The children owned by a computation or scope.
pub(crate) struct Children {
    list: Mutex<SmallVec<[Arc<dyn DisposeNode>; 2]>>,
}

impl Children {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            list: Mutex::new(SmallVec::new()),
        })
    }

    fn adopt(&self, node: Arc<dyn DisposeNode>) {
        self.list.lock().push(node);
    }

    /// Dispose every child, depth-first.
    pub(crate) fn dispose_all(&self) {
        let drained: SmallVec<[Arc<dyn DisposeNode>; 2]> = {
            let mut list = self.list.lock();
            std::mem::take(&mut *list)
        };
        for child in drained {
            child.dispose();
        }
    }
}

thread_local! {
    static OWNERS: RefCell<SmallVec<[Arc<Children>; 4]>> = RefCell::new(SmallVec::new());
}

static UNOWNED: OnceLock<Mutex<Vec<Arc<dyn DisposeNode>>>> = OnceLock::new();

fn unowned() -> &'static Mutex<Vec<Arc<dyn DisposeNode>>> {
    UNOWNED.get_or_init(|| Mutex::new(Vec::new()))
}

/// Attach a freshly created computation or scope to the enclosing owner, or
/// park it in the process-wide registry when none is active.
pub(crate) fn adopt(node: Arc<dyn DisposeNode>) {
    let owner = OWNERS.with(|owners| owners.borrow().last().cloned());
    match owner {
        Some(children) => children.adopt(node),
        None => {
            let mut parked = unowned().lock();
            parked.retain(|n| !n.is_disposed());
            parked.push(node);
        }
    }
}

/// Run `f` with the given children list as the active owner.
pub(crate) fn with_owner<R>(children: &Arc<Children>, f: impl FnOnce() -> R) -> R {
    OWNERS.with(|owners| owners.borrow_mut().push(Arc::clone(children)));
    struct OwnerGuard;
    impl Drop for OwnerGuard {
        fn drop(&mut self) {
            OWNERS.with(|owners| {
                owners.borrow_mut().pop();
            });
        }
    }
    let _guard = OwnerGuard;
    f()
}

/// Disposal scope handle returned by [`root`].
///
/// Cloning the handle clones the reference; `dispose` on any clone tears
/// down every computation created inside the scope.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<ScopeInner>,
}

struct ScopeInner {
    children: Arc<Children>,
    disposed: AtomicBool,
}

impl DisposeNode for ScopeInner {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        debug!("disposing scope");
        self.children.dispose_all();
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Scope {
    /// Tear down every computation created inside this scope. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Whether the scope has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.is_disposed()
    }
}

/// Create a disposal scope.
///
/// Computations created while `f` runs become children of the scope; calling
/// `dispose` on the handle (inside `f` or any time later) tears them all
/// down. Nested scopes become children of the enclosing owner, so disposing
/// an outer scope reaches them too.
pub fn root<R>(f: impl FnOnce(Scope) -> R) -> R {
    let scope = Scope {
        inner: Arc::new(ScopeInner {
            children: Children::new(),
            disposed: AtomicBool::new(false),
        }),
    };
    adopt(scope.inner.clone());
    let children = Arc::clone(&scope.inner.children);
    with_owner(&children, || f(scope))
}
