use atomic_float::AtomicF64;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

// ---------------------------------------------------------------------------
// Node — an immutable configuration plus its currently-best incoming edge
// ---------------------------------------------------------------------------

/// One sampled configuration in the motion tree.
///
/// The state and the goal flag are fixed at creation; the only mutable part
/// is `link`, the pointer to the node's currently-best [`Link`], which is
/// replaced by CAS as cheaper routes are discovered.
pub struct Node<S> {
    state: S,
    is_goal: bool,
    link: AtomicPtr<Link<S>>,
}

impl<S> Node<S> {
    pub(crate) fn new(state: S, is_goal: bool) -> Self {
        Self {
            state,
            is_goal,
            link: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn state(&self) -> &S {
        &self.state
    }

    pub fn is_goal(&self) -> bool {
        self.is_goal
    }

    /// Current best link. Non-null for every node published to the index.
    pub fn link(&self, order: Ordering) -> *mut Link<S> {
        self.link.load(order)
    }

    pub(crate) fn store_link(&self, link: *mut Link<S>, order: Ordering) {
        self.link.store(link, order);
    }

    pub(crate) fn cas_link(
        &self,
        current: *mut Link<S>,
        new: *mut Link<S>,
    ) -> Result<*mut Link<S>, *mut Link<S>> {
        self.link
            .compare_exchange_weak(current, new, Ordering::Release, Ordering::Relaxed)
    }
}

// Safety: `Node` is shared across worker threads through raw pointers into
// planner-lifetime pools. All mutation goes through the atomic `link` field.
unsafe impl<S: Send + Sync> Send for Node<S> {}
unsafe impl<S: Send + Sync> Sync for Node<S> {}

// ---------------------------------------------------------------------------
// Link — a candidate parent edge, carrying accumulated cost
// ---------------------------------------------------------------------------

/// A parent edge for a node. `parent` is null only for start links.
///
/// With more than one worker, `parent` and `cost` are written once before the
/// link is published and never touched again — a cost change allocates a new
/// link. With exactly one worker both are overwritten in place (`set_cost`,
/// `reparent`), trading allocations for direct mutation.
///
/// `first_child` / `next_sibling` form an intrusive singly-linked list of the
/// links whose `parent` is this link. The list is a best-effort cache used to
/// push cost reductions down the subtree; the tree itself is defined by the
/// parent pointers.
pub struct Link<S> {
    node: *const Node<S>,
    parent: AtomicPtr<Link<S>>,
    cost: AtomicF64,
    first_child: AtomicPtr<Link<S>>,
    next_sibling: AtomicPtr<Link<S>>,
}

impl<S> Link<S> {
    pub(crate) fn new(node: *const Node<S>, parent: *mut Link<S>, cost: f64) -> Self {
        Self {
            node,
            parent: AtomicPtr::new(parent),
            cost: AtomicF64::new(cost),
            first_child: AtomicPtr::new(ptr::null_mut()),
            next_sibling: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn node_ptr(&self) -> *const Node<S> {
        self.node
    }

    pub fn cost(&self) -> f64 {
        // Written before publication (release CAS on the owning node's link),
        // so a relaxed load observes the right value on any path that found
        // this link through an acquire load.
        self.cost.load(Ordering::Relaxed)
    }

    pub fn parent(&self, order: Ordering) -> *mut Link<S> {
        self.parent.load(order)
    }

    pub fn first_child(&self, order: Ordering) -> *mut Link<S> {
        self.first_child.load(order)
    }

    pub fn next_sibling(&self, order: Ordering) -> *mut Link<S> {
        self.next_sibling.load(order)
    }

    pub(crate) fn set_next_sibling(&self, next: *mut Link<S>, order: Ordering) {
        self.next_sibling.store(next, order);
    }

    pub(crate) fn cas_first_child(
        &self,
        current: *mut Link<S>,
        new: *mut Link<S>,
    ) -> Result<*mut Link<S>, *mut Link<S>> {
        self.first_child
            .compare_exchange_weak(current, new, Ordering::Release, Ordering::Relaxed)
    }

    /// Overwrite the cost in place. Single-worker mode only.
    pub(crate) fn set_cost(&self, cost: f64) {
        self.cost.store(cost, Ordering::Relaxed);
    }

    /// Move this link under a new parent, unlinking it from the old parent's
    /// child list first. Single-worker mode only: a stale entry left in the
    /// old list would receive cost deltas for a subtree it no longer roots.
    ///
    /// # Safety
    /// Caller must guarantee exclusive access to the tree (one worker) and
    /// that `new_parent` is a live link in the same tree.
    pub(crate) unsafe fn reparent(&self, new_parent: *mut Link<S>) {
        let me = self as *const Link<S> as *mut Link<S>;
        let old_parent = self.parent.load(Ordering::Relaxed);
        debug_assert!(!old_parent.is_null(), "reparent: start links have no parent");

        let mut cur = (*old_parent).first_child.load(Ordering::Relaxed);
        if cur == me {
            (*old_parent)
                .first_child
                .store(self.next_sibling.load(Ordering::Relaxed), Ordering::Relaxed);
        } else {
            while !cur.is_null() {
                let next = (*cur).next_sibling.load(Ordering::Relaxed);
                if next == me {
                    (*cur)
                        .next_sibling
                        .store(self.next_sibling.load(Ordering::Relaxed), Ordering::Relaxed);
                    break;
                }
                cur = next;
            }
        }

        self.parent.store(new_parent, Ordering::Relaxed);
        let head = (*new_parent).first_child.load(Ordering::Relaxed);
        self.next_sibling.store(head, Ordering::Relaxed);
        (*new_parent).first_child.store(me, Ordering::Relaxed);
    }
}

// Safety: same sharing model as `Node`; the raw `node` back-reference points
// into a planner-lifetime pool.
unsafe impl<S: Send + Sync> Send for Link<S> {}
unsafe impl<S: Send + Sync> Sync for Link<S> {}

// ---------------------------------------------------------------------------
// NodeRef / LinkRef — Send + Sync pointer handles
// ---------------------------------------------------------------------------

/// Handle to a node in the tree, as stored in the nearest-neighbour index.
///
/// Only the planner mints these, and the pointee lives in a pool owned by the
/// planner, so a `NodeRef` is valid for as long as the planner that produced
/// it.
pub struct NodeRef<S>(pub(crate) *const Node<S>);

impl<S> NodeRef<S> {
    pub fn state(&self) -> &S {
        unsafe { (*self.0).state() }
    }

    pub fn is_goal(&self) -> bool {
        unsafe { (*self.0).is_goal() }
    }

    pub(crate) fn as_ptr(&self) -> *const Node<S> {
        self.0
    }
}

impl<S> Clone for NodeRef<S> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<S> Copy for NodeRef<S> {}

impl<S> PartialEq for NodeRef<S> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}
impl<S> Eq for NodeRef<S> {}

impl<S> std::fmt::Debug for NodeRef<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NodeRef({:p})", self.0)
    }
}

// Safety: the pointee is shared planner-lifetime data (see `Node`).
unsafe impl<S: Send + Sync> Send for NodeRef<S> {}
unsafe impl<S: Send + Sync> Sync for NodeRef<S> {}

/// Crate-internal handle to a link, used for scratch buffers that outlive a
/// single sample (the worker's candidate sort).
pub(crate) struct LinkRef<S>(pub(crate) *mut Link<S>);

impl<S> Clone for LinkRef<S> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<S> Copy for LinkRef<S> {}

// Safety: as `NodeRef`.
unsafe impl<S: Send + Sync> Send for LinkRef<S> {}
unsafe impl<S: Send + Sync> Sync for LinkRef<S> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
