use std::mem;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use tracing::info;

use crate::node::{Link, Node};
use crate::pool::Pool;

// ---------------------------------------------------------------------------
// SolutionTracker — monotonically improving best goal link
// ---------------------------------------------------------------------------

/// Atomic pointer to the cheapest known goal-reaching link.
///
/// Once non-null it only ever moves to links of strictly lower cost.
pub(crate) struct SolutionTracker<S> {
    best: AtomicPtr<Link<S>>,
}

impl<S> SolutionTracker<S> {
    pub(crate) fn new() -> Self {
        Self {
            best: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn get(&self) -> *mut Link<S> {
        self.best.load(Ordering::Acquire)
    }

    /// Install `link` as the solution iff it beats the current one.
    ///
    /// # Safety
    /// `link` must be a live, published link whose node is a goal node.
    pub(crate) unsafe fn offer(&self, link: *mut Link<S>) {
        let cost = (*link).cost();
        let mut prev = self.best.load(Ordering::Acquire);
        loop {
            if !prev.is_null() && cost >= (*prev).cost() {
                return;
            }
            match self
                .best
                .compare_exchange_weak(prev, link, Ordering::Release, Ordering::Acquire)
            {
                Ok(_) => {
                    if prev.is_null() {
                        info!(cost, "found initial solution");
                    } else if (*prev).node_ptr() == (*link).node_ptr() {
                        info!(cost, "solution improved");
                    } else {
                        info!(cost, "solution changed");
                    }
                    return;
                }
                Err(p) => prev = p,
            }
        }
    }

    /// Plain store, single-worker mode.
    pub(crate) unsafe fn install(&self, link: *mut Link<S>) {
        let prev = self.best.load(Ordering::Relaxed);
        self.best.store(link, Ordering::Release);
        let cost = (*link).cost();
        if prev.is_null() {
            info!(cost, "found initial solution");
        } else {
            info!(cost, "solution changed");
        }
    }
}

// Safety: the tracker only holds a pointer into planner-lifetime pools.
unsafe impl<S: Send + Sync> Send for SolutionTracker<S> {}
unsafe impl<S: Send + Sync> Sync for SolutionTracker<S> {}

// ---------------------------------------------------------------------------
// Link creation + parent-side attach
// ---------------------------------------------------------------------------

/// Allocate a link for `node` under `parent` and hang it on the parent's
/// child list, returning the link that should be published for `node`.
///
/// The attach must cooperate with the detach in [`set_link`]: a parent that
/// lost its node's link CAS is drained exactly once by the winner, and a
/// child pushed after that drain would be missed. So after every push CAS —
/// successful or not — the parent node's active link is re-read, and if the
/// parent has been defeated the child is re-homed onto the winner with the
/// migration cost adjustment. A child that was both pushed and drained gets
/// migrated twice; `set_link`'s monotonicity test turns the second migration
/// into a no-op, so the stale list entry is harmless.
///
/// # Safety
/// `node` and `parent` must be live tree pointers; `parent` must be non-null
/// (start links are published directly, never attached).
pub(crate) unsafe fn create_link<S>(
    links: &Pool<Link<S>>,
    node: *const Node<S>,
    parent: *mut Link<S>,
    cost: f64,
) -> *mut Link<S> {
    let mut link = links.alloc(Link::new(node, parent, cost));
    loop {
        let parent = (*link).parent(Ordering::Relaxed);
        let head = (*parent).first_child(Ordering::Relaxed);
        (*link).set_next_sibling(head, Ordering::Relaxed);
        let pushed = (*parent).cas_first_child(head, link).is_ok();

        let active = (*(*parent).node_ptr()).link(Ordering::Acquire);
        if active == parent {
            if pushed {
                return link;
            }
            continue;
        }

        // The parent lost its node's link while we were attaching; route the
        // child to the winner, lifted by the cost the winner saved.
        let delta = (*parent).cost() - (*active).cost();
        debug_assert!(delta >= 0.0, "a defeated link cannot be cheaper than its winner");
        link = links.alloc(Link::new(node, active, (*link).cost() - delta));
    }
}

// ---------------------------------------------------------------------------
// set_link — CAS replace + child subtree migration
// ---------------------------------------------------------------------------

/// Publish `candidate` as `node`'s link and migrate the defeated link's child
/// subtrees onto the winner, each lifted by the cost saving.
///
/// If the node's current link is already at least as cheap, roles swap: the
/// candidate becomes the defeated side and its children (if any) migrate into
/// the current link. Either way, exactly one thread ends up owning each
/// defeated link and drains it.
///
/// # Safety
/// `node` must be live; `candidate` must be a freshly created link for `node`
/// whose parent chain is already published (this is what rules out cycles).
pub(crate) unsafe fn set_link<S>(
    node: *const Node<S>,
    candidate: *mut Link<S>,
    links: &Pool<Link<S>>,
    solution: &SolutionTracker<S>,
) {
    let n = &*node;
    let mut old = n.link(Ordering::Relaxed);
    let mut new = candidate;
    loop {
        if !old.is_null() && (*old).cost() <= (*new).cost() {
            // The existing link is at least as good; migrate in reverse.
            mem::swap(&mut old, &mut new);
            break;
        }
        match n.cas_link(old, new) {
            Ok(_) => break,
            Err(cur) => old = cur,
        }
    }

    if n.is_goal() {
        // `new` is the node's active link at this point, whichever side won.
        solution.offer(new);
    }

    if old.is_null() {
        // First publication.
        return;
    }

    // The defeated link is now owned by this thread.
    let mut defeated = old;
    let mut winner = new;
    loop {
        let delta = (*defeated).cost() - (*winner).cost();
        debug_assert!(delta >= 0.0, "migration delta must not be negative");

        // Atomically take the defeated link's child list. Another worker may
        // still be pushing onto it; its attach re-check routes such children
        // to the winner itself.
        let mut first = (*defeated).first_child(Ordering::Relaxed);
        loop {
            match (*defeated).cas_first_child(first, ptr::null_mut()) {
                Ok(_) => break,
                Err(cur) => first = cur,
            }
        }

        let mut child = first;
        while !child.is_null() {
            let child_node = (*child).node_ptr();
            let lifted = create_link(links, child_node, winner, (*child).cost() - delta);
            set_link(child_node, lifted, links, solution);
            child = (*child).next_sibling(Ordering::Acquire);
        }

        // All children moved over. If the winner has itself been replaced in
        // the meantime, any children attached to it must move again.
        defeated = winner;
        winner = n.link(Ordering::Acquire);
        if defeated == winner {
            return;
        }
    }
}

// ---------------------------------------------------------------------------
// Single-worker cost push-down
// ---------------------------------------------------------------------------

/// Propagate an in-place cost reduction of `link` down its subtree.
///
/// Single-worker mode only: costs are overwritten rather than republished,
/// and the child lists are exact (see [`Link::reparent`]).
///
/// # Safety
/// Caller must guarantee exclusive access to the tree and that `link`'s cost
/// has already been lowered by `delta`.
pub(crate) unsafe fn push_cost_update<S>(
    link: *mut Link<S>,
    delta: f64,
    solution: &SolutionTracker<S>,
) {
    debug_assert!(delta > 0.0);
    let l = &*link;

    if (*l.node_ptr()).is_goal() {
        let prev = solution.get();
        if prev == link {
            // Already the solution; its cost just dropped in place.
            info!(cost = l.cost(), "solution improved");
        } else if prev.is_null() || l.cost() < (*prev).cost() {
            solution.install(link);
        }
    }

    let mut child = l.first_child(Ordering::Relaxed);
    while !child.is_null() {
        (*child).set_cost((*child).cost() - delta);
        push_cost_update(child, delta, solution);
        child = (*child).next_sibling(Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
