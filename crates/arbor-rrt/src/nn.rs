use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};

use ordered_float::OrderedFloat;
use parking_lot::RwLock;

use crate::node::{Node, NodeRef};
use crate::scenario::Space;

// ---------------------------------------------------------------------------
// NearestNeighbors trait
// ---------------------------------------------------------------------------

/// Nearest-neighbour index over tree nodes.
///
/// The planner treats the index as a black box; it only needs concurrent
/// `insert` and concurrent queries (all workers hit it every sample). Results
/// of `nearest_k` are sorted by ascending distance.
pub trait NearestNeighbors<S>: Send + Sync {
    fn insert(&self, node: NodeRef<S>);

    /// Closest node to `state`, or `None` when the index is empty.
    fn nearest(&self, state: &S) -> Option<(NodeRef<S>, f64)>;

    /// Fill `out` with up to `k` nearest nodes, ascending by distance.
    fn nearest_k(&self, out: &mut Vec<(NodeRef<S>, f64)>, state: &S, k: usize);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// LinearIndex — segmented append-only store with linear scans
// ---------------------------------------------------------------------------

/// Elements per segment. Segments are allocated whole, so reads never see a
/// slot move; the write lock is only taken to append a segment.
const SEGMENT_SIZE: usize = 4096;

struct Segment<S> {
    slots: Box<[AtomicPtr<Node<S>>]>,
}

impl<S> Segment<S> {
    fn new(size: usize) -> Self {
        let slots: Box<[AtomicPtr<Node<S>>]> = (0..size)
            .map(|_| AtomicPtr::new(std::ptr::null_mut()))
            .collect();
        Self { slots }
    }
}

/// Baseline index: lock-free appends into fixed segments, brute-force scans.
///
/// Quadratic over a whole solve, which is fine for tests and small problems;
/// swap in a spatial index via [`NearestNeighbors`] when it matters.
pub struct LinearIndex<P: Space> {
    space: P,
    segments: RwLock<Vec<Segment<P::State>>>,
    len: AtomicUsize,
}

impl<P: Space> LinearIndex<P> {
    pub fn new(space: P) -> Self {
        Self {
            space,
            segments: RwLock::new(Vec::new()),
            len: AtomicUsize::new(0),
        }
    }

    pub fn space(&self) -> &P {
        &self.space
    }

    /// Visit every published node. Slots claimed by in-flight inserts are
    /// skipped.
    fn scan(&self, mut f: impl FnMut(NodeRef<P::State>)) {
        let n = self.len.load(Ordering::Acquire);
        let segments = self.segments.read();
        let mut remaining = n;
        for segment in segments.iter() {
            if remaining == 0 {
                break;
            }
            for slot in segment.slots.iter().take(remaining) {
                let p = slot.load(Ordering::Acquire);
                if !p.is_null() {
                    f(NodeRef(p));
                }
            }
            remaining = remaining.saturating_sub(segment.slots.len());
        }
    }
}

impl<P: Space> NearestNeighbors<P::State> for LinearIndex<P> {
    fn insert(&self, node: NodeRef<P::State>) {
        let idx = self.len.fetch_add(1, Ordering::AcqRel);
        let seg = idx / SEGMENT_SIZE;
        let off = idx % SEGMENT_SIZE;

        {
            let segments = self.segments.read();
            if seg < segments.len() {
                segments[seg].slots[off].store(node.as_ptr() as *mut _, Ordering::Release);
                return;
            }
        }

        let mut segments = self.segments.write();
        while segments.len() <= seg {
            segments.push(Segment::new(SEGMENT_SIZE));
        }
        segments[seg].slots[off].store(node.as_ptr() as *mut _, Ordering::Release);
    }

    fn nearest(&self, state: &P::State) -> Option<(NodeRef<P::State>, f64)> {
        let mut best: Option<(NodeRef<P::State>, f64)> = None;
        self.scan(|node| {
            let d = self.space.distance(node.state(), state);
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((node, d)),
            }
        });
        best
    }

    fn nearest_k(&self, out: &mut Vec<(NodeRef<P::State>, f64)>, state: &P::State, k: usize) {
        out.clear();
        if k == 0 {
            return;
        }

        // Max-heap of the k best seen so far, keyed by distance.
        let mut heap: BinaryHeap<(OrderedFloat<f64>, usize)> = BinaryHeap::with_capacity(k + 1);
        self.scan(|node| {
            let d = OrderedFloat(self.space.distance(node.state(), state));
            if heap.len() < k {
                heap.push((d, node.as_ptr() as usize));
            } else if let Some(&(worst, _)) = heap.peek() {
                if d < worst {
                    heap.pop();
                    heap.push((d, node.as_ptr() as usize));
                }
            }
        });

        out.extend(
            heap.into_sorted_vec()
                .into_iter()
                .map(|(d, p)| (NodeRef(p as *const Node<P::State>), d.0)),
        );
    }

    fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Pool;
    use crate::test_util::PlaneSpace;

    fn make_nodes(pool: &Pool<Node<[f64; 2]>>, states: &[[f64; 2]]) -> Vec<NodeRef<[f64; 2]>> {
        states
            .iter()
            .map(|&s| NodeRef(pool.alloc(Node::new(s, false)) as *const _))
            .collect()
    }

    #[test]
    fn empty_index_has_no_nearest() {
        let index = LinearIndex::new(PlaneSpace);
        assert_eq!(index.len(), 0);
        assert!(index.nearest(&[0.5, 0.5]).is_none());

        let mut out = Vec::new();
        index.nearest_k(&mut out, &[0.5, 0.5], 4);
        assert!(out.is_empty());
    }

    #[test]
    fn nearest_finds_closest() {
        let pool = Pool::new();
        let index = LinearIndex::new(PlaneSpace);
        let nodes = make_nodes(&pool, &[[0.0, 0.0], [0.5, 0.5], [1.0, 1.0]]);
        for &n in &nodes {
            index.insert(n);
        }

        let (hit, d) = index.nearest(&[0.6, 0.6]).unwrap();
        assert_eq!(hit, nodes[1]);
        assert!((d - (2.0f64).sqrt() * 0.1).abs() < 1e-9);
    }

    #[test]
    fn nearest_k_sorted_ascending() {
        let pool = Pool::new();
        let index = LinearIndex::new(PlaneSpace);
        let nodes = make_nodes(
            &pool,
            &[[0.0, 0.0], [0.2, 0.0], [0.4, 0.0], [0.6, 0.0], [0.8, 0.0]],
        );
        for &n in &nodes {
            index.insert(n);
        }

        let mut out = Vec::new();
        index.nearest_k(&mut out, &[0.0, 0.0], 3);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, nodes[0]);
        assert_eq!(out[1].0, nodes[1]);
        assert_eq!(out[2].0, nodes[2]);
        assert!(out[0].1 <= out[1].1 && out[1].1 <= out[2].1);
    }

    #[test]
    fn nearest_k_caps_at_index_size() {
        let pool = Pool::new();
        let index = LinearIndex::new(PlaneSpace);
        for &n in &make_nodes(&pool, &[[0.1, 0.1], [0.9, 0.9]]) {
            index.insert(n);
        }

        let mut out = Vec::new();
        index.nearest_k(&mut out, &[0.0, 0.0], 10);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn concurrent_inserts_land() {
        let pool = Pool::new();
        let index = LinearIndex::new(PlaneSpace);

        // Pre-allocate nodes on the main thread; threads only insert.
        let nodes = make_nodes(
            &pool,
            &(0..10_000)
                .map(|i| [i as f64 * 1e-4, 0.0])
                .collect::<Vec<_>>(),
        );

        std::thread::scope(|s| {
            for chunk in nodes.chunks(2500) {
                let index = &index;
                s.spawn(move || {
                    for &n in chunk {
                        index.insert(n);
                    }
                });
            }
        });

        assert_eq!(index.len(), 10_000);
        let (_, d) = index.nearest(&[0.0, 0.0]).unwrap();
        assert!(d.abs() < 1e-12);
    }
}
