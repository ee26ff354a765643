use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::nn::NearestNeighbors;
use crate::node::{Link, Node, NodeRef};
use crate::pool::Pool;
use crate::scenario::{Scenario, Space, State};
use crate::search::{Worker, WorkerStats};
use crate::tree::SolutionTracker;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("there are no valid initial states")]
    NoStartStates,

    #[error("start state is invalid")]
    InvalidStart,
}

/// Violations reported by [`Planner::audit`].
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("node has no link")]
    MissingLink,

    #[error("link does not point back at its node")]
    LinkNodeMismatch,

    #[error("link cost {cost} is negative")]
    NegativeCost { cost: f64 },

    #[error("child cost {child} is below parent cost {parent}")]
    CostOrder { child: f64, parent: f64 },

    #[error("edge cost {edge} does not match state distance {distance}")]
    EdgeLength { edge: f64, distance: f64 },

    #[error("parent chain did not reach a start link within {steps} steps")]
    ParentCycle { steps: usize },
}

/// Summary returned by a successful [`Planner::audit`].
#[derive(Debug, Clone, Copy)]
pub struct AuditReport {
    pub nodes: usize,
    pub goal_nodes: usize,
    pub max_depth: usize,
}

// ---------------------------------------------------------------------------
// WorkerArenas — planner-retained node/link storage
// ---------------------------------------------------------------------------

/// A worker's arenas, handed back to the planner when the worker finishes so
/// that every node and link outlives the solve.
pub(crate) struct WorkerArenas<S> {
    pub(crate) nodes: Pool<Node<S>>,
    pub(crate) links: Pool<Link<S>>,
}

impl<S> WorkerArenas<S> {
    fn new() -> Self {
        Self {
            nodes: Pool::new(),
            links: Pool::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Parallel RRT* planner over a scenario and a nearest-neighbour index.
///
/// Register start states, tune the knobs, then `solve` with a termination
/// predicate. Solving repeatedly keeps refining the same tree.
pub struct Planner<C: Scenario, N: NearestNeighbors<State<C>>> {
    scenario: C,
    index: N,
    max_distance: f64,
    goal_bias: f64,
    rewire_factor: f64,
    k_rrt: f64,
    max_goals: usize,
    workers: usize,
    seed: u64,
    solution: SolutionTracker<State<C>>,
    goal_count: AtomicUsize,
    starts: Mutex<WorkerArenas<State<C>>>,
    retired: Mutex<Vec<WorkerArenas<State<C>>>>,
    stats: WorkerStats,
}

impl<C, N> Planner<C, N>
where
    C: Scenario,
    N: NearestNeighbors<State<C>>,
{
    pub fn new(scenario: C, index: N) -> Self {
        let mut planner = Self {
            scenario,
            index,
            max_distance: f64::INFINITY,
            goal_bias: 0.01,
            rewire_factor: 1.1,
            k_rrt: 0.0,
            max_goals: 1,
            workers: thread::available_parallelism().map(|n| n.get()).unwrap_or(1),
            seed: rand::random(),
            solution: SolutionTracker::new(),
            goal_count: AtomicUsize::new(0),
            starts: Mutex::new(WorkerArenas::new()),
            retired: Mutex::new(Vec::new()),
            stats: WorkerStats::default(),
        };
        planner.recalculate_rewiring_bounds();
        planner
    }

    fn recalculate_rewiring_bounds(&mut self) {
        let dim = self.scenario.space().dimensions() as f64;
        self.k_rrt = self.rewire_factor * std::f64::consts::E * (1.0 + 1.0 / dim);
    }

    // --- Configuration ---

    /// Maximum edge length (steering range).
    pub fn set_range(&mut self, range: f64) {
        assert!(range > 0.0);
        self.max_distance = range;
    }

    pub fn range(&self) -> f64 {
        self.max_distance
    }

    /// Probability of drawing from the goal region, spread across the pool.
    pub fn set_goal_bias(&mut self, bias: f64) {
        assert!((0.0..=1.0).contains(&bias));
        self.goal_bias = bias;
    }

    pub fn goal_bias(&self) -> f64 {
        self.goal_bias
    }

    /// Multiplier on the Karaman–Frazzoli rewiring lower bound.
    pub fn set_rewire_factor(&mut self, factor: f64) {
        assert!(factor > 0.0);
        self.rewire_factor = factor;
        self.recalculate_rewiring_bounds();
    }

    /// Goal samples to take before goal-biased sampling stops.
    pub fn set_max_goals(&mut self, max_goals: usize) {
        self.max_goals = max_goals;
    }

    pub fn set_workers(&mut self, workers: usize) {
        assert!(workers >= 1);
        self.workers = workers;
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Base RNG seed; worker `i` derives its stream from `seed + i`.
    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    // --- Introspection ---

    /// Nodes in the motion tree.
    pub fn size(&self) -> usize {
        self.index.len()
    }

    pub fn solved(&self) -> bool {
        !self.solution.get().is_null()
    }

    pub fn solution_cost(&self) -> Option<f64> {
        let link = self.solution.get();
        if link.is_null() {
            None
        } else {
            Some(unsafe { (*link).cost() })
        }
    }

    /// Best known path, start to goal. Empty when unsolved.
    pub fn solution(&self) -> Vec<State<C>> {
        let mut path = Vec::new();
        let mut link = self.solution.get();
        if link.is_null() {
            return path;
        }
        unsafe {
            loop {
                path.push((*(*link).node_ptr()).state().clone());
                let parent = (*link).parent(Ordering::Acquire);
                if parent.is_null() {
                    break;
                }
                // Follow the parent node's current best link, not the edge
                // the solution was built with; upstream improvements apply
                // immediately.
                link = (*(*parent).node_ptr()).link(Ordering::Acquire);
            }
        }
        path.reverse();
        path
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn print_stats(&self) {
        info!(nodes = self.index.len(), "nodes in graph");
        self.stats.log();
        match self.solution_cost() {
            Some(cost) => info!(cost, "final solution cost"),
            None => info!("no solution found"),
        }
    }

    // --- Problem setup ---

    /// Register a start state: a node with a synthetic zero-cost link.
    pub fn add_start(&self, state: State<C>) -> Result<(), PlanError> {
        if !self.scenario.valid(&state) {
            return Err(PlanError::InvalidStart);
        }
        let arenas = self.starts.lock();
        let node = arenas.nodes.alloc(Node::new(state, false));
        let link = arenas.links.alloc(Link::new(node, ptr::null_mut(), 0.0));
        unsafe {
            (*node).store_link(link, Ordering::Release);
        }
        self.index.insert(NodeRef(node));
        Ok(())
    }

    // --- Solving ---

    /// Run the worker pool until `done` returns true. The predicate is
    /// polled once per sample by every worker.
    pub fn solve<F>(&mut self, done: F) -> Result<(), PlanError>
    where
        F: Fn() -> bool + Sync,
    {
        if self.index.len() == 0 {
            return Err(PlanError::NoStartStates);
        }

        debug!(
            range = self.max_distance,
            goal_bias = self.goal_bias,
            k = self.rewire_count(),
            workers = self.workers,
            "solve starting"
        );

        let workers = self.workers.max(1);
        let base_seed = self.seed;
        let this = &*self;
        let done = &done;

        let parts: Vec<(WorkerArenas<State<C>>, WorkerStats)> = thread::scope(|s| {
            let handles: Vec<_> = (0..workers)
                .map(|no| {
                    s.spawn(move || {
                        let mut worker = Worker::new(
                            no,
                            workers,
                            this.scenario.clone(),
                            base_seed.wrapping_add(no as u64),
                        );
                        worker.run(this, done);
                        worker.into_parts()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut stats = self.stats;
        {
            let mut retired = self.retired.lock();
            for (arenas, worker_stats) in parts {
                stats += worker_stats;
                retired.push(arenas);
            }
        }
        self.stats = stats;
        // Fresh streams if solve is called again.
        self.seed = self.seed.wrapping_add(workers as u64);

        match self.solution_cost() {
            Some(cost) => info!(cost, nodes = self.index.len(), "solve finished"),
            None => info!(nodes = self.index.len(), "solve finished without a solution"),
        }
        Ok(())
    }

    /// Solve for a wall-clock duration.
    pub fn solve_for(&mut self, duration: Duration) -> Result<(), PlanError> {
        self.solve_until(Instant::now() + duration)
    }

    /// Solve until a deadline.
    pub fn solve_until(&mut self, deadline: Instant) -> Result<(), PlanError> {
        self.solve(move || Instant::now() >= deadline)
    }

    // --- Diagnostics ---

    /// Traverse every node and check the tree invariants: links point back
    /// at their nodes, costs are non-negative and consistent with the parent
    /// cost plus the edge length, and every parent chain reaches a start.
    pub fn audit(&self) -> Result<AuditReport, AuditError> {
        const EPS: f64 = 1e-6;

        let starts = self.starts.lock();
        let retired = self.retired.lock();

        let mut all: Vec<*const Node<State<C>>> = Vec::new();
        starts.nodes.for_each(|p| all.push(p));
        for arenas in retired.iter() {
            arenas.nodes.for_each(|p| all.push(p));
        }

        let total = all.len();
        let space = self.scenario.space();
        let mut goal_nodes = 0usize;
        let mut max_depth = 0usize;

        for &node in &all {
            unsafe {
                let n = &*node;
                if n.is_goal() {
                    goal_nodes += 1;
                }

                let link = n.link(Ordering::Acquire);
                if link.is_null() {
                    return Err(AuditError::MissingLink);
                }
                if (*link).node_ptr() != node {
                    return Err(AuditError::LinkNodeMismatch);
                }
                let cost = (*link).cost();
                if cost < -EPS {
                    return Err(AuditError::NegativeCost { cost });
                }

                let parent = (*link).parent(Ordering::Acquire);
                if !parent.is_null() {
                    let parent_cost = (*parent).cost();
                    if cost + EPS < parent_cost {
                        return Err(AuditError::CostOrder {
                            child: cost,
                            parent: parent_cost,
                        });
                    }
                    let d = space.distance(n.state(), (*(*parent).node_ptr()).state());
                    if ((cost - parent_cost) - d).abs() > EPS {
                        return Err(AuditError::EdgeLength {
                            edge: cost - parent_cost,
                            distance: d,
                        });
                    }
                }

                let mut cur = link;
                let mut steps = 0usize;
                while !(*cur).parent(Ordering::Acquire).is_null() {
                    cur = (*cur).parent(Ordering::Acquire);
                    steps += 1;
                    if steps > total {
                        return Err(AuditError::ParentCycle { steps });
                    }
                }
                max_depth = max_depth.max(steps);
            }
        }

        Ok(AuditReport {
            nodes: total,
            goal_nodes,
            max_depth,
        })
    }

    // --- Worker-facing internals ---

    pub(crate) fn index(&self) -> &N {
        &self.index
    }

    pub(crate) fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub(crate) fn max_goals(&self) -> usize {
        self.max_goals
    }

    pub(crate) fn goal_count(&self) -> usize {
        self.goal_count.load(Ordering::Relaxed)
    }

    pub(crate) fn solution_tracker(&self) -> &SolutionTracker<State<C>> {
        &self.solution
    }

    /// Number of neighbours to consider: `⌈k_RRT · ln(N + 1)⌉`.
    pub(crate) fn rewire_count(&self) -> usize {
        (self.k_rrt * ((self.index.len() + 1) as f64).ln()).ceil() as usize
    }

    /// A goal node just received a (possibly new) link.
    ///
    /// # Safety
    /// `link` must be a live published link of a goal node.
    pub(crate) unsafe fn found_goal(&self, link: *mut Link<State<C>>) {
        self.goal_count.fetch_add(1, Ordering::Relaxed);
        debug!("added goal");
        self.solution.offer(link);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
