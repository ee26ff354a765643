use std::fmt;
use std::mem;
use std::ops::AddAssign;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::{error, trace};

use crate::nn::NearestNeighbors;
use crate::node::{Link, LinkRef, Node, NodeRef};
use crate::planner::{Planner, WorkerArenas};
use crate::pool::Pool;
use crate::scenario::{Scenario, Space, State};
use crate::tree::{create_link, push_cost_update, set_link};

// ---------------------------------------------------------------------------
// TimerStat / WorkerStats
// ---------------------------------------------------------------------------

/// Call count + accumulated wall time for one instrumented operation.
#[derive(Clone, Copy, Default)]
pub struct TimerStat {
    pub count: u64,
    pub total: Duration,
}

impl TimerStat {
    fn time<R>(&mut self, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        self.total += start.elapsed();
        self.count += 1;
        out
    }
}

impl AddAssign for TimerStat {
    fn add_assign(&mut self, rhs: Self) {
        self.count += rhs.count;
        self.total += rhs.total;
    }
}

impl fmt::Display for TimerStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} calls in {:.3?}", self.count, self.total)
    }
}

/// Per-worker counters, merged across the pool after a solve.
#[derive(Clone, Copy, Default)]
pub struct WorkerStats {
    pub iterations: u64,
    pub biased_samples: u64,
    pub rewire_tests: u64,
    pub rewire_count: u64,
    pub valid_motion: TimerStat,
    pub nearest1: TimerStat,
    pub nearest_k: TimerStat,
}

impl AddAssign for WorkerStats {
    fn add_assign(&mut self, rhs: Self) {
        self.iterations += rhs.iterations;
        self.biased_samples += rhs.biased_samples;
        self.rewire_tests += rhs.rewire_tests;
        self.rewire_count += rhs.rewire_count;
        self.valid_motion += rhs.valid_motion;
        self.nearest1 += rhs.nearest1;
        self.nearest_k += rhs.nearest_k;
    }
}

impl WorkerStats {
    pub fn log(&self) {
        tracing::info!(iterations = self.iterations, biased = self.biased_samples, "samples");
        tracing::info!(
            rewired = self.rewire_count,
            tested = self.rewire_tests,
            "rewires"
        );
        tracing::info!(
            valid_motion = %self.valid_motion,
            nearest_1 = %self.nearest1,
            nearest_k = %self.nearest_k,
            "timers"
        );
    }
}

// ---------------------------------------------------------------------------
// Worker — one sampling thread
// ---------------------------------------------------------------------------

/// One sampling thread's state: its scenario copy, RNG, arenas, scratch
/// buffers, and counters. Built inside the spawned thread; only the arenas
/// and stats come back out.
pub(crate) struct Worker<C: Scenario> {
    no: usize,
    workers: usize,
    concurrent: bool,
    scenario: C,
    rng: SmallRng,
    nodes: Pool<Node<State<C>>>,
    links: Pool<Link<State<C>>>,
    nbh: Vec<(NodeRef<State<C>>, f64)>,
    order: Vec<(LinkRef<State<C>>, usize)>,
    checked: Vec<bool>,
    stats: WorkerStats,
}

impl<C: Scenario> Worker<C> {
    pub(crate) fn new(no: usize, workers: usize, scenario: C, seed: u64) -> Self {
        Self {
            no,
            workers,
            concurrent: workers != 1,
            scenario,
            rng: SmallRng::seed_from_u64(seed),
            nodes: Pool::new(),
            links: Pool::new(),
            nbh: Vec::new(),
            order: Vec::new(),
            checked: Vec::new(),
            stats: WorkerStats::default(),
        }
    }

    pub(crate) fn into_parts(self) -> (WorkerArenas<State<C>>, WorkerStats) {
        (
            WorkerArenas {
                nodes: self.nodes,
                links: self.links,
            },
            self.stats,
        )
    }

    /// Sample until `done` fires. Worker 0 draws from the goal distribution
    /// with the scaled bias until enough goals exist; everyone else samples
    /// uniformly the whole time.
    pub(crate) fn run<N, F>(&mut self, planner: &Planner<C, N>, done: &F)
    where
        N: NearestNeighbors<State<C>>,
        F: Fn() -> bool,
    {
        trace!(worker = self.no, "worker running");

        if self.no == 0 && planner.goal_bias() > 0.0 && self.scenario.has_goal_sampler() {
            // Only one worker biases toward the goal, so its share is scaled
            // by the pool size to keep the effective bias at goal_bias.
            let scaled = (planner.goal_bias() * self.workers as f64).min(1.0);
            trace!(scaled, "goal-biased sampling on worker 0");

            while !done() {
                self.stats.iterations += 1;
                if planner.goal_count() >= planner.max_goals() {
                    break;
                }
                let sample = if self.rng.gen::<f64>() < scaled {
                    self.stats.biased_samples += 1;
                    self.scenario.sample_goal(&mut self.rng)
                } else {
                    self.scenario.sample(&mut self.rng)
                };
                if let Some(q) = sample {
                    self.add_sample(planner, q);
                }
            }
        }

        while !done() {
            self.stats.iterations += 1;
            if let Some(q) = self.scenario.sample(&mut self.rng) {
                self.add_sample(planner, q);
            }
        }

        trace!(worker = self.no, "worker done");
    }

    fn add_sample<N>(&mut self, planner: &Planner<C, N>, q: State<C>)
    where
        N: NearestNeighbors<State<C>>,
    {
        let mut nbh = mem::take(&mut self.nbh);
        let mut order = mem::take(&mut self.order);
        let mut checked = mem::take(&mut self.checked);
        self.sample_step(planner, q, &mut nbh, &mut order, &mut checked);
        self.nbh = nbh;
        self.order = order;
        self.checked = checked;
    }

    fn valid_motion(&mut self, a: &State<C>, b: &State<C>, check_end: bool) -> bool {
        let scenario = &self.scenario;
        self.stats.valid_motion.time(|| {
            if check_end && !scenario.valid(b) {
                return false;
            }
            scenario.link(a, b)
        })
    }

    /// One pass of the rewiring engine: steer, connect through the cheapest
    /// reachable neighbour, publish, then offer the new node as a shortcut
    /// to the rest of the neighbourhood.
    fn sample_step<N>(
        &mut self,
        planner: &Planner<C, N>,
        mut q: State<C>,
        nbh: &mut Vec<(NodeRef<State<C>>, f64)>,
        order: &mut Vec<(LinkRef<State<C>>, usize)>,
        checked: &mut Vec<bool>,
    ) where
        N: NearestNeighbors<State<C>>,
    {
        let index = planner.index();

        // Never empty here: solve refuses to run without start states.
        let (near, mut d_near) = {
            let timer = &mut self.stats.nearest1;
            timer
                .time(|| index.nearest(&q))
                .expect("nearest-neighbour query on an empty index")
        };

        if d_near == 0.0 {
            // Duplicate of an existing state. Zero distance between distinct
            // states would break the planner in other ways, so it is treated
            // as identity.
            return;
        }

        let near_node = near.as_ptr();
        let near_state: &State<C> = unsafe { (*near_node).state() };

        // Steering: cap the edge length at the planner range.
        if d_near > planner.max_distance() {
            let steered =
                self.scenario
                    .space()
                    .interpolate(near_state, &q, planner.max_distance() / d_near);
            q = steered;
            d_near = self.scenario.space().distance(near_state, &q);
        }

        if !self.valid_motion(near_state, &q, true) {
            return;
        }

        let (is_goal, _goal_dist) = self.scenario.goal(&q);

        // Tentative parent: the nearest node's current link.
        let mut parent = unsafe { (*near_node).link(Ordering::Relaxed) };
        let mut parent_cost = unsafe { (*parent).cost() } + d_near;

        let k = planner.rewire_count();
        {
            let timer = &mut self.stats.nearest_k;
            timer.time(|| index.nearest_k(nbh, &q, k));
        }
        self.stats.rewire_tests += nbh.len() as u64;

        order.clear();
        order.extend(nbh.iter().enumerate().map(|(i, (node, _))| {
            (
                LinkRef(unsafe { (*node.as_ptr()).link(Ordering::Relaxed) }),
                i,
            )
        }));
        order.sort_unstable_by_key(|&(link, i)| {
            OrderedFloat(unsafe { (*link.0).cost() } + nbh[i].1)
        });

        checked.clear();
        checked.resize(nbh.len(), false);

        // Walk candidates cheapest-first. Stop at the first one that
        // connects, or as soon as none of the rest can beat the tentative
        // parent.
        for &(LinkRef(nbr_link), i) in order.iter() {
            let new_cost = unsafe { (*nbr_link).cost() } + nbh[i].1;

            if nbr_link == parent && new_cost != parent_cost {
                error!(
                    new_cost,
                    parent_cost, "parent cost mismatch; distance function is inconsistent"
                );
                panic!("parent cost mismatch: {new_cost} != {parent_cost}");
            }
            if new_cost > parent_cost {
                break;
            }
            checked[i] = true;

            let nbr_node = unsafe { (*nbr_link).node_ptr() };
            if nbr_node == near_node
                || self.valid_motion(unsafe { (*nbr_node).state() }, &q, false)
            {
                parent = nbr_link;
                parent_cost = new_cost;
                break;
            }
        }

        let node = self.nodes.alloc(Node::new(q, is_goal));
        let new_link;
        unsafe {
            new_link = create_link(&self.links, node, parent, parent_cost);
            if self.concurrent {
                set_link(node, new_link, &self.links, planner.solution_tracker());
            } else {
                (*node).store_link(new_link, Ordering::Release);
            }
            // The attach may have re-homed the link under a cheaper winner;
            // price rewires through the link as it actually is.
            parent_cost = (*new_link).cost();
        }

        index.insert(NodeRef(node));

        if is_goal {
            unsafe {
                planner.found_goal(new_link);
            }
        }

        // Rewire pass, nearest first. Neighbours already probed during
        // parent selection are skipped.
        let new_state = unsafe { (*node).state() };
        for (i, &(nbr, nbr_dist)) in nbh.iter().enumerate() {
            if checked[i] {
                continue;
            }
            let nbr_node = nbr.as_ptr();
            debug_assert!(nbr_node != unsafe { (*parent).node_ptr() });

            let nbr_link = unsafe { (*nbr_node).link(Ordering::Acquire) };
            let new_cost = parent_cost + nbr_dist;
            if new_cost < unsafe { (*nbr_link).cost() }
                && self.valid_motion(new_state, unsafe { (*nbr_node).state() }, false)
            {
                self.stats.rewire_count += 1;
                unsafe {
                    if self.concurrent {
                        let candidate =
                            create_link(&self.links, nbr_node, new_link, new_cost);
                        set_link(nbr_node, candidate, &self.links, planner.solution_tracker());
                    } else {
                        // Standard RRT*: reuse the existing link and push the
                        // saving down its subtree in place.
                        let delta = (*nbr_link).cost() - new_cost;
                        (*nbr_link).reparent(new_link);
                        (*nbr_link).set_cost(new_cost);
                        push_cost_update(nbr_link, delta, planner.solution_tracker());
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_accumulates() {
        let mut t = TimerStat::default();
        let v = t.time(|| 41 + 1);
        assert_eq!(v, 42);
        t.time(|| ());
        assert_eq!(t.count, 2);
    }

    #[test]
    fn stats_merge() {
        let mut a = WorkerStats {
            iterations: 10,
            biased_samples: 1,
            rewire_tests: 100,
            rewire_count: 5,
            ..Default::default()
        };
        let b = WorkerStats {
            iterations: 7,
            biased_samples: 2,
            rewire_tests: 50,
            rewire_count: 3,
            ..Default::default()
        };
        a += b;
        assert_eq!(a.iterations, 17);
        assert_eq!(a.biased_samples, 3);
        assert_eq!(a.rewire_tests, 150);
        assert_eq!(a.rewire_count, 8);
    }
}
