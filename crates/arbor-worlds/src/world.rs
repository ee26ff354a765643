use arbor_rrt::{Scenario, Space};
use rand::Rng;

use crate::space::EuclideanSpace;

// ---------------------------------------------------------------------------
// Aabb — axis-aligned box obstacle
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
pub struct Aabb {
    pub min: [f64; 2],
    pub max: [f64; 2],
}

impl Aabb {
    pub fn new(min: [f64; 2], max: [f64; 2]) -> Self {
        debug_assert!(min[0] <= max[0] && min[1] <= max[1]);
        Self { min, max }
    }

    pub fn contains(&self, p: &[f64; 2]) -> bool {
        self.min[0] <= p[0] && p[0] <= self.max[0] && self.min[1] <= p[1] && p[1] <= self.max[1]
    }
}

// ---------------------------------------------------------------------------
// RectWorld — planar rectangle with box obstacles and a disc goal
// ---------------------------------------------------------------------------

/// A rectangle in the plane with axis-aligned box obstacles. Motions are
/// straight segments, validated by sampling at a fixed resolution. The goal
/// is a disc, optionally with a sampler for goal-biased planning.
#[derive(Clone, Debug)]
pub struct RectWorld {
    space: EuclideanSpace<2>,
    lo: [f64; 2],
    hi: [f64; 2],
    obstacles: Vec<Aabb>,
    goal_center: [f64; 2],
    goal_radius: f64,
    goal_sampling: bool,
    resolution: f64,
}

impl RectWorld {
    /// Unit square `[0,1]²` with the given goal disc.
    pub fn unit(goal_center: [f64; 2], goal_radius: f64) -> Self {
        Self {
            space: EuclideanSpace,
            lo: [0.0, 0.0],
            hi: [1.0, 1.0],
            obstacles: Vec::new(),
            goal_center,
            goal_radius,
            goal_sampling: false,
            resolution: 0.005,
        }
    }

    /// Unit square split by a wall at `x ∈ [0.49, 0.51]` with a gap of the
    /// given half-height centred on `y = 0.5`.
    pub fn corridor(goal_center: [f64; 2], goal_radius: f64, gap_half: f64) -> Self {
        Self::unit(goal_center, goal_radius)
            .with_obstacle(Aabb::new([0.49, 0.0], [0.51, 0.5 - gap_half]))
            .with_obstacle(Aabb::new([0.49, 0.5 + gap_half], [0.51, 1.0]))
    }

    pub fn with_obstacle(mut self, aabb: Aabb) -> Self {
        self.obstacles.push(aabb);
        self
    }

    pub fn with_goal_sampling(mut self) -> Self {
        self.goal_sampling = true;
        self
    }

    pub fn with_resolution(mut self, resolution: f64) -> Self {
        assert!(resolution > 0.0);
        self.resolution = resolution;
        self
    }

    pub fn goal_center(&self) -> [f64; 2] {
        self.goal_center
    }

    pub fn goal_radius(&self) -> f64 {
        self.goal_radius
    }
}

impl Scenario for RectWorld {
    type Space = EuclideanSpace<2>;

    fn space(&self) -> &EuclideanSpace<2> {
        &self.space
    }

    fn valid(&self, state: &[f64; 2]) -> bool {
        state[0] >= self.lo[0]
            && state[0] <= self.hi[0]
            && state[1] >= self.lo[1]
            && state[1] <= self.hi[1]
            && !self.obstacles.iter().any(|o| o.contains(state))
    }

    fn link(&self, a: &[f64; 2], b: &[f64; 2]) -> bool {
        let d = self.space.distance(a, b);
        let steps = (d / self.resolution).ceil().max(1.0) as usize;
        for i in 1..=steps {
            let t = i as f64 / steps as f64;
            if !self.valid(&self.space.interpolate(a, b, t)) {
                return false;
            }
        }
        true
    }

    fn goal(&self, state: &[f64; 2]) -> (bool, f64) {
        let d = self.space.distance(state, &self.goal_center);
        (d < self.goal_radius, d)
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Option<[f64; 2]> {
        Some([
            self.lo[0] + rng.gen::<f64>() * (self.hi[0] - self.lo[0]),
            self.lo[1] + rng.gen::<f64>() * (self.hi[1] - self.lo[1]),
        ])
    }

    fn sample_goal<R: Rng>(&self, rng: &mut R) -> Option<[f64; 2]> {
        // Rejection sampling from the disc's bounding box; give up after a
        // bounded number of tries (the worker just skips that iteration).
        for _ in 0..16 {
            let q = [
                self.goal_center[0] + (rng.gen::<f64>() * 2.0 - 1.0) * self.goal_radius,
                self.goal_center[1] + (rng.gen::<f64>() * 2.0 - 1.0) * self.goal_radius,
            ];
            if self.space.distance(&q, &self.goal_center) < self.goal_radius && self.valid(&q) {
                return Some(q);
            }
        }
        None
    }

    fn has_goal_sampler(&self) -> bool {
        self.goal_sampling
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_rrt::{LinearIndex, Planner};
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn planner_for(world: RectWorld) -> Planner<RectWorld, LinearIndex<EuclideanSpace<2>>> {
        Planner::new(world, LinearIndex::new(EuclideanSpace))
    }

    /// Termination predicate counting total samples across all workers.
    fn sample_budget(n: u64) -> impl Fn() -> bool + Sync {
        let counter = AtomicU64::new(0);
        move || counter.fetch_add(1, Ordering::Relaxed) >= n
    }

    // ---- geometry ----

    #[test]
    fn aabb_contains_boundary() {
        let b = Aabb::new([0.2, 0.2], [0.4, 0.4]);
        assert!(b.contains(&[0.2, 0.2]));
        assert!(b.contains(&[0.3, 0.35]));
        assert!(!b.contains(&[0.41, 0.3]));
        assert!(!b.contains(&[0.3, 0.19]));
    }

    #[test]
    fn motion_through_wall_is_invalid() {
        let world = RectWorld::corridor([0.9, 0.5], 0.05, 0.01);
        // Straight through the wall above the gap.
        assert!(!world.link(&[0.4, 0.8], &[0.6, 0.8]));
        // Straight through the gap.
        assert!(world.link(&[0.4, 0.5], &[0.6, 0.5]));
        // Within one side, no crossing.
        assert!(world.link(&[0.1, 0.1], &[0.4, 0.9]));
    }

    #[test]
    fn goal_samples_land_in_the_disc() {
        use rand::rngs::SmallRng;
        use rand::SeedableRng;

        let world = RectWorld::unit([0.7, 0.7], 0.05).with_goal_sampling();
        let mut rng = SmallRng::seed_from_u64(3);
        let mut hits = 0;
        for _ in 0..100 {
            if let Some(q) = world.sample_goal(&mut rng) {
                let (is_goal, _) = world.goal(&q);
                assert!(is_goal);
                hits += 1;
            }
        }
        assert!(hits > 50, "goal sampler should mostly succeed, got {hits}");
    }

    // ---- open square, near-straight path ----

    #[test]
    fn open_square_finds_a_near_straight_path() {
        let world = RectWorld::unit([1.0, 1.0], 0.01).with_goal_sampling();
        let mut planner = planner_for(world);
        planner.set_workers(1);
        planner.set_seed(42);
        planner.set_range(0.2);
        planner.set_goal_bias(0.05);
        planner.add_start([0.0, 0.0]).unwrap();

        planner.solve(sample_budget(1500)).unwrap();

        assert!(planner.solved());
        let path = planner.solution();
        assert_eq!(path.first(), Some(&[0.0, 0.0]));
        let last = path.last().unwrap();
        let space = EuclideanSpace::<2>;
        assert!(space.distance(last, &[1.0, 1.0]) < 0.01);

        let cost = planner.solution_cost().unwrap();
        assert!(cost <= 1.6, "path length {cost} should be near the diagonal");
        planner.audit().unwrap();
    }

    // ---- narrow corridor, one worker and many ----

    fn solve_corridor(workers: usize, seed: u64) -> f64 {
        let world = RectWorld::corridor([0.9, 0.5], 0.05, 0.01).with_goal_sampling();
        let mut planner = planner_for(world);
        planner.set_workers(workers);
        planner.set_seed(seed);
        planner.set_range(0.2);
        planner.set_goal_bias(0.05);
        planner.add_start([0.1, 0.5]).unwrap();

        planner.solve(sample_budget(8000)).unwrap();

        assert!(planner.solved(), "corridor should be solved ({workers} workers)");
        planner.audit().unwrap();
        planner.solution_cost().unwrap()
    }

    #[test]
    fn corridor_single_threaded() {
        let cost = solve_corridor(1, 5);
        // Optimal is a straight run of 0.8 through the gap.
        assert!(cost <= 1.2 * 0.8, "cost {cost} too far above optimal");
    }

    #[test]
    fn corridor_eight_workers() {
        let cost = solve_corridor(8, 6);
        assert!(cost <= 1.2 * 0.8, "cost {cost} too far above optimal");
    }

    // ---- rewire stress under contention ----

    #[test]
    fn rewire_stress_keeps_invariants() {
        let world = RectWorld::unit([0.9, 0.9], 0.05).with_goal_sampling();
        let mut planner = planner_for(world);
        planner.set_workers(8);
        planner.set_seed(17);
        planner.set_range(0.2);
        planner.set_goal_bias(0.02);
        planner.add_start([0.0, 0.0]).unwrap();

        planner.solve(sample_budget(8000)).unwrap();

        let report = planner.audit().unwrap();
        assert_eq!(report.nodes, planner.size());
        assert!(planner.solved());
        assert!(planner.stats().rewire_count > 0, "stress run should rewire");
    }

    // ---- multi-start, goal-side start dominates ----

    #[test]
    fn goal_side_start_dominates() {
        let world = RectWorld::unit([1.0, 0.0], 0.01).with_goal_sampling();
        let mut planner = planner_for(world);
        planner.set_workers(1);
        planner.set_seed(2);
        planner.set_range(0.2);
        planner.set_goal_bias(1.0);
        planner.add_start([0.0, 0.0]).unwrap();
        planner.add_start([1.0, 0.0]).unwrap();

        planner.solve(sample_budget(20)).unwrap();

        assert!(planner.solved());
        let cost = planner.solution_cost().unwrap();
        assert!(cost <= 0.02, "goal-side start should give near-zero cost, got {cost}");

        let path = planner.solution();
        assert_eq!(path.first(), Some(&[1.0, 0.0]));
    }

    // ---- sampled properties ----

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]

        #[test]
        fn audit_holds_after_random_solves(
            seed in 0u64..1000,
            gx in 0.2f64..0.9,
            gy in 0.2f64..0.9,
            workers in 1usize..4,
        ) {
            let world = RectWorld::unit([gx, gy], 0.1).with_goal_sampling();
            let mut planner = planner_for(world);
            planner.set_workers(workers);
            planner.set_seed(seed);
            planner.set_range(0.25);
            planner.set_goal_bias(0.05);
            planner.add_start([0.1, 0.1]).unwrap();

            planner.solve(sample_budget(400)).unwrap();

            prop_assert!(planner.audit().is_ok());
            if planner.solved() {
                let path = planner.solution();
                prop_assert_eq!(path.first(), Some(&[0.1, 0.1]));
                let last = path.last().unwrap();
                prop_assert!(EuclideanSpace::<2>.distance(last, &[gx, gy]) < 0.1);
            }
        }
    }
}
