use rand::Rng;

use crate::scenario::{Scenario, Space};

// ---------------------------------------------------------------------------
// PlaneSpace — R^2 with the Euclidean metric
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct PlaneSpace;

impl Space for PlaneSpace {
    type State = [f64; 2];

    fn dimensions(&self) -> usize {
        2
    }

    fn distance(&self, a: &[f64; 2], b: &[f64; 2]) -> f64 {
        let (dx, dy) = (a[0] - b[0], a[1] - b[1]);
        (dx * dx + dy * dy).sqrt()
    }

    fn interpolate(&self, a: &[f64; 2], b: &[f64; 2], t: f64) -> [f64; 2] {
        [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
    }
}

// ---------------------------------------------------------------------------
// UnitSquare — obstacle-free unit square with a disc goal
// ---------------------------------------------------------------------------

/// Minimal test scenario: the unit square with no obstacles, a disc goal,
/// and optionally a pinned sampler that always returns the same state.
#[derive(Clone, Debug)]
pub(crate) struct UnitSquare {
    space: PlaneSpace,
    pub goal_center: [f64; 2],
    pub goal_radius: f64,
    pub goal_sampling: bool,
    /// When set, `sample` always returns exactly this state.
    pub fixed_sample: Option<[f64; 2]>,
}

impl UnitSquare {
    pub fn new(goal_center: [f64; 2], goal_radius: f64) -> Self {
        Self {
            space: PlaneSpace,
            goal_center,
            goal_radius,
            goal_sampling: false,
            fixed_sample: None,
        }
    }

    pub fn with_goal_sampling(mut self) -> Self {
        self.goal_sampling = true;
        self
    }

    pub fn with_fixed_sample(mut self, state: [f64; 2]) -> Self {
        self.fixed_sample = Some(state);
        self
    }
}

impl Scenario for UnitSquare {
    type Space = PlaneSpace;

    fn space(&self) -> &PlaneSpace {
        &self.space
    }

    fn valid(&self, state: &[f64; 2]) -> bool {
        (0.0..=1.0).contains(&state[0]) && (0.0..=1.0).contains(&state[1])
    }

    fn link(&self, _a: &[f64; 2], _b: &[f64; 2]) -> bool {
        true
    }

    fn goal(&self, state: &[f64; 2]) -> (bool, f64) {
        let d = self.space.distance(state, &self.goal_center);
        (d < self.goal_radius, d)
    }

    fn sample<R: Rng>(&self, rng: &mut R) -> Option<[f64; 2]> {
        match self.fixed_sample {
            Some(s) => Some(s),
            None => Some([rng.gen::<f64>(), rng.gen::<f64>()]),
        }
    }

    fn sample_goal<R: Rng>(&self, rng: &mut R) -> Option<[f64; 2]> {
        // Rejection-sample the goal disc from its bounding box; report a
        // miss rather than loop forever.
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
