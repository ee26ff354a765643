use rand::Rng;

// ---------------------------------------------------------------------------
// Space — configuration space geometry
// ---------------------------------------------------------------------------

/// Geometry of a configuration space: dimension, metric, interpolation.
pub trait Space: Send + Sync {
    type State: Clone + Send + Sync;

    fn dimensions(&self) -> usize;

    fn distance(&self, a: &Self::State, b: &Self::State) -> f64;

    /// State at fraction `t` in `[0, 1]` along the motion from `a` to `b`.
    fn interpolate(&self, a: &Self::State, b: &Self::State, t: f64) -> Self::State;
}

// ---------------------------------------------------------------------------
// Scenario — the planning problem
// ---------------------------------------------------------------------------

/// Everything the planner needs to know about a problem: the space, validity
/// and motion oracles, the goal predicate, and the samplers.
///
/// `Clone + Send + Sync` because every worker owns its own copy (wrap heavy
/// shared data in `Arc`). Sampling may miss (`None`); the worker skips that
/// iteration.
pub trait Scenario: Clone + Send + Sync {
    type Space: Space;

    fn space(&self) -> &Self::Space;

    /// Point validity of a single configuration.
    fn valid(&self, state: &State<Self>) -> bool;

    /// Collision-free continuous motion from `a` to `b`.
    fn link(&self, a: &State<Self>, b: &State<Self>) -> bool;

    /// Goal test: `(is_goal, distance_to_goal)`.
    fn goal(&self, state: &State<Self>) -> (bool, f64);

    /// Draw a configuration from the sampling distribution.
    fn sample<R: Rng>(&self, rng: &mut R) -> Option<State<Self>>;

    /// Draw a configuration from the goal region, if the scenario supports
    /// goal-biased sampling.
    fn sample_goal<R: Rng>(&self, _rng: &mut R) -> Option<State<Self>> {
        None
    }

    fn has_goal_sampler(&self) -> bool {
        false
    }
}

/// State type of a scenario.
pub type State<C> = <<C as Scenario>::Space as Space>::State;
