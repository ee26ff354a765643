//! Parallel asymptotically-optimal RRT*.
//!
//! Worker threads concurrently sample a configuration space, attach new
//! nodes through the cheapest reachable neighbour, and rewire the tree as
//! shorter routes appear. The tree is lock-free: a node's best incoming edge
//! is an atomically swapped immutable `Link`, and replacing it migrates the
//! displaced child subtrees onto the replacement.
//!
//! The scenario (geometry, collision oracle, goal) and the nearest-neighbour
//! index are trait seams; [`LinearIndex`] is a baseline index good enough
//! for tests and small problems.

pub mod nn;
pub mod node;
pub mod planner;
pub mod pool;
pub mod scenario;
pub mod search;
mod tree;

#[cfg(test)]
pub(crate) mod test_util;

pub use nn::{LinearIndex, NearestNeighbors};
pub use node::{Link, Node, NodeRef};
pub use planner::{AuditError, AuditReport, PlanError, Planner};
pub use scenario::{Scenario, Space, State};
pub use search::{TimerStat, WorkerStats};
