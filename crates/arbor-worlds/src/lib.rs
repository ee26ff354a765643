//! Euclidean spaces and simple planar obstacle worlds implementing the
//! `arbor-rrt` scenario contract. Used by the integration tests and the
//! benchmark binaries.

pub mod space;
pub mod world;

pub use space::EuclideanSpace;
pub use world::{Aabb, RectWorld};
