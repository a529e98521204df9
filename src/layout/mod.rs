//! Force-directed layout: configuration, force terms, repulsion techniques and
//! the initial island packing.
//!
//! The frame loop itself lives in [`crate::graph::LayoutEngine`]; this module
//! only provides the pieces it is assembled from.

pub mod config;
pub mod physics;
pub mod placement;
pub mod repulsion;

pub use config::{
    ConvergenceParams, LayoutConfig, PhysicsParams, PlacementParams, Technique, ViewParams,
    WorldParams,
};
pub use placement::{find_islands, place_islands};
pub use repulsion::{BarnesHut, BruteForce, Fuzzy, RepulsionStrategy, Scene, strategy_for};
