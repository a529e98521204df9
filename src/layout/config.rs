//! Tunable constants of the layout engine.
//!
//! The defaults are empirically tuned values; they are kept as named,
//! overridable configuration rather than literals. Every struct deserializes
//! with `#[serde(default)]`, so a host only has to send the fields it changes.

use serde::{Deserialize, Serialize};

use crate::error::{LayoutError, Result};
use crate::spatial::{MAX_TREE_DEPTH, Rect};

/// Method used to compute node-node repulsion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Technique {
    /// Exact pairwise repulsion, O(n²). Reference mode.
    BruteForce,
    /// Barnes-Hut walk over the quad-tree, O(n log n).
    #[default]
    Quad,
    /// Neighbor-only repulsion plus one impulse from the graph's center of mass, O(n).
    Fuzzy,
}

/// Per-node force model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    /// Velocity damping rate per second (default: 2.2).
    pub damping: f32,
    /// Spring constant of neighbor links (default: 4.0).
    pub spring_constant: f32,
    /// Rest length of neighbor links (default: 1.5).
    pub rest_length: f32,
    /// Mass given to every node (default: 1.0).
    pub node_mass: f32,
    /// Hard speed limit (default: 50.0).
    pub max_velocity: f32,
    /// Repulsion strength multiplier (default: 1.5).
    pub repel_ratio: f32,
    /// Springs shorter than this exert no force (default: 0.00001).
    pub spring_min_distance: f32,
    /// BruteForce ignores pairs closer than this (default: 0.01).
    pub brute_force_min_distance: f32,
    /// BruteForce ignores pairs farther than this (default: 512.0).
    pub brute_force_max_distance: f32,
    /// Fuzzy ignores neighbors closer than this (default: 0.1).
    pub fuzzy_min_distance: f32,
    /// Barnes-Hut opening ratio `cell width / distance` (default: 1.0).
    pub barnes_hut_theta: f32,
    /// Barnes-Hut skips cells whose center of mass is closer than this (default: 0.001).
    pub barnes_hut_min_distance: f32,
    /// Barnes-Hut skips individual bodies closer than this (default: 0.0001).
    pub body_min_distance: f32,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            damping: 2.2,
            spring_constant: 4.0,
            rest_length: 1.5,
            node_mass: 1.0,
            max_velocity: 50.0,
            repel_ratio: 1.5,
            spring_min_distance: 0.00001,
            brute_force_min_distance: 0.01,
            brute_force_max_distance: 512.0,
            fuzzy_min_distance: 0.1,
            barnes_hut_theta: 1.0,
            barnes_hut_min_distance: 0.001,
            body_min_distance: 0.0001,
        }
    }
}

/// Frame budget, adaptive time-stepping and the convergence test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceParams {
    /// Layout is done when total kinetic energy ≤ this × node count (default: 0.00275).
    pub energy_per_node: f32,
    /// ... and the peak single-node kinetic energy is below this (default: 0.02).
    pub peak_energy: f32,
    /// Constant multiplier from frame time to simulation time (default: 3.0).
    pub time_step_multiplier: f32,
    /// Peak energy under which the time step gets boosted (default: 3.5).
    pub boost_energy: f32,
    /// Below this peak energy the boost is not derived from the energy (default: 0.001).
    pub min_boost_energy: f32,
    /// Largest time-scale boost (default: 7.0).
    pub max_time_scale: f32,
    /// Sub-steps per frame are `budget / node count` (default: 1666.7).
    pub iteration_budget: f32,
    /// Upper bound on sub-steps per frame (default: 10).
    pub max_iterations_per_frame: u32,
    /// Frames between full quad-tree refreshes (default: 15).
    pub tree_refresh_interval: u32,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            energy_per_node: 0.00275,
            peak_energy: 0.02,
            time_step_multiplier: 3.0,
            boost_energy: 3.5,
            min_boost_energy: 0.001,
            max_time_scale: 7.0,
            iteration_budget: 1666.7,
            max_iterations_per_frame: 10,
            tree_refresh_interval: 15,
        }
    }
}

/// Fixed world region covered by the quad-tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    /// The world spans `[-half_extent, half_extent]` on both axes (default: 1024.0).
    pub half_extent: f32,
    /// Quad-tree depth; leaves are `2 * half_extent / 2^(depth-1)` wide (default: 8).
    pub tree_depth: u32,
}

impl WorldParams {
    /// Reject a world the quad-tree cannot be built over.
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_TREE_DEPTH).contains(&self.tree_depth) {
            return Err(LayoutError::InvalidConfig(format!(
                "tree_depth {} is outside 1..={MAX_TREE_DEPTH}",
                self.tree_depth
            )));
        }
        if !(self.half_extent.is_finite() && self.half_extent > 0.0) {
            return Err(LayoutError::InvalidConfig(format!(
                "half_extent {} must be finite and positive",
                self.half_extent
            )));
        }
        Ok(())
    }

    /// Copy with the depth clamped and a degenerate extent replaced by the default.
    pub fn sanitized(&self) -> Self {
        let half_extent = if self.half_extent.is_finite() && self.half_extent > 0.0 {
            self.half_extent
        } else {
            Self::default().half_extent
        };
        Self {
            half_extent,
            tree_depth: self.tree_depth.clamp(1, MAX_TREE_DEPTH),
        }
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(
            -self.half_extent,
            -self.half_extent,
            self.half_extent * 2.0,
            self.half_extent * 2.0,
        )
    }
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            half_extent: 1024.0,
            tree_depth: 8,
        }
    }
}

/// Island packing done once at load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlacementParams {
    /// World size of one packing grid cell (default: 2.0).
    pub cell_size: f32,
    /// Fraction of its square an island's extent fills (default: 0.5).
    pub fill: f32,
    /// Uniform expansion applied after packing (default: 2.5).
    pub expansion: f32,
    /// New nodes from `load` start uniformly in `[-spread, spread]²` (default: 1.0).
    pub initial_spread: f32,
}

impl Default for PlacementParams {
    fn default() -> Self {
        Self {
            cell_size: 2.0,
            fill: 0.5,
            expansion: 2.5,
            initial_spread: 1.0,
        }
    }
}

/// Presentation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewParams {
    /// Zoom level; the view scale is `2^zoom` (default: 2.0).
    pub initial_zoom: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Semi-axes of the elliptical node hit region (default: [0.5, 0.2]).
    pub hit_semi_axes: [f32; 2],
    /// World-space margin added around the viewport for visibility queries (default: 16.0).
    pub visible_margin: f32,
}

impl Default for ViewParams {
    fn default() -> Self {
        Self {
            initial_zoom: 2.0,
            min_zoom: 0.0,
            max_zoom: 8.0,
            hit_semi_axes: [0.5, 0.2],
            visible_margin: 16.0,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub technique: Technique,
    /// Seed of the initial random placement (default: 0x5EED).
    pub seed: u64,
    pub physics: PhysicsParams,
    pub convergence: ConvergenceParams,
    pub world: WorldParams,
    pub placement: PlacementParams,
    pub view: ViewParams,
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        self.world.validate()
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            technique: Technique::default(),
            seed: 0x5EED,
            physics: PhysicsParams::default(),
            convergence: ConvergenceParams::default(),
            world: WorldParams::default(),
            placement: PlacementParams::default(),
            view: ViewParams::default(),
        }
    }
}
