//! Spatial indexing for force approximation and hit testing.
//!
//! This module provides a fixed-depth quad-tree with lazily aggregated mass,
//! used both for Barnes-Hut repulsion and for viewport/point queries, plus the
//! flat leaf lookup used to re-home moving nodes.

mod leaf_grid;
mod quadtree;
mod rect;

pub use leaf_grid::LeafGrid;
pub use quadtree::{Body, CellId, EMPTY_CELL_MASS, MAX_TREE_DEPTH, SpatialTree};
pub use rect::Rect;
