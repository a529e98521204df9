//! Flattened world-coordinate → leaf lookup.
//!
//! All leaves of a [`SpatialTree`](super::SpatialTree) have the same size, so
//! they form a regular grid of `2^(depth-1)` cells per side. The grid is
//! filled from the tree's leaf-created callback and answers "which leaf covers
//! this point" in O(1).

use glam::Vec2;

use super::quadtree::{CellId, MAX_TREE_DEPTH};
use super::rect::Rect;

/// Regular grid mapping quantized world coordinates to leaf cells.
#[derive(Debug, Clone)]
pub struct LeafGrid {
    origin: Vec2,
    leaf_size: f32,
    side: usize,
    leaves: Vec<Option<CellId>>,
}

impl LeafGrid {
    /// Create an empty grid covering `world` for a tree of the given depth.
    ///
    /// The depth is clamped the same way [`SpatialTree::build`](super::SpatialTree::build) clamps it.
    pub fn new(world: &Rect, depth: u32) -> Self {
        let side = 1usize << (depth.clamp(1, MAX_TREE_DEPTH) - 1);
        Self {
            origin: world.min(),
            leaf_size: world.width / side as f32,
            side,
            leaves: vec![None; side * side],
        }
    }

    /// Number of leaves per side.
    pub fn side(&self) -> usize {
        self.side
    }

    pub fn leaf_size(&self) -> f32 {
        self.leaf_size
    }

    /// Quantize a world position to grid coordinates, clamped to the grid.
    pub fn coord(&self, pos: Vec2) -> (usize, usize) {
        let q = ((pos - self.origin) / self.leaf_size).floor();
        let max = (self.side - 1) as f32;
        // NaN falls through `clamp` unchanged and casts to 0
        (q.x.clamp(0.0, max) as usize, q.y.clamp(0.0, max) as usize)
    }

    /// Register a freshly created leaf under the grid cell holding its center.
    pub fn register(&mut self, leaf: CellId, bounds: &Rect) {
        let center = bounds.center();
        let (qx, qy) = self.coord(center);
        let slot = &mut self.leaves[qy * self.side + qx];
        debug_assert!(slot.is_none(), "two leaves registered at ({qx}, {qy})");
        *slot = Some(leaf);
    }

    /// The leaf covering `pos`. Points outside the world map to the nearest border leaf.
    pub fn leaf_at(&self, pos: Vec2) -> Option<CellId> {
        let (qx, qy) = self.coord(pos);
        self.leaves[qy * self.side + qx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::SpatialTree;

    fn build(depth: u32) -> (SpatialTree<u32>, LeafGrid) {
        let world = Rect::new(-64.0, -64.0, 128.0, 128.0);
        let mut grid = LeafGrid::new(&world, depth);
        let tree = SpatialTree::build(world, depth, |id, r| grid.register(id, r));
        (tree, grid)
    }

    #[test]
    fn test_grid_is_sized_from_depth() {
        let (_, grid) = build(4);
        assert_eq!(grid.side(), 8);
        assert_eq!(grid.leaf_size(), 16.0);
    }

    #[test]
    fn test_every_grid_cell_maps_to_the_covering_leaf() {
        let (tree, grid) = build(4);
        for qy in 0..grid.side() {
            for qx in 0..grid.side() {
                let p = Vec2::new(-64.0 + 16.0 * qx as f32 + 3.0, -64.0 + 16.0 * qy as f32 + 9.0);
                let leaf = grid.leaf_at(p).unwrap();
                assert!(tree.is_leaf(leaf));
                assert!(tree.bounds(leaf).contains(p));
            }
        }
    }

    #[test]
    fn test_outside_points_clamp_to_border() {
        let (tree, grid) = build(3);
        let leaf = grid.leaf_at(Vec2::new(10_000.0, -10_000.0)).unwrap();
        let bounds = tree.bounds(leaf);
        assert_eq!(bounds.max().x, 64.0);
        assert_eq!(bounds.min().y, -64.0);
        assert_eq!(grid.coord(Vec2::new(f32::NAN, 0.0)).0, 0);
    }
}
