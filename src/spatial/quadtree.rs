//! Fixed-depth quad-tree with lazily aggregated mass.
//!
//! The tree is built once over a square world region and never changes shape.
//! Leaves hold the keys of attached bodies; every cell caches the aggregate
//! mass, center of mass and body count of its subtree. Attaching or detaching
//! marks the leaf and all of its ancestors dirty, and [`SpatialTree::update`]
//! recomputes exactly the dirty cells in post-order.
//!
//! Cells live in a flat arena and refer to each other through [`CellId`], so
//! nodes can keep a back-reference to their docking leaf without owning it.

use std::fmt;

use glam::Vec2;

use super::rect::Rect;
use crate::error::{LayoutError, Result};

/// Aggregate mass at or below this value is treated as an empty cell.
pub const EMPTY_CELL_MASS: f32 = 1e-3;

/// Deepest tree that can be built; deeper requests are clamped.
pub const MAX_TREE_DEPTH: u32 = 12;

/// Index of a cell in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub u32);

impl CellId {
    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell({})", self.0)
    }
}

/// Position and mass of an attached body, as seen by the tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Body {
    pub position: Vec2,
    pub mass: f32,
}

#[derive(Debug)]
struct Cell<K> {
    bounds: Rect,
    parent: Option<CellId>,
    /// Top-left, top-right, bottom-left, bottom-right. `None` at leaf depth.
    children: Option<[CellId; 4]>,
    /// Leaf only.
    attached: Vec<K>,
    mass: f32,
    center_of_mass: Vec2,
    count: u32,
    dirty: bool,
}

impl<K> Cell<K> {
    fn new(parent: Option<CellId>, bounds: Rect) -> Self {
        Self {
            bounds,
            parent,
            children: None,
            attached: Vec::new(),
            mass: 0.0,
            center_of_mass: bounds.center(),
            count: 0,
            dirty: false,
        }
    }
}

/// Quad-tree spatial index over a fixed square region.
pub struct SpatialTree<K> {
    cells: Vec<Cell<K>>,
    depth: u32,
}

impl<K: Copy + PartialEq + fmt::Debug> SpatialTree<K> {
    /// Build the full tree. A depth of 1 makes the root a leaf; the depth is
    /// clamped to [`MAX_TREE_DEPTH`].
    ///
    /// `on_leaf` is invoked once per leaf as soon as it is created.
    pub fn build(bounds: Rect, depth: u32, mut on_leaf: impl FnMut(CellId, &Rect)) -> Self {
        let depth = depth.clamp(1, MAX_TREE_DEPTH);
        // 4^0 + 4^1 + ... + 4^(depth-1)
        let capacity = ((1usize << (2 * depth)) - 1) / 3;
        let mut tree = Self {
            cells: Vec::with_capacity(capacity),
            depth,
        };
        tree.build_cell(None, bounds, depth, &mut on_leaf);
        tree
    }

    fn build_cell(
        &mut self,
        parent: Option<CellId>,
        bounds: Rect,
        depth: u32,
        on_leaf: &mut impl FnMut(CellId, &Rect),
    ) -> CellId {
        let id = CellId(self.cells.len() as u32);
        self.cells.push(Cell::new(parent, bounds));

        if depth > 1 {
            let mut children = [id; 4];
            for (slot, quadrant) in children.iter_mut().zip(bounds.quadrants()) {
                *slot = self.build_cell(Some(id), quadrant, depth - 1, on_leaf);
            }
            self.cells[id.index()].children = Some(children);
        } else {
            on_leaf(id, &bounds);
        }
        id
    }

    // =========================================================================
    // Structure
    // =========================================================================

    #[inline]
    pub fn root(&self) -> CellId {
        CellId(0)
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn bounds(&self, id: CellId) -> Rect {
        self.cells[id.index()].bounds
    }

    pub fn parent(&self, id: CellId) -> Option<CellId> {
        self.cells[id.index()].parent
    }

    pub fn children(&self, id: CellId) -> Option<[CellId; 4]> {
        self.cells[id.index()].children
    }

    pub fn is_leaf(&self, id: CellId) -> bool {
        self.cells[id.index()].children.is_none()
    }

    /// All cell ids, root first.
    pub fn cell_ids(&self) -> impl Iterator<Item = CellId> + '_ {
        (0..self.cells.len() as u32).map(CellId)
    }

    // =========================================================================
    // Aggregates
    // =========================================================================

    pub fn attached(&self, id: CellId) -> &[K] {
        &self.cells[id.index()].attached
    }

    /// Aggregate mass of the subtree (valid once the cell is clean).
    pub fn mass(&self, id: CellId) -> f32 {
        self.cells[id.index()].mass
    }

    pub fn center_of_mass(&self, id: CellId) -> Vec2 {
        self.cells[id.index()].center_of_mass
    }

    /// Number of bodies attached anywhere in the subtree.
    pub fn count(&self, id: CellId) -> u32 {
        self.cells[id.index()].count
    }

    pub fn is_dirty(&self, id: CellId) -> bool {
        self.cells[id.index()].dirty
    }

    // =========================================================================
    // Attachment
    // =========================================================================

    /// Attach a body to a leaf and dirty the path to the root.
    pub fn attach(&mut self, leaf: CellId, key: K) -> Result<()> {
        self.check_leaf(leaf)?;
        self.cells[leaf.index()].attached.push(key);
        self.mark_dirty(leaf);
        Ok(())
    }

    /// Detach a body from a leaf and dirty the path to the root.
    pub fn detach(&mut self, leaf: CellId, key: K) -> Result<()> {
        self.check_leaf(leaf)?;
        let attached = &mut self.cells[leaf.index()].attached;
        let Some(pos) = attached.iter().position(|&k| k == key) else {
            return Err(LayoutError::Consistency(format!(
                "{key:?} is not attached to {leaf}"
            )));
        };
        attached.remove(pos);
        self.mark_dirty(leaf);
        Ok(())
    }

    fn check_leaf(&self, id: CellId) -> Result<()> {
        match self.cells.get(id.index()) {
            None => Err(LayoutError::Consistency(format!("{id} does not exist"))),
            Some(cell) if cell.children.is_some() => {
                Err(LayoutError::Consistency(format!("{id} is not a leaf")))
            }
            Some(_) => Ok(()),
        }
    }

    fn mark_dirty(&mut self, from: CellId) {
        let mut current = Some(from);
        while let Some(id) = current {
            let cell = &mut self.cells[id.index()];
            cell.dirty = true;
            current = cell.parent;
        }
    }

    /// Dirty every cell so the next [`update`](Self::update) recomputes everything.
    pub fn mark_all_dirty(&mut self) {
        for cell in &mut self.cells {
            cell.dirty = true;
        }
    }

    /// Remove every attachment and reset all aggregates.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.attached.clear();
            cell.mass = 0.0;
            cell.center_of_mass = cell.bounds.center();
            cell.count = 0;
            cell.dirty = false;
        }
    }

    /// Recompute mass, center of mass and count for every dirty cell.
    ///
    /// `body` resolves an attached key to its current position and mass.
    pub fn update(&mut self, body: impl Fn(K) -> Body) {
        self.update_cell(self.root(), &body);
    }

    fn update_cell(&mut self, id: CellId, body: &impl Fn(K) -> Body) {
        if !self.cells[id.index()].dirty {
            return;
        }

        let children = self.cells[id.index()].children;
        if let Some(children) = children {
            for child in children {
                self.update_cell(child, body);
            }
        }

        let mut mass = 0.0;
        let mut weighted = Vec2::ZERO;
        let mut count = 0;

        // The center of mass of a union is the mass-weighted mean of the parts,
        // so leaves and internal cells share one accumulation.
        let cell = &self.cells[id.index()];
        for &key in &cell.attached {
            let b = body(key);
            mass += b.mass;
            weighted += b.position * b.mass;
            count += 1;
        }
        if let Some(children) = children {
            for child in children {
                let child = &self.cells[child.index()];
                mass += child.mass;
                weighted += child.center_of_mass * child.mass;
                count += child.count;
            }
        }

        let cell = &mut self.cells[id.index()];
        cell.center_of_mass = if mass > EMPTY_CELL_MASS {
            weighted / mass
        } else {
            cell.bounds.center()
        };
        cell.mass = mass;
        cell.count = count;
        cell.dirty = false;
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Find the first body whose elliptical hit region contains `pt`.
    ///
    /// `semi_axes` are the ellipse radii along x and y. Bodies attached to a
    /// cell are tested before its children.
    ///
    /// Bodies outside the tree's region sit in the border leaf nearest to them,
    /// so cells are pruned against `pt` clamped into the region.
    pub fn intersect_point(
        &self,
        pt: Vec2,
        semi_axes: Vec2,
        position: impl Fn(K) -> Vec2,
    ) -> Option<K> {
        let region = self.bounds(self.root());
        let clamped = pt.clamp(region.min(), region.max());
        self.intersect_cell(self.root(), pt, clamped, semi_axes, &position)
    }

    fn intersect_cell(
        &self,
        id: CellId,
        pt: Vec2,
        clamped: Vec2,
        semi_axes: Vec2,
        position: &impl Fn(K) -> Vec2,
    ) -> Option<K> {
        let cell = &self.cells[id.index()];
        if !cell.bounds.inflate(semi_axes.x, semi_axes.y).contains(clamped) {
            return None;
        }

        for &key in &cell.attached {
            let d = (pt - position(key)) / semi_axes;
            if d.length_squared() <= 1.0 {
                return Some(key);
            }
        }

        cell.children.and_then(|children| {
            children
                .into_iter()
                .find_map(|child| self.intersect_cell(child, pt, clamped, semi_axes, position))
        })
    }

    /// Append the bodies of every leaf whose bounds intersect `area`.
    pub fn range_query(&self, area: &Rect, out: &mut Vec<K>) {
        self.range_cell(self.root(), area, out);
    }

    fn range_cell(&self, id: CellId, area: &Rect, out: &mut Vec<K>) {
        let cell = &self.cells[id.index()];
        if !cell.bounds.intersects(area) {
            return;
        }
        out.extend_from_slice(&cell.attached);
        if let Some(children) = cell.children {
            for child in children {
                self.range_cell(child, area, out);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_bodies(positions: &[Vec2]) -> impl Fn(usize) -> Body + '_ {
        move |k| Body {
            position: positions[k],
            mass: 1.0,
        }
    }

    fn leaf_at(tree: &SpatialTree<usize>, p: Vec2) -> CellId {
        tree.cell_ids()
            .find(|&id| tree.is_leaf(id) && tree.bounds(id).contains(p))
            .expect("point inside world")
    }

    /// Check the aggregate invariant on every clean cell.
    fn assert_mass_invariant(tree: &SpatialTree<usize>) {
        for id in tree.cell_ids() {
            assert!(!tree.is_dirty(id));
            let attached = tree.attached(id).len() as f32;
            let children: f32 = tree
                .children(id)
                .map(|c| c.iter().map(|&c| tree.mass(c)).sum())
                .unwrap_or(0.0);
            assert!((tree.mass(id) - (attached + children)).abs() < 1e-4);
        }
    }

    #[test]
    fn test_build_shape_and_leaf_callback() {
        let mut leaves = Vec::new();
        let tree: SpatialTree<usize> =
            SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |id, r| leaves.push((id, *r)));

        assert_eq!(tree.cell_count(), 21);
        assert_eq!(leaves.len(), 16);
        assert!(leaves.iter().all(|(id, r)| tree.is_leaf(*id) && r.width == 4.0));
        assert!(!tree.is_leaf(tree.root()));
        assert_eq!(tree.parent(tree.root()), None);
    }

    #[test]
    fn test_depth_one_root_is_leaf() {
        let mut calls = 0;
        let tree: SpatialTree<usize> =
            SpatialTree::build(Rect::new(0.0, 0.0, 1.0, 1.0), 1, |_, _| calls += 1);
        assert_eq!(calls, 1);
        assert!(tree.is_leaf(tree.root()));
    }

    #[test]
    fn test_attach_dirties_path_to_root() {
        let mut tree: SpatialTree<usize> =
            SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |_, _| {});
        let leaf = leaf_at(&tree, Vec2::new(5.0, 5.0));
        tree.attach(leaf, 0).unwrap();

        let mut current = Some(leaf);
        while let Some(id) = current {
            assert!(tree.is_dirty(id));
            current = tree.parent(id);
        }
        let other = leaf_at(&tree, Vec2::new(-5.0, -5.0));
        assert!(!tree.is_dirty(other));
    }

    #[test]
    fn test_update_aggregates() {
        let positions = vec![Vec2::new(1.0, 1.0), Vec2::new(3.0, 1.0), Vec2::new(-6.0, -6.0)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |_, _| {});
        for (k, &p) in positions.iter().enumerate() {
            let leaf = leaf_at(&tree, p);
            tree.attach(leaf, k).unwrap();
        }
        tree.update(unit_bodies(&positions));

        let root = tree.root();
        assert_eq!(tree.count(root), 3);
        assert!((tree.mass(root) - 3.0).abs() < 1e-6);
        let expected = (positions[0] + positions[1] + positions[2]) / 3.0;
        assert!(tree.center_of_mass(root).distance(expected) < 1e-5);
        assert_mass_invariant(&tree);
    }

    #[test]
    fn test_update_is_idempotent() {
        let positions: Vec<Vec2> = (0..12)
            .map(|i| Vec2::new((i as f32 * 1.3) % 14.0 - 7.0, (i as f32 * 2.7) % 14.0 - 7.0))
            .collect();
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 4, |_, _| {});
        for (k, &p) in positions.iter().enumerate() {
            let leaf = leaf_at(&tree, p);
            tree.attach(leaf, k).unwrap();
        }
        tree.update(unit_bodies(&positions));
        let before: Vec<_> = tree
            .cell_ids()
            .map(|id| (tree.mass(id), tree.center_of_mass(id), tree.count(id)))
            .collect();

        tree.update(unit_bodies(&positions));
        let after: Vec<_> = tree
            .cell_ids()
            .map(|id| (tree.mass(id), tree.center_of_mass(id), tree.count(id)))
            .collect();
        assert_eq!(before, after);
        assert_mass_invariant(&tree);
    }

    #[test]
    fn test_detach_restores_empty_cell() {
        let positions = vec![Vec2::new(2.0, 2.0)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 2, |_, _| {});
        let leaf = leaf_at(&tree, positions[0]);
        tree.attach(leaf, 0).unwrap();
        tree.update(unit_bodies(&positions));
        assert_eq!(tree.center_of_mass(leaf), positions[0]);

        tree.detach(leaf, 0).unwrap();
        tree.update(unit_bodies(&positions));
        assert_eq!(tree.mass(tree.root()), 0.0);
        assert_eq!(tree.center_of_mass(leaf), tree.bounds(leaf).center());
    }

    #[test]
    fn test_attach_detach_misuse_is_reported() {
        let mut tree: SpatialTree<usize> =
            SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 2, |_, _| {});
        let root = tree.root();
        assert!(matches!(tree.attach(root, 1), Err(LayoutError::Consistency(_))));

        let leaf = leaf_at(&tree, Vec2::ZERO);
        assert!(matches!(tree.detach(leaf, 1), Err(LayoutError::Consistency(_))));
        assert!(matches!(
            tree.attach(CellId(999), 1),
            Err(LayoutError::Consistency(_))
        ));
    }

    #[test]
    fn test_intersect_point_uses_ellipse() {
        let positions = vec![Vec2::new(2.0, 2.0), Vec2::new(-3.0, 4.0)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |_, _| {});
        for (k, &p) in positions.iter().enumerate() {
            let leaf = leaf_at(&tree, p);
            tree.attach(leaf, k).unwrap();
        }
        let axes = Vec2::new(0.5, 0.2);
        let pos = |k: usize| positions[k];

        assert_eq!(tree.intersect_point(Vec2::new(2.4, 2.0), axes, pos), Some(0));
        // inside the bounding box of the ellipse but outside the ellipse
        assert_eq!(tree.intersect_point(Vec2::new(2.4, 2.15), axes, pos), None);
        assert_eq!(tree.intersect_point(Vec2::new(-3.0, 3.85), axes, pos), Some(1));
        assert_eq!(tree.intersect_point(Vec2::new(0.0, 0.0), axes, pos), None);
    }

    #[test]
    fn test_intersect_point_outside_region() {
        // docked in the border leaf that covers the clamped position
        let positions = vec![Vec2::new(9.0, 1.0), Vec2::new(-1.0, -8.3)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |_, _| {});
        let region_max = Vec2::splat(8.0 - 1e-3);
        for (k, &p) in positions.iter().enumerate() {
            let leaf = leaf_at(&tree, p.clamp(Vec2::splat(-8.0), region_max));
            tree.attach(leaf, k).unwrap();
        }
        let axes = Vec2::new(0.5, 0.2);
        let pos = |k: usize| positions[k];

        assert_eq!(tree.intersect_point(Vec2::new(9.2, 1.0), axes, pos), Some(0));
        assert_eq!(tree.intersect_point(Vec2::new(-1.0, -8.2), axes, pos), Some(1));
        assert_eq!(tree.intersect_point(Vec2::new(10.0, 1.0), axes, pos), None);
    }

    #[test]
    fn test_range_query() {
        let positions = vec![Vec2::new(1.0, 1.0), Vec2::new(7.0, 7.0), Vec2::new(-7.0, -7.0)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 3, |_, _| {});
        for (k, &p) in positions.iter().enumerate() {
            let leaf = leaf_at(&tree, p);
            tree.attach(leaf, k).unwrap();
        }

        let mut found = Vec::new();
        tree.range_query(&Rect::new(0.0, 0.0, 2.0, 2.0), &mut found);
        assert_eq!(found, vec![0]);

        found.clear();
        tree.range_query(&Rect::new(-8.0, -8.0, 16.0, 16.0), &mut found);
        found.sort();
        assert_eq!(found, vec![0, 1, 2]);
    }

    #[test]
    fn test_clear() {
        let positions = vec![Vec2::new(1.0, 1.0)];
        let mut tree = SpatialTree::build(Rect::new(-8.0, -8.0, 16.0, 16.0), 2, |_, _| {});
        let leaf = leaf_at(&tree, positions[0]);
        tree.attach(leaf, 0).unwrap();
        tree.update(unit_bodies(&positions));

        tree.clear();
        assert!(tree.attached(leaf).is_empty());
        assert_eq!(tree.count(tree.root()), 0);
        assert!(!tree.is_dirty(tree.root()));
    }
}
