//! One-shot island packing run when a document is loaded.
//!
//! Disconnected components ("islands") that start out intersecting each other
//! end up far apart once the layout settles, leaving the picture mostly empty.
//! Packing them onto a coarse grid first keeps the final layout compact.
//!
//! Islands are found by BFS over spring links, sorted by size (largest first)
//! and placed row-major into the first free square of a grid that is
//! `ceil(sqrt(total)) + 1` cells wide. Rows are appended on demand.

use std::collections::VecDeque;

use glam::Vec2;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::NodeIndexable;

use super::config::PlacementParams;
use super::physics::spring_neighbors;
use crate::graph::NodeGraph;

/// Connected components over spring links, in discovery order.
pub fn find_islands(graph: &NodeGraph) -> Vec<Vec<NodeIndex>> {
    let mut visited = vec![false; graph.node_bound()];
    let mut islands = Vec::new();
    let mut queue = VecDeque::new();

    for start in graph.node_indices() {
        if visited[start.index()] {
            continue;
        }
        visited[start.index()] = true;
        queue.push_back(start);

        let mut island = Vec::new();
        while let Some(current) = queue.pop_front() {
            island.push(current);
            for next in spring_neighbors(graph, current) {
                if !visited[next.index()] {
                    visited[next.index()] = true;
                    queue.push_back(next);
                }
            }
        }
        islands.push(island);
    }
    islands
}

/// Row-major occupancy grid of fixed width that grows downward.
struct PackingGrid {
    columns: usize,
    occupied: Vec<bool>,
}

impl PackingGrid {
    fn new(columns: usize) -> Self {
        Self {
            columns,
            occupied: Vec::new(),
        }
    }

    fn rows(&self) -> usize {
        self.occupied.len() / self.columns
    }

    fn is_free(&self, col: usize, row: usize) -> bool {
        row >= self.rows() || !self.occupied[row * self.columns + col]
    }

    fn fits(&self, col: usize, row: usize, side: usize) -> bool {
        (row..row + side).all(|r| (col..col + side).all(|c| self.is_free(c, r)))
    }

    /// Find and claim the first free `side × side` square.
    fn claim(&mut self, side: usize) -> (usize, usize) {
        // An island wider than the grid still gets a square at the left edge.
        let last_col = self.columns.saturating_sub(side);
        let mut row = 0;
        let (col, row) = loop {
            if let Some(col) = (0..=last_col).find(|&col| self.fits(col, row, side)) {
                break (col, row);
            }
            row += 1;
        };

        let needed_rows = row + side;
        if needed_rows > self.rows() {
            self.occupied.resize(needed_rows * self.columns, false);
        }
        for r in row..row + side {
            for c in col..(col + side).min(self.columns) {
                self.occupied[r * self.columns + c] = true;
            }
        }
        (col, row)
    }
}

/// Pack every island into its own square and spread the result.
///
/// Returns the number of islands placed.
pub fn place_islands(graph: &mut NodeGraph, params: &PlacementParams) -> usize {
    let total = graph.node_count();
    if total == 0 {
        return 0;
    }

    let mut islands = find_islands(graph);
    islands.sort_by(|a, b| b.len().cmp(&a.len()));

    let columns = (total as f32).sqrt().ceil() as usize + 1;
    let grid_extent = columns as f32 * params.cell_size;
    let mut grid = PackingGrid::new(columns);

    for island in &islands {
        let side = (island.len() as f32).sqrt().ceil() as usize;
        let (col, row) = grid.claim(side);

        let square = side as f32 * params.cell_size;
        let center = Vec2::new(
            col as f32 * params.cell_size + square * 0.5 - grid_extent * 0.5,
            row as f32 * params.cell_size + square * 0.5 - grid_extent * 0.5,
        );
        let half_extent = square * params.fill * 0.5;

        let (min, max) = island.iter().fold(
            (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
            |(min, max), &i| {
                let p = graph[i].position();
                (min.min(p), max.max(p))
            },
        );
        let island_center = (min + max) * 0.5;
        let island_half = ((max - min) * 0.5).max(Vec2::splat(f32::EPSILON));

        for &i in island {
            let normalized = (graph[i].position() - island_center) / island_half;
            let placed = (center + normalized * half_extent) * params.expansion;
            graph[i].set_position(placed);
        }
    }

    tracing::debug!(islands = islands.len(), nodes = total, "packed islands");
    islands.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, LinkKind, NodeId};
    use crate::spatial::Rect;

    fn add(graph: &mut NodeGraph, p: Vec2) -> NodeIndex {
        let id = NodeId(graph.node_count() as u32);
        graph.add_node(GraphNode::new(id, format!("n{}", id.0), p, 1.0))
    }

    fn triangle(graph: &mut NodeGraph, offset: Vec2) -> Vec<NodeIndex> {
        let nodes = vec![
            add(graph, offset + Vec2::new(0.0, 0.0)),
            add(graph, offset + Vec2::new(0.3, 0.1)),
            add(graph, offset + Vec2::new(0.1, 0.4)),
        ];
        graph.add_edge(nodes[0], nodes[1], LinkKind::Spring);
        graph.add_edge(nodes[1], nodes[2], LinkKind::Spring);
        graph.add_edge(nodes[2], nodes[0], LinkKind::Spring);
        nodes
    }

    fn bounding_box(graph: &NodeGraph, nodes: &[NodeIndex]) -> Rect {
        nodes
            .iter()
            .map(|&i| graph[i].position())
            .fold(None, |acc: Option<Rect>, p| {
                Some(match acc {
                    None => Rect::from_corners(p, p),
                    Some(r) => Rect::from_corners(r.min().min(p), r.max().max(p)),
                })
            })
            .unwrap()
    }

    #[test]
    fn test_find_islands() {
        let mut graph = NodeGraph::default();
        let a = triangle(&mut graph, Vec2::ZERO);
        let lone = add(&mut graph, Vec2::ONE);
        let b = triangle(&mut graph, Vec2::ZERO);
        // dependencies alone do not join islands
        graph.add_edge(lone, a[0], LinkKind::Dependency);

        let islands = find_islands(&graph);
        assert_eq!(islands.len(), 3);
        assert_eq!(islands[0].len(), 3);
        assert_eq!(islands[1], vec![lone]);
        assert!(b.iter().all(|n| islands[2].contains(n)));
    }

    #[test]
    fn test_two_triangles_do_not_overlap() {
        let mut graph = NodeGraph::default();
        // start them on top of each other
        let a = triangle(&mut graph, Vec2::ZERO);
        let b = triangle(&mut graph, Vec2::new(0.05, 0.05));

        let placed = place_islands(&mut graph, &PlacementParams::default());
        assert_eq!(placed, 2);

        let box_a = bounding_box(&graph, &a);
        let box_b = bounding_box(&graph, &b);
        assert!(!box_a.inflate(0.01, 0.01).intersects(&box_b));
        assert!(graph.node_weights().all(|n| n.is_position_dirty()));
    }

    #[test]
    fn test_islands_keep_their_shape_orientation() {
        let mut graph = NodeGraph::default();
        let a = triangle(&mut graph, Vec2::new(5.0, 5.0));
        place_islands(&mut graph, &PlacementParams::default());
        // the node that was left-most stays left-most
        let xs: Vec<f32> = a.iter().map(|&i| graph[i].position().x).collect();
        assert!(xs[0] < xs[2] && xs[2] < xs[1]);
    }

    #[test]
    fn test_single_nodes_land_on_square_centers() {
        let mut graph = NodeGraph::default();
        for _ in 0..4 {
            add(&mut graph, Vec2::ZERO);
        }
        let params = PlacementParams::default();
        place_islands(&mut graph, &params);

        // 4 nodes: 3 columns of 2 units, grid centered on the origin
        let mut positions: Vec<Vec2> = graph.node_weights().map(|n| n.position()).collect();
        positions.sort_by(|a, b| (a.y, a.x).partial_cmp(&(b.y, b.x)).unwrap());
        let expected = [
            Vec2::new(-2.0, -2.0),
            Vec2::new(0.0, -2.0),
            Vec2::new(2.0, -2.0),
            Vec2::new(-2.0, 0.0),
        ];
        for (p, e) in positions.iter().zip(expected) {
            assert!(p.distance(e * params.expansion) < 1e-4, "{p:?} vs {e:?}");
        }
    }

    #[test]
    fn test_large_island_claims_a_larger_square() {
        let mut grid = PackingGrid::new(4);
        assert_eq!(grid.claim(3), (0, 0));
        assert_eq!(grid.claim(1), (3, 0));
        assert_eq!(grid.claim(2), (0, 3));
        assert_eq!(grid.claim(1), (3, 1));
    }

    #[test]
    fn test_empty_graph() {
        let mut graph = NodeGraph::default();
        assert_eq!(place_islands(&mut graph, &PlacementParams::default()), 0);
    }
}
