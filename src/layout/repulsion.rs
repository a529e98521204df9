//! Node-node repulsion techniques.
//!
//! The engine holds one boxed [`RepulsionStrategy`] and asks it for the
//! repulsion acting on each node during a sub-step:
//!
//! - [`BruteForce`]: exact O(n²) pairwise sum with near/far cutoffs
//! - [`BarnesHut`]: O(n log n) walk over the quad-tree's aggregated masses
//! - [`Fuzzy`]: O(n) neighbor-only repulsion plus one impulse away from the
//!   graph's center of mass

use glam::Vec2;
use petgraph::stable_graph::NodeIndex;

use super::config::{PhysicsParams, Technique};
use super::physics::{repulsion_force, spring_neighbors};
use crate::graph::NodeGraph;
use crate::spatial::{CellId, EMPTY_CELL_MASS, SpatialTree};

/// Read-only view of the simulation handed to a strategy.
pub struct Scene<'a> {
    pub graph: &'a NodeGraph,
    pub tree: &'a SpatialTree<NodeIndex>,
    pub params: &'a PhysicsParams,
}

/// A way of computing node-node repulsion.
pub trait RepulsionStrategy {
    fn technique(&self) -> Technique;

    /// Whether the quad-tree aggregates must be resolved before each sub-step.
    fn needs_tree(&self) -> bool {
        false
    }

    /// Called once per sub-step before any force is requested.
    fn begin_step(&mut self, _scene: &Scene<'_>) {}

    /// Repulsion acting on `index` at its current position.
    fn repulsion(&self, scene: &Scene<'_>, index: NodeIndex) -> Vec2;

    /// Velocity change applied to `index` after the sub-step's integration.
    fn global_impulse(&self, _scene: &Scene<'_>, _index: NodeIndex, _dt: f32) -> Vec2 {
        Vec2::ZERO
    }
}

/// Create the strategy implementing `technique`.
pub fn strategy_for(technique: Technique) -> Box<dyn RepulsionStrategy> {
    match technique {
        Technique::BruteForce => Box::new(BruteForce),
        Technique::Quad => Box::new(BarnesHut),
        Technique::Fuzzy => Box::new(Fuzzy::default()),
    }
}

// =============================================================================
// BruteForce
// =============================================================================

/// Exact repulsion against every other node.
#[derive(Debug, Default)]
pub struct BruteForce;

impl RepulsionStrategy for BruteForce {
    fn technique(&self) -> Technique {
        Technique::BruteForce
    }

    fn repulsion(&self, scene: &Scene<'_>, index: NodeIndex) -> Vec2 {
        let params = scene.params;
        let node = &scene.graph[index];
        let p = node.position();

        let mut force = Vec2::ZERO;
        for other in scene.graph.node_indices() {
            if other == index {
                continue;
            }
            let q = scene.graph[other].position();
            let dist = p.distance(q);
            if dist < params.brute_force_min_distance || dist > params.brute_force_max_distance {
                continue;
            }
            force += repulsion_force(p, q, node.mass(), scene.graph[other].mass(), params.repel_ratio);
        }
        force
    }
}

// =============================================================================
// Barnes-Hut
// =============================================================================

/// Barnes-Hut approximation over the engine's quad-tree.
///
/// A cell is opened when `width / distance >= theta` or when it contains the
/// query point; otherwise its whole subtree acts as one mass at its center of
/// mass. Leaves are always summed body by body.
#[derive(Debug, Default)]
pub struct BarnesHut;

impl BarnesHut {
    fn walk(&self, scene: &Scene<'_>, cell: CellId, index: NodeIndex, p: Vec2, mass: f32) -> Vec2 {
        let tree = scene.tree;
        let params = scene.params;

        if tree.is_leaf(cell) {
            let mut force = Vec2::ZERO;
            for &other in tree.attached(cell) {
                if other == index {
                    continue;
                }
                let body = &scene.graph[other];
                let q = body.position();
                if p.distance(q) < params.body_min_distance {
                    continue;
                }
                force += repulsion_force(p, q, mass, body.mass(), params.repel_ratio);
            }
            return force;
        }

        let bounds = tree.bounds(cell);
        let com = tree.center_of_mass(cell);
        let dist = p.distance(com);

        if bounds.contains(p) || bounds.width >= params.barnes_hut_theta * dist {
            let Some(children) = tree.children(cell) else {
                return Vec2::ZERO;
            };
            children
                .into_iter()
                .filter(|&child| tree.mass(child) > EMPTY_CELL_MASS)
                .map(|child| self.walk(scene, child, index, p, mass))
                .sum()
        } else if dist < params.barnes_hut_min_distance {
            Vec2::ZERO
        } else {
            repulsion_force(p, com, mass, tree.mass(cell), params.repel_ratio)
        }
    }
}

impl RepulsionStrategy for BarnesHut {
    fn technique(&self) -> Technique {
        Technique::Quad
    }

    fn needs_tree(&self) -> bool {
        true
    }

    fn repulsion(&self, scene: &Scene<'_>, index: NodeIndex) -> Vec2 {
        let root = scene.tree.root();
        if scene.tree.mass(root) <= EMPTY_CELL_MASS {
            return Vec2::ZERO;
        }
        let node = &scene.graph[index];
        self.walk(scene, root, index, node.position(), node.mass())
    }
}

// =============================================================================
// Fuzzy
// =============================================================================

/// Neighbor-only repulsion plus a graph-wide push away from the center of mass.
#[derive(Debug, Default)]
pub struct Fuzzy {
    center_of_mass: Vec2,
    total_mass: f32,
}

impl Fuzzy {
    pub fn center_of_mass(&self) -> Vec2 {
        self.center_of_mass
    }

    pub fn total_mass(&self) -> f32 {
        self.total_mass
    }
}

impl RepulsionStrategy for Fuzzy {
    fn technique(&self) -> Technique {
        Technique::Fuzzy
    }

    fn begin_step(&mut self, scene: &Scene<'_>) {
        let mut total = 0.0;
        let mut weighted = Vec2::ZERO;
        for node in scene.graph.node_weights() {
            total += node.mass();
            weighted += node.position() * node.mass();
        }
        self.total_mass = total;
        self.center_of_mass = if total > 0.0 { weighted / total } else { Vec2::ZERO };
    }

    fn repulsion(&self, scene: &Scene<'_>, index: NodeIndex) -> Vec2 {
        let params = scene.params;
        let node = &scene.graph[index];
        let p = node.position();
        let min_sq = params.fuzzy_min_distance * params.fuzzy_min_distance;

        let mut force = Vec2::ZERO;
        for other in spring_neighbors(scene.graph, index) {
            let body = &scene.graph[other];
            let q = body.position();
            if p.distance_squared(q) < min_sq {
                continue;
            }
            force += repulsion_force(p, q, node.mass(), body.mass(), params.repel_ratio);
        }
        force
    }

    fn global_impulse(&self, scene: &Scene<'_>, index: NodeIndex, dt: f32) -> Vec2 {
        let node = &scene.graph[index];
        let d = self.center_of_mass - node.position();
        let mut dist = d.length();
        if dist < scene.params.body_min_distance {
            return Vec2::ZERO;
        }
        // Close to the center the falloff is inverted so the push stays bounded.
        if dist < 1.0 {
            dist = 1.0 / dist;
        }
        d * (-dt * self.total_mass * node.mass() / (dist * dist * dist))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{GraphNode, LinkKind, NodeId};
    use crate::spatial::{Body, LeafGrid, Rect};

    struct Fixture {
        graph: NodeGraph,
        tree: SpatialTree<NodeIndex>,
        params: PhysicsParams,
    }

    impl Fixture {
        fn new(positions: &[Vec2]) -> Self {
            let world = Rect::new(-1024.0, -1024.0, 2048.0, 2048.0);
            let mut grid = LeafGrid::new(&world, 8);
            let mut tree = SpatialTree::build(world, 8, |id, r| grid.register(id, r));

            let mut graph = NodeGraph::default();
            for (i, &p) in positions.iter().enumerate() {
                let index = graph.add_node(GraphNode::new(NodeId(i as u32), format!("n{i}"), p, 1.0));
                if let Some(leaf) = grid.leaf_at(p) {
                    tree.attach(leaf, index).unwrap();
                }
            }
            tree.update(|k| Body {
                position: graph[k].position(),
                mass: graph[k].mass(),
            });
            Self {
                graph,
                tree,
                params: PhysicsParams::default(),
            }
        }

        fn scene(&self) -> Scene<'_> {
            Scene {
                graph: &self.graph,
                tree: &self.tree,
                params: &self.params,
            }
        }
    }

    fn scattered(n: usize) -> Vec<Vec2> {
        // Deterministic spiral spread over a few dozen leaves.
        (0..n)
            .map(|i| {
                let t = i as f32 * 0.7;
                Vec2::new(t.cos(), t.sin()) * (2.0 + i as f32 * 1.3)
            })
            .collect()
    }

    #[test]
    fn test_brute_force_pair_is_symmetric() {
        let fx = Fixture::new(&[Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)]);
        let scene = fx.scene();
        let a = BruteForce.repulsion(&scene, NodeIndex::new(0));
        let b = BruteForce.repulsion(&scene, NodeIndex::new(1));
        assert!(a.x < 0.0 && b.x > 0.0);
        assert!((a + b).length() < 1e-6);
        // 1.5 / 2²
        assert!((a.length() - 0.375).abs() < 1e-5);
    }

    #[test]
    fn test_brute_force_cutoffs() {
        let fx = Fixture::new(&[Vec2::ZERO, Vec2::new(0.005, 0.0), Vec2::new(600.0, 0.0)]);
        let scene = fx.scene();
        assert_eq!(BruteForce.repulsion(&scene, NodeIndex::new(0)), Vec2::ZERO);
    }

    #[test]
    fn test_barnes_hut_close_to_brute_force() {
        let fx = Fixture::new(&scattered(60));
        let scene = fx.scene();
        let mut total_error = 0.0;
        let mut total_force = 0.0;
        for index in fx.graph.node_indices() {
            let exact = BruteForce.repulsion(&scene, index);
            let approx = BarnesHut.repulsion(&scene, index);
            total_error += (exact - approx).length();
            total_force += exact.length();
        }
        assert!(
            total_error <= 0.1 * total_force,
            "relative error {}",
            total_error / total_force
        );
    }

    #[test]
    fn test_barnes_hut_far_cluster_acts_as_point_mass() {
        let mut positions = vec![Vec2::new(-500.0, -500.0)];
        positions.extend((0..4).map(|i| Vec2::new(500.0 + i as f32, 500.0)));
        let fx = Fixture::new(&positions);
        let scene = fx.scene();

        let approx = BarnesHut.repulsion(&scene, NodeIndex::new(0));
        let com = Vec2::new(501.5, 500.0);
        let expected = repulsion_force(positions[0], com, 1.0, 4.0, fx.params.repel_ratio);
        assert!((approx - expected).length() < 1e-6 * expected.length().max(1.0));
    }

    #[test]
    fn test_barnes_hut_empty_tree() {
        let mut fx = Fixture::new(&[Vec2::ZERO]);
        fx.tree.clear();
        assert_eq!(BarnesHut.repulsion(&fx.scene(), NodeIndex::new(0)), Vec2::ZERO);
    }

    #[test]
    fn test_fuzzy_only_sees_neighbors() {
        let mut fx = Fixture::new(&[Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]);
        fx.graph.add_edge(NodeIndex::new(0), NodeIndex::new(1), LinkKind::Spring);
        let scene = fx.scene();
        let f = Fuzzy::default().repulsion(&scene, NodeIndex::new(0));
        assert!((f - Vec2::new(-1.5, 0.0)).length() < 1e-6);
        assert_eq!(Fuzzy::default().repulsion(&scene, NodeIndex::new(2)), Vec2::ZERO);
    }

    #[test]
    fn test_fuzzy_global_impulse_pushes_outward() {
        let fx = Fixture::new(&[Vec2::new(-4.0, 0.0), Vec2::new(4.0, 0.0), Vec2::new(0.0, 0.0)]);
        let scene = fx.scene();
        let mut fuzzy = Fuzzy::default();
        fuzzy.begin_step(&scene);
        assert_eq!(fuzzy.center_of_mass(), Vec2::ZERO);
        assert_eq!(fuzzy.total_mass(), 3.0);

        let left = fuzzy.global_impulse(&scene, NodeIndex::new(0), 0.1);
        let right = fuzzy.global_impulse(&scene, NodeIndex::new(1), 0.1);
        assert!(left.x < 0.0 && right.x > 0.0);
        // 0.1 * 3 * 4 / 4³
        assert!((right.x - 0.01875).abs() < 1e-6);
        // a node sitting on the center of mass gets no push
        assert_eq!(fuzzy.global_impulse(&scene, NodeIndex::new(2), 0.1), Vec2::ZERO);
    }

    #[test]
    fn test_strategy_for() {
        for technique in [Technique::BruteForce, Technique::Quad, Technique::Fuzzy] {
            let strategy = strategy_for(technique);
            assert_eq!(strategy.technique(), technique);
            assert_eq!(strategy.needs_tree(), technique == Technique::Quad);
        }
    }
}
