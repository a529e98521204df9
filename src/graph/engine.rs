//! LayoutEngine - the shader network and its force simulation.
//!
//! The engine stores the network in petgraph's StableGraph (springs and
//! dependencies share one arena, told apart by [`LinkKind`]) and keeps every
//! node docked in a leaf of a fixed quad-tree. Each rendered frame runs a
//! bounded number of integration sub-steps until the kinetic energy settles.

use std::collections::{HashMap, HashSet};

use glam::Vec2;
use petgraph::Directed;
use petgraph::Direction;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::EdgeRef;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::document::DependencyPair;
use super::edge::LinkKind;
use super::node::{GraphNode, NodeId};
use super::viewport::Viewport;
use crate::error::{LayoutError, Result};
use crate::layout::physics::{spring_neighbors, total_spring_force};
use crate::layout::{LayoutConfig, RepulsionStrategy, Scene, Technique, place_islands, strategy_for};
use crate::spatial::{Body, CellId, LeafGrid, Rect, SpatialTree};

/// Node arena shared by the engine and the layout passes.
pub type NodeGraph = StableGraph<GraphNode, LinkKind, Directed>;

/// Whether the simulation is currently running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutState {
    Idle,
    ProcessingLayout,
}

/// The shader network layout engine.
///
/// This struct manages:
/// - Network topology via petgraph
/// - The quad-tree and its leaf lookup grid
/// - The active repulsion technique and adaptive time-stepping
/// - View state (pan, zoom, visible nodes, highlighted node)
pub struct LayoutEngine {
    /// Nodes with their simulation state; edges carry the link kind.
    graph: NodeGraph,

    /// Map from stable NodeId to petgraph NodeIndex
    node_id_to_index: HashMap<NodeId, NodeIndex>,

    /// Next node ID to assign
    next_node_id: u32,

    tree: SpatialTree<NodeIndex>,
    leaf_grid: LeafGrid,
    strategy: Box<dyn RepulsionStrategy>,
    config: LayoutConfig,

    /// Source of initial positions for loaded nodes
    rng: StdRng,

    state: LayoutState,
    adaptive_time_scale: f32,
    current_energy: f32,
    peak_energy: f32,

    /// Frames since construction, drives the periodic tree refresh
    frame_counter: u32,

    /// Frames spent in the current layout run
    layout_frames: u32,

    viewport: Viewport,
    visible_nodes: Vec<NodeId>,
    highlighted: Option<NodeId>,
}

impl LayoutEngine {
    /// Create an empty engine, rejecting a world the quad-tree cannot cover.
    pub fn try_new(config: LayoutConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Create an empty engine. The quad-tree is built once here and keeps its
    /// shape for the engine's lifetime.
    ///
    /// Invalid world parameters are clamped; use [`try_new`](Self::try_new) to
    /// reject them instead.
    pub fn new(mut config: LayoutConfig) -> Self {
        if let Err(err) = config.validate() {
            tracing::warn!(%err, "clamping world parameters");
            config.world = config.world.sanitized();
        }
        let world = config.world.bounds();
        let depth = config.world.tree_depth;
        let mut leaf_grid = LeafGrid::new(&world, depth);
        let tree = SpatialTree::build(world, depth, |leaf, bounds| leaf_grid.register(leaf, bounds));

        Self {
            graph: NodeGraph::default(),
            node_id_to_index: HashMap::new(),
            next_node_id: 0,
            tree,
            leaf_grid,
            strategy: strategy_for(config.technique),
            rng: StdRng::seed_from_u64(config.seed),
            state: LayoutState::Idle,
            adaptive_time_scale: 1.0,
            current_energy: 0.0,
            peak_energy: 0.0,
            frame_counter: 0,
            layout_frames: 0,
            viewport: Viewport::new(&config.view),
            visible_nodes: Vec::new(),
            highlighted: None,
            config,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    // =========================================================================
    // Document
    // =========================================================================

    /// Replace the network with the one described by `pairs` and start laying
    /// it out.
    ///
    /// Nodes are created on the first mention of their name. A pair whose
    /// dependency does not already target the node links the two with a spring
    /// and a dependency edge. Islands are packed before the simulation starts.
    pub fn load(&mut self, pairs: &[DependencyPair]) {
        self.reset();

        let mut by_name: HashMap<String, NodeIndex> = HashMap::new();
        for pair in pairs {
            let item = self.node_by_name(&mut by_name, &pair.node);
            let Some(dependency) = &pair.dependency else {
                continue;
            };
            let dependent = self.node_by_name(&mut by_name, dependency);
            if dependent == item {
                tracing::warn!(name = %pair.node, "ignoring self dependency");
                continue;
            }
            if !self.has_link(dependent, item, LinkKind::Dependency) {
                self.add_spring(item, dependent);
                self.add_link(dependent, item, LinkKind::Dependency);
            }
        }

        let islands = place_islands(&mut self.graph, &self.config.placement);
        self.rehome_logged();
        self.refresh_tree();
        self.state = LayoutState::ProcessingLayout;
        self.layout_frames = 0;

        tracing::info!(
            nodes = self.graph.node_count(),
            links = self.graph.edge_count(),
            islands,
            "loaded shader network"
        );
    }

    fn node_by_name(&mut self, by_name: &mut HashMap<String, NodeIndex>, name: &str) -> NodeIndex {
        if let Some(&index) = by_name.get(name) {
            return index;
        }
        let spread = self.config.placement.initial_spread;
        let position = if spread > 0.0 {
            Vec2::new(
                self.rng.gen_range(-spread..=spread),
                self.rng.gen_range(-spread..=spread),
            )
        } else {
            Vec2::ZERO
        };
        let (_, index) = self.create_node(name, position);
        by_name.insert(name.to_string(), index);
        index
    }

    /// Export the network as dependency pairs.
    ///
    /// Every neighbor that targets a node yields `(node, neighbor)`. Nodes not
    /// mentioned by any such pair are emitted on their own.
    pub fn save(&self) -> Vec<DependencyPair> {
        let mut pairs = Vec::new();
        let mut mentioned = HashSet::new();

        for index in self.graph.node_indices() {
            for neighbor in spring_neighbors(&self.graph, index) {
                if self.has_edge(neighbor, index, LinkKind::Dependency) {
                    pairs.push(DependencyPair::new(
                        self.graph[index].name(),
                        self.graph[neighbor].name(),
                    ));
                    mentioned.insert(index);
                    mentioned.insert(neighbor);
                }
            }
        }
        for index in self.graph.node_indices() {
            if !mentioned.contains(&index) {
                pairs.push(DependencyPair::single(self.graph[index].name()));
            }
        }
        pairs
    }

    /// Remove every node and clear the tree's attachments. Ids restart at 0.
    pub fn reset(&mut self) {
        let removed = self.graph.node_count();
        self.graph.clear();
        self.node_id_to_index.clear();
        self.next_node_id = 0;
        self.tree.clear();
        self.rng = StdRng::seed_from_u64(self.config.seed);
        self.state = LayoutState::Idle;
        self.adaptive_time_scale = 1.0;
        self.current_energy = 0.0;
        self.peak_energy = 0.0;
        self.layout_frames = 0;
        self.visible_nodes.clear();
        self.highlighted = None;

        if removed > 0 {
            tracing::info!(removed, "reset shader network");
        }
    }

    // =========================================================================
    // Node Operations
    // =========================================================================

    /// Add a node at a world position. The node is docked immediately.
    pub fn add_node(&mut self, name: &str, x: f32, y: f32) -> NodeId {
        let (id, index) = self.create_node(name, Vec2::new(x, y));
        if let Err(err) = self.rehome_node(index) {
            tracing::warn!(%id, %err, "failed to dock new node");
        }
        id
    }

    fn create_node(&mut self, name: &str, position: Vec2) -> (NodeId, NodeIndex) {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;

        let node = GraphNode::new(id, name, position, self.config.physics.node_mass);
        let index = self.graph.add_node(node);
        self.node_id_to_index.insert(id, index);
        (id, index)
    }

    /// Remove a node and its links.
    ///
    /// Nodes the deleted node targeted lose a dependency and become unusable.
    pub fn delete_node(&mut self, id: NodeId) -> Result<()> {
        let index = self.index_of(id)?;

        if let Some(leaf) = self.graph[index].docking_leaf() {
            self.tree.detach(leaf, index)?;
        }

        let targets: Vec<NodeIndex> = self.dependency_targets(index).collect();
        for target in targets {
            self.graph[target].set_usable(false);
        }

        self.graph.remove_node(index);
        self.node_id_to_index.remove(&id);
        self.visible_nodes.retain(|&v| v != id);
        if self.highlighted == Some(id) {
            self.highlighted = None;
        }
        Ok(())
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.graph.node_weights()
    }

    pub fn node(&self, id: NodeId) -> Result<&GraphNode> {
        let index = self.index_of(id)?;
        Ok(&self.graph[index])
    }

    /// The underlying arena, for read-only traversal.
    pub fn graph(&self) -> &NodeGraph {
        &self.graph
    }

    /// Teleport a node to a world position.
    pub fn set_node_position(&mut self, id: NodeId, x: f32, y: f32) -> Result<()> {
        let index = self.index_of(id)?;
        self.graph[index].set_position(Vec2::new(x, y));
        Ok(())
    }

    /// Drag a node by a screen-space delta.
    pub fn move_node(&mut self, id: NodeId, screen_dx: f32, screen_dy: f32) -> Result<()> {
        let index = self.index_of(id)?;
        let delta = self.viewport.screen_delta_to_world(Vec2::new(screen_dx, screen_dy));
        let node = &mut self.graph[index];
        node.set_position(node.position() + delta);
        Ok(())
    }

    pub fn set_highlighted_node(&mut self, id: Option<NodeId>) -> Result<()> {
        if let Some(id) = id {
            self.index_of(id)?;
        }
        self.highlighted = id;
        Ok(())
    }

    pub fn highlighted_node(&self) -> Option<NodeId> {
        self.highlighted
    }

    pub fn docking_leaf(&self, id: NodeId) -> Result<Option<CellId>> {
        Ok(self.node(id)?.docking_leaf())
    }

    fn index_of(&self, id: NodeId) -> Result<NodeIndex> {
        self.node_id_to_index
            .get(&id)
            .copied()
            .ok_or(LayoutError::UnknownNode(id))
    }

    // =========================================================================
    // Link Operations
    // =========================================================================

    /// Connect two nodes with a spring. Linking twice is a no-op.
    pub fn link(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        let (ia, ib) = self.distinct_pair(a, b)?;
        self.add_spring(ia, ib);
        Ok(())
    }

    /// Remove the spring between two nodes, if any.
    pub fn unlink(&mut self, a: NodeId, b: NodeId) -> Result<()> {
        let (ia, ib) = self.distinct_pair(a, b)?;
        self.remove_link(ia, ib, LinkKind::Spring);
        Ok(())
    }

    /// Make `source` target `target`. Adding an existing dependency is a no-op.
    pub fn link_topological(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        let (is, it) = self.distinct_pair(source, target)?;
        self.add_link(is, it, LinkKind::Dependency);
        Ok(())
    }

    pub fn unlink_topological(&mut self, source: NodeId, target: NodeId) -> Result<()> {
        let (is, it) = self.distinct_pair(source, target)?;
        self.remove_link(is, it, LinkKind::Dependency);
        Ok(())
    }

    /// Nodes connected to `id` by a spring.
    pub fn neighbors(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let index = self.index_of(id)?;
        Ok(spring_neighbors(&self.graph, index)
            .map(|n| self.graph[n].id())
            .collect())
    }

    /// Nodes that `id` targets through a dependency.
    pub fn targets(&self, id: NodeId) -> Result<Vec<NodeId>> {
        let index = self.index_of(id)?;
        Ok(self
            .dependency_targets(index)
            .map(|n| self.graph[n].id())
            .collect())
    }

    fn distinct_pair(&self, a: NodeId, b: NodeId) -> Result<(NodeIndex, NodeIndex)> {
        let ia = self.index_of(a)?;
        let ib = self.index_of(b)?;
        if ia == ib {
            return Err(LayoutError::SelfLink(a));
        }
        Ok((ia, ib))
    }

    fn dependency_targets(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .filter(|e| *e.weight() == LinkKind::Dependency)
            .map(|e| e.target())
    }

    fn has_edge(&self, from: NodeIndex, to: NodeIndex, kind: LinkKind) -> bool {
        self.graph.edges_connecting(from, to).any(|e| *e.weight() == kind)
    }

    /// Whether `from` and `to` are linked by `kind`, in either stored
    /// direction when the kind is undirected.
    fn has_link(&self, from: NodeIndex, to: NodeIndex, kind: LinkKind) -> bool {
        self.has_edge(from, to, kind) || (!kind.is_directed() && self.has_edge(to, from, kind))
    }

    /// Add a link unless an equivalent one already exists.
    fn add_link(&mut self, from: NodeIndex, to: NodeIndex, kind: LinkKind) {
        if !self.has_link(from, to, kind) {
            self.graph.add_edge(from, to, kind);
        }
    }

    fn add_spring(&mut self, a: NodeIndex, b: NodeIndex) {
        self.add_link(a, b, LinkKind::Spring);
    }

    fn remove_link(&mut self, from: NodeIndex, to: NodeIndex, kind: LinkKind) {
        self.remove_edges(from, to, kind);
        if !kind.is_directed() {
            self.remove_edges(to, from, kind);
        }
    }

    fn remove_edges(&mut self, from: NodeIndex, to: NodeIndex, kind: LinkKind) {
        let edges: Vec<_> = self
            .graph
            .edges_connecting(from, to)
            .filter(|e| *e.weight() == kind)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    // =========================================================================
    // Simulation
    // =========================================================================

    /// Restart the simulation after the network changed.
    pub fn activate_layout(&mut self) {
        if self.state != LayoutState::ProcessingLayout {
            tracing::debug!(nodes = self.graph.node_count(), "layout activated");
        }
        self.state = LayoutState::ProcessingLayout;
        self.layout_frames = 0;
    }

    pub fn set_technique(&mut self, technique: Technique) {
        if technique == self.strategy.technique() {
            return;
        }
        self.strategy = strategy_for(technique);
        self.config.technique = technique;
        self.refresh_tree();
        tracing::debug!(?technique, "repulsion technique changed");
    }

    pub fn technique(&self) -> Technique {
        self.strategy.technique()
    }

    /// Advance the engine by one rendered frame of `dt` seconds.
    pub fn update(&mut self, dt: f32) {
        if self.state == LayoutState::ProcessingLayout {
            for _ in 0..self.iterations_per_frame() {
                self.step(dt);
            }
            self.layout_frames += 1;

            if self.is_converged() {
                self.state = LayoutState::Idle;
                self.refresh_tree();
                tracing::info!(
                    frames = self.layout_frames,
                    energy = self.current_energy,
                    "layout converged"
                );
            }
        }

        self.rehome_logged();

        self.frame_counter = self.frame_counter.wrapping_add(1);
        let interval = self.config.convergence.tree_refresh_interval.max(1);
        if self.frame_counter % interval == 0 {
            self.refresh_tree();
        }
    }

    /// Sub-steps per frame, inversely proportional to the node count.
    pub fn iterations_per_frame(&self) -> u32 {
        let n = self.graph.node_count();
        if n == 0 {
            return 1;
        }
        let cc = &self.config.convergence;
        let max = cc.max_iterations_per_frame.max(1);
        ((cc.iteration_budget / n as f32).round() as u32).clamp(1, max)
    }

    fn step(&mut self, dt: f32) {
        let dt = dt * self.config.convergence.time_step_multiplier * self.adaptive_time_scale;
        if self.strategy.needs_tree() {
            self.resolve_tree();
        }

        let forces: Vec<(NodeIndex, Vec2)> = {
            let scene = Scene {
                graph: &self.graph,
                tree: &self.tree,
                params: &self.config.physics,
            };
            self.strategy.begin_step(&scene);
            self.graph
                .node_indices()
                .map(|i| {
                    let spring = total_spring_force(&self.graph, i, &self.config.physics);
                    (i, spring + self.strategy.repulsion(&scene, i))
                })
                .collect()
        };
        for (index, force) in forces {
            self.graph[index].integrate(force, dt, &self.config.physics);
        }

        // measured before the global impulse, which springs balance at rest
        let (total, peak) = self
            .graph
            .node_weights()
            .fold((0.0f32, 0.0f32), |(total, peak), n| {
                (total + n.kinetic_energy(), peak.max(n.kinetic_energy()))
            });
        self.current_energy = total;
        self.peak_energy = peak;
        self.adaptive_time_scale = self.time_scale_for(peak);

        let impulses: Vec<(NodeIndex, Vec2)> = {
            let scene = Scene {
                graph: &self.graph,
                tree: &self.tree,
                params: &self.config.physics,
            };
            self.graph
                .node_indices()
                .map(|i| (i, self.strategy.global_impulse(&scene, i, dt)))
                .filter(|(_, impulse)| *impulse != Vec2::ZERO)
                .collect()
        };
        let max_velocity = self.config.physics.max_velocity;
        for (index, impulse) in impulses {
            self.graph[index].apply_impulse(impulse, max_velocity);
        }

        self.rehome_logged();
    }

    fn time_scale_for(&self, peak: f32) -> f32 {
        let cc = &self.config.convergence;
        if peak < cc.boost_energy && peak > cc.min_boost_energy {
            (cc.boost_energy / peak).min(cc.max_time_scale)
        } else {
            1.0
        }
    }

    fn is_converged(&self) -> bool {
        let cc = &self.config.convergence;
        self.current_energy <= cc.energy_per_node * self.graph.node_count() as f32
            && self.peak_energy < cc.peak_energy
    }

    pub fn state(&self) -> LayoutState {
        self.state
    }

    pub fn is_processing_layout(&self) -> bool {
        self.state == LayoutState::ProcessingLayout
    }

    /// Total kinetic energy after the last sub-step.
    pub fn current_energy(&self) -> f32 {
        self.current_energy
    }

    /// Largest single-node kinetic energy after the last sub-step.
    pub fn peak_energy(&self) -> f32 {
        self.peak_energy
    }

    pub fn adaptive_time_scale(&self) -> f32 {
        self.adaptive_time_scale
    }

    // =========================================================================
    // Spatial Tree
    // =========================================================================

    pub fn tree(&self) -> &SpatialTree<NodeIndex> {
        &self.tree
    }

    pub fn leaf_grid(&self) -> &LeafGrid {
        &self.leaf_grid
    }

    /// Move every position-dirty node into the leaf covering its position.
    ///
    /// Returns how many nodes changed leaf.
    pub fn rehome_nodes(&mut self) -> Result<usize> {
        let dirty: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&i| self.graph[i].is_position_dirty())
            .collect();

        let mut moved = 0;
        for index in dirty {
            if self.rehome_node(index)? {
                moved += 1;
            }
        }
        if moved > 0 {
            tracing::trace!(moved, "re-homed nodes");
        }
        Ok(moved)
    }

    fn rehome_node(&mut self, index: NodeIndex) -> Result<bool> {
        let node = &self.graph[index];
        let target = self.leaf_grid.leaf_at(node.position());
        let current = node.docking_leaf();

        let changed = target != current;
        if changed {
            if let Some(old) = current {
                self.tree.detach(old, index)?;
            }
            self.graph[index].set_docking_leaf(None);
            if let Some(new) = target {
                self.tree.attach(new, index)?;
            }
            self.graph[index].set_docking_leaf(target);
        }
        self.graph[index].clear_position_dirty();
        Ok(changed)
    }

    fn rehome_logged(&mut self) {
        if let Err(err) = self.rehome_nodes() {
            tracing::warn!(%err, "re-homing failed");
        }
    }

    /// Recompute the aggregates of dirty cells.
    fn resolve_tree(&mut self) {
        let graph = &self.graph;
        self.tree.update(|k| match graph.node_weight(k) {
            Some(node) => Body {
                position: node.position(),
                mass: node.mass(),
            },
            None => Body {
                position: Vec2::ZERO,
                mass: 0.0,
            },
        });
    }

    /// Recompute every cell, picking up bodies that moved inside their leaf.
    fn refresh_tree(&mut self) {
        self.tree.mark_all_dirty();
        self.resolve_tree();
    }

    // =========================================================================
    // View
    // =========================================================================

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, rect: Rect) {
        self.viewport.set_rect(rect);
    }

    pub fn pan_view(&mut self, screen_dx: f32, screen_dy: f32) {
        self.viewport.pan(Vec2::new(screen_dx, screen_dy));
    }

    pub fn zoom(&mut self, delta: f32) {
        self.viewport.zoom_by(delta);
    }

    pub fn world_to_screen(&self, world: Vec2) -> Vec2 {
        self.viewport.world_to_screen(world)
    }

    pub fn screen_to_world(&self, screen: Vec2) -> Vec2 {
        self.viewport.screen_to_world(screen)
    }

    /// Collect the nodes docked in leaves overlapping the (margin-grown) viewport.
    pub fn find_visible_nodes(&mut self) -> &[NodeId] {
        let area = self
            .viewport
            .visible_world_rect(self.config.view.visible_margin);
        let mut found = Vec::new();
        self.tree.range_query(&area, &mut found);

        self.visible_nodes.clear();
        self.visible_nodes
            .extend(found.into_iter().filter_map(|i| self.graph.node_weight(i).map(|n| n.id())));
        &self.visible_nodes
    }

    /// Result of the last [`find_visible_nodes`](Self::find_visible_nodes).
    pub fn visible_nodes(&self) -> &[NodeId] {
        &self.visible_nodes
    }

    /// The node under a screen position, if any.
    pub fn intersect_nodes(&self, screen_x: f32, screen_y: f32) -> Option<NodeId> {
        let world = self.screen_to_world(Vec2::new(screen_x, screen_y));
        let axes = Vec2::from(self.config.view.hit_semi_axes);
        self.tree
            .intersect_point(world, axes, |k| {
                self.graph
                    .node_weight(k)
                    .map_or(Vec2::splat(f32::INFINITY), |n| n.position())
            })
            .and_then(|k| self.graph.node_weight(k))
            .map(|n| n.id())
    }
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}
