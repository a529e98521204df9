//! Pairwise force terms shared by every repulsion technique.
//!
//! Springs are always evaluated exactly against the node's direct neighbors.
//! Repulsion terms use the inverse-square law `ratio · mᵢ · mⱼ / r²` pointing
//! away from the other body.

use glam::Vec2;
use petgraph::Direction;
use petgraph::stable_graph::NodeIndex;
use petgraph::visit::EdgeRef;

use super::config::PhysicsParams;
use crate::graph::{LinkKind, NodeGraph};

/// Nodes connected to `index` by a spring, whatever the stored edge direction.
pub fn spring_neighbors(graph: &NodeGraph, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
    let outgoing = graph
        .edges_directed(index, Direction::Outgoing)
        .filter(|e| *e.weight() == LinkKind::Spring)
        .map(|e| e.target());
    let incoming = graph
        .edges_directed(index, Direction::Incoming)
        .filter(|e| *e.weight() == LinkKind::Spring)
        .map(|e| e.source());
    outgoing.chain(incoming)
}

/// Hooke force on a body at `p` from a spring anchored at `q`.
///
/// Stretched springs pull toward `q`, compressed springs push away.
pub fn spring_force(p: Vec2, q: Vec2, params: &PhysicsParams) -> Vec2 {
    let d = q - p;
    let dist = d.length();
    if dist < params.spring_min_distance {
        return Vec2::ZERO;
    }
    d * (params.spring_constant * (dist - params.rest_length) / dist)
}

/// Sum of the spring forces acting on `index`.
pub fn total_spring_force(graph: &NodeGraph, index: NodeIndex, params: &PhysicsParams) -> Vec2 {
    let p = graph[index].position();
    spring_neighbors(graph, index)
        .map(|n| spring_force(p, graph[n].position(), params))
        .sum()
}

/// Inverse-square repulsion on a body at `p` from a mass at `q`.
///
/// The caller is responsible for skipping degenerate distances.
#[inline]
pub fn repulsion_force(p: Vec2, q: Vec2, mass_p: f32, mass_q: f32, ratio: f32) -> Vec2 {
    let d = p - q;
    let dist = d.length();
    d * (ratio * mass_p * mass_q / (dist * dist * dist))
}
