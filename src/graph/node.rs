//! Node type and related structures.
//!
//! Nodes are the shader atoms/stages of the network. Each node has:
//! - A stable unique identifier (survives graph mutations)
//! - Position and velocity in world space for the force simulation
//! - State flags (usable, position dirty)
//! - A back-reference to the quad-tree leaf it is docked in

use std::fmt;

use glam::Vec2;

use crate::layout::PhysicsParams;
use crate::spatial::CellId;

/// Stable node identifier.
///
/// This ID remains valid even after other nodes are removed from the graph.
/// It wraps a u32 for efficient storage and WebAssembly interop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Create a new NodeId from a raw u32.
    #[inline]
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw u32 value.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

impl From<u32> for NodeId {
    #[inline]
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<NodeId> for u32 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

/// Node state flags packed into a single byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeState {
    flags: u8,
}

impl NodeState {
    const UNUSABLE: u8 = 0b0000_0001;
    const POSITION_DIRTY: u8 = 0b0000_0010;

    /// Create a new default node state (usable, clean).
    #[inline]
    pub fn new() -> Self {
        Self { flags: 0 }
    }

    /// A node becomes unusable when a node it depended on is deleted.
    #[inline]
    pub fn is_usable(self) -> bool {
        self.flags & Self::UNUSABLE == 0
    }

    #[inline]
    pub fn set_usable(&mut self, usable: bool) {
        if usable {
            self.flags &= !Self::UNUSABLE;
        } else {
            self.flags |= Self::UNUSABLE;
        }
    }

    /// Whether the position changed since the node was last re-homed.
    #[inline]
    pub fn is_position_dirty(self) -> bool {
        self.flags & Self::POSITION_DIRTY != 0
    }

    #[inline]
    pub fn set_position_dirty(&mut self, dirty: bool) {
        if dirty {
            self.flags |= Self::POSITION_DIRTY;
        } else {
            self.flags &= !Self::POSITION_DIRTY;
        }
    }
}

/// A vertex of the shader network together with its simulation state.
///
/// Adjacency lives in the engine's graph arena, not here, so a node only
/// knows how to integrate the force it is handed.
#[derive(Debug, Clone)]
pub struct GraphNode {
    id: NodeId,
    name: String,
    position: Vec2,
    velocity: Vec2,
    kinetic_energy: f32,
    mass: f32,
    state: NodeState,
    docking_leaf: Option<CellId>,
}

impl GraphNode {
    /// Create a node at rest. New nodes start position-dirty so the first
    /// re-homing pass docks them.
    pub fn new(id: NodeId, name: impl Into<String>, position: Vec2, mass: f32) -> Self {
        let mut state = NodeState::new();
        state.set_position_dirty(true);
        Self {
            id,
            name: name.into(),
            position,
            velocity: Vec2::ZERO,
            kinetic_energy: 0.0,
            mass,
            state,
            docking_leaf: None,
        }
    }

    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Teleport the node. Marks the position dirty.
    pub fn set_position(&mut self, position: Vec2) {
        self.position = position;
        self.state.set_position_dirty(true);
    }

    #[inline]
    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// `|v|² · mass`, refreshed on every integration step.
    #[inline]
    pub fn kinetic_energy(&self) -> f32 {
        self.kinetic_energy
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_usable(&self) -> bool {
        self.state.is_usable()
    }

    pub(crate) fn set_usable(&mut self, usable: bool) {
        self.state.set_usable(usable);
    }

    pub fn is_position_dirty(&self) -> bool {
        self.state.is_position_dirty()
    }

    pub(crate) fn clear_position_dirty(&mut self) {
        self.state.set_position_dirty(false);
    }

    /// Leaf of the spatial tree this node is currently attached to.
    pub fn docking_leaf(&self) -> Option<CellId> {
        self.docking_leaf
    }

    pub(crate) fn set_docking_leaf(&mut self, leaf: Option<CellId>) {
        self.docking_leaf = leaf;
    }

    /// Advance the node by one step under `force`.
    ///
    /// The force goes straight into the velocity (unit mass), followed by
    /// damping, the velocity clamp and a symplectic Euler position update.
    pub fn integrate(&mut self, force: Vec2, dt: f32, params: &PhysicsParams) {
        self.velocity += force * dt;
        self.velocity *= 1.0 - params.damping * dt;
        self.clamp_velocity(params.max_velocity);
        self.kinetic_energy = self.velocity.length_squared() * self.mass;

        self.position += self.velocity * dt;
        self.state.set_position_dirty(true);
    }

    /// Add an instantaneous velocity change, still honoring the clamp.
    ///
    /// Kinetic energy keeps the value measured by the last [`integrate`](Self::integrate).
    pub fn apply_impulse(&mut self, impulse: Vec2, max_velocity: f32) {
        self.velocity += impulse;
        self.clamp_velocity(max_velocity);
    }

    fn clamp_velocity(&mut self, max_velocity: f32) {
        let speed_sq = self.velocity.length_squared();
        if speed_sq > max_velocity * max_velocity {
            self.velocity *= max_velocity / speed_sq.sqrt();
        }
    }
}
