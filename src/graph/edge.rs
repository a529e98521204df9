//! Link kinds stored on the edges of the node arena.
//!
//! A pair of nodes can be connected in two independent ways:
//! - a spring, which is undirected and drives the physics
//! - a dependency, which is directed and only describes the topology

use std::fmt;

use serde::{Deserialize, Serialize};

/// The kind of an edge in the engine's graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkKind {
    /// Undirected physics edge. Stored once, whatever the edge direction.
    Spring,
    /// Directed topology edge: the source targets the destination.
    Dependency,
}

impl LinkKind {
    /// Whether the edge direction carries meaning.
    #[inline]
    pub fn is_directed(self) -> bool {
        matches!(self, LinkKind::Dependency)
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkKind::Spring => f.write_str("spring"),
            LinkKind::Dependency => f.write_str("dependency"),
        }
    }
}
