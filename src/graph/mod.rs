//! Shader network data structures and the layout engine.
//!
//! The network lives in petgraph's StableGraph so node handles stay valid
//! across deletions. Springs and dependencies share the arena and are told
//! apart by [`LinkKind`].

mod document;
mod edge;
mod engine;
mod node;
mod viewport;

pub use document::{DependencyPair, format_pairs, parse_pairs};
pub use edge::LinkKind;
pub use engine::{LayoutEngine, LayoutState, NodeGraph};
pub use node::{GraphNode, NodeId, NodeState};
pub use viewport::Viewport;
