//! Error type shared by the engine, the spatial tree and the wasm facade.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors raised when a caller breaks an engine precondition.
///
/// The engine never silently ignores a stale handle: a corrupted tree would
/// only show up later as layout drift, so misuse is reported immediately.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    #[error("cannot link {0} to itself")]
    SelfLink(NodeId),

    #[error("spatial tree consistency violated: {0}")]
    Consistency(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
