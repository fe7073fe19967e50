//! Error types for reasoning graph analytics.

use thiserror::Error;

use crate::adaptation::ChangeId;
use crate::engine::graph::{EdgeId, NodeId};

/// Errors surfaced by the engine.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in the future without breaking changes.
///
/// Every variant carries the identifiers needed to reproduce the failure
/// (node, edge, change id or metric name). Degenerate numeric cases such as
/// an empty graph or a zero-variance distribution are not errors: they are
/// handled with explicit defaults at the computation site.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// An edge references a node that is not part of the graph.
    #[error("integrity error: edge {edge:?} references missing node {endpoint:?}")]
    DanglingEdge { edge: EdgeId, endpoint: NodeId },

    /// A node with this id already exists.
    #[error("integrity error: duplicate node {0:?}")]
    DuplicateNode(NodeId),

    /// An edge with this id already exists.
    #[error("integrity error: duplicate edge {0:?}")]
    DuplicateEdge(EdgeId),

    /// The requested node is not part of the graph.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The requested edge is not part of the graph.
    #[error("unknown edge {0:?}")]
    UnknownEdge(EdgeId),

    /// A confidence or probability value was NaN/Inf or structurally invalid.
    #[error("invalid confidence in {context}: {value}")]
    InvalidConfidence { context: String, value: f64 },

    /// Configuration or input validation failure.
    #[error("validation error: {0}")]
    Validation(String),

    /// A topology change could not be applied to the working copy.
    #[error("change {change:?} could not be applied: {reason}")]
    ChangeApplication { change: ChangeId, reason: String },

    /// Rollback was requested for a change recorded as irreversible.
    #[error("change {0:?} is not reversible")]
    Irreversible(ChangeId),

    /// The change log has no entry with this id.
    #[error("unknown change {0:?}")]
    UnknownChange(ChangeId),

    /// Numerical stability error (NaN/Inf, invalid distribution parameters).
    #[error("numerical error: {0}")]
    Numerical(String),
}
