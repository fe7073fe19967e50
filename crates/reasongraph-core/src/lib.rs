//! # Reasongraph Core
//!
//! Analytics engine for confidence-weighted reasoning graphs: topology
//! metrics, rule-driven structural adaptation, and Bayesian uncertainty
//! propagation over a shared [`GraphModel`].

pub mod adaptation;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod session;

// Re-export commonly used types
pub use adaptation::{AdaptationEngine, ChangeExecutor, ChangeId, TopologyChange};
pub use config::EngineConfig;
pub use engine::belief::{BayesianUpdate, BeliefModel};
pub use engine::errors::EngineError;
pub use engine::graph::{
    ConfidenceVector, Edge, EdgeId, EdgeType, GraphBuilder, GraphModel, Node, NodeId, NodeType,
};
pub use engine::propagation::{Evidence, SourceType, UncertaintyPropagator};
pub use metrics::{MetricKind, MetricsCalculator, TopologyMetrics, TopologyState};
pub use session::ReasoningSession;

/// Compute topology metrics for a graph with default settings.
pub fn compute_metrics(graph: &GraphModel) -> TopologyMetrics {
    MetricsCalculator::default().compute(graph)
}
