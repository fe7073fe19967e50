//! Change execution with impact assessment and an append-only change log.
//!
//! [`ChangeExecutor::apply`] never mutates the caller's graph. It applies the
//! change to a copy, re-measures the topology and records the outcome.
//! Failures are recorded too and hand the original graph back unchanged.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::adaptation::change::{
    ChangeId, ChangeIdGenerator, ChangeKind, ChangeOperation, ImpactEstimate, TopologyChange,
};
use crate::engine::errors::EngineError;
use crate::engine::graph::{GraphModel, MetaValue};
use crate::metrics::{MetricKind, MetricsCalculator, MetricsDelta};

/// Metric change above which an effect counts as cascading.
pub const DEFAULT_CASCADE_THRESHOLD: f64 = 0.1;

/// Metadata key linking a rollback to the change it reverts.
pub const REVERTS_KEY: &str = "reverts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeStatus {
    Applied,
    Failed,
}

/// One immutable entry of the change log.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeRecord {
    pub change: TopologyChange,
    pub status: ChangeStatus,
    /// Operation undoing the change, for applied changes
    pub inverse: Option<ChangeOperation>,
    /// Set when this entry is the rollback of an earlier change
    pub reverts: Option<ChangeId>,
    pub error: Option<String>,
}

/// Result of applying one change.
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub success: bool,
    /// The new graph on success, the untouched input on failure
    pub graph: GraphModel,
    /// The change with measured metrics and impact filled in
    pub change: TopologyChange,
    pub metrics_change: MetricsDelta,
    /// Metrics that moved by more than the cascade threshold
    pub unexpected_effects: Vec<MetricKind>,
    pub recommendations: Vec<String>,
}

/// Applies topology changes and keeps the change history.
#[derive(Debug)]
pub struct ChangeExecutor {
    calculator: MetricsCalculator,
    cascade_threshold: f64,
    ids: Arc<ChangeIdGenerator>,
    log: RwLock<Vec<ChangeRecord>>,
    /// Held from the already-reverted check until the rollback is logged
    revert_guard: Mutex<()>,
}

impl Default for ChangeExecutor {
    fn default() -> Self {
        Self::new(MetricsCalculator::default(), Arc::default())
    }
}

impl ChangeExecutor {
    pub fn new(calculator: MetricsCalculator, ids: Arc<ChangeIdGenerator>) -> Self {
        Self {
            calculator,
            cascade_threshold: DEFAULT_CASCADE_THRESHOLD,
            ids,
            log: RwLock::new(Vec::new()),
            revert_guard: Mutex::new(()),
        }
    }

    pub fn with_cascade_threshold(mut self, threshold: f64) -> Self {
        self.cascade_threshold = threshold;
        self
    }

    /// Applies `change` to a copy of `graph`.
    ///
    /// Every application, successful or not, is appended to the change log.
    pub fn apply(&self, graph: &GraphModel, change: TopologyChange) -> ChangeOutcome {
        self.apply_inner(graph, change, None)
    }

    /// Rolls back an applied, reversible change by applying its recorded
    /// inverse as a new change that references the original.
    ///
    /// Concurrent reverts are serialized, so a change is rolled back at most once.
    pub fn revert(&self, graph: &GraphModel, id: ChangeId) -> Result<ChangeOutcome, EngineError> {
        let _guard = self.revert_guard.lock();
        let inverse = {
            let log = self.log.read();
            let record = log
                .iter()
                .find(|r| r.change.id == id)
                .ok_or(EngineError::UnknownChange(id))?;
            if record.status != ChangeStatus::Applied {
                return Err(EngineError::Validation(format!(
                    "{} failed and has nothing to revert",
                    id
                )));
            }
            if log.iter().any(|r| r.reverts == Some(id) && r.status == ChangeStatus::Applied) {
                return Err(EngineError::Validation(format!("{} was already reverted", id)));
            }
            match (&record.inverse, record.change.reversible) {
                (Some(inverse), true) => inverse.clone(),
                _ => return Err(EngineError::Irreversible(id)),
            }
        };

        let rollback = TopologyChange::new(self.ids.next_id(), inverse, format!("revert {}", id))
            .with_confidence(1.0)
            .with_metadata(REVERTS_KEY, MetaValue::Text(id.to_string()));

        #[cfg(feature = "tracing")]
        tracing::info!("reverting {} as {}", id, rollback.id);

        Ok(self.apply_inner(graph, rollback, Some(id)))
    }

    /// Snapshot of the change log in application order.
    pub fn history(&self) -> Vec<ChangeRecord> {
        self.log.read().clone()
    }

    pub fn record(&self, id: ChangeId) -> Option<ChangeRecord> {
        self.log.read().iter().find(|r| r.change.id == id).cloned()
    }

    pub fn is_reverted(&self, id: ChangeId) -> bool {
        self.log
            .read()
            .iter()
            .any(|r| r.reverts == Some(id) && r.status == ChangeStatus::Applied)
    }

    fn apply_inner(
        &self,
        graph: &GraphModel,
        mut change: TopologyChange,
        reverts: Option<ChangeId>,
    ) -> ChangeOutcome {
        let before = self.calculator.compute(graph);
        let touched = change.operation.to_patch().touched_nodes(graph);
        let mut working = graph.clone();

        let inverse = match change.operation.apply(&mut working) {
            Ok(inverse) => inverse,
            Err(err) => {
                let err = EngineError::ChangeApplication {
                    change: change.id,
                    reason: err.to_string(),
                };
                #[cfg(feature = "tracing")]
                tracing::warn!("{}", err);
                let reason = err.to_string();
                change.metrics_before = Some(before.clone());
                change.metrics_after = Some(before);
                let recommendations = vec![format!("Investigate failed {}: {}", change.id, reason)];
                self.log.write().push(ChangeRecord {
                    change: change.clone(),
                    status: ChangeStatus::Failed,
                    inverse: None,
                    reverts,
                    error: Some(reason),
                });
                return ChangeOutcome {
                    success: false,
                    graph: graph.clone(),
                    change,
                    metrics_change: MetricsDelta::default(),
                    unexpected_effects: Vec::new(),
                    recommendations,
                };
            }
        };

        let after = self.calculator.compute(&working);
        let delta = before.delta(&after);
        let unexpected_effects = delta.exceeding(self.cascade_threshold);
        let expected = expected_metrics(change.kind);
        let off_footprint: Vec<MetricKind> = unexpected_effects
            .iter()
            .copied()
            .filter(|k| !expected.contains(k))
            .collect();

        let node_base = before.node_count.max(after.node_count).max(1) as f64;
        change.impact = ImpactEstimate {
            local: (touched.len() as f64 / node_base).min(1.0),
            global: delta.max_abs().min(1.0),
            cascading: !unexpected_effects.is_empty(),
            assessed: true,
        };

        let mut recommendations = Vec::new();
        if change.impact.cascading {
            recommendations.push(format!(
                "Monitor cascading effects on {}",
                join_metrics(&unexpected_effects)
            ));
        }
        if !off_footprint.is_empty() {
            recommendations.push(format!(
                "Review changes in {}, not usually moved by {:?}",
                join_metrics(&off_footprint),
                change.kind
            ));
        }
        if after.connected_components > before.connected_components {
            recommendations.push("Change fragmented the graph; consider adding a bridge".into());
        }

        change.metrics_before = Some(before);
        change.metrics_after = Some(after);

        #[cfg(feature = "tracing")]
        tracing::info!(
            "applied {} ({:?}): global impact {:.3}, cascading={}",
            change.id,
            change.kind,
            change.impact.global,
            change.impact.cascading
        );

        self.log.write().push(ChangeRecord {
            change: change.clone(),
            status: ChangeStatus::Applied,
            inverse: Some(inverse),
            reverts,
            error: None,
        });

        ChangeOutcome {
            success: true,
            graph: working,
            change,
            metrics_change: delta,
            unexpected_effects,
            recommendations,
        }
    }
}

/// Metrics a change of this kind usually moves.
fn expected_metrics(kind: ChangeKind) -> &'static [MetricKind] {
    match kind {
        ChangeKind::NodeAddition | ChangeKind::NodeRemoval => &[
            MetricKind::Density,
            MetricKind::Centralization,
            MetricKind::AveragePathLength,
            MetricKind::Efficiency,
            MetricKind::Complexity,
        ],
        ChangeKind::EdgeAddition | ChangeKind::EdgeRemoval => &[
            MetricKind::Density,
            MetricKind::ClusteringCoefficient,
            MetricKind::Transitivity,
            MetricKind::AveragePathLength,
            MetricKind::Efficiency,
            MetricKind::Robustness,
        ],
        ChangeKind::EdgeReweight => &[
            MetricKind::AveragePathLength,
            MetricKind::Efficiency,
            MetricKind::Modularity,
        ],
        ChangeKind::Restructure => &MetricKind::ALL,
    }
}

fn join_metrics(kinds: &[MetricKind]) -> String {
    kinds
        .iter()
        .map(MetricKind::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::{ConfidenceVector, EdgeId, EdgeType, NodeId, NodeType};

    fn chain() -> GraphModel {
        let mut g = GraphModel::new();
        let a = g.add_node(NodeType::Hypothesis, "A", ConfidenceVector::uniform(0.5))
            .expect("node");
        let b = g.add_node(NodeType::Hypothesis, "B", ConfidenceVector::uniform(0.5))
            .expect("node");
        let c = g.add_node(NodeType::Hypothesis, "C", ConfidenceVector::uniform(0.5))
            .expect("node");
        g.add_edge(a, b, EdgeType::Supportive, 0.9).expect("a-b");
        g.add_edge(b, c, EdgeType::Supportive, 0.9).expect("b-c");
        g
    }

    #[test]
    fn remove_node_cascades_and_is_logged() {
        let executor = ChangeExecutor::default();
        let graph = chain();
        let change = TopologyChange::new(ChangeId(1), ChangeOperation::RemoveNode(NodeId(1)), "test");
        let outcome = executor.apply(&graph, change);
        assert!(outcome.success);
        assert_eq!(outcome.graph.node_count(), 2);
        assert_eq!(outcome.graph.edge_count(), 0);
        assert!(outcome.change.impact.cascading);
        assert!(outcome.change.impact.assessed);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(executor.history().len(), 1);
    }

    #[test]
    fn failure_returns_original_graph() {
        let executor = ChangeExecutor::default();
        let graph = chain();
        let change = TopologyChange::new(ChangeId(1), ChangeOperation::RemoveEdge(EdgeId(42)), "bad");
        let outcome = executor.apply(&graph, change);
        assert!(!outcome.success);
        assert_eq!(outcome.graph, graph);
        assert!(outcome.recommendations[0].starts_with("Investigate"));
        let history = executor.history();
        assert_eq!(history[0].status, ChangeStatus::Failed);
        assert!(history[0].error.is_some());
    }

    #[test]
    fn revert_restores_metrics() {
        let calc = MetricsCalculator::default();
        let executor = ChangeExecutor::default();
        let graph = chain();
        let applied = executor.apply(
            &graph,
            TopologyChange::new(ChangeId(1), ChangeOperation::RemoveNode(NodeId(1)), "prune"),
        );
        let reverted = executor
            .revert(&applied.graph, ChangeId(1))
            .expect("reversible");
        assert!(reverted.success);
        assert_eq!(calc.compute(&reverted.graph), calc.compute(&graph));
        assert!(executor.is_reverted(ChangeId(1)));
        assert_eq!(executor.history().len(), 2);
        assert!(executor.revert(&reverted.graph, ChangeId(1)).is_err());
    }

    #[test]
    fn large_moves_are_flagged_even_when_expected() {
        let mut g = GraphModel::new();
        let a = g.add_node(NodeType::Hypothesis, "A", ConfidenceVector::uniform(0.5))
            .expect("node");
        let b = g.add_node(NodeType::Hypothesis, "B", ConfidenceVector::uniform(0.5))
            .expect("node");
        let edge = g.add_edge(a, b, EdgeType::Supportive, 0.9).expect("edge");
        let outcome = ChangeExecutor::default().apply(
            &g,
            TopologyChange::new(ChangeId(1), ChangeOperation::RemoveEdge(edge), "drop"),
        );
        assert!(outcome.success);
        assert_eq!(outcome.metrics_change.get(MetricKind::Density), Some(-1.0));
        assert!(outcome.unexpected_effects.contains(&MetricKind::Density));
        assert!(outcome.change.impact.cascading);
    }

    #[test]
    fn failed_change_records_application_error() {
        let executor = ChangeExecutor::default();
        let change = TopologyChange::new(ChangeId(7), ChangeOperation::RemoveEdge(EdgeId(42)), "bad");
        executor.apply(&chain(), change);
        let expected = EngineError::ChangeApplication {
            change: ChangeId(7),
            reason: EngineError::UnknownEdge(EdgeId(42)).to_string(),
        };
        assert_eq!(executor.history()[0].error, Some(expected.to_string()));
    }

    #[test]
    fn concurrent_reverts_roll_back_once() {
        let executor = ChangeExecutor::default();
        let graph = chain();
        let applied = executor.apply(
            &graph,
            TopologyChange::new(ChangeId(1), ChangeOperation::RemoveNode(NodeId(1)), "prune"),
        );
        let barrier = std::sync::Barrier::new(4);
        let results: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        executor.revert(&applied.graph, ChangeId(1)).is_ok()
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().expect("revert thread"))
                .collect()
        });
        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        let rollbacks = executor
            .history()
            .iter()
            .filter(|r| r.reverts == Some(ChangeId(1)) && r.status == ChangeStatus::Applied)
            .count();
        assert_eq!(rollbacks, 1);
    }

    #[test]
    fn irreversible_change_cannot_be_reverted() {
        let executor = ChangeExecutor::default();
        let graph = chain();
        let change = TopologyChange::new(
            ChangeId(3),
            ChangeOperation::ReweightEdge {
                edge: EdgeId(0),
                confidence: 0.2,
            },
            "weaken",
        )
        .irreversible();
        let outcome = executor.apply(&graph, change);
        assert!(outcome.success);
        assert_eq!(
            executor.revert(&outcome.graph, ChangeId(3)).map(|o| o.success),
            Err(EngineError::Irreversible(ChangeId(3)))
        );
        assert_eq!(
            executor.revert(&outcome.graph, ChangeId(99)).map(|o| o.success),
            Err(EngineError::UnknownChange(ChangeId(99)))
        );
    }
}
