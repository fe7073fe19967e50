//! # Evidence Updates and Belief Propagation
//!
//! [`UncertaintyPropagator::propagate`] runs in three stages over a private
//! copy of the input graph:
//!
//! 1. Every node gets a belief: an attached belief consistent with
//!    `confidence[0]` is reused, otherwise a prior is built from the node.
//! 2. Direct evidence is applied with the conjugate/linear update rules in
//!    [`crate::engine::belief`].
//! 3. Synchronous rounds send pseudo-evidence along every edge
//!    (`source -> target`). Pseudo-evidence is computed from the beliefs held
//!    at the start of the round, so edge order inside a round does not matter.
//!    Updates weaker than the convergence threshold are skipped; a round that
//!    applies nothing ends propagation.
//!
//! Every node then gets its final belief mean written to `confidence[0]` and
//! the belief attached under [`BELIEF_KEY`](crate::engine::graph::BELIEF_KEY),
//! whether or not it was updated.

use std::collections::BTreeMap;

use crate::engine::belief::{BayesianUpdate, BeliefModel, Likelihood, UpdateSource};
use crate::engine::errors::EngineError;
use crate::engine::graph::{EdgeType, GraphModel, NodeId};

/// Statistical power given to pseudo-evidence sent along an edge.
pub const PSEUDO_EVIDENCE_POWER: f64 = 1.0;

/// Tolerance under which an attached belief is considered in sync with `confidence[0]`.
const BELIEF_SYNC_TOLERANCE: f64 = 1e-9;

/// Configuration for evidence propagation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropagationConfig {
    /// Maximum synchronous propagation rounds.
    pub max_iterations: usize,
    /// Updates with a smaller strength are skipped.
    pub convergence_threshold: f64,
    /// Scales edge reliability in [0, 1].
    pub damping_factor: f64,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            convergence_threshold: 0.01,
            damping_factor: 0.5,
        }
    }
}

impl PropagationConfig {
    pub fn validate(self) -> Result<Self, EngineError> {
        if !self.convergence_threshold.is_finite() || self.convergence_threshold <= 0.0 {
            return Err(EngineError::Validation(
                "propagation: convergence_threshold must be finite and > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.damping_factor) {
            return Err(EngineError::Validation(
                "propagation: damping_factor must be in [0, 1]".into(),
            ));
        }
        Ok(self)
    }
}

/// Kind of source that produced a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SourceType {
    Experimental,
    Observational,
    Computational,
    Literature,
    Expert,
    #[default]
    Unspecified,
}

/// Observation about a single node submitted by a collaborator.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Evidence {
    pub node_id: NodeId,
    /// Observed support in `[0, 1]`
    pub value: f64,
    pub reliability: f64,
    pub source_type: SourceType,
    pub statistical_power: f64,
}

impl Evidence {
    /// Evidence with full statistical power.
    pub fn new(node_id: NodeId, value: f64, reliability: f64, source_type: SourceType) -> Self {
        Self {
            node_id,
            value,
            reliability,
            source_type,
            statistical_power: 1.0,
        }
    }

    pub fn with_power(mut self, statistical_power: f64) -> Self {
        self.statistical_power = statistical_power;
        self
    }

    fn likelihood(&self) -> Likelihood {
        Likelihood {
            value: self.value.clamp(0.0, 1.0),
            reliability: self.reliability.clamp(0.0, 1.0),
            statistical_power: self.statistical_power.clamp(0.0, 1.0),
        }
    }
}

/// Evidence that was not applied, with the reason.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RejectedEvidence {
    pub evidence: Evidence,
    pub reason: String,
}

/// Diagnostics for one propagation pass.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PropagationMetrics {
    /// Propagation rounds executed.
    pub iterations: usize,
    /// A round finished without applying any update.
    pub converged: bool,
    /// 1.0 when converged, 0.0 when no round ran, otherwise threshold / last
    /// round's max strength.
    pub convergence_score: f64,
    pub direct_updates: usize,
    pub propagated_updates: usize,
    /// Pseudo-evidence updates below the threshold.
    pub skipped_updates: usize,
    pub total_information_gain: f64,
    /// Largest candidate strength seen in the last round.
    pub final_max_strength: f64,
}

/// Output of [`UncertaintyPropagator::propagate`].
#[derive(Debug, Clone)]
pub struct PropagationReport {
    pub graph: GraphModel,
    pub updates: Vec<BayesianUpdate>,
    pub metrics: PropagationMetrics,
    pub rejected: Vec<RejectedEvidence>,
}

/// Returns the transformed pseudo-evidence value and reliability multiplier for an edge type.
pub fn edge_transform(edge_type: EdgeType, source_mean: f64) -> (f64, f64) {
    match edge_type {
        EdgeType::Supportive => (source_mean, 1.2),
        EdgeType::Contradictory => (1.0 - source_mean, 0.8),
        EdgeType::CausalDirect => (source_mean, 1.5),
        EdgeType::CausalConfounded => (source_mean, 0.6),
        EdgeType::TemporalPrecedence => (source_mean, 1.1),
        EdgeType::Correlative => (source_mean, 0.7),
        EdgeType::Generic => (source_mean, 1.0),
    }
}

/// Applies evidence and propagates belief through a graph.
#[derive(Debug, Clone, Default)]
pub struct UncertaintyPropagator {
    config: PropagationConfig,
}

impl UncertaintyPropagator {
    pub fn new(config: PropagationConfig) -> Result<Self, EngineError> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> &PropagationConfig {
        &self.config
    }

    /// Runs direct evidence updates followed by iterative propagation.
    ///
    /// Non-convergence is reported through `metrics.convergence_score`, not as an error.
    pub fn propagate(
        &self,
        graph: &GraphModel,
        evidence: &[Evidence],
    ) -> Result<PropagationReport, EngineError> {
        let mut beliefs = initial_beliefs(graph)?;
        let mut updates = Vec::new();
        let mut rejected = Vec::new();
        let mut metrics = PropagationMetrics::default();

        for ev in evidence {
            if let Some(reason) = rejection_reason(graph, ev) {
                #[cfg(feature = "tracing")]
                tracing::warn!("rejected evidence for {}: {}", ev.node_id, reason);
                rejected.push(RejectedEvidence {
                    evidence: ev.clone(),
                    reason,
                });
                continue;
            }
            let prior = beliefs
                .get(&ev.node_id)
                .ok_or(EngineError::UnknownNode(ev.node_id))?;
            let update = BayesianUpdate::compute(
                ev.node_id,
                UpdateSource::Evidence(ev.source_type),
                prior,
                ev.likelihood(),
            )?;
            beliefs.insert(ev.node_id, update.posterior.clone());
            metrics.direct_updates += 1;
            metrics.total_information_gain += update.information_gain;
            updates.push(update);
        }

        let mut edges: Vec<_> = graph.edges().iter().filter(|e| !e.is_self_loop()).collect();
        edges.sort_by_key(|e| e.id);

        for _ in 0..self.config.max_iterations {
            metrics.iterations += 1;
            let round_start = beliefs.clone();
            let mut applied = 0usize;
            let mut max_strength = 0.0f64;

            for edge in &edges {
                let (Some(source), Some(prior)) =
                    (round_start.get(&edge.source), beliefs.get(&edge.target))
                else {
                    continue;
                };
                let (value, multiplier) = edge_transform(edge.edge_type, source.mean());
                let likelihood = Likelihood {
                    value,
                    reliability: (edge.confidence * self.config.damping_factor * multiplier)
                        .clamp(0.0, 1.0),
                    statistical_power: PSEUDO_EVIDENCE_POWER,
                };
                let update = BayesianUpdate::compute(
                    edge.target,
                    UpdateSource::Propagated {
                        edge: edge.id,
                        from: edge.source,
                    },
                    prior,
                    likelihood,
                )?;
                max_strength = max_strength.max(update.update_strength);
                if update.update_strength < self.config.convergence_threshold {
                    metrics.skipped_updates += 1;
                    continue;
                }
                beliefs.insert(edge.target, update.posterior.clone());
                metrics.propagated_updates += 1;
                metrics.total_information_gain += update.information_gain;
                applied += 1;
                updates.push(update);
            }

            metrics.final_max_strength = max_strength;
            #[cfg(feature = "tracing")]
            tracing::debug!(
                "propagation round {}: applied={}, max_strength={:.6}",
                metrics.iterations,
                applied,
                max_strength
            );
            if applied == 0 {
                metrics.converged = true;
                break;
            }
        }

        metrics.convergence_score = if metrics.converged {
            1.0
        } else if metrics.final_max_strength > 0.0 {
            (self.config.convergence_threshold / metrics.final_max_strength).clamp(0.0, 1.0)
        } else {
            0.0
        };

        #[cfg(feature = "tracing")]
        tracing::info!(
            "propagation finished: iterations={}, converged={}, score={:.3}, updates={}",
            metrics.iterations,
            metrics.converged,
            metrics.convergence_score,
            updates.len()
        );

        let mut out = graph.clone();
        for (id, belief) in beliefs {
            out.attach_belief(id, belief)?;
        }

        Ok(PropagationReport {
            graph: out,
            updates,
            metrics,
            rejected,
        })
    }
}

fn initial_beliefs(graph: &GraphModel) -> Result<BTreeMap<NodeId, BeliefModel>, EngineError> {
    graph
        .nodes()
        .iter()
        .map(|node| {
            let belief = match node.belief() {
                Some(b) if (b.mean() - node.confidence.primary()).abs() < BELIEF_SYNC_TOLERANCE => {
                    b.clone()
                }
                _ => BeliefModel::prior_for(node)?,
            };
            Ok((node.id, belief))
        })
        .collect()
}

fn rejection_reason(graph: &GraphModel, ev: &Evidence) -> Option<String> {
    if !graph.contains_node(ev.node_id) {
        return Some(format!("unknown node {}", ev.node_id));
    }
    for (name, v) in [
        ("value", ev.value),
        ("reliability", ev.reliability),
        ("statistical_power", ev.statistical_power),
    ] {
        if !v.is_finite() {
            return Some(format!("non-finite {}: {}", name, v));
        }
    }
    None
}
