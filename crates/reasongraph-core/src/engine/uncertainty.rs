//! Graph-wide uncertainty quantification.
//!
//! Per-node uncertainty is the width of the attached belief's 95% interval,
//! or `1 − mean(confidence)` for nodes that have no belief yet.

use crate::engine::graph::{GraphModel, NodeId};
use crate::engine::numeric::histogram_entropy_bits;
use crate::engine::propagation::UncertaintyPropagator;

/// Bins used for the uncertainty histogram.
pub const ENTROPY_BINS: usize = 10;

/// Fraction of nodes reported as most uncertain.
pub const MOST_UNCERTAIN_FRACTION: f64 = 0.2;

/// Uncertainty above which a well-connected node is a hotspot.
pub const HOTSPOT_THRESHOLD: f64 = 0.7;

/// Minimum distinct neighbors for a hotspot.
pub const HOTSPOT_MIN_NEIGHBORS: usize = 3;

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UncertaintyReport {
    /// Uncertainty per node, sorted by node id.
    pub per_node: Vec<(NodeId, f64)>,
    /// Shannon entropy (bits) of the uncertainty histogram.
    pub entropy: f64,
    pub mean_uncertainty: f64,
    /// ceil(20%) of nodes, most uncertain first (ties by id).
    pub most_uncertain: Vec<NodeId>,
    pub hotspots: Vec<NodeId>,
}

impl UncertaintyPropagator {
    /// Summarizes uncertainty across a graph. Deterministic for a given graph.
    pub fn quantify_uncertainty(&self, graph: &GraphModel) -> UncertaintyReport {
        if graph.is_empty() {
            return UncertaintyReport::default();
        }

        let mut per_node: Vec<(NodeId, f64)> = graph
            .nodes()
            .iter()
            .map(|node| {
                let u = match node.belief() {
                    Some(belief) => {
                        let (lo, hi) = belief.confidence_interval();
                        hi - lo
                    }
                    None => 1.0 - node.confidence.mean(),
                };
                (node.id, u.clamp(0.0, 1.0))
            })
            .collect();
        per_node.sort_by_key(|(id, _)| *id);

        let values: Vec<f64> = per_node.iter().map(|(_, u)| *u).collect();
        let entropy = histogram_entropy_bits(&values, ENTROPY_BINS);
        let mean_uncertainty = values.iter().sum::<f64>() / values.len() as f64;

        let mut ranked = per_node.clone();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let take = (per_node.len() as f64 * MOST_UNCERTAIN_FRACTION).ceil() as usize;
        let most_uncertain = ranked.iter().take(take).map(|(id, _)| *id).collect();

        let hotspots = per_node
            .iter()
            .filter(|(id, u)| *u > HOTSPOT_THRESHOLD && graph.degree(*id) >= HOTSPOT_MIN_NEIGHBORS)
            .map(|(id, _)| *id)
            .collect();

        UncertaintyReport {
            per_node,
            entropy,
            mean_uncertainty,
            most_uncertain,
            hotspots,
        }
    }
}
