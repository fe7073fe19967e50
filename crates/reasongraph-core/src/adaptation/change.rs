//! Topology change records and their graph operations.
//!
//! Every [`ChangeOperation`] is applied through a [`StructuralPatch`], which
//! also serves as the general inverse form: applying a patch returns the patch
//! that undoes it against the post-change graph.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};

use crate::engine::errors::EngineError;
use crate::engine::graph::{
    Edge, EdgeId, GraphModel, HyperEdge, HyperEdgeId, MetaValue, Node, NodeId,
};
use crate::metrics::TopologyMetrics;

/// Identifier of a recorded topology change.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChangeId(pub u64);

impl fmt::Display for ChangeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "change-{}", self.0)
    }
}

/// Sequential change id source shared by the components of one session.
#[derive(Debug)]
pub struct ChangeIdGenerator {
    next: AtomicU64,
}

impl Default for ChangeIdGenerator {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl ChangeIdGenerator {
    pub fn next_id(&self) -> ChangeId {
        ChangeId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ChangeKind {
    NodeAddition,
    NodeRemoval,
    EdgeAddition,
    EdgeRemoval,
    EdgeReweight,
    Restructure,
}

/// Batched structural edit.
///
/// Steps run in a fixed order: edge removals, hyperedge removals, node
/// removals (cascading), node additions, edge additions, hyperedge
/// additions, then reweights.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StructuralPatch {
    pub remove_edges: Vec<EdgeId>,
    pub remove_hyperedges: Vec<HyperEdgeId>,
    pub remove_nodes: Vec<NodeId>,
    pub add_nodes: Vec<Node>,
    pub add_edges: Vec<Edge>,
    pub add_hyperedges: Vec<HyperEdge>,
    pub reweight_edges: Vec<(EdgeId, f64)>,
}

impl StructuralPatch {
    pub fn is_empty(&self) -> bool {
        self.remove_edges.is_empty()
            && self.remove_hyperedges.is_empty()
            && self.remove_nodes.is_empty()
            && self.add_nodes.is_empty()
            && self.add_edges.is_empty()
            && self.add_hyperedges.is_empty()
            && self.reweight_edges.is_empty()
    }

    /// Applies the patch and returns its inverse.
    ///
    /// The graph may be partially modified on error; callers apply patches to
    /// a working copy.
    pub fn apply(&self, graph: &mut GraphModel) -> Result<StructuralPatch, EngineError> {
        let mut inverse = StructuralPatch::default();

        for &id in &self.remove_edges {
            inverse.add_edges.push(graph.remove_edge(id)?);
        }
        for &id in &self.remove_hyperedges {
            inverse.add_hyperedges.push(graph.remove_hyperedge(id)?);
        }

        if !self.remove_nodes.is_empty() {
            let touched: Vec<HyperEdge> = graph
                .hyperedges()
                .iter()
                .filter(|h| h.members.iter().any(|m| self.remove_nodes.contains(m)))
                .cloned()
                .collect();
            for &id in &self.remove_nodes {
                let (node, edges) = graph.remove_node(id)?;
                inverse.add_nodes.push(node);
                inverse.add_edges.extend(edges);
            }
            for original in touched {
                if graph.hyperedges().iter().any(|h| h.id == original.id) {
                    inverse.remove_hyperedges.push(original.id);
                }
                inverse.add_hyperedges.push(original);
            }
        }

        for node in &self.add_nodes {
            graph.insert_node(node.clone())?;
            inverse.remove_nodes.push(node.id);
        }
        for edge in &self.add_edges {
            graph.insert_edge(edge.clone())?;
            inverse.remove_edges.push(edge.id);
        }
        for hyperedge in &self.add_hyperedges {
            graph.insert_hyperedge(hyperedge.clone())?;
            inverse.remove_hyperedges.push(hyperedge.id);
        }

        let added: Vec<EdgeId> = self.add_edges.iter().map(|e| e.id).collect();
        for &(id, confidence) in &self.reweight_edges {
            let previous = graph.set_edge_confidence(id, confidence)?;
            if !added.contains(&id) {
                inverse.reweight_edges.push((id, previous));
            }
        }

        Ok(inverse)
    }

    /// Nodes referenced by the patch: removed/added nodes and edge endpoints.
    pub fn touched_nodes(&self, graph: &GraphModel) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self.remove_nodes.clone();
        out.extend(self.add_nodes.iter().map(|n| n.id));
        for e in &self.add_edges {
            out.extend([e.source, e.target]);
        }
        for id in self.remove_edges.iter().chain(self.reweight_edges.iter().map(|(id, _)| id)) {
            if let Some(e) = graph.edge(*id) {
                out.extend([e.source, e.target]);
            }
        }
        for h in &self.add_hyperedges {
            out.extend(h.members.iter().copied());
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// A structural edit to a reasoning graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChangeOperation {
    AddNode(Node),
    RemoveNode(NodeId),
    AddEdge(Edge),
    RemoveEdge(EdgeId),
    ReweightEdge { edge: EdgeId, confidence: f64 },
    Restructure(StructuralPatch),
}

impl ChangeOperation {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeOperation::AddNode(_) => ChangeKind::NodeAddition,
            ChangeOperation::RemoveNode(_) => ChangeKind::NodeRemoval,
            ChangeOperation::AddEdge(_) => ChangeKind::EdgeAddition,
            ChangeOperation::RemoveEdge(_) => ChangeKind::EdgeRemoval,
            ChangeOperation::ReweightEdge { .. } => ChangeKind::EdgeReweight,
            ChangeOperation::Restructure(_) => ChangeKind::Restructure,
        }
    }

    pub fn to_patch(&self) -> StructuralPatch {
        let mut patch = StructuralPatch::default();
        match self {
            ChangeOperation::AddNode(node) => patch.add_nodes.push(node.clone()),
            ChangeOperation::RemoveNode(id) => patch.remove_nodes.push(*id),
            ChangeOperation::AddEdge(edge) => patch.add_edges.push(edge.clone()),
            ChangeOperation::RemoveEdge(id) => patch.remove_edges.push(*id),
            ChangeOperation::ReweightEdge { edge, confidence } => {
                patch.reweight_edges.push((*edge, *confidence))
            }
            ChangeOperation::Restructure(p) => return p.clone(),
        }
        patch
    }

    /// Collapses single-step patches back to the primitive operation.
    pub fn from_patch(patch: StructuralPatch) -> Self {
        let StructuralPatch {
            remove_edges,
            remove_hyperedges,
            remove_nodes,
            add_nodes,
            add_edges,
            add_hyperedges,
            reweight_edges,
        } = patch;
        let steps = remove_edges.len()
            + remove_hyperedges.len()
            + remove_nodes.len()
            + add_nodes.len()
            + add_edges.len()
            + add_hyperedges.len()
            + reweight_edges.len();
        if steps == 1 {
            if let Some(&id) = remove_edges.first() {
                return ChangeOperation::RemoveEdge(id);
            }
            if let Some(&id) = remove_nodes.first() {
                return ChangeOperation::RemoveNode(id);
            }
            if let Some(node) = add_nodes.first() {
                return ChangeOperation::AddNode(node.clone());
            }
            if let Some(edge) = add_edges.first() {
                return ChangeOperation::AddEdge(edge.clone());
            }
            if let Some(&(edge, confidence)) = reweight_edges.first() {
                return ChangeOperation::ReweightEdge { edge, confidence };
            }
        }
        ChangeOperation::Restructure(StructuralPatch {
            remove_edges,
            remove_hyperedges,
            remove_nodes,
            add_nodes,
            add_edges,
            add_hyperedges,
            reweight_edges,
        })
    }

    /// Applies the operation and returns the operation that undoes it.
    pub fn apply(&self, graph: &mut GraphModel) -> Result<ChangeOperation, EngineError> {
        let inverse = self.to_patch().apply(graph)?;
        Ok(ChangeOperation::from_patch(inverse))
    }
}

/// Estimated reach of a change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImpactEstimate {
    /// Fraction of nodes the change touches directly
    pub local: f64,
    /// Largest absolute metric change, clamped to 1
    pub global: f64,
    pub cascading: bool,
    /// False until the executor has measured the change
    pub assessed: bool,
}

/// A proposed or executed structural change.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyChange {
    pub id: ChangeId,
    pub kind: ChangeKind,
    pub operation: ChangeOperation,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    pub confidence: f64,
    pub metrics_before: Option<TopologyMetrics>,
    pub metrics_after: Option<TopologyMetrics>,
    pub impact: ImpactEstimate,
    pub reversible: bool,
    pub metadata: BTreeMap<String, MetaValue>,
}

impl TopologyChange {
    pub fn new(id: ChangeId, operation: ChangeOperation, reason: impl Into<String>) -> Self {
        Self {
            id,
            kind: operation.kind(),
            operation,
            timestamp: Utc::now(),
            reason: reason.into(),
            confidence: 0.5,
            metrics_before: None,
            metrics_after: None,
            impact: ImpactEstimate::default(),
            reversible: true,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = if confidence.is_finite() {
            confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn irreversible(mut self) -> Self {
        self.reversible = false;
        self
    }
}
