//! # Reasoning Graph Model
//!
//! This module implements the shared in-memory graph that every analytics pass
//! reads and every structural change produces.
//!
//! ## Key Components
//!
//! - **ConfidenceVector**: Multi-dimensional belief in `[0, 1]` (empirical support,
//!   theoretical basis, methodological rigor, consensus alignment)
//!
//! - **Node / Edge / HyperEdge**: Typed graph elements with closed tag sets
//!
//! - **GraphModel**: Value-semantics snapshot with O(1) id lookups. Cloning a
//!   `GraphModel` is the snapshot operation; engine passes never keep references
//!   to a caller's graph.
//!
//! - **GraphBuilder**: Fluent construction of the next graph version
//!
//! ## Integrity
//!
//! Confidence values are clamped into `[0, 1]` on construction and on every write.
//! Non-finite values are rejected. An edge can only be inserted when both of its
//! endpoints exist, and removing a node removes every edge touching it, so a
//! `GraphModel` built through this API never holds a dangling reference.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::engine::belief::BeliefModel;
use crate::engine::errors::EngineError;

/// Number of confidence dimensions tracked per node.
pub const CONFIDENCE_DIMENSIONS: usize = 4;

/// Metadata key holding the statistical power of an evidence node.
pub const STATISTICAL_POWER_KEY: &str = "statistical_power";

/// Metadata key under which propagation attaches a node's belief.
pub const BELIEF_KEY: &str = "belief";

/// A unique identifier for a node in the reasoning graph.
///
/// NodeId implements Ord/PartialOrd for stable, deterministic iteration.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub u32);

/// A unique identifier for an edge in the reasoning graph.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeId(pub u32);

/// A unique identifier for a hyperedge.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HyperEdgeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// Structural role of a node in a reasoning graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodeType {
    Root,
    Dimension,
    Hypothesis,
    Evidence,
    Bridge,
    Gap,
    Synthesis,
    Reflection,
    Temporal,
    Causal,
    Cluster,
}

impl NodeType {
    /// Every node type, in declaration order.
    pub const ALL: [NodeType; 11] = [
        NodeType::Root,
        NodeType::Dimension,
        NodeType::Hypothesis,
        NodeType::Evidence,
        NodeType::Bridge,
        NodeType::Gap,
        NodeType::Synthesis,
        NodeType::Reflection,
        NodeType::Temporal,
        NodeType::Causal,
        NodeType::Cluster,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Root => "root",
            NodeType::Dimension => "dimension",
            NodeType::Hypothesis => "hypothesis",
            NodeType::Evidence => "evidence",
            NodeType::Bridge => "bridge",
            NodeType::Gap => "gap",
            NodeType::Synthesis => "synthesis",
            NodeType::Reflection => "reflection",
            NodeType::Temporal => "temporal",
            NodeType::Causal => "causal",
            NodeType::Cluster => "cluster",
        }
    }
}

impl FromStr for NodeType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("unknown node type '{}'", s)))
    }
}

/// Typed relation carried by an edge.
///
/// The relation decides how belief flows along the edge during propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EdgeType {
    Supportive,
    Contradictory,
    CausalDirect,
    CausalConfounded,
    TemporalPrecedence,
    Correlative,
    #[default]
    Generic,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Supportive => "supportive",
            EdgeType::Contradictory => "contradictory",
            EdgeType::CausalDirect => "causal_direct",
            EdgeType::CausalConfounded => "causal_confounded",
            EdgeType::TemporalPrecedence => "temporal_precedence",
            EdgeType::Correlative => "correlative",
            EdgeType::Generic => "generic",
        }
    }

    /// Parses a relation tag, mapping unrecognized tags to [`EdgeType::Generic`].
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "supportive" => EdgeType::Supportive,
            "contradictory" => EdgeType::Contradictory,
            "causal_direct" => EdgeType::CausalDirect,
            "causal_confounded" => EdgeType::CausalConfounded,
            "temporal_precedence" => EdgeType::TemporalPrecedence,
            "correlative" => EdgeType::Correlative,
            _ => EdgeType::Generic,
        }
    }
}

/// Clamps a finite value into `[0, 1]`, rejecting NaN and infinities.
pub fn checked_unit(value: f64, context: &str) -> Result<f64, EngineError> {
    if !value.is_finite() {
        return Err(EngineError::InvalidConfidence {
            context: context.to_string(),
            value,
        });
    }
    Ok(value.clamp(0.0, 1.0))
}

/// Multi-dimensional node confidence with every component in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConfidenceVector(SmallVec<[f64; CONFIDENCE_DIMENSIONS]>);

impl ConfidenceVector {
    /// Builds a confidence vector from 1..=`CONFIDENCE_DIMENSIONS` values.
    ///
    /// Out-of-range values are clamped; NaN/Inf values are rejected.
    pub fn new(values: impl IntoIterator<Item = f64>) -> Result<Self, EngineError> {
        let mut out: SmallVec<[f64; CONFIDENCE_DIMENSIONS]> = SmallVec::new();
        for value in values {
            if out.len() == CONFIDENCE_DIMENSIONS {
                return Err(EngineError::Validation(format!(
                    "confidence vector exceeds {} dimensions",
                    CONFIDENCE_DIMENSIONS
                )));
            }
            out.push(checked_unit(value, "confidence vector")?);
        }
        if out.is_empty() {
            return Err(EngineError::Validation(
                "confidence vector requires at least one dimension".into(),
            ));
        }
        Ok(Self(out))
    }

    /// A full-width vector with every dimension set to `value`.
    ///
    /// Non-finite input collapses to 0.0 so the vector always satisfies the
    /// `[0, 1]` invariant.
    pub fn uniform(value: f64) -> Self {
        let v = if value.is_finite() {
            value.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self(SmallVec::from_elem(v, CONFIDENCE_DIMENSIONS))
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The primary dimension (`confidence[0]`), where propagated beliefs land.
    pub fn primary(&self) -> f64 {
        self.0.first().copied().unwrap_or(0.0)
    }

    /// Overwrites the primary dimension, clamping into `[0, 1]`.
    pub fn set_primary(&mut self, value: f64) -> Result<(), EngineError> {
        let v = checked_unit(value, "confidence[0]")?;
        match self.0.first_mut() {
            Some(slot) => *slot = v,
            None => self.0.push(v),
        }
        Ok(())
    }

    pub fn mean(&self) -> f64 {
        if self.0.is_empty() {
            return 0.0;
        }
        self.0.iter().sum::<f64>() / self.0.len() as f64
    }

    /// Population variance of the components.
    pub fn variance(&self) -> f64 {
        if self.0.len() < 2 {
            return 0.0;
        }
        let mean = self.mean();
        self.0.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / self.0.len() as f64
    }
}

impl Default for ConfidenceVector {
    fn default() -> Self {
        Self::uniform(0.5)
    }
}

/// Free-form metadata value attached to nodes and changes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MetaValue {
    Number(f64),
    Text(String),
    Flag(bool),
    Belief(Box<BeliefModel>),
}

impl MetaValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetaValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetaValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_belief(&self) -> Option<&BeliefModel> {
        match self {
            MetaValue::Belief(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        MetaValue::Number(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Text(v)
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        MetaValue::Flag(v)
    }
}

/// Layout position used by virtualization front-ends. Ignored by analytics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// Layout size used by virtualization front-ends. Ignored by analytics.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

/// A node in the reasoning graph.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Node {
    /// The unique node identifier
    pub id: NodeId,
    /// Structural role
    pub node_type: NodeType,
    /// Human-readable label.
    /// Using Arc<str> for cheap cloning when snapshots are taken.
    #[cfg_attr(feature = "serde", serde(with = "serde_helpers::serde_arc_str"))]
    pub label: Arc<str>,
    /// Multi-dimensional confidence
    pub confidence: ConfidenceVector,
    /// Free-form metadata (propagation attaches the node belief under [`BELIEF_KEY`])
    pub metadata: BTreeMap<String, MetaValue>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

impl Node {
    pub fn new(
        id: NodeId,
        node_type: NodeType,
        label: impl Into<Arc<str>>,
        confidence: ConfidenceVector,
    ) -> Self {
        Self {
            id,
            node_type,
            label: label.into(),
            confidence,
            metadata: BTreeMap::new(),
            position: None,
            size: None,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<MetaValue>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_layout(mut self, position: Position, size: Size) -> Self {
        self.position = Some(position);
        self.size = Some(size);
        self
    }

    /// Statistical power recorded on the node, if any.
    pub fn statistical_power(&self) -> Option<f64> {
        self.metadata
            .get(STATISTICAL_POWER_KEY)
            .and_then(MetaValue::as_number)
    }

    /// Belief attached by a previous propagation pass, if any.
    pub fn belief(&self) -> Option<&BeliefModel> {
        self.metadata.get(BELIEF_KEY).and_then(MetaValue::as_belief)
    }
}

/// A typed, confidence-weighted relation between two nodes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    /// Scalar confidence in `[0, 1]`
    pub confidence: f64,
    /// When false, metrics treat the edge as `source -> target` only
    pub bidirectional: bool,
}

impl Edge {
    /// Creates a bidirectional edge.
    pub fn new(
        id: EdgeId,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
        confidence: f64,
    ) -> Self {
        Self {
            id,
            source,
            target,
            edge_type,
            confidence,
            bidirectional: true,
        }
    }

    /// Marks the edge as one-directional.
    pub fn directed(mut self) -> Self {
        self.bidirectional = false;
        self
    }

    pub fn touches(&self, node: NodeId) -> bool {
        self.source == node || self.target == node
    }

    pub fn is_self_loop(&self) -> bool {
        self.source == self.target
    }
}

/// A relation over two or more nodes.
///
/// Metrics consume hyperedges as cliques over their members.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HyperEdge {
    pub id: HyperEdgeId,
    pub members: Vec<NodeId>,
    pub confidence: f64,
}

/// A confidence-weighted reasoning graph snapshot.
///
/// Cloning produces an independent deep copy; the engine's passes each take
/// `&GraphModel` and hand back a new `GraphModel`.
///
/// With the `serde` feature the graph travels as a [`GraphSnapshot`]; lookup
/// indexes are rebuilt and the graph validated on the way in.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "GraphSnapshot", into = "GraphSnapshot")
)]
pub struct GraphModel {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    hyperedges: Vec<HyperEdge>,
    /// Index mapping NodeId to position in nodes vector
    node_index: FxHashMap<NodeId, usize>,
    /// Index mapping EdgeId to position in edges vector
    edge_index: FxHashMap<EdgeId, usize>,
    /// Incremented on every structural or confidence mutation
    version: u64,
}

impl PartialEq for GraphModel {
    fn eq(&self, other: &Self) -> bool {
        self.nodes == other.nodes && self.edges == other.edges && self.hyperedges == other.hyperedges
    }
}

impl GraphModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a builder seeded with this graph, for constructing the next version.
    pub fn to_builder(&self) -> GraphBuilder {
        GraphBuilder::from_graph(self.clone())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn hyperedges(&self) -> &[HyperEdge] {
        &self.hyperedges
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.node_index.contains_key(&id)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.node_index.get(&id).and_then(|&i| self.nodes.get(i))
    }

    fn node_slot(&mut self, id: NodeId) -> Result<&mut Node, EngineError> {
        let idx = *self.node_index.get(&id).ok_or(EngineError::UnknownNode(id))?;
        self.version += 1;
        self.nodes.get_mut(idx).ok_or(EngineError::UnknownNode(id))
    }

    /// Replaces a node's confidence vector and returns the previous one.
    pub fn set_node_confidence(
        &mut self,
        id: NodeId,
        confidence: ConfidenceVector,
    ) -> Result<ConfidenceVector, EngineError> {
        let node = self.node_slot(id)?;
        Ok(std::mem::replace(&mut node.confidence, confidence))
    }

    /// Sets one metadata entry and returns the previous value.
    pub fn set_node_metadata(
        &mut self,
        id: NodeId,
        key: impl Into<String>,
        value: impl Into<MetaValue>,
    ) -> Result<Option<MetaValue>, EngineError> {
        let node = self.node_slot(id)?;
        Ok(node.metadata.insert(key.into(), value.into()))
    }

    /// Writes the belief mean into `confidence[0]` and attaches the belief under [`BELIEF_KEY`].
    pub fn attach_belief(&mut self, id: NodeId, belief: BeliefModel) -> Result<(), EngineError> {
        let node = self.node_slot(id)?;
        node.confidence.set_primary(belief.mean())?;
        node.metadata
            .insert(BELIEF_KEY.to_string(), MetaValue::Belief(Box::new(belief)));
        Ok(())
    }

    pub fn edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edge_index.get(&id).and_then(|&i| self.edges.get(i))
    }

    /// Smallest id strictly greater than every node id in the graph.
    ///
    /// `None` once `NodeId(u32::MAX)` is taken.
    pub fn next_node_id(&self) -> Option<NodeId> {
        next_after(self.nodes.iter().map(|n| n.id.0)).map(NodeId)
    }

    /// Smallest id strictly greater than every edge id in the graph.
    pub fn next_edge_id(&self) -> Option<EdgeId> {
        next_after(self.edges.iter().map(|e| e.id.0)).map(EdgeId)
    }

    pub fn next_hyperedge_id(&self) -> Option<HyperEdgeId> {
        next_after(self.hyperedges.iter().map(|h| h.id.0)).map(HyperEdgeId)
    }

    /// Inserts a node. Fails if the id is already taken.
    pub fn insert_node(&mut self, node: Node) -> Result<(), EngineError> {
        if self.node_index.contains_key(&node.id) {
            return Err(EngineError::DuplicateNode(node.id));
        }
        self.node_index.insert(node.id, self.nodes.len());
        self.nodes.push(node);
        self.version += 1;
        Ok(())
    }

    /// Creates a node with the next free id and returns that id.
    pub fn add_node(
        &mut self,
        node_type: NodeType,
        label: impl Into<Arc<str>>,
        confidence: ConfidenceVector,
    ) -> Result<NodeId, EngineError> {
        let id = self
            .next_node_id()
            .ok_or_else(|| EngineError::Validation("node id space exhausted".into()))?;
        self.node_index.insert(id, self.nodes.len());
        self.nodes.push(Node::new(id, node_type, label, confidence));
        self.version += 1;
        Ok(id)
    }

    /// Inserts an edge after checking both endpoints exist.
    ///
    /// The edge confidence is clamped into `[0, 1]`; NaN/Inf is rejected.
    pub fn insert_edge(&mut self, mut edge: Edge) -> Result<(), EngineError> {
        if self.edge_index.contains_key(&edge.id) {
            return Err(EngineError::DuplicateEdge(edge.id));
        }
        for endpoint in [edge.source, edge.target] {
            if !self.node_index.contains_key(&endpoint) {
                return Err(EngineError::DanglingEdge {
                    edge: edge.id,
                    endpoint,
                });
            }
        }
        edge.confidence = checked_unit(edge.confidence, &format!("edge {}", edge.id))?;
        self.edge_index.insert(edge.id, self.edges.len());
        self.edges.push(edge);
        self.version += 1;
        Ok(())
    }

    /// Creates a bidirectional edge with the next free id.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
        confidence: f64,
    ) -> Result<EdgeId, EngineError> {
        let id = self
            .next_edge_id()
            .ok_or_else(|| EngineError::Validation("edge id space exhausted".into()))?;
        self.insert_edge(Edge::new(id, source, target, edge_type, confidence))?;
        Ok(id)
    }

    /// Inserts a hyperedge over at least two existing nodes.
    pub fn insert_hyperedge(&mut self, mut hyperedge: HyperEdge) -> Result<(), EngineError> {
        hyperedge.members.sort_unstable();
        hyperedge.members.dedup();
        if hyperedge.members.len() < 2 {
            return Err(EngineError::Validation(format!(
                "hyperedge {:?} needs at least two distinct members",
                hyperedge.id
            )));
        }
        if self.hyperedges.iter().any(|h| h.id == hyperedge.id) {
            return Err(EngineError::Validation(format!(
                "duplicate hyperedge {:?}",
                hyperedge.id
            )));
        }
        if let Some(missing) = hyperedge
            .members
            .iter()
            .find(|m| !self.node_index.contains_key(m))
        {
            return Err(EngineError::UnknownNode(*missing));
        }
        hyperedge.confidence = checked_unit(hyperedge.confidence, "hyperedge confidence")?;
        self.hyperedges.push(hyperedge);
        self.version += 1;
        Ok(())
    }

    /// Removes a node together with every edge touching it.
    ///
    /// Hyperedges lose the member; those left with fewer than two members are
    /// dropped. Returns the removed node and edges so callers can restore them.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(Node, Vec<Edge>), EngineError> {
        let idx = *self
            .node_index
            .get(&id)
            .ok_or(EngineError::UnknownNode(id))?;
        let node = self.nodes.remove(idx);

        let (removed, kept): (Vec<Edge>, Vec<Edge>) =
            std::mem::take(&mut self.edges).into_iter().partition(|e| e.touches(id));
        self.edges = kept;

        for hyperedge in &mut self.hyperedges {
            hyperedge.members.retain(|m| *m != id);
        }
        self.hyperedges.retain(|h| h.members.len() >= 2);

        self.rebuild_indexes();
        self.version += 1;
        Ok((node, removed))
    }

    pub fn remove_edge(&mut self, id: EdgeId) -> Result<Edge, EngineError> {
        let idx = *self
            .edge_index
            .get(&id)
            .ok_or(EngineError::UnknownEdge(id))?;
        let edge = self.edges.remove(idx);
        self.rebuild_edge_index();
        self.version += 1;
        Ok(edge)
    }

    pub fn remove_hyperedge(&mut self, id: HyperEdgeId) -> Result<HyperEdge, EngineError> {
        let idx = self
            .hyperedges
            .iter()
            .position(|h| h.id == id)
            .ok_or_else(|| EngineError::Validation(format!("unknown hyperedge {:?}", id)))?;
        self.version += 1;
        Ok(self.hyperedges.remove(idx))
    }

    /// Sets an edge confidence and returns the previous value.
    pub fn set_edge_confidence(&mut self, id: EdgeId, confidence: f64) -> Result<f64, EngineError> {
        let value = checked_unit(confidence, &format!("edge {}", id))?;
        let idx = *self
            .edge_index
            .get(&id)
            .ok_or(EngineError::UnknownEdge(id))?;
        let edge = self.edges.get_mut(idx).ok_or(EngineError::UnknownEdge(id))?;
        let previous = std::mem::replace(&mut edge.confidence, value);
        self.version += 1;
        Ok(previous)
    }

    /// Distinct neighbors in either direction, excluding the node itself, sorted.
    pub fn neighbors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out: Vec<NodeId> = self
            .edges
            .iter()
            .filter(|e| e.touches(id) && !e.is_self_loop())
            .map(|e| if e.source == id { e.target } else { e.source })
            .collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn degree(&self, id: NodeId) -> usize {
        self.neighbors(id).len()
    }

    /// Edges whose source is `id`, in insertion order.
    pub fn outgoing(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.source == id)
    }

    pub fn edges_touching(&self, id: NodeId) -> impl Iterator<Item = &Edge> + '_ {
        self.edges.iter().filter(move |e| e.touches(id))
    }

    /// First edge linking `a` and `b` in either direction.
    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|e| (e.source == a && e.target == b) || (e.source == b && e.target == a))
    }

    /// Checks referential integrity and confidence ranges.
    ///
    /// Graphs built through this API always pass; the check exists for graphs
    /// that arrive deserialized from a collaborator.
    pub fn validate(&self) -> Result<(), EngineError> {
        for node in &self.nodes {
            if !(1..=CONFIDENCE_DIMENSIONS).contains(&node.confidence.len()) {
                return Err(EngineError::Validation(format!(
                    "node {} has {} confidence dimensions",
                    node.id,
                    node.confidence.len()
                )));
            }
            for &v in node.confidence.values() {
                if !(0.0..=1.0).contains(&v) {
                    return Err(EngineError::InvalidConfidence {
                        context: format!("node {}", node.id),
                        value: v,
                    });
                }
            }
        }
        for edge in &self.edges {
            for endpoint in [edge.source, edge.target] {
                if !self.node_index.contains_key(&endpoint) {
                    return Err(EngineError::DanglingEdge {
                        edge: edge.id,
                        endpoint,
                    });
                }
            }
            if !(0.0..=1.0).contains(&edge.confidence) {
                return Err(EngineError::InvalidConfidence {
                    context: format!("edge {}", edge.id),
                    value: edge.confidence,
                });
            }
        }
        for hyperedge in &self.hyperedges {
            if let Some(missing) = hyperedge
                .members
                .iter()
                .find(|m| !self.node_index.contains_key(m))
            {
                return Err(EngineError::UnknownNode(*missing));
            }
        }
        Ok(())
    }

    /// Drops edges whose endpoints are missing and returns their ids.
    pub fn prune_dangling_edges(&mut self) -> Vec<EdgeId> {
        let mut pruned = Vec::new();
        let node_index = &self.node_index;
        self.edges.retain(|e| {
            let ok = node_index.contains_key(&e.source) && node_index.contains_key(&e.target);
            if !ok {
                pruned.push(e.id);
            }
            ok
        });
        if !pruned.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::warn!("pruned {} dangling edges: {:?}", pruned.len(), pruned);
            self.rebuild_edge_index();
            self.version += 1;
        }
        pruned
    }

    fn rebuild_indexes(&mut self) {
        self.node_index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        self.rebuild_edge_index();
    }

    fn rebuild_edge_index(&mut self) {
        self.edge_index = self
            .edges
            .iter()
            .enumerate()
            .map(|(i, e)| (e.id, i))
            .collect();
    }
}

fn next_after(ids: impl Iterator<Item = u32>) -> Option<u32> {
    match ids.max() {
        Some(max) => max.checked_add(1),
        None => Some(0),
    }
}

/// Serialized form of a [`GraphModel`]: the element lists without lookup indexes.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub hyperedges: Vec<HyperEdge>,
    #[serde(default)]
    pub version: u64,
}

#[cfg(feature = "serde")]
impl From<GraphModel> for GraphSnapshot {
    fn from(graph: GraphModel) -> Self {
        Self {
            nodes: graph.nodes,
            edges: graph.edges,
            hyperedges: graph.hyperedges,
            version: graph.version,
        }
    }
}

/// Rebuilds the indexes, drops dangling edges and validates the result.
#[cfg(feature = "serde")]
impl TryFrom<GraphSnapshot> for GraphModel {
    type Error = EngineError;

    fn try_from(snapshot: GraphSnapshot) -> Result<Self, Self::Error> {
        let mut graph = GraphModel {
            version: snapshot.version,
            ..GraphModel::default()
        };
        for node in snapshot.nodes {
            graph.insert_node(node)?;
        }
        graph.edges = snapshot.edges;
        graph.prune_dangling_edges();
        graph.rebuild_edge_index();
        if graph.edge_index.len() != graph.edges.len() {
            let mut seen = rustc_hash::FxHashSet::default();
            if let Some(dup) = graph.edges.iter().find(|e| !seen.insert(e.id)) {
                return Err(EngineError::DuplicateEdge(dup.id));
            }
        }
        graph.hyperedges = snapshot.hyperedges;
        graph.validate()?;
        graph.version = snapshot.version;
        Ok(graph)
    }
}

/// Fluent builder for graph snapshots.
///
/// Errors are deferred: the first failing step is reported by [`GraphBuilder::build`].
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: GraphModel,
    error: Option<EngineError>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_graph(graph: GraphModel) -> Self {
        Self { graph, error: None }
    }

    fn step(mut self, f: impl FnOnce(&mut GraphModel) -> Result<(), EngineError>) -> Self {
        if self.error.is_none() {
            if let Err(e) = f(&mut self.graph) {
                self.error = Some(e);
            }
        }
        self
    }

    pub fn node(self, node: Node) -> Self {
        self.step(|g| g.insert_node(node))
    }

    pub fn edge(self, edge: Edge) -> Self {
        self.step(|g| g.insert_edge(edge))
    }

    pub fn hyperedge(self, hyperedge: HyperEdge) -> Self {
        self.step(|g| g.insert_hyperedge(hyperedge))
    }

    pub fn without_node(self, id: NodeId) -> Self {
        self.step(|g| g.remove_node(id).map(|_| ()))
    }

    pub fn without_edge(self, id: EdgeId) -> Self {
        self.step(|g| g.remove_edge(id).map(|_| ()))
    }

    pub fn build(self) -> Result<GraphModel, EngineError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.graph),
        }
    }
}

#[cfg(feature = "serde")]
mod serde_helpers {
    pub mod serde_arc_str {
        use serde::{Deserialize, Deserializer, Serialize, Serializer};
        use std::sync::Arc;

        pub fn serialize<S>(arc: &Arc<str>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            arc.as_ref().serialize(serializer)
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Arc<str>, D::Error>
        where
            D: Deserializer<'de>,
        {
            let s = String::deserialize(deserializer)?;
            Ok(Arc::from(s))
        }
    }
}
