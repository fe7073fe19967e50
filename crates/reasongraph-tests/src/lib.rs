//! Shared graph fixtures for the reasongraph test suites.

use reasongraph_core::{ConfidenceVector, EdgeType, GraphModel, NodeId, NodeType};

/// A–B–C chain of hypotheses at 0.5 joined by supportive 0.9 edges.
pub fn chain_abc() -> (GraphModel, [NodeId; 3]) {
    let mut g = GraphModel::new();
    let a = g.add_node(NodeType::Hypothesis, "A", ConfidenceVector::uniform(0.5)).expect("node");
    let b = g.add_node(NodeType::Hypothesis, "B", ConfidenceVector::uniform(0.5)).expect("node");
    let c = g.add_node(NodeType::Hypothesis, "C", ConfidenceVector::uniform(0.5)).expect("node");
    g.add_edge(a, b, EdgeType::Supportive, 0.9)
        .expect("chain edge a-b");
    g.add_edge(b, c, EdgeType::Supportive, 0.9)
        .expect("chain edge b-c");
    (g, [a, b, c])
}

/// Complete graph on `n` nodes with uniform edge confidence.
pub fn complete(n: u32, confidence: f64) -> GraphModel {
    let mut g = GraphModel::new();
    for i in 0..n {
        g.add_node(
            NodeType::Dimension,
            format!("k{}", i),
            ConfidenceVector::uniform(0.5),
        ).expect("node");
    }
    for a in 0..n {
        for b in a + 1..n {
            g.add_edge(NodeId(a), NodeId(b), EdgeType::Generic, confidence)
                .expect("complete edge");
        }
    }
    g
}

/// Ring of `n` nodes where every node also links to its second neighbor.
///
/// Produces local clustering with short paths, the usual small-world shape.
pub fn ring_lattice(n: u32) -> GraphModel {
    let mut g = GraphModel::new();
    for i in 0..n {
        let node_type = if i % 3 == 0 {
            NodeType::Hypothesis
        } else {
            NodeType::Evidence
        };
        g.add_node(node_type, format!("r{}", i), ConfidenceVector::uniform(0.6)).expect("node");
    }
    for i in 0..n {
        for step in [1, 2] {
            let j = (i + step) % n;
            g.add_edge(NodeId(i), NodeId(j), EdgeType::Correlative, 0.8)
                .expect("lattice edge");
        }
    }
    g
}

/// Hub-and-spoke graph: node 0 linked to `leaves` leaf nodes.
pub fn star(leaves: u32, hub_confidence: f64) -> GraphModel {
    let mut g = GraphModel::new();
    let hub = g.add_node(
        NodeType::Root,
        "hub",
        ConfidenceVector::uniform(hub_confidence),
    ).expect("node");
    for i in 0..leaves {
        let leaf = g.add_node(
            NodeType::Evidence,
            format!("leaf{}", i),
            ConfidenceVector::uniform(0.7),
        ).expect("node");
        g.add_edge(hub, leaf, EdgeType::Supportive, 0.5 + 0.05 * i as f64)
            .expect("star edge");
    }
    g
}
