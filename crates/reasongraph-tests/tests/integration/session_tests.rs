//! End-to-end passes through a reasoning session.

use reasongraph_core::adaptation::{AdaptationPhase, ChangeKind, OptimizationGoal, Urgency};
use reasongraph_core::{
    ConfidenceVector, EdgeType, EngineConfig, EngineError, Evidence, GraphModel, MetricKind, Node,
    NodeId, NodeType, ReasoningSession, SourceType,
};
use reasongraph_tests::{chain_abc, complete, star};

#[test]
fn test_evidence_pass_proposes_triangle_closure() {
    let session = ReasoningSession::new(EngineConfig::default()).expect("default config");
    let (g, [a, b, c]) = chain_abc();
    let outcome = session
        .ingest_evidence(&g, &[Evidence::new(a, 0.9, 0.8, SourceType::Experimental)])
        .expect("ingest");

    assert!(outcome.updates.len() >= 2);
    assert!(outcome.graph.node(b).expect("b").confidence.primary() > 0.5);
    assert_eq!(outcome.urgency, Urgency::Low);
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.uncertainty.per_node.len(), 3);

    assert_eq!(outcome.proposals.len(), 1);
    let proposal = outcome.proposals[0].clone();
    assert_eq!(proposal.kind, ChangeKind::EdgeAddition);
    assert_eq!(session.adaptation().phase(), AdaptationPhase::ChangeProposed);

    let applied = session
        .apply_change(&outcome.graph, proposal)
        .expect("phase settles");
    assert!(applied.success);
    assert!(applied.graph.edge_between(a, c).is_some());
    assert_eq!(session.adaptation().phase(), AdaptationPhase::Monitoring);

    let reverted = session
        .revert_change(&applied.graph, applied.change.id)
        .expect("reversible");
    assert!(reverted.graph.edge_between(a, c).is_none());
    assert_eq!(session.history().len(), 2);
}

#[test]
fn test_critical_instability_triggers_auto_apply() {
    let mut config = EngineConfig::default();
    config.adaptation.auto_apply = true;
    let session = ReasoningSession::new(config).expect("valid config");

    // Saturated but weak: stability = 0.4 × C × E = 0.4 × 1 × 0.1
    let g = complete(4, 0.1);
    let outcome = session.ingest_evidence(&g, &[]).expect("ingest");
    assert!(outcome.state.stability < 0.2);
    assert_eq!(outcome.urgency, Urgency::Critical);
    assert_eq!(outcome.applied.len(), 1);
    assert!(outcome.applied[0].success);
    assert_eq!(outcome.graph.edge_count(), 5);
    assert_eq!(session.adaptation().phase(), AdaptationPhase::Monitoring);
}

#[test]
fn test_low_urgency_is_not_auto_applied() {
    let mut config = EngineConfig::default();
    config.adaptation.auto_apply = true;
    let session = ReasoningSession::new(config).expect("valid config");
    let (g, _) = chain_abc();
    let outcome = session.ingest_evidence(&g, &[]).expect("ingest");
    assert!(!outcome.proposals.is_empty());
    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.graph.edge_count(), 2);
}

#[test]
fn test_analyze_and_optimize() {
    let session = ReasoningSession::new(EngineConfig::default()).expect("default config");
    let g = star(6, 0.5);
    let state = session.analyze(&g);
    assert_eq!(state.metrics.node_count, 7);

    let proposals = session.optimize(
        &g,
        &[OptimizationGoal {
            metric: MetricKind::Centralization,
            target: 0.1,
            tolerance: 0.05,
        }],
    );
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].kind, ChangeKind::Restructure);

    let report = session.quantify_uncertainty(&g);
    assert_eq!(report.per_node.len(), 7);
}

#[test]
fn test_rejected_evidence_is_reported() {
    let session = ReasoningSession::new(EngineConfig::default()).expect("default config");
    let (g, _) = chain_abc();
    let outcome = session
        .ingest_evidence(
            &g,
            &[Evidence::new(reasongraph_core::NodeId(40), 0.5, 0.5, SourceType::Expert)],
        )
        .expect("unknown targets are not fatal");
    assert_eq!(outcome.rejected.len(), 1);
    assert_eq!(outcome.propagation.direct_updates, 0);
}

#[test]
fn test_hub_at_top_of_id_range() {
    let session = ReasoningSession::new(EngineConfig::default()).expect("default config");
    let hub = NodeId(u32::MAX);
    let mut g = GraphModel::new();
    g.insert_node(Node::new(hub, NodeType::Root, "hub", ConfidenceVector::uniform(0.6)))
        .expect("hub");
    for i in 0..5 {
        let leaf = Node::new(NodeId(i), NodeType::Evidence, format!("leaf{}", i), ConfidenceVector::uniform(0.7));
        g.insert_node(leaf).expect("leaf");
        g.add_edge(hub, NodeId(i), EdgeType::Supportive, 0.8).expect("spoke");
    }

    let outcome = session
        .ingest_evidence(&g, &[Evidence::new(hub, 0.9, 0.8, SourceType::Expert)])
        .expect("ingest");
    assert!(!outcome.proposals.is_empty());
    assert!(outcome
        .proposals
        .iter()
        .all(|p| p.operation.to_patch().add_nodes.is_empty()));

    let mut current = outcome.graph;
    for proposal in outcome.proposals {
        let applied = session.apply_change(&current, proposal).expect("apply");
        assert!(applied.success);
        current = applied.graph;
    }
    assert!(current.validate().is_ok());
}

#[test]
fn test_invalid_config_is_refused() {
    let mut config = EngineConfig::default();
    config.metrics.community_rounds = 0;
    assert!(matches!(
        ReasoningSession::new(config),
        Err(EngineError::Validation(_))
    ));
}
