//! Rule evaluation and proposal generation against computed topology state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use reasongraph_core::adaptation::{
    ActionKind, AdaptationConfig, AdaptationPhase, AdaptationRule, ChangeIdGenerator, ChangeKind,
    ChangeOperation, Comparison, OptimizationGoal, RuleAction, RuleTrigger, Urgency,
    RULE_ID_KEY,
};
use reasongraph_core::{
    AdaptationEngine, ChangeExecutor, EdgeId, MetricKind, MetricsCalculator, NodeId,
};
use reasongraph_tests::{complete, star};

fn engine_with(rules: Vec<AdaptationRule>) -> AdaptationEngine {
    AdaptationEngine::new(AdaptationConfig::default(), rules, Arc::default()).expect("valid config")
}

#[test]
fn test_dense_graph_fires_prune_rule_only() {
    let g = complete(4, 0.6);
    let engine = AdaptationEngine::with_default_rules();
    let state = MetricsCalculator::default().derive_state(&g);
    let fired = engine.evaluate(&state);
    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].rule.id.0, "prune_when_dense");
    assert_eq!(fired[0].observed, 1.0);

    let proposals = engine.propose(&g, &state, &fired);
    assert_eq!(proposals.len(), 1);
    // Equal confidences: lowest id is the weakest.
    assert_eq!(proposals[0].operation, ChangeOperation::RemoveEdge(EdgeId(0)));
    assert!(proposals[0].metadata.contains_key(RULE_ID_KEY));
    assert!(proposals[0].reason.contains("prune_when_dense"));
    assert_eq!(engine.urgency(&state, &proposals), Urgency::Low);
}

#[test]
fn test_prune_count_parameter_builds_restructure() {
    let g = complete(4, 0.6);
    let rule = AdaptationRule::new(
        "prune_three",
        RuleTrigger::new(MetricKind::Density, Comparison::Above, 0.8),
        RuleAction::new(ActionKind::PruneWeakEdges).with_parameter("count", 3.0),
        1,
    );
    let engine = engine_with(vec![rule]);
    let state = MetricsCalculator::default().derive_state(&g);
    let proposals = engine.propose(&g, &state, &engine.evaluate(&state));
    assert_eq!(proposals.len(), 1);
    assert_eq!(proposals[0].kind, ChangeKind::Restructure);
    match &proposals[0].operation {
        ChangeOperation::Restructure(patch) => {
            assert_eq!(patch.remove_edges, vec![EdgeId(0), EdgeId(1), EdgeId(2)]);
        }
        other => panic!("expected restructure, got {:?}", other),
    }
}

#[test]
fn test_hub_graph_proposals_apply_in_sequence() {
    let g = star(8, 0.5);
    let engine = AdaptationEngine::with_default_rules();
    let state = MetricsCalculator::default().derive_state(&g);
    let fired = engine.evaluate(&state);
    let names: Vec<&str> = fired.iter().map(|t| t.rule.id.0.as_str()).collect();
    assert_eq!(names, vec!["close_triangles", "bridge_hub"]);

    let proposals = engine.propose(&g, &state, &fired);
    let kinds: Vec<ChangeKind> = proposals.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::EdgeAddition, ChangeKind::Restructure]);

    // Ids allocated across one batch must not collide.
    let executor = ChangeExecutor::default();
    let mut current = g;
    for proposal in proposals {
        let outcome = executor.apply(&current, proposal);
        assert!(outcome.success, "{:?}", outcome.recommendations);
        current = outcome.graph;
    }
    assert_eq!(current.node_count(), 10);
    assert_eq!(current.edge_count(), 11);
    assert!(current.node(NodeId(9)).is_some());
    assert!(current.validate().is_ok());
}

#[test]
fn test_phase_machine_over_a_pass() {
    let g = complete(4, 0.6);
    let engine = AdaptationEngine::with_default_rules();
    assert_eq!(engine.phase(), AdaptationPhase::Idle);
    assert!(engine.transition(AdaptationPhase::Applied).is_err());

    let state = MetricsCalculator::default().derive_state(&g);
    let fired = engine.evaluate(&state);
    assert_eq!(engine.phase(), AdaptationPhase::RuleEvaluation);
    engine.propose(&g, &state, &fired);
    assert_eq!(engine.phase(), AdaptationPhase::ChangeProposed);
    engine.transition(AdaptationPhase::Rejected).expect("reject");
    engine.transition(AdaptationPhase::Monitoring).expect("monitor");

    // A quiet state returns straight to monitoring.
    let quiet = MetricsCalculator::default().derive_state(&reasongraph_tests::ring_lattice(12));
    let fired = engine.evaluate(&quiet);
    assert!(fired.is_empty(), "{:?}", fired);
    assert_eq!(engine.phase(), AdaptationPhase::Monitoring);
}

#[test]
fn test_change_rate_against_recorded_history() {
    let rule = AdaptationRule::new(
        "density_jump",
        RuleTrigger::new(MetricKind::Density, Comparison::ChangeRate, 0.3)
            .within(Duration::minutes(10)),
        RuleAction::new(ActionKind::PruneWeakEdges),
        1,
    );
    let engine = engine_with(vec![rule]);
    let calc = MetricsCalculator::default();

    let sparse = calc.derive_state(&star(8, 0.5));
    let dense = calc.derive_state(&complete(9, 0.5));
    assert!(engine.evaluate(&dense).is_empty(), "no history yet");

    engine.record_observation_at(&sparse.metrics, Utc::now() - Duration::minutes(3));
    let fired = engine.evaluate(&dense);
    assert_eq!(fired.len(), 1);
    assert_eq!(engine.history_len(), 1);
}

#[test]
fn test_history_is_bounded() {
    let config = AdaptationConfig {
        history_capacity: 3,
        ..AdaptationConfig::default()
    };
    let engine = AdaptationEngine::new(config, Vec::new(), Arc::new(ChangeIdGenerator::default()))
        .expect("valid config");
    let metrics = MetricsCalculator::default().compute(&complete(3, 0.5));
    for _ in 0..5 {
        engine.record_observation(&metrics);
    }
    assert_eq!(engine.history_len(), 3);
}

#[test]
fn test_goals_steer_sparse_graph() {
    let g = star(6, 0.5);
    let engine = AdaptationEngine::with_default_rules();
    let state = MetricsCalculator::default().derive_state(&g);
    let goals = [
        OptimizationGoal {
            metric: MetricKind::Centralization,
            target: 0.2,
            tolerance: 0.05,
        },
        OptimizationGoal {
            metric: MetricKind::ClusteringCoefficient,
            target: 0.5,
            tolerance: 0.1,
        },
        OptimizationGoal {
            metric: MetricKind::Density,
            target: state.metrics.density,
            tolerance: 0.01,
        },
    ];
    let proposals = engine.propose_for_goals(&g, &state, &goals);
    let kinds: Vec<ChangeKind> = proposals.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![ChangeKind::Restructure, ChangeKind::EdgeAddition]);
    assert_ne!(proposals[0].id, proposals[1].id);
}

#[test]
fn test_invalid_adaptation_config() {
    let config = AdaptationConfig {
        proposal_confidence: 1.5,
        ..AdaptationConfig::default()
    };
    assert!(AdaptationEngine::new(config, Vec::new(), Arc::default()).is_err());
}
