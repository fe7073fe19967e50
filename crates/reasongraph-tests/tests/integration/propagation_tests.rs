//! Evidence ingestion, belief propagation and uncertainty quantification.

use reasongraph_core::engine::belief::{DistributionFamily, UpdateSource};
use reasongraph_core::engine::graph::STATISTICAL_POWER_KEY;
use reasongraph_core::engine::propagation::PropagationConfig;
use reasongraph_core::{
    ConfidenceVector, EdgeType, EngineError, Evidence, GraphModel, Node, NodeType, SourceType,
    UncertaintyPropagator,
};
use reasongraph_tests::{chain_abc, star};

fn primary(g: &GraphModel, id: reasongraph_core::NodeId) -> f64 {
    g.node(id).expect("node exists").confidence.primary()
}

#[test]
fn test_evidence_flows_down_the_chain() {
    let (g, [a, b, c]) = chain_abc();
    let report = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(a, 0.9, 0.8, SourceType::Experimental)])
        .expect("propagation succeeds");

    assert_eq!(report.metrics.direct_updates, 1);
    assert!(report.rejected.is_empty());
    assert!(primary(&report.graph, a) > 0.5);
    assert!(primary(&report.graph, b) > 0.5);
    assert!(primary(&report.graph, c) >= 0.5);
    assert!(primary(&report.graph, a) >= primary(&report.graph, b));

    assert!(report
        .updates
        .iter()
        .any(|u| u.node == b && matches!(u.source, UpdateSource::Propagated { from, .. } if from == a)));
    assert!(report.metrics.iterations <= PropagationConfig::default().max_iterations);
    assert!((0.0..=1.0).contains(&report.metrics.convergence_score));
}

#[test]
fn test_chain_downstream_mean_lags_upstream() {
    let (g, [a, b, c]) = chain_abc();
    let report = UncertaintyPropagator::default()
        .propagate(
            &g,
            &[Evidence::new(a, 0.9, 0.9, SourceType::Experimental).with_power(0.9)],
        )
        .expect("propagation succeeds");
    let (mean_b, mean_c) = (primary(&report.graph, b), primary(&report.graph, c));
    assert!(mean_b > 0.5 && mean_b < 0.9, "b = {}", mean_b);
    assert!(0.5 < mean_c && mean_c < mean_b, "c = {} b = {}", mean_c, mean_b);

    // Each propagated update on C moves its mean upward.
    let c_means: Vec<f64> = report
        .updates
        .iter()
        .filter(|u| u.node == c)
        .map(|u| u.posterior.mean())
        .collect();
    assert!(c_means.windows(2).all(|w| w[1] >= w[0]), "{:?}", c_means);
}

#[test]
fn test_updated_nodes_carry_beliefs() {
    let (g, [a, _, _]) = chain_abc();
    let report = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(a, 0.9, 0.8, SourceType::Observational)])
        .expect("propagation succeeds");
    let node = report.graph.node(a).expect("a exists");
    let belief = node.belief().expect("a was updated");
    assert!((belief.mean() - node.confidence.primary()).abs() < 1e-12);
    let (lo, hi) = belief.confidence_interval();
    assert!(0.0 <= lo && lo <= belief.mean() && belief.mean() <= hi && hi <= 1.0);
}

#[test]
fn test_input_graph_is_not_mutated() {
    let (g, [a, _, _]) = chain_abc();
    let before = g.clone();
    let _ = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(a, 1.0, 1.0, SourceType::Expert)])
        .expect("propagation succeeds");
    assert_eq!(g, before);
}

#[test]
fn test_contradictory_edge_pushes_target_down() {
    let mut g = GraphModel::new();
    let a = g.add_node(NodeType::Hypothesis, "claim", ConfidenceVector::uniform(0.9))
        .expect("node");
    let b = g.add_node(NodeType::Hypothesis, "counter", ConfidenceVector::uniform(0.5))
        .expect("node");
    g.add_edge(a, b, EdgeType::Contradictory, 1.0).expect("edge");

    let report = UncertaintyPropagator::default()
        .propagate(&g, &[])
        .expect("propagation succeeds");
    assert!(primary(&report.graph, b) < 0.5, "counter = {}", primary(&report.graph, b));
    assert!(report.metrics.propagated_updates >= 1);
}

#[test]
fn test_unknown_and_non_finite_evidence_is_rejected() {
    let (g, [a, _, _]) = chain_abc();
    let evidence = [
        Evidence::new(reasongraph_core::NodeId(77), 0.9, 0.9, SourceType::Literature),
        Evidence::new(a, f64::NAN, 0.9, SourceType::Literature),
    ];
    let report = UncertaintyPropagator::default()
        .propagate(&g, &evidence)
        .expect("rejections are not errors");
    assert_eq!(report.rejected.len(), 2);
    assert_eq!(report.metrics.direct_updates, 0);
}

#[test]
fn test_zero_reliability_leaves_belief_unchanged() {
    let (g, [a, _, _]) = chain_abc();
    let report = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(a, 1.0, 0.0, SourceType::Computational)])
        .expect("propagation succeeds");
    let update = &report.updates[0];
    assert_eq!(update.prior, update.posterior);
    assert_eq!(update.update_strength, 0.0);
}

#[test]
fn test_evidence_node_with_power_uses_beta_prior() {
    let mut g = GraphModel::new();
    let id = g.next_node_id().expect("node id");
    g.insert_node(
        Node::new(id, NodeType::Evidence, "trial", ConfidenceVector::uniform(0.6))
            .with_metadata(STATISTICAL_POWER_KEY, 0.8),
    )
    .expect("insert");
    let report = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(id, 0.9, 1.0, SourceType::Experimental).with_power(0.8)])
        .expect("propagation succeeds");
    assert_eq!(report.updates[0].prior.family(), DistributionFamily::Beta);
    assert_eq!(report.updates[0].posterior.family(), DistributionFamily::Beta);
    assert!(report.updates[0].posterior.mean() > 0.6);
}

#[test]
fn test_single_round_reports_non_convergence() {
    let config = PropagationConfig {
        max_iterations: 1,
        convergence_threshold: 1e-9,
        damping_factor: 0.5,
    };
    let (g, [a, _, _]) = chain_abc();
    let report = UncertaintyPropagator::new(config)
        .expect("valid config")
        .propagate(&g, &[Evidence::new(a, 0.95, 0.9, SourceType::Experimental)])
        .expect("non-convergence is not an error");
    assert_eq!(report.metrics.iterations, 1);
    assert!(!report.metrics.converged);
    assert!(report.metrics.convergence_score < 1.0);
}

#[test]
fn test_invalid_propagation_config() {
    let config = PropagationConfig {
        damping_factor: 1.5,
        ..PropagationConfig::default()
    };
    assert!(matches!(
        UncertaintyPropagator::new(config),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn test_quantify_finds_uncertain_hub() {
    let g = star(4, 0.1);
    let report = UncertaintyPropagator::default().quantify_uncertainty(&g);
    assert_eq!(report.per_node.len(), 5);
    // ceil(0.2 × 5) = 1
    assert_eq!(report.most_uncertain, vec![reasongraph_core::NodeId(0)]);
    assert_eq!(report.hotspots, vec![reasongraph_core::NodeId(0)]);
    assert!(report.entropy >= 0.0);
    let mean = report.per_node.iter().map(|(_, u)| u).sum::<f64>() / 5.0;
    assert!((report.mean_uncertainty - mean).abs() < 1e-12);
}

#[test]
fn test_evidence_narrows_credible_interval() {
    let (g, [a, _, _]) = chain_abc();
    let report = UncertaintyPropagator::default()
        .propagate(&g, &[Evidence::new(a, 0.9, 1.0, SourceType::Experimental)])
        .expect("propagation succeeds");
    let update = &report.updates[0];
    let width = |(lo, hi): (f64, f64)| hi - lo;
    assert!(width(update.posterior.confidence_interval()) < width(update.prior.confidence_interval()));
    assert!(update.information_gain > 0.0);
}
