//! Topology metrics and derived state on reference graph shapes.

use reasongraph_core::metrics::{EmergentProperty, MetricsConfig};
use reasongraph_core::{
    compute_metrics, ConfidenceVector, EdgeType, EngineError, GraphModel, MetricKind,
    MetricsCalculator, NodeId, NodeType,
};
use reasongraph_tests::{chain_abc, complete, ring_lattice, star};

fn assert_close(actual: f64, expected: f64, tol: f64, label: &str) {
    assert!(
        (actual - expected).abs() <= tol,
        "{}: expected {}, got {} (tol {})",
        label,
        expected,
        actual,
        tol
    );
}

fn two_triangles() -> GraphModel {
    let mut g = GraphModel::new();
    for i in 0..6 {
        g.add_node(NodeType::Hypothesis, format!("t{}", i), ConfidenceVector::uniform(0.5))
            .expect("node");
    }
    for (a, b) in [(0, 1), (1, 2), (2, 0), (3, 4), (4, 5), (5, 3)] {
        g.add_edge(NodeId(a), NodeId(b), EdgeType::Supportive, 1.0)
            .expect("triangle edge");
    }
    g
}

#[test]
fn test_complete_graph_is_saturated() {
    let m = compute_metrics(&complete(5, 1.0));
    assert_eq!(m.node_count, 5);
    assert_eq!(m.edge_count, 10);
    assert_eq!(m.connected_components, 1);
    assert_close(m.density, 1.0, 1e-12, "density");
    assert_close(m.clustering_coefficient, 1.0, 1e-12, "clustering");
    assert_close(m.transitivity, 1.0, 1e-12, "transitivity");
    assert_close(m.efficiency, 1.0, 1e-12, "efficiency");
    assert_close(m.centralization, 0.0, 1e-12, "centralization");
    assert_close(
        m.average_path_length.expect("connected graph has a path length"),
        1.0,
        1e-12,
        "average path length",
    );
}

#[test]
fn test_path_cost_is_inverse_confidence() {
    let (g, [a, _, c]) = chain_abc();
    let calc = MetricsCalculator::default();
    let (path, cost) = calc
        .shortest_path(&g, a, c)
        .expect("known endpoints")
        .expect("c is reachable");
    assert_eq!(path.len(), 3);
    assert_eq!(path.first(), Some(&a));
    assert_eq!(path.last(), Some(&c));
    assert_close(cost, 2.0 / 0.9, 1e-9, "path cost");
}

#[test]
fn test_shortest_path_unknown_node() {
    let (g, [a, _, _]) = chain_abc();
    let result = MetricsCalculator::default().shortest_path(&g, a, NodeId(42));
    assert!(matches!(result, Err(EngineError::UnknownNode(NodeId(42)))));
}

#[test]
fn test_disconnected_graph_is_fragmented() {
    let g = two_triangles();
    let state = MetricsCalculator::default().derive_state(&g);
    assert_eq!(state.metrics.connected_components, 2);
    assert!(state.has_property(EmergentProperty::FragmentedStructure));
    assert!(state.has_property(EmergentProperty::HighlyClustered));
    // Only reachable pairs count; each triangle pair sits at distance 1.
    assert_close(
        state.metrics.average_path_length.expect("reachable pairs exist"),
        1.0,
        1e-12,
        "average path length",
    );
    // 6 of 15 pairs reachable, each at distance 1: 12 / 30
    assert_close(state.metrics.efficiency, 0.4, 1e-12, "efficiency");
}

#[test]
fn test_separate_cliques_are_modular() {
    let m = compute_metrics(&two_triangles());
    // Two disjoint triangles: Q = 2 × (3/6 − (6/12)²) = 0.5
    assert_close(m.modularity, 0.5, 1e-9, "modularity");
    assert!(m.get(MetricKind::Modularity).is_some());
}

#[test]
fn test_star_is_hub_dominated() {
    let state = MetricsCalculator::default().derive_state(&star(8, 0.5));
    assert!(state.has_property(EmergentProperty::HubDominated));
    assert_eq!(state.critical_nodes, vec![NodeId(0)]);
    assert_close(state.metrics.clustering_coefficient, 0.0, 1e-12, "clustering");
    // max degree 8, mean 16/9
    assert_close(
        state.metrics.centralization,
        (8.0 - 16.0 / 9.0) / 8.0,
        1e-12,
        "centralization",
    );
}

#[test]
fn test_bottlenecks_rank_strongest_edges() {
    let g = star(8, 0.5);
    let state = MetricsCalculator::default().derive_state(&g);
    assert_eq!(state.bottlenecks.len(), MetricsConfig::default().bottleneck_count);
    let first = state.bottlenecks[0];
    let strongest = g
        .edges()
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .expect("star has edges");
    assert_eq!(first.edge, strongest.id);
    assert_close(first.severity, strongest.confidence, 1e-12, "severity");
    assert!(state
        .bottlenecks
        .windows(2)
        .all(|w| w[0].severity >= w[1].severity));
}

#[test]
fn test_ring_lattice_is_small_world() {
    let state = MetricsCalculator::default().derive_state(&ring_lattice(30));
    // Transitivity 0.5 against a random reference of k/n = 4/30.
    assert_close(state.metrics.transitivity, 0.5, 1e-12, "transitivity");
    assert!(
        state.metrics.small_world_coefficient > 1.5,
        "sigma = {}",
        state.metrics.small_world_coefficient
    );
    assert!(state.has_property(EmergentProperty::SmallWorldStructure));
    assert!(!state.has_property(EmergentProperty::FragmentedStructure));
}

#[test]
fn test_empty_graph_has_default_metrics() {
    let state = MetricsCalculator::default().derive_state(&GraphModel::new());
    assert_eq!(state.metrics.node_count, 0);
    assert_eq!(state.metrics.density, 0.0);
    assert!(state.emergent_properties.is_empty());
    assert!(state.critical_nodes.is_empty());
}

#[test]
fn test_scores_stay_in_unit_interval() {
    for g in [complete(6, 0.3), ring_lattice(12), star(5, 0.9), two_triangles()] {
        let m = compute_metrics(&g);
        for kind in [
            MetricKind::Density,
            MetricKind::ClusteringCoefficient,
            MetricKind::Efficiency,
            MetricKind::Robustness,
            MetricKind::Centralization,
            MetricKind::Stability,
            MetricKind::Adaptability,
            MetricKind::Complexity,
        ] {
            let v = m.get(kind).expect("scalar metric");
            assert!((0.0..=1.0).contains(&v), "{} = {}", kind, v);
        }
    }
}

#[test]
fn test_metric_names_round_trip() {
    for kind in MetricKind::ALL {
        assert_eq!(MetricKind::from_name(kind.as_str()), Some(kind));
        let parsed: MetricKind = kind.as_str().parse().expect("known metric");
        assert_eq!(parsed, kind);
    }
    assert!("vibes".parse::<MetricKind>().is_err());
}

#[test]
fn test_invalid_metrics_config_is_rejected() {
    let config = MetricsConfig {
        robustness_sample_size: 0,
        ..MetricsConfig::default()
    };
    assert!(matches!(
        MetricsCalculator::new(config),
        Err(EngineError::Validation(_))
    ));
}
