//! Change application, measured impact and rollback through the executor.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use reasongraph_core::adaptation::{
    ChangeIdGenerator, ChangeKind, ChangeOperation, ChangeStatus, StructuralPatch,
};
use reasongraph_core::engine::graph::Edge;
use reasongraph_core::{
    ChangeExecutor, EdgeId, EdgeType, EngineError, MetricKind, MetricsCalculator, NodeId,
    TopologyChange,
};
use reasongraph_tests::{chain_abc, complete, star};

fn executor() -> (ChangeExecutor, Arc<ChangeIdGenerator>) {
    let ids = Arc::new(ChangeIdGenerator::default());
    (ChangeExecutor::new(MetricsCalculator::default(), Arc::clone(&ids)), ids)
}

#[test]
fn test_add_edge_measures_metric_change() {
    let (exec, ids) = executor();
    let (g, [a, _, c]) = chain_abc();
    let edge = Edge::new(g.next_edge_id().expect("edge id"), a, c, EdgeType::Correlative, 0.7);
    let outcome = exec.apply(&g, TopologyChange::new(ids.next_id(), ChangeOperation::AddEdge(edge), "close"));

    assert!(outcome.success);
    assert_eq!(outcome.graph.edge_count(), 3);
    assert_eq!(g.edge_count(), 2, "input snapshot untouched");
    let density = outcome.metrics_change.get(MetricKind::Density).expect("density delta");
    assert!((density - 1.0 / 3.0).abs() < 1e-12);
    assert!(outcome.change.impact.assessed);
    assert!(outcome.change.impact.cascading);
    // Two of three nodes touched.
    assert!((outcome.change.impact.local - 2.0 / 3.0).abs() < 1e-12);
    assert!(outcome.change.metrics_before.is_some());
    assert!(outcome.change.metrics_after.is_some());
}

#[test]
fn test_removing_hub_fragments_and_reverts() {
    let (exec, ids) = executor();
    let g = star(5, 0.5);
    let before = MetricsCalculator::default().compute(&g);
    let outcome = exec.apply(
        &g,
        TopologyChange::new(ids.next_id(), ChangeOperation::RemoveNode(NodeId(0)), "drop hub"),
    );
    assert!(outcome.success);
    assert_eq!(outcome.graph.node_count(), 5);
    assert_eq!(outcome.graph.edge_count(), 0);
    assert!(outcome
        .recommendations
        .iter()
        .any(|r| r.contains("fragmented")));

    let id = outcome.change.id;
    let reverted = exec.revert(&outcome.graph, id).expect("reversible");
    assert!(reverted.success);
    assert_eq!(reverted.change.kind, ChangeKind::Restructure);
    assert_eq!(reverted.graph.node_count(), 6);
    assert_eq!(reverted.graph.edge_count(), 5);
    let after = MetricsCalculator::default().compute(&reverted.graph);
    for kind in MetricKind::ALL {
        match (before.get(kind), after.get(kind)) {
            (Some(x), Some(y)) => assert!((x - y).abs() < 1e-9, "{}: {} vs {}", kind, x, y),
            (x, y) => assert_eq!(x, y, "{}", kind),
        }
    }
    assert!(exec.is_reverted(id));
}

#[test]
fn test_reweight_round_trip() {
    let (exec, ids) = executor();
    let g = complete(4, 0.4);
    let outcome = exec.apply(
        &g,
        TopologyChange::new(
            ids.next_id(),
            ChangeOperation::ReweightEdge {
                edge: EdgeId(2),
                confidence: 0.95,
            },
            "strengthen",
        ),
    );
    assert!(outcome.success);
    assert_eq!(outcome.graph.edge(EdgeId(2)).map(|e| e.confidence), Some(0.95));

    let reverted = exec.revert(&outcome.graph, outcome.change.id).expect("reversible");
    assert_eq!(reverted.graph.edge(EdgeId(2)).map(|e| e.confidence), Some(0.4));
    assert_eq!(reverted.graph, g);
}

#[test]
fn test_failed_restructure_leaves_graph_untouched() {
    let (exec, ids) = executor();
    let (g, [a, _, _]) = chain_abc();
    let patch = StructuralPatch {
        remove_edges: vec![EdgeId(0)],
        add_edges: vec![Edge::new(EdgeId(9), a, NodeId(99), EdgeType::Generic, 0.5)],
        ..StructuralPatch::default()
    };
    let outcome = exec.apply(
        &g,
        TopologyChange::new(ids.next_id(), ChangeOperation::Restructure(patch), "broken"),
    );
    assert!(!outcome.success);
    assert_eq!(outcome.graph, g);
    assert!(outcome.metrics_change.changes.is_empty());

    let record = exec.record(outcome.change.id).expect("failures are logged");
    assert_eq!(record.status, ChangeStatus::Failed);
    assert!(record.error.is_some());
    assert!(record.inverse.is_none());
    assert!(matches!(
        exec.revert(&g, outcome.change.id),
        Err(EngineError::Validation(_))
    ));
}

#[test]
fn test_revert_bookkeeping() {
    let (exec, ids) = executor();
    let (g, _) = chain_abc();
    let outcome = exec.apply(
        &g,
        TopologyChange::new(ids.next_id(), ChangeOperation::RemoveEdge(EdgeId(1)), "prune"),
    );
    let id = outcome.change.id;
    let reverted = exec.revert(&outcome.graph, id).expect("first revert");
    assert!(reverted.change.id > id);

    assert!(matches!(
        exec.revert(&reverted.graph, id),
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        exec.revert(&g, reasongraph_core::ChangeId(999)),
        Err(EngineError::UnknownChange(_))
    ));

    let history = exec.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].reverts, None);
    assert_eq!(history[1].reverts, Some(id));
    // Original entry is never rewritten.
    assert_eq!(history[0].change.id, id);
    assert_eq!(history[0].status, ChangeStatus::Applied);
}

#[test]
fn test_irreversible_change_is_kept() {
    let (exec, ids) = executor();
    let (g, _) = chain_abc();
    let outcome = exec.apply(
        &g,
        TopologyChange::new(ids.next_id(), ChangeOperation::RemoveEdge(EdgeId(0)), "final").irreversible(),
    );
    assert!(outcome.success);
    assert!(matches!(
        exec.revert(&outcome.graph, outcome.change.id),
        Err(EngineError::Irreversible(_))
    ));
}

#[test]
fn test_concurrent_applications_share_one_log() {
    let (exec, ids) = executor();
    let g = complete(5, 0.5);
    thread::scope(|scope| {
        for worker in 0..4u32 {
            let (exec, ids, g) = (&exec, &ids, &g);
            scope.spawn(move || {
                for step in 0..5u32 {
                    let change = TopologyChange::new(
                        ids.next_id(),
                        ChangeOperation::ReweightEdge {
                            edge: EdgeId(worker),
                            confidence: 0.1 * f64::from(step + 1),
                        },
                        format!("worker {} step {}", worker, step),
                    );
                    assert!(exec.apply(g, change).success);
                }
            });
        }
    });
    let history = exec.history();
    assert_eq!(history.len(), 20);
    let unique: BTreeSet<_> = history.iter().map(|r| r.change.id).collect();
    assert_eq!(unique.len(), 20);
}
