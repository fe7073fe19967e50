//! Topology metrics and derived structural state.
//!
//! [`MetricsCalculator::compute`] turns a [`GraphModel`] snapshot into
//! [`TopologyMetrics`]; [`MetricsCalculator::derive_state`] adds the composite
//! scores, emergent-property tags, critical nodes and bottlenecks.
//!
//! Notes:
//! - Deterministic evaluation: nodes are indexed in `NodeId` order.
//! - Degenerate graphs never fail: |V| <= 1 yields zero density, path length
//!   and centralization; |V| = 0 yields all zeros.
//! - Average path length is `None` when no pair of nodes is connected.

pub mod estimators;
pub mod paths;

use std::fmt;
use std::str::FromStr;

use crate::engine::adjacency::AdjacencyView;
use crate::engine::errors::EngineError;
use crate::engine::graph::{EdgeId, GraphModel, NodeId, NodeType};

/// Configuration for metric computation.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsConfig {
    /// Nodes sampled for the path-redundancy part of robustness.
    pub robustness_sample_size: usize,
    /// Number of bottleneck edges reported by `derive_state`.
    pub bottleneck_count: usize,
    /// σ above which `small_world_structure` is reported.
    pub small_world_threshold: f64,
    /// Sweep cap for community detection.
    pub community_rounds: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            robustness_sample_size: 50,
            bottleneck_count: 5,
            small_world_threshold: 1.5,
            community_rounds: 20,
        }
    }
}

impl MetricsConfig {
    pub fn validate(self) -> Result<Self, EngineError> {
        if self.robustness_sample_size < 2 {
            return Err(EngineError::Validation(
                "metrics: robustness_sample_size must be >= 2".into(),
            ));
        }
        if !self.small_world_threshold.is_finite() || self.small_world_threshold <= 0.0 {
            return Err(EngineError::Validation(
                "metrics: small_world_threshold must be finite and > 0".into(),
            ));
        }
        if self.community_rounds == 0 {
            return Err(EngineError::Validation(
                "metrics: community_rounds must be > 0".into(),
            ));
        }
        Ok(self)
    }
}

/// Scalar metrics addressable by name (rule triggers, goals, deltas).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MetricKind {
    Density,
    ClusteringCoefficient,
    AveragePathLength,
    Efficiency,
    Robustness,
    Centralization,
    Modularity,
    SmallWorldCoefficient,
    Assortativity,
    Transitivity,
    Stability,
    Adaptability,
    Complexity,
}

impl MetricKind {
    pub const ALL: [MetricKind; 13] = [
        MetricKind::Density,
        MetricKind::ClusteringCoefficient,
        MetricKind::AveragePathLength,
        MetricKind::Efficiency,
        MetricKind::Robustness,
        MetricKind::Centralization,
        MetricKind::Modularity,
        MetricKind::SmallWorldCoefficient,
        MetricKind::Assortativity,
        MetricKind::Transitivity,
        MetricKind::Stability,
        MetricKind::Adaptability,
        MetricKind::Complexity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Density => "density",
            MetricKind::ClusteringCoefficient => "clustering_coefficient",
            MetricKind::AveragePathLength => "average_path_length",
            MetricKind::Efficiency => "efficiency",
            MetricKind::Robustness => "robustness",
            MetricKind::Centralization => "centralization",
            MetricKind::Modularity => "modularity",
            MetricKind::SmallWorldCoefficient => "small_world_coefficient",
            MetricKind::Assortativity => "assortativity",
            MetricKind::Transitivity => "transitivity",
            MetricKind::Stability => "stability",
            MetricKind::Adaptability => "adaptability",
            MetricKind::Complexity => "complexity",
        }
    }

    /// Looks a metric up by name; unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        MetricKind::ALL.iter().copied().find(|k| k.as_str() == name)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::from_name(s).ok_or_else(|| EngineError::Validation(format!("unknown metric '{}'", s)))
    }
}

/// Structural metrics of one graph snapshot.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyMetrics {
    pub node_count: usize,
    pub edge_count: usize,
    pub connected_components: usize,
    /// |E| / (|V|(|V|−1)/2), clamped to 1
    pub density: f64,
    pub clustering_coefficient: f64,
    /// Mean weighted distance over reachable pairs; `None` when undefined
    pub average_path_length: Option<f64>,
    /// Σ 1/d(i,j) / (|V|(|V|−1))
    pub efficiency: f64,
    /// (density + sampled path redundancy) / 2
    pub robustness: f64,
    pub centralization: f64,
    pub modularity: f64,
    pub small_world_coefficient: f64,
    pub assortativity: f64,
    pub transitivity: f64,
    pub stability: f64,
    pub adaptability: f64,
    pub complexity: f64,
}

impl TopologyMetrics {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        Some(match kind {
            MetricKind::Density => self.density,
            MetricKind::ClusteringCoefficient => self.clustering_coefficient,
            MetricKind::AveragePathLength => return self.average_path_length,
            MetricKind::Efficiency => self.efficiency,
            MetricKind::Robustness => self.robustness,
            MetricKind::Centralization => self.centralization,
            MetricKind::Modularity => self.modularity,
            MetricKind::SmallWorldCoefficient => self.small_world_coefficient,
            MetricKind::Assortativity => self.assortativity,
            MetricKind::Transitivity => self.transitivity,
            MetricKind::Stability => self.stability,
            MetricKind::Adaptability => self.adaptability,
            MetricKind::Complexity => self.complexity,
        })
    }

    /// Per-metric `other − self` for every metric defined on both sides.
    pub fn delta(&self, other: &TopologyMetrics) -> MetricsDelta {
        let changes = MetricKind::ALL
            .iter()
            .filter_map(|&kind| Some((kind, other.get(kind)? - self.get(kind)?)))
            .collect();
        MetricsDelta { changes }
    }
}

/// Signed metric changes between two snapshots.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricsDelta {
    pub changes: Vec<(MetricKind, f64)>,
}

impl MetricsDelta {
    pub fn get(&self, kind: MetricKind) -> Option<f64> {
        self.changes.iter().find(|(k, _)| *k == kind).map(|(_, d)| *d)
    }

    pub fn max_abs(&self) -> f64 {
        self.changes.iter().map(|(_, d)| d.abs()).fold(0.0, f64::max)
    }

    /// Metrics whose absolute change exceeds `threshold`.
    pub fn exceeding(&self, threshold: f64) -> Vec<MetricKind> {
        self.changes
            .iter()
            .filter(|(_, d)| d.abs() > threshold)
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Structural pattern detected in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EmergentProperty {
    SmallWorldStructure,
    HighlyClustered,
    HubDominated,
    FragmentedStructure,
    ModularCommunities,
}

impl EmergentProperty {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmergentProperty::SmallWorldStructure => "small_world_structure",
            EmergentProperty::HighlyClustered => "highly_clustered",
            EmergentProperty::HubDominated => "hub_dominated",
            EmergentProperty::FragmentedStructure => "fragmented_structure",
            EmergentProperty::ModularCommunities => "modular_communities",
        }
    }
}

/// A high-confidence edge that carries a large share of flow.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Bottleneck {
    pub edge: EdgeId,
    pub location: (NodeId, NodeId),
    pub severity: f64,
}

/// Composite view of a snapshot used by the adaptation engine.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TopologyState {
    pub metrics: TopologyMetrics,
    pub stability: f64,
    pub adaptability: f64,
    pub complexity: f64,
    pub emergent_properties: Vec<EmergentProperty>,
    /// Nodes with degree > 2 × mean degree, ascending id
    pub critical_nodes: Vec<NodeId>,
    pub bottlenecks: Vec<Bottleneck>,
}

impl TopologyState {
    pub fn has_property(&self, property: EmergentProperty) -> bool {
        self.emergent_properties.contains(&property)
    }
}

const HIGH_CLUSTERING: f64 = 0.6;
const HUB_CENTRALIZATION: f64 = 0.6;
const MODULAR_Q: f64 = 0.3;
const WEAK_EDGE: f64 = 0.5;

/// Computes topology metrics and derived state.
#[derive(Debug, Clone, Default)]
pub struct MetricsCalculator {
    config: MetricsConfig,
}

impl MetricsCalculator {
    pub fn new(config: MetricsConfig) -> Result<Self, EngineError> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    /// Computes every scalar metric of a snapshot. Never fails.
    pub fn compute(&self, graph: &GraphModel) -> TopologyMetrics {
        let view = AdjacencyView::build(graph);
        let n = view.len();
        if n == 0 {
            return TopologyMetrics::default();
        }

        let links = view.link_count();
        let density = if n <= 1 {
            0.0
        } else {
            (links as f64 / (n * (n - 1) / 2) as f64).min(1.0)
        };

        let summary = paths::all_pairs(&view);
        let (average_path_length, efficiency) = if n <= 1 {
            (Some(0.0), 0.0)
        } else {
            (
                summary.average_distance(),
                summary.inverse_distance_sum / (n * (n - 1)) as f64,
            )
        };

        let clustering_coefficient = estimators::clustering_coefficient(&view);
        let transitivity = estimators::transitivity(&view);
        let centralization = estimators::centralization(&view);
        let robustness =
            (density + estimators::path_redundancy(&view, self.config.robustness_sample_size)) / 2.0;
        let labels = estimators::label_propagation(&view, self.config.community_rounds);
        let modularity = estimators::modularity(&view, &labels);
        let small_world_coefficient =
            estimators::small_world(&view, transitivity, summary.average_hops());
        let assortativity = estimators::assortativity(&view);
        let connected_components = paths::component_count(&view);

        let stability = (0.6 * (1.0 - (density - 0.3).abs() / 0.7)
            + 0.4 * clustering_coefficient * efficiency)
            .clamp(0.0, 1.0);

        let distinct_types = NodeType::ALL
            .iter()
            .filter(|t| graph.nodes().iter().any(|node| node.node_type == **t))
            .count();
        let type_diversity = distinct_types as f64 / NodeType::ALL.len() as f64;
        let weak_edges = if graph.edge_count() == 0 {
            0.0
        } else {
            graph.edges().iter().filter(|e| e.confidence < WEAK_EDGE).count() as f64
                / graph.edge_count() as f64
        };
        let connectivity = 1.0 / connected_components as f64;
        let adaptability = ((connectivity + type_diversity + weak_edges) / 3.0).clamp(0.0, 1.0);

        let size_term =
            0.5 * (n as f64 / (n as f64 + 50.0)) + 0.5 * (links as f64 / (links as f64 + 100.0));
        let complexity =
            (0.6 * size_term + 0.4 * modularity.max(0.0) * clustering_coefficient).clamp(0.0, 1.0);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            "metrics: n={}, m={}, density={:.4}, clustering={:.4}, components={}",
            n,
            links,
            density,
            clustering_coefficient,
            connected_components
        );

        TopologyMetrics {
            node_count: n,
            edge_count: graph.edge_count(),
            connected_components,
            density,
            clustering_coefficient,
            average_path_length,
            efficiency,
            robustness,
            centralization,
            modularity,
            small_world_coefficient,
            assortativity,
            transitivity,
            stability,
            adaptability,
            complexity,
        }
    }

    /// Computes metrics and the derived state in one pass.
    pub fn derive_state(&self, graph: &GraphModel) -> TopologyState {
        let metrics = self.compute(graph);
        self.derive_state_from(graph, metrics)
    }

    /// Derives state from metrics already computed for `graph`.
    pub fn derive_state_from(&self, graph: &GraphModel, metrics: TopologyMetrics) -> TopologyState {
        if metrics.node_count == 0 {
            return TopologyState {
                metrics,
                ..TopologyState::default()
            };
        }

        let mut emergent_properties = Vec::new();
        if metrics.small_world_coefficient > self.config.small_world_threshold {
            emergent_properties.push(EmergentProperty::SmallWorldStructure);
        }
        if metrics.clustering_coefficient > HIGH_CLUSTERING {
            emergent_properties.push(EmergentProperty::HighlyClustered);
        }
        if metrics.centralization > HUB_CENTRALIZATION {
            emergent_properties.push(EmergentProperty::HubDominated);
        }
        if metrics.connected_components > 1 {
            emergent_properties.push(EmergentProperty::FragmentedStructure);
        }
        if metrics.modularity > MODULAR_Q {
            emergent_properties.push(EmergentProperty::ModularCommunities);
        }

        let view = AdjacencyView::build(graph);
        let mean_degree =
            (0..view.len()).map(|i| view.degree(i)).sum::<usize>() as f64 / view.len() as f64;
        let critical_nodes = (0..view.len())
            .filter(|&i| mean_degree > 0.0 && view.degree(i) as f64 > 2.0 * mean_degree)
            .map(|i| view.id(i))
            .collect();

        let mut ranked: Vec<_> = graph.edges().iter().collect();
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence).then(a.id.cmp(&b.id)));
        let bottlenecks = ranked
            .into_iter()
            .take(self.config.bottleneck_count)
            .map(|e| Bottleneck {
                edge: e.id,
                location: (e.source, e.target),
                severity: e.confidence,
            })
            .collect();

        TopologyState {
            stability: metrics.stability,
            adaptability: metrics.adaptability,
            complexity: metrics.complexity,
            metrics,
            emergent_properties,
            critical_nodes,
            bottlenecks,
        }
    }

    /// Cheapest path between two nodes (edge cost `1 / confidence`).
    ///
    /// Returns `Ok(None)` when `to` is unreachable from `from`.
    pub fn shortest_path(
        &self,
        graph: &GraphModel,
        from: NodeId,
        to: NodeId,
    ) -> Result<Option<(Vec<NodeId>, f64)>, EngineError> {
        let view = AdjacencyView::build(graph);
        let s = view.index_of(from).ok_or(EngineError::UnknownNode(from))?;
        let t = view.index_of(to).ok_or(EngineError::UnknownNode(to))?;
        Ok(paths::path_between(&view, s, t)
            .map(|(path, cost)| (path.into_iter().map(|i| view.id(i)).collect(), cost)))
    }

    pub fn connected_components(&self, graph: &GraphModel) -> usize {
        paths::component_count(&AdjacencyView::build(graph))
    }
}
