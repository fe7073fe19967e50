//! # Adaptive Restructuring
//!
//! The [`AdaptationEngine`] owns a rule set, a bounded metric history and the
//! adaptation phase. A pass looks like:
//!
//! ```text
//! Idle -> Monitoring -> RuleEvaluation -> ChangeProposed -> (Applied | Rejected) -> Monitoring
//! ```
//!
//! Rules fire on metric thresholds (`above`, `below`, `equals`) or on the
//! change of a metric against the history (`change_rate`). Each fired rule
//! yields at most one [`TopologyChange`] proposal whose target is resolved
//! against the current graph (weakest edge, open triangle, ...).

pub mod change;
pub mod executor;

pub use change::{
    ChangeId, ChangeIdGenerator, ChangeKind, ChangeOperation, ImpactEstimate, StructuralPatch,
    TopologyChange,
};
pub use executor::{ChangeExecutor, ChangeOutcome, ChangeRecord, ChangeStatus};

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};

use crate::engine::errors::EngineError;
use crate::engine::graph::{
    ConfidenceVector, Edge, EdgeId, EdgeType, GraphModel, MetaValue, Node, NodeId, NodeType,
};
use crate::metrics::{MetricKind, TopologyMetrics, TopologyState};

/// Tolerance for the `equals` comparison.
const EQUALS_TOLERANCE: f64 = 1e-9;

/// Metadata key holding the id of the rule that proposed a change.
pub const RULE_ID_KEY: &str = "rule_id";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleId(pub String);

impl From<&str> for RuleId {
    fn from(s: &str) -> Self {
        RuleId(s.to_string())
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Comparison {
    Above,
    Below,
    Equals,
    /// Absolute change against a historic observation exceeds the threshold
    ChangeRate,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleTrigger {
    /// Metric name; unknown names make the rule inert
    pub metric: String,
    pub comparison: Comparison,
    pub threshold: f64,
    /// Restricts `change_rate` to observations inside this window
    #[cfg_attr(feature = "serde", serde(with = "window_seconds"))]
    pub window: Option<Duration>,
}

#[cfg(feature = "serde")]
mod window_seconds {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(window: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        window.map(|w| w.num_seconds()).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<i64>::deserialize(deserializer)?.map(Duration::seconds))
    }
}

impl RuleTrigger {
    pub fn new(metric: MetricKind, comparison: Comparison, threshold: f64) -> Self {
        Self {
            metric: metric.as_str().to_string(),
            comparison,
            threshold,
            window: None,
        }
    }

    pub fn within(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }
}

/// Structural action a rule proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ActionKind {
    /// Remove the weakest edges (`count`, default 1)
    PruneWeakEdges,
    /// Link the two lowest-degree unlinked nodes (`confidence`, default 0.5)
    AddEdge,
    /// Close the first open triangle (`confidence`, default 0.5)
    CloseTriangle,
    /// Insert a bridge node between the two lowest-degree nodes
    AddBridge,
    /// Raise the weakest edge's confidence (`delta`, default 0.2)
    ReinforceWeakestEdge,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RuleAction {
    pub kind: ActionKind,
    pub parameters: BTreeMap<String, f64>,
}

impl RuleAction {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            parameters: BTreeMap::new(),
        }
    }

    pub fn with_parameter(mut self, key: &str, value: f64) -> Self {
        self.parameters.insert(key.to_string(), value);
        self
    }

    fn parameter(&self, key: &str, default: f64) -> f64 {
        self.parameters
            .get(key)
            .copied()
            .filter(|v| v.is_finite())
            .unwrap_or(default)
    }
}

/// Threshold rule. A rule missing its trigger or action is malformed and skipped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptationRule {
    pub id: RuleId,
    pub trigger: Option<RuleTrigger>,
    pub action: Option<RuleAction>,
    /// Lower fires first
    pub priority: u32,
    pub enabled: bool,
    /// Reserved
    pub learning_enabled: bool,
}

impl AdaptationRule {
    pub fn new(id: impl Into<RuleId>, trigger: RuleTrigger, action: RuleAction, priority: u32) -> Self {
        Self {
            id: id.into(),
            trigger: Some(trigger),
            action: Some(action),
            priority,
            enabled: true,
            learning_enabled: false,
        }
    }

    /// Built-in rule set.
    pub fn default_rules() -> Vec<AdaptationRule> {
        vec![
            AdaptationRule::new(
                "prune_when_dense",
                RuleTrigger::new(MetricKind::Density, Comparison::Above, 0.8),
                RuleAction::new(ActionKind::PruneWeakEdges),
                10,
            ),
            AdaptationRule::new(
                "densify_when_sparse",
                RuleTrigger::new(MetricKind::Density, Comparison::Below, 0.1),
                RuleAction::new(ActionKind::AddEdge),
                20,
            ),
            AdaptationRule::new(
                "close_triangles",
                RuleTrigger::new(MetricKind::ClusteringCoefficient, Comparison::Below, 0.2),
                RuleAction::new(ActionKind::CloseTriangle),
                30,
            ),
            AdaptationRule::new(
                "bridge_hub",
                RuleTrigger::new(MetricKind::Centralization, Comparison::Above, 0.7),
                RuleAction::new(ActionKind::AddBridge),
                40,
            ),
            AdaptationRule::new(
                "reinforce_fragile",
                RuleTrigger::new(MetricKind::Robustness, Comparison::Below, 0.3),
                RuleAction::new(ActionKind::ReinforceWeakestEdge),
                50,
            ),
        ]
    }
}

/// A rule that fired, with the observed metric value.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggeredRule {
    pub rule: AdaptationRule,
    pub observed: f64,
}

/// Desired value for a metric, used by [`AdaptationEngine::propose_for_goals`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OptimizationGoal {
    pub metric: MetricKind,
    pub target: f64,
    pub tolerance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AdaptationPhase {
    Idle,
    Monitoring,
    RuleEvaluation,
    ChangeProposed,
    Applied,
    Rejected,
}

impl AdaptationPhase {
    pub fn can_transition_to(self, next: AdaptationPhase) -> bool {
        use AdaptationPhase::*;
        matches!(
            (self, next),
            (_, Idle)
                | (Idle, Monitoring)
                | (Monitoring, RuleEvaluation)
                | (RuleEvaluation, ChangeProposed)
                | (RuleEvaluation, Monitoring)
                | (ChangeProposed, Applied)
                | (ChangeProposed, Rejected)
                | (ChangeProposed, RuleEvaluation)
                | (Applied, Monitoring)
                | (Rejected, Monitoring)
        )
    }
}

/// Configuration for the adaptation engine.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AdaptationConfig {
    /// Apply proposals automatically when urgency reaches `auto_apply_urgency`.
    pub auto_apply: bool,
    pub auto_apply_urgency: Urgency,
    /// Metric observations retained for `change_rate` triggers.
    pub history_capacity: usize,
    /// Confidence given to rule-generated proposals.
    pub proposal_confidence: f64,
    /// Metric change above which the executor flags cascading effects.
    pub cascade_threshold: f64,
}

impl Default for AdaptationConfig {
    fn default() -> Self {
        Self {
            auto_apply: false,
            auto_apply_urgency: Urgency::High,
            history_capacity: 64,
            proposal_confidence: 0.5,
            cascade_threshold: executor::DEFAULT_CASCADE_THRESHOLD,
        }
    }
}

impl AdaptationConfig {
    pub fn validate(self) -> Result<Self, EngineError> {
        if self.history_capacity == 0 {
            return Err(EngineError::Validation(
                "adaptation: history_capacity must be > 0".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.proposal_confidence) {
            return Err(EngineError::Validation(
                "adaptation: proposal_confidence must be in [0, 1]".into(),
            ));
        }
        if !self.cascade_threshold.is_finite() || self.cascade_threshold <= 0.0 {
            return Err(EngineError::Validation(
                "adaptation: cascade_threshold must be finite and > 0".into(),
            ));
        }
        Ok(self)
    }
}

#[derive(Debug, Clone)]
struct MetricObservation {
    at: DateTime<Utc>,
    metrics: TopologyMetrics,
}

/// Rule-driven proposal engine with an explicit phase machine.
#[derive(Debug)]
pub struct AdaptationEngine {
    config: AdaptationConfig,
    rules: RwLock<Vec<AdaptationRule>>,
    history: Mutex<VecDeque<MetricObservation>>,
    phase: Mutex<AdaptationPhase>,
    ids: Arc<ChangeIdGenerator>,
}

impl AdaptationEngine {
    pub fn new(
        config: AdaptationConfig,
        rules: Vec<AdaptationRule>,
        ids: Arc<ChangeIdGenerator>,
    ) -> Result<Self, EngineError> {
        let config = config.validate()?;
        Ok(Self {
            history: Mutex::new(VecDeque::with_capacity(config.history_capacity)),
            config,
            rules: RwLock::new(rules),
            phase: Mutex::new(AdaptationPhase::Idle),
            ids,
        })
    }

    pub fn with_default_rules() -> Self {
        Self {
            config: AdaptationConfig::default(),
            rules: RwLock::new(AdaptationRule::default_rules()),
            history: Mutex::new(VecDeque::new()),
            phase: Mutex::new(AdaptationPhase::Idle),
            ids: Arc::default(),
        }
    }

    pub fn config(&self) -> &AdaptationConfig {
        &self.config
    }

    // ---- rule management ----

    pub fn rules(&self) -> Vec<AdaptationRule> {
        self.rules.read().clone()
    }

    pub fn add_rule(&self, rule: AdaptationRule) -> Result<(), EngineError> {
        let mut rules = self.rules.write();
        if rules.iter().any(|r| r.id == rule.id) {
            return Err(EngineError::Validation(format!("duplicate rule '{}'", rule.id)));
        }
        rules.push(rule);
        Ok(())
    }

    pub fn remove_rule(&self, id: &RuleId) -> Result<AdaptationRule, EngineError> {
        let mut rules = self.rules.write();
        let idx = rules
            .iter()
            .position(|r| &r.id == id)
            .ok_or_else(|| EngineError::Validation(format!("unknown rule '{}'", id)))?;
        Ok(rules.remove(idx))
    }

    pub fn set_rule_enabled(&self, id: &RuleId, enabled: bool) -> Result<(), EngineError> {
        let mut rules = self.rules.write();
        let rule = rules
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| EngineError::Validation(format!("unknown rule '{}'", id)))?;
        rule.enabled = enabled;
        Ok(())
    }

    // ---- phase machine ----

    pub fn phase(&self) -> AdaptationPhase {
        *self.phase.lock()
    }

    pub fn transition(&self, next: AdaptationPhase) -> Result<(), EngineError> {
        let mut phase = self.phase.lock();
        if !phase.can_transition_to(next) {
            return Err(EngineError::Validation(format!(
                "invalid adaptation phase transition {:?} -> {:?}",
                *phase, next
            )));
        }
        #[cfg(feature = "tracing")]
        tracing::debug!("adaptation phase {:?} -> {:?}", *phase, next);
        *phase = next;
        Ok(())
    }

    fn enter_evaluation(&self) {
        let mut phase = self.phase.lock();
        if matches!(
            *phase,
            AdaptationPhase::Idle | AdaptationPhase::Applied | AdaptationPhase::Rejected
        ) {
            *phase = AdaptationPhase::Monitoring;
        }
        *phase = AdaptationPhase::RuleEvaluation;
    }

    fn finish_proposal(&self, proposed: bool) {
        let mut phase = self.phase.lock();
        if *phase == AdaptationPhase::RuleEvaluation {
            *phase = if proposed {
                AdaptationPhase::ChangeProposed
            } else {
                AdaptationPhase::Monitoring
            };
        }
    }

    // ---- metric history ----

    /// Records an observation timestamped now.
    pub fn record_observation(&self, metrics: &TopologyMetrics) {
        self.record_observation_at(metrics, Utc::now());
    }

    pub fn record_observation_at(&self, metrics: &TopologyMetrics, at: DateTime<Utc>) {
        let mut history = self.history.lock();
        if history.len() == self.config.history_capacity {
            history.pop_front();
        }
        history.push_back(MetricObservation {
            at,
            metrics: metrics.clone(),
        });
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    /// Oldest retained value of `kind`, restricted to `window` when given.
    fn historic_value(&self, kind: MetricKind, window: Option<Duration>, now: DateTime<Utc>) -> Option<f64> {
        let history = self.history.lock();
        history
            .iter()
            .filter(|obs| window.map_or(true, |w| obs.at >= now - w))
            .find_map(|obs| obs.metrics.get(kind))
    }

    // ---- evaluation ----

    /// Evaluates the engine's own rules against a state.
    pub fn evaluate(&self, state: &TopologyState) -> Vec<TriggeredRule> {
        let rules = self.rules();
        self.evaluate_rules(state, &rules)
    }

    /// Evaluates enabled, well-formed rules; results sorted by ascending priority.
    pub fn evaluate_rules(&self, state: &TopologyState, rules: &[AdaptationRule]) -> Vec<TriggeredRule> {
        self.enter_evaluation();
        let now = Utc::now();
        let mut triggered = Vec::new();

        for rule in rules.iter().filter(|r| r.enabled) {
            let (Some(trigger), Some(_)) = (&rule.trigger, &rule.action) else {
                #[cfg(feature = "tracing")]
                tracing::warn!("skipping malformed rule '{}': missing trigger or action", rule.id);
                continue;
            };
            let Some(kind) = MetricKind::from_name(&trigger.metric) else {
                #[cfg(feature = "tracing")]
                tracing::warn!("skipping rule '{}': unknown metric '{}'", rule.id, trigger.metric);
                continue;
            };
            let Some(observed) = state.metrics.get(kind) else {
                continue;
            };
            let fires = match trigger.comparison {
                Comparison::Above => observed > trigger.threshold,
                Comparison::Below => observed < trigger.threshold,
                Comparison::Equals => (observed - trigger.threshold).abs() < EQUALS_TOLERANCE,
                Comparison::ChangeRate => self
                    .historic_value(kind, trigger.window, now)
                    .is_some_and(|past| (observed - past).abs() > trigger.threshold),
            };
            if fires {
                triggered.push(TriggeredRule {
                    rule: rule.clone(),
                    observed,
                });
            }
        }

        triggered.sort_by(|a, b| a.rule.priority.cmp(&b.rule.priority).then(a.rule.id.cmp(&b.rule.id)));
        if triggered.is_empty() {
            self.finish_proposal(false);
        }
        triggered
    }

    /// One proposal per triggered rule whose action has a target in `graph`.
    ///
    /// A rule whose action finds no target, or no free id, yields nothing and
    /// is logged at debug level, so the result can be shorter than `triggered`.
    pub fn propose(
        &self,
        graph: &GraphModel,
        _state: &TopologyState,
        triggered: &[TriggeredRule],
    ) -> Vec<TopologyChange> {
        let mut ids = IdCursor::new(graph);
        let proposals: Vec<TopologyChange> = triggered
            .iter()
            .filter_map(|t| {
                let trigger = t.rule.trigger.as_ref()?;
                let action = t.rule.action.as_ref()?;
                let Some(operation) = resolve_action(graph, action, &mut ids) else {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("rule '{}' fired but {:?} has no target", t.rule.id, action.kind);
                    return None;
                };
                let reason = format!(
                    "rule {}: {} {:?} {} (observed {:.4})",
                    t.rule.id, trigger.metric, trigger.comparison, trigger.threshold, t.observed
                );
                Some(
                    TopologyChange::new(self.ids.next_id(), operation, reason)
                        .with_confidence(self.config.proposal_confidence)
                        .with_metadata(RULE_ID_KEY, MetaValue::Text(t.rule.id.0.clone())),
                )
            })
            .collect();
        self.finish_proposal(!proposals.is_empty());
        proposals
    }

    /// Proposals steering each out-of-tolerance metric toward its target.
    pub fn propose_for_goals(
        &self,
        graph: &GraphModel,
        state: &TopologyState,
        goals: &[OptimizationGoal],
    ) -> Vec<TopologyChange> {
        let mut ids = IdCursor::new(graph);
        goals
            .iter()
            .filter_map(|goal| {
                let current = state.metrics.get(goal.metric)?;
                let gap = goal.target - current;
                if gap.abs() <= goal.tolerance {
                    return None;
                }
                let kind = goal_action(goal.metric, gap > 0.0)?;
                let operation = resolve_action(graph, &RuleAction::new(kind), &mut ids)?;
                let reason = format!(
                    "goal: move {} from {:.4} toward {:.4}",
                    goal.metric, current, goal.target
                );
                Some(
                    TopologyChange::new(self.ids.next_id(), operation, reason)
                        .with_confidence(self.config.proposal_confidence),
                )
            })
            .collect()
    }

    /// Urgency of acting on `proposals`, checked in order:
    /// critical if stability < 0.2, high if any proposal confidence > 0.9,
    /// medium if more than 3 proposals, else low.
    pub fn urgency(&self, state: &TopologyState, proposals: &[TopologyChange]) -> Urgency {
        if state.stability < 0.2 {
            Urgency::Critical
        } else if proposals.iter().any(|p| p.confidence > 0.9) {
            Urgency::High
        } else if proposals.len() > 3 {
            Urgency::Medium
        } else {
            Urgency::Low
        }
    }
}

/// Action moving `metric` up (`increase`) or down, if one exists.
fn goal_action(metric: MetricKind, increase: bool) -> Option<ActionKind> {
    use ActionKind::*;
    match (metric, increase) {
        (MetricKind::Density, true) => Some(AddEdge),
        (MetricKind::Density, false) => Some(PruneWeakEdges),
        (MetricKind::ClusteringCoefficient | MetricKind::Transitivity, true) => Some(CloseTriangle),
        (MetricKind::ClusteringCoefficient | MetricKind::Transitivity, false) => Some(PruneWeakEdges),
        (MetricKind::Centralization, false) => Some(AddBridge),
        (MetricKind::AveragePathLength, false) => Some(AddEdge),
        (MetricKind::AveragePathLength, true) => Some(PruneWeakEdges),
        (MetricKind::Robustness | MetricKind::Efficiency | MetricKind::Stability, true) => {
            Some(ReinforceWeakestEdge)
        }
        _ => None,
    }
}

fn weakest_edges(graph: &GraphModel) -> Vec<&Edge> {
    let mut edges: Vec<&Edge> = graph.edges().iter().collect();
    edges.sort_by(|a, b| a.confidence.total_cmp(&b.confidence).then(a.id.cmp(&b.id)));
    edges
}

/// Node ids ordered by ascending degree, ties by id.
fn by_degree(graph: &GraphModel) -> Vec<NodeId> {
    let mut ids: Vec<(usize, NodeId)> = graph.nodes().iter().map(|n| (graph.degree(n.id), n.id)).collect();
    ids.sort_unstable();
    ids.into_iter().map(|(_, id)| id).collect()
}

/// Hands out ids past the graph's current maximum so one batch of
/// proposals never reuses an id. `None` once the id space is exhausted.
struct IdCursor {
    node: Option<u32>,
    edge: Option<u32>,
}

impl IdCursor {
    fn new(graph: &GraphModel) -> Self {
        Self {
            node: graph.next_node_id().map(|id| id.0),
            edge: graph.next_edge_id().map(|id| id.0),
        }
    }

    fn node(&mut self) -> Option<NodeId> {
        let id = self.node?;
        self.node = id.checked_add(1);
        Some(NodeId(id))
    }

    fn edge(&mut self) -> Option<EdgeId> {
        let id = self.edge?;
        self.edge = id.checked_add(1);
        Some(EdgeId(id))
    }
}

/// First pair in `order` (by position) without a link between them.
fn first_open_pair(graph: &GraphModel, order: &[NodeId]) -> Option<(NodeId, NodeId)> {
    order.iter().enumerate().find_map(|(i, &a)| {
        order[i + 1..]
            .iter()
            .find(|&&b| graph.edge_between(a, b).is_none())
            .map(|&b| (a, b))
    })
}

fn resolve_action(graph: &GraphModel, action: &RuleAction, ids: &mut IdCursor) -> Option<ChangeOperation> {
    match action.kind {
        ActionKind::PruneWeakEdges => {
            let count = action.parameter("count", 1.0).max(1.0) as usize;
            let weakest: Vec<_> = weakest_edges(graph).iter().take(count).map(|e| e.id).collect();
            match weakest.as_slice() {
                [] => None,
                [single] => Some(ChangeOperation::RemoveEdge(*single)),
                _ => Some(ChangeOperation::Restructure(StructuralPatch {
                    remove_edges: weakest,
                    ..StructuralPatch::default()
                })),
            }
        }
        ActionKind::AddEdge => {
            let (a, b) = first_open_pair(graph, &by_degree(graph))?;
            let (s, t) = if a < b { (a, b) } else { (b, a) };
            let confidence = action.parameter("confidence", 0.5);
            Some(ChangeOperation::AddEdge(Edge::new(ids.edge()?, s, t, EdgeType::Generic, confidence)))
        }
        ActionKind::CloseTriangle => {
            let mut centers: Vec<NodeId> = graph.nodes().iter().map(|n| n.id).collect();
            centers.sort_unstable();
            let (a, b) = centers
                .into_iter()
                .find_map(|center| first_open_pair(graph, &graph.neighbors(center)))?;
            let confidence = action.parameter("confidence", 0.5);
            Some(ChangeOperation::AddEdge(Edge::new(ids.edge()?, a, b, EdgeType::Correlative, confidence)))
        }
        ActionKind::AddBridge => {
            let order = by_degree(graph);
            let (&a, &b) = (order.first()?, order.get(1)?);
            let bridge = ids.node()?;
            let (first, second) = (ids.edge()?, ids.edge()?);
            let confidence = action.parameter("confidence", 0.5);
            Some(ChangeOperation::Restructure(StructuralPatch {
                add_nodes: vec![Node::new(
                    bridge,
                    NodeType::Bridge,
                    format!("bridge {}-{}", a, b),
                    ConfidenceVector::uniform(confidence),
                )],
                add_edges: vec![
                    Edge::new(first, a, bridge, EdgeType::Generic, confidence),
                    Edge::new(second, bridge, b, EdgeType::Generic, confidence),
                ],
                ..StructuralPatch::default()
            }))
        }
        ActionKind::ReinforceWeakestEdge => {
            let edge = *weakest_edges(graph).first()?;
            let delta = action.parameter("delta", 0.2);
            let confidence = (edge.confidence + delta).clamp(0.0, 1.0);
            (confidence != edge.confidence).then_some(ChangeOperation::ReweightEdge {
                edge: edge.id,
                confidence,
            })
        }
    }
}
