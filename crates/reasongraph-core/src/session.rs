//! Per-session orchestration.
//!
//! A [`ReasoningSession`] owns one instance of every engine component. The
//! graph itself stays with the caller: every call takes a snapshot and hands
//! back a new one.

use std::sync::Arc;

use crate::adaptation::{
    AdaptationEngine, AdaptationPhase, AdaptationRule, ChangeExecutor, ChangeId, ChangeIdGenerator,
    ChangeOutcome, ChangeRecord, OptimizationGoal, TopologyChange, Urgency,
};
use crate::config::EngineConfig;
use crate::engine::belief::BayesianUpdate;
use crate::engine::errors::EngineError;
use crate::engine::graph::GraphModel;
use crate::engine::propagation::{
    Evidence, PropagationMetrics, RejectedEvidence, UncertaintyPropagator,
};
use crate::engine::uncertainty::UncertaintyReport;
use crate::metrics::{MetricsCalculator, TopologyState};

/// Everything produced by one evidence ingestion.
#[derive(Debug, Clone)]
pub struct EvidenceOutcome {
    /// Graph after propagation and any auto-applied changes
    pub graph: GraphModel,
    pub propagation: PropagationMetrics,
    pub updates: Vec<BayesianUpdate>,
    pub rejected: Vec<RejectedEvidence>,
    /// Structural state of the propagated graph
    pub state: TopologyState,
    pub proposals: Vec<TopologyChange>,
    pub urgency: Urgency,
    /// Outcomes of auto-applied proposals, in priority order
    pub applied: Vec<ChangeOutcome>,
    pub uncertainty: UncertaintyReport,
}

#[derive(Debug)]
pub struct ReasoningSession {
    config: EngineConfig,
    calculator: MetricsCalculator,
    propagator: UncertaintyPropagator,
    adaptation: AdaptationEngine,
    executor: ChangeExecutor,
}

impl ReasoningSession {
    /// Session with the built-in adaptation rules.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        Self::with_rules(config, AdaptationRule::default_rules())
    }

    pub fn with_rules(config: EngineConfig, rules: Vec<AdaptationRule>) -> Result<Self, EngineError> {
        let config = config.validate()?;
        let ids = Arc::new(ChangeIdGenerator::default());
        let calculator = MetricsCalculator::new(config.metrics)?;
        Ok(Self {
            propagator: UncertaintyPropagator::new(config.propagation)?,
            adaptation: AdaptationEngine::new(config.adaptation, rules, Arc::clone(&ids))?,
            executor: ChangeExecutor::new(calculator.clone(), ids)
                .with_cascade_threshold(config.adaptation.cascade_threshold),
            calculator,
            config,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn calculator(&self) -> &MetricsCalculator {
        &self.calculator
    }

    pub fn propagator(&self) -> &UncertaintyPropagator {
        &self.propagator
    }

    pub fn adaptation(&self) -> &AdaptationEngine {
        &self.adaptation
    }

    pub fn executor(&self) -> &ChangeExecutor {
        &self.executor
    }

    /// Propagates evidence, analyzes the result and proposes changes.
    ///
    /// With `auto_apply` enabled and urgency at or above `auto_apply_urgency`,
    /// proposals are applied in priority order; a failed proposal is skipped
    /// and the next one applies to the last successful graph.
    pub fn ingest_evidence(
        &self,
        graph: &GraphModel,
        evidence: &[Evidence],
    ) -> Result<EvidenceOutcome, EngineError> {
        let report = self.propagator.propagate(graph, evidence)?;
        let state = self.calculator.derive_state(&report.graph);
        let triggered = self.adaptation.evaluate(&state);
        self.adaptation.record_observation(&state.metrics);
        let proposals = self.adaptation.propose(&report.graph, &state, &triggered);
        let urgency = self.adaptation.urgency(&state, &proposals);

        let mut current = report.graph;
        let mut applied = Vec::new();
        let adaptation = &self.config.adaptation;
        if adaptation.auto_apply && urgency >= adaptation.auto_apply_urgency && !proposals.is_empty() {
            #[cfg(feature = "tracing")]
            tracing::info!(
                "auto-applying {} proposals at {:?} urgency",
                proposals.len(),
                urgency
            );
            for proposal in &proposals {
                let outcome = self.executor.apply(&current, proposal.clone());
                if outcome.success {
                    current = outcome.graph.clone();
                }
                applied.push(outcome);
            }
            self.settle(applied.iter().any(|o| o.success))?;
        }

        let uncertainty = self.propagator.quantify_uncertainty(&current);
        Ok(EvidenceOutcome {
            graph: current,
            propagation: report.metrics,
            updates: report.updates,
            rejected: report.rejected,
            state,
            proposals,
            urgency,
            applied,
            uncertainty,
        })
    }

    /// Structural state of a snapshot.
    pub fn analyze(&self, graph: &GraphModel) -> TopologyState {
        self.calculator.derive_state(graph)
    }

    /// Proposals steering metrics toward the given goals.
    pub fn optimize(&self, graph: &GraphModel, goals: &[OptimizationGoal]) -> Vec<TopologyChange> {
        let state = self.calculator.derive_state(graph);
        self.adaptation.propose_for_goals(graph, &state, goals)
    }

    pub fn quantify_uncertainty(&self, graph: &GraphModel) -> UncertaintyReport {
        self.propagator.quantify_uncertainty(graph)
    }

    /// Applies one change and settles a pending proposal phase.
    pub fn apply_change(
        &self,
        graph: &GraphModel,
        change: TopologyChange,
    ) -> Result<ChangeOutcome, EngineError> {
        let outcome = self.executor.apply(graph, change);
        self.settle(outcome.success)?;
        Ok(outcome)
    }

    /// Declines the pending proposals.
    pub fn reject_proposals(&self) -> Result<(), EngineError> {
        self.settle(false)
    }

    pub fn revert_change(&self, graph: &GraphModel, id: ChangeId) -> Result<ChangeOutcome, EngineError> {
        self.executor.revert(graph, id)
    }

    pub fn history(&self) -> Vec<ChangeRecord> {
        self.executor.history()
    }

    fn settle(&self, applied: bool) -> Result<(), EngineError> {
        if self.adaptation.phase() != AdaptationPhase::ChangeProposed {
            return Ok(());
        }
        self.adaptation.transition(if applied {
            AdaptationPhase::Applied
        } else {
            AdaptationPhase::Rejected
        })?;
        self.adaptation.transition(AdaptationPhase::Monitoring)
    }
}
