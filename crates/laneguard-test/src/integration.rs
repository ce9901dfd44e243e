//! End-to-end scenario suite
//!
//! Drives the full orchestrator with simulated edge nodes, a simulated
//! operator and a recording cooperating system, then checks:
//! - every incident resolves exactly once
//! - no pending decision survives the run
//! - exactly the confirmed incidents are notified outbound
//! - echoes of our own notifications are suppressed

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;

use laneguard_core::{Coordinates, DecisionStatus, IncidentId, ReportedStatus};
use laneguard_runtime::{
    DashboardEvent, ExternalReport, IngestOutcome, Orchestrator, RelayOutcome, RuntimeConfig,
};

use crate::simulator::{OperatorPolicy, RecordingNotifier, SimulatedEdgeNode, SimulatedOperator};

// ============================================================================
// CONFIG
// ============================================================================

#[derive(Clone, Debug)]
pub struct ScenarioConfig {
    pub node_count: usize,
    pub lanes_per_node: usize,
    pub incidents_per_node: usize,
    pub policy: OperatorPolicy,
    pub think_time: Duration,
    pub decision_timeout: Duration,
    /// Seed for accident placement
    pub seed: u64,
}

impl ScenarioConfig {
    /// One node, one incident
    pub fn minimal() -> Self {
        Self {
            node_count: 1,
            lanes_per_node: 3,
            incidents_per_node: 1,
            policy: OperatorPolicy::Confirm,
            think_time: Duration::from_millis(500),
            decision_timeout: Duration::from_secs(30),
            seed: 1,
        }
    }

    /// Several nodes with overlapping incidents, mixed operator answers
    pub fn standard() -> Self {
        Self {
            node_count: 4,
            lanes_per_node: 3,
            incidents_per_node: 6,
            policy: OperatorPolicy::Rotate,
            think_time: Duration::from_secs(2),
            decision_timeout: Duration::from_secs(30),
            seed: 42,
        }
    }

    /// Operator answers right around the deadline
    pub fn racing() -> Self {
        Self {
            node_count: 2,
            lanes_per_node: 4,
            incidents_per_node: 10,
            policy: OperatorPolicy::Confirm,
            think_time: Duration::from_secs(30),
            decision_timeout: Duration::from_secs(30),
            seed: 7,
        }
    }

    pub fn with_policy(mut self, policy: OperatorPolicy) -> Self {
        self.policy = policy;
        self
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Clone, Debug, Default)]
pub struct ScenarioResult {
    pub outcomes: Vec<IngestOutcome>,
    pub ingest_errors: usize,
    pub confirmed: usize,
    pub rejected: usize,
    pub timed_out: usize,
    pub notifications: usize,
    pub echoes_suppressed: usize,
    pub violations: Vec<String>,
}

impl ScenarioResult {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }

    fn count(&mut self, status: DecisionStatus) {
        match status {
            DecisionStatus::Confirmed => self.confirmed += 1,
            DecisionStatus::Rejected => self.rejected += 1,
            DecisionStatus::Timeout => self.timed_out += 1,
            DecisionStatus::Pending => self
                .violations
                .push("ingest returned a PENDING decision".to_string()),
        }
    }
}

// ============================================================================
// HARNESS
// ============================================================================

pub struct ScenarioHarness {
    config: ScenarioConfig,
    orchestrator: Arc<Orchestrator>,
    notifier: Arc<RecordingNotifier>,
    nodes: Vec<SimulatedEdgeNode>,
}

impl ScenarioHarness {
    pub fn new(config: ScenarioConfig) -> Self {
        Self::with_notifier(config, Arc::new(RecordingNotifier::new()))
    }

    pub fn with_notifier(config: ScenarioConfig, notifier: Arc<RecordingNotifier>) -> Self {
        let runtime = RuntimeConfig {
            decision_timeout: config.decision_timeout,
            ..RuntimeConfig::default()
        };
        let orchestrator = Arc::new(Orchestrator::new(&runtime, notifier.clone()));

        // spread nodes ~1 km apart so their suppression keys differ
        let nodes = (0..config.node_count)
            .map(|i| {
                SimulatedEdgeNode::highway(format!("N{}", i + 1), config.lanes_per_node, 120)
                    .at(Coordinates::new(37.50 + i as f64 * 0.01, 127.0))
            })
            .collect();

        ScenarioHarness {
            config,
            orchestrator,
            notifier,
            nodes,
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn notifier(&self) -> &RecordingNotifier {
        &self.notifier
    }

    pub fn nodes(&self) -> &[SimulatedEdgeNode] {
        &self.nodes
    }

    /// Register every node and bring it ONLINE
    pub fn bring_up(&self) {
        let now = Utc::now();
        for edge in &self.nodes {
            if self.orchestrator.register_node(edge.node.clone()).is_err() {
                continue;
            }
            let _ = self
                .orchestrator
                .heartbeat(&edge.heartbeat(ReportedStatus::Online, now));
        }
    }

    pub async fn run(&mut self) -> ScenarioResult {
        let mut result = ScenarioResult::default();
        let mut events = self.orchestrator.subscribe();

        self.bring_up();
        let operator = SimulatedOperator::spawn(
            Arc::clone(&self.orchestrator),
            self.config.policy,
            self.config.think_time,
        );

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let mut ingests = Vec::new();
        for _ in 0..self.config.incidents_per_node {
            for edge in &self.nodes {
                let report = edge.random_report(&mut rng);
                let orchestrator = Arc::clone(&self.orchestrator);
                ingests.push(tokio::spawn(async move { orchestrator.ingest(report).await }));
            }
        }

        for ingest in ingests {
            match ingest.await {
                Ok(Ok(outcome)) => {
                    result.count(outcome.decision.status);
                    result.outcomes.push(outcome);
                }
                Ok(Err(_)) => result.ingest_errors += 1,
                Err(e) => result.violations.push(format!("ingest task failed: {}", e)),
            }
        }
        operator.stop();

        // let detached notifications finish
        tokio::time::sleep(Duration::from_millis(50)).await;
        result.notifications = self.notifier.count();

        // the cooperating system echoes everything back
        for sent in self.notifier.sent() {
            let echo = ExternalReport {
                accident_id: Some(format!("peer-{}", sent.accident_id)),
                occurred_at: None,
                location: sent.location,
                node_id: None,
            };
            if let Ok(RelayOutcome::Suppressed) = self.orchestrator.relay_external_report(echo) {
                result.echoes_suppressed += 1;
            }
        }

        self.check_invariants(&mut result, &mut events);
        result
    }

    fn check_invariants(
        &self,
        result: &mut ScenarioResult,
        events: &mut tokio::sync::broadcast::Receiver<DashboardEvent>,
    ) {
        let expected = self.config.node_count * self.config.incidents_per_node;
        if result.outcomes.len() + result.ingest_errors != expected {
            result.violations.push(format!(
                "{} incidents submitted, {} came back",
                expected,
                result.outcomes.len() + result.ingest_errors
            ));
        }

        let mut resolutions: HashMap<IncidentId, usize> = HashMap::new();
        while let Ok(event) = events.try_recv() {
            if let DashboardEvent::AccidentResolved { incident_id, .. } = event {
                *resolutions.entry(incident_id).or_default() += 1;
            }
        }
        for outcome in &result.outcomes {
            match resolutions.get(&outcome.incident_id) {
                Some(1) => {}
                Some(n) => result
                    .violations
                    .push(format!("{} resolved {} times", outcome.incident_id, n)),
                None => result
                    .violations
                    .push(format!("{} never announced its resolution", outcome.incident_id)),
            }
        }

        let pending = self.orchestrator.coordinator().pending_count();
        if pending != 0 {
            result
                .violations
                .push(format!("{} decisions still pending", pending));
        }

        if result.notifications != result.confirmed {
            result.violations.push(format!(
                "{} confirmed but {} notified",
                result.confirmed, result.notifications
            ));
        }

        let leaked = result
            .outcomes
            .iter()
            .filter(|o| self.orchestrator.incident(&o.incident_id).is_some())
            .count();
        if leaked != 0 {
            result
                .violations
                .push(format!("{} incidents retained after resolution", leaked));
        }
    }
}

// ============================================================================
// SCENARIOS
// ============================================================================

/// Single incident, confirmed
pub async fn run_minimal_scenario() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::minimal()).run().await
}

/// Concurrent incidents across nodes with mixed answers
pub async fn run_standard_scenario() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::standard()).run().await
}

/// Every answer lands on the deadline
pub async fn run_racing_scenario() -> ScenarioResult {
    ScenarioHarness::new(ScenarioConfig::racing()).run().await
}
