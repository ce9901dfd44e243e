//! Incident orchestrator
//!
//! Wires one detection through the pipeline:
//! validate, analyze lanes, compute the plan, announce the incident,
//! wait for the operator (or the timeout), apply the outcome, then send
//! the outbound notification on a detached task.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use laneguard_coordinator::{
    DecisionCoordinator, InMemoryIncidentStore, IncidentStore, NotificationSuppressor,
};
use laneguard_core::{
    Coordinates, Decision, DecisionSubmission, Heartbeat, Incident, IncidentId, IncidentReport,
    LaneguardError, LaneguardResult, Node, NodeDisplay, NodeId,
};
use laneguard_decision::{calculate, DecisionPlan, PlanInput};
use laneguard_geometry::{analyze, blocked_lane_numbers};
use laneguard_liveness::{HeartbeatOutcome, LivenessMonitor, LivenessTransition};

use crate::{
    AccidentDetected, DashboardEvent, DisabledNotifier, DisconnectReason, EventHub, EventSource,
    HttpNotifier, NotifySink, OutboundNotification, RuntimeConfig,
};

/// What the ingesting edge node gets back once the incident is resolved
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestOutcome {
    pub incident_id: IncidentId,
    /// Limit now in force on the node
    pub speed_limit: u32,
    /// Present only when the plan was confirmed
    pub node_display: Option<NodeDisplay>,
    pub decision: Decision,
}

/// Report pushed to us by the cooperating incident system
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalReport {
    #[serde(default)]
    pub accident_id: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
    pub location: Coordinates,
    #[serde(default)]
    pub node_id: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelayOutcome {
    Relayed,
    Suppressed,
}

/// Blocked lane numbers for a report: polygon overlap first, the reported
/// lane number when there is no polygon or nothing overlaps.
pub fn blocked_lanes_for(report: &IncidentReport, node: &Node) -> Vec<u32> {
    let lane_count = node.lanes.len() as u32;
    let mut blocked = match &report.accident_polygon {
        Some(polygon) => blocked_lane_numbers(&analyze(polygon, &node.lane_polygons)),
        None => Vec::new(),
    };
    // polygon names may number lanes the node does not have
    blocked.retain(|n| {
        let known = (1..=lane_count).contains(n);
        if !known {
            warn!(node_id = %node.id, lane = *n, lane_count, "polygon lane number out of range");
        }
        known
    });
    if blocked.is_empty() {
        if let Some(lane) = report.lane_number.filter(|n| (1..=lane_count).contains(n)) {
            debug!(node_id = %node.id, lane, "no polygon match; using reported lane");
            blocked.push(lane);
        }
    }
    blocked
}

pub struct Orchestrator {
    coordinator: DecisionCoordinator,
    suppressor: Arc<NotificationSuppressor>,
    incidents: Arc<dyn IncidentStore>,
    nodes: LivenessMonitor,
    events: EventHub,
    notifier: Arc<dyn NotifySink>,
    notify_timeout: Duration,
}

impl Orchestrator {
    /// Orchestrator over in-memory stores and the given notifier
    pub fn new(config: &RuntimeConfig, notifier: Arc<dyn NotifySink>) -> Self {
        Orchestrator {
            coordinator: DecisionCoordinator::new(config.decision_timeout),
            suppressor: Arc::new(NotificationSuppressor::new(config.suppression_ttl)),
            incidents: Arc::new(InMemoryIncidentStore::new()),
            nodes: LivenessMonitor::new(config.liveness_threshold),
            events: EventHub::new(config.broadcast_capacity),
            notifier,
            notify_timeout: config.notify.timeout,
        }
    }

    /// Picks the HTTP notifier when an endpoint is configured
    pub fn from_config(config: &RuntimeConfig) -> LaneguardResult<Self> {
        let notifier: Arc<dyn NotifySink> = match &config.notify.endpoint {
            Some(endpoint) => Arc::new(HttpNotifier::new(endpoint.as_str(), config.notify.timeout)?),
            None => {
                warn!("no notify endpoint configured; outbound notifications disabled");
                Arc::new(DisabledNotifier)
            }
        };
        Ok(Self::new(config, notifier))
    }

    pub fn coordinator(&self) -> &DecisionCoordinator {
        &self.coordinator
    }

    pub fn suppressor(&self) -> &NotificationSuppressor {
        &self.suppressor
    }

    pub fn nodes(&self) -> &LivenessMonitor {
        &self.nodes
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn incident(&self, id: &IncidentId) -> Option<Incident> {
        self.incidents.get(id)
    }

    /// Run one detection to resolution. Returns once the operator decided
    /// or the decision timed out.
    pub async fn ingest(&self, report: IncidentReport) -> LaneguardResult<IngestOutcome> {
        let coordinates = report.validate()?;
        let node = self.nodes.get(&report.node_id)?;

        let incident = Incident::from_report(&report, coordinates, Utc::now());
        let id = incident.id.clone();
        self.incidents.insert(incident.clone())?;

        let blocked = blocked_lanes_for(&report, &node);
        let plan = calculate(PlanInput {
            lanes: &node.lanes,
            blocked: &blocked,
            severity: report.severity,
            recommendations: &report.recommendations,
            speed_limit: node.speed_limit,
        });

        // the wait must exist before the operator can see the incident
        let waiter = match self
            .coordinator
            .register(id.clone(), self.coordinator.default_timeout())
        {
            Ok(waiter) => waiter,
            Err(e) => {
                self.incidents.remove(&id);
                return Err(e);
            }
        };

        info!(
            incident_id = %id,
            node_id = %node.id,
            blocked = ?plan.blocked_lanes,
            configuration = %plan.lane_configuration,
            speed = plan.speed.adjusted,
            "incident awaiting operator"
        );
        self.events
            .publish(DashboardEvent::AccidentDetected(AccidentDetected {
                incident_id: Some(id.clone()),
                node_id: Some(node.id.clone()),
                coordinates,
                lane_number: report.lane_number,
                media_list: incident.media_refs.clone(),
                timestamp: incident.created_at,
                source: EventSource::Edge,
                proposal: Some(plan.clone()),
            }));

        let decision = waiter.wait().await;
        Ok(self.finish(incident, &node, plan, decision))
    }

    fn finish(
        &self,
        incident: Incident,
        node: &Node,
        plan: DecisionPlan,
        decision: Decision,
    ) -> IngestOutcome {
        let id = incident.id.clone();
        let incident = match self.incidents.set_status(&id, decision.status) {
            Ok(updated) => updated,
            Err(e) => {
                warn!(incident_id = %id, error = %e, "incident status not recorded");
                incident
            }
        };

        let (speed_limit, node_display) = if decision.is_confirmed() {
            match self.nodes.update(&node.id, |n| plan.apply_to(n)) {
                Ok(updated) => (updated.speed_limit, updated.display),
                Err(e) => {
                    // deregistered while we waited
                    warn!(incident_id = %id, error = %e, "confirmed plan not applied");
                    (plan.speed.adjusted, Some(plan.display.clone()))
                }
            }
        } else {
            (node.speed_limit, None)
        };

        info!(incident_id = %id, status = %decision.status, speed_limit, "incident resolved");
        self.events.publish(DashboardEvent::AccidentResolved {
            incident_id: id.clone(),
            node_id: node.id.clone(),
            status: decision.status,
        });

        if decision.is_confirmed() {
            self.dispatch_notification(incident);
        } else {
            self.incidents.remove(&id);
        }

        IngestOutcome {
            incident_id: id,
            speed_limit,
            node_display,
            decision,
        }
    }

    /// Detached: a slow or failing peer never holds up the resolution path
    fn dispatch_notification(&self, incident: Incident) {
        let suppressor = Arc::clone(&self.suppressor);
        let notifier = Arc::clone(&self.notifier);
        let incidents = Arc::clone(&self.incidents);
        let timeout = self.notify_timeout;

        tokio::spawn(async move {
            let notification = OutboundNotification::for_incident(&incident);
            // mark first so an immediate echo is already suppressed
            suppressor.mark_outbound(incident.coordinates, Some(&incident.node_id));

            let result = match tokio::time::timeout(timeout, notifier.notify(&notification)).await
            {
                Ok(result) => result,
                Err(_) => Err(LaneguardError::Timeout(incident.id.clone())),
            };
            match result {
                Ok(()) => info!(incident_id = %incident.id, "cooperating system notified"),
                Err(LaneguardError::Validation(reason)) => {
                    error!(incident_id = %incident.id, %reason, "notification rejected before send")
                }
                Err(e) => warn!(incident_id = %incident.id, error = %e, "cooperating system notify failed"),
            }
            incidents.remove(&incident.id);
        });
    }

    /// Deliver an operator decision to the waiting incident
    pub fn submit_decision(&self, submission: DecisionSubmission) -> LaneguardResult<()> {
        let node_id = submission.node_id.clone();
        let (id, decision) = submission.into_decision()?;

        if let Some(incident) = self.incidents.get(&id) {
            if !node_id.is_empty() && incident.node_id != node_id {
                return Err(LaneguardError::validation(format!(
                    "incident {} belongs to node {}, not {}",
                    id, incident.node_id, node_id
                )));
            }
        }
        self.coordinator.resolve(&id, decision)
    }

    /// Inbound report from the cooperating system. Echoes of our own
    /// notifications, and repeats within the TTL, are dropped.
    pub fn relay_external_report(&self, report: ExternalReport) -> LaneguardResult<RelayOutcome> {
        report.location.validate()?;

        if !self
            .suppressor
            .should_relay(report.location, report.node_id.as_ref())
        {
            return Ok(RelayOutcome::Suppressed);
        }

        info!(
            accident_id = report.accident_id.as_deref().unwrap_or("-"),
            lat = report.location.lat,
            lng = report.location.lng,
            "relaying external accident report"
        );
        self.events
            .publish(DashboardEvent::AccidentDetected(AccidentDetected {
                incident_id: report.accident_id.map(IncidentId::new),
                node_id: report.node_id,
                coordinates: report.location,
                lane_number: None,
                media_list: Vec::new(),
                timestamp: report.occurred_at.unwrap_or_else(Utc::now),
                source: EventSource::External,
                proposal: None,
            }));
        Ok(RelayOutcome::Relayed)
    }

    pub fn heartbeat(&self, heartbeat: &Heartbeat) -> LaneguardResult<HeartbeatOutcome> {
        let outcome = self.nodes.heartbeat(heartbeat, Utc::now())?;
        if outcome.applied {
            self.events.publish(DashboardEvent::NodeHeartbeat {
                node_id: outcome.node.id.clone(),
                status: outcome.node.status,
                timestamp: heartbeat.timestamp,
            });
        }
        if let Some(t) = &outcome.transition {
            self.publish_transition(t);
        }
        Ok(outcome)
    }

    /// Every node, after the on-read staleness sweep
    pub fn list_nodes(&self) -> Vec<Node> {
        let (nodes, transitions) = self.nodes.list(Utc::now());
        transitions.iter().for_each(|t| self.publish_transition(t));
        nodes
    }

    pub fn sweep_nodes(&self, now: DateTime<Utc>) -> usize {
        let transitions = self.nodes.sweep(now);
        transitions.iter().for_each(|t| self.publish_transition(t));
        transitions.len()
    }

    pub fn get_node(&self, id: &NodeId) -> LaneguardResult<Node> {
        self.nodes.get(id)
    }

    pub fn register_node(&self, node: Node) -> LaneguardResult<Node> {
        self.nodes.register(node)
    }

    pub fn deregister_node(&self, id: &NodeId) -> LaneguardResult<Node> {
        let node = self.nodes.deregister(id)?;
        self.events.publish(DashboardEvent::NodeDisconnected {
            node_id: node.id.clone(),
            at: Utc::now(),
            reason: DisconnectReason::Deregistered,
        });
        Ok(node)
    }

    fn publish_transition(&self, transition: &LivenessTransition) {
        let event = if transition.is_connect() {
            DashboardEvent::NodeConnected {
                node_id: transition.node_id.clone(),
                at: transition.at,
            }
        } else {
            DashboardEvent::NodeDisconnected {
                node_id: transition.node_id.clone(),
                at: transition.at,
                reason: DisconnectReason::Stale,
            }
        };
        self.events.publish(event);
    }

    /// Resolve every waiting incident as TIMEOUT
    pub fn shutdown(&self) -> usize {
        self.coordinator.close_all()
    }
}

/// Background liveness sweep, on top of the sweep done on every read
pub fn spawn_liveness_sweep(orchestrator: Arc<Orchestrator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let offline = orchestrator.sweep_nodes(Utc::now());
            if offline > 0 {
                debug!(offline, "liveness sweep");
            }
        }
    })
}
