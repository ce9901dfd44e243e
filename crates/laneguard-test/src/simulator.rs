//! Simulated participants
//!
//! - `SimulatedEdgeNode`: a camera node watching N vertical lanes
//! - `SimulatedOperator`: answers dashboard incidents by policy
//! - `RecordingNotifier`: stands in for the cooperating incident system

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rand::Rng;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::debug;

use laneguard_core::{
    Coordinates, DecisionStatus, DecisionSubmission, FramePolygon, Heartbeat, IncidentId,
    IncidentReport, Lane, LaneguardError, LanePolygon, Node, NodeId, ReportedStatus,
};
use laneguard_runtime::{
    DashboardEvent, EventSource, NotifyFuture, NotifySink, Orchestrator, OutboundNotification,
};

pub const FRAME_WIDTH: f64 = 1920.0;
pub const FRAME_HEIGHT: f64 = 1080.0;

// ============================================================================
// EDGE NODE
// ============================================================================

/// A roadside camera node over a straight multi-lane road
#[derive(Clone, Debug)]
pub struct SimulatedEdgeNode {
    pub node: Node,
    pub position: Coordinates,
}

impl SimulatedEdgeNode {
    /// `lanes` equal-width vertical lanes filling the frame
    pub fn highway(id: impl Into<NodeId>, lanes: usize, speed_limit: u32) -> Self {
        let width = FRAME_WIDTH / lanes.max(1) as f64;
        let lane_records = (1..=lanes)
            .map(|i| Lane::new(format!("L{}", i), format!("Lane {}", i)))
            .collect();
        let polygons = (0..lanes)
            .map(|i| {
                let x0 = i as f64 * width;
                LanePolygon::new(
                    format!("P{}", i + 1),
                    format!("Lane {}", i + 1),
                    rect(x0, 0.0, x0 + width, FRAME_HEIGHT),
                )
            })
            .collect();

        SimulatedEdgeNode {
            node: Node::new(id, speed_limit)
                .with_lanes(lane_records)
                .with_lane_polygons(polygons),
            position: Coordinates::new(37.5665, 126.9780),
        }
    }

    pub fn at(mut self, position: Coordinates) -> Self {
        self.position = position;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.node.id
    }

    pub fn lane_count(&self) -> usize {
        self.node.lanes.len()
    }

    fn lane_width(&self) -> f64 {
        FRAME_WIDTH / self.lane_count().max(1) as f64
    }

    /// Accident box in the middle half of lane `lane` (1-indexed)
    pub fn accident_in_lane(&self, lane: u32) -> FramePolygon {
        let width = self.lane_width();
        let x0 = (lane.max(1) - 1) as f64 * width;
        rect(x0 + width * 0.25, 400.0, x0 + width * 0.75, 700.0)
    }

    /// Accident box straddling the boundary between `lane` and `lane + 1`
    pub fn accident_between(&self, lane: u32) -> FramePolygon {
        let width = self.lane_width();
        let edge = lane as f64 * width;
        rect(edge - width * 0.3, 400.0, edge + width * 0.3, 700.0)
    }

    pub fn report_in_lane(&self, lane: u32) -> IncidentReport {
        IncidentReport::new(self.node.id.clone(), self.position)
            .with_lane_number(lane)
            .with_polygon(self.accident_in_lane(lane))
            .with_media(format!("media/{}/{}.jpg", self.node.id, lane))
    }

    /// Same as `report_in_lane` with the box jittered inside the lane
    pub fn random_report<R: Rng>(&self, rng: &mut R) -> IncidentReport {
        let lane = rng.gen_range(1..=self.lane_count().max(1) as u32);
        let width = self.lane_width();
        let x0 = (lane - 1) as f64 * width;
        let cx = x0 + width * rng.gen_range(0.3..0.7);
        let cy = rng.gen_range(200.0..900.0);
        let half = width * 0.15;

        let mut report = IncidentReport::new(self.node.id.clone(), self.position)
            .with_lane_number(lane)
            .with_polygon(rect(cx - half, cy - half, cx + half, cy + half));
        if rng.gen_bool(0.3) {
            report = report.with_severity(rng.gen_range(1..=5));
        }
        report
    }

    pub fn heartbeat(&self, status: ReportedStatus, at: DateTime<Utc>) -> Heartbeat {
        Heartbeat {
            node_id: self.node.id.clone(),
            status,
            timestamp: at,
        }
    }
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> FramePolygon {
    FramePolygon::from_tuples(
        &[(x0, y0), (x1, y0), (x1, y1), (x0, y1)],
        FRAME_WIDTH,
        FRAME_HEIGHT,
    )
}

// ============================================================================
// OPERATOR
// ============================================================================

/// How the simulated operator answers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorPolicy {
    /// Confirm with the proposed actions
    Confirm,
    Reject,
    /// Never answer; every incident times out
    Ignore,
    /// Confirm, reject, ignore in turn
    Rotate,
}

/// Dashboard operator driven by the broadcast stream
pub struct SimulatedOperator {
    handle: JoinHandle<()>,
    answered: Arc<Mutex<Vec<(IncidentId, DecisionStatus)>>>,
}

impl SimulatedOperator {
    pub fn spawn(
        orchestrator: Arc<Orchestrator>,
        policy: OperatorPolicy,
        think_time: Duration,
    ) -> Self {
        let answered = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&answered);
        let mut events = orchestrator.subscribe();

        let handle = tokio::spawn(async move {
            let mut seen = 0usize;
            loop {
                let detected = match events.recv().await {
                    Ok(DashboardEvent::AccidentDetected(d)) if d.source == EventSource::Edge => d,
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        debug!(missed = n, "operator lagged behind dashboard");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                let (Some(incident_id), Some(node_id)) = (detected.incident_id, detected.node_id)
                else {
                    continue;
                };

                let status = match policy {
                    OperatorPolicy::Confirm => Some(DecisionStatus::Confirmed),
                    OperatorPolicy::Reject => Some(DecisionStatus::Rejected),
                    OperatorPolicy::Ignore => None,
                    OperatorPolicy::Rotate => match seen % 3 {
                        0 => Some(DecisionStatus::Confirmed),
                        1 => Some(DecisionStatus::Rejected),
                        _ => None,
                    },
                };
                seen += 1;
                let Some(status) = status else {
                    continue;
                };

                let orchestrator = Arc::clone(&orchestrator);
                let log = Arc::clone(&log);
                let actions = detected.proposal.map(|p| p.actions).unwrap_or_default();
                tokio::spawn(async move {
                    tokio::time::sleep(think_time).await;
                    let submission = DecisionSubmission {
                        incident_id: incident_id.clone(),
                        node_id,
                        status,
                        actions,
                        message: None,
                    };
                    if orchestrator.submit_decision(submission).is_ok() {
                        log.lock().push((incident_id, status));
                    }
                });
            }
        });

        SimulatedOperator { handle, answered }
    }

    /// Decisions that were accepted by the coordinator
    pub fn answered(&self) -> Vec<(IncidentId, DecisionStatus)> {
        self.answered.lock().clone()
    }

    pub fn stop(self) -> Vec<(IncidentId, DecisionStatus)> {
        self.handle.abort();
        self.answered()
    }
}

// ============================================================================
// COOPERATING SYSTEM
// ============================================================================

/// Records every outbound notification; optionally fails each one
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<OutboundNotification>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepts the request then answers like a 503
    pub fn failing() -> Self {
        RecordingNotifier {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutboundNotification> {
        self.sent.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }
}

impl NotifySink for RecordingNotifier {
    fn notify<'a>(&'a self, notification: &'a OutboundNotification) -> NotifyFuture<'a> {
        Box::pin(async move {
            notification.validate()?;
            self.sent.lock().push(notification.clone());
            if self.fail {
                return Err(LaneguardError::ExternalNotify("503 Service Unavailable".into()));
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laneguard_geometry::{analyze, blocked_lane_numbers};
    use proptest::prelude::*;
    use rand::SeedableRng;

    #[test]
    fn test_highway_layout() {
        let edge = SimulatedEdgeNode::highway("N1", 4, 100);
        assert_eq!(edge.lane_count(), 4);
        assert_eq!(edge.node.lane_polygons.len(), 4);
        assert_eq!(edge.node.lanes[3].id, "L4");
    }

    #[test]
    fn test_accident_in_lane_hits_only_that_lane() {
        let edge = SimulatedEdgeNode::highway("N1", 3, 120);
        for lane in 1..=3 {
            let blocked = analyze(&edge.accident_in_lane(lane), &edge.node.lane_polygons);
            assert_eq!(blocked_lane_numbers(&blocked), vec![lane]);
        }
    }

    #[test]
    fn test_accident_between_hits_two_lanes() {
        let edge = SimulatedEdgeNode::highway("N1", 3, 120);
        let blocked = analyze(&edge.accident_between(1), &edge.node.lane_polygons);
        assert_eq!(blocked_lane_numbers(&blocked), vec![1, 2]);
    }

    #[test]
    fn test_random_reports_stay_in_reported_lane() {
        let edge = SimulatedEdgeNode::highway("N1", 3, 120);
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let report = edge.random_report(&mut rng);
            assert!(report.validate().is_ok());
            let polygon = report.accident_polygon.as_ref().unwrap();
            let blocked = blocked_lane_numbers(&analyze(polygon, &edge.node.lane_polygons));
            assert_eq!(blocked, vec![report.lane_number.unwrap()]);
        }
    }

    proptest! {
        #[test]
        fn test_accident_in_lane_any_layout(lanes in 1usize..10, pick in 0usize..10) {
            let lane = (pick % lanes) as u32 + 1;
            let edge = SimulatedEdgeNode::highway("N1", lanes, 100);
            let blocked = analyze(&edge.accident_in_lane(lane), &edge.node.lane_polygons);
            prop_assert_eq!(blocked_lane_numbers(&blocked), vec![lane]);
        }
    }
}
