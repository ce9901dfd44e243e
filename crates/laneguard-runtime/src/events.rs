//! Dashboard event stream
//!
//! Events fan out over a tokio broadcast channel. Publishing never blocks;
//! a subscriber that falls behind by more than the channel capacity loses
//! the oldest events and sees `RecvError::Lagged`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

use laneguard_core::{Coordinates, DecisionStatus, IncidentId, NodeId, NodeStatus};
use laneguard_decision::DecisionPlan;

/// Where an accident report came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventSource {
    /// One of our edge nodes
    #[default]
    Edge,
    /// The cooperating incident system
    External,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentDetected {
    pub incident_id: Option<IncidentId>,
    pub node_id: Option<NodeId>,
    pub coordinates: Coordinates,
    pub lane_number: Option<u32>,
    pub media_list: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub source: EventSource,
    /// What the operator is asked to confirm; absent for external reports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposal: Option<DecisionPlan>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisconnectReason {
    Stale,
    Deregistered,
}

/// Everything pushed to dashboard subscribers
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum DashboardEvent {
    #[serde(rename = "accident-detected")]
    AccidentDetected(AccidentDetected),

    #[serde(rename = "accident-resolved", rename_all = "camelCase")]
    AccidentResolved {
        incident_id: IncidentId,
        node_id: NodeId,
        status: DecisionStatus,
    },

    #[serde(rename = "node_heartbeat", rename_all = "camelCase")]
    NodeHeartbeat {
        node_id: NodeId,
        status: NodeStatus,
        timestamp: DateTime<Utc>,
    },

    #[serde(rename = "node_connected", rename_all = "camelCase")]
    NodeConnected { node_id: NodeId, at: DateTime<Utc> },

    #[serde(rename = "node_disconnected", rename_all = "camelCase")]
    NodeDisconnected {
        node_id: NodeId,
        at: DateTime<Utc>,
        reason: DisconnectReason,
    },
}

impl DashboardEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            DashboardEvent::AccidentDetected(_) => "accident-detected",
            DashboardEvent::AccidentResolved { .. } => "accident-resolved",
            DashboardEvent::NodeHeartbeat { .. } => "node_heartbeat",
            DashboardEvent::NodeConnected { .. } => "node_connected",
            DashboardEvent::NodeDisconnected { .. } => "node_disconnected",
        }
    }
}

/// Broadcast hub for dashboard events
#[derive(Clone, Debug)]
pub struct EventHub {
    sender: broadcast::Sender<DashboardEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventHub { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DashboardEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of subscribers that received the event
    pub fn publish(&self, event: DashboardEvent) -> usize {
        let name = event.name();
        match self.sender.send(event) {
            Ok(n) => n,
            Err(_) => {
                trace!(event = name, "no dashboard subscribers");
                0
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolved_wire_shape() {
        let event = DashboardEvent::AccidentResolved {
            incident_id: IncidentId::new("N1-1-abcdef01"),
            node_id: NodeId::new("N1"),
            status: DecisionStatus::Timeout,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "accident-resolved",
                "data": {"incidentId": "N1-1-abcdef01", "nodeId": "N1", "status": "TIMEOUT"}
            })
        );
    }

    #[test]
    fn test_detected_wire_shape() {
        let event = DashboardEvent::AccidentDetected(AccidentDetected {
            incident_id: Some(IncidentId::new("i-1")),
            node_id: Some(NodeId::new("N1")),
            coordinates: Coordinates::new(37.5, 127.0),
            lane_number: Some(2),
            media_list: vec!["m/1.jpg".into()],
            timestamp: DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            source: EventSource::Edge,
            proposal: None,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "accident-detected");
        assert_eq!(value["data"]["laneNumber"], 2);
        assert_eq!(value["data"]["mediaList"][0], "m/1.jpg");
        assert_eq!(value["data"]["coordinates"]["lat"], 37.5);
        assert_eq!(value["data"]["source"], "edge");
        assert!(value["data"].get("proposal").is_none());
    }

    #[tokio::test]
    async fn test_publish_fans_out() {
        let hub = EventHub::new(8);
        assert_eq!(
            hub.publish(DashboardEvent::NodeConnected {
                node_id: NodeId::new("N1"),
                at: Utc::now(),
            }),
            0
        );

        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        let event = DashboardEvent::NodeDisconnected {
            node_id: NodeId::new("N1"),
            at: Utc::now(),
            reason: DisconnectReason::Stale,
        };
        assert_eq!(hub.publish(event.clone()), 2);
        assert_eq!(a.recv().await.unwrap(), event);
        assert_eq!(b.recv().await.unwrap(), event);
    }
}
