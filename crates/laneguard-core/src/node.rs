//! Edge node model - lanes, calibrated lane polygons, liveness

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{FramePolygon, LaneDirective, NodeDisplay, NodeId};

/// One traffic lane as stored on a node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lane {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "Lane::default_type")]
    pub lane_type: String,
    #[serde(default)]
    pub status: LaneDirective,
}

impl Lane {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Lane {
            id: id.into(),
            name: name.into(),
            lane_type: Self::default_type(),
            status: LaneDirective::Open,
        }
    }

    fn default_type() -> String {
        "normal".to_string()
    }
}

/// Calibrated footprint of one lane in a camera frame
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LanePolygon {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub shape: FramePolygon,
}

impl LanePolygon {
    pub fn new(id: impl Into<String>, name: impl Into<String>, shape: FramePolygon) -> Self {
        LanePolygon {
            id: id.into(),
            name: name.into(),
            shape,
        }
    }
}

/// Liveness state of an edge node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Online,
    #[default]
    Offline,
}

/// Edge sensor node record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default)]
    pub lanes: Vec<Lane>,
    #[serde(default)]
    pub lane_polygons: Vec<LanePolygon>,
    /// Posted limit in km/h
    pub speed_limit: u32,
    #[serde(default)]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: NodeStatus,
    /// What the roadside display currently shows, if anything
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<NodeDisplay>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, speed_limit: u32) -> Self {
        Node {
            id: id.into(),
            lanes: Vec::new(),
            lane_polygons: Vec::new(),
            speed_limit,
            last_heartbeat: None,
            status: NodeStatus::Offline,
            display: None,
        }
    }

    pub fn with_lanes(mut self, lanes: Vec<Lane>) -> Self {
        self.lanes = lanes;
        self
    }

    pub fn with_lane_polygons(mut self, polygons: Vec<LanePolygon>) -> Self {
        self.lane_polygons = polygons;
        self
    }

    pub fn with_status(mut self, status: NodeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_online(&self) -> bool {
        self.status == NodeStatus::Online
    }
}

/// Status an edge node reports about itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportedStatus {
    Online,
    Offline,
}

/// Periodic liveness signal from an edge node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    pub node_id: NodeId,
    pub status: ReportedStatus,
    /// Sender-side time; ordering between heartbeats uses this, not arrival
    pub timestamp: DateTime<Utc>,
}
