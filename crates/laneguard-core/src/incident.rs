//! Incidents - one accident detection under active processing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Coordinates, DecisionStatus, FramePolygon, IncidentId, LaneguardError, LaneguardResult, NodeId,
};

/// Detection as submitted by an edge node
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentReport {
    pub coordinates: Option<Coordinates>,
    pub lane_number: Option<u32>,
    pub node_id: NodeId,
    #[serde(default)]
    pub media_refs: Vec<String>,
    /// Outline of the accident in the node's camera frame
    #[serde(default)]
    pub accident_polygon: Option<FramePolygon>,
    /// Classifier severity, 1 (minor) to 5 (critical)
    #[serde(default)]
    pub severity: Option<u8>,
    /// Classifier recommendation tags
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl IncidentReport {
    pub fn new(node_id: impl Into<NodeId>, coordinates: Coordinates) -> Self {
        IncidentReport {
            coordinates: Some(coordinates),
            lane_number: None,
            node_id: node_id.into(),
            media_refs: Vec::new(),
            accident_polygon: None,
            severity: None,
            recommendations: Vec::new(),
        }
    }

    pub fn with_lane_number(mut self, lane_number: u32) -> Self {
        self.lane_number = Some(lane_number);
        self
    }

    pub fn with_polygon(mut self, polygon: FramePolygon) -> Self {
        self.accident_polygon = Some(polygon);
        self
    }

    pub fn with_severity(mut self, severity: u8) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_recommendation(mut self, tag: impl Into<String>) -> Self {
        self.recommendations.push(tag.into());
        self
    }

    pub fn with_media(mut self, media_ref: impl Into<String>) -> Self {
        self.media_refs.push(media_ref.into());
        self
    }

    /// Structural checks done before any decision state is created.
    /// Polygon shape is not checked here; a bad polygon degrades to
    /// "no match" inside the analyzer instead.
    pub fn validate(&self) -> LaneguardResult<Coordinates> {
        if self.node_id.is_empty() {
            return Err(LaneguardError::validation("nodeId is required"));
        }
        let coordinates = self
            .coordinates
            .ok_or_else(|| LaneguardError::validation("coordinates are required"))?;
        coordinates.validate()?;
        if let Some(severity) = self.severity {
            if !(1..=5).contains(&severity) {
                return Err(LaneguardError::validation(format!(
                    "severity {} outside 1..=5",
                    severity
                )));
            }
        }
        Ok(coordinates)
    }
}

/// Incident record, alive from ingestion until it is resolved and notified
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: IncidentId,
    pub node_id: NodeId,
    pub coordinates: Coordinates,
    pub lane_number: Option<u32>,
    pub media_refs: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub status: DecisionStatus,
}

impl Incident {
    /// Build a PENDING incident from a validated report
    pub fn from_report(
        report: &IncidentReport,
        coordinates: Coordinates,
        created_at: DateTime<Utc>,
    ) -> Self {
        Incident {
            id: IncidentId::generate(&report.node_id, created_at),
            node_id: report.node_id.clone(),
            coordinates,
            lane_number: report.lane_number,
            media_refs: report.media_refs.clone(),
            created_at,
            status: DecisionStatus::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_requires_coordinates() {
        let mut report = IncidentReport::new("N1", Coordinates::new(10.0, 20.0));
        report.coordinates = None;
        assert!(matches!(
            report.validate(),
            Err(LaneguardError::Validation(_))
        ));
    }

    #[test]
    fn test_report_requires_node() {
        let report = IncidentReport::new("  ", Coordinates::new(10.0, 20.0));
        assert!(report.validate().is_err());
    }

    #[test]
    fn test_report_severity_range() {
        let report = IncidentReport::new("N1", Coordinates::new(10.0, 20.0)).with_severity(6);
        assert!(report.validate().is_err());

        let report = IncidentReport::new("N1", Coordinates::new(10.0, 20.0)).with_severity(5);
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_incident_starts_pending() {
        let report = IncidentReport::new("N1", Coordinates::new(10.0, 20.0))
            .with_lane_number(2)
            .with_media("frame-001.jpg");
        let coords = report.validate().unwrap();
        let incident = Incident::from_report(&report, coords, Utc::now());

        assert_eq!(incident.status, DecisionStatus::Pending);
        assert_eq!(incident.lane_number, Some(2));
        assert!(incident.id.as_str().starts_with("N1-"));
        assert_eq!(incident.media_refs, vec!["frame-001.jpg".to_string()]);
    }
}
