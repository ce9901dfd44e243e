//! Operator decisions, roadside actions and display payloads

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{IncidentId, LaneguardError, LaneguardResult, NodeId};

/// Resolution state of an incident
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DecisionStatus {
    #[default]
    Pending,
    Confirmed,
    Rejected,
    Timeout,
}

impl DecisionStatus {
    /// Everything except PENDING is terminal
    pub fn is_terminal(self) -> bool {
        !matches!(self, DecisionStatus::Pending)
    }
}

impl fmt::Display for DecisionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionStatus::Pending => "PENDING",
            DecisionStatus::Confirmed => "CONFIRMED",
            DecisionStatus::Rejected => "REJECTED",
            DecisionStatus::Timeout => "TIMEOUT",
        };
        f.write_str(s)
    }
}

/// Roadside response actions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    CloseLanes,
    ReduceSpeedLimit,
    AlertEmergencyServices,
    DisplayMergeSigns,
}

/// The outcome delivered to whoever waits on an incident
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub status: DecisionStatus,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Decision {
    pub fn confirmed(actions: Vec<Action>) -> Self {
        Decision {
            status: DecisionStatus::Confirmed,
            actions,
            message: None,
        }
    }

    pub fn rejected() -> Self {
        Decision {
            status: DecisionStatus::Rejected,
            actions: Vec::new(),
            message: None,
        }
    }

    /// Synthetic decision produced when nobody answered in time
    pub fn timed_out() -> Self {
        Decision {
            status: DecisionStatus::Timeout,
            actions: Vec::new(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == DecisionStatus::Confirmed
    }
}

/// Operator verdict as submitted from the dashboard
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSubmission {
    pub incident_id: IncidentId,
    pub node_id: NodeId,
    pub status: DecisionStatus,
    #[serde(default)]
    pub actions: Vec<Action>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DecisionSubmission {
    /// Operators may only confirm or reject
    pub fn into_decision(self) -> LaneguardResult<(IncidentId, Decision)> {
        if self.incident_id.is_empty() {
            return Err(LaneguardError::validation("incidentId is required"));
        }
        match self.status {
            DecisionStatus::Confirmed | DecisionStatus::Rejected => Ok((
                self.incident_id,
                Decision {
                    status: self.status,
                    actions: self.actions,
                    message: self.message,
                },
            )),
            other => Err(LaneguardError::validation(format!(
                "operator status must be CONFIRMED or REJECTED, got {}",
                other
            ))),
        }
    }
}

/// Per-lane instruction shown on the roadside display
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LaneDirective {
    #[default]
    Open,
    Blocked,
    Left,
    Right,
}

impl LaneDirective {
    pub fn as_str(self) -> &'static str {
        match self {
            LaneDirective::Open => "open",
            LaneDirective::Blocked => "blocked",
            LaneDirective::Left => "left",
            LaneDirective::Right => "right",
        }
    }

    pub fn is_merge(self) -> bool {
        matches!(self, LaneDirective::Left | LaneDirective::Right)
    }
}

impl fmt::Display for LaneDirective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AlertLevel {
    Medium,
    High,
}

/// Payload pushed to a node's roadside display
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDisplay {
    pub message: String,
    pub speed_limit: u32,
    pub lane_configuration: String,
    pub alert_level: AlertLevel,
    pub duration_secs: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_wire_names() {
        let json = serde_json::to_string(&vec![
            Action::CloseLanes,
            Action::ReduceSpeedLimit,
            Action::AlertEmergencyServices,
            Action::DisplayMergeSigns,
        ])
        .unwrap();
        assert_eq!(
            json,
            r#"["CLOSE_LANES","REDUCE_SPEED_LIMIT","ALERT_EMERGENCY_SERVICES","DISPLAY_MERGE_SIGNS"]"#
        );
    }

    #[test]
    fn test_submission_rejects_non_operator_status() {
        let submission = DecisionSubmission {
            incident_id: IncidentId::new("i-1"),
            node_id: NodeId::new("N1"),
            status: DecisionStatus::Timeout,
            actions: vec![],
            message: None,
        };
        assert!(matches!(
            submission.into_decision(),
            Err(LaneguardError::Validation(_))
        ));
    }

    #[test]
    fn test_submission_parses_wire_body() {
        let json = r#"{
            "incidentId": "N1-1-00000000",
            "nodeId": "N1",
            "status": "CONFIRMED",
            "actions": ["CLOSE_LANES"],
            "message": "ok"
        }"#;
        let submission: DecisionSubmission = serde_json::from_str(json).unwrap();
        let (id, decision) = submission.into_decision().unwrap();

        assert_eq!(id.as_str(), "N1-1-00000000");
        assert!(decision.is_confirmed());
        assert_eq!(decision.actions, vec![Action::CloseLanes]);
        assert_eq!(decision.message.as_deref(), Some("ok"));
    }

    #[test]
    fn test_timed_out_decision_has_no_actions() {
        let d = Decision::timed_out();
        assert_eq!(d.status, DecisionStatus::Timeout);
        assert!(d.actions.is_empty());
        assert!(d.status.is_terminal());
        assert!(!DecisionStatus::Pending.is_terminal());
    }
}
