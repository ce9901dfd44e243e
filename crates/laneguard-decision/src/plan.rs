//! Decision plan - everything proposed to the operator for one incident

use serde::{Deserialize, Serialize};

use laneguard_core::{Action, AlertLevel, Lane, LaneDirective, Node, NodeDisplay};

use crate::{compute_speed, configuration_string, lane_directives, SpeedAdjustment};

/// Seconds the roadside display keeps an incident alert up
pub const DISPLAY_DURATION_SECS: u32 = 300;

/// A speed cut must exceed this many km/h to count as REDUCE_SPEED_LIMIT
pub const SPEED_ACTION_THRESHOLD_KMH: u32 = 20;

/// Severity at or above which emergency services are alerted
pub const EMERGENCY_SEVERITY: u8 = 4;

/// Inputs for one plan computation
#[derive(Clone, Copy, Debug)]
pub struct PlanInput<'a> {
    /// Node lanes in stored order
    pub lanes: &'a [Lane],
    /// Blocked 1-indexed lane numbers
    pub blocked: &'a [u32],
    pub severity: Option<u8>,
    pub recommendations: &'a [String],
    pub speed_limit: u32,
}

/// Proposed roadside response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPlan {
    /// Ids of the blocked lanes, in lane order
    pub blocked_lanes: Vec<String>,
    pub directives: Vec<LaneDirective>,
    pub lane_configuration: String,
    pub speed: SpeedAdjustment,
    pub actions: Vec<Action>,
    pub display: NodeDisplay,
}

fn alert_message(blocked: usize) -> String {
    match blocked {
        0 => "Accident ahead. Proceed with caution.".to_string(),
        1 => "Accident ahead: 1 lane blocked. Reduce speed and merge.".to_string(),
        n => format!("Accident ahead: {} lanes blocked. Reduce speed and merge.", n),
    }
}

impl DecisionPlan {
    /// Push a confirmed plan onto the node record
    pub fn apply_to(&self, node: &mut Node) {
        node.speed_limit = self.speed.adjusted;
        for (lane, directive) in node.lanes.iter_mut().zip(&self.directives) {
            lane.status = *directive;
        }
        node.display = Some(self.display.clone());
    }
}

/// Compute lane layout, speed, actions and display for an incident
pub fn calculate(input: PlanInput<'_>) -> DecisionPlan {
    let directives = lane_directives(input.lanes.len(), input.blocked);
    let lane_configuration = configuration_string(&directives);

    let blocked_lanes: Vec<String> = input
        .lanes
        .iter()
        .zip(&directives)
        .filter(|(_, d)| **d == LaneDirective::Blocked)
        .map(|(lane, _)| lane.id.clone())
        .collect();
    let blocked_count = blocked_lanes.len();

    let speed = compute_speed(
        input.speed_limit,
        blocked_count,
        input.lanes.len(),
        input.severity,
        input.recommendations,
    );

    let mut actions = Vec::new();
    if blocked_count > 0 {
        actions.push(Action::CloseLanes);
    }
    if speed.reduced_by() > SPEED_ACTION_THRESHOLD_KMH {
        actions.push(Action::ReduceSpeedLimit);
    }
    if input.severity.is_some_and(|s| s >= EMERGENCY_SEVERITY) {
        actions.push(Action::AlertEmergencyServices);
    }
    if directives.iter().any(|d| d.is_merge()) {
        actions.push(Action::DisplayMergeSigns);
    }

    let display = NodeDisplay {
        message: alert_message(blocked_count),
        speed_limit: speed.adjusted,
        lane_configuration: lane_configuration.clone(),
        alert_level: if blocked_count >= 2 {
            AlertLevel::High
        } else {
            AlertLevel::Medium
        },
        duration_secs: DISPLAY_DURATION_SECS,
    };

    DecisionPlan {
        blocked_lanes,
        directives,
        lane_configuration,
        speed,
        actions,
        display,
    }
}
