//! Lane blockage analyzer
//!
//! Given the accident outline and a node's calibrated lane polygons, report
//! every lane the accident covers. A malformed polygon on either side is
//! logged and treated as "no match"; it never aborts the analysis.

use serde::{Deserialize, Serialize};
use tracing::warn;

use laneguard_core::{FramePolygon, LanePolygon};

use crate::{intersection_area, normalize, triangulate_any, Triangle, AREA_EPSILON};

/// A lane polygon found to overlap the accident
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedLane {
    pub polygon_id: String,
    pub name: String,
    /// 1-indexed lane number
    pub lane_number: u32,
    /// Shared area in normalized units squared
    pub overlap_area: f64,
}

/// First run of ASCII digits embedded in a lane name
pub fn lane_number_from_name(name: &str) -> Option<u32> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let digits: &str = name[start..]
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .unwrap_or_default();
    digits.parse().ok()
}

fn prepare(polygon: &FramePolygon, label: &str) -> Option<Vec<Triangle>> {
    let normalized = match normalize(polygon) {
        Ok(n) => n,
        Err(reason) => {
            warn!(polygon = label, %reason, "skipping malformed polygon");
            return None;
        }
    };
    let triangles = triangulate_any(normalized.vertices());
    if triangles.is_none() {
        warn!(polygon = label, "polygon has no usable area, skipping");
    }
    triangles
}

/// Lanes overlapped by the accident polygon, in input order
pub fn analyze(accident: &FramePolygon, lanes: &[LanePolygon]) -> Vec<BlockedLane> {
    let Some(accident_tris) = prepare(accident, "accident") else {
        return Vec::new();
    };

    let mut blocked = Vec::new();
    for (index, lane) in lanes.iter().enumerate() {
        let Some(lane_tris) = prepare(&lane.shape, &lane.id) else {
            continue;
        };

        let area = intersection_area(&accident_tris, &lane_tris);
        if area.is_finite() && area > AREA_EPSILON {
            blocked.push(BlockedLane {
                polygon_id: lane.id.clone(),
                name: lane.name.clone(),
                lane_number: lane_number_from_name(&lane.name).unwrap_or(index as u32 + 1),
                overlap_area: area,
            });
        }
    }

    blocked
}

/// Just the lane numbers, deduplicated, in first-seen order
pub fn blocked_lane_numbers(blocked: &[BlockedLane]) -> Vec<u32> {
    let mut numbers: Vec<u32> = Vec::with_capacity(blocked.len());
    for lane in blocked {
        if !numbers.contains(&lane.lane_number) {
            numbers.push(lane.lane_number);
        }
    }
    numbers
}
